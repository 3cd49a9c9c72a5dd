//! The sequences shared by all loaders that use the flash controller: unlocking, waiting,
//! error handling and double word programming.

use log::{trace, warn};

use crate::registers::{cr, sr, Mmio, Register, KEY1, KEY2, OPTKEY1, OPTKEY2};
use crate::watchdog::Watchdogs;
use crate::{Error, FlashError, Result};

/// The programming unit of the flash memory
pub const DOUBLE_WORD: u32 = 8;

/// The value of erased flash
pub const ERASED: u8 = 0xFF;

/// Packs up to eight bytes into the low and high word of a double word.
/// Missing bytes are filled with the erased value so they stay untouched.
pub fn pack_double_word(chunk: &[u8]) -> (u32, u32) {
    let mut bytes = [ERASED; DOUBLE_WORD as usize];
    let length = chunk.len().min(bytes.len());
    bytes[..length].copy_from_slice(&chunk[..length]);

    (
        u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
    )
}

/// The flash controller
pub struct Controller<M: Mmio> {
    mmio: M,
    watchdogs: Watchdogs,
}

impl<M: Mmio> Controller<M> {
    /// Take control over the peripherals
    pub fn new(mmio: M) -> Self {
        Self {
            mmio,
            watchdogs: Watchdogs::default(),
        }
    }

    /// The peripherals
    pub fn mmio(&self) -> &M {
        &self.mmio
    }

    /// The peripherals
    pub fn mmio_mut(&mut self) -> &mut M {
        &mut self.mmio
    }

    /// Write the key sequence and check that the control register was unlocked
    pub fn unlock(&mut self) -> Result<()> {
        self.mmio.write(Register::FlashKeyr, KEY1);
        self.mmio.write(Register::FlashKeyr, KEY2);

        if self.mmio.read(Register::FlashCr) & cr::LOCK != 0 {
            warn!("Flash stayed locked after the key sequence");
            return Err(Error::Locked);
        }

        Ok(())
    }

    /// Write the option key sequence and check that the option bytes were unlocked.
    /// The control register must be unlocked already.
    pub fn unlock_options(&mut self) -> Result<()> {
        self.mmio.write(Register::FlashOptkeyr, OPTKEY1);
        self.mmio.write(Register::FlashOptkeyr, OPTKEY2);

        if self.mmio.read(Register::FlashCr) & cr::OPTLOCK != 0 {
            warn!("Option bytes stayed locked after the key sequence");
            return Err(Error::OptionsLocked);
        }

        Ok(())
    }

    /// Lock the control register (and with it the option bytes)
    pub fn lock(&mut self) {
        self.mmio.write(Register::FlashCr, cr::LOCK);
        self.mmio.barrier();
        self.wait_idle();
    }

    /// Stretch the watchdogs so they don't bite during long operations
    pub fn configure_watchdogs(&mut self) {
        self.watchdogs = Watchdogs::configure(&mut self.mmio);
    }

    /// Clear every error flag
    pub fn clear_errors(&mut self) {
        self.mmio.write(Register::FlashSr, sr::ERRORS);
    }

    /// Wait for the current operation to end, keeping the watchdogs happy
    pub fn wait_idle(&mut self) {
        while self.mmio.read(Register::FlashSr) & sr::BSY != 0 {
            self.watchdogs.reload(&mut self.mmio);
        }
    }

    /// Report (and clear) the first error flag the last operation raised
    pub fn check_errors(&mut self) -> Result<()> {
        let status = self.mmio.read(Register::FlashSr);

        match FlashError::from_status(status) {
            Some(error) => {
                warn!("Flash error {:?}, status {:#010X}", error, status);
                self.clear_errors();
                Err(Error::Flash(error))
            }
            None => Ok(()),
        }
    }

    /// Run an erase or option operation: select it in the control register, set the
    /// start bit, wait for it to finish and check the result.
    pub fn execute(&mut self, control: u32, start: u32) -> Result<()> {
        trace!("Execute {:#010X}", control | start);

        self.mmio.write(Register::FlashCr, control);
        self.mmio.modify(Register::FlashCr, |value| value | start);
        self.mmio.barrier();
        self.wait_idle();
        self.mmio.write(Register::FlashCr, 0);

        self.check_errors()
    }

    /// Program the data starting at a double word aligned address
    pub fn program(&mut self, address: u32, data: &[u8]) -> Result<()> {
        if address % DOUBLE_WORD != 0 {
            return Err(Error::Unaligned(address));
        }

        self.wait_idle();
        self.clear_errors();
        self.mmio.write(Register::FlashCr, cr::PG);

        let result = self.program_double_words(address, data);

        self.mmio.write(Register::FlashCr, 0);
        result
    }

    fn program_double_words(&mut self, address: u32, data: &[u8]) -> Result<()> {
        let mut target = address;

        for chunk in data.chunks(DOUBLE_WORD as usize) {
            let (low, high) = pack_double_word(chunk);
            trace!("Program {:#010X}: {:#010X} {:#010X}", target, low, high);

            self.mmio.write_memory(target, low);
            self.mmio.write_memory(target + 4, high);
            self.mmio.barrier();
            self.wait_idle();
            self.check_errors()?;

            target = target.wrapping_add(DOUBLE_WORD);
        }

        Ok(())
    }

    /// Compare the memory with the data.
    /// Gives the address of the first byte that differs.
    pub fn compare(&self, address: u32, data: &[u8]) -> core::result::Result<(), u32> {
        let mut current = address;

        for expected in data {
            if self.mmio.read_memory(current) != *expected {
                return Err(current);
            }
            current = current.wrapping_add(1);
        }

        Ok(())
    }
}
