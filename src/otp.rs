//! The one time programmable area. It can't be erased, every double word can be
//! programmed once.

use log::{debug, warn};

use crate::controller::Controller;
use crate::registers::{Mmio, Register};
use crate::{Error, FlashLoader, Function, Result};

/// Start of the OTP area
pub const OTP_START: u32 = 0x1FFF_7000;
/// Size of the OTP area
pub const OTP_SIZE: u32 = 0x400;

/// The OTP area of an L4 part
pub struct Otp<M: Mmio> {
    controller: Controller<M>,
}

impl<M: Mmio> Otp<M> {
    /// Unlock the controller and take care of the watchdogs
    pub fn init(mmio: M, address: u32, clock: u32, function: Function) -> Result<Self> {
        debug!(
            "Init OTP at {:#010X}, clock {} Hz, for {:?}",
            address, clock, function
        );

        let mut controller = Controller::new(mmio);
        controller.unlock()?;
        controller.wait_idle();
        controller.mmio_mut().write(Register::FlashAcr, 0);
        controller.clear_errors();
        controller.configure_watchdogs();

        Ok(Self { controller })
    }

    /// The peripherals
    pub fn mmio(&self) -> &M {
        self.controller.mmio()
    }

    fn contains(address: u32, length: usize) -> bool {
        address
            .checked_sub(OTP_START)
            .zip(u32::try_from(length).ok())
            .and_then(|(offset, length)| offset.checked_add(length))
            .map_or(false, |end| end <= OTP_SIZE)
    }
}

impl<M: Mmio> FlashLoader for Otp<M> {
    fn uninit(&mut self) -> Result<()> {
        self.controller.lock();
        Ok(())
    }

    fn erase_chip(&mut self) -> Result<()> {
        warn!("The OTP area can't be erased");
        Err(Error::Unsupported)
    }

    fn erase_sector(&mut self, _address: u32) -> Result<()> {
        Ok(())
    }

    fn program_page(&mut self, address: u32, data: &[u8]) -> Result<()> {
        if !Self::contains(address, data.len()) {
            return Err(Error::OutOfRange(address));
        }
        debug!("Program {} OTP bytes at {:#010X}", data.len(), address);

        self.controller.program(address, data)
    }

    fn blank_check(&mut self, _address: u32, _size: u32, _pattern: u8) -> Result<()> {
        Err(Error::NotBlank)
    }

    fn verify(&mut self, address: u32, data: &[u8]) -> core::result::Result<(), u32> {
        if !Self::contains(address, data.len()) {
            return Err(address);
        }

        self.controller.compare(address, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emulator::Emulator;
    use crate::registers::cr;
    use crate::FlashError;
    use pretty_assertions::assert_eq;

    fn otp() -> Otp<Emulator> {
        Otp::init(
            Emulator::stm32l4(0x415, 0x4_0000),
            OTP_START,
            0,
            Function::Program,
        )
        .unwrap()
    }

    #[test]
    fn program_and_verify() {
        let mut otp = otp();
        let serial = hex_literal::hex!("DEADBEEF 00112233 4455");

        otp.program_page(OTP_START + 0x10, &serial).unwrap();

        assert_eq!(otp.verify(OTP_START + 0x10, &serial), Ok(()));
        assert_eq!(
            otp.mmio().memory(OTP_START + 0x18, 8),
            [0x44, 0x55, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]
        );
    }

    #[test]
    fn double_words_are_programmed_once() {
        let mut otp = otp();
        otp.program_page(OTP_START, &[0x5A; 8]).unwrap();

        assert_eq!(
            otp.program_page(OTP_START, &[0xA5; 8]),
            Err(Error::Flash(FlashError::Programming))
        );
    }

    #[test]
    fn erasing_is_not_possible() {
        let mut otp = otp();
        otp.program_page(OTP_START, &[0x5A; 8]).unwrap();

        assert_eq!(otp.erase_sector(OTP_START), Ok(()));
        assert_eq!(otp.erase_chip(), Err(Error::Unsupported));
        assert_eq!(otp.mmio().memory(OTP_START, 8), [0x5A; 8]);
        assert_eq!(otp.blank_check(OTP_START, 8, 0xFF), Err(Error::NotBlank));
    }

    #[test]
    fn range_ends_with_the_area() {
        let mut otp = otp();

        assert_eq!(otp.program_page(OTP_START + 0x3F8, &[0; 8]), Ok(()));
        assert_eq!(
            otp.program_page(OTP_START + 0x3F8, &[0; 16]),
            Err(Error::OutOfRange(OTP_START + 0x3F8))
        );
        assert_eq!(
            otp.program_page(0x0800_0000, &[0; 8]),
            Err(Error::OutOfRange(0x0800_0000))
        );
    }

    #[test]
    fn uninit_locks() {
        let mut otp = otp();
        otp.uninit().unwrap();

        assert_ne!(otp.mmio().register(Register::FlashCr) & cr::LOCK, 0);
    }
}
