//! The option byte algorithm.
//!
//! The host sees the option registers as a small memory at [OPTION_BYTES_START]: every
//! register takes four bytes in the order of [Layout::fields]. Programming writes the
//! registers (only the bits that exist) and starts the option byte modification,
//! "erasing" puts the factory values back.

use arrayvec::ArrayVec;
use log::debug;

use crate::controller::Controller;
use crate::registers::{cr, Mmio, Register};
use crate::{Error, FlashLoader, Function, Result};

/// Where the host sees the option bytes
pub const OPTION_BYTES_START: u32 = 0x1FFF_7800;

/// An option register as seen by the host
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct OptionField {
    /// The register
    pub register: Register,
    /// The bits that can be changed
    pub mask: u32,
    /// The factory value
    pub factory: u32,
}

const fn field(register: Register, mask: u32, factory: u32) -> OptionField {
    OptionField {
        register,
        mask,
        factory,
    }
}

const FIELDS: [OptionField; 9] = [
    field(Register::FlashOptr, 0x0FFF_77FF, 0xFFEF_F8AA),
    field(Register::FlashPcrop1sr, 0x0000_FFFF, 0xFFFF_FFFF),
    field(Register::FlashPcrop1er, 0x8000_FFFF, 0xFFFF_0000),
    field(Register::FlashWrp1ar, 0x00FF_00FF, 0xFF00_FFFF),
    field(Register::FlashWrp1br, 0x00FF_00FF, 0xFF00_FFFF),
    field(Register::FlashPcrop2sr, 0x0000_FFFF, 0xFFFF_FFFF),
    field(Register::FlashPcrop2er, 0x8000_FFFF, 0xFFFF_0000),
    field(Register::FlashWrp2ar, 0x00FF_00FF, 0xFF00_FFFF),
    field(Register::FlashWrp2br, 0x00FF_00FF, 0xFF00_FFFF),
];

/// The option words of one device
pub type OptionImage = ArrayVec<u32, 9>;

/// Which option registers exist
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Layout {
    /// OPTR, PCROP1SR, PCROP1ER, WRP1AR and WRP1BR
    SingleBank,
    /// The single bank registers and the ones of the second bank
    DualBank,
}

impl Layout {
    /// The registers, in the order the host sees them
    pub fn fields(self) -> &'static [OptionField] {
        match self {
            Layout::SingleBank => &FIELDS[..5],
            Layout::DualBank => &FIELDS,
        }
    }

    /// The size of the option bytes as the host sees them
    pub fn size(self) -> usize {
        self.fields().len() * 4
    }

    /// Split the data of the host into option words
    pub fn decode(self, data: &[u8]) -> Result<OptionImage> {
        if data.len() < self.size() {
            return Err(Error::BufferTooShort {
                expected: self.size(),
                actual: data.len(),
            });
        }

        Ok(data
            .chunks_exact(4)
            .take(self.fields().len())
            .map(|word| u32::from_le_bytes([word[0], word[1], word[2], word[3]]))
            .collect())
    }
}

/// The option bytes of an L4 part
pub struct OptionBytes<M: Mmio> {
    controller: Controller<M>,
    layout: Layout,
}

impl<M: Mmio> OptionBytes<M> {
    /// Unlock the controller and the option bytes and take care of the watchdogs
    pub fn init(
        mmio: M,
        layout: Layout,
        address: u32,
        clock: u32,
        function: Function,
    ) -> Result<Self> {
        debug!(
            "Init {:?} option bytes at {:#010X}, clock {} Hz, for {:?}",
            layout, address, clock, function
        );

        let mut controller = Controller::new(mmio);
        controller.unlock()?;
        controller.unlock_options()?;
        controller.wait_idle();
        controller.mmio_mut().write(Register::FlashAcr, 0);
        controller.clear_errors();
        controller.configure_watchdogs();

        Ok(Self { controller, layout })
    }

    /// The peripherals
    pub fn mmio(&self) -> &M {
        self.controller.mmio()
    }

    fn commit(&mut self) -> Result<()> {
        self.controller.execute(0, cr::OPTSTRT)
    }
}

impl<M: Mmio> FlashLoader for OptionBytes<M> {
    fn uninit(&mut self) -> Result<()> {
        let mmio = self.controller.mmio_mut();
        mmio.write(Register::FlashCr, cr::LOCK | cr::OPTLOCK);
        mmio.barrier();
        Ok(())
    }

    fn erase_chip(&mut self) -> Result<()> {
        debug!("Restore factory option bytes");

        self.controller.wait_idle();
        self.controller.clear_errors();
        for field in self.layout.fields() {
            self.controller.mmio_mut().write(field.register, field.factory);
        }

        self.commit()
    }

    fn erase_sector(&mut self, _address: u32) -> Result<()> {
        Ok(())
    }

    fn program_page(&mut self, address: u32, data: &[u8]) -> Result<()> {
        let image = self.layout.decode(data)?;
        debug!("Program option bytes at {:#010X}: {:08X?}", address, image);

        self.controller.wait_idle();
        self.controller.clear_errors();
        for (field, value) in self.layout.fields().iter().zip(&image) {
            self.controller.mmio_mut().write(field.register, value & field.mask);
        }

        self.commit()
    }

    fn blank_check(&mut self, _address: u32, _size: u32, _pattern: u8) -> Result<()> {
        // The registers are overwritten in place, there is nothing to erase first
        Ok(())
    }

    fn verify(&mut self, address: u32, data: &[u8]) -> core::result::Result<(), u32> {
        let image = self.layout.decode(data).map_err(|_| address)?;

        for (index, (field, value)) in self.layout.fields().iter().zip(&image).enumerate() {
            let actual = self.controller.mmio().read(field.register);
            if actual & field.mask != value & field.mask {
                return Err(address.wrapping_add(index as u32));
            }
        }

        Ok(())
    }
}
