//! The algorithm for the main flash memory

use log::debug;

use crate::controller::Controller;
use crate::geometry::{Family, Geometry};
use crate::registers::{cr, Mmio, Register};
use crate::{Error, FlashLoader, Function, Result};


/// The main flash memory of an L4 or L4+ part
pub struct OnChipFlash<M: Mmio> {
    controller: Controller<M>,
    geometry: Geometry,
}

impl<M: Mmio> OnChipFlash<M> {
    /// Unlock the controller, find out how the flash is organized and take care of the
    /// watchdogs.
    ///
    /// `address` is the start of the flash the host wants to work on. `clock` is not needed,
    /// the controller times its operations itself.
    pub fn init(
        mmio: M,
        family: Family,
        address: u32,
        clock: u32,
        function: Function,
    ) -> Result<Self> {
        debug!(
            "Init {:?} at {:#010X}, clock {} Hz, for {:?}",
            family, address, clock, function
        );

        let mut controller = Controller::new(mmio);
        controller.unlock()?;
        controller.wait_idle();

        if let Family::Stm32L4 { .. } = family {
            // No wait states and caches off while the flash is being changed
            controller.mmio_mut().write(Register::FlashAcr, 0);
        }

        controller.clear_errors();
        let geometry = Geometry::detect(controller.mmio(), family, address);
        controller.configure_watchdogs();

        Ok(Self { controller, geometry })
    }

    /// The layout that was detected during init
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// The peripherals
    pub fn mmio(&self) -> &M {
        self.controller.mmio()
    }
}

impl<M: Mmio> FlashLoader for OnChipFlash<M> {
    fn uninit(&mut self) -> Result<()> {
        self.controller.lock();
        Ok(())
    }

    fn erase_chip(&mut self) -> Result<()> {
        debug!("Erase chip");

        self.controller.wait_idle();
        self.controller.clear_errors();
        self.controller.execute(cr::MER1 | cr::MER2, cr::STRT)
    }

    fn erase_sector(&mut self, address: u32) -> Result<()> {
        let page = self.geometry.locate(address)?;
        debug!("Erase sector {:#010X}: {:?}", address, page);

        self.controller.wait_idle();
        self.controller.clear_errors();
        self.controller.execute(page.control_bits(), cr::STRT)
    }

    fn program_page(&mut self, address: u32, data: &[u8]) -> Result<()> {
        if !self.geometry.contains(address, data.len()) {
            return Err(Error::OutOfRange(address));
        }
        debug!("Program {} bytes at {:#010X}", data.len(), address);

        self.controller.program(address, data)
    }

    fn blank_check(&mut self, _address: u32, _size: u32, _pattern: u8) -> Result<()> {
        // A page reading back as erased can still hold an ECC code, so it always gets erased
        Err(Error::NotBlank)
    }

    fn verify(&mut self, address: u32, data: &[u8]) -> core::result::Result<(), u32> {
        if !self.geometry.contains(address, data.len()) {
            return Err(address);
        }

        self.controller.compare(address, data)
    }
}
