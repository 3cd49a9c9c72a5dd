use crate::registers::{Mmio, Register};

/// The peripherals of the chip the loader is running on
#[derive(Debug, Default)]
pub struct Target;

impl Mmio for Target {
    fn read(&self, register: Register) -> u32 {
        // Safety: every register address is a valid, aligned peripheral address
        unsafe { core::ptr::read_volatile(register.address() as *const u32) }
    }

    fn write(&mut self, register: Register, value: u32) {
        // Safety: every register address is a valid, aligned peripheral address
        unsafe { core::ptr::write_volatile(register.address() as *mut u32, value) }
    }

    fn read_memory(&self, address: u32) -> u8 {
        // Safety: the loaders only read addresses they checked against their memory range
        unsafe { core::ptr::read_volatile(address as *const u8) }
    }

    fn write_memory(&mut self, address: u32, word: u32) {
        // Safety: the loaders only program word aligned addresses inside their memory range
        unsafe { core::ptr::write_volatile(address as *mut u32, word) }
    }

    fn barrier(&mut self) {
        cortex_m::asm::dsb();
    }
}
