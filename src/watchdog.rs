//! The watchdogs may have been started by the option bytes before the loader runs.
//! They can't be stopped, so they get the longest timeout and are reloaded while waiting
//! on the flash controller.

use log::debug;

use crate::registers::{optr, Mmio, Register};

/// Reloads the independent watchdog counter
pub const IWDG_RELOAD: u32 = 0xAAAA;
/// Enables writes to the prescaler and reload registers
pub const IWDG_WRITE_ACCESS: u32 = 0x5555;
/// Divide the 32 kHz clock by 256
pub const IWDG_PRESCALER_256: u32 = 6;
/// The largest reload value, together with the prescaler about 32.8 seconds
pub const IWDG_MAX_RELOAD: u32 = 0xFFF;
/// Open window over the whole counter range with the slowest prescaler
pub const WWDG_CONFIGURATION: u32 = 0x1FF;
/// The largest counter value
pub const WWDG_MAX_COUNTER: u32 = 0x7F;

/// The watchdogs that are running in hardware mode
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct Watchdogs {
    independent: bool,
    window: bool,
}

impl Watchdogs {
    /// Look at the option bytes and stretch the timeouts of the hardware started watchdogs
    pub fn configure(mmio: &mut impl Mmio) -> Self {
        let options = mmio.read(Register::FlashOptr);
        let watchdogs = Self {
            independent: options & optr::IWDG_SW == 0,
            window: options & optr::WWDG_SW == 0,
        };

        if watchdogs.independent {
            mmio.write(Register::IwdgKr, IWDG_RELOAD);
            mmio.write(Register::IwdgKr, IWDG_WRITE_ACCESS);
            mmio.write(Register::IwdgPr, IWDG_PRESCALER_256);
            mmio.write(Register::IwdgRlr, IWDG_MAX_RELOAD);
        }

        if watchdogs.window {
            mmio.write(Register::WwdgCfr, WWDG_CONFIGURATION);
            mmio.write(Register::WwdgCr, WWDG_MAX_COUNTER);
        }

        debug!("Watchdogs: {:?}", watchdogs);

        watchdogs
    }

    /// Is the independent watchdog running in hardware mode
    pub fn independent(&self) -> bool {
        self.independent
    }

    /// Is the window watchdog running in hardware mode
    pub fn window(&self) -> bool {
        self.window
    }

    /// Reload the watchdogs.
    ///
    /// The independent watchdog is always reloaded because firmware may have started it
    /// in software mode before the debugger halted the core.
    pub fn reload(&self, mmio: &mut impl Mmio) {
        mmio.write(Register::IwdgKr, IWDG_RELOAD);

        if self.window {
            mmio.write(Register::WwdgCr, WWDG_MAX_COUNTER);
        }
    }
}
