//! Register map of the flash controller and of the peripherals the loaders touch,
//! plus the [Mmio] seam every loader talks through.

/// Base address of the flash controller registers
pub const FLASH_BASE: u32 = 0x4002_2000;
/// Base address of the independent watchdog
pub const IWDG_BASE: u32 = 0x4000_3000;
/// Base address of the window watchdog
pub const WWDG_BASE: u32 = 0x4000_2C00;
/// Address of the device identification register
pub const DBGMCU_IDCODE: u32 = 0xE004_2000;
/// Address of the flash size data register (in KiB, low half word)
pub const FLASHSIZE_BASE: u32 = 0x1FFF_75E0;

/// First key of the flash unlock sequence
pub const KEY1: u32 = 0x4567_0123;
/// Second key of the flash unlock sequence
pub const KEY2: u32 = 0xCDEF_89AB;
/// First key of the option byte unlock sequence
pub const OPTKEY1: u32 = 0x0819_2A3B;
/// Second key of the option byte unlock sequence
pub const OPTKEY2: u32 = 0x4C5D_6E7F;

/// The registers the loaders access
#[allow(missing_docs)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Register {
    FlashAcr,
    FlashKeyr,
    FlashOptkeyr,
    FlashSr,
    FlashCr,
    FlashOptr,
    FlashPcrop1sr,
    FlashPcrop1er,
    FlashWrp1ar,
    FlashWrp1br,
    FlashPcrop2sr,
    FlashPcrop2er,
    FlashWrp2ar,
    FlashWrp2br,
    IwdgKr,
    IwdgPr,
    IwdgRlr,
    WwdgCr,
    WwdgCfr,
    DbgmcuIdcode,
    FlashSize,
}

impl Register {
    /// The absolute address of the register
    pub const fn address(self) -> u32 {
        match self {
            Register::FlashAcr => FLASH_BASE,
            Register::FlashKeyr => FLASH_BASE + 0x08,
            Register::FlashOptkeyr => FLASH_BASE + 0x0C,
            Register::FlashSr => FLASH_BASE + 0x10,
            Register::FlashCr => FLASH_BASE + 0x14,
            Register::FlashOptr => FLASH_BASE + 0x20,
            Register::FlashPcrop1sr => FLASH_BASE + 0x24,
            Register::FlashPcrop1er => FLASH_BASE + 0x28,
            Register::FlashWrp1ar => FLASH_BASE + 0x2C,
            Register::FlashWrp1br => FLASH_BASE + 0x30,
            Register::FlashPcrop2sr => FLASH_BASE + 0x44,
            Register::FlashPcrop2er => FLASH_BASE + 0x48,
            Register::FlashWrp2ar => FLASH_BASE + 0x4C,
            Register::FlashWrp2br => FLASH_BASE + 0x50,
            Register::IwdgKr => IWDG_BASE,
            Register::IwdgPr => IWDG_BASE + 0x04,
            Register::IwdgRlr => IWDG_BASE + 0x08,
            Register::WwdgCr => WWDG_BASE,
            Register::WwdgCfr => WWDG_BASE + 0x04,
            Register::DbgmcuIdcode => DBGMCU_IDCODE,
            Register::FlashSize => FLASHSIZE_BASE,
        }
    }
}

/// Flash control register bits
pub mod cr {
    /// Programming
    pub const PG: u32 = 1 << 0;
    /// Page erase
    pub const PER: u32 = 1 << 1;
    /// Mass erase of bank 1
    pub const MER1: u32 = 1 << 2;
    /// Position of the page number field
    pub const PNB_SHIFT: u32 = 3;
    /// The page number field
    pub const PNB_MASK: u32 = 0xFF << PNB_SHIFT;
    /// Position of the bank select bit
    pub const BKER_SHIFT: u32 = 11;
    /// Page erase in bank 2
    pub const BKER: u32 = 1 << BKER_SHIFT;
    /// Mass erase of bank 2
    pub const MER2: u32 = 1 << 15;
    /// Start an erase
    pub const STRT: u32 = 1 << 16;
    /// Start an option byte modification
    pub const OPTSTRT: u32 = 1 << 17;
    /// Reload the option bytes (resets the device)
    pub const OBL_LAUNCH: u32 = 1 << 27;
    /// Option byte lock
    pub const OPTLOCK: u32 = 1 << 30;
    /// Flash control register lock
    pub const LOCK: u32 = 1 << 31;
}

/// Flash status register bits
pub mod sr {
    /// End of operation
    pub const EOP: u32 = 1 << 0;
    /// Operation error
    pub const OPERR: u32 = 1 << 1;
    /// Programming error
    pub const PROGERR: u32 = 1 << 3;
    /// Write protection error
    pub const WRPERR: u32 = 1 << 4;
    /// Programming alignment error
    pub const PGAERR: u32 = 1 << 5;
    /// Size error
    pub const SIZERR: u32 = 1 << 6;
    /// Programming sequence error
    pub const PGSERR: u32 = 1 << 7;
    /// Fast programming data miss error
    pub const MISSERR: u32 = 1 << 8;
    /// Fast programming error
    pub const FASTERR: u32 = 1 << 9;
    /// PCROP read error
    pub const RDERR: u32 = 1 << 14;
    /// Option validity error
    pub const OPTVERR: u32 = 1 << 15;
    /// Busy
    pub const BSY: u32 = 1 << 16;

    /// Every error flag. Writing this mask to SR clears them all.
    pub const ERRORS: u32 =
        OPERR | PROGERR | WRPERR | PGAERR | SIZERR | PGSERR | MISSERR | FASTERR | RDERR | OPTVERR;
}

/// Option register bits
pub mod optr {
    /// Independent watchdog is started by software (0 = hardware, always running)
    pub const IWDG_SW: u32 = 1 << 16;
    /// Window watchdog is started by software (0 = hardware, always running)
    pub const WWDG_SW: u32 = 1 << 19;
    /// Dual bank mode on 1 MiB L4 parts
    pub const DUALBANK: u32 = 1 << 21;
    /// Dual bank mode on 1 MiB (and smaller) L4+ parts
    pub const DB1M: u32 = 1 << 21;
    /// Dual bank mode on 2 MiB L4+ parts
    pub const DBANK: u32 = 1 << 22;
}

/// Access to the peripherals.
///
/// The loaders never touch a pointer directly, so they can run against the real
/// chip as well as against an emulation on the host.
pub trait Mmio {
    /// Read a register
    fn read(&self, register: Register) -> u32;

    /// Write a register
    fn write(&mut self, register: Register, value: u32);

    /// Read, change and write back a register
    fn modify(&mut self, register: Register, f: impl FnOnce(u32) -> u32) {
        let value = self.read(register);
        self.write(register, f(value));
    }

    /// Read a byte of the memory array
    fn read_memory(&self, address: u32) -> u8;

    /// Store a word into the memory array. While programming this starts the write of
    /// half a double word.
    fn write_memory(&mut self, address: u32, word: u32);

    /// Make sure all previous memory accesses have completed
    fn barrier(&mut self);
}
