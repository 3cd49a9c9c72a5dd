//! A host model of the flash controller, the watchdogs and the memories behind them.
//! It follows the reference manual closely enough to catch wrong sequences: locked
//! registers ignore writes, status flags are cleared by writing ones, programming
//! happens per double word and only into erased (or all zero) double words, and every
//! operation keeps the controller busy for a while.

use std::cell::Cell;
use std::collections::HashMap;
use std::ops::Range;

use crate::geometry::FLASH_START;
use crate::otp::{OTP_SIZE, OTP_START};
use crate::registers::{cr, optr, sr, Mmio, Register, KEY1, KEY2, OPTKEY1, OPTKEY2};

/// Factory value of the option register
pub const OPTR_DEFAULT: u32 = 0xFFEF_F8AA;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Chip {
    Stm32L4 { single_bank_only: bool },
    Stm32L4Plus,
}

#[derive(Debug)]
pub struct Emulator {
    chip: Chip,
    control: u32,
    status: Cell<u32>,
    busy_left: Cell<u32>,
    unsynced: bool,
    early_polls: Cell<u32>,
    registers: HashMap<Register, u32>,
    flash: Vec<u8>,
    otp: Vec<u8>,
    key_stage: u8,
    option_key_stage: u8,
    pending: Option<(u32, u32)>,
    fault: Option<u32>,
    protected: Vec<Range<u32>>,

    /// The key sequence was broken, the controller stays locked until reset
    pub key_fault: bool,
    /// How many status reads an operation stays busy
    pub busy_reads: u32,
    pub iwdg_reloads: u32,
    pub wwdg_reloads: u32,
    pub barriers: u32,
    /// The control register value of every page erase that was started
    pub erase_commands: Vec<u32>,
    /// Start addresses of the erased pages, in order
    pub erased_pages: Vec<u32>,
    pub mass_erases: u32,
    pub option_commits: u32,
}

impl Emulator {
    fn new(chip: Chip, idcode: u32, size: u32, options: u32) -> Self {
        let mut registers = HashMap::new();
        registers.insert(Register::DbgmcuIdcode, 0x1000_0000 | idcode);
        registers.insert(Register::FlashSize, 0xFFFF_0000 | (size >> 10));
        registers.insert(Register::FlashAcr, 0x0000_0600);
        registers.insert(Register::FlashOptr, options);
        for register in [Register::FlashPcrop1sr, Register::FlashPcrop2sr] {
            registers.insert(register, 0xFFFF_FFFF);
        }
        for register in [Register::FlashPcrop1er, Register::FlashPcrop2er] {
            registers.insert(register, 0xFFFF_0000);
        }
        for register in [
            Register::FlashWrp1ar,
            Register::FlashWrp1br,
            Register::FlashWrp2ar,
            Register::FlashWrp2br,
        ] {
            registers.insert(register, 0xFF00_FFFF);
        }

        Self {
            chip,
            control: cr::LOCK | cr::OPTLOCK,
            status: Cell::new(0),
            busy_left: Cell::new(0),
            unsynced: false,
            early_polls: Cell::new(0),
            registers,
            flash: vec![0xFF; size as usize],
            otp: vec![0xFF; OTP_SIZE as usize],
            key_stage: 0,
            option_key_stage: 0,
            pending: None,
            fault: None,
            protected: Vec::new(),
            key_fault: false,
            busy_reads: 3,
            iwdg_reloads: 0,
            wwdg_reloads: 0,
            barriers: 0,
            erase_commands: Vec::new(),
            erased_pages: Vec::new(),
            mass_erases: 0,
            option_commits: 0,
        }
    }

    /// An L4 part with the given identification code and flash size
    pub fn stm32l4(idcode: u32, size: u32) -> Self {
        let single_bank_only = matches!(idcode, 0x435 | 0x462 | 0x464);
        Self::new(
            Chip::Stm32L4 { single_bank_only },
            idcode,
            size,
            OPTR_DEFAULT,
        )
    }

    /// An L4+ part with the given flash size in KiB, in dual or single bank mode
    pub fn stm32l4_plus(idcode: u32, size_kib: u32, dual_bank: bool) -> Self {
        let options = if dual_bank {
            OPTR_DEFAULT | optr::DBANK | optr::DB1M
        } else {
            OPTR_DEFAULT & !(optr::DBANK | optr::DB1M)
        };
        Self::new(Chip::Stm32L4Plus, idcode, size_kib << 10, options)
    }

    /// Status reads that happened after a store to the controller or the array and
    /// before the barrier that must follow it
    pub fn early_polls(&self) -> u32 {
        self.early_polls.get()
    }

    /// The current value of a register
    pub fn register(&self, register: Register) -> u32 {
        match register {
            Register::FlashCr => self.control,
            Register::FlashSr => self.status.get(),
            _ => self.registers.get(&register).copied().unwrap_or(0),
        }
    }

    /// Change a register behind the back of the controller
    pub fn set_register(&mut self, register: Register, value: u32) {
        match register {
            Register::FlashCr => self.control = value,
            Register::FlashSr => self.status.set(value),
            _ => {
                self.registers.insert(register, value);
            }
        }
    }

    /// Set status flags right away
    pub fn raise(&mut self, flags: u32) {
        self.status.set(self.status.get() | flags);
    }

    /// Let the next operation fail with the given status flags
    pub fn inject(&mut self, flags: u32) {
        self.fault = Some(flags);
    }

    /// Protect a range of the main flash against erasing and programming
    pub fn protect(&mut self, range: Range<u32>) {
        self.protected.push(range);
    }

    /// Put data into memory without going through the controller
    pub fn fill(&mut self, address: u32, data: &[u8]) {
        let (memory, offset) = self.locate_mut(address).expect("address outside memory");
        memory[offset..offset + data.len()].copy_from_slice(data);
    }

    /// A copy of a piece of memory
    pub fn memory(&self, address: u32, length: usize) -> Vec<u8> {
        (0..length as u32)
            .map(|index| self.read_memory(address + index))
            .collect()
    }

    fn locate(&self, address: u32) -> Option<(&[u8], usize)> {
        if let Some(offset) = Self::offset(address, FLASH_START, self.flash.len()) {
            Some((&self.flash[..], offset))
        } else {
            Self::offset(address, OTP_START, self.otp.len()).map(|offset| (&self.otp[..], offset))
        }
    }

    fn locate_mut(&mut self, address: u32) -> Option<(&mut [u8], usize)> {
        if let Some(offset) = Self::offset(address, FLASH_START, self.flash.len()) {
            Some((&mut self.flash[..], offset))
        } else {
            Self::offset(address, OTP_START, self.otp.len())
                .map(|offset| (&mut self.otp[..], offset))
        }
    }

    fn offset(address: u32, base: u32, length: usize) -> Option<usize> {
        let offset = address.checked_sub(base)? as usize;
        (offset < length).then_some(offset)
    }

    fn is_protected(&self, range: Range<u32>) -> bool {
        self.protected
            .iter()
            .any(|protected| protected.start < range.end && range.start < protected.end)
    }

    fn start_operation(&mut self) -> bool {
        self.busy_left.set(self.busy_reads);

        match self.fault.take() {
            Some(flags) => {
                self.raise(flags);
                false
            }
            None => true,
        }
    }

    /// Page size and bank size the hardware uses right now
    fn hardware_layout(&self) -> (u32, u32) {
        let size = self.flash.len() as u32;
        match self.chip {
            Chip::Stm32L4 { single_bank_only: true } => (0x800, size),
            Chip::Stm32L4 { single_bank_only: false } => (0x800, (size / 2).max(0x1_0000)),
            Chip::Stm32L4Plus => {
                let bank_mode = if size > 0x10_0000 {
                    optr::DBANK
                } else {
                    optr::DB1M
                };
                if self.register(Register::FlashOptr) & bank_mode != 0 {
                    (0x1000, size / 2)
                } else {
                    (0x2000, size)
                }
            }
        }
    }

    fn erase(&mut self, range: Range<u32>) {
        let start = (range.start - FLASH_START) as usize;
        let end = (range.end - FLASH_START) as usize;
        self.flash[start..end].fill(0xFF);
    }

    fn start_erase(&mut self, control: u32) {
        let operations = control & (cr::PG | cr::PER | cr::MER1 | cr::MER2);
        let mixed = control & cr::PER != 0 && operations != cr::PER;
        if operations == 0 || control & cr::PG != 0 || mixed {
            self.raise(sr::PGSERR);
            return;
        }

        if !self.start_operation() {
            return;
        }

        let (page_size, bank_size) = self.hardware_layout();
        let size = self.flash.len() as u32;

        if control & cr::PER != 0 {
            self.erase_commands.push(control);
            let page = (control & cr::PNB_MASK) >> cr::PNB_SHIFT;
            let bank_offset = if control & cr::BKER != 0 && bank_size < size {
                bank_size
            } else {
                0
            };
            let start = FLASH_START + bank_offset + page * page_size;

            if start + page_size > FLASH_START + size {
                self.raise(sr::OPERR);
            } else if self.is_protected(start..start + page_size) {
                self.raise(sr::WRPERR);
            } else {
                self.erase(start..start + page_size);
                self.erased_pages.push(start);
            }
            return;
        }

        let mut ranges = Vec::new();
        if control & cr::MER1 != 0 {
            ranges.push(FLASH_START..FLASH_START + bank_size);
        }
        if control & cr::MER2 != 0 && bank_size < size {
            ranges.push(FLASH_START + bank_size..FLASH_START + size);
        }

        if ranges.iter().any(|range| self.is_protected(range.clone())) {
            self.raise(sr::WRPERR);
            return;
        }

        for range in ranges {
            self.erase(range);
        }
        self.mass_erases += 1;
    }

    fn commit_options(&mut self) {
        if self.start_operation() {
            self.option_commits += 1;
        }
    }

    fn program_double_word(&mut self, address: u32, low: u32, high: u32) {
        if !self.start_operation() {
            return;
        }

        if self.is_protected(address..address + 8) {
            self.raise(sr::WRPERR);
            return;
        }

        let Some((memory, offset)) = self.locate_mut(address) else {
            self.raise(sr::OPERR);
            return;
        };
        if offset + 8 > memory.len() {
            self.raise(sr::OPERR);
            return;
        }

        let target = &mut memory[offset..offset + 8];
        let erased = target.iter().all(|byte| *byte == 0xFF);
        if !erased && (low, high) != (0, 0) {
            self.raise(sr::PROGERR);
            return;
        }

        target[..4].copy_from_slice(&low.to_le_bytes());
        target[4..].copy_from_slice(&high.to_le_bytes());
    }

    fn write_key(&mut self, key: u32) {
        match (self.key_stage, key) {
            _ if self.key_fault => {}
            (0, KEY1) => self.key_stage = 1,
            (1, KEY2) => {
                self.key_stage = 0;
                self.control &= !cr::LOCK;
            }
            _ => {
                self.key_stage = 0;
                self.key_fault = true;
            }
        }
    }

    fn write_option_key(&mut self, key: u32) {
        if self.control & cr::LOCK != 0 {
            return;
        }

        match (self.option_key_stage, key) {
            _ if self.key_fault => {}
            (0, OPTKEY1) => self.option_key_stage = 1,
            (1, OPTKEY2) => {
                self.option_key_stage = 0;
                self.control &= !cr::OPTLOCK;
            }
            _ => {
                self.option_key_stage = 0;
                self.key_fault = true;
            }
        }
    }

    fn write_control(&mut self, value: u32) {
        let locks = self.control & (cr::LOCK | cr::OPTLOCK);
        if locks & cr::LOCK != 0 {
            return;
        }

        let triggers = cr::STRT | cr::OPTSTRT | cr::OBL_LAUNCH;
        if value & (triggers | cr::LOCK) != 0 {
            self.unsynced = true;
        }
        self.control = (value & !triggers) | locks;

        if value & cr::STRT != 0 {
            self.start_erase(value);
        }
        if value & cr::OPTSTRT != 0 {
            if locks & cr::OPTLOCK != 0 {
                self.raise(sr::PGSERR);
            } else {
                self.commit_options();
            }
        }
        if value & cr::PG == 0 {
            self.pending = None;
        }
    }
}

impl Mmio for Emulator {
    fn read(&self, register: Register) -> u32 {
        if register == Register::FlashSr && self.unsynced {
            self.early_polls.set(self.early_polls.get() + 1);
        }

        match register {
            Register::FlashSr if self.busy_left.get() > 0 => {
                self.busy_left.set(self.busy_left.get() - 1);
                self.status.get() | sr::BSY
            }
            _ => self.register(register),
        }
    }

    fn write(&mut self, register: Register, value: u32) {
        match register {
            Register::FlashKeyr => self.write_key(value),
            Register::FlashOptkeyr => self.write_option_key(value),
            Register::FlashCr => self.write_control(value),
            Register::FlashSr => {
                let cleared = value & (sr::ERRORS | sr::EOP);
                self.status.set(self.status.get() & !cleared);
            }
            Register::IwdgKr => {
                if value == 0xAAAA {
                    self.iwdg_reloads += 1;
                }
                self.registers.insert(register, value);
            }
            Register::WwdgCr => {
                self.wwdg_reloads += 1;
                self.registers.insert(register, value);
            }
            Register::FlashOptr
            | Register::FlashPcrop1sr
            | Register::FlashPcrop1er
            | Register::FlashWrp1ar
            | Register::FlashWrp1br
            | Register::FlashPcrop2sr
            | Register::FlashPcrop2er
            | Register::FlashWrp2ar
            | Register::FlashWrp2br => {
                if self.control & cr::OPTLOCK == 0 {
                    self.registers.insert(register, value);
                }
            }
            Register::DbgmcuIdcode | Register::FlashSize => {}
            _ => {
                self.registers.insert(register, value);
            }
        }
    }

    fn read_memory(&self, address: u32) -> u8 {
        let (memory, offset) = self.locate(address).expect("read outside memory");
        memory[offset]
    }

    fn write_memory(&mut self, address: u32, word: u32) {
        self.unsynced = true;
        if self.control & (cr::LOCK | cr::PG) != cr::PG {
            self.raise(sr::PGSERR);
            return;
        }

        match self.pending.take() {
            None if address % 8 == 0 => self.pending = Some((address, word)),
            None => self.raise(sr::PGAERR),
            Some((first, low)) if address == first + 4 => {
                self.program_double_word(first, low, word)
            }
            Some(_) => self.raise(sr::PGAERR),
        }
    }

    fn barrier(&mut self) {
        self.barriers += 1;
        self.unsynced = false;
    }
}
