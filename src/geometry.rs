//! Translation of flash addresses to the bank and page numbers the controller erases.
//!
//! The L4 family always uses 2 KiB pages. Parts that can run in dual bank mode number the
//! pages per bank, and because a page number of 256 or more spills into the bank select
//! bit, the upper half of the array always lands in bank 2, whatever the `DUALBANK` option
//! says. Banks are never smaller than 64 KiB, so the 64 KiB parts keep all of their pages
//! in bank 1. The L4+ family changes the page size with the bank mode: 4 KiB pages in dual bank
//! mode and 8 KiB pages in single bank mode.

use log::debug;
use num_enum::TryFromPrimitive;

use crate::registers::{cr, optr, Mmio, Register};
use crate::{Error, Result};

/// Start of the main flash memory
pub const FLASH_START: u32 = 0x0800_0000;

const L4_PAGE_SIZE: u32 = 0x800;
const L4_MIN_BANK_SIZE: u32 = 0x1_0000;
const L4_PLUS_DUAL_BANK_PAGE_SIZE: u32 = 0x1000;
const L4_PLUS_SINGLE_BANK_PAGE_SIZE: u32 = 0x2000;
const MAX_PAGES_PER_BANK: u32 = 256;
const ONE_MEGABYTE: u32 = 0x10_0000;

/// The device identification in `DBGMCU_IDCODE`
#[allow(missing_docs)]
#[repr(u16)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, TryFromPrimitive)]
pub enum DeviceId {
    Stm32L47x = 0x415,
    Stm32L43x = 0x435,
    Stm32L49x = 0x461,
    Stm32L45x = 0x462,
    Stm32L41x = 0x464,
    Stm32L4Rx = 0x470,
    Stm32L4Px = 0x471,
}

impl DeviceId {
    /// Reads the identification register. Unknown devices give `None`.
    pub fn read(mmio: &impl Mmio) -> Option<Self> {
        let id = (mmio.read(Register::DbgmcuIdcode) & 0xFFF) as u16;
        Self::try_from(id).ok()
    }

    /// These parts only have a single bank
    pub fn is_single_bank_only(self) -> bool {
        matches!(
            self,
            DeviceId::Stm32L43x | DeviceId::Stm32L45x | DeviceId::Stm32L41x
        )
    }
}

/// The flash controller variant the loader is built for
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Family {
    /// STM32L47x/L48x/L49x/L4Ax/L43x/L44x/L45x/L46x/L41x/L42x with the given flash size
    Stm32L4 {
        /// The size of the flash memory in bytes
        size: u32,
    },
    /// STM32L4Rx/L4Sx/L4Px/L4Qx, the size is read from the chip
    Stm32L4Plus,
}

/// One of the two flash banks
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Bank {
    /// Bank 1, also the only bank in single bank mode
    First,
    /// Bank 2
    Second,
}

/// The page an address belongs to, in the numbering of the control register
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PageAddress {
    /// The bank of the page
    pub bank: Bank,
    /// The page number within the bank
    pub page: u32,
}

impl PageAddress {
    /// The control register value that selects this page for erasing
    pub fn control_bits(&self) -> u32 {
        let bank = match self.bank {
            Bank::First => 0,
            Bank::Second => cr::BKER,
        };

        cr::PER | ((self.page << cr::PNB_SHIFT) & cr::PNB_MASK) | bank
    }
}

/// The layout of the flash memory as the controller sees it
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Geometry {
    /// The first address of the flash memory
    pub base: u32,
    /// The size of the flash memory in bytes
    pub size: u32,
    /// The size of an erasable page
    pub page_size: u32,
    /// The size of a bank when pages are numbered per bank
    pub bank_size: Option<u32>,
}

impl Geometry {
    /// Work out the geometry from the family, the identification and the option registers
    pub fn detect(mmio: &impl Mmio, family: Family, base: u32) -> Self {
        let geometry = match family {
            Family::Stm32L4 { size } => {
                let dual_bank = DeviceId::read(mmio).map_or(true, |id| !id.is_single_bank_only());
                let bank_size = (size / 2).max(L4_MIN_BANK_SIZE);
                Self {
                    base: FLASH_START,
                    size,
                    page_size: L4_PAGE_SIZE,
                    bank_size: dual_bank.then_some(bank_size),
                }
            }
            Family::Stm32L4Plus => {
                let size = (mmio.read(Register::FlashSize) & 0xFFFF) << 10;
                let bank_mode = if size > ONE_MEGABYTE {
                    optr::DBANK
                } else {
                    optr::DB1M
                };

                if mmio.read(Register::FlashOptr) & bank_mode != 0 {
                    Self {
                        base,
                        size,
                        page_size: L4_PLUS_DUAL_BANK_PAGE_SIZE,
                        bank_size: Some(size / 2),
                    }
                } else {
                    Self {
                        base,
                        size,
                        page_size: L4_PLUS_SINGLE_BANK_PAGE_SIZE,
                        bank_size: None,
                    }
                }
            }
        };

        debug!("Flash geometry: {:?}", geometry);

        geometry
    }

    /// Are the pages numbered per bank
    pub fn is_dual_bank(&self) -> bool {
        self.bank_size.is_some()
    }

    /// Is the whole range `[address, address + length)` part of the flash memory
    pub fn contains(&self, address: u32, length: usize) -> bool {
        let Some(offset) = address.checked_sub(self.base) else {
            return false;
        };

        u32::try_from(length)
            .ok()
            .and_then(|length| offset.checked_add(length))
            .map_or(false, |end| end <= self.size)
    }

    /// Find the bank and page of an address
    pub fn locate(&self, address: u32) -> Result<PageAddress> {
        if !self.contains(address, 1) {
            return Err(Error::OutOfRange(address));
        }

        let offset = address - self.base;
        let (bank, offset) = match self.bank_size {
            Some(bank_size) if offset >= bank_size => (Bank::Second, offset - bank_size),
            _ => (Bank::First, offset),
        };

        let page = offset / self.page_size;
        if page >= MAX_PAGES_PER_BANK {
            return Err(Error::OutOfRange(address));
        }

        Ok(PageAddress { bank, page })
    }
}
