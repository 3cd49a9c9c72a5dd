//! Static descriptions of every memory a loader can be built for.
//! The host reads these to know where the memory is, how it is split into sectors and how
//! long the operations may take.

use crate::external::{self, Profile, EXTERNAL_BASE};
use crate::geometry::FLASH_START;
use crate::option_bytes::{Layout, OPTION_BYTES_START};
use crate::otp::{OTP_SIZE, OTP_START};

/// Where the memory is
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DeviceKind {
    /// Inside the microcontroller
    OnChip,
    /// Behind the SPI interface
    ExtSpi,
}

/// A run of equally sized sectors, starting at `address` (relative to the device start) and
/// lasting until the next run or the end of the device
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct SectorDescription {
    /// The size of each sector
    pub size: u32,
    /// The offset of the first sector
    pub address: u32,
}

/// Everything the host needs to know about a memory
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DeviceDescription {
    /// Name shown by the host
    pub name: &'static str,
    /// On chip or external
    pub kind: DeviceKind,
    /// First address
    pub start: u32,
    /// Size in bytes
    pub size: u32,
    /// The most the host passes to a single program call
    pub page_size: u32,
    /// The value of erased memory
    pub empty: u8,
    /// Program page timeout in milliseconds
    pub program_timeout: u32,
    /// Erase sector timeout in milliseconds
    pub erase_timeout: u32,
    /// The sector layout
    pub sectors: &'static [SectorDescription],
}

impl DeviceDescription {
    /// Does the address belong to the device
    pub fn contains(&self, address: u32) -> bool {
        address
            .checked_sub(self.start)
            .map_or(false, |offset| offset < self.size)
    }

    /// The start address of the sector that holds the address
    pub fn sector_containing(&self, address: u32) -> Option<u32> {
        if !self.contains(address) {
            return None;
        }

        let offset = address - self.start;
        let run = self
            .sectors
            .iter()
            .take_while(|sector| sector.address <= offset)
            .last()?;

        let sector = run.address + (offset - run.address) / run.size * run.size;
        Some(self.start + sector)
    }

    /// The amount of sectors
    pub fn sector_count(&self) -> u32 {
        self.sectors
            .iter()
            .enumerate()
            .map(|(index, sector)| {
                let end = self
                    .sectors
                    .get(index + 1)
                    .map_or(self.size, |next| next.address);
                (end - sector.address) / sector.size
            })
            .sum()
    }
}

const fn sectors_of(size: u32) -> [SectorDescription; 1] {
    [SectorDescription { size, address: 0 }]
}

const SECTORS_2K: [SectorDescription; 1] = sectors_of(0x800);
const SECTORS_4K: [SectorDescription; 1] = sectors_of(0x1000);
const SECTORS_8K: [SectorDescription; 1] = sectors_of(0x2000);
const SECTORS_OTP: [SectorDescription; 1] = sectors_of(OTP_SIZE);
const SECTORS_OPTIONS_SINGLE_BANK: [SectorDescription; 1] = sectors_of(20);
const SECTORS_OPTIONS_DUAL_BANK: [SectorDescription; 1] = sectors_of(36);
const SECTORS_64K: [SectorDescription; 1] = sectors_of(0x1_0000);
const SECTORS_PSRAM: [SectorDescription; 1] = sectors_of(external::APS6408L.size);

const fn main_flash(
    name: &'static str,
    size: u32,
    sectors: &'static [SectorDescription],
) -> DeviceDescription {
    DeviceDescription {
        name,
        kind: DeviceKind::OnChip,
        start: FLASH_START,
        size,
        page_size: 1024,
        empty: 0xFF,
        program_timeout: 400,
        erase_timeout: 400,
        sectors,
    }
}

const fn option_bytes(
    name: &'static str,
    layout: Layout,
    sectors: &'static [SectorDescription],
) -> DeviceDescription {
    let size = match layout {
        Layout::SingleBank => 20,
        Layout::DualBank => 36,
    };

    DeviceDescription {
        name,
        kind: DeviceKind::OnChip,
        start: OPTION_BYTES_START,
        size,
        page_size: size,
        empty: 0xFF,
        program_timeout: 3000,
        erase_timeout: 3000,
        sectors,
    }
}

const fn external_memory(
    profile: Profile,
    sectors: &'static [SectorDescription],
) -> DeviceDescription {
    DeviceDescription {
        name: profile.name,
        kind: DeviceKind::ExtSpi,
        start: EXTERNAL_BASE,
        size: profile.size,
        page_size: 0x1000,
        empty: 0xFF,
        program_timeout: 10000,
        erase_timeout: 6000,
        sectors,
    }
}

/// STM32L4xx with 1 MiB
pub const STM32L4X_1024: DeviceDescription =
    main_flash("STM32L4xx 1MB Flash", 0x10_0000, &SECTORS_2K);
/// STM32L4xx with 512 KiB
pub const STM32L4X_512: DeviceDescription =
    main_flash("STM32L4xx 512 KB Flash", 0x8_0000, &SECTORS_2K);
/// STM32L4xx with 256 KiB
pub const STM32L4X_256: DeviceDescription =
    main_flash("STM32L4xx 256 KB Flash", 0x4_0000, &SECTORS_2K);
/// STM32L4xx with 128 KiB
pub const STM32L4X_128: DeviceDescription =
    main_flash("STM32L4xx 128 KB Flash", 0x2_0000, &SECTORS_2K);
/// STM32L4xx with 64 KiB
pub const STM32L4X_64: DeviceDescription =
    main_flash("STM32L4xx 64 KB Flash", 0x1_0000, &SECTORS_2K);

/// The OTP area of the STM32L4xx
pub const STM32L4X_OTP: DeviceDescription = DeviceDescription {
    name: "STM32L4xx Flash OTP",
    kind: DeviceKind::OnChip,
    start: OTP_START,
    size: OTP_SIZE,
    page_size: 1024,
    empty: 0xFF,
    program_timeout: 3000,
    erase_timeout: 3000,
    sectors: &SECTORS_OTP,
};

/// The option bytes of a single bank STM32L4xx
pub const STM32L4X_OPTIONS_SINGLE_BANK: DeviceDescription = option_bytes(
    "STM32L4xx single bank Flash Options",
    Layout::SingleBank,
    &SECTORS_OPTIONS_SINGLE_BANK,
);
/// The option bytes of a dual bank STM32L4xx
pub const STM32L4X_OPTIONS_DUAL_BANK: DeviceDescription = option_bytes(
    "STM32L4xx dual bank Flash Options",
    Layout::DualBank,
    &SECTORS_OPTIONS_DUAL_BANK,
);

/// STM32L4Rx with 2 MiB in dual bank mode
pub const STM32L4RX_2048_DUAL_BANK: DeviceDescription =
    main_flash("STM32L4Rx 2MB Dual Bank Flash", 0x20_0000, &SECTORS_4K);
/// STM32L4Rx with 2 MiB in single bank mode
pub const STM32L4RX_2048_SINGLE_BANK: DeviceDescription =
    main_flash("STM32L4Rx 2MB Single Bank Flash", 0x20_0000, &SECTORS_8K);
/// STM32L4Rx with 1 MiB in dual bank mode
pub const STM32L4RX_1024_DUAL_BANK: DeviceDescription =
    main_flash("STM32L4Rx 1MB Dual Bank Flash", 0x10_0000, &SECTORS_4K);
/// STM32L4Rx with 1 MiB in single bank mode
pub const STM32L4RX_1024_SINGLE_BANK: DeviceDescription =
    main_flash("STM32L4Rx 1MB Single Bank Flash", 0x10_0000, &SECTORS_8K);

/// STM32L4Px with 1 MiB in dual bank mode
pub const STM32L4PX_1024_DUAL_BANK: DeviceDescription =
    main_flash("STM32L4Px 1MB Dual Bank Flash", 0x10_0000, &SECTORS_4K);
/// STM32L4Px with 1 MiB in single bank mode
pub const STM32L4PX_1024_SINGLE_BANK: DeviceDescription =
    main_flash("STM32L4Px 1MB Single Bank Flash", 0x10_0000, &SECTORS_8K);
/// STM32L4Px with 512 KiB in dual bank mode
pub const STM32L4PX_512_DUAL_BANK: DeviceDescription =
    main_flash("STM32L4Px 512kB Dual Bank Flash", 0x8_0000, &SECTORS_4K);
/// STM32L4Px with 512 KiB in single bank mode
pub const STM32L4PX_512_SINGLE_BANK: DeviceDescription =
    main_flash("STM32L4Px 512kB Single Bank Flash", 0x8_0000, &SECTORS_8K);

/// QSPI flash of the STM32L476G-DISCO
pub const N25Q128A: DeviceDescription = external_memory(external::N25Q128A, &SECTORS_64K);
/// OSPI flash of the STM32L4R9I-DK and STM32L4P5G-DK
pub const MX25LM51245G: DeviceDescription = external_memory(external::MX25LM51245G, &SECTORS_64K);
/// OSPI PSRAM of the STM32L4P5G-DK and STM32L4R9I-DISCO
pub const APS6408L: DeviceDescription = external_memory(external::APS6408L, &SECTORS_PSRAM);

/// Every description, for tools that want to list them
pub const ALL: [&DeviceDescription; 19] = [
    &STM32L4X_1024,
    &STM32L4X_512,
    &STM32L4X_256,
    &STM32L4X_128,
    &STM32L4X_64,
    &STM32L4X_OTP,
    &STM32L4X_OPTIONS_SINGLE_BANK,
    &STM32L4X_OPTIONS_DUAL_BANK,
    &STM32L4RX_2048_DUAL_BANK,
    &STM32L4RX_2048_SINGLE_BANK,
    &STM32L4RX_1024_DUAL_BANK,
    &STM32L4RX_1024_SINGLE_BANK,
    &STM32L4PX_1024_DUAL_BANK,
    &STM32L4PX_1024_SINGLE_BANK,
    &STM32L4PX_512_DUAL_BANK,
    &STM32L4PX_512_SINGLE_BANK,
    &N25Q128A,
    &MX25LM51245G,
    &APS6408L,
];
