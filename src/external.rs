//! Loaders for memories on the QSPI/OSPI interface.
//!
//! The board support code that talks to the memory is not part of this crate; it comes in
//! through [ExternalMemory]. The boards differ in how they want to be (re)initialized and
//! when memory mapped mode has to be restored, which is captured in a [Profile].

use core::fmt::Debug;

use log::{debug, warn};

use crate::{Error, FlashLoader, Result};

/// Where the external memories are mapped
pub const EXTERNAL_BASE: u32 = 0x9000_0000;

/// The bits of an address that select a location in the external memory
pub const ADDRESS_MASK: u32 = 0x0FFF_FFFF;

const READ_CHUNK: usize = 64;

/// The board support driver of an external memory.
/// Offsets are relative to the start of the memory.
pub trait ExternalMemory {
    /// The errors of the driver
    type Error: Debug;

    /// Initialize the interface and the memory
    fn init(&mut self) -> core::result::Result<(), Self::Error>;
    /// Release the interface
    fn deinit(&mut self) -> core::result::Result<(), Self::Error>;
    /// Switch the interface to memory mapped mode
    fn enable_memory_mapped(&mut self) -> core::result::Result<(), Self::Error>;
    /// Start erasing the complete memory
    fn erase_chip(&mut self) -> core::result::Result<(), Self::Error>;
    /// Start erasing the block that contains the offset
    fn erase_block(&mut self, offset: u32) -> core::result::Result<(), Self::Error>;
    /// Write data, waiting until it has been programmed
    fn write(&mut self, offset: u32, data: &[u8]) -> core::result::Result<(), Self::Error>;
    /// Read data
    fn read(&mut self, offset: u32, buffer: &mut [u8]) -> core::result::Result<(), Self::Error>;
    /// Is the memory still busy with an erase
    fn is_busy(&mut self) -> core::result::Result<bool, Self::Error>;
}

/// How a board wants its memory to be initialized before an access
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Reinit {
    /// Call init again
    Init,
    /// Deinit first, then init
    Cycle,
}

/// When memory mapped mode is restored after erasing
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Remap {
    /// After every erased block
    AfterEachBlock,
    /// Once the whole range has been erased
    AfterErase,
}

/// The properties of a memory on a board
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Profile {
    /// Name of the memory and board
    pub name: &'static str,
    /// Size of the memory in bytes
    pub size: u32,
    /// Size of an erase block
    pub block_size: u32,
    /// How to initialize before an access
    pub reinit: Reinit,
    /// When to restore memory mapped mode
    pub remap: Remap,
    /// NOR flash needs erasing, PSRAM doesn't
    pub erasable: bool,
}

/// N25Q128A QSPI NOR flash on the STM32L476G-DISCO
pub const N25Q128A: Profile = Profile {
    name: "N25Q128A_STM32L476G-Disco",
    size: 0x0100_0000,
    block_size: 0x1_0000,
    reinit: Reinit::Init,
    remap: Remap::AfterErase,
    erasable: true,
};

/// MX25LM51245G OSPI NOR flash on the STM32L4R9I-DK and STM32L4P5G-DK
pub const MX25LM51245G: Profile = Profile {
    name: "MX25LM51245G_STM32L4R9I-DK",
    size: 0x0400_0000,
    block_size: 0x1_0000,
    reinit: Reinit::Cycle,
    remap: Remap::AfterEachBlock,
    erasable: true,
};

/// APS6408L OSPI PSRAM on the STM32L4P5G-DK and STM32L4R9I-DISCO
pub const APS6408L: Profile = Profile {
    name: "STM32L4P5G-DK_PSRAM",
    size: 0x0080_0000,
    block_size: 0x0080_0000,
    reinit: Reinit::Cycle,
    remap: Remap::AfterErase,
    erasable: false,
};

/// A loader for an external memory
pub struct ExternalLoader<E: ExternalMemory> {
    memory: E,
    profile: Profile,
}

fn driver<T, E: Debug>(result: core::result::Result<T, E>) -> Result<T> {
    result.map_err(|error| {
        warn!("External memory driver failed: {:?}", error);
        Error::External
    })
}

impl<E: ExternalMemory> ExternalLoader<E> {
    /// Initialize the memory and leave it memory mapped
    pub fn init(mut memory: E, profile: Profile) -> Result<Self> {
        debug!("Init {}", profile.name);

        driver(memory.init())?;
        driver(memory.enable_memory_mapped())?;

        Ok(Self { memory, profile })
    }

    /// The driver
    pub fn memory(&self) -> &E {
        &self.memory
    }

    fn reinit(&mut self) -> Result<()> {
        if self.profile.reinit == Reinit::Cycle {
            driver(self.memory.deinit())?;
        }
        driver(self.memory.init())
    }

    fn wait_idle(&mut self) -> Result<()> {
        while driver(self.memory.is_busy())? {}
        Ok(())
    }

    /// Turn an address into an offset in the memory and check that the range fits
    fn offset(&self, address: u32, length: usize) -> Result<u32> {
        let offset = address & ADDRESS_MASK;
        let fits = u32::try_from(length)
            .ok()
            .and_then(|length| offset.checked_add(length))
            .map_or(false, |end| end <= self.profile.size);

        if fits {
            Ok(offset)
        } else {
            Err(Error::OutOfRange(address))
        }
    }

    /// Erase every block from the one holding `start` up to and including the one
    /// holding `end`
    pub fn erase_range(&mut self, start: u32, end: u32) -> Result<()> {
        if !self.profile.erasable {
            return Ok(());
        }

        let first = self.offset(start, 1)?;
        let last = self.offset(end, 1)?;
        debug!("Erase {:#010X}..={:#010X}", first, last);

        self.reinit()?;

        let mut block = first - first % self.profile.block_size;
        while block <= last {
            driver(self.memory.erase_block(block))?;
            self.wait_idle()?;

            if self.profile.remap == Remap::AfterEachBlock {
                driver(self.memory.enable_memory_mapped())?;
            }

            block += self.profile.block_size;
        }

        if self.profile.remap == Remap::AfterErase {
            driver(self.memory.enable_memory_mapped())?;
        }

        Ok(())
    }
}

impl<E: ExternalMemory> FlashLoader for ExternalLoader<E> {
    fn uninit(&mut self) -> Result<()> {
        Ok(())
    }

    fn erase_chip(&mut self) -> Result<()> {
        if !self.profile.erasable {
            return Ok(());
        }
        debug!("Erase chip {}", self.profile.name);

        self.reinit()?;
        driver(self.memory.erase_chip())?;
        self.wait_idle()
    }

    fn erase_sector(&mut self, address: u32) -> Result<()> {
        self.erase_range(address, address)
    }

    fn program_page(&mut self, address: u32, data: &[u8]) -> Result<()> {
        let offset = self.offset(address, data.len())?;
        debug!("Program {} bytes at {:#010X}", data.len(), offset);

        self.reinit()?;
        driver(self.memory.write(offset, data))
    }

    fn blank_check(&mut self, address: u32, size: u32, pattern: u8) -> Result<()> {
        let mut offset = self.offset(address, size as usize)?;
        let end = offset + size;
        let mut buffer = [0; READ_CHUNK];

        while offset < end {
            let length = READ_CHUNK.min((end - offset) as usize);
            let chunk = &mut buffer[..length];
            driver(self.memory.read(offset, chunk))?;

            if chunk.iter().any(|byte| *byte != pattern) {
                return Err(Error::NotBlank);
            }
            offset += length as u32;
        }

        Ok(())
    }

    fn verify(&mut self, address: u32, data: &[u8]) -> core::result::Result<(), u32> {
        let offset = self.offset(address, data.len()).map_err(|_| address)?;
        let mut buffer = [0; READ_CHUNK];

        for (index, expected) in data.chunks(READ_CHUNK).enumerate() {
            let position = (index * READ_CHUNK) as u32;
            let actual = &mut buffer[..expected.len()];
            if self.memory.read(offset + position, actual).is_err() {
                return Err(address + position);
            }

            if let Some(mismatch) = actual.iter().zip(expected).position(|(a, e)| a != e) {
                return Err(address + position + mismatch as u32);
            }
        }

        Ok(())
    }
}
