#![doc = include_str!("../README.md")]
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]

pub mod controller;
pub mod descriptions;
pub mod error;
pub mod external;
pub mod geometry;
pub mod onchip;
pub mod option_bytes;
pub mod otp;
pub mod registers;
pub mod watchdog;

#[cfg(feature = "target")]
mod target;
#[cfg(feature = "target")]
pub use target::Target;

#[cfg(test)]
mod emulator;

pub use error::{Error, FlashError, Result};

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// The function code the host passes to `Init` and `UnInit`
#[repr(u32)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
pub enum Function {
    /// The host is going to erase
    Erase = 1,
    /// The host is going to program
    Program = 2,
    /// The host is going to verify
    Verify = 3,
}

/// The operations a loader offers to the host once it has been initialized.
///
/// Every loader is created by its own `init` function because each one needs different
/// collaborators (a register bus, a board driver). After that the host only ever uses
/// the calls below.
pub trait FlashLoader {
    /// Leave the memory locked and idle. Called once per `init`.
    fn uninit(&mut self) -> Result<()>;

    /// Erase the complete memory
    fn erase_chip(&mut self) -> Result<()>;

    /// Erase the sector that contains the given address
    fn erase_sector(&mut self, address: u32) -> Result<()>;

    /// Program the data at the given address.
    /// The sector must have been erased before.
    fn program_page(&mut self, address: u32, data: &[u8]) -> Result<()>;

    /// Check if the range only contains `pattern`.
    ///
    /// [Error::NotBlank] tells the host that it needs to erase the range first.
    fn blank_check(&mut self, address: u32, size: u32, pattern: u8) -> Result<()>;

    /// Compare the memory with the data.
    /// On a mismatch the address of the first failing location is returned.
    fn verify(&mut self, address: u32, data: &[u8]) -> core::result::Result<(), u32>;
}
