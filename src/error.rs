//! Errors of the loaders and their translation to the codes the host expects

use core::fmt;
use core::num::NonZeroU32;

use crate::registers::sr;

/// Result type used by all the loaders
pub type Result<T> = core::result::Result<T, Error>;

/// An error flag the flash controller raised in its status register.
///
/// When several flags are set at once, the first one in declaration order is reported.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FlashError {
    /// OPERR: an erase or program operation could not be performed
    Operation,
    /// PROGERR: the double word to program was not erased and the data was not all zero
    Programming,
    /// WRPERR: the address is protected by WRP or PCROP, or the read protection forbids access
    WriteProtection,
    /// PGAERR: the double word was not aligned, or the second word did not belong to it
    Alignment,
    /// SIZERR: something other than a word was written to the flash array
    Size,
    /// PGSERR: the programming or erase sequence was not respected
    Sequence,
    /// MISSERR: fast programming did not receive the next double word in time
    DataMiss,
    /// FASTERR: fast programming was interrupted
    FastProgramming,
    /// RDERR: a PCROP protected area was read
    ReadProtection,
    /// OPTVERR: the option bytes loaded at reset were not valid
    OptionValidity,
}

impl FlashError {
    const ALL: [FlashError; 10] = [
        FlashError::Operation,
        FlashError::Programming,
        FlashError::WriteProtection,
        FlashError::Alignment,
        FlashError::Size,
        FlashError::Sequence,
        FlashError::DataMiss,
        FlashError::FastProgramming,
        FlashError::ReadProtection,
        FlashError::OptionValidity,
    ];

    /// The status register flag of this error
    pub const fn flag(self) -> u32 {
        match self {
            FlashError::Operation => sr::OPERR,
            FlashError::Programming => sr::PROGERR,
            FlashError::WriteProtection => sr::WRPERR,
            FlashError::Alignment => sr::PGAERR,
            FlashError::Size => sr::SIZERR,
            FlashError::Sequence => sr::PGSERR,
            FlashError::DataMiss => sr::MISSERR,
            FlashError::FastProgramming => sr::FASTERR,
            FlashError::ReadProtection => sr::RDERR,
            FlashError::OptionValidity => sr::OPTVERR,
        }
    }

    /// Decodes the status register. Returns `None` if no error flag is set.
    pub fn from_status(status: u32) -> Option<Self> {
        Self::ALL.iter().copied().find(|error| status & error.flag() != 0)
    }
}

/// The errors the loaders report to the host
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Error {
    /// The flash control register stayed locked after the key sequence
    Locked,
    /// The option bytes stayed locked after the option key sequence
    OptionsLocked,
    /// The flash controller raised an error flag
    Flash(FlashError),
    /// The address does not belong to the memory handled by the loader
    OutOfRange(u32),
    /// The address is not aligned to a double word
    Unaligned(u32),
    /// The range holds something else than the erased pattern
    NotBlank,
    /// The loader does not support this operation
    Unsupported,
    /// The host gave less data than the operation needs
    BufferTooShort {
        /// The amount of bytes needed
        expected: usize,
        /// The amount of bytes given
        actual: usize,
    },
    /// The external memory driver failed
    External,
}

impl Error {
    /// The non-zero value returned to the host.
    ///
    /// Flash controller errors carry the raw status flag in the low bits so they can be
    /// told apart in a debugger.
    pub fn code(&self) -> NonZeroU32 {
        let raw = match self {
            Error::Locked => 1,
            Error::OptionsLocked => 2,
            Error::OutOfRange(_) => 3,
            Error::Unaligned(_) => 4,
            Error::NotBlank => 5,
            Error::Unsupported => 6,
            Error::BufferTooShort { .. } => 7,
            Error::External => 8,
            Error::Flash(error) => 0x8000_0000 | error.flag(),
        };

        NonZeroU32::new(raw).unwrap_or(NonZeroU32::MIN)
    }
}

impl From<FlashError> for Error {
    fn from(error: FlashError) -> Self {
        Error::Flash(error)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Locked => write!(f, "flash stayed locked"),
            Error::OptionsLocked => write!(f, "option bytes stayed locked"),
            Error::Flash(error) => write!(f, "flash controller error: {:?}", error),
            Error::OutOfRange(address) => write!(f, "address {:#010X} is out of range", address),
            Error::Unaligned(address) => {
                write!(f, "address {:#010X} is not double word aligned", address)
            }
            Error::NotBlank => write!(f, "memory is not blank"),
            Error::Unsupported => write!(f, "operation not supported"),
            Error::BufferTooShort { expected, actual } => {
                write!(f, "buffer too short: {} bytes given, {} needed", actual, expected)
            }
            Error::External => write!(f, "external memory driver failed"),
        }
    }
}
