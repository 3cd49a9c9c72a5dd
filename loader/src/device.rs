//! Picks the memory the algorithm is built for, based on the enabled feature

use stm32l4_flash::descriptions::{self, DeviceDescription};
use stm32l4_flash::{Function, Result, Target};

#[cfg(any(
    feature = "stm32l4x-1024",
    feature = "stm32l4x-512",
    feature = "stm32l4x-256",
    feature = "stm32l4x-128",
    feature = "stm32l4x-64",
))]
mod selected {
    use super::*;
    use stm32l4_flash::geometry::Family;
    use stm32l4_flash::onchip::OnChipFlash;

    pub type Loader = OnChipFlash<Target>;

    pub fn init(address: u32, clock: u32, function: Function) -> Result<Loader> {
        let family = Family::Stm32L4 {
            size: DESCRIPTION.size,
        };
        OnChipFlash::init(Target, family, address, clock, function)
    }
}

#[cfg(any(
    feature = "stm32l4rx-2048-db",
    feature = "stm32l4rx-2048-sb",
    feature = "stm32l4rx-1024-db",
    feature = "stm32l4rx-1024-sb",
    feature = "stm32l4px-1024-db",
    feature = "stm32l4px-1024-sb",
    feature = "stm32l4px-512-db",
    feature = "stm32l4px-512-sb",
))]
mod selected {
    use super::*;
    use stm32l4_flash::geometry::Family;
    use stm32l4_flash::onchip::OnChipFlash;

    pub type Loader = OnChipFlash<Target>;

    pub fn init(address: u32, clock: u32, function: Function) -> Result<Loader> {
        OnChipFlash::init(Target, Family::Stm32L4Plus, address, clock, function)
    }
}

#[cfg(feature = "stm32l4x-otp")]
mod selected {
    use super::*;
    use stm32l4_flash::otp::Otp;

    pub type Loader = Otp<Target>;

    pub fn init(address: u32, clock: u32, function: Function) -> Result<Loader> {
        Otp::init(Target, address, clock, function)
    }
}

#[cfg(any(feature = "stm32l4x-opt-sb", feature = "stm32l4x-opt-db"))]
mod selected {
    use super::*;
    use stm32l4_flash::option_bytes::{Layout, OptionBytes};

    pub type Loader = OptionBytes<Target>;

    #[cfg(feature = "stm32l4x-opt-sb")]
    const LAYOUT: Layout = Layout::SingleBank;
    #[cfg(feature = "stm32l4x-opt-db")]
    const LAYOUT: Layout = Layout::DualBank;

    pub fn init(address: u32, clock: u32, function: Function) -> Result<Loader> {
        OptionBytes::init(Target, LAYOUT, address, clock, function)
    }
}

pub use selected::{init, Loader};

#[cfg(feature = "stm32l4x-1024")]
pub const DESCRIPTION: DeviceDescription = descriptions::STM32L4X_1024;
#[cfg(feature = "stm32l4x-512")]
pub const DESCRIPTION: DeviceDescription = descriptions::STM32L4X_512;
#[cfg(feature = "stm32l4x-256")]
pub const DESCRIPTION: DeviceDescription = descriptions::STM32L4X_256;
#[cfg(feature = "stm32l4x-128")]
pub const DESCRIPTION: DeviceDescription = descriptions::STM32L4X_128;
#[cfg(feature = "stm32l4x-64")]
pub const DESCRIPTION: DeviceDescription = descriptions::STM32L4X_64;
#[cfg(feature = "stm32l4x-otp")]
pub const DESCRIPTION: DeviceDescription = descriptions::STM32L4X_OTP;
#[cfg(feature = "stm32l4x-opt-sb")]
pub const DESCRIPTION: DeviceDescription = descriptions::STM32L4X_OPTIONS_SINGLE_BANK;
#[cfg(feature = "stm32l4x-opt-db")]
pub const DESCRIPTION: DeviceDescription = descriptions::STM32L4X_OPTIONS_DUAL_BANK;
#[cfg(feature = "stm32l4rx-2048-db")]
pub const DESCRIPTION: DeviceDescription = descriptions::STM32L4RX_2048_DUAL_BANK;
#[cfg(feature = "stm32l4rx-2048-sb")]
pub const DESCRIPTION: DeviceDescription = descriptions::STM32L4RX_2048_SINGLE_BANK;
#[cfg(feature = "stm32l4rx-1024-db")]
pub const DESCRIPTION: DeviceDescription = descriptions::STM32L4RX_1024_DUAL_BANK;
#[cfg(feature = "stm32l4rx-1024-sb")]
pub const DESCRIPTION: DeviceDescription = descriptions::STM32L4RX_1024_SINGLE_BANK;
#[cfg(feature = "stm32l4px-1024-db")]
pub const DESCRIPTION: DeviceDescription = descriptions::STM32L4PX_1024_DUAL_BANK;
#[cfg(feature = "stm32l4px-1024-sb")]
pub const DESCRIPTION: DeviceDescription = descriptions::STM32L4PX_1024_SINGLE_BANK;
#[cfg(feature = "stm32l4px-512-db")]
pub const DESCRIPTION: DeviceDescription = descriptions::STM32L4PX_512_DUAL_BANK;
#[cfg(feature = "stm32l4px-512-sb")]
pub const DESCRIPTION: DeviceDescription = descriptions::STM32L4PX_512_SINGLE_BANK;
