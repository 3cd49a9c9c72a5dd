#![no_std]
#![no_main]

use flash_algorithm::*;
use log::{debug, warn};
use stm32l4_flash::FlashLoader;

mod device;
#[cfg(feature = "rtt")]
mod logger;

use device::DESCRIPTION;

struct Algorithm {
    loader: device::Loader,
}

algorithm!(Algorithm, {
    device_name: DESCRIPTION.name,
    device_type: DeviceType::Onchip,
    flash_address: DESCRIPTION.start,
    flash_size: DESCRIPTION.size,
    page_size: DESCRIPTION.page_size,
    empty_value: DESCRIPTION.empty,
    program_time_out: DESCRIPTION.program_timeout,
    erase_time_out: DESCRIPTION.erase_timeout,
    sectors: [{
        size: DESCRIPTION.sectors[0].size,
        address: DESCRIPTION.sectors[0].address,
    }]
});

impl FlashAlgorithm for Algorithm {
    fn new(address: u32, clock: u32, function: Function) -> Result<Self, ErrorCode> {
        // Nothing may interrupt the unlock and erase sequences
        cortex_m::interrupt::disable();

        #[cfg(feature = "rtt")]
        logger::init();

        let function = stm32l4_flash::Function::try_from(function as u32)
            .map_err(|_| stm32l4_flash::Error::Unsupported.code())?;
        debug!("Starting {} for {:?}", DESCRIPTION.name, function);

        let loader = device::init(address, clock, function).map_err(|error| error.code())?;

        Ok(Self { loader })
    }

    fn erase_all(&mut self) -> Result<(), ErrorCode> {
        self.loader.erase_chip().map_err(|error| error.code())
    }

    fn erase_sector(&mut self, address: u32) -> Result<(), ErrorCode> {
        self.loader
            .erase_sector(address)
            .map_err(|error| error.code())
    }

    fn program_page(&mut self, address: u32, data: &[u8]) -> Result<(), ErrorCode> {
        self.loader
            .program_page(address, data)
            .map_err(|error| error.code())
    }

    fn verify(&mut self, address: u32, size: u32, data: Option<&[u8]>) -> Result<(), u32> {
        let Some(data) = data else {
            return Ok(());
        };

        let length = data.len().min(size as usize);
        self.loader.verify(address, &data[..length])
    }

    fn blank_check(&mut self, address: u32, size: u32, pattern: u8) -> Result<(), ErrorCode> {
        self.loader
            .blank_check(address, size, pattern)
            .map_err(|error| error.code())
    }
}

impl Drop for Algorithm {
    fn drop(&mut self) {
        if let Err(error) = self.loader.uninit() {
            warn!("Uninit failed: {}", error);
        }
    }
}
