//! SPI transport for Raspberry Pi RC522 boards using the rppal crate

use crate::transport::RfidTransport;
use crate::types::RfidError;
use log::debug;
use rppal::gpio::{Gpio, OutputPin};
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};
use std::time::Duration;

/// MFRC522 on a Raspberry Pi SPI bus.
///
/// The SPI device and the reset pin are owned by the transport and released
/// when it is dropped; the reset pin returns to its previous mode.
pub struct SpiTransport {
    spi: Spi,
    _reset: Option<OutputPin>,
}

impl SpiTransport {
    pub fn new(
        bus: u8,
        slave_select: u8,
        clock_hz: u32,
        reset_pin: Option<u8>,
    ) -> Result<Self, RfidError> {
        let spi = Spi::new(
            Self::bus(bus)?,
            Self::slave_select(slave_select)?,
            clock_hz,
            Mode::Mode0,
        )
        .map_err(|e| RfidError::Transport(format!("{:?}", e)))?;

        let reset = match reset_pin {
            Some(pin) => Some(Self::hard_reset(pin)?),
            None => None,
        };
        debug!(
            "Opened SPI{} CE{} at {} Hz (reset pin {:?})",
            bus, slave_select, clock_hz, reset_pin
        );

        Ok(Self { spi, _reset: reset })
    }

    fn hard_reset(pin: u8) -> Result<OutputPin, RfidError> {
        let mut reset = Gpio::new()
            .and_then(|gpio| gpio.get(pin))
            .map_err(|e| RfidError::Transport(format!("{:?}", e)))?
            .into_output_low();
        std::thread::sleep(Duration::from_millis(1));
        reset.set_high();
        // Oscillator start-up
        std::thread::sleep(Duration::from_millis(50));
        Ok(reset)
    }

    fn bus(bus: u8) -> Result<Bus, RfidError> {
        match bus {
            0 => Ok(Bus::Spi0),
            1 => Ok(Bus::Spi1),
            2 => Ok(Bus::Spi2),
            3 => Ok(Bus::Spi3),
            4 => Ok(Bus::Spi4),
            5 => Ok(Bus::Spi5),
            6 => Ok(Bus::Spi6),
            other => Err(RfidError::InvalidParameter(format!("no SPI bus {}", other))),
        }
    }

    fn slave_select(ss: u8) -> Result<SlaveSelect, RfidError> {
        match ss {
            0 => Ok(SlaveSelect::Ss0),
            1 => Ok(SlaveSelect::Ss1),
            2 => Ok(SlaveSelect::Ss2),
            other => Err(RfidError::InvalidParameter(format!(
                "no SPI slave select {}",
                other
            ))),
        }
    }
}

impl RfidTransport for SpiTransport {
    type Error = rppal::spi::Error;

    fn read_register(&mut self, reg: u8) -> Result<u8, Self::Error> {
        let write = [((reg << 1) & 0x7E) | 0x80, 0x00];
        let mut read = [0u8; 2];
        self.spi.transfer(&mut read, &write)?;
        Ok(read[1])
    }

    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), Self::Error> {
        self.spi.write(&[(reg << 1) & 0x7E, value])?;
        Ok(())
    }
}
