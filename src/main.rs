//! `rfid-capture` - wait for an RFID tag and store its identifier.

use clap::Parser;
use log::{debug, info};

use rfid_capture::cli::Cli;
use rfid_capture::config::{Backend, Config};
use rfid_capture::{CancelToken, Error, TagSource, capture_and_store, init_logging};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let _logger = init_logging(cli.verbosity())?;

    let mut config = Config::load_from(cli.config.clone())?;
    cli.apply(&mut config);
    config.validate()?;
    debug!("Configuration: {:?}", config);

    let mut reader = open_reader(&config)?;
    let cancel = match config.timeout() {
        Some(timeout) => CancelToken::with_timeout(timeout),
        None => CancelToken::new(),
    };

    println!("Present a tag to the reader...");
    let id = capture_and_store(&mut reader, &config.output, &cancel)?;
    println!("{id}");
    info!("Capture complete");

    Ok(())
}

fn open_reader(config: &Config) -> Result<Box<dyn TagSource>, Error> {
    match config.reader.backend {
        Backend::Spi => open_spi(config),
        Backend::Serial => open_serial(config),
    }
}

#[cfg(feature = "rpi")]
fn open_spi(config: &Config) -> Result<Box<dyn TagSource>, Error> {
    use rfid_capture::{Mfrc522, SpiTransport};

    let spi = &config.reader.spi;
    let transport = SpiTransport::new(spi.bus, spi.slave_select, spi.clock_hz, spi.reset_pin)?;
    let reader = Mfrc522::new(transport)?.with_poll_interval(config.poll_interval());
    Ok(Box::new(reader))
}

#[cfg(not(feature = "rpi"))]
fn open_spi(_config: &Config) -> Result<Box<dyn TagSource>, Error> {
    Err(Error::BackendDisabled(Backend::Spi.name()))
}

#[cfg(feature = "serial")]
fn open_serial(config: &Config) -> Result<Box<dyn TagSource>, Error> {
    use rfid_capture::{Mfrc522, RfidError, SerialTransport};

    let serial = &config.reader.serial;
    let transport = SerialTransport::new(&serial.port, serial.baud_rate)
        .map_err(|e| RfidError::Transport(format!("{}: {:?}", serial.port, e)))?;
    let reader = Mfrc522::new(transport)?.with_poll_interval(config.poll_interval());
    Ok(Box::new(reader))
}

#[cfg(not(feature = "serial"))]
fn open_serial(_config: &Config) -> Result<Box<dyn TagSource>, Error> {
    Err(Error::BackendDisabled(Backend::Serial.name()))
}
