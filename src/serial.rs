//! UART transport for MFRC522 boards wired to a serial port, using the serialport crate

use crate::transport::RfidTransport;
use std::io::{Read, Write};
use std::time::Duration;

pub struct SerialTransport {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialTransport {
    pub fn new(port_name: &str, baud_rate: u32) -> Result<Self, serialport::Error> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(Duration::from_millis(100))
            .open()?;
        port.clear(serialport::ClearBuffer::All)?;

        Ok(Self { port })
    }

    fn read_byte(&mut self) -> std::io::Result<u8> {
        let mut byte = [0u8; 1];
        self.port.read_exact(&mut byte)?;
        Ok(byte[0])
    }
}

impl RfidTransport for SerialTransport {
    type Error = std::io::Error;

    fn read_register(&mut self, reg: u8) -> Result<u8, Self::Error> {
        self.port.write_all(&[0x80 | (reg & 0x3F)])?;
        self.read_byte()
    }

    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), Self::Error> {
        let address = reg & 0x3F;
        self.port.write_all(&[address, value])?;
        // The chip acknowledges a write by echoing the address byte
        let echo = self.read_byte()?;
        if echo != address {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("register 0x{:02X} write echoed 0x{:02X}", address, echo),
            ));
        }
        Ok(())
    }
}
