use log::{debug, trace, warn};
use std::time::Duration;

use crate::cancel::CancelToken;
use crate::transport::RfidTransport;
use crate::types::{RfidError, TagId, TagRead, Uid, bytes_to_text};

/// Factory default key A of a MIFARE Classic sector
pub const DEFAULT_KEY: [u8; 6] = [0xFF; 6];

/// Driver for the NXP MFRC522 reader IC
pub struct Mfrc522<T: RfidTransport> {
    transport: T,
    poll_interval: Duration,
}

impl<T: RfidTransport> Mfrc522<T> {
    // Registers
    const COMMAND_REG: u8 = 0x01;
    const COMM_IEN_REG: u8 = 0x02;
    const COMM_IRQ_REG: u8 = 0x04;
    const DIV_IRQ_REG: u8 = 0x05;
    const ERROR_REG: u8 = 0x06;
    const STATUS2_REG: u8 = 0x08;
    const FIFO_DATA_REG: u8 = 0x09;
    const FIFO_LEVEL_REG: u8 = 0x0A;
    const CONTROL_REG: u8 = 0x0C;
    const BIT_FRAMING_REG: u8 = 0x0D;
    const MODE_REG: u8 = 0x11;
    const TX_CONTROL_REG: u8 = 0x14;
    const TX_ASK_REG: u8 = 0x15;
    const CRC_RESULT_REG_H: u8 = 0x21;
    const CRC_RESULT_REG_L: u8 = 0x22;
    const T_MODE_REG: u8 = 0x2A;
    const T_PRESCALER_REG: u8 = 0x2B;
    const T_RELOAD_REG_H: u8 = 0x2C;
    const T_RELOAD_REG_L: u8 = 0x2D;
    const VERSION_REG: u8 = 0x37;

    // Chip commands
    const CMD_IDLE: u8 = 0x00;
    const CMD_CALC_CRC: u8 = 0x03;
    const CMD_TRANSCEIVE: u8 = 0x0C;
    const CMD_AUTHENT: u8 = 0x0E;
    const CMD_SOFT_RESET: u8 = 0x0F;

    // Tag commands
    const PICC_REQA: u8 = 0x26;
    const PICC_ANTICOLL_CL1: u8 = 0x93;
    const PICC_AUTH_KEY_A: u8 = 0x60;
    const PICC_READ: u8 = 0x30;

    // Register bits
    const POWER_DOWN: u8 = 0x10;
    const START_SEND: u8 = 0x80;
    const FLUSH_BUFFER: u8 = 0x80;
    const CRYPTO1_ON: u8 = 0x08;
    const CRC_IRQ: u8 = 0x04;
    const TIMER_IRQ: u8 = 0x01;
    const ANTENNA_ON: u8 = 0x03;
    const ERROR_MASK: u8 = 0x1B;
    const COLLISION_ERR: u8 = 0x08;

    const FIFO_SIZE: usize = 64;
    const IRQ_POLL_LIMIT: usize = 2000;
    const CRC_POLL_LIMIT: usize = 255;
    const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

    /// Sector 2 layout used for the tag's text payload
    const TEXT_BLOCKS: [u8; 3] = [8, 9, 10];
    const TEXT_TRAILER: u8 = 11;

    /// Reset and configure the chip behind `transport` and switch its antenna on
    pub fn new(transport: T) -> Result<Self, RfidError> {
        let mut reader = Self {
            transport,
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
        };
        reader.init()?;
        Ok(reader)
    }

    /// How long [`wait_for_tag`](Self::wait_for_tag) sleeps between polls
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Raw content of the version register (0x91 or 0x92 for genuine parts)
    pub fn version(&mut self) -> Result<u8, RfidError> {
        self.read(Self::VERSION_REG)
    }

    /// Send REQA and return the tag's ATQA
    pub fn request(&mut self) -> Result<[u8; 2], RfidError> {
        // REQA is a short frame of 7 bits
        self.write(Self::BIT_FRAMING_REG, 0x07)?;
        let (data, bits) = self.to_card(Self::CMD_TRANSCEIVE, &[Self::PICC_REQA])?;
        if bits != 16 || data.len() < 2 {
            return Err(length_mismatch_bits("ATQA", 16, bits));
        }
        Ok([data[0], data[1]])
    }

    /// Run cascade level 1 anticollision and return the UID answer
    pub fn anticollision(&mut self) -> Result<Uid, RfidError> {
        self.write(Self::BIT_FRAMING_REG, 0x00)?;
        let (data, _) = self.to_card(Self::CMD_TRANSCEIVE, &[Self::PICC_ANTICOLL_CL1, 0x20])?;
        if data.len() != 5 {
            return Err(length_mismatch_bytes("UID", 5, data.len()));
        }
        let uid = Uid([data[0], data[1], data[2], data[3], data[4]]);
        if !uid.is_valid() {
            return Err(RfidError::InvalidResponse(format!(
                "UID check byte mismatch: {:02X?}",
                uid.0
            )));
        }
        Ok(uid)
    }

    /// Select the tag with `uid` and return its SAK
    pub fn select(&mut self, uid: &Uid) -> Result<u8, RfidError> {
        let mut frame = vec![Self::PICC_ANTICOLL_CL1, 0x70];
        frame.extend_from_slice(&uid.0);
        self.append_crc(&mut frame)?;
        let (data, bits) = self.to_card(Self::CMD_TRANSCEIVE, &frame)?;
        if bits != 24 || data.is_empty() {
            return Err(length_mismatch_bits("SAK", 24, bits));
        }
        Ok(data[0])
    }

    /// Authenticate `block` with key A
    pub fn authenticate(&mut self, block: u8, key: &[u8; 6], uid: &Uid) -> Result<(), RfidError> {
        let mut frame = vec![Self::PICC_AUTH_KEY_A, block];
        frame.extend_from_slice(key);
        frame.extend_from_slice(uid.serial());
        self.to_card(Self::CMD_AUTHENT, &frame)?;

        if self.read(Self::STATUS2_REG)? & Self::CRYPTO1_ON == 0 {
            return Err(RfidError::Authentication(block));
        }
        Ok(())
    }

    /// Leave the authenticated state
    pub fn stop_crypto(&mut self) -> Result<(), RfidError> {
        self.clear_bits(Self::STATUS2_REG, Self::CRYPTO1_ON)
    }

    /// Read one 16-byte block of an authenticated sector
    pub fn read_block(&mut self, block: u8) -> Result<[u8; 16], RfidError> {
        let mut frame = vec![Self::PICC_READ, block];
        self.append_crc(&mut frame)?;
        let (data, _) = self.to_card(Self::CMD_TRANSCEIVE, &frame)?;
        if data.len() < 16 {
            return Err(length_mismatch_bytes("block", 16, data.len()));
        }
        let mut out = [0u8; 16];
        out.copy_from_slice(&data[..16]);
        Ok(out)
    }

    /// Identifier of the tag in range, if any
    pub fn read_id_no_block(&mut self) -> Result<Option<TagId>, RfidError> {
        let Some(uid) = self.detect()? else {
            return Ok(None);
        };
        Ok(Some(TagId::from_uid(&uid)))
    }

    /// Identifier and text payload of the tag in range, if any
    pub fn read_no_block(&mut self) -> Result<Option<TagRead>, RfidError> {
        let Some(uid) = self.detect()? else {
            return Ok(None);
        };
        let id = TagId::from_uid(&uid);

        if let Err(e) = self.select(&uid) {
            if e.is_fatal() {
                return Err(e);
            }
            debug!("Select failed for {}: {}", id, e);
        }

        let text = match self.read_text(&uid) {
            Ok(text) => text,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                debug!("No text payload for {}: {}", id, e);
                String::new()
            }
        };
        self.stop_crypto()?;

        Ok(Some(TagRead { id, text }))
    }

    /// Block until a tag is presented and return its identifier
    pub fn wait_for_id(&mut self, cancel: &CancelToken) -> Result<TagId, RfidError> {
        self.wait(cancel, Self::read_id_no_block)
    }

    /// Block until a tag is presented and return its identifier and payload
    pub fn wait_for_tag(&mut self, cancel: &CancelToken) -> Result<TagRead, RfidError> {
        self.wait(cancel, Self::read_no_block)
    }

    fn wait<R>(
        &mut self,
        cancel: &CancelToken,
        mut poll: impl FnMut(&mut Self) -> Result<Option<R>, RfidError>,
    ) -> Result<R, RfidError> {
        loop {
            if cancel.is_cancelled() {
                debug!("Wait for tag cancelled");
                return Err(RfidError::Cancelled);
            }
            if let Some(found) = poll(self)? {
                return Ok(found);
            }
            std::thread::sleep(self.poll_interval);
        }
    }

    /// REQA followed by anticollision; air interface misses mean no tag
    fn detect(&mut self) -> Result<Option<Uid>, RfidError> {
        match self.request().and_then(|_| self.anticollision()) {
            Ok(uid) => Ok(Some(uid)),
            Err(e) if e.is_fatal() => Err(e),
            Err(RfidError::NoTag) => Ok(None),
            Err(e) => {
                debug!("Tag detection failed: {}", e);
                Ok(None)
            }
        }
    }

    fn read_text(&mut self, uid: &Uid) -> Result<String, RfidError> {
        self.authenticate(Self::TEXT_TRAILER, &DEFAULT_KEY, uid)?;

        let mut data = Vec::with_capacity(16 * Self::TEXT_BLOCKS.len());
        for block in Self::TEXT_BLOCKS {
            match self.read_block(block) {
                Ok(bytes) => data.extend_from_slice(&bytes),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => debug!("Skipping block {}: {}", block, e),
            }
        }
        Ok(bytes_to_text(&data))
    }

    fn init(&mut self) -> Result<(), RfidError> {
        self.write(Self::COMMAND_REG, Self::CMD_SOFT_RESET)?;
        std::thread::sleep(Duration::from_millis(50));
        let mut powered = false;
        for _ in 0..3 {
            if self.read(Self::COMMAND_REG)? & Self::POWER_DOWN == 0 {
                powered = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        if !powered {
            warn!("Reader still in power down after soft reset");
        }

        // Timer: TAuto, ~25 ms timeout per frame
        self.write(Self::T_MODE_REG, 0x8D)?;
        self.write(Self::T_PRESCALER_REG, 0x3E)?;
        self.write(Self::T_RELOAD_REG_L, 30)?;
        self.write(Self::T_RELOAD_REG_H, 0)?;
        // Force 100% ASK
        self.write(Self::TX_ASK_REG, 0x40)?;
        // CRC preset 0x6363
        self.write(Self::MODE_REG, 0x3D)?;
        self.antenna_on()?;

        let version = self.version()?;
        match version {
            0x00 | 0xFF => return Err(RfidError::NotDetected(version)),
            0x91 | 0x92 => debug!("MFRC522 version 0x{:02X}", version),
            other => warn!("Unknown reader version 0x{:02X}, continuing", other),
        }
        Ok(())
    }

    fn antenna_on(&mut self) -> Result<(), RfidError> {
        let value = self.read(Self::TX_CONTROL_REG)?;
        if value & Self::ANTENNA_ON != Self::ANTENNA_ON {
            self.write(Self::TX_CONTROL_REG, value | Self::ANTENNA_ON)?;
        }
        Ok(())
    }

    fn antenna_off(&mut self) -> Result<(), RfidError> {
        self.clear_bits(Self::TX_CONTROL_REG, Self::ANTENNA_ON)
    }

    /// Execute a chip command against the FIFO and collect the tag's answer.
    ///
    /// Returns the received bytes and the number of valid bits.
    fn to_card(&mut self, command: u8, data: &[u8]) -> Result<(Vec<u8>, usize), RfidError> {
        let (irq_en, wait_irq) = if command == Self::CMD_AUTHENT {
            (0x12, 0x10)
        } else if command == Self::CMD_TRANSCEIVE {
            (0x77, 0x30)
        } else {
            (0x00, 0x00)
        };
        trace!("Command 0x{:02X} with {:02X?}", command, data);

        self.write(Self::COMM_IEN_REG, irq_en | 0x80)?;
        self.write(Self::COMM_IRQ_REG, 0x7F)?;
        self.write(Self::FIFO_LEVEL_REG, Self::FLUSH_BUFFER)?;
        self.write(Self::COMMAND_REG, Self::CMD_IDLE)?;
        for &b in data {
            self.write(Self::FIFO_DATA_REG, b)?;
        }
        self.write(Self::COMMAND_REG, command)?;
        if command == Self::CMD_TRANSCEIVE {
            self.set_bits(Self::BIT_FRAMING_REG, Self::START_SEND)?;
        }

        let mut completed = false;
        for _ in 0..Self::IRQ_POLL_LIMIT {
            let irq = self.read(Self::COMM_IRQ_REG)?;
            if irq & wait_irq != 0 {
                completed = true;
                break;
            }
            if irq & Self::TIMER_IRQ != 0 {
                self.clear_bits(Self::BIT_FRAMING_REG, Self::START_SEND)?;
                return Err(RfidError::NoTag);
            }
        }
        self.clear_bits(Self::BIT_FRAMING_REG, Self::START_SEND)?;
        if !completed {
            return Err(RfidError::Timeout);
        }

        let error = self.read(Self::ERROR_REG)?;
        if error & Self::ERROR_MASK != 0 {
            return Err(if error & Self::COLLISION_ERR != 0 {
                RfidError::Collision
            } else {
                RfidError::Protocol(error)
            });
        }

        if command != Self::CMD_TRANSCEIVE {
            return Ok((Vec::new(), 0));
        }

        let level = usize::from(self.read(Self::FIFO_LEVEL_REG)?);
        let last_bits = usize::from(self.read(Self::CONTROL_REG)? & 0x07);
        let bits = if last_bits != 0 {
            level.saturating_sub(1) * 8 + last_bits
        } else {
            level * 8
        };

        let count = level.min(Self::FIFO_SIZE);
        let mut response = Vec::with_capacity(count);
        for _ in 0..count {
            response.push(self.read(Self::FIFO_DATA_REG)?);
        }
        trace!("Received {} bits: {:02X?}", bits, response);
        Ok((response, bits))
    }

    /// Append the CRC_A of `frame`, computed by the chip's coprocessor
    fn append_crc(&mut self, frame: &mut Vec<u8>) -> Result<(), RfidError> {
        self.write(Self::COMMAND_REG, Self::CMD_IDLE)?;
        self.write(Self::DIV_IRQ_REG, Self::CRC_IRQ)?;
        self.write(Self::FIFO_LEVEL_REG, Self::FLUSH_BUFFER)?;
        for &b in frame.iter() {
            self.write(Self::FIFO_DATA_REG, b)?;
        }
        self.write(Self::COMMAND_REG, Self::CMD_CALC_CRC)?;

        let mut done = false;
        for _ in 0..Self::CRC_POLL_LIMIT {
            if self.read(Self::DIV_IRQ_REG)? & Self::CRC_IRQ != 0 {
                done = true;
                break;
            }
        }
        self.write(Self::COMMAND_REG, Self::CMD_IDLE)?;
        if !done {
            return Err(RfidError::Timeout);
        }

        let low = self.read(Self::CRC_RESULT_REG_L)?;
        let high = self.read(Self::CRC_RESULT_REG_H)?;
        frame.push(low);
        frame.push(high);
        Ok(())
    }

    fn set_bits(&mut self, reg: u8, mask: u8) -> Result<(), RfidError> {
        let value = self.read(reg)?;
        self.write(reg, value | mask)
    }

    fn clear_bits(&mut self, reg: u8, mask: u8) -> Result<(), RfidError> {
        let value = self.read(reg)?;
        self.write(reg, value & !mask)
    }

    fn read(&mut self, reg: u8) -> Result<u8, RfidError> {
        self.transport
            .read_register(reg)
            .map_err(|e| RfidError::Transport(format!("{:?}", e)))
    }

    fn write(&mut self, reg: u8, value: u8) -> Result<(), RfidError> {
        self.transport
            .write_register(reg, value)
            .map_err(|e| RfidError::Transport(format!("{:?}", e)))
    }
}

impl<T: RfidTransport> Drop for Mfrc522<T> {
    fn drop(&mut self) {
        if let Err(e) = self.antenna_off() {
            warn!("Failed to switch reader antenna off: {}", e);
        }
    }
}

fn length_mismatch_bits(what: &str, expected: usize, got: usize) -> RfidError {
    RfidError::InvalidResponse(format!("{} should be {} bits, got {}", what, expected, got))
}

fn length_mismatch_bytes(what: &str, expected: usize, got: usize) -> RfidError {
    RfidError::InvalidResponse(format!("{} should be {} bytes, got {}", what, expected, got))
}
