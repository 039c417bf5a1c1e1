/// Trait for MFRC522 register access backends.
/// Implement this trait for different buses (SPI, UART, etc.)
pub trait RfidTransport {
    /// Error type for transport operations
    type Error: std::fmt::Debug;

    /// Read one chip register
    fn read_register(&mut self, reg: u8) -> Result<u8, Self::Error>;

    /// Write one chip register
    fn write_register(&mut self, reg: u8, value: u8) -> Result<(), Self::Error>;
}
