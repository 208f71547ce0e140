//! Register access to the controller.
//!
//! The driver only ever talks to the controller through [`RegisterBus`]: read or
//! write a whole buffer at a 16-bit register address. [`I2cBus`] implements it
//! on top of any blocking `embedded-hal` I2C peripheral.

use embedded_hal::i2c::{I2c, Operation, SevenBitAddress};

/// Default 7-bit I2C address of the controller.
pub const DEFAULT_I2C_ADDRESS: SevenBitAddress = 0x4A;

/// Register-oriented access to the controller.
///
/// Length is the contract: either the whole buffer is transferred or the call
/// fails. There are no partial transfers, no retries and no timeouts at this
/// level.
pub trait RegisterBus {
    /// Error reported by the underlying transport.
    type Error: core::fmt::Debug;

    /// Reads `buf.len()` bytes starting at `register`.
    fn read_register(&mut self, register: u16, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Writes `data` starting at `register`.
    fn write_register(&mut self, register: u16, data: &[u8]) -> Result<(), Self::Error>;
}

/// [`RegisterBus`] over a blocking I2C peripheral.
///
/// The register address goes out least-significant byte first, directly
/// followed by the payload for writes, or by a repeated-start read.
pub struct I2cBus<I2cType> {
    i2c: I2cType,
    address: SevenBitAddress,
}

impl<I2cType: I2c<SevenBitAddress>> I2cBus<I2cType> {
    /// Creates a new [`I2cBus`] for the controller at `address`.
    pub fn new(i2c: I2cType, address: SevenBitAddress) -> Self {
        Self { i2c, address }
    }

    /// Releases the I2C peripheral.
    pub fn release(self) -> I2cType {
        self.i2c
    }
}

impl<I2cType: I2c<SevenBitAddress>> RegisterBus for I2cBus<I2cType> {
    type Error = I2cType::Error;

    fn read_register(&mut self, register: u16, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.i2c
            .write_read(self.address, &register.to_le_bytes(), buf)
            .inspect_err(|err| {
                log::trace!("i2c read of {register:#06x} ({} bytes) failed: {err:?}", buf.len());
            })
    }

    fn write_register(&mut self, register: u16, data: &[u8]) -> Result<(), Self::Error> {
        // Adjacent writes go out as one transfer, no restart in between.
        let header = register.to_le_bytes();
        self.i2c
            .transaction(
                self.address,
                &mut [Operation::Write(&header), Operation::Write(data)],
            )
            .inspect_err(|err| {
                log::trace!(
                    "i2c write of {register:#06x} ({} bytes) failed: {err:?}",
                    data.len()
                );
            })
    }
}
