use embedded_hal_async::i2c::{I2c, SevenBitAddress};
use embedded_hal_async::spi::{Operation, SpiDevice};

use crate::defs::Reg;

/// Register-addressed transport to the controller.
///
/// `read` writes the command bytes and then fills `buf`; `write` sends a raw
/// byte sequence whose first byte is the register address. Implementations
/// are expected to bound every transfer with their own bus timeout.
#[allow(async_fn_in_trait)]
pub trait Bus {
  type Error: core::fmt::Debug;

  async fn read(&mut self, cmd: &[u8], buf: &mut [u8]) -> Result<(), Self::Error>;

  async fn write(&mut self, data: &[u8]) -> Result<(), Self::Error>;

  /// Read a single register.
  async fn read_reg(&mut self, reg: u8) -> Result<u8, Self::Error> {
    let mut b = [0u8; 1];
    self.read(&[reg], &mut b).await?;
    Ok(b[0])
  }

  /// Write a single register.
  async fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), Self::Error> {
    self.write(&[reg, value]).await
  }
}

pub(crate) async fn read_reg<B: Bus>(bus: &mut B, reg: Reg) -> Result<u8, B::Error> {
  bus.read_reg(reg.into()).await
}

pub(crate) async fn write_reg<B: Bus>(bus: &mut B, reg: Reg, value: u8) -> Result<(), B::Error> {
  bus.write_reg(reg.into(), value).await
}

/// Default 7-bit address of FocalTech controllers.
pub const I2C_ADDR: u8 = 0x38;

/// [`Bus`] over an `embedded-hal-async` I²C peripheral.
pub struct I2cBus<I> {
  i2c: I,
  address: u8,
}

impl<I> I2cBus<I> {
  pub const fn new(i2c: I) -> Self {
    Self { i2c, address: I2C_ADDR }
  }

  pub const fn with_address(i2c: I, address: u8) -> Self {
    Self { i2c, address }
  }

  pub fn into_inner(self) -> I {
    self.i2c
  }
}

impl<I, E> Bus for I2cBus<I>
where
  I: I2c<SevenBitAddress, Error = E>,
  E: core::fmt::Debug,
{
  type Error = E;

  async fn read(&mut self, cmd: &[u8], buf: &mut [u8]) -> Result<(), E> {
    if cmd.is_empty() {
      self.i2c.read(self.address, buf).await
    } else {
      self.i2c.write_read(self.address, cmd, buf).await
    }
  }

  async fn write(&mut self, data: &[u8]) -> Result<(), E> {
    self.i2c.write(self.address, data).await
  }
}

/// [`Bus`] over an `embedded-hal-async` SPI device. Chip select framing is
/// left to the [`SpiDevice`] implementation.
pub struct SpiBus<S> {
  spi: S,
}

impl<S> SpiBus<S> {
  pub const fn new(spi: S) -> Self {
    Self { spi }
  }

  pub fn into_inner(self) -> S {
    self.spi
  }
}

impl<S, E> Bus for SpiBus<S>
where
  S: SpiDevice<u8, Error = E>,
  E: core::fmt::Debug,
{
  type Error = E;

  async fn read(&mut self, cmd: &[u8], buf: &mut [u8]) -> Result<(), E> {
    self.spi.transaction(&mut [Operation::Write(cmd), Operation::Read(buf)]).await
  }

  async fn write(&mut self, data: &[u8]) -> Result<(), E> {
    self.spi.write(data).await
  }
}
