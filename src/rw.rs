use embedded_hal::i2c::{Error as _, ErrorKind};
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{I2c, SevenBitAddress};

/// Attempts made for every bus exchange before the error is surfaced.
pub const RETRY_TIMES: usize = 10;
/// Back-off between two attempts.
pub const RETRY_DELAY_MS: u32 = 10;
/// Largest single write, command byte included.
pub const MAX_WRITE: usize = 128;

/// Addressed command exchanges with the controller.
///
/// Implementations retry each exchange internally up to a fixed bound and only
/// then return an error, so a hung bus shows up as a slow failure rather than a
/// stuck one. None of the operations can be cancelled mid-retry.
#[allow(async_fn_in_trait)]
pub trait Transport {
  type Error: core::fmt::Debug;

  /// Write `command`, then read `buf.len()` response bytes.
  async fn read(&mut self, command: u8, buf: &mut [u8]) -> Result<(), Self::Error>;

  /// Write `command` followed by `data`.
  async fn write(&mut self, command: u8, data: &[u8]) -> Result<(), Self::Error>;

  /// Write `data` as-is, without a leading command byte.
  async fn write_raw(&mut self, data: &[u8]) -> Result<(), Self::Error>;

  /// Issue a bare command.
  async fn command(&mut self, command: u8) -> Result<(), Self::Error> {
    self.write(command, &[]).await
  }
}

enum Op<'a> {
  WriteRead(&'a [u8], &'a mut [u8]),
  Write(&'a [u8]),
}

/// [`Transport`] over an `embedded-hal-async` I²C bus.
pub struct I2cTransport<I, D> {
  i2c: I,
  delay: D,
  address: SevenBitAddress,
}

impl<I, D> I2cTransport<I, D>
where
  I: I2c<SevenBitAddress>,
  D: DelayNs,
{
  /// Wrap `i2c`, using `delay` for the retry back-off.
  pub fn new(i2c: I, delay: D, address: SevenBitAddress) -> Self {
    Self { i2c, delay, address }
  }

  /// Release the bus and the delay provider.
  pub fn into_inner(self) -> (I, D) {
    (self.i2c, self.delay)
  }

  async fn transfer(&mut self, mut op: Op<'_>) -> Result<(), ErrorKind> {
    let mut last = ErrorKind::Other;

    for _ in 0..RETRY_TIMES {
      let res = match &mut op {
        Op::WriteRead(w, r) => self.i2c.write_read(self.address, w, r).await,
        Op::Write(w) => self.i2c.write(self.address, w).await,
      };

      match res {
        Ok(()) => return Ok(()),
        Err(e) => last = e.kind(),
      }
      self.delay.delay_ms(RETRY_DELAY_MS).await;
    }

    error!("i2c transfer retry over {}", RETRY_TIMES);
    Err(last)
  }
}

impl<I, D> Transport for I2cTransport<I, D>
where
  I: I2c<SevenBitAddress>,
  D: DelayNs,
{
  type Error = ErrorKind;

  async fn read(&mut self, command: u8, buf: &mut [u8]) -> Result<(), ErrorKind> {
    self.transfer(Op::WriteRead(&[command], buf)).await
  }

  async fn write(&mut self, command: u8, data: &[u8]) -> Result<(), ErrorKind> {
    let len = data.len();
    if len >= MAX_WRITE {
      return Err(ErrorKind::Other);
    }
    let mut buf = [0u8; MAX_WRITE];
    buf[0] = command;
    buf[1..=len].copy_from_slice(data);
    self.transfer(Op::Write(&buf[..=len])).await
  }

  async fn write_raw(&mut self, data: &[u8]) -> Result<(), ErrorKind> {
    if data.len() > MAX_WRITE {
      return Err(ErrorKind::Other);
    }
    self.transfer(Op::Write(data)).await
  }
}
