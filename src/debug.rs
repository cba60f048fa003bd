//! Text control plane for bring-up and field debugging.
//!
//! Every request is a short ASCII command and every reply a fixed-capacity
//! [`heapless::String`], so the plane can sit behind whatever debug transport
//! the board offers (a shell, a USB CDC endpoint, RTT...).
//!
//! | Request                    | Effect                                            |
//! |----------------------------|---------------------------------------------------|
//! | `r:xCC\n`                  | latch command `CC` and read its 64-byte response |
//! | `w:xCC xDD xDD ...\n`      | latch command `CC` and write up to 100 bytes     |
//! | `d\n` (digit)              | set the debug verbosity                           |
//! | `1`..`6` / other           | select a diagnostic mode / turn it off            |
//! | `1` (reset)                | pulse the chip reset line                         |

use core::fmt::Write;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal_async::delay::DelayNs;
use heapless::{String, Vec};

use crate::diag::DiagnosticMode;
use crate::platform::Platform;
use crate::rw::Transport;
use crate::touchpad::InputSink;
use crate::touchscreen::Touchscreen;
use crate::{Error, Hx8526a};

/// Bytes read back for a latched register command.
pub const REGISTER_LEN: usize = 64;
/// Value bytes accepted by one register write.
pub const MAX_REGISTER_WRITE: usize = 100;

pub const REGISTER_TEXT_LEN: usize = 384;
pub const DIAG_TEXT_LEN: usize = 1536;
pub const LINE_TEXT_LEN: usize = 40;

/// Runtime verbosity, a single decimal digit.
///
/// Bit 0 dumps every raw frame, bit 1 logs each finger reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DebugLevel(u8);

impl DebugLevel {
  pub const fn new(level: u8) -> Self {
    Self(level)
  }

  pub const fn get(&self) -> u8 {
    self.0
  }

  pub const fn raw_frames(&self) -> bool {
    self.0 & 0x01 != 0
  }

  pub const fn fingers(&self) -> bool {
    self.0 & 0x02 != 0
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RegisterRequest {
  Read(u8),
  Write(u8, Vec<u8, MAX_REGISTER_WRITE>),
}

fn hex_byte(digits: &[u8]) -> Option<u8> {
  let digits = core::str::from_utf8(digits).ok()?;
  u8::from_str_radix(digits, 16).ok()
}

/// Parse `r:xCC\n` / `w:xCC xDD ...\n`.
///
/// Values sit in four-byte fields (` xDD`) after the command; the list ends at
/// the first field starting with a newline. Input without that newline is
/// rejected.
pub(crate) fn parse_register_request(input: &[u8]) -> Option<RegisterRequest> {
  let (&kind, rest) = input.split_first()?;
  if rest.get(..2)? != b":x" {
    return None;
  }
  let command = hex_byte(input.get(3..5)?)?;

  let mut values = Vec::new();
  let mut base = 5;
  loop {
    match input.get(base)? {
      b'\n' => break,
      _ if input.get(base + 1) == Some(&b'x') => {
        values.push(hex_byte(input.get(base + 2..base + 4)?)?).ok()?;
      }
      _ => {}
    }
    base += 4;
  }

  match kind {
    b'r' => Some(RegisterRequest::Read(command)),
    b'w' => Some(RegisterRequest::Write(command, values)),
    _ => None,
  }
}

pub(crate) fn format_register(command: u8, data: &[u8]) -> Result<String<REGISTER_TEXT_LEN>, core::fmt::Error> {
  let mut out = String::new();
  writeln!(out, "command: {:x}", command)?;
  for (i, byte) in data.iter().enumerate() {
    write!(out, "0x{:02X} ", byte)?;
    if i % 16 == 15 {
      out.push('\n').map_err(|_| core::fmt::Error)?;
    }
  }
  out.push('\n').map_err(|_| core::fmt::Error)?;
  Ok(out)
}

fn write_values(out: &mut String<DIAG_TEXT_LEN>, start: usize, values: &[i16]) -> core::fmt::Result {
  for (i, value) in values.iter().enumerate() {
    write!(out, "{:4}", value)?;
    if (start + i) % 15 == 14 {
      out.write_char('\n')?;
    }
  }
  Ok(())
}

pub(crate) fn format_diag(mode: DiagnosticMode, cells: &[i16], sums: &[i16]) -> Result<String<DIAG_TEXT_LEN>, core::fmt::Error> {
  let mut out = String::new();
  if mode.shows_cells() {
    write_values(&mut out, 0, cells)?;
  }
  if mode.shows_cells() && mode.shows_sums() {
    out.write_char('\n')?;
  }
  if mode.shows_sums() {
    write_values(&mut out, crate::diag::CELL_REGION, sums)?;
  }
  Ok(out)
}

impl<T: Transport, D, P, S> Hx8526a<T, D, P, S> {
  /// Read the response of the latched register command.
  pub async fn read_register(&mut self) -> Result<[u8; REGISTER_LEN], Error<T::Error>> {
    let mut data = [0u8; REGISTER_LEN];
    self.bus.read(self.register_command, &mut data).await.map_err(Error::Bus)?;
    Ok(data)
  }

  /// `r` only latches the command for the next dump; `w` latches it and
  /// writes the payload.
  pub(crate) async fn register_request(&mut self, request: RegisterRequest) -> Result<(), Error<T::Error>> {
    match request {
      RegisterRequest::Read(command) => {
        self.register_command = command;
        Ok(())
      }
      RegisterRequest::Write(command, values) => {
        self.register_command = command;
        self.bus.write(command, &values).await.map_err(Error::Bus)
      }
    }
  }
}

impl<T, D, P, S> Hx8526a<T, D, P, S> {
  pub const fn register_command(&self) -> u8 {
    self.register_command
  }

  pub const fn debug_level(&self) -> DebugLevel {
    self.debug_level
  }

  pub fn set_debug_level(&mut self, level: DebugLevel) {
    self.debug_level = level;
  }
}

/// Debug control plane borrowing a [`Touchscreen`].
pub struct ControlPlane<'a, M: RawMutex, T, D, P, S> {
  ts: &'a Touchscreen<M, T, D, P, S>,
}

impl<'a, M: RawMutex, T, D, P, S> ControlPlane<'a, M, T, D, P, S> {
  pub(crate) fn new(ts: &'a Touchscreen<M, T, D, P, S>) -> Self {
    Self { ts }
  }
}

impl<M, T, D, P, S> ControlPlane<'_, M, T, D, P, S>
where
  M: RawMutex,
  T: Transport,
  D: DelayNs,
  P: Platform,
  S: InputSink,
{
  /// Re-read the latched command and dump its 64 response bytes.
  pub async fn register(&self) -> Result<String<REGISTER_TEXT_LEN>, Error<T::Error>> {
    let mut chip = self.ts.lock().await;
    let command = chip.register_command();
    let data = chip.read_register().await?;
    format_register(command, &data).map_err(|_| Error::BufferOverflow)
  }

  pub async fn set_register(&self, input: &[u8]) -> Result<(), Error<T::Error>> {
    let request = parse_register_request(input).ok_or(Error::InvalidCommand)?;
    self.ts.lock().await.register_request(request).await
  }

  pub async fn debug_level(&self) -> Result<String<LINE_TEXT_LEN>, Error<T::Error>> {
    let level = self.ts.lock().await.debug_level();
    let mut out = String::new();
    writeln!(out, "{}", level.get()).map_err(|_| Error::BufferOverflow)?;
    Ok(out)
  }

  /// Accepts a single digit followed by a newline.
  pub async fn set_debug_level(&self, input: &[u8]) -> Result<(), Error<T::Error>> {
    let [digit, b'\n', ..] = input else {
      return Err(Error::InvalidCommand);
    };
    if !digit.is_ascii_digit() {
      return Err(Error::InvalidCommand);
    }
    self.ts.lock().await.set_debug_level(DebugLevel::new(digit - b'0'));
    Ok(())
  }

  pub async fn vendor(&self) -> Result<String<LINE_TEXT_LEN>, Error<T::Error>> {
    let version = self.ts.lock().await.info().firmware_version;
    let mut out = String::new();
    writeln!(out, "HX8526-A_{:#x}", version).map_err(|_| Error::BufferOverflow)?;
    Ok(out)
  }

  /// The diagnostic regions selected by the current level, empty when off.
  pub async fn diag(&self) -> Result<String<DIAG_TEXT_LEN>, Error<T::Error>> {
    let chip = self.ts.lock().await;
    let (cells, sums) = chip.diag_regions();
    format_diag(chip.diag_mode(), cells, sums).map_err(|_| Error::BufferOverflow)
  }

  pub async fn set_diag(&self, input: &[u8]) -> Result<(), Error<T::Error>> {
    let selector = input.first().copied().ok_or(Error::InvalidCommand)?;
    self.ts.lock().await.set_diag_mode(selector).await.map(|_| ())
  }

  pub async fn reset(&self) -> &'static str {
    if self.ts.reset_in_progress().await {
      "Resetting touch chip in progress.\n"
    } else {
      "Reset complete or not trigger yet.\n"
    }
  }

  /// `1` pulses the reset line; anything else is ignored.
  pub async fn trigger_reset(&self, input: &[u8]) -> Result<(), Error<T::Error>> {
    if input.first() != Some(&b'1') {
      return Ok(());
    }
    self.ts.reset_chip().await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::mock::{attached, BusOp, MockBus, MockDelay, MockPlatform, MockSink};
  use crate::Config;
  use embassy_futures::block_on;
  use embassy_sync::blocking_mutex::raw::NoopRawMutex;

  type Handle = Touchscreen<NoopRawMutex, MockBus, MockDelay, MockPlatform, MockSink>;

  fn handle() -> Handle {
    Touchscreen::new(attached(Config::default()))
  }

  #[test]
  fn read_request_is_parsed() {
    assert_eq!(parse_register_request(b"r:x31\n"), Some(RegisterRequest::Read(0x31)));
  }

  #[test]
  fn write_request_collects_values() {
    let request = parse_register_request(b"w:x36 x0F x53\n").unwrap();
    assert_eq!(request, RegisterRequest::Write(0x36, Vec::from_slice(&[0x0F, 0x53]).unwrap()));

    let request = parse_register_request(b"w:xD7\n").unwrap();
    assert_eq!(request, RegisterRequest::Write(0xD7, Vec::new()));
  }

  #[test]
  fn malformed_requests_are_rejected() {
    assert_eq!(parse_register_request(b"r:x31"), None);
    assert_eq!(parse_register_request(b"w:x36 x0F"), None);
    assert_eq!(parse_register_request(b"q:x31\n"), None);
    assert_eq!(parse_register_request(b"r;x31\n"), None);
    assert_eq!(parse_register_request(b"r:xZZ\n"), None);
    assert_eq!(parse_register_request(b""), None);
  }

  #[test]
  fn write_payload_is_capped() {
    let mut input: Vec<u8, 512> = Vec::from_slice(b"w:x10").unwrap();
    for _ in 0..=MAX_REGISTER_WRITE {
      input.extend_from_slice(b" x01").unwrap();
    }
    input.push(b'\n').unwrap();

    assert_eq!(parse_register_request(&input), None);
  }

  #[test]
  fn register_dump_layout() {
    let data: [u8; REGISTER_LEN] = core::array::from_fn(|i| i as u8);
    let text = format_register(0x31, &data).unwrap();

    let mut lines = text.split('\n');
    assert_eq!(lines.next(), Some("command: 31"));
    assert_eq!(lines.next(), Some("0x00 0x01 0x02 0x03 0x04 0x05 0x06 0x07 0x08 0x09 0x0A 0x0B 0x0C 0x0D 0x0E 0x0F "));
    assert_eq!(text.matches("0x").count(), REGISTER_LEN);
    assert!(text.ends_with("0x3F \n\n"));
  }

  #[test]
  fn diag_layout_per_level() {
    let cells: [i16; 16] = core::array::from_fn(|i| i as i16);
    let sums = [-5i16, 7];

    let both = format_diag(DiagnosticMode::RawBaseline(1), &cells, &sums).unwrap();
    assert_eq!(
      both.as_str(),
      "   0   1   2   3   4   5   6   7   8   9  10  11  12  13  14\n  15\n  -5   7"
    );

    let cells_only = format_diag(DiagnosticMode::RawOnly(4), &cells[..2], &sums).unwrap();
    assert_eq!(cells_only.as_str(), "   0   1");

    let sums_only = format_diag(DiagnosticMode::RawBaseline(5), &cells, &sums).unwrap();
    assert_eq!(sums_only.as_str(), "  -5   7");

    assert!(format_diag(DiagnosticMode::Off, &cells, &sums).unwrap().is_empty());
  }

  #[test]
  fn full_diag_dump_fits() {
    let values = [-20479i16; 150];
    assert!(format_diag(DiagnosticMode::RawBaseline(1), &values, &values[..50]).is_ok());
  }

  #[test]
  fn register_write_then_read_back() {
    let ts = handle();
    let control = ts.control();

    block_on(control.set_register(b"w:x36 x0F x53\n")).unwrap();
    let text = block_on(control.register()).unwrap();

    assert!(text.starts_with("command: 36\n0x10 0x11 "));
    let chip = ts.into_inner();
    assert_eq!(chip.bus.ops[0], BusOp::write(0x36, &[0x0F, 0x53]));
    assert_eq!(chip.bus.ops[1], BusOp::Read(0x36, REGISTER_LEN));
  }

  #[test]
  fn read_request_latches_without_bus_traffic() {
    let ts = handle();
    let control = ts.control();

    block_on(control.set_register(b"r:x5A\n")).unwrap();
    assert_eq!(block_on(ts.lock()).register_command(), 0x5A);
    assert!(block_on(ts.lock()).bus.ops.is_empty());

    let text = block_on(control.register()).unwrap();
    assert!(text.starts_with("command: 5a\n"));
    let chip = ts.into_inner();
    assert_eq!(chip.bus.ops.len(), 1);
    assert_eq!(chip.bus.ops[0], BusOp::Read(0x5A, REGISTER_LEN));
  }

  #[test]
  fn malformed_register_request_has_no_effect() {
    let ts = handle();

    assert_eq!(block_on(ts.control().set_register(b"w:x36 x0F")), Err(Error::InvalidCommand));

    assert!(block_on(ts.lock()).bus.ops.is_empty());
  }

  #[test]
  fn debug_level_accepts_a_digit_and_newline() {
    let ts = handle();
    let control = ts.control();

    block_on(control.set_debug_level(b"3\n")).unwrap();
    assert_eq!(block_on(control.debug_level()).unwrap().as_str(), "3\n");
    assert!(block_on(ts.lock()).debug_level().fingers());

    assert_eq!(block_on(control.set_debug_level(b"3")), Err(Error::InvalidCommand));
    assert_eq!(block_on(control.set_debug_level(b"a\n")), Err(Error::InvalidCommand));
    assert_eq!(block_on(control.debug_level()).unwrap().as_str(), "3\n");
  }

  #[test]
  fn vendor_string_carries_firmware_version() {
    let ts = handle();
    assert_eq!(block_on(ts.control().vendor()).unwrap().as_str(), "HX8526-A_0x1c\n");
  }

  #[test]
  fn diag_selector_switches_mode() {
    let ts = handle();
    let control = ts.control();

    block_on(control.set_diag(b"6")).unwrap();
    assert_eq!(block_on(ts.lock()).diag_mode(), DiagnosticMode::RawOnly(6));
    let zeros = block_on(control.diag()).unwrap();
    assert_eq!(zeros.matches("   0").count(), 25);

    block_on(control.set_diag(b"0")).unwrap();
    assert!(block_on(control.diag()).unwrap().is_empty());
    assert_eq!(block_on(control.set_diag(b"")), Err(Error::InvalidCommand));
  }

  #[test]
  fn reset_status_text() {
    let ts = handle();
    let control = ts.control();
    assert_eq!(block_on(control.reset()), "Reset complete or not trigger yet.\n");

    block_on(ts.lock()).bus.push_frame(&[0u8; 24]);
    ts.acquisition().trigger();
    block_on(ts.service());

    assert_eq!(block_on(control.reset()), "Resetting touch chip in progress.\n");
    assert_eq!(block_on(control.trigger_reset(b"1")), Err(Error::ResetInProgress));
    assert_eq!(block_on(control.trigger_reset(b"0")), Ok(()));
  }
}
