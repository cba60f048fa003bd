//! Host-side doubles for the driver's collaborators.

use embedded_hal::i2c::ErrorKind;
use embedded_hal_async::delay::DelayNs;
use heapless::{Deque, Vec};

use crate::config::{Axes, Config, Protocol};
use crate::event::DIAG_FRAME_LEN;
use crate::platform::Platform;
use crate::reg::Reg;
use crate::rw::Transport;
use crate::touchpad::{InputSink, Touch};
use crate::Hx8526a;

/// Command byte the mock platform writes while "loading" the sensor table.
pub(crate) const CONFIG_MARKER: u8 = 0xF0;

/// Delay that only accumulates the requested time.
#[derive(Debug, Default)]
pub(crate) struct MockDelay {
  pub total_us: u32,
}

impl DelayNs for MockDelay {
  async fn delay_ns(&mut self, ns: u32) {
    self.total_us += ns / 1000;
  }

  async fn delay_us(&mut self, us: u32) {
    self.total_us += us;
  }

  async fn delay_ms(&mut self, ms: u32) {
    self.total_us += ms * 1000;
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum BusOp {
  Read(u8, usize),
  Write(u8, Vec<u8, 16>),
  Raw(Vec<u8, 16>),
}

impl BusOp {
  pub fn write(command: u8, data: &[u8]) -> Self {
    BusOp::Write(command, Vec::from_slice(data).unwrap())
  }

  pub fn raw(data: &[u8]) -> Self {
    BusOp::Raw(Vec::from_slice(data).unwrap())
  }
}

/// Scripted transport.
///
/// Event-stack reads pop `frames`; an empty queue answers with a lift frame.
/// Register reads return `register_fill` with the byte index added.
#[derive(Debug)]
pub(crate) struct MockBus {
  pub frames: Deque<[u8; DIAG_FRAME_LEN], 16>,
  pub ops: Vec<BusOp, 64>,
  pub firmware_id: [u8; 3],
  pub firmware_version: u8,
  pub channels: [u8; 2],
  pub register_fill: u8,
  /// Every operation fails.
  pub fail: bool,
  /// Only operations addressed to this command fail.
  pub fail_command: Option<u8>,
}

impl Default for MockBus {
  fn default() -> Self {
    Self {
      frames: Deque::new(),
      ops: Vec::new(),
      firmware_id: [0x85, 0x26, 0x0A],
      firmware_version: 0x1C,
      channels: [10, 15],
      register_fill: 0x10,
      fail: false,
      fail_command: None,
    }
  }
}

impl MockBus {
  pub fn push_frame(&mut self, frame: &[u8]) {
    let mut full = [0u8; DIAG_FRAME_LEN];
    full[..frame.len()].copy_from_slice(frame);
    self.frames.push_back(full).unwrap();
  }

  pub fn event_reads(&self) -> usize {
    self.ops.iter().filter(|op| matches!(op, BusOp::Read(c, _) if *c == u8::from(Reg::EventStack))).count()
  }

  pub fn config_loads(&self) -> usize {
    self.ops.iter().filter(|op| matches!(op, BusOp::Write(c, _) if *c == CONFIG_MARKER)).count()
  }

  fn check(&self, command: u8) -> Result<(), ErrorKind> {
    if self.fail || self.fail_command == Some(command) {
      Err(ErrorKind::Other)
    } else {
      Ok(())
    }
  }

  fn log(&mut self, op: BusOp) {
    // Long register dumps are not interesting to the tests.
    let _ = self.ops.push(op);
  }
}

impl Transport for MockBus {
  type Error = ErrorKind;

  async fn read(&mut self, command: u8, buf: &mut [u8]) -> Result<(), ErrorKind> {
    self.log(BusOp::Read(command, buf.len()));
    self.check(command)?;

    match command {
      c if c == u8::from(Reg::EventStack) => {
        let frame = self.frames.pop_front().unwrap_or_else(|| {
          let mut lift = [0u8; DIAG_FRAME_LEN];
          lift[20] = 0xFF;
          lift[21] = 0xFF;
          lift
        });
        buf.copy_from_slice(&frame[..buf.len()]);
      }
      c if c == u8::from(Reg::FirmwareId) => buf.copy_from_slice(&self.firmware_id[..buf.len()]),
      c if c == u8::from(Reg::FirmwareVersion) => buf[0] = self.firmware_version,
      c if c == u8::from(Reg::ChannelCount) => buf.copy_from_slice(&self.channels[..buf.len()]),
      _ => {
        for (i, b) in buf.iter_mut().enumerate() {
          *b = self.register_fill.wrapping_add(i as u8);
        }
      }
    }
    Ok(())
  }

  async fn write(&mut self, command: u8, data: &[u8]) -> Result<(), ErrorKind> {
    let mut logged = Vec::new();
    let _ = logged.extend_from_slice(&data[..data.len().min(16)]);
    self.log(BusOp::Write(command, logged));
    self.check(command)
  }

  async fn write_raw(&mut self, data: &[u8]) -> Result<(), ErrorKind> {
    self.log(BusOp::raw(data));
    self.check(data.first().copied().unwrap_or_default())
  }
}

/// Platform that "loads" its configuration by issuing [`CONFIG_MARKER`].
#[derive(Debug, Default)]
pub(crate) struct MockPlatform {
  pub reset_line: bool,
  pub resets: usize,
}

impl Platform for MockPlatform {
  async fn load_sensor_config<T: Transport>(&mut self, bus: &mut T) -> Result<(), T::Error> {
    bus.command(CONFIG_MARKER).await
  }

  fn has_reset(&self) -> bool {
    self.reset_line
  }

  async fn reset(&mut self) {
    self.resets += 1;
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SinkEvent {
  Touch(Touch),
  Sync,
}

#[derive(Debug, Default)]
pub(crate) struct MockSink {
  pub configured: Option<(Axes, Protocol)>,
  pub events: Vec<SinkEvent, 64>,
}

impl MockSink {
  pub fn touches(&self) -> impl Iterator<Item = &Touch> {
    self.events.iter().filter_map(|e| match e {
      SinkEvent::Touch(t) => Some(t),
      SinkEvent::Sync => None,
    })
  }

  pub fn syncs(&self) -> usize {
    self.events.iter().filter(|e| matches!(e, SinkEvent::Sync)).count()
  }
}

impl InputSink for MockSink {
  fn configure(&mut self, axes: &Axes, protocol: Protocol) {
    self.configured = Some((*axes, protocol));
  }

  fn report(&mut self, touch: Touch) {
    self.events.push(SinkEvent::Touch(touch)).unwrap();
  }

  fn sync(&mut self) {
    self.events.push(SinkEvent::Sync).unwrap();
  }
}

pub(crate) type MockChip = Hx8526a<MockBus, MockDelay, MockPlatform, MockSink>;

/// Attach a chip over a default mock bus and clear the attach traffic.
pub(crate) fn attached(config: Config) -> MockChip {
  attached_with(MockBus::default(), MockPlatform::default(), config)
}

pub(crate) fn attached_with(bus: MockBus, platform: MockPlatform, config: Config) -> MockChip {
  let mut chip = embassy_futures::block_on(Hx8526a::attach(bus, MockDelay::default(), platform, MockSink::default(), config))
    .unwrap();
  chip.bus.ops.clear();
  chip.delay.total_us = 0;
  chip
}

/// A normal-mode frame with the given fingers set, padded to a full frame.
pub(crate) fn finger_frame(fingers: &[(usize, u16, u16, u8)]) -> [u8; DIAG_FRAME_LEN] {
  let mut frame = [0u8; DIAG_FRAME_LEN];
  for &(slot, x, y, width) in fingers {
    frame[slot * 4..slot * 4 + 2].copy_from_slice(&x.to_be_bytes());
    frame[slot * 4 + 2..slot * 4 + 4].copy_from_slice(&y.to_be_bytes());
    frame[16 + slot] = width;
    frame[21] |= 1 << slot;
  }
  frame
}

pub(crate) fn ready_sentinel() -> [u8; DIAG_FRAME_LEN] {
  let mut frame = [0u8; DIAG_FRAME_LEN];
  frame[0] = 0xFF;
  frame
}

