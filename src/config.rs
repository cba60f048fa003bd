//! Attach-time configuration.
//!
//! A [`Config`] is a plain `Copy` value assembled with the `with_*` helpers and
//! handed to [`Hx8526a::attach`](crate::Hx8526a::attach). Nothing in it is sent
//! to the controller directly: the axis ranges and the protocol variant go to
//! the [`InputSink`](crate::InputSink), the remaining fields steer the driver.

/// Inclusive value range reported for one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Range {
  pub min: u16,
  pub max: u16,
}

impl Range {
  pub const fn new(min: u16, max: u16) -> Self {
    Self { min, max }
  }
}

/// Platform geometry used to configure the input sink once at attach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Axes {
  pub x: Range,
  pub y: Range,
  pub pressure: Range,
  pub width: Range,
}

impl Axes {
  pub const fn new(x: Range, y: Range, pressure: Range, width: Range) -> Self {
    Self { x, y, pressure, width }
  }
}

impl Default for Axes {
  fn default() -> Self {
    Self::new(Range::new(0, 1023), Range::new(0, 1023), Range::new(0, 255), Range::new(0, 255))
  }
}

/// Multi-touch notification primitive the input sink should use.
///
/// Selected once per attachment from what the host supports. The contact
/// transitions delivered to the sink are identical either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Protocol {
  /// Legacy single-slot reporting: every contact is re-sent each frame, frames
  /// are delimited by a sync.
  Anonymous,
  /// Persistent per-slot reporting.
  #[default]
  Slotted,
}

/// Timing of the poll-driven trigger, used when no data-ready line is wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PollTiming {
  /// Delay before the first poll after attach.
  pub initial_delay_ms: u32,
  /// Delay between the end of one cycle and the next poll.
  pub interval_ms: u32,
}

impl PollTiming {
  pub const fn new(initial_delay_ms: u32, interval_ms: u32) -> Self {
    Self { initial_delay_ms, interval_ms }
  }
}

impl Default for PollTiming {
  fn default() -> Self {
    Self::new(1000, 20)
  }
}

/// Complete driver configuration.
///
/// # Example
/// ```no_run
/// use hx8526a::{Axes, Config, Protocol, Range};
///
/// let axes = Axes::new(Range::new(0, 1037), Range::new(0, 1788), Range::new(0, 255), Range::new(0, 255));
/// let config = Config::default()
///   .with_axes(axes)
///   .with_protocol(Protocol::Anonymous)
///   .with_cable_config([0x90, 0x00]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
  pub axes: Axes,
  pub protocol: Protocol,
  pub poll: PollTiming,
  /// Keep the data-ready line armed through suspend instead of powering the
  /// sensor down (double-tap-to-wake).
  pub wake_gesture: bool,
  /// Persisted cable configuration: byte 0 selects the register, byte 1 carries
  /// the connection flag. `None` when the board has no cable handling.
  pub cable_config: Option<[u8; 2]>,
  /// Initial control-plane verbosity, see [`DebugLevel`](crate::DebugLevel).
  pub debug_level: u8,
}

impl Config {
  pub const fn new(
    axes: Axes,
    protocol: Protocol,
    poll: PollTiming,
    wake_gesture: bool,
    cable_config: Option<[u8; 2]>,
    debug_level: u8,
  ) -> Self {
    Self { axes, protocol, poll, wake_gesture, cable_config, debug_level }
  }

  pub const fn with_axes(mut self, axes: Axes) -> Self {
    self.axes = axes;
    self
  }

  pub const fn with_protocol(mut self, protocol: Protocol) -> Self {
    self.protocol = protocol;
    self
  }

  pub const fn with_poll(mut self, poll: PollTiming) -> Self {
    self.poll = poll;
    self
  }

  pub const fn with_wake_gesture(mut self, enabled: bool) -> Self {
    self.wake_gesture = enabled;
    self
  }

  pub const fn with_cable_config(mut self, config: [u8; 2]) -> Self {
    self.cable_config = Some(config);
    self
  }

  pub const fn with_debug_level(mut self, level: u8) -> Self {
    self.debug_level = level;
    self
  }
}

impl Default for Config {
  fn default() -> Self {
    Self::new(Axes::default(), Protocol::default(), PollTiming::default(), false, None, 0)
  }
}
