#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Async, `no_std` driver core for the Himax HX8526-A capacitive touchscreen
//! controller.
//!
//! The crate turns the controller's event-stack frames into multi-touch
//! contact transitions and keeps the controller alive through ESD / watchdog
//! resets, which silently wipe its configuration. It provides:
//!
//! - A frame decoder for the finger section and the raw / baseline diagnostic
//!   section of the event stack
//! - Checksum based reset detection with a configuration-reload recovery cycle
//! - A single-flight acquisition scheduler fed by the data-ready line or a poll
//!   timer, built on `embassy-sync` primitives
//! - Per-slot press / move / release tracking towards an [`InputSink`]
//! - Suspend / resume sequencing, cable-state handling and a debug control plane
//!
//! Bus access goes through the [`Transport`] trait; [`I2cTransport`] implements
//! it on top of `embedded-hal-async` 1.0 with the controller's retry budget.
//!
//! ```no_run
//! use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
//! use embedded_hal_async::{delay::DelayNs, digital::Wait, i2c::I2c};
//! use hx8526a::{Config, Hx8526a, I2cTransport, InputSink, Platform, Touchscreen, TriggerSource, DEFAULT_ADDR};
//!
//! async fn example<I2C, D, RDY, P, S>(i2c: I2C, delay: D, rdy: Option<RDY>, platform: P, sink: S)
//! where
//!   I2C: I2c,
//!   D: DelayNs + Clone,
//!   RDY: Wait,
//!   P: Platform,
//!   S: InputSink,
//! {
//!   let bus = I2cTransport::new(i2c, delay.clone(), DEFAULT_ADDR);
//!   let config = Config::default();
//!   let Ok(chip) = Hx8526a::attach(bus, delay.clone(), platform, sink, config).await else { return };
//!   let touchscreen: Touchscreen<CriticalSectionRawMutex, _, _, _, _> = Touchscreen::new(chip);
//!
//!   let trigger = TriggerSource::select(rdy, delay, config.poll);
//!   embassy_futures::join::join(touchscreen.run(), touchscreen.run_trigger(trigger)).await;
//! }
//! ```
#[macro_use]
mod fmt;

mod config;
mod debug;
mod diag;
mod event;
mod fault;
mod platform;
mod power;
mod reg;
mod rw;
mod scheduler;
mod touchpad;
mod touchscreen;

#[cfg(test)]
mod mock;

use embedded_hal_async::delay::DelayNs;

pub use config::*;
pub use debug::{ControlPlane, DebugLevel, DIAG_TEXT_LEN, LINE_TEXT_LEN, MAX_REGISTER_WRITE, REGISTER_LEN, REGISTER_TEXT_LEN};
pub use diag::{decode_value, ChannelGeometry, DiagBuffer, DiagnosticMode, CELL_REGION, CHUNK_LEN, DIAG_CAPACITY};
pub use event::{Finger, Fingers, DIAG_FRAME_LEN, MAX_FINGERS, NORMAL_FRAME_LEN};
pub use fault::{checksum, classify, RecoveryState, Verdict};
pub use platform::Platform;
pub use power::PowerState;
pub use reg::DEFAULT_ADDR;
pub use rw::{I2cTransport, Transport, MAX_WRITE, RETRY_DELAY_MS, RETRY_TIMES};
pub use scheduler::{Acquisition, Interrupt, Poll, Trigger, TriggerSource};
pub use touchpad::{FirstTouch, InputSink, Touch, TouchPhase, Tracker};
pub use touchscreen::Touchscreen;

use reg::Reg;

/// Errors that can occur while driving the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<E> {
  /// Bus exchange failed after exhausting the transport's retry budget.
  Bus(E),
  /// The sensor configuration could not be loaded.
  SensorConfig(E),
  /// A control-plane request was malformed.
  InvalidCommand,
  /// A payload or a formatted reply did not fit its buffer.
  BufferOverflow,
  /// A chip reset was requested while a recovery episode is still running.
  ResetInProgress,
  /// The platform has no reset line.
  ResetUnsupported,
}

impl<E: core::fmt::Debug> core::fmt::Display for Error<E> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    match self {
      Error::Bus(e) => write!(f, "bus error: {:?}", e),
      Error::SensorConfig(e) => write!(f, "sensor configuration failed: {:?}", e),
      Error::InvalidCommand => write!(f, "invalid control command"),
      Error::BufferOverflow => write!(f, "buffer overflow"),
      Error::ResetInProgress => write!(f, "chip reset already in progress"),
      Error::ResetUnsupported => write!(f, "no chip reset available"),
    }
  }
}

#[cfg(feature = "defmt")]
impl<E> defmt::Format for Error<E> {
  fn format(&self, f: defmt::Formatter) {
    match self {
      Error::Bus(_) => defmt::write!(f, "Bus error"),
      Error::SensorConfig(_) => defmt::write!(f, "Sensor configuration failed"),
      Error::InvalidCommand => defmt::write!(f, "Invalid control command"),
      Error::BufferOverflow => defmt::write!(f, "Buffer overflow"),
      Error::ResetInProgress => defmt::write!(f, "Reset in progress"),
      Error::ResetUnsupported => defmt::write!(f, "Reset unsupported"),
    }
  }
}

/// Identification read from the controller at attach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChipInfo {
  pub firmware_id: [u8; 3],
  pub firmware_version: u8,
  pub geometry: ChannelGeometry,
}

/// Driver state for one attached HX8526-A.
///
/// The driver owns the transport, a delay provider for the settling times of
/// the command sequences, the [`Platform`] hooks and the [`InputSink`]. Create
/// it with [`Hx8526a::attach`], then wrap it in a [`Touchscreen`] to share it
/// between the decode worker, the power hooks and the control plane.
pub struct Hx8526a<T, D, P, S> {
  bus: T,
  delay: D,
  platform: P,
  sink: S,
  config: Config,
  info: ChipInfo,
  recovery: RecoveryState,
  tracker: Tracker,
  diag_mode: DiagnosticMode,
  diag: DiagBuffer,
  power: PowerState,
  wake_gesture: bool,
  usb_connected: bool,
  cable_config: Option<[u8; 2]>,
  debug_level: DebugLevel,
  register_command: u8,
}

impl<T, D, P, S> Hx8526a<T, D, P, S>
where
  T: Transport,
  D: DelayNs,
  P: Platform,
  S: InputSink,
{
  /// Bring up the controller and build the driver.
  ///
  /// Loads the sensor configuration through the platform, reads the firmware
  /// identification and channel geometry, then configures the sink. A chip
  /// that cannot be configured is not attached: the error is returned and the
  /// parts are dropped.
  pub async fn attach(mut bus: T, delay: D, mut platform: P, mut sink: S, config: Config) -> Result<Self, Error<T::Error>> {
    if let Err(e) = platform.load_sensor_config(&mut bus).await {
      error!("Load sensor configuration failed, unload driver");
      return Err(Error::SensorConfig(e));
    }

    let mut firmware_id = [0u8; 3];
    bus.read(Reg::FirmwareId.into(), &mut firmware_id).await.map_err(Error::Bus)?;
    let mut version = [0u8; 1];
    bus.read(Reg::FirmwareVersion.into(), &mut version).await.map_err(Error::Bus)?;
    info!(
      "0x31=> {=u8:#x} {=u8:#x} {=u8:#x} FW ver:{=u8:#x}",
      firmware_id[0],
      firmware_id[1],
      firmware_id[2],
      version[0]
    );

    let mut channels = [0u8; 2];
    bus.read(Reg::ChannelCount.into(), &mut channels).await.map_err(Error::Bus)?;
    let geometry = ChannelGeometry::new(channels[0], channels[1]);

    info!(
      "axes: min_x {}, max_x {}, min_y {}, max_y {}",
      config.axes.x.min,
      config.axes.x.max,
      config.axes.y.min,
      config.axes.y.max
    );
    sink.configure(&config.axes, config.protocol);

    Ok(Self {
      bus,
      delay,
      platform,
      sink,
      config,
      info: ChipInfo { firmware_id, firmware_version: version[0], geometry },
      recovery: RecoveryState::Healthy,
      tracker: Tracker::new(),
      diag_mode: DiagnosticMode::Off,
      diag: DiagBuffer::new(),
      power: PowerState::Awake,
      wake_gesture: config.wake_gesture,
      usb_connected: false,
      cable_config: config.cable_config,
      debug_level: DebugLevel::new(config.debug_level),
      register_command: 0,
    })
  }

  /// Release every contact still down and hand back the owned parts.
  pub fn detach(mut self) -> (T, D, P, S) {
    self.tracker.release_all(&mut self.sink);
    (self.bus, self.delay, self.platform, self.sink)
  }
}

impl<T, D, P, S> Hx8526a<T, D, P, S> {
  pub const fn info(&self) -> ChipInfo {
    self.info
  }

  pub const fn config(&self) -> &Config {
    &self.config
  }

  pub const fn recovery(&self) -> RecoveryState {
    self.recovery
  }

  pub const fn tracker(&self) -> &Tracker {
    &self.tracker
  }

  pub fn sink(&mut self) -> &mut S {
    &mut self.sink
  }
}
