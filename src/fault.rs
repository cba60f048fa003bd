//! ESD / watchdog reset detection.
//!
//! A chip-internal reset silently clears the controller's registers. From the
//! outside it only shows up in the event-stack checksum: a live controller never
//! reports an all-zero frame, and once its configuration has been reloaded it
//! answers with a single `0xFF` status byte before resuming normal frames.

use embedded_hal_async::delay::DelayNs;

use crate::platform::Platform;
use crate::rw::Transport;
use crate::touchpad::InputSink;
use crate::{Error, Hx8526a};

/// Settling time before a configuration reload.
const RELOAD_SETTLE_MS: u32 = 20;

/// Where the driver stands in a recovery episode.
///
/// Edges only ever go `Healthy -> FaultDetected -> Recovering -> Healthy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RecoveryState {
  #[default]
  Healthy,
  /// A fault frame was seen; the configuration reload is underway.
  FaultDetected,
  /// Configuration reloaded, waiting for the controller's ready sentinel.
  Recovering,
}

impl RecoveryState {
  pub const fn is_healthy(&self) -> bool {
    matches!(self, Self::Healthy)
  }
}

/// Classification of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Verdict {
  /// Ordinary frame, decode it. Seen during recovery it also ends the
  /// episode: the chip is evidently back even if its ready status was missed.
  Clean,
  /// First all-zero frame of an episode.
  Fault,
  /// All-zero frame while already recovering.
  RepeatedFault,
  /// Ready sentinel after a reload.
  Recovered,
}

impl Verdict {
  /// Whether the frame may reach the decoders.
  pub const fn is_clean(&self) -> bool {
    matches!(self, Self::Clean)
  }
}

/// Byte sum of a frame.
pub fn checksum(frame: &[u8]) -> u32 {
  frame.iter().map(|&b| b as u32).sum()
}

/// Classify `frame` given the current recovery state.
pub fn classify(frame: &[u8], state: RecoveryState) -> Verdict {
  let sum = checksum(frame);
  match state {
    RecoveryState::Healthy if sum == 0 => Verdict::Fault,
    RecoveryState::Healthy => Verdict::Clean,
    _ if sum == 0 => Verdict::RepeatedFault,
    RecoveryState::Recovering if sum == 0xFF && frame.first() == Some(&0xFF) => Verdict::Recovered,
    _ => Verdict::Clean,
  }
}

/// State after acting on `verdict`, once any configuration reload it asked for
/// has been attempted. Reload failures do not change the outcome.
pub const fn settle(verdict: Verdict) -> RecoveryState {
  match verdict {
    Verdict::Fault | Verdict::RepeatedFault => RecoveryState::Recovering,
    Verdict::Recovered | Verdict::Clean => RecoveryState::Healthy,
  }
}

impl<T, D, P, S> Hx8526a<T, D, P, S>
where
  T: Transport,
  D: DelayNs,
  P: Platform,
{
  /// Act on the verdict for one frame before it is decoded or dropped.
  pub(crate) async fn recover(&mut self, verdict: Verdict) {
    match verdict {
      Verdict::Fault => {
        info!("ESD reset detected, load sensor config.");
        self.delay.delay_ms(RELOAD_SETTLE_MS).await;
        self.recovery = RecoveryState::FaultDetected;
        self.reload().await;
      }
      Verdict::RepeatedFault => {
        info!("back from ESD reset, but reset by ESD again.");
        self.delay.delay_ms(RELOAD_SETTLE_MS).await;
        self.reload().await;
      }
      Verdict::Recovered => info!("back from ESD reset, ready to serve."),
      Verdict::Clean if !self.recovery.is_healthy() => info!("back from ESD reset, frames resumed."),
      Verdict::Clean => {}
    }
    self.recovery = settle(verdict);
  }

  /// Refuse a manual reset while one cannot be carried out.
  pub(crate) fn check_reset(&self) -> Result<(), Error<T::Error>> {
    if !self.recovery.is_healthy() {
      return Err(Error::ResetInProgress);
    }
    if !self.platform.has_reset() {
      return Err(Error::ResetUnsupported);
    }
    Ok(())
  }

  /// Pulse the reset line and release every contact the reset lost.
  pub(crate) async fn hard_reset(&mut self)
  where
    S: InputSink,
  {
    info!("reset touch chip");
    self.platform.reset().await;
    self.tracker.release_all(&mut self.sink);
  }

  async fn reload(&mut self) {
    if self.platform.load_sensor_config(&mut self.bus).await.is_err() {
      warn!("sensor config reload failed, staying in recovery");
    }
  }
}
