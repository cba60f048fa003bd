//! Finger view of a raw event-stack frame, and the decode cycle that reads one.

use embedded_hal_async::delay::DelayNs;

use crate::fault::{self, Verdict};
use crate::platform::Platform;
use crate::reg::Reg;
use crate::rw::Transport;
use crate::touchpad::InputSink;
use crate::{Error, Hx8526a};

/// Bytes in a normal-mode frame.
pub const NORMAL_FRAME_LEN: usize = 24;
/// Bytes in a diagnostic-mode frame.
pub const DIAG_FRAME_LEN: usize = 128;
/// Contact lanes tracked by the controller.
pub const MAX_FINGERS: usize = 4;

const WIDTH_OFFSET: usize = 16;
const LIFT_OFFSET: usize = 20;
const MASK_OFFSET: usize = 21;

/// One finger reading. Coordinates are reported as-is, without sign correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Finger {
  pub x: u16,
  pub y: u16,
  pub width: u8,
}

impl Finger {
  pub const fn new(x: u16, y: u16, width: u8) -> Self {
    Self { x, y, width }
  }
}

/// Every finger reported in one frame, indexed by slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Fingers {
  /// Presence bitmask, bit `i` set when slot `i` carries a finger.
  pub mask: u8,
  /// Set when the frame carried the legacy "all fingers left" sentinel.
  pub lifted: bool,
  pub slots: [Option<Finger>; MAX_FINGERS],
}

impl Fingers {
  /// View in which every slot is released.
  pub const fn lifted() -> Self {
    Self { mask: 0, lifted: true, slots: [None; MAX_FINGERS] }
  }

  /// Decode the finger section of `frame` (the first [`NORMAL_FRAME_LEN`] bytes).
  ///
  /// Returns `None` when the frame is too short to hold a finger section.
  pub fn decode(frame: &[u8]) -> Option<Self> {
    if frame.len() < NORMAL_FRAME_LEN {
      return None;
    }

    if frame[LIFT_OFFSET] == 0xFF && frame[MASK_OFFSET] == 0xFF {
      return Some(Self::lifted());
    }

    let mask = frame[MASK_OFFSET] & ((1 << MAX_FINGERS) - 1);
    let mut slots = [None; MAX_FINGERS];
    for (i, slot) in slots.iter_mut().enumerate() {
      if (mask >> i) & 1 == 1 {
        let base = i * 4;
        let x = u16::from_be_bytes([frame[base], frame[base + 1]]);
        let y = u16::from_be_bytes([frame[base + 2], frame[base + 3]]);
        *slot = Some(Finger::new(x, y, frame[WIDTH_OFFSET + i]));
      }
    }

    Some(Self { mask, lifted: false, slots })
  }

  /// Finger in `slot`, if present.
  pub fn get(&self, slot: usize) -> Option<Finger> {
    self.slots.get(slot).copied().flatten()
  }

  /// Number of fingers down.
  pub fn count(&self) -> usize {
    self.slots.iter().flatten().count()
  }

  pub fn is_empty(&self) -> bool {
    self.mask == 0
  }
}

impl<T, D, P, S> Hx8526a<T, D, P, S>
where
  T: Transport,
  D: DelayNs,
  P: Platform,
  S: InputSink,
{
  /// Run one decode cycle: read a frame, screen it for chip resets, then feed
  /// the diagnostic buffer and the contact tracker.
  ///
  /// A failed read returns [`Error::Bus`] with no state touched; the next
  /// trigger simply tries again. Frames that are not [`Verdict::Clean`] are
  /// consumed by the recovery state machine and never decoded.
  pub async fn process_frame(&mut self) -> Result<Verdict, Error<T::Error>> {
    let mut buf = [0u8; DIAG_FRAME_LEN];
    let frame = &mut buf[..self.diag_mode.frame_len()];

    if let Err(e) = self.bus.read(Reg::EventStack.into(), frame).await {
      error!("can't read data from chip");
      return Err(Error::Bus(e));
    }

    let verdict = fault::classify(frame, self.recovery);
    self.recover(verdict).await;
    if !verdict.is_clean() {
      return Ok(verdict);
    }

    if self.debug_level.raw_frames() {
      debug!("raw data: {=[u8]:#x}", &frame[..NORMAL_FRAME_LEN]);
    }

    if self.diag_mode.is_active() {
      if let Some(chunk) = self.diag.capture(frame) {
        debug!("diag chunk {} captured", chunk);
      }
    }

    if let Some(fingers) = Fingers::decode(frame) {
      self.tracker.update(&fingers, &mut self.sink, self.debug_level.fingers());
    }

    Ok(verdict)
  }
}
