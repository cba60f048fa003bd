//! Contact tracking: turns per-frame finger views into press / move / release
//! transitions for an [`InputSink`].
//!
//! Slot `i` always names the same finger-tracking lane of the controller, so
//! the tracker only has to remember the last reading of each lane. For every
//! decoded frame it reports one transition per slot that is or was occupied, in
//! ascending slot order, followed by a single [`InputSink::sync`].
//!
//! ```no_run
//! # use hx8526a::{Axes, Fingers, InputSink, Protocol, Touch, Tracker};
//! struct Log;
//!
//! impl InputSink for Log {
//!   fn configure(&mut self, _axes: &Axes, _protocol: Protocol) {}
//!   fn report(&mut self, touch: Touch) {
//!     // forward to the host input layer
//!     let _ = touch;
//!   }
//!   fn sync(&mut self) {}
//! }
//!
//! let mut tracker = Tracker::new();
//! tracker.update(&Fingers::lifted(), &mut Log, false);
//! ```

use crate::config::{Axes, Protocol};
use crate::event::{Finger, Fingers, MAX_FINGERS};

/// How a slot changed compared to the previous frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TouchPhase {
  /// A finger appeared in the slot.
  Press,
  /// The finger is still down; reported every frame, moved or not.
  Move,
  /// The finger was lifted.
  Release,
}

impl TouchPhase {
  pub const fn is_press(self) -> bool {
    matches!(self, TouchPhase::Press)
  }

  pub const fn is_move(self) -> bool {
    matches!(self, TouchPhase::Move)
  }

  pub const fn is_release(self) -> bool {
    matches!(self, TouchPhase::Release)
  }
}

/// One slot transition.
///
/// For [`TouchPhase::Release`] the point is the last reading before the lift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Touch {
  pub slot: u8,
  pub phase: TouchPhase,
  pub point: Finger,
}

impl Touch {
  pub const fn new(slot: u8, phase: TouchPhase, point: Finger) -> Self {
    Self { slot, phase, point }
  }
}

/// Host-side consumer of contact transitions.
///
/// How a transition is delivered (anonymous contacts re-sent every frame or
/// persistent slots) is up to the sink; [`configure`](Self::configure) tells it
/// which primitive was selected for this attachment.
pub trait InputSink {
  /// Called once at attach with the platform geometry.
  fn configure(&mut self, axes: &Axes, protocol: Protocol);

  /// Deliver one slot transition.
  fn report(&mut self, touch: Touch);

  /// Mark the end of a frame.
  fn sync(&mut self);
}

/// Coarse first-touch telemetry for the current episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FirstTouch {
  /// No touch since attach or the last suspend.
  #[default]
  Idle,
  /// The first touch is down.
  Touching,
  /// The first touch was lifted.
  Finished,
}

/// Per-slot contact state, persisted across frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tracker {
  slots: [Option<Finger>; MAX_FINGERS],
  first_touch: FirstTouch,
  last_primary: Option<Finger>,
}

impl Tracker {
  pub const fn new() -> Self {
    Self { slots: [None; MAX_FINGERS], first_touch: FirstTouch::Idle, last_primary: None }
  }

  /// Last reading of `slot`, `None` when released.
  pub fn slot(&self, slot: usize) -> Option<Finger> {
    self.slots.get(slot).copied().flatten()
  }

  pub fn pressed(&self) -> usize {
    self.slots.iter().flatten().count()
  }

  pub const fn first_touch(&self) -> FirstTouch {
    self.first_touch
  }

  pub fn reset_first_touch(&mut self) {
    self.first_touch = FirstTouch::Idle;
  }

  /// Report the transitions from the previous frame to `fingers`, then sync.
  ///
  /// `verbose` logs every finger reading.
  pub fn update<S: InputSink>(&mut self, fingers: &Fingers, sink: &mut S, verbose: bool) {
    for (i, previous) in self.slots.iter_mut().enumerate() {
      let current = fingers.slots[i];
      if let Some(touch) = classify_transition(i as u8, *previous, current) {
        if verbose && !touch.phase.is_release() {
          info!("Finger {}=> X:{}, Y:{} w:{}", i + 1, touch.point.x, touch.point.y, touch.point.width);
        }
        sink.report(touch);
      }
      *previous = current;
    }

    if fingers.lifted && verbose {
      info!("All fingers left");
    }

    self.track_first_touch(fingers);
    sink.sync();
  }

  /// Release every pressed slot and sync. Does nothing when no slot is pressed.
  pub fn release_all<S: InputSink>(&mut self, sink: &mut S) {
    if self.pressed() == 0 {
      return;
    }
    self.update(&Fingers::lifted(), sink, false);
  }

  fn track_first_touch(&mut self, fingers: &Fingers) {
    match self.first_touch {
      FirstTouch::Idle => {
        if let Some(finger) = fingers.slots.iter().flatten().next() {
          self.first_touch = FirstTouch::Touching;
          info!("S1@{},{}", finger.x, finger.y);
        }
      }
      FirstTouch::Touching if fingers.lifted => {
        self.first_touch = FirstTouch::Finished;
        let last = self.last_primary.unwrap_or_default();
        info!("E1@{}, {}", last.x, last.y);
      }
      _ => {}
    }
    if let Some(primary) = fingers.slots[0] {
      self.last_primary = Some(primary);
    }
  }
}

fn classify_transition(slot: u8, previous: Option<Finger>, current: Option<Finger>) -> Option<Touch> {
  match (previous, current) {
    (None, None) => None,
    (None, Some(current)) => Some(Touch::new(slot, TouchPhase::Press, current)),
    (Some(previous), None) => Some(Touch::new(slot, TouchPhase::Release, previous)),
    (Some(_), Some(current)) => Some(Touch::new(slot, TouchPhase::Move, current)),
  }
}
