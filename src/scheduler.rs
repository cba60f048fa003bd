//! Single-flight acquisition scheduling.
//!
//! A trigger (the data-ready line or a poll timer) must never start a second
//! decode cycle while one is running, and a trigger that arrives mid-cycle must
//! not be lost either. [`Acquisition`] is the gate between the two: it masks
//! the trigger source while a request is posted or in flight, coalesces any
//! number of triggers seen in that window into exactly one follow-up request,
//! and can be disabled around suspend so no work is started behind the power
//! sequencing.
//!
//! [`Acquisition::trigger`] only takes a blocking critical section, so it can
//! be called straight from an interrupt handler.

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::signal::Signal;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::digital::Wait;

use crate::config::PollTiming;

#[derive(Debug, Clone, Copy, Default)]
struct Gate {
  /// A request is posted or a cycle is running.
  masked: bool,
  /// A trigger arrived while masked.
  pending: bool,
  /// Suspend or reset in progress: triggers are dropped.
  disabled: bool,
}

/// Acquisition gate and decode-request mailbox shared by the trigger source
/// and the worker.
pub struct Acquisition<M: RawMutex> {
  gate: BlockingMutex<M, Cell<Gate>>,
  request: Signal<M, ()>,
  rearm: Signal<M, ()>,
}

impl<M: RawMutex> Acquisition<M> {
  pub const fn new() -> Self {
    Self {
      gate: BlockingMutex::new(Cell::new(Gate { masked: false, pending: false, disabled: false })),
      request: Signal::new(),
      rearm: Signal::new(),
    }
  }

  fn update<R>(&self, f: impl FnOnce(&mut Gate) -> R) -> R {
    self.gate.lock(|cell| {
      let mut gate = cell.get();
      let r = f(&mut gate);
      cell.set(gate);
      r
    })
  }

  /// Report a trigger. Returns whether a new request was posted.
  pub fn trigger(&self) -> bool {
    let post = self.update(|gate| {
      if gate.disabled {
        false
      } else if gate.masked {
        gate.pending = true;
        false
      } else {
        gate.masked = true;
        true
      }
    });
    if post {
      self.request.signal(());
    }
    post
  }

  /// Wait for the next posted request.
  pub async fn wait_request(&self) {
    self.request.wait().await
  }

  /// Mark the current cycle finished.
  ///
  /// A trigger coalesced during the cycle turns into exactly one more request;
  /// otherwise the gate is unmasked and the trigger source re-armed.
  pub fn complete(&self) {
    let again = self.update(|gate| {
      let again = gate.pending && !gate.disabled;
      gate.pending = false;
      gate.masked = again;
      again
    });
    if again {
      self.request.signal(());
    } else {
      self.rearm.signal(());
    }
  }

  pub fn disable(&self) {
    self.update(|gate| gate.disabled = true);
  }

  pub fn enable(&self) {
    self.update(|gate| gate.disabled = false);
    self.rearm.signal(());
  }

  pub fn is_disabled(&self) -> bool {
    self.update(|gate| gate.disabled)
  }

  /// Drop a request that was posted but not yet taken by the worker.
  pub fn cancel_pending(&self) -> bool {
    if !self.request.signaled() {
      return false;
    }
    self.request.reset();
    self.update(|gate| {
      gate.masked = false;
      gate.pending = false;
    });
    true
  }

  fn is_armed(&self) -> bool {
    self.update(|gate| !gate.masked && !gate.disabled)
  }

  async fn armed(&self) {
    while !self.is_armed() {
      self.rearm.wait().await;
    }
  }

  /// Drive `trigger` forever: wait until the gate is armed, wait for the
  /// trigger to fire, report it.
  pub async fn run_trigger<Tr: Trigger>(&self, mut trigger: Tr) -> ! {
    loop {
      self.armed().await;
      trigger.wait().await;
      if !self.trigger() {
        debug!("trigger dropped or coalesced");
      }
    }
  }
}

impl<M: RawMutex> Default for Acquisition<M> {
  fn default() -> Self {
    Self::new()
  }
}

/// Source of decode triggers.
#[allow(async_fn_in_trait)]
pub trait Trigger {
  /// Resolve once the controller has a frame ready.
  async fn wait(&mut self);
}

/// Level-triggered data-ready line, active low.
pub struct Interrupt<P> {
  pin: P,
}

impl<P: Wait> Interrupt<P> {
  pub fn new(pin: P) -> Self {
    Self { pin }
  }
}

impl<P: Wait> Trigger for Interrupt<P> {
  async fn wait(&mut self) {
    if self.pin.wait_for_low().await.is_err() {
      warn!("data-ready line wait failed");
    }
  }
}

/// Timer trigger for boards without a data-ready line.
///
/// The first poll fires after [`PollTiming::initial_delay_ms`]; every later one
/// [`PollTiming::interval_ms`] after the gate re-armed, so polls never stack
/// up behind a slow cycle.
pub struct Poll<D> {
  delay: D,
  timing: PollTiming,
  started: bool,
}

impl<D: DelayNs> Poll<D> {
  pub fn new(delay: D, timing: PollTiming) -> Self {
    Self { delay, timing, started: false }
  }
}

impl<D: DelayNs> Trigger for Poll<D> {
  async fn wait(&mut self) {
    let ms = if self.started { self.timing.interval_ms } else { self.timing.initial_delay_ms };
    self.started = true;
    self.delay.delay_ms(ms).await;
  }
}

/// Trigger chosen at attach from whether a data-ready line is wired.
pub enum TriggerSource<P, D> {
  Line(Interrupt<P>),
  Timer(Poll<D>),
}

impl<P: Wait, D: DelayNs> TriggerSource<P, D> {
  pub fn select(pin: Option<P>, delay: D, timing: PollTiming) -> Self {
    match pin {
      Some(pin) => {
        info!("acquisition driven by the data-ready line");
        Self::Line(Interrupt::new(pin))
      }
      None => {
        info!("no data-ready line, polling every {} ms", timing.interval_ms);
        Self::Timer(Poll::new(delay, timing))
      }
    }
  }
}

impl<P: Wait, D: DelayNs> Trigger for TriggerSource<P, D> {
  async fn wait(&mut self) {
    match self {
      Self::Line(line) => line.wait().await,
      Self::Timer(timer) => timer.wait().await,
    }
  }
}
