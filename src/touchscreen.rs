//! Shared handle tying the driver to its acquisition gate.
//!
//! Every entry point takes `&Touchscreen`: the decode worker, the trigger
//! source, the host's suspend / resume hooks, the cable notifier and the
//! control plane. The chip sits behind an async mutex, so a decode cycle,
//! a power transition and a control-plane register access never interleave.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::{Mutex, MutexGuard};
use embedded_hal_async::delay::DelayNs;

use crate::debug::ControlPlane;
use crate::platform::Platform;
use crate::rw::Transport;
use crate::scheduler::{Acquisition, Trigger};
use crate::touchpad::InputSink;
use crate::{Error, Hx8526a};

pub struct Touchscreen<M: RawMutex, T, D, P, S> {
  chip: Mutex<M, Hx8526a<T, D, P, S>>,
  acquisition: Acquisition<M>,
}

impl<M: RawMutex, T, D, P, S> Touchscreen<M, T, D, P, S> {
  pub fn new(chip: Hx8526a<T, D, P, S>) -> Self {
    Self { chip: Mutex::new(chip), acquisition: Acquisition::new() }
  }

  /// The gate an interrupt handler reports triggers to.
  pub fn acquisition(&self) -> &Acquisition<M> {
    &self.acquisition
  }

  /// Exclusive access to the driver, waiting for any in-flight cycle.
  pub async fn lock(&self) -> MutexGuard<'_, M, Hx8526a<T, D, P, S>> {
    self.chip.lock().await
  }

  pub fn control(&self) -> ControlPlane<'_, M, T, D, P, S> {
    ControlPlane::new(self)
  }

  /// Take the driver back out of the handle.
  pub fn into_inner(self) -> Hx8526a<T, D, P, S> {
    self.chip.into_inner()
  }
}

impl<M, T, D, P, S> Touchscreen<M, T, D, P, S>
where
  M: RawMutex,
  T: Transport,
  D: DelayNs,
  P: Platform,
  S: InputSink,
{
  /// Decode worker: serve requests one at a time, forever.
  pub async fn run(&self) -> ! {
    loop {
      self.service().await;
    }
  }

  /// Drive `trigger` into the acquisition gate, forever.
  pub async fn run_trigger<Tr: Trigger>(&self, trigger: Tr) -> ! {
    self.acquisition.run_trigger(trigger).await
  }

  /// Wait for one request and run its decode cycle.
  ///
  /// A request that raced with a suspend or reset is completed without
  /// touching the bus.
  pub async fn service(&self) {
    self.acquisition.wait_request().await;

    let mut chip = self.chip.lock().await;
    if self.acquisition.is_disabled() {
      debug!("acquisition disabled, cycle skipped");
    } else if chip.process_frame().await.is_err() {
      debug!("cycle aborted, retrying on next trigger");
    }
    drop(chip);

    self.acquisition.complete();
  }

  /// Host suspend hook.
  ///
  /// With the wake gesture enabled the sensor keeps running and acquisition
  /// stays armed. Otherwise acquisition is stopped, a posted request is
  /// dropped and the sensor is put to sleep.
  pub async fn suspend(&self) -> Result<(), Error<T::Error>> {
    let mut chip = self.chip.lock().await;
    if chip.arm_wake_gesture() {
      return Ok(());
    }

    self.acquisition.disable();
    if self.acquisition.cancel_pending() {
      debug!("pending decode request dropped");
    }
    chip.enter_suspend().await
  }

  /// Host resume hook. Acquisition is re-enabled even if the wake-up sequence
  /// failed.
  pub async fn resume(&self) -> Result<(), Error<T::Error>> {
    let mut chip = self.chip.lock().await;
    let res = chip.exit_suspend().await;
    drop(chip);

    self.acquisition.enable();
    res
  }

  /// Charger / cable state notification.
  pub async fn cable_changed(&self, connected: bool) -> Result<(), Error<T::Error>> {
    self.chip.lock().await.set_cable(connected).await
  }

  pub async fn set_wake_gesture(&self, enabled: bool) {
    self.chip.lock().await.set_wake_gesture(enabled);
  }

  /// Pulse the chip's reset line with acquisition stopped.
  pub async fn reset_chip(&self) -> Result<(), Error<T::Error>> {
    let mut chip = self.chip.lock().await;
    chip.check_reset()?;

    self.acquisition.disable();
    if self.acquisition.cancel_pending() {
      debug!("pending decode request dropped");
    }
    chip.hard_reset().await;
    drop(chip);

    self.acquisition.enable();
    Ok(())
  }

  pub async fn reset_in_progress(&self) -> bool {
    !self.chip.lock().await.recovery().is_healthy()
  }
}
