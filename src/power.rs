//! Suspend / resume sequencing and the cable notification.
//!
//! Both sequences are fixed command scripts. Suspend stops sensing and puts
//! the controller into deep sleep; resume wakes it, redoes the mode setup the
//! sleep wiped, then reasserts the diagnostic format and the cable state.

use embedded_hal_async::delay::DelayNs;

use crate::reg::{Reg, FORMAT_SUSPENDED};
use crate::rw::Transport;
use crate::{Error, Hx8526a};

/// Power state as seen by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerState {
  #[default]
  Awake,
  /// Sensor powered down, acquisition disabled.
  Suspended,
  /// Host asleep, sensor left running so a double tap can wake it.
  WakeArmed,
}

enum Step {
  Command(Reg),
  Write(Reg, &'static [u8]),
  Raw(&'static [u8]),
  DelayUs(u32),
  DelayMs(u32),
}

const SUSPEND: &[Step] = &[
  Step::Raw(&[Reg::FrameFormat as u8, FORMAT_SUSPENDED]),
  Step::Command(Reg::SenseOff),
  Step::DelayMs(120),
  Step::Command(Reg::SleepIn),
  Step::DelayMs(120),
  Step::Write(Reg::DeepSleep, &[0x01]),
];

const RESUME: &[Step] = &[
  Step::Write(Reg::DeepSleep, &[0x00]),
  Step::DelayUs(100),
  Step::Raw(&[Reg::AnalogSetup as u8, 0x02]),
  Step::Command(Reg::SleepOut),
  Step::DelayMs(50),
  Step::Write(Reg::FlashControl, &[0x02]),
  Step::Write(Reg::ScanTiming, &[0x0F, 0x53]),
  Step::Write(Reg::ReportSetup, &[0x04, 0x02]),
  Step::Command(Reg::SenseOn),
  Step::DelayMs(10),
];

impl<T, D, P, S> Hx8526a<T, D, P, S>
where
  T: Transport,
  D: DelayNs,
{
  async fn run_script(&mut self, script: &[Step]) -> Result<(), Error<T::Error>> {
    for step in script {
      match *step {
        Step::Command(reg) => self.bus.command(reg.into()).await.map_err(Error::Bus)?,
        Step::Write(reg, data) => self.bus.write(reg.into(), data).await.map_err(Error::Bus)?,
        Step::Raw(data) => self.bus.write_raw(data).await.map_err(Error::Bus)?,
        Step::DelayUs(us) => self.delay.delay_us(us).await,
        Step::DelayMs(ms) => self.delay.delay_ms(ms).await,
      }
    }
    Ok(())
  }

  /// Enter the wake-gesture bypass if it is enabled. Returns whether it was.
  pub(crate) fn arm_wake_gesture(&mut self) -> bool {
    if self.wake_gesture {
      info!("suspend: wake gesture armed, sensor stays on");
      self.power = PowerState::WakeArmed;
    }
    self.wake_gesture
  }

  /// Put the sensor to sleep. The caller has already stopped acquisition.
  pub(crate) async fn enter_suspend(&mut self) -> Result<(), Error<T::Error>> {
    info!("suspend");
    self.tracker.reset_first_touch();
    self.power = PowerState::Suspended;
    self.run_script(SUSPEND).await
  }

  /// Wake the sensor and restore the state the sleep wiped.
  ///
  /// The driver is marked awake even when a step fails so the caller can
  /// re-enable acquisition regardless.
  pub(crate) async fn exit_suspend(&mut self) -> Result<(), Error<T::Error>> {
    let previous = self.power;
    self.power = PowerState::Awake;
    if previous == PowerState::WakeArmed {
      info!("resume: wake gesture disarmed");
      return Ok(());
    }

    info!("resume");
    self.run_script(RESUME).await?;
    if self.diag_mode.is_active() {
      self.bus.write_raw(&self.diag_mode.command()).await.map_err(Error::Bus)?;
    }
    self.apply_cable().await
  }

  /// Record the cable state and forward it to the controller when awake.
  ///
  /// Boards without a cable configuration ignore the notification. While
  /// suspended the flag is only remembered, resume applies it.
  pub async fn set_cable(&mut self, connected: bool) -> Result<(), Error<T::Error>> {
    if self.cable_config.is_none() {
      return Ok(());
    }
    info!("cable change: usb_connected={}", connected);
    self.usb_connected = connected;
    if self.power == PowerState::Suspended {
      return Ok(());
    }
    self.apply_cable().await
  }

  async fn apply_cable(&mut self) -> Result<(), Error<T::Error>> {
    let Some(config) = self.cable_config.as_mut() else {
      return Ok(());
    };
    config[1] = self.usb_connected as u8;
    let config = *config;
    self.bus.write_raw(&config).await.map_err(Error::Bus)
  }
}

impl<T, D, P, S> Hx8526a<T, D, P, S> {
  pub const fn power(&self) -> PowerState {
    self.power
  }

  pub const fn usb_connected(&self) -> bool {
    self.usb_connected
  }

  /// Enable or disable the double-tap-to-wake bypass for the next suspend.
  pub fn set_wake_gesture(&mut self, enabled: bool) {
    self.wake_gesture = enabled;
  }
}
