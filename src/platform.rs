use crate::rw::Transport;

/// Board-specific hooks the driver calls into.
///
/// The sensor configuration table is board data and lives outside the driver:
/// [`load_sensor_config`](Self::load_sensor_config) writes it through the
/// driver's transport at attach and again after every detected chip reset, so
/// it must be safe to call repeatedly.
#[allow(async_fn_in_trait)]
pub trait Platform {
  /// Write the sensor configuration to the controller.
  async fn load_sensor_config<T: Transport>(&mut self, bus: &mut T) -> Result<(), T::Error>;

  /// Whether [`reset`](Self::reset) drives a real reset line.
  fn has_reset(&self) -> bool {
    false
  }

  /// Pulse the controller's reset line.
  async fn reset(&mut self) {}
}
