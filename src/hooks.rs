//! Collaborators the core calls out to.
//!
//! Everything here is platform glue: firmware images, gesture decoding,
//! regulators and GPIOs. Every method has a do-nothing default and `()`
//! implements all of them, so a board only overrides what it has.

use core::convert::Infallible;

/// Interrupt line configuration requested by the power state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IrqMode {
  Disabled,
  Enabled,
  /// Enabled and allowed to wake the host from sleep.
  Wake,
}

/// Checks whether the controller firmware needs to be reflashed and does so.
///
/// Must be idempotent; the core may call it again after a failure.
#[allow(async_fn_in_trait)]
pub trait FirmwareRecovery {
  type Error;

  async fn recover(&mut self) -> Result<(), Self::Error> {
    Ok(())
  }
}

/// Receives gesture reports while the panel is in wake-gesture mode.
#[allow(async_fn_in_trait)]
pub trait GestureSubsystem {
  type Error;

  async fn on_gesture_frame(&mut self, _bytes: &[u8]) -> Result<(), Self::Error> {
    Ok(())
  }
}

/// Reset line, supply and interrupt routing.
#[allow(async_fn_in_trait)]
pub trait PowerControl {
  type Error;

  /// Drive the reset line, `true` releases the controller from reset.
  async fn set_reset(&mut self, _high: bool) -> Result<(), Self::Error> {
    Ok(())
  }

  async fn set_power(&mut self, _on: bool) -> Result<(), Self::Error> {
    Ok(())
  }

  async fn set_irq(&mut self, _mode: IrqMode) -> Result<(), Self::Error> {
    Ok(())
  }
}

/// All collaborators of a device.
pub trait Hooks: FirmwareRecovery + GestureSubsystem + PowerControl {}

impl<T: FirmwareRecovery + GestureSubsystem + PowerControl> Hooks for T {}

impl FirmwareRecovery for () {
  type Error = Infallible;
}

impl GestureSubsystem for () {
  type Error = Infallible;
}

impl PowerControl for () {
  type Error = Infallible;
}
