use core::fmt::Debug;

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::digital::Wait;

use crate::bus::{write_reg, Bus};
use crate::config::ModeSettings;
use crate::defs::Reg;
use crate::event::Events;
use crate::hooks::Hooks;
use crate::power::PowerState;
use crate::{Device, Error, StateError};

impl<B, E, IRQ, D, H> Device<B, IRQ, D, H>
where
  B: Bus<Error = E>,
  E: Debug,
  IRQ: Wait,
  D: DelayNs,
  H: Hooks,
{
  pub fn modes(&self) -> ModeSettings {
    self.modes
  }

  /// Replay the mode registers and release every contact, for when the
  /// controller firmware restarted behind our back. Contacts are kept if a
  /// write fails.
  pub async fn resync(&mut self) -> Result<Events, Error<E>> {
    self.reapply(self.power.state()).await?;
    Ok(self.slots.release_all())
  }

  pub async fn set_glove_mode(&mut self, on: bool) -> Result<(), Error<E>> {
    self.set_mode(Reg::GloveMode, on, |m| m.glove = on).await
  }

  pub async fn set_cover_mode(&mut self, on: bool) -> Result<(), Error<E>> {
    self.set_mode(Reg::CoverMode, on, |m| m.cover = on).await
  }

  pub async fn set_charger_mode(&mut self, on: bool) -> Result<(), Error<E>> {
    self.set_mode(Reg::ChargerMode, on, |m| m.charger = on).await
  }

  /// Arm or disarm wake gestures. Takes effect on the next suspend; the
  /// controller only scans for gestures in low power.
  pub fn set_gesture_mode(&mut self, on: bool) -> Result<(), Error<E>> {
    self.check_bus()?;
    if on && !self.config.gesture_capable {
      warn!("gesture mode requested on a panel without gesture support");
    }
    self.modes.gesture = on;
    Ok(())
  }

  /// Arm or disarm proximity sensing. Written immediately when the
  /// controller is on and supports it.
  pub async fn set_proximity_mode(&mut self, on: bool) -> Result<(), Error<E>> {
    self.check_bus()?;
    self.modes.proximity = on;
    if self.config.proximity_capable && self.power.state() == PowerState::On {
      write_reg(&mut self.bus, Reg::ProximityMode, on as u8).await.map_err(Error::Bus)?;
    }
    Ok(())
  }

  async fn set_mode(&mut self, reg: Reg, on: bool, update: impl FnOnce(&mut ModeSettings)) -> Result<(), Error<E>> {
    self.check_bus()?;
    update(&mut self.modes);
    if self.power.state() == PowerState::On {
      write_reg(&mut self.bus, reg, on as u8).await.map_err(Error::Bus)?;
    }
    Ok(())
  }

  fn check_bus(&self) -> Result<(), Error<E>> {
    if self.power.upgrading() {
      return Err(Error::State(StateError::UpgradeInProgress));
    }
    Ok(())
  }

  /// Write every mode register from the stored settings for a controller
  /// about to be in `state`. Gesture scanning is only left on in low power.
  pub(crate) async fn reapply(&mut self, state: PowerState) -> Result<(), Error<E>> {
    let modes = self.modes;
    debug!("replaying modes {:?}", modes);
    write_reg(&mut self.bus, Reg::GloveMode, modes.glove as u8).await.map_err(Error::Bus)?;
    write_reg(&mut self.bus, Reg::CoverMode, modes.cover as u8).await.map_err(Error::Bus)?;
    write_reg(&mut self.bus, Reg::ChargerMode, modes.charger as u8).await.map_err(Error::Bus)?;
    if self.config.gesture_capable {
      let gesture = modes.gesture && state == PowerState::LowPower;
      write_reg(&mut self.bus, Reg::GestureMode, gesture as u8).await.map_err(Error::Bus)?;
    }
    if self.config.proximity_capable {
      write_reg(&mut self.bus, Reg::ProximityMode, modes.proximity as u8).await.map_err(Error::Bus)?;
    }
    Ok(())
  }
}
