use core::fmt::Debug;
use core::sync::atomic::{AtomicBool, Ordering};

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::digital::Wait;

use crate::bus::{read_reg, Bus};
use crate::defs::*;
use crate::event::Events;
use crate::hooks::{Hooks, IrqMode};
use crate::power::PowerState;
use crate::retry::{Backoff, Retry};
use crate::{Device, Error, StateError};

/// Chip identification registers of a controller model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChipIdentity {
  pub chip_id_high: u8,
  pub chip_id_low: u8,
  /// Model code, zero when the chip answered with an alternate id.
  pub cid_type: u16,
}

impl ChipIdentity {
  pub const fn new(chip_id_high: u8, chip_id_low: u8, cid_type: u16) -> Self {
    Self { chip_id_high, chip_id_low, cid_type }
  }
}

impl<B, E, IRQ, D, H> Device<B, IRQ, D, H>
where
  B: Bus<Error = E>,
  E: Debug,
  IRQ: Wait,
  D: DelayNs,
  H: Hooks,
{
  /// Power the controller, reset it and read its chip id.
  ///
  /// The id is read up to five times with a growing pause. Once it matches
  /// the configuration the mode registers are written, the interrupt is
  /// enabled and the device is `On`.
  pub async fn probe(&mut self) -> Result<ChipIdentity, Error<E>> {
    if self.power.upgrading() {
      return Err(Error::State(StateError::UpgradeInProgress));
    }
    self.hooks.set_power(true).await.map_err(|_| Error::Pin)?;
    self.reset_pulse().await?;

    let mut retry = Retry::new(PROBE_ATTEMPTS, Backoff::Linear(PROBE_BACKOFF_MS));
    let identity = loop {
      let err = match self.read_chip_id().await {
        Ok((high, low)) if self.config.accepts_chip(high) => {
          let cid_type = if high == self.config.chip.chip_id_high { self.config.chip.cid_type } else { 0 };
          break ChipIdentity::new(high, low, cid_type);
        }
        Ok((high, _)) => {
          debug!("unexpected chip id {:#x}", high);
          Error::InvalidChipId(high)
        }
        Err(e) => Error::Bus(e),
      };
      if !retry.backoff(&mut self.delay).await {
        error!("no valid chip id after {} attempts", retry.failures());
        return Err(err);
      }
    };

    info!("chip id {:#x} {:#x}", identity.chip_id_high, identity.chip_id_low);
    self.start().await?;
    self.identity = Some(identity);
    self.power.commit(PowerState::On);
    Ok(identity)
  }

  /// Pulse the reset line and resynchronise.
  ///
  /// The chip id is polled until it answers, the mode registers are replayed
  /// and then every contact is released. A failed reset keeps the contacts
  /// for the next attempt. Refused while a firmware upgrade owns the bus or
  /// while the controller is off.
  pub async fn reset(&mut self) -> Result<Events, Error<E>> {
    if self.power.upgrading() {
      return Err(Error::State(StateError::UpgradeInProgress));
    }
    if self.power.state() == PowerState::Off {
      return Err(Error::Io);
    }

    self.hooks.set_irq(IrqMode::Disabled).await.map_err(|_| Error::Pin)?;
    self.reset_pulse().await?;
    let never = AtomicBool::new(false);
    self.wait_ready(&never).await?;
    self.start().await?;
    let events = self.slots.release_all();
    self.power.commit(PowerState::On);
    Ok(events)
  }

  /// Periodic liveness check.
  ///
  /// Reads the chip id. After three consecutive failures the controller is
  /// reset; if that does not bring it back [`Error::Degraded`] is returned.
  /// Returns the release events of a reset, empty otherwise. Does nothing
  /// unless the device is `On`.
  pub async fn health_check(&mut self) -> Result<Events, Error<E>> {
    if self.power.upgrading() || self.power.state() != PowerState::On {
      return Ok(Events::new());
    }

    match read_reg(&mut self.bus, Reg::ChipIdHigh).await {
      Ok(id) if self.config.accepts_chip(id) => {
        self.health_failures = 0;
        return Ok(Events::new());
      }
      Ok(id) => warn!("health check read chip id {:#x}", id),
      Err(_) => warn!("health check read failed"),
    }

    self.health_failures += 1;
    if self.health_failures < HEALTH_FAIL_LIMIT {
      return Ok(Events::new());
    }

    self.health_failures = 0;
    error!("controller unresponsive, resetting");
    self.reset().await.map_err(|_| Error::Degraded)
  }

  /// Poll the chip id until the controller accepts commands.
  ///
  /// Polls every 200 ms for at most a second and gives up early when
  /// `abort` is raised.
  pub(crate) async fn wait_ready(&mut self, abort: &AtomicBool) -> Result<(), Error<E>> {
    let mut retry = Retry::new(READY_ATTEMPTS, Backoff::Fixed(READY_POLL_INTERVAL_MS));
    loop {
      if abort.load(Ordering::Acquire) {
        info!("wait for chip aborted");
        return Err(Error::State(StateError::ResumeAborted));
      }
      match read_reg(&mut self.bus, Reg::ChipIdHigh).await {
        Ok(id) if self.config.accepts_chip(id) => {
          debug!("chip ready after {} polls", retry.failures() + 1);
          return Ok(());
        }
        Ok(id) => debug!("chip not ready, id {:#x}", id),
        Err(_) => debug!("chip not ready, read failed"),
      }
      if !retry.backoff(&mut self.delay).await {
        error!("chip not ready after {}ms", READY_TIMEOUT_MS);
        return Err(Error::State(StateError::ResumeTimeout));
      }
    }
  }

  /// Replay the mode registers for `On` and enable the interrupt.
  pub(crate) async fn start(&mut self) -> Result<(), Error<E>> {
    self.reapply(PowerState::On).await?;
    self.hooks.set_irq(IrqMode::Enabled).await.map_err(|_| Error::Pin)
  }

  pub(crate) async fn reset_pulse(&mut self) -> Result<(), Error<E>> {
    self.hooks.set_reset(false).await.map_err(|_| Error::Pin)?;
    self.delay.delay_ms(RESET_LOW_MS).await;
    self.hooks.set_reset(true).await.map_err(|_| Error::Pin)?;
    self.delay.delay_ms(RESET_SETTLE_MS).await;
    Ok(())
  }

  async fn read_chip_id(&mut self) -> Result<(u8, u8), E> {
    let high = read_reg(&mut self.bus, Reg::ChipIdHigh).await?;
    let low = read_reg(&mut self.bus, Reg::ChipIdLow).await?;
    Ok((high, low))
  }
}
