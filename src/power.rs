use core::fmt::Debug;
use core::sync::atomic::AtomicBool;

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::digital::Wait;

use crate::bus::{write_reg, Bus};
use crate::defs::{Reg, POWER_MODE_SLEEP};
use crate::event::Events;
use crate::hooks::{Hooks, IrqMode};
use crate::{Device, Error, StateError};

/// Power state of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PowerState {
  /// Unpowered or held in reset. No frame is ever read.
  Off,
  On,
  /// Powered, scanning slowly for wake gestures or proximity.
  LowPower,
}

/// A planned power transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Transition {
  /// Keep the controller powered as a wake source.
  ToLowPower,
  /// Put the controller to sleep and cut its supply.
  ToOff,
  /// Leave low power; the controller kept its state.
  Wake,
  /// Power the controller up and wait for it to report its chip id.
  PowerUp,
}

impl Transition {
  pub const fn target(self) -> PowerState {
    match self {
      Transition::ToLowPower => PowerState::LowPower,
      Transition::ToOff => PowerState::Off,
      Transition::Wake | Transition::PowerUp => PowerState::On,
    }
  }
}

/// Tracks the power state and plans transitions.
///
/// Planning and committing are separate so a failed transition leaves the
/// state untouched. While a firmware upgrade owns the bus every transition is
/// refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PowerStateMachine {
  state: PowerState,
  upgrading: bool,
}

impl PowerStateMachine {
  pub const fn new() -> Self {
    Self { state: PowerState::Off, upgrading: false }
  }

  pub const fn state(&self) -> PowerState {
    self.state
  }

  pub const fn upgrading(&self) -> bool {
    self.upgrading
  }

  /// Plan a suspend. `None` when already suspended.
  pub fn on_suspend(&self, gesture: bool, proximity: bool) -> Result<Option<Transition>, StateError> {
    self.check_bus()?;
    Ok(match self.state {
      PowerState::On if gesture || proximity => Some(Transition::ToLowPower),
      PowerState::On => Some(Transition::ToOff),
      PowerState::LowPower | PowerState::Off => None,
    })
  }

  /// Plan a resume. `None` when already awake.
  pub fn on_resume(&self) -> Result<Option<Transition>, StateError> {
    self.check_bus()?;
    Ok(match self.state {
      PowerState::On => None,
      PowerState::LowPower => Some(Transition::Wake),
      PowerState::Off => Some(Transition::PowerUp),
    })
  }

  pub fn commit(&mut self, state: PowerState) {
    if self.state != state {
      info!("power {:?} -> {:?}", self.state, state);
    }
    self.state = state;
  }

  pub fn begin_upgrade(&mut self) -> Result<(), StateError> {
    self.check_bus()?;
    self.upgrading = true;
    Ok(())
  }

  pub fn end_upgrade(&mut self) {
    self.upgrading = false;
  }

  fn check_bus(&self) -> Result<(), StateError> {
    if self.upgrading {
      return Err(StateError::UpgradeInProgress);
    }
    Ok(())
  }
}

impl Default for PowerStateMachine {
  fn default() -> Self {
    Self::new()
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
  /// Suspend the controller.
  ///
  /// With wake gestures or proximity armed the controller stays powered in
  /// low power with its interrupt as a wake source. Otherwise it is put to
  /// sleep and powered off. All contacts are released either way.
  pub async fn suspend(&mut self) -> Result<Events, Error<E>> {
    let plan = match self.power.on_suspend(self.gesture_armed(), self.proximity_armed()) {
      Ok(Some(plan)) => plan,
      Ok(None) => {
        info!("already suspended");
        return Ok(Events::new());
      }
      Err(e) => {
        info!("firmware upgrade in progress, can't suspend");
        return Err(Error::State(e));
      }
    };

    match plan {
      Transition::ToLowPower => {
        if self.gesture_armed() {
          write_reg(&mut self.bus, Reg::GestureMode, 1).await.map_err(Error::Bus)?;
        }
        if self.proximity_armed() {
          write_reg(&mut self.bus, Reg::ProximityMode, 1).await.map_err(Error::Bus)?;
        }
        self.hooks.set_irq(IrqMode::Wake).await.map_err(|_| Error::Pin)?;
      }
      _ => {
        self.hooks.set_irq(IrqMode::Disabled).await.map_err(|_| Error::Pin)?;
        if write_reg(&mut self.bus, Reg::PowerMode, POWER_MODE_SLEEP).await.is_err() {
          warn!("sleep command failed");
        }
        self.hooks.set_power(false).await.map_err(|_| Error::Pin)?;
        self.hooks.set_reset(false).await.map_err(|_| Error::Pin)?;
      }
    }

    let events = self.slots.release_all();
    self.power.commit(plan.target());
    Ok(events)
  }

  /// Resume the controller. See [`Device::resume_until`].
  pub async fn resume(&mut self) -> Result<Events, Error<E>> {
    let never = AtomicBool::new(false);
    self.resume_until(&never).await
  }

  /// Resume the controller, giving up when `abort` is raised.
  ///
  /// From `Off` the controller is powered and reset, then polled for its
  /// chip id every 200 ms for at most a second. On timeout it stays `Off`
  /// and [`StateError::ResumeTimeout`] is returned. Once the chip answers
  /// the mode registers are replayed and the interrupt enabled. The device
  /// is only `On` after all of that succeeded.
  pub async fn resume_until(&mut self, abort: &AtomicBool) -> Result<Events, Error<E>> {
    let plan = match self.power.on_resume() {
      Ok(Some(plan)) => plan,
      Ok(None) => {
        debug!("already awake");
        return Ok(Events::new());
      }
      Err(e) => {
        info!("firmware upgrade in progress, don't resume");
        return Err(Error::State(e));
      }
    };

    if let Err(e) = self.wake(plan, abort).await {
      if plan == Transition::PowerUp {
        // unpowered again until the next attempt
        let _ = self.hooks.set_power(false).await;
      }
      return Err(e);
    }

    let events = self.slots.release_all();
    self.power.commit(PowerState::On);
    Ok(events)
  }

  async fn wake(&mut self, plan: Transition, abort: &AtomicBool) -> Result<(), Error<E>> {
    match plan {
      Transition::PowerUp => {
        self.hooks.set_power(true).await.map_err(|_| Error::Pin)?;
        self.reset_pulse().await?;
      }
      _ if !self.config.is_incell_chip => self.reset_pulse().await?,
      _ => {}
    }
    self.wait_ready(abort).await?;
    self.start().await
  }

  /// Power the controller down for good. Allowed in any state.
  pub async fn shutdown(&mut self) -> Result<Events, Error<E>> {
    if self.power.upgrading() {
      warn!("shutdown during firmware upgrade");
      self.power.end_upgrade();
    }
    self.hooks.set_irq(IrqMode::Disabled).await.map_err(|_| Error::Pin)?;
    self.hooks.set_power(false).await.map_err(|_| Error::Pin)?;
    self.hooks.set_reset(false).await.map_err(|_| Error::Pin)?;
    let events = self.slots.release_all();
    self.power.commit(PowerState::Off);
    Ok(events)
  }

  pub fn power_state(&self) -> PowerState {
    self.power.state()
  }

  /// Take the bus for a firmware upgrade. Suspend, resume and reset are
  /// refused and interrupts ignored until [`Device::end_firmware_upgrade`].
  pub fn begin_firmware_upgrade(&mut self) -> Result<(), Error<E>> {
    self.power.begin_upgrade().map_err(Error::State)?;
    info!("firmware upgrade started");
    Ok(())
  }

  pub fn end_firmware_upgrade(&mut self) {
    info!("firmware upgrade finished");
    self.power.end_upgrade();
  }

  pub(crate) fn gesture_armed(&self) -> bool {
    self.config.gesture_capable && self.modes.gesture
  }

  pub(crate) fn proximity_armed(&self) -> bool {
    self.config.proximity_capable && self.modes.proximity
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::{Asserted, Call, FakeBus, FakeError, FrameBuilder, Recorder, RecordingDelay};
  use crate::{Config, ModeSettings};
  use crate::defs::{EVENT_DOWN, READY_POLL_INTERVAL_MS, READY_TIMEOUT_MS, RESET_LOW_MS, RESET_SETTLE_MS};
  use crate::event::Event;
  use embassy_futures::block_on;

  #[test]
  fn suspend_plans() {
    let mut psm = PowerStateMachine::new();
    assert_eq!(psm.on_suspend(false, false), Ok(None));
    psm.commit(PowerState::On);
    assert_eq!(psm.on_suspend(true, false), Ok(Some(Transition::ToLowPower)));
    assert_eq!(psm.on_suspend(false, true), Ok(Some(Transition::ToLowPower)));
    assert_eq!(psm.on_suspend(false, false), Ok(Some(Transition::ToOff)));
  }

  #[test]
  fn resume_plans() {
    let mut psm = PowerStateMachine::new();
    assert_eq!(psm.on_resume(), Ok(Some(Transition::PowerUp)));
    psm.commit(PowerState::LowPower);
    assert_eq!(psm.on_resume(), Ok(Some(Transition::Wake)));
    psm.commit(PowerState::On);
    assert_eq!(psm.on_resume(), Ok(None));
  }

  #[test]
  fn upgrade_blocks_transitions() {
    let mut psm = PowerStateMachine::new();
    psm.commit(PowerState::On);
    psm.begin_upgrade().unwrap();
    assert!(psm.upgrading());
    assert_eq!(psm.on_suspend(true, true), Err(StateError::UpgradeInProgress));
    assert_eq!(psm.on_resume(), Err(StateError::UpgradeInProgress));
    assert_eq!(psm.begin_upgrade(), Err(StateError::UpgradeInProgress));
    psm.end_upgrade();
    assert_eq!(psm.on_suspend(false, false), Ok(Some(Transition::ToOff)));
  }

  type TestDevice = Device<FakeBus, Asserted, RecordingDelay, Recorder>;

  fn device(config: Config) -> (TestDevice, FakeBus, RecordingDelay, Recorder) {
    let bus = FakeBus::new();
    let delay = RecordingDelay::default();
    let hooks = Recorder::default();
    let mut dev = Device::new(bus.clone(), Asserted, delay.clone(), hooks.clone(), config).unwrap();
    block_on(dev.probe()).unwrap();
    bus.clear_log();
    delay.clear();
    hooks.clear();
    (dev, bus, delay, hooks)
  }

  #[test]
  fn suspend_with_gesture_goes_low_power() {
    let config = Config::new().with_gesture(true).with_modes(ModeSettings::new().with_gesture(true));
    let (mut dev, bus, _, hooks) = device(config);

    block_on(dev.suspend()).unwrap();
    assert_eq!(dev.power_state(), PowerState::LowPower);
    assert_eq!(bus.reg_writes(), [(Reg::GestureMode as u8, 1)]);
    assert_eq!(hooks.calls(), [Call::Irq(IrqMode::Wake)]);
  }

  #[test]
  fn gesture_mode_without_capability_powers_off() {
    let config = Config::new().with_modes(ModeSettings::new().with_gesture(true));
    let (mut dev, bus, _, hooks) = device(config);

    block_on(dev.suspend()).unwrap();
    assert_eq!(dev.power_state(), PowerState::Off);
    assert_eq!(bus.reg_writes(), [(Reg::PowerMode as u8, POWER_MODE_SLEEP)]);
    assert_eq!(hooks.calls(), [Call::Irq(IrqMode::Disabled), Call::Power(false), Call::Reset(false)]);
  }

  #[test]
  fn suspend_releases_contacts() {
    let (mut dev, bus, _, _) = device(Config::new());
    bus.push_frame(FrameBuilder::touch(1).point(0, 2, EVENT_DOWN, 10, 10, 0, 0).build());
    block_on(dev.service_interrupt()).unwrap();

    let events = block_on(dev.suspend()).unwrap();
    assert!(events.contains(&Event::AllUp));
    assert_eq!(dev.touched(), 0);

    // a second suspend is a no-op
    assert!(block_on(dev.suspend()).unwrap().is_empty());
  }

  #[test]
  fn resume_from_off_polls_chip_id() {
    let (mut dev, bus, delay, hooks) = device(Config::new());
    block_on(dev.suspend()).unwrap();
    hooks.clear();
    delay.clear();
    bus.clear_log();
    bus.script(Reg::ChipIdHigh.into(), &[Err(FakeError), Ok(0x00)]);

    block_on(dev.resume()).unwrap();
    assert_eq!(dev.power_state(), PowerState::On);
    assert_eq!(bus.read_count(Reg::ChipIdHigh.into()), 3);
    assert_eq!(hooks.calls(), [Call::Power(true), Call::Reset(false), Call::Reset(true), Call::Irq(IrqMode::Enabled)]);
    // mode registers replayed
    assert!(bus.reg_writes().contains(&(Reg::GloveMode as u8, 0)));
  }

  #[test]
  fn resume_timeout_leaves_device_off() {
    let (mut dev, bus, delay, _) = device(Config::new());
    block_on(dev.suspend()).unwrap();
    delay.clear();
    bus.set_reg(Reg::ChipIdHigh.into(), 0xEE);

    let err = block_on(dev.resume()).unwrap_err();
    assert!(matches!(err, Error::State(StateError::ResumeTimeout)));
    assert_eq!(dev.power_state(), PowerState::Off);

    let pauses = delay.pauses();
    assert_eq!(pauses[..2], [RESET_LOW_MS, RESET_SETTLE_MS]);
    assert!(pauses[2..].iter().all(|&ms| ms == READY_POLL_INTERVAL_MS));
    assert!(pauses[2..].iter().sum::<u32>() <= READY_TIMEOUT_MS);
    assert_eq!(bus.read_count(Reg::ChipIdHigh.into()), 5);
  }

  #[test]
  fn failed_replay_leaves_device_suspended() {
    let (mut dev, bus, _, hooks) = device(Config::new());
    block_on(dev.suspend()).unwrap();
    hooks.clear();
    bus.fail_writes(true);

    assert!(matches!(block_on(dev.resume()), Err(Error::Bus(_))));
    assert_eq!(dev.power_state(), PowerState::Off);
    assert_eq!(hooks.calls().last(), Some(&Call::Power(false)));

    // the next resume runs the whole sequence again
    bus.fail_writes(false);
    hooks.clear();
    block_on(dev.resume()).unwrap();
    assert_eq!(dev.power_state(), PowerState::On);
    assert_eq!(hooks.calls().last(), Some(&Call::Irq(IrqMode::Enabled)));
  }

  #[test]
  fn failed_low_power_write_keeps_device_on() {
    let config = Config::new().with_gesture(true).with_modes(ModeSettings::new().with_gesture(true));
    let (mut dev, bus, _, hooks) = device(config);
    bus.push_frame(FrameBuilder::touch(1).point(0, 2, EVENT_DOWN, 10, 10, 0, 0).build());
    block_on(dev.service_interrupt()).unwrap();
    bus.fail_writes(true);

    assert!(matches!(block_on(dev.suspend()), Err(Error::Bus(_))));
    assert_eq!(dev.power_state(), PowerState::On);
    assert_eq!(dev.touched(), 1 << 2);
    assert!(hooks.calls().is_empty());
  }

  #[test]
  fn resume_honours_abort() {
    let (mut dev, bus, _, _) = device(Config::new());
    block_on(dev.suspend()).unwrap();
    bus.clear_log();
    let abort = AtomicBool::new(true);

    let err = block_on(dev.resume_until(&abort)).unwrap_err();
    assert!(matches!(err, Error::State(StateError::ResumeAborted)));
    assert_eq!(dev.power_state(), PowerState::Off);
    assert_eq!(bus.read_count(Reg::ChipIdHigh.into()), 0);
  }

  #[test]
  fn wake_from_low_power() {
    let config = Config::new().with_proximity(true).with_modes(ModeSettings::new().with_proximity(true));
    let (mut dev, bus, _, hooks) = device(config);
    block_on(dev.suspend()).unwrap();
    assert_eq!(dev.power_state(), PowerState::LowPower);
    hooks.clear();
    bus.clear_log();

    block_on(dev.resume()).unwrap();
    assert_eq!(dev.power_state(), PowerState::On);
    // in-cell parts are not reset when leaving low power
    assert_eq!(hooks.calls(), [Call::Irq(IrqMode::Enabled)]);
    assert!(bus.reg_writes().contains(&(Reg::ProximityMode as u8, 1)));
    assert!(!bus.reg_writes().iter().any(|&(r, _)| r == Reg::GestureMode as u8));
  }

  #[test]
  fn upgrade_rejects_power_transitions() {
    let (mut dev, _, _, _) = device(Config::new());
    dev.begin_firmware_upgrade().unwrap();
    assert!(matches!(block_on(dev.suspend()), Err(Error::State(StateError::UpgradeInProgress))));
    assert_eq!(dev.power_state(), PowerState::On);
    dev.end_firmware_upgrade();
    block_on(dev.suspend()).unwrap();
    assert!(matches!(block_on(dev.resume()), Ok(_)));
  }

  #[test]
  fn shutdown_from_any_state() {
    let (mut dev, _, _, hooks) = device(Config::new());
    dev.begin_firmware_upgrade().unwrap();
    block_on(dev.shutdown()).unwrap();
    assert_eq!(dev.power_state(), PowerState::Off);
    assert!(hooks.calls().contains(&Call::Power(false)));
    assert!(matches!(block_on(dev.service_interrupt()), Err(Error::Io)));
  }
}
