#![cfg_attr(not(test), no_std)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Async, `no_std` protocol core for FocalTech-style capacitive touchscreen
//! controllers.
//!
//! The crate owns everything between the interrupt line and the input
//! events: reading and classifying touch reports, tracking contacts across
//! frames, and keeping the controller healthy through suspend, resume and
//! firmware faults. Platform concerns stay behind small traits:
//!
//! - [`Bus`] moves bytes; [`I2cBus`] and [`SpiBus`] wrap `embedded-hal-async`
//!   peripherals
//! - [`Hooks`] drives reset, supply and interrupt routing, and hands over to
//!   firmware recovery and gesture decoding
//! - `embedded-hal-async` [`Wait`] and [`DelayNs`] supply the interrupt line
//!   and the clock
//!
//! ```ignore
//! use fts_core::{Config, Device, Event, I2cBus};
//!
//! async fn run<I, IRQ, D>(i2c: I, irq: IRQ, delay: D) -> Result<(), fts_core::Error<I::Error>>
//! where
//!   I: embedded_hal_async::i2c::I2c,
//!   IRQ: embedded_hal_async::digital::Wait,
//!   D: embedded_hal_async::delay::DelayNs,
//! {
//!   let mut touch = Device::new(I2cBus::new(i2c), irq, delay, (), Config::new())?;
//!   touch.probe().await?;
//!   loop {
//!     let frame = touch.next_frame().await?;
//!     for event in frame.events {
//!       if let Event::Slot(slot) = event {
//!         // forward to the input stack
//!       }
//!     }
//!   }
//! }
//! ```

// fmt must stay first, the other modules use its macros
#[macro_use]
mod fmt;

mod bus;
mod config;
mod decode;
mod defs;
mod event;
mod hooks;
mod identity;
mod irq;
mod modes;
mod power;
mod recovery;
mod retry;
mod shared;
mod slots;
#[cfg(test)]
mod testing;

use core::fmt::Debug;

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::digital::Wait;

pub use bus::{Bus, I2cBus, SpiBus, I2C_ADDR};
pub use config::*;
pub use decode::{decode, DecodeResult, GestureBytes, Points, ProtocolError};
pub use defs::{
  DEFAULT_AREA, DEFAULT_PRESSURE, FRAME_GESTURE, FRAME_PEN, FRAME_TOUCH, FRAME_TOUCH_V2, KEY_DIM, MAX_EVENTS,
  MAX_FRAME_LEN, MAX_ID, MAX_KEYS, MAX_TOUCH_NUMBER,
};
pub use event::*;
pub use hooks::{FirmwareRecovery, GestureSubsystem, Hooks, IrqMode, PowerControl};
pub use identity::ChipIdentity;
pub use irq::{Frame, Outcome};
pub use power::{PowerState, PowerStateMachine, Transition};
pub use recovery::{Action, RecoveryPolicy, Route};
pub use retry::{Backoff, Retry};
pub use shared::Shared;
pub use slots::{SlotState, SlotTracker, TouchMask};

/// Errors that can occur while driving the controller.
#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
  /// Bus transaction failed with the underlying driver error.
  Bus(E),
  /// The controller is powered off.
  Io,
  /// The interrupt line or a power hook failed.
  Pin,
  /// The controller answered with a chip id this configuration does not
  /// accept.
  InvalidChipId(u8),
  /// The operation is not allowed in the current power state.
  State(StateError),
  Config(ConfigError),
  /// Repeated health check failures and a reset did not bring the
  /// controller back.
  Degraded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StateError {
  /// The controller did not report a valid chip id in time.
  ResumeTimeout,
  /// A suspend or shutdown preempted the resume.
  ResumeAborted,
  /// A firmware upgrade owns the bus.
  UpgradeInProgress,
}

/// One touch controller.
///
/// Owns the bus, the interrupt line, a delay source and the platform hooks.
/// Create it with [`Device::new`], bring the controller up with
/// [`Device::probe`], then call [`Device::next_frame`] in a loop. Power
/// management goes through [`Device::suspend`] and [`Device::resume`]; wrap
/// the device in a [`Shared`] when those run on another task.
pub struct Device<B, IRQ, D, H = ()> {
  bus: B,
  irq: IRQ,
  delay: D,
  hooks: H,
  config: Config,
  identity: Option<ChipIdentity>,
  modes: ModeSettings,
  power: PowerStateMachine,
  slots: SlotTracker,
  recovery: RecoveryPolicy,
  buf: [u8; MAX_FRAME_LEN],
  health_failures: u8,
}

impl<B, E, IRQ, D, H> Device<B, IRQ, D, H>
where
  B: Bus<Error = E>,
  E: Debug,
  IRQ: Wait,
  D: DelayNs,
  H: Hooks,
{
  /// Create a device. Nothing is sent to the controller until
  /// [`Device::probe`].
  pub fn new(bus: B, irq: IRQ, delay: D, hooks: H, config: Config) -> Result<Self, Error<E>> {
    config.validate().map_err(Error::Config)?;
    Ok(Self {
      bus,
      irq,
      delay,
      hooks,
      config,
      identity: None,
      modes: config.modes,
      power: PowerStateMachine::new(),
      slots: SlotTracker::new(&config),
      recovery: RecoveryPolicy::new(),
      buf: [0xFF; MAX_FRAME_LEN],
      health_failures: 0,
    })
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  /// Identity read by the last successful probe.
  pub fn identity(&self) -> Option<ChipIdentity> {
    self.identity
  }

  pub fn slots(&self) -> &SlotTracker {
    &self.slots
  }

  /// Give the peripherals back.
  pub fn release(self) -> (B, IRQ, D, H) {
    (self.bus, self.irq, self.delay, self.hooks)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::{Asserted, FakeBus, Recorder, RecordingDelay};

  #[test]
  fn invalid_config_is_rejected() {
    let config = Config::new().with_max_touch_number(11);
    let res = Device::new(FakeBus::new(), Asserted, RecordingDelay::default(), Recorder::default(), config);
    assert!(matches!(res, Err(Error::Config(ConfigError::TouchNumber(11)))));
  }

  #[test]
  fn new_device_is_off_and_unprobed() {
    let dev = Device::new(FakeBus::new(), Asserted, RecordingDelay::default(), (), Config::new()).unwrap();
    assert_eq!(dev.power_state(), PowerState::Off);
    assert_eq!(dev.identity(), None);
    assert_eq!(dev.slots().touched(), 0);
  }
}
