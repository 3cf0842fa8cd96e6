//! What to do with a decoded frame.
//!
//! [`RecoveryPolicy::decide`] maps a [`DecodeResult`] and the power state to
//! an [`Action`]. Firmware recovery is debounced: it runs once when a fault
//! episode opens and not again until a good frame closes the episode.

use crate::decode::DecodeResult;
use crate::defs::{RECOVERY_ATTEMPTS, RECOVERY_BACKOFF_MS};
use crate::power::PowerState;
use crate::retry::{Backoff, Retry};

/// Consumer of an accepted frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Route {
  Slots,
  Pen,
  Gesture,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Action {
  Accept(Route),
  /// Lift every contact and let the firmware recovery collaborator check
  /// the controller.
  ReleaseAllAndRecoverFirmware,
  /// Lift every contact and replay the mode registers.
  ReleaseAllAndResyncState,
  /// Drop the frame. Contacts stay as they were.
  DropAndIgnore,
  /// Transport failure; the next interrupt tries again.
  Retry,
}

#[derive(Debug, Clone, Copy)]
pub struct RecoveryPolicy {
  episode: bool,
  budget: Retry,
  degraded: bool,
}

impl RecoveryPolicy {
  pub const fn new() -> Self {
    Self { episode: false, budget: Self::budget(), degraded: false }
  }

  const fn budget() -> Retry {
    Retry::new(RECOVERY_ATTEMPTS, Backoff::Fixed(RECOVERY_BACKOFF_MS))
  }

  /// Decide what to do with `result`.
  ///
  /// Only gesture frames get through in low power, and only when wake
  /// gestures are armed. Gesture frames are dropped while on. Nothing gets
  /// through while the device is off.
  pub fn decide(&self, result: &DecodeResult, state: PowerState, gesture_armed: bool) -> Action {
    match (state, result) {
      (PowerState::Off, _) => Action::DropAndIgnore,
      (PowerState::LowPower, DecodeResult::GestureFrame(_)) if gesture_armed => Action::Accept(Route::Gesture),
      (PowerState::LowPower, _) => Action::DropAndIgnore,
      (PowerState::On, result) => match result {
        DecodeResult::Ok(..) => Action::Accept(Route::Slots),
        DecodeResult::PenFrame(_) => Action::Accept(Route::Pen),
        DecodeResult::ErrorAllOnes => Action::ReleaseAllAndRecoverFirmware,
        DecodeResult::FirmwareReinit => Action::ReleaseAllAndResyncState,
        DecodeResult::IoError => Action::Retry,
        DecodeResult::GestureFrame(_)
        | DecodeResult::ErrorBadCount(_)
        | DecodeResult::ErrorBadId(_)
        | DecodeResult::ErrorEmpty
        | DecodeResult::Unknown(_) => Action::DropAndIgnore,
      },
    }
  }

  /// Open a fault episode. Returns `true` if none was open, meaning firmware
  /// recovery should run now.
  pub fn begin_episode(&mut self) -> bool {
    if self.episode {
      return false;
    }
    info!("recovery episode opened");
    self.episode = true;
    self.budget = Self::budget();
    true
  }

  /// Close the current episode after a good frame.
  pub fn end_episode(&mut self) {
    if self.episode {
      info!("recovery episode closed");
    }
    self.episode = false;
    self.degraded = false;
  }

  /// Record a failed recovery attempt. Returns the pause before the next
  /// attempt, or `None` once the budget is spent and the device is degraded.
  pub fn record_failure(&mut self) -> Option<u32> {
    let pause = self.budget.next_pause();
    if pause.is_none() {
      self.degraded = true;
    }
    pause
  }

  pub fn in_episode(&self) -> bool {
    self.episode
  }

  pub fn degraded(&self) -> bool {
    self.degraded
  }
}

impl Default for RecoveryPolicy {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::decode::{GestureBytes, Points};
  use crate::event::PenSample;

  fn ok() -> DecodeResult {
    DecodeResult::Ok(Points::new(), 1)
  }

  #[test]
  fn on_state_mapping() {
    let p = RecoveryPolicy::new();
    let on = PowerState::On;
    assert_eq!(p.decide(&ok(), on, false), Action::Accept(Route::Slots));
    assert_eq!(p.decide(&DecodeResult::PenFrame(PenSample::default()), on, false), Action::Accept(Route::Pen));
    assert_eq!(p.decide(&DecodeResult::ErrorAllOnes, on, false), Action::ReleaseAllAndRecoverFirmware);
    assert_eq!(p.decide(&DecodeResult::FirmwareReinit, on, false), Action::ReleaseAllAndResyncState);
    assert_eq!(p.decide(&DecodeResult::ErrorBadCount(11), on, false), Action::DropAndIgnore);
    assert_eq!(p.decide(&DecodeResult::ErrorBadId(7), on, false), Action::DropAndIgnore);
    assert_eq!(p.decide(&DecodeResult::ErrorEmpty, on, false), Action::DropAndIgnore);
    assert_eq!(p.decide(&DecodeResult::Unknown(5), on, false), Action::DropAndIgnore);
    assert_eq!(p.decide(&DecodeResult::IoError, on, false), Action::Retry);
  }

  #[test]
  fn gesture_frames_need_armed_gestures() {
    let p = RecoveryPolicy::new();
    let frame = DecodeResult::GestureFrame(GestureBytes::new());
    assert_eq!(p.decide(&frame, PowerState::LowPower, true), Action::Accept(Route::Gesture));
    assert_eq!(p.decide(&frame, PowerState::LowPower, false), Action::DropAndIgnore);
    assert_eq!(p.decide(&frame, PowerState::On, false), Action::DropAndIgnore);
    assert_eq!(p.decide(&frame, PowerState::On, true), Action::DropAndIgnore);
  }

  #[test]
  fn low_power_and_off_drop_touches() {
    let p = RecoveryPolicy::new();
    assert_eq!(p.decide(&ok(), PowerState::LowPower, true), Action::DropAndIgnore);
    assert_eq!(p.decide(&DecodeResult::ErrorAllOnes, PowerState::LowPower, true), Action::DropAndIgnore);
    assert_eq!(p.decide(&ok(), PowerState::Off, true), Action::DropAndIgnore);
    let frame = DecodeResult::GestureFrame(GestureBytes::new());
    assert_eq!(p.decide(&frame, PowerState::Off, true), Action::DropAndIgnore);
  }

  #[test]
  fn episodes_are_debounced() {
    let mut p = RecoveryPolicy::new();
    assert!(p.begin_episode());
    assert!(!p.begin_episode());
    assert!(p.in_episode());
    p.end_episode();
    assert!(p.begin_episode());
  }

  #[test]
  fn failure_budget_degrades() {
    let mut p = RecoveryPolicy::new();
    p.begin_episode();
    assert_eq!(p.record_failure(), Some(RECOVERY_BACKOFF_MS));
    assert_eq!(p.record_failure(), Some(RECOVERY_BACKOFF_MS));
    assert!(!p.degraded());
    assert_eq!(p.record_failure(), None);
    assert!(p.degraded());

    // a good frame clears the signal and the next episode gets a new budget
    p.end_episode();
    assert!(!p.degraded());
    p.begin_episode();
    assert_eq!(p.record_failure(), Some(RECOVERY_BACKOFF_MS));
  }
}
