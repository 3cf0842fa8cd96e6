//! Interrupt servicing: read a report, classify it, act on it.

use core::fmt::Debug;

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::digital::Wait;

use crate::bus::Bus;
use crate::decode::{decode, DecodeResult, ProtocolError};
use crate::defs::{Reg, NOT_READY, READ_ATTEMPTS, READ_BACKOFF_MS};
use crate::event::Events;
use crate::hooks::Hooks;
use crate::power::PowerState;
use crate::recovery::{Action, Route};
use crate::retry::{Backoff, Retry};
use crate::slots::TouchMask;
use crate::{Device, Error};

/// What became of one interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
  /// Touch or pen report applied to the trackers.
  Accepted,
  /// Gesture report handed to the gesture subsystem.
  Gesture,
  /// Contacts were released and the given recovery ran.
  Recovered(Action),
  /// Malformed report, contacts unchanged.
  Dropped(ProtocolError),
  /// Nothing to do: a report outside the current power state, a repeated
  /// fault inside an open recovery episode, or an upgrade owns the bus.
  Ignored,
  /// Firmware recovery failed every attempt. Cleared by the next good frame.
  Degraded,
}

/// Result of servicing one interrupt.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
  pub outcome: Outcome,
  /// Events for the input sink, in emission order.
  pub events: Events,
  /// Contacts down after this frame.
  pub touched: TouchMask,
}

impl<B, E, IRQ, D, H> Device<B, IRQ, D, H>
where
  B: Bus<Error = E>,
  E: Debug,
  IRQ: Wait,
  D: DelayNs,
  H: Hooks,
{
  /// Wait for the interrupt line to assert and service it.
  pub async fn next_frame(&mut self) -> Result<Frame, Error<E>> {
    self.irq.wait_for_low().await.map_err(|_| Error::Pin)?;
    self.service_interrupt().await
  }

  /// Read and act on one report.
  ///
  /// Ignored while a firmware upgrade owns the bus, refused while the
  /// controller is off. Bus failures are retried three times before
  /// surfacing; contacts stay as they were and the next interrupt tries
  /// again.
  pub async fn service_interrupt(&mut self) -> Result<Frame, Error<E>> {
    if self.power.upgrading() {
      trace!("interrupt during firmware upgrade");
      return Ok(self.frame(Outcome::Ignored, Events::new()));
    }
    let state = self.power.state();
    if state == PowerState::Off {
      return Err(Error::Io);
    }

    let (result, failure) = match self.read_frame().await {
      Ok(result) => (result, None),
      Err(e) => (DecodeResult::IoError, Some(e)),
    };
    let action = self.recovery.decide(&result, state, self.gesture_armed());
    trace!("{:?} -> {:?}", result, action);

    let (outcome, events) = match action {
      Action::Accept(Route::Slots) => {
        let events = match &result {
          DecodeResult::Ok(points, _) => self.slots.update(points),
          _ => Events::new(),
        };
        self.recovery.end_episode();
        (Outcome::Accepted, events)
      }
      Action::Accept(Route::Pen) => {
        let events = match &result {
          DecodeResult::PenFrame(sample) => self.slots.pen(sample),
          _ => Events::new(),
        };
        self.recovery.end_episode();
        (Outcome::Accepted, events)
      }
      Action::Accept(Route::Gesture) => {
        if let DecodeResult::GestureFrame(bytes) = &result {
          if self.hooks.on_gesture_frame(bytes).await.is_err() {
            warn!("gesture subsystem rejected frame");
          }
        }
        (Outcome::Gesture, Events::new())
      }
      Action::ReleaseAllAndRecoverFirmware => {
        let events = self.slots.release_all();
        let outcome = if self.recovery.begin_episode() {
          self.recover_firmware().await
        } else if self.recovery.degraded() {
          Outcome::Degraded
        } else {
          Outcome::Ignored
        };
        (outcome, events)
      }
      Action::ReleaseAllAndResyncState => {
        let events = self.resync().await?;
        (Outcome::Recovered(action), events)
      }
      Action::DropAndIgnore => match result.protocol_error() {
        Some(err) => {
          debug!("dropping frame: {:?}", err);
          (Outcome::Dropped(err), Events::new())
        }
        None => (Outcome::Ignored, Events::new()),
      },
      Action::Retry => {
        warn!("touch data read failed");
        return Err(failure.map_or(Error::Io, Error::Bus));
      }
    };

    Ok(self.frame(outcome, events))
  }

  /// Contacts currently down.
  pub fn touched(&self) -> TouchMask {
    self.slots.touched()
  }

  /// Lift every contact, key and the pen without touching the controller.
  pub fn release_all(&mut self) -> Events {
    self.slots.release_all()
  }

  fn frame(&self, outcome: Outcome, events: Events) -> Frame {
    Frame { outcome, events, touched: self.slots.touched() }
  }

  /// Read one report into the frame buffer and decode it.
  ///
  /// The buffer is primed with `0xFF` before every attempt. A read that
  /// keeps failing with the controller answering `0xEF` means the firmware
  /// is not running and is reported as [`DecodeResult::ErrorAllOnes`].
  async fn read_frame(&mut self) -> Result<DecodeResult, E> {
    let len = self.config.frame_len();
    let mut retry = Retry::new(READ_ATTEMPTS, Backoff::Fixed(READ_BACKOFF_MS));
    loop {
      let buf = &mut self.buf[..len];
      buf.fill(0xFF);
      buf[0] = Reg::TouchData.into();
      let (cmd, data) = buf.split_at_mut(1);
      match self.bus.read(cmd, data).await {
        Ok(()) => return Ok(decode(&self.buf[..len], &self.config)),
        Err(e) => {
          if !retry.backoff(&mut self.delay).await {
            if self.buf[1] == NOT_READY {
              warn!("touch data read refused, controller not ready");
              return Ok(DecodeResult::ErrorAllOnes);
            }
            return Err(e);
          }
        }
      }
    }
  }

  /// Run firmware recovery until it succeeds or the budget is spent.
  async fn recover_firmware(&mut self) -> Outcome {
    loop {
      match self.hooks.recover().await {
        Ok(()) => return Outcome::Recovered(Action::ReleaseAllAndRecoverFirmware),
        Err(_) => match self.recovery.record_failure() {
          Some(ms) => {
            warn!("firmware recovery failed, retrying in {}ms", ms);
            self.delay.delay_ms(ms).await;
          }
          None => {
            error!("firmware recovery failed, touch degraded");
            return Outcome::Degraded;
          }
        },
      }
    }
  }
}
