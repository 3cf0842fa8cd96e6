use core::fmt::Debug;
use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::{Mutex, MutexGuard};
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::digital::Wait;

use crate::bus::Bus;
use crate::event::Events;
use crate::hooks::Hooks;
use crate::irq::Frame;
use crate::slots::TouchMask;
use crate::{Device, Error};

/// A [`Device`] shared between the interrupt task and power management.
///
/// Every call takes the lock for its whole duration, so a report is never
/// read halfway through a power transition. A suspend or shutdown raises an
/// abort flag before queueing for the lock; a resume stuck polling for the
/// chip id sees it and gives up with
/// [`StateError::ResumeAborted`](crate::StateError::ResumeAborted).
///
/// The interrupt task should wait on its interrupt line outside the lock and
/// then call [`Shared::service_interrupt`].
pub struct Shared<M: RawMutex, T> {
  device: Mutex<M, T>,
  abort: AtomicBool,
}

impl<M: RawMutex, T> Shared<M, T> {
  pub const fn new(device: T) -> Self {
    Self { device: Mutex::new(device), abort: AtomicBool::new(false) }
  }

  /// Exclusive access for everything without a dedicated method.
  pub async fn lock(&self) -> MutexGuard<'_, M, T> {
    self.device.lock().await
  }

  pub fn into_inner(self) -> T {
    self.device.into_inner()
  }
}

impl<M, B, E, IRQ, D, H> Shared<M, Device<B, IRQ, D, H>>
where
  M: RawMutex,
  B: Bus<Error = E>,
  E: Debug,
  IRQ: Wait,
  D: DelayNs,
  H: Hooks,
{
  pub async fn service_interrupt(&self) -> Result<Frame, Error<E>> {
    self.device.lock().await.service_interrupt().await
  }

  pub async fn touched(&self) -> TouchMask {
    self.device.lock().await.touched()
  }

  pub async fn suspend(&self) -> Result<Events, Error<E>> {
    let mut device = self.preempt().await;
    device.suspend().await
  }

  pub async fn shutdown(&self) -> Result<Events, Error<E>> {
    let mut device = self.preempt().await;
    device.shutdown().await
  }

  /// Resume, giving up if a suspend or shutdown comes in meanwhile.
  pub async fn resume(&self) -> Result<Events, Error<E>> {
    let mut device = self.device.lock().await;
    device.resume_until(&self.abort).await
  }

  async fn preempt(&self) -> MutexGuard<'_, M, Device<B, IRQ, D, H>> {
    self.abort.store(true, Ordering::Release);
    let device = self.device.lock().await;
    self.abort.store(false, Ordering::Release);
    device
  }
}
