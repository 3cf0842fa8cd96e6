use embedded_hal_async::delay::DelayNs;

/// Pause schedule between the attempts of a [`Retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Backoff {
  /// The same pause, in milliseconds, after every failed attempt.
  Fixed(u32),
  /// The pause grows by this many milliseconds after each failed attempt.
  Linear(u32),
}

/// Bounded retry budget.
///
/// Operations that borrow the device cannot be passed around as closures, so
/// the budget is driven from the call site:
///
/// ```ignore
/// let mut retry = Retry::new(3, Backoff::Fixed(1));
/// loop {
///   match bus.read(&cmd, &mut buf).await {
///     Ok(()) => break Ok(()),
///     Err(e) => {
///       if !retry.backoff(&mut delay).await {
///         break Err(e);
///       }
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Retry {
  attempts: u8,
  failed: u8,
  backoff: Backoff,
}

impl Retry {
  /// A budget of `attempts` tries in total, the first one included.
  pub const fn new(attempts: u8, backoff: Backoff) -> Self {
    Self { attempts, failed: 0, backoff }
  }

  /// Number of failed attempts recorded so far.
  pub const fn failures(&self) -> u8 {
    self.failed
  }

  /// Whether the budget has no attempts left.
  pub const fn exhausted(&self) -> bool {
    self.failed >= self.attempts
  }

  /// Record a failed attempt and return the pause before the next one, or
  /// `None` once the budget is spent.
  pub fn next_pause(&mut self) -> Option<u32> {
    self.failed = self.failed.saturating_add(1);
    if self.failed >= self.attempts {
      return None;
    }
    Some(match self.backoff {
      Backoff::Fixed(ms) => ms,
      Backoff::Linear(step) => step.saturating_mul(self.failed as u32),
    })
  }

  /// Record a failed attempt and sleep before the next one.
  ///
  /// Returns `false` when no attempt is left; nothing is slept in that case.
  pub async fn backoff<D: DelayNs>(&mut self, delay: &mut D) -> bool {
    match self.next_pause() {
      Some(0) => true,
      Some(ms) => {
        delay.delay_ms(ms).await;
        true
      }
      None => false,
    }
  }

  /// Longest total time this budget can sleep, in milliseconds.
  pub fn worst_case_ms(&self) -> u32 {
    let pauses = self.attempts.saturating_sub(1) as u32;
    match self.backoff {
      Backoff::Fixed(ms) => ms.saturating_mul(pauses),
      Backoff::Linear(step) => step.saturating_mul(pauses * (pauses + 1) / 2),
    }
  }
}
