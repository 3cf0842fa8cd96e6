use crate::defs::{PEN_BUTTON1, PEN_BUTTON2, PEN_INRANGE, PEN_TIP};

/// Stylus report decoded from a pen frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PenSample {
  pub x: u16,
  pub y: u16,
  /// 12-bit tip pressure.
  pub pressure: u16,
  pub tip: bool,
  pub inrange: bool,
  pub button1: bool,
  pub button2: bool,
  pub tilt_x: i16,
  pub tilt_y: i16,
  pub azimuth: u16,
}

impl PenSample {
  pub(crate) const fn with_flags(mut self, flags: u8) -> Self {
    self.tip = flags & PEN_TIP != 0;
    self.inrange = flags & PEN_INRANGE != 0;
    self.button1 = flags & PEN_BUTTON1 != 0;
    self.button2 = flags & PEN_BUTTON2 != 0;
    self
  }
}

/// Stylus update sent to the sink. `tip` is false exactly once, on lift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PenEvent {
  pub x: u16,
  pub y: u16,
  pub pressure: u16,
  pub inrange: bool,
  pub tip: bool,
  pub tilt_x: i16,
  pub tilt_y: i16,
  pub button1: bool,
  pub button2: bool,
}

impl PenEvent {
  pub(crate) const fn from_sample(s: &PenSample, tip: bool) -> Self {
    Self {
      x: s.x,
      y: s.y,
      pressure: s.pressure,
      inrange: s.inrange,
      tip,
      tilt_x: s.tilt_x,
      tilt_y: s.tilt_y,
      button1: s.button1,
      button2: s.button2,
    }
  }
}
