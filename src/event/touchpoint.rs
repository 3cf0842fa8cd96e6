use crate::defs::{EVENT_CONTACT, EVENT_DOWN, EVENT_UP};

/// Event kind of a point record, bits 7..6 of its first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TouchEventKind {
  Down,
  Up,
  Contact,
  Reserved,
}

impl TouchEventKind {
  pub const fn from_bits(bits: u8) -> Self {
    match bits & 0x03 {
      EVENT_DOWN => Self::Down,
      EVENT_UP => Self::Up,
      EVENT_CONTACT => Self::Contact,
      _ => Self::Reserved,
    }
  }

  /// `Down` and `Contact` both mean the finger is on the panel.
  pub const fn is_down(self) -> bool {
    matches!(self, Self::Down | Self::Contact)
  }

  pub const fn is_up(self) -> bool {
    matches!(self, Self::Up)
  }
}

/// One decoded contact record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TouchPoint {
  pub id: u8,
  pub x: u16,
  pub y: u16,
  pub kind: TouchEventKind,
  pub pressure: u8,
  pub area_major: u8,
  pub area_minor: u8,
  pub palm: bool,
}

impl TouchPoint {
  pub const fn new(id: u8, x: u16, y: u16, kind: TouchEventKind) -> Self {
    Self { id, x, y, kind, pressure: 0, area_major: 0, area_minor: 0, palm: false }
  }

  pub const fn with_area(mut self, major: u8, minor: u8) -> Self {
    self.area_major = major;
    self.area_minor = minor;
    self
  }

  pub const fn with_pressure(mut self, pressure: u8) -> Self {
    self.pressure = pressure;
    self
  }

  pub const fn with_palm(mut self, palm: bool) -> Self {
    self.palm = palm;
    self
  }
}
