mod keys;
mod layout;
mod settings;

pub use keys::*;
pub use layout::*;
pub use settings::*;

use crate::defs::{KEY_DIM, MAX_CHIP_IDS, MAX_FRAME_LEN, MAX_KEYS, MAX_TOUCH_NUMBER};
use crate::ChipIdentity;

/// Multi-touch reporting model of the event sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MtProtocol {
  /// Anonymous contacts: every frame carries the full contact list, lifts
  /// are implied by absence.
  A,
  /// Tracked slots: each contact keeps its slot until an explicit leave.
  B,
}

/// Malformed configuration. Only raised while building a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
  /// `max_touch_number` outside `2..=10`.
  TouchNumber(u8),
  /// Virtual keys configured with a zero hit box.
  KeyDim,
  /// A record stride is shorter than the fields it must hold.
  ShortStride,
  /// Point records start at or before the status byte.
  RecordOverlap,
  /// The largest frame would not fit the frame buffer.
  FrameTooLong(usize),
  /// The gesture area is longer than the gesture pipeline accepts.
  GestureTooLong(usize),
}

/// Static description of the panel and the controller driving it.
///
/// The defaults describe a 10-point in-cell panel speaking protocol B with
/// no virtual keys. Adjust them with the `with_*` helpers:
///
/// ```ignore
/// use fts_core::{Config, KeyBox, MtProtocol};
///
/// let config = Config::new()
///   .with_max_touch_number(5)
///   .with_keys([Some(KeyBox::new(90, 1360)), Some(KeyBox::new(540, 1360)), None, None])
///   .with_protocol(MtProtocol::B)
///   .with_gesture(true);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
  pub max_touch_number: u8,
  /// Report the pressure byte instead of aliasing it with the minor axis.
  pub report_pressure: bool,
  pub mt_protocol: MtProtocol,
  pub key_boxes: [Option<KeyBox>; MAX_KEYS],
  pub key_dim: u16,
  pub is_incell_chip: bool,
  pub gesture_capable: bool,
  pub proximity_capable: bool,
  pub layout: Layout,
  /// Chip the driver expects to find.
  pub chip: ChipIdentity,
  /// Other accepted high chip id bytes, `0` marks an unused entry.
  pub alt_chip_ids: [u8; MAX_CHIP_IDS],
  /// Mode registers applied on the first resync.
  pub modes: ModeSettings,
}

impl Config {
  pub const fn new() -> Self {
    Self {
      max_touch_number: MAX_TOUCH_NUMBER as u8,
      report_pressure: false,
      mt_protocol: MtProtocol::B,
      key_boxes: [None; MAX_KEYS],
      key_dim: KEY_DIM,
      is_incell_chip: true,
      gesture_capable: false,
      proximity_capable: false,
      layout: Layout::new(),
      chip: ChipIdentity::new(0x54, 0x52, 0x81),
      alt_chip_ids: [0; MAX_CHIP_IDS],
      modes: ModeSettings::new(),
    }
  }

  pub const fn with_max_touch_number(mut self, n: u8) -> Self {
    self.max_touch_number = n;
    self
  }

  pub const fn with_pressure(mut self, on: bool) -> Self {
    self.report_pressure = on;
    self
  }

  pub const fn with_protocol(mut self, protocol: MtProtocol) -> Self {
    self.mt_protocol = protocol;
    self
  }

  pub const fn with_keys(mut self, keys: [Option<KeyBox>; MAX_KEYS]) -> Self {
    self.key_boxes = keys;
    self
  }

  pub const fn with_key_dim(mut self, dim: u16) -> Self {
    self.key_dim = dim;
    self
  }

  pub const fn with_incell(mut self, incell: bool) -> Self {
    self.is_incell_chip = incell;
    self
  }

  pub const fn with_gesture(mut self, capable: bool) -> Self {
    self.gesture_capable = capable;
    self
  }

  pub const fn with_proximity(mut self, capable: bool) -> Self {
    self.proximity_capable = capable;
    self
  }

  pub const fn with_layout(mut self, layout: Layout) -> Self {
    self.layout = layout;
    self
  }

  pub const fn with_chip(mut self, chip: ChipIdentity) -> Self {
    self.chip = chip;
    self
  }

  pub const fn with_alt_chip_ids(mut self, ids: [u8; MAX_CHIP_IDS]) -> Self {
    self.alt_chip_ids = ids;
    self
  }

  pub const fn with_modes(mut self, modes: ModeSettings) -> Self {
    self.modes = modes;
    self
  }

  /// Number of bytes read for every frame.
  pub const fn frame_len(&self) -> usize {
    self.layout.frame_len(self.max_touch_number as usize)
  }

  pub(crate) const fn max_touch(&self) -> usize {
    self.max_touch_number as usize
  }

  pub(crate) fn has_keys(&self) -> bool {
    self.key_boxes.iter().any(Option::is_some)
  }

  /// Whether `id_high` belongs to the expected chip or an accepted variant.
  pub fn accepts_chip(&self, id_high: u8) -> bool {
    id_high == self.chip.chip_id_high || (id_high != 0 && self.alt_chip_ids.contains(&id_high))
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if !(2..=MAX_TOUCH_NUMBER as u8).contains(&self.max_touch_number) {
      return Err(ConfigError::TouchNumber(self.max_touch_number));
    }
    if self.has_keys() && self.key_dim == 0 {
      return Err(ConfigError::KeyDim);
    }
    self.layout.validate(MAX_FRAME_LEN)
  }
}

impl Default for Config {
  fn default() -> Self {
    Self::new()
  }
}
