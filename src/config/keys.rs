use crate::defs::MAX_KEYS;

/// Centre of a virtual key drawn outside the active area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyBox {
  pub x: u16,
  pub y: u16,
}

impl KeyBox {
  pub const fn new(x: u16, y: u16) -> Self {
    Self { x, y }
  }

  /// Whether `(x, y)` lies within `dim` of the key centre on both axes.
  pub const fn contains(&self, x: u16, y: u16, dim: u16) -> bool {
    x.abs_diff(self.x) <= dim && y.abs_diff(self.y) <= dim
  }
}

/// Index of the first key whose box contains `(x, y)`.
pub(crate) fn hit(keys: &[Option<KeyBox>; MAX_KEYS], x: u16, y: u16, dim: u16) -> Option<u8> {
  keys
    .iter()
    .enumerate()
    .find_map(|(i, k)| k.filter(|k| k.contains(x, y, dim)).map(|_| i as u8))
}
