/// Runtime mode toggles. The controller loses them on every reset, so the
/// device keeps the last requested values and replays them on resync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ModeSettings {
  pub glove: bool,
  pub cover: bool,
  pub charger: bool,
  pub gesture: bool,
  pub proximity: bool,
}

impl ModeSettings {
  pub const fn new() -> Self {
    Self { glove: false, cover: false, charger: false, gesture: false, proximity: false }
  }

  pub const fn with_glove(mut self, on: bool) -> Self {
    self.glove = on;
    self
  }

  pub const fn with_cover(mut self, on: bool) -> Self {
    self.cover = on;
    self
  }

  pub const fn with_charger(mut self, on: bool) -> Self {
    self.charger = on;
    self
  }

  pub const fn with_gesture(mut self, on: bool) -> Self {
    self.gesture = on;
    self
  }

  pub const fn with_proximity(mut self, on: bool) -> Self {
    self.proximity = on;
    self
  }
}
