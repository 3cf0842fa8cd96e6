use crate::defs::{MAX_GESTURE_LEN, MAX_TOUCH_NUMBER, ONE_TCH_LEN, ONE_TCH_LEN_V2, PEN_LEN};

use super::ConfigError;

/// Position and stride of the point records inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Records {
  /// Index of the first record.
  pub offset: usize,
  /// Distance between two consecutive records.
  pub stride: usize,
}

impl Records {
  pub const fn new(offset: usize, stride: usize) -> Self {
    Self { offset, stride }
  }

  /// Index of record `n`.
  pub const fn base(&self, n: usize) -> usize {
    self.offset + self.stride * n
  }

  /// Bytes needed to hold `count` records.
  pub const fn end(&self, count: usize) -> usize {
    self.base(count)
  }
}

/// Field offsets within a single point record.
///
/// ```text
///  +0  event[7:6] | x[11:8]      (palm flag in bit 4 on palm capable parts)
///  +1  x[7:0]
///  +2  id[7:4]    | y[11:8]
///  +3  y[7:0]
///  +4  pressure / hi-res x,y low nibbles (v2)
///  +5  area
///  +6  minor axis (v2 only)
///  +7  pressure   (v2 only)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Fields {
  pub event_x_high: usize,
  pub x_low: usize,
  pub id_y_high: usize,
  pub y_low: usize,
  pub pressure: usize,
  pub area: usize,
  pub minor: usize,
  pub misc: usize,
}

impl Fields {
  pub const fn new() -> Self {
    Self { event_x_high: 0, x_low: 1, id_y_high: 2, y_low: 3, pressure: 4, area: 5, minor: 6, misc: 7 }
  }

  const fn span_v1(&self) -> usize {
    max6(self.event_x_high, self.x_low, self.id_y_high, self.y_low, self.pressure, self.area) + 1
  }

  const fn span_v2(&self) -> usize {
    let a = self.span_v1();
    let b = 1 + if self.minor > self.misc { self.minor } else { self.misc };
    if a > b {
      a
    } else {
      b
    }
  }
}

impl Default for Fields {
  fn default() -> Self {
    Self::new()
  }
}

const fn max6(a: usize, b: usize, c: usize, d: usize, e: usize, f: usize) -> usize {
  let mut m = a;
  let all = [b, c, d, e, f];
  let mut i = 0;
  while i < all.len() {
    if all[i] > m {
      m = all[i];
    }
    i += 1;
  }
  m
}

/// Offsets of a touch report. These come from the controller's device table
/// and differ between chip families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Layout {
  pub gesture_offset: usize,
  pub gesture_len: usize,
  /// Index of the status byte: frame type in the high nibble, point count in
  /// the low nibble. Pen fields follow it directly.
  pub status_offset: usize,
  pub points: Records,
  pub points_v2: Records,
  pub fields: Fields,
  /// Bit of the event/x-high byte carrying the palm flag.
  pub palm_mask: u8,
}

impl Layout {
  pub const fn new() -> Self {
    Self {
      gesture_offset: 1,
      gesture_len: 1,
      status_offset: 2,
      points: Records::new(3, ONE_TCH_LEN),
      points_v2: Records::new(5, ONE_TCH_LEN_V2),
      fields: Fields::new(),
      palm_mask: 0x10,
    }
  }

  pub const fn with_status_offset(mut self, offset: usize) -> Self {
    self.status_offset = offset;
    self
  }

  pub const fn with_gesture_area(mut self, offset: usize, len: usize) -> Self {
    self.gesture_offset = offset;
    self.gesture_len = len;
    self
  }

  pub const fn with_points(mut self, records: Records) -> Self {
    self.points = records;
    self
  }

  pub const fn with_points_v2(mut self, records: Records) -> Self {
    self.points_v2 = records;
    self
  }

  pub const fn with_fields(mut self, fields: Fields) -> Self {
    self.fields = fields;
    self
  }

  pub const fn with_palm_mask(mut self, mask: u8) -> Self {
    self.palm_mask = mask;
    self
  }

  /// Number of bytes to read so that any frame variant for `max_touch`
  /// points fits.
  pub const fn frame_len(&self, max_touch: usize) -> usize {
    let v1 = self.points.end(max_touch);
    let v2 = self.points_v2.end(max_touch);
    let pen = self.status_offset + 1 + PEN_LEN;
    let gesture = self.gesture_offset + self.gesture_len;
    let mut len = if v1 > v2 { v1 } else { v2 };
    if pen > len {
      len = pen;
    }
    if gesture > len {
      len = gesture;
    }
    len
  }

  pub(crate) fn validate(&self, frame_cap: usize) -> Result<(), ConfigError> {
    if self.points.stride < self.fields.span_v1() || self.points_v2.stride < self.fields.span_v2() {
      return Err(ConfigError::ShortStride);
    }
    if self.points.offset <= self.status_offset || self.points_v2.offset <= self.status_offset {
      return Err(ConfigError::RecordOverlap);
    }
    if self.gesture_len > MAX_GESTURE_LEN {
      return Err(ConfigError::GestureTooLong(self.gesture_len));
    }
    let len = self.frame_len(MAX_TOUCH_NUMBER);
    if len > frame_cap {
      return Err(ConfigError::FrameTooLong(len));
    }
    Ok(())
  }
}

impl Default for Layout {
  fn default() -> Self {
    Self::new()
  }
}
