//! Touch report decoding.
//!
//! [`decode`] turns one raw report into a [`DecodeResult`]. It never fails:
//! malformed frames come back as one of the `Error*` variants and the caller
//! decides what to do with them.

use crate::config::{Config, Layout};
use crate::defs::*;
use crate::event::{PenSample, TouchEventKind, TouchPoint};

/// Points accepted from one frame.
pub type Points = heapless::Vec<TouchPoint, MAX_TOUCH_NUMBER>;

/// Payload of a gesture frame.
pub type GestureBytes = heapless::Vec<u8, MAX_GESTURE_LEN>;

/// Classification of one raw report.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeResult {
  /// Accepted points and the point count announced by the status byte.
  Ok(Points, u8),
  GestureFrame(GestureBytes),
  PenFrame(PenSample),
  /// All-0xFF fault pattern, or a read the controller refused.
  ErrorAllOnes,
  /// Announced point count larger than `max_touch_number`.
  ErrorBadCount(u8),
  /// Structurally invalid id: beyond `max_touch_number`, repeated, or a
  /// down contact in a frame announcing no points.
  ErrorBadId(u8),
  /// No point record in the frame.
  ErrorEmpty,
  /// Controller firmware signalled it just (re)booted.
  FirmwareReinit,
  /// Frame type nibble this core does not know.
  Unknown(u8),
  /// Transport failure.
  IoError,
}

/// Decoder rejections, as reported to the event sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolError {
  AllOnes,
  BadCount(u8),
  BadId(u8),
  Empty,
  Unknown(u8),
}

impl DecodeResult {
  /// The protocol error this result stands for, if any.
  pub fn protocol_error(&self) -> Option<ProtocolError> {
    match *self {
      DecodeResult::ErrorAllOnes => Some(ProtocolError::AllOnes),
      DecodeResult::ErrorBadCount(n) => Some(ProtocolError::BadCount(n)),
      DecodeResult::ErrorBadId(id) => Some(ProtocolError::BadId(id)),
      DecodeResult::ErrorEmpty => Some(ProtocolError::Empty),
      DecodeResult::Unknown(t) => Some(ProtocolError::Unknown(t)),
      _ => None,
    }
  }

  pub fn is_ok(&self) -> bool {
    matches!(self, DecodeResult::Ok(..))
  }
}

/// Read-only view of a frame. Bytes past the end read as `0xFF`, the value
/// the frame buffer is primed with before every read.
struct Raw<'a>(&'a [u8]);

impl Raw<'_> {
  fn at(&self, i: usize) -> u8 {
    self.0.get(i).copied().unwrap_or(0xFF)
  }

  fn all_ones(&self, from: usize, to: usize) -> bool {
    (from..=to).all(|i| self.at(i) == 0xFF)
  }

  fn be_u16(&self, i: usize) -> u16 {
    u16::from_be_bytes([self.at(i), self.at(i + 1)])
  }

  /// 12-bit value from a high nibble and a low byte.
  fn coord12(&self, hi: usize, lo: usize) -> u16 {
    (((self.at(hi) & 0x0F) as u16) << 8) | self.at(lo) as u16
  }
}

/// Decode one raw report.
///
/// Pure: the result depends on `buf` and `config` only.
pub fn decode(buf: &[u8], config: &Config) -> DecodeResult {
  let raw = Raw(buf);
  let layout = &config.layout;
  let s = layout.status_offset;
  let status = raw.at(s);
  let point_num = status & 0x0F;

  if (s..s + 3).all(|i| raw.at(i) == NOT_READY) {
    info!("controller not ready, firmware check needed");
    return DecodeResult::ErrorAllOnes;
  }
  if config.is_incell_chip {
    if point_num == POINT_NUM_FAULT && raw.all_ones(s, s + 4) {
      info!("touch buffer is all 0xff, state recovery needed");
      return DecodeResult::ErrorAllOnes;
    }
  } else if raw.all_ones(s.saturating_sub(1), s + 2) {
    info!("firmware initialized");
    return DecodeResult::FirmwareReinit;
  }

  match status >> 4 {
    FRAME_TOUCH => decode_v1(&raw, config, point_num),
    FRAME_TOUCH_V2 => decode_v2(&raw, config, point_num),
    FRAME_PEN => DecodeResult::PenFrame(decode_pen(&raw, s)),
    FRAME_GESTURE => DecodeResult::GestureFrame(gesture_bytes(buf, layout)),
    other => {
      debug!("unknown frame type {}", other);
      DecodeResult::Unknown(other)
    }
  }
}

fn decode_v1(raw: &Raw, config: &Config, point_num: u8) -> DecodeResult {
  let max = config.max_touch();
  let layout = &config.layout;
  let f = &layout.fields;

  if point_num as usize > max {
    warn!("invalid point_num {}", point_num);
    return DecodeResult::ErrorBadCount(point_num);
  }

  let mut points = Points::new();
  for i in 0..max {
    let base = layout.points.base(i);
    let id = raw.at(base + f.id_y_high) >> 4;
    if id >= MAX_ID {
      break;
    }
    if id as usize >= max {
      warn!("id {} beyond max_touch_number", id);
      return DecodeResult::ErrorBadId(id);
    }
    if points.iter().any(|p| p.id == id) {
      warn!("id {} repeated in frame", id);
      return DecodeResult::ErrorBadId(id);
    }

    let head = raw.at(base + f.event_x_high);
    let kind = TouchEventKind::from_bits(head >> 6);
    if kind.is_down() && point_num == 0 {
      info!("abnormal touch data from fw");
      return DecodeResult::ErrorBadId(id);
    }

    let area = non_zero(raw.at(base + f.area), DEFAULT_AREA);
    let pressure = raw.at(base + f.pressure);
    // the pressure byte doubles as the minor axis unless reported as pressure
    let minor = if config.report_pressure { area } else { non_zero(pressure, DEFAULT_AREA) };
    let point = TouchPoint::new(id, raw.coord12(base + f.event_x_high, base + f.x_low), raw.coord12(base + f.id_y_high, base + f.y_low), kind)
      .with_pressure(non_zero(pressure, DEFAULT_PRESSURE))
      .with_area(area, minor)
      .with_palm(head & layout.palm_mask != 0);

    // capacity equals MAX_TOUCH_NUMBER and max never exceeds it
    let _ = points.push(point);
  }

  finish(points, point_num, raw, layout)
}

fn decode_v2(raw: &Raw, config: &Config, point_num: u8) -> DecodeResult {
  let max = config.max_touch();
  let layout = &config.layout;
  let f = &layout.fields;

  if point_num == 0 {
    return DecodeResult::ErrorEmpty;
  }
  if point_num as usize > max {
    warn!("invalid touch event num {}", point_num);
    return DecodeResult::ErrorBadCount(point_num);
  }

  let mut points = Points::new();
  for i in 0..point_num as usize {
    let base = layout.points_v2.base(i);
    let id = raw.at(base + f.id_y_high) >> 4;
    if id as usize >= max || points.iter().any(|p| p.id == id) {
      warn!("touch point id {} rejected", id);
      return DecodeResult::ErrorBadId(id);
    }

    let head = raw.at(base + f.event_x_high);
    let low = raw.at(base + f.pressure);
    let x = hi_res(head, raw.at(base + f.x_low), low >> 4);
    let y = hi_res(raw.at(base + f.id_y_high), raw.at(base + f.y_low), low & 0x0F);

    let point = TouchPoint::new(id, x, y, TouchEventKind::from_bits(head >> 6))
      .with_pressure(non_zero(raw.at(base + f.misc), DEFAULT_PRESSURE))
      .with_area(non_zero(raw.at(base + f.area), DEFAULT_AREA), non_zero(raw.at(base + f.minor), DEFAULT_AREA))
      .with_palm(head & layout.palm_mask != 0);
    let _ = points.push(point);
  }

  finish(points, point_num, raw, layout)
}

fn finish(points: Points, point_num: u8, raw: &Raw, layout: &Layout) -> DecodeResult {
  if points.is_empty() {
    debug!("no touch point information {:#x}", raw.at(layout.status_offset));
    return DecodeResult::ErrorEmpty;
  }
  DecodeResult::Ok(points, point_num)
}

/// 16-bit coordinate of a v2 record scaled back to panel resolution.
fn hi_res(hi: u8, mid: u8, lo: u8) -> u16 {
  let v = ((hi as u32 & 0x0F) << 12) | ((mid as u32) << 4) | (lo as u32 & 0x0F);
  (v / HI_RES_X_MAX) as u16
}

fn decode_pen(raw: &Raw, s: usize) -> PenSample {
  PenSample {
    x: raw.coord12(s + 2, s + 3),
    y: raw.coord12(s + 4, s + 5),
    pressure: raw.coord12(s + 6, s + 7),
    tilt_x: raw.be_u16(s + 8) as i16,
    tilt_y: raw.be_u16(s + 10) as i16,
    azimuth: raw.be_u16(s + 12),
    ..PenSample::default()
  }
  .with_flags(raw.at(s + 1))
}

fn gesture_bytes(buf: &[u8], layout: &Layout) -> GestureBytes {
  let start = layout.gesture_offset.min(buf.len());
  let end = (start + layout.gesture_len).min(buf.len());
  let mut out = GestureBytes::new();
  for &b in buf[start..end].iter().take(MAX_GESTURE_LEN) {
    let _ = out.push(b);
  }
  out
}

fn non_zero(v: u8, default: u8) -> u8 {
  if v == 0 {
    default
  } else {
    v
  }
}
