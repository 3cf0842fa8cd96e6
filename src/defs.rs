/******************************************************************************
 * FocalTech touch controller - report protocol, registers and timing          *
 * ========================================================================== *
 * Offsets inside a report are device-table driven and live in                *
 * `config::Layout`; only protocol-wide constants are kept here.              *
*******************************************************************************/

/// Largest id the report format can carry. Ids at or above this value
/// terminate the point list of a frame.
pub const MAX_ID: u8 = 0x0A;

/// Number of touch slots the core can ever track.
pub const MAX_TOUCH_NUMBER: usize = 10;

/// Number of virtual keys that can be configured.
pub const MAX_KEYS: usize = 4;

/// Number of alternate chip ids accepted besides the expected one.
pub const MAX_CHIP_IDS: usize = 4;

/// Size of the raw frame buffer owned by a device.
pub const MAX_FRAME_LEN: usize = 96;

/// Maximum number of bytes handed to the gesture pipeline.
pub const MAX_GESTURE_LEN: usize = 16;

/// Capacity of one frame's event batch: a leave and an enter per slot, every
/// key edge, the all-up marker and a pen event.
pub const MAX_EVENTS: usize = 2 * MAX_TOUCH_NUMBER + MAX_KEYS + 2;

/// Half-width of a virtual key's hit box, in panel coordinates.
pub const KEY_DIM: u16 = 50;

/// Length of a protocol v1 point record.
pub const ONE_TCH_LEN: usize = 6;
/// Length of a protocol v2 point record.
pub const ONE_TCH_LEN_V2: usize = 8;
/// Length of a pen report following the status byte.
pub const PEN_LEN: usize = 15;

/// Divider applied to the 16-bit coordinates of protocol v2 frames.
pub const HI_RES_X_MAX: u32 = 16;

/// Substituted when the controller reports a zero pressure.
pub const DEFAULT_PRESSURE: u8 = 0x3F;
/// Substituted when the controller reports a zero contact area.
pub const DEFAULT_AREA: u8 = 0x09;

// Frame type, high nibble of the status byte.
pub const FRAME_TOUCH: u8 = 0x00;
pub const FRAME_TOUCH_V2: u8 = 0x02;
pub const FRAME_GESTURE: u8 = 0x08;
pub const FRAME_PEN: u8 = 0x0B;

/// Point count reserved for fault patterns.
pub const POINT_NUM_FAULT: u8 = 0x0F;

/// First status byte left behind by a read the controller refused.
pub const NOT_READY: u8 = 0xEF;

// Point record event kinds, bits 7..6 of the event/x-high byte.
pub const EVENT_DOWN: u8 = 0;
pub const EVENT_UP: u8 = 1;
pub const EVENT_CONTACT: u8 = 2;

// Pen status byte flags.
pub const PEN_TIP: u8 = 0x01;
pub const PEN_BUTTON1: u8 = 0x02;
pub const PEN_BUTTON2: u8 = 0x08;
pub const PEN_INRANGE: u8 = 0x20;

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Reg {
  TouchData = 0x01,
  ChargerMode = 0x8B,
  ChipIdLow = 0x9F,
  ChipIdHigh = 0xA3,
  PowerMode = 0xA5,
  ProximityMode = 0xB0,
  GloveMode = 0xC0,
  CoverMode = 0xC1,
  GestureMode = 0xD0,
}

impl From<Reg> for u8 {
  fn from(r: Reg) -> Self {
    r as u8
  }
}

pub(crate) const POWER_MODE_SLEEP: u8 = 0x03;

// Timing, milliseconds.
pub(crate) const RESET_LOW_MS: u32 = 2;
pub(crate) const RESET_SETTLE_MS: u32 = 200;
pub(crate) const READY_POLL_INTERVAL_MS: u32 = 200;
pub(crate) const READY_TIMEOUT_MS: u32 = 1000;
pub(crate) const PROBE_BACKOFF_MS: u32 = 20;
pub(crate) const READ_BACKOFF_MS: u32 = 1;
pub(crate) const RECOVERY_BACKOFF_MS: u32 = 20;

// Attempt limits.
pub(crate) const PROBE_ATTEMPTS: u8 = 5;
pub(crate) const READY_ATTEMPTS: u8 = (READY_TIMEOUT_MS / READY_POLL_INTERVAL_MS) as u8;
pub(crate) const READ_ATTEMPTS: u8 = 3;
pub(crate) const RECOVERY_ATTEMPTS: u8 = 3;
pub(crate) const HEALTH_FAIL_LIMIT: u8 = 3;
