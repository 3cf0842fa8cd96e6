mod pen;
mod touchpoint;

pub use pen::*;
pub use touchpoint::*;

use crate::defs::MAX_EVENTS;

/// How a tracked slot changed in a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlotEventKind {
  /// A finger landed and took the slot.
  Enter,
  /// A finger already in the slot reported again.
  Move,
  /// The finger left; the slot is free.
  Leave,
}

/// Contact update for one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SlotEvent {
  pub id: u8,
  pub kind: SlotEventKind,
  pub x: u16,
  pub y: u16,
  pub major: u8,
  pub minor: u8,
  /// Only present when pressure reporting is enabled.
  pub pressure: Option<u8>,
  pub palm: bool,
}

impl SlotEvent {
  pub const fn is_enter(&self) -> bool {
    matches!(self.kind, SlotEventKind::Enter)
  }

  pub const fn is_leave(&self) -> bool {
    matches!(self.kind, SlotEventKind::Leave)
  }
}

/// Virtual key edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyEvent {
  pub index: u8,
  pub pressed: bool,
}

/// Everything a frame can report to the input sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
  Slot(SlotEvent),
  Key(KeyEvent),
  /// The last finger left the panel.
  AllUp,
  Pen(PenEvent),
}

impl Event {
  pub const fn slot(&self) -> Option<&SlotEvent> {
    match self {
      Event::Slot(s) => Some(s),
      _ => None,
    }
  }
}

/// Events of one frame, emitted as a single batch.
pub type Events = heapless::Vec<Event, MAX_EVENTS>;
