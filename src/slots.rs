//! Cross-frame contact bookkeeping.
//!
//! The controller reports the contacts present in each frame. [`SlotTracker`]
//! compares them with the previous frame and turns the difference into
//! enter/move/leave events, exactly once per transition. Virtual keys,
//! the palm mask and the stylus are tracked here as well.

use crate::config::{hit, Config, KeyBox, MtProtocol};
use crate::defs::{MAX_KEYS, MAX_TOUCH_NUMBER};
use crate::event::{Event, Events, KeyEvent, PenEvent, PenSample, SlotEvent, SlotEventKind, TouchEventKind, TouchPoint};

/// One bit per touch id.
pub type TouchMask = u16;

/// Per-id contact state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SlotState {
  pub down: bool,
  pub last_x: u16,
  pub last_y: u16,
  /// Where the contact landed.
  pub down_x: u16,
  pub down_y: u16,
  /// Number of `Contact` reports since the contact landed.
  pub contact_count: u32,
}

#[derive(Debug, Clone, Copy, Default)]
struct PenTracker {
  down: bool,
  last: PenSample,
}

impl PenTracker {
  /// A tip with pressure reports down; a lifted tip reports up once.
  fn update(&mut self, sample: &PenSample) -> Option<PenEvent> {
    self.last = *sample;
    if sample.tip && sample.pressure != 0 {
      if !self.down {
        debug!("pen down x {} y {} p {}", sample.x, sample.y, sample.pressure);
      }
      self.down = true;
      Some(PenEvent::from_sample(sample, true))
    } else if !sample.tip && self.down {
      debug!("pen up x {} y {}", sample.x, sample.y);
      self.down = false;
      Some(PenEvent::from_sample(sample, false))
    } else {
      None
    }
  }

  fn lift(&mut self) -> Option<PenEvent> {
    if !self.down {
      return None;
    }
    self.down = false;
    let mut event = PenEvent::from_sample(&self.last, false);
    event.pressure = 0;
    Some(event)
  }
}

/// Tracks which ids are down and derives per-frame events.
#[derive(Debug, Clone)]
pub struct SlotTracker {
  slots: [SlotState; MAX_TOUCH_NUMBER],
  touched: TouchMask,
  palmed: TouchMask,
  keys: u8,
  pen: PenTracker,
  protocol: MtProtocol,
  report_pressure: bool,
  key_boxes: [Option<KeyBox>; MAX_KEYS],
  key_dim: u16,
}

impl SlotTracker {
  pub fn new(config: &Config) -> Self {
    Self {
      slots: [SlotState::default(); MAX_TOUCH_NUMBER],
      touched: 0,
      palmed: 0,
      keys: 0,
      pen: PenTracker::default(),
      protocol: config.mt_protocol,
      report_pressure: config.report_pressure,
      key_boxes: config.key_boxes,
      key_dim: config.key_dim,
    }
  }

  /// Ids currently down.
  pub fn touched(&self) -> TouchMask {
    self.touched
  }

  /// Ids currently classified as palms.
  pub fn palmed(&self) -> TouchMask {
    self.palmed
  }

  /// Pressed virtual keys, one bit per key index.
  pub fn keys(&self) -> u8 {
    self.keys
  }

  pub fn slot(&self, id: u8) -> Option<&SlotState> {
    self.slots.get(id as usize)
  }

  pub fn pen_down(&self) -> bool {
    self.pen.down
  }

  /// Apply the points of one accepted frame.
  ///
  /// Events come out as: leaves in ascending id order, then enters and moves
  /// in frame order, then key edges, then `AllUp` when the last contact left.
  pub fn update(&mut self, points: &[TouchPoint]) -> Events {
    let mut contacts: heapless::Vec<Event, MAX_TOUCH_NUMBER> = heapless::Vec::new();
    let mut key_edges: heapless::Vec<Event, MAX_KEYS> = heapless::Vec::new();
    let mut touched: TouchMask = 0;
    let mut palmed: TouchMask = 0;

    for p in points {
      if let Some(key) = hit(&self.key_boxes, p.x, p.y, self.key_dim) {
        if let Some(edge) = self.key_edge(key, p.kind) {
          let _ = key_edges.push(Event::Key(edge));
        }
        continue;
      }
      let Some(slot) = self.slots.get_mut(p.id as usize) else {
        continue;
      };
      if !p.kind.is_down() {
        continue;
      }

      let bit = 1 << p.id;
      touched |= bit;
      if p.palm {
        palmed |= bit;
      }

      let kind = if self.touched & bit == 0 {
        slot.down_x = p.x;
        slot.down_y = p.y;
        slot.contact_count = 0;
        SlotEventKind::Enter
      } else {
        SlotEventKind::Move
      };
      if p.kind == TouchEventKind::Contact {
        slot.contact_count = slot.contact_count.saturating_add(1);
      }
      slot.down = true;
      slot.last_x = p.x;
      slot.last_y = p.y;

      let event = SlotEvent {
        id: p.id,
        kind,
        x: p.x,
        y: p.y,
        major: p.area_major,
        minor: p.area_minor,
        pressure: self.report_pressure.then_some(p.pressure),
        palm: p.palm,
      };
      let _ = contacts.push(Event::Slot(event));
    }

    if palmed != self.palmed {
      debug!("palm mask {:#x} -> {:#x}", self.palmed, palmed);
    }

    let mut events = self.leave(self.touched & !touched);
    for e in contacts.into_iter().chain(key_edges) {
      let _ = events.push(e);
    }
    if self.touched != 0 && touched == 0 {
      let _ = events.push(Event::AllUp);
    }

    self.touched = touched;
    self.palmed = palmed;
    events
  }

  /// Lift every contact, key and the pen.
  pub fn release_all(&mut self) -> Events {
    let touched = self.touched;
    let mut events = self.leave(touched);

    for index in 0..MAX_KEYS as u8 {
      if self.keys & (1 << index) != 0 {
        let _ = events.push(Event::Key(KeyEvent { index, pressed: false }));
      }
    }
    self.keys = 0;

    if let Some(pen) = self.pen.lift() {
      let _ = events.push(Event::Pen(pen));
    }
    if touched != 0 {
      let _ = events.push(Event::AllUp);
    }

    self.touched = 0;
    self.palmed = 0;
    events
  }

  /// Apply a stylus report.
  pub fn pen(&mut self, sample: &PenSample) -> Events {
    let mut events = Events::new();
    if let Some(e) = self.pen.update(sample) {
      let _ = events.push(Event::Pen(e));
    }
    events
  }

  fn key_edge(&mut self, index: u8, kind: TouchEventKind) -> Option<KeyEvent> {
    let bit = 1 << index;
    let pressed = self.keys & bit != 0;
    if kind.is_down() && !pressed {
      debug!("key {} down", index);
      self.keys |= bit;
      Some(KeyEvent { index, pressed: true })
    } else if kind.is_up() && pressed {
      debug!("key {} up", index);
      self.keys &= !bit;
      Some(KeyEvent { index, pressed: false })
    } else {
      None
    }
  }

  /// Free the slots in `released` and return their leave events. Protocol A
  /// sinks get no per-id leave.
  fn leave(&mut self, released: TouchMask) -> Events {
    let mut events = Events::new();
    for id in 0..MAX_TOUCH_NUMBER as u8 {
      if released & (1 << id) == 0 {
        continue;
      }
      let slot = &mut self.slots[id as usize];
      slot.down = false;
      if self.protocol == MtProtocol::B {
        let _ = events.push(Event::Slot(SlotEvent {
          id,
          kind: SlotEventKind::Leave,
          x: slot.last_x,
          y: slot.last_y,
          major: 0,
          minor: 0,
          pressure: None,
          palm: self.palmed & (1 << id) != 0,
        }));
      }
    }
    events
  }
}
