//! Test doubles shared by the unit tests.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::vec::Vec;

use core::convert::Infallible;

use embedded_hal_async::delay::DelayNs;

use crate::bus::Bus;
use crate::defs::*;
use crate::hooks::{FirmwareRecovery, GestureSubsystem, IrqMode, PowerControl};

/// Raw report builder for the default layout.
pub(crate) struct FrameBuilder {
  buf: [u8; MAX_FRAME_LEN],
}

impl FrameBuilder {
  fn with_status(status: u8) -> Self {
    let mut buf = [0xFFu8; MAX_FRAME_LEN];
    buf[0] = Reg::TouchData.into();
    buf[1] = 0x00;
    buf[2] = status;
    Self { buf }
  }

  pub fn touch(point_num: u8) -> Self {
    Self::with_status((FRAME_TOUCH << 4) | (point_num & 0x0F))
  }

  pub fn touch_v2(point_num: u8) -> Self {
    Self::with_status((FRAME_TOUCH_V2 << 4) | (point_num & 0x0F))
  }

  pub fn pen(flags: u8, x: u16, y: u16, pressure: u16) -> Self {
    let mut f = Self::with_status(FRAME_PEN << 4);
    f.buf[3] = flags;
    f.buf[4..10].copy_from_slice(&[
      (x >> 8) as u8 & 0x0F,
      x as u8,
      (y >> 8) as u8 & 0x0F,
      y as u8,
      (pressure >> 8) as u8 & 0x0F,
      pressure as u8,
    ]);
    f.buf[10..16].fill(0);
    f
  }

  pub fn gesture(code: u8) -> Self {
    let mut f = Self::with_status(FRAME_GESTURE << 4);
    f.buf[1] = code;
    f
  }

  #[allow(clippy::too_many_arguments)]
  pub fn point(mut self, slot: usize, id: u8, kind: u8, x: u16, y: u16, pressure: u8, area: u8) -> Self {
    let b = 3 + ONE_TCH_LEN * slot;
    self.buf[b..b + ONE_TCH_LEN].copy_from_slice(&[
      (kind << 6) | ((x >> 8) as u8 & 0x0F),
      x as u8,
      (id << 4) | ((y >> 8) as u8 & 0x0F),
      y as u8,
      pressure,
      area,
    ]);
    self
  }

  #[allow(clippy::too_many_arguments)]
  pub fn point_v2(mut self, slot: usize, id: u8, kind: u8, x: u16, y: u16, area: u8, minor: u8, misc: u8) -> Self {
    let b = 5 + ONE_TCH_LEN_V2 * slot;
    self.buf[b..b + ONE_TCH_LEN_V2].copy_from_slice(&[
      (kind << 6) | (x >> 12) as u8,
      (x >> 4) as u8,
      (id << 4) | (y >> 12) as u8,
      (y >> 4) as u8,
      (((x & 0x0F) as u8) << 4) | (y & 0x0F) as u8,
      area,
      minor,
      misc,
    ]);
    self
  }

  pub fn palm(mut self, slot: usize) -> Self {
    self.buf[3 + ONE_TCH_LEN * slot] |= 0x10;
    self
  }

  pub fn build(self) -> [u8; MAX_FRAME_LEN] {
    self.buf
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FakeError;

/// Scripted reply to a touch data read.
pub(crate) enum Reply {
  Frame([u8; MAX_FRAME_LEN]),
  /// Fail after the controller put these bytes on the wire.
  Fail(Vec<u8>),
}

#[derive(Default)]
pub(crate) struct BusState {
  pub frames: VecDeque<Reply>,
  /// Per register scripted replies, consumed first.
  pub scripted: HashMap<u8, VecDeque<Result<u8, FakeError>>>,
  /// Register values once the script is exhausted.
  pub regs: HashMap<u8, u8>,
  pub writes: Vec<Vec<u8>>,
  pub reads: Vec<u8>,
  pub fail_writes: bool,
}

/// In-memory controller. Clones share their state.
#[derive(Clone, Default)]
pub(crate) struct FakeBus(pub Rc<RefCell<BusState>>);

impl FakeBus {
  /// A controller answering with the default chip id.
  pub fn new() -> Self {
    let bus = Self::default();
    bus.set_reg(Reg::ChipIdHigh.into(), 0x54);
    bus.set_reg(Reg::ChipIdLow.into(), 0x52);
    bus
  }

  pub fn set_reg(&self, reg: u8, value: u8) {
    self.0.borrow_mut().regs.insert(reg, value);
  }

  pub fn script(&self, reg: u8, replies: &[Result<u8, FakeError>]) {
    self.0.borrow_mut().scripted.entry(reg).or_default().extend(replies.iter().copied());
  }

  pub fn push_frame(&self, frame: [u8; MAX_FRAME_LEN]) {
    self.0.borrow_mut().frames.push_back(Reply::Frame(frame));
  }

  pub fn push_failure(&self, partial: &[u8]) {
    self.0.borrow_mut().frames.push_back(Reply::Fail(partial.to_vec()));
  }

  /// Make every following write fail, or succeed again.
  pub fn fail_writes(&self, on: bool) {
    self.0.borrow_mut().fail_writes = on;
  }

  /// Registers written, in order, with their values.
  pub fn reg_writes(&self) -> Vec<(u8, u8)> {
    self.0.borrow().writes.iter().filter(|w| w.len() == 2).map(|w| (w[0], w[1])).collect()
  }

  pub fn read_count(&self, reg: u8) -> usize {
    self.0.borrow().reads.iter().filter(|&&r| r == reg).count()
  }

  pub fn clear_log(&self) {
    let mut s = self.0.borrow_mut();
    s.writes.clear();
    s.reads.clear();
  }
}

impl Bus for FakeBus {
  type Error = FakeError;

  async fn read(&mut self, cmd: &[u8], buf: &mut [u8]) -> Result<(), FakeError> {
    let mut s = self.0.borrow_mut();
    let reg = cmd.first().copied().unwrap_or(0);
    s.reads.push(reg);

    if reg == u8::from(Reg::TouchData) {
      return match s.frames.pop_front() {
        Some(Reply::Frame(frame)) => {
          // frame[0] holds the command byte
          let n = buf.len().min(frame.len() - 1);
          buf[..n].copy_from_slice(&frame[1..1 + n]);
          Ok(())
        }
        Some(Reply::Fail(partial)) => {
          let n = buf.len().min(partial.len());
          buf[..n].copy_from_slice(&partial[..n]);
          Err(FakeError)
        }
        None => Err(FakeError),
      };
    }

    let value = match s.scripted.get_mut(&reg).and_then(VecDeque::pop_front) {
      Some(v) => v?,
      None => *s.regs.get(&reg).ok_or(FakeError)?,
    };
    buf.fill(value);
    Ok(())
  }

  async fn write(&mut self, data: &[u8]) -> Result<(), FakeError> {
    let mut s = self.0.borrow_mut();
    if s.fail_writes {
      return Err(FakeError);
    }
    s.writes.push(data.to_vec());
    Ok(())
  }
}

/// Delay that yields once instead of sleeping and remembers what was asked
/// of it.
#[derive(Clone, Default)]
pub(crate) struct RecordingDelay(pub Rc<RefCell<Vec<u32>>>);

impl RecordingDelay {
  pub fn pauses(&self) -> Vec<u32> {
    self.0.borrow().clone()
  }

  pub fn clear(&self) {
    self.0.borrow_mut().clear();
  }
}

impl DelayNs for RecordingDelay {
  async fn delay_ns(&mut self, ns: u32) {
    self.0.borrow_mut().push(ns / 1_000_000);
    embassy_futures::yield_now().await;
  }

  async fn delay_ms(&mut self, ms: u32) {
    self.0.borrow_mut().push(ms);
    embassy_futures::yield_now().await;
  }
}

/// Interrupt line that is always asserted.
pub(crate) struct Asserted;

impl embedded_hal::digital::ErrorType for Asserted {
  type Error = Infallible;
}

impl embedded_hal_async::digital::Wait for Asserted {
  async fn wait_for_high(&mut self) -> Result<(), Infallible> {
    Ok(())
  }

  async fn wait_for_low(&mut self) -> Result<(), Infallible> {
    Ok(())
  }

  async fn wait_for_rising_edge(&mut self) -> Result<(), Infallible> {
    Ok(())
  }

  async fn wait_for_falling_edge(&mut self) -> Result<(), Infallible> {
    Ok(())
  }

  async fn wait_for_any_edge(&mut self) -> Result<(), Infallible> {
    Ok(())
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
  Recover,
  Gesture(Vec<u8>),
  Reset(bool),
  Power(bool),
  Irq(IrqMode),
}

#[derive(Default)]
pub(crate) struct HookState {
  pub calls: Vec<Call>,
  pub recover_fails: bool,
}

/// Collaborators that record every call. Clones share their log.
#[derive(Clone, Default)]
pub(crate) struct Recorder(pub Rc<RefCell<HookState>>);

impl Recorder {
  pub fn calls(&self) -> Vec<Call> {
    self.0.borrow().calls.clone()
  }

  pub fn count(&self, call: &Call) -> usize {
    self.0.borrow().calls.iter().filter(|c| *c == call).count()
  }

  pub fn fail_recovery(&self) {
    self.0.borrow_mut().recover_fails = true;
  }

  pub fn clear(&self) {
    self.0.borrow_mut().calls.clear();
  }
}

impl FirmwareRecovery for Recorder {
  type Error = FakeError;

  async fn recover(&mut self) -> Result<(), FakeError> {
    let mut s = self.0.borrow_mut();
    s.calls.push(Call::Recover);
    if s.recover_fails {
      Err(FakeError)
    } else {
      Ok(())
    }
  }
}

impl GestureSubsystem for Recorder {
  type Error = FakeError;

  async fn on_gesture_frame(&mut self, bytes: &[u8]) -> Result<(), FakeError> {
    self.0.borrow_mut().calls.push(Call::Gesture(bytes.to_vec()));
    Ok(())
  }
}

impl PowerControl for Recorder {
  type Error = FakeError;

  async fn set_reset(&mut self, high: bool) -> Result<(), FakeError> {
    self.0.borrow_mut().calls.push(Call::Reset(high));
    Ok(())
  }

  async fn set_power(&mut self, on: bool) -> Result<(), FakeError> {
    self.0.borrow_mut().calls.push(Call::Power(on));
    Ok(())
  }

  async fn set_irq(&mut self, mode: IrqMode) -> Result<(), FakeError> {
    self.0.borrow_mut().calls.push(Call::Irq(mode));
    Ok(())
  }
}
