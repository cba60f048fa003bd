//! Raw / baseline capture.
//!
//! In diagnostic mode the controller appends a 4-byte header and 50 signed
//! channel values to every frame. The header names which 50-cell chunk of the
//! [`DiagBuffer`] the values belong to; chunks 1-3 hold per-cell data, chunk 4
//! the per-channel row/column sums.

use crate::event::{DIAG_FRAME_LEN, NORMAL_FRAME_LEN};
use crate::reg::{Reg, FORMAT_NORMAL, FORMAT_RAW, FORMAT_RAW_BASELINE};
use crate::rw::Transport;
use crate::{Error, Hx8526a};

pub const DIAG_CAPACITY: usize = 200;
/// Cells reserved for per-cell raw/baseline values.
pub const CELL_REGION: usize = 150;
/// Values carried by one diagnostic frame.
pub const CHUNK_LEN: usize = 50;

pub(crate) const HEADER_OFFSET: usize = 24;
pub(crate) const VALUES_OFFSET: usize = 28;

/// Immutable channel counts read once at attach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelGeometry {
  pub x_channels: u8,
  pub y_channels: u8,
}

impl ChannelGeometry {
  pub const fn new(x_channels: u8, y_channels: u8) -> Self {
    Self { x_channels, y_channels }
  }

  /// Entries of the cell region in use, clipped to its capacity.
  pub fn cells(&self) -> usize {
    (self.x_channels as usize * self.y_channels as usize).min(CELL_REGION)
  }

  /// Entries of the channel-sum region in use, clipped to its capacity.
  pub fn sums(&self) -> usize {
    (self.x_channels as usize + self.y_channels as usize).min(DIAG_CAPACITY - CELL_REGION)
  }
}

/// What the controller streams in addition to finger data.
///
/// The level (1..=6) is the control-plane selector and decides which regions
/// the control plane shows: 1-2 both, 3-4 cells only, 5-6 sums only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DiagnosticMode {
  #[default]
  Off,
  RawBaseline(u8),
  RawOnly(u8),
}

impl DiagnosticMode {
  /// Map a control-plane selector byte to a mode. Anything outside `'1'..='6'`
  /// turns diagnostics off.
  pub const fn from_selector(selector: u8) -> Self {
    match selector {
      b'1' | b'3' | b'5' => Self::RawBaseline(selector - b'0'),
      b'2' | b'4' | b'6' => Self::RawOnly(selector - b'0'),
      _ => Self::Off,
    }
  }

  pub const fn level(&self) -> u8 {
    match self {
      Self::Off => 0,
      Self::RawBaseline(level) | Self::RawOnly(level) => *level,
    }
  }

  pub const fn is_active(&self) -> bool {
    !matches!(self, Self::Off)
  }

  /// Two-byte command selecting this mode's frame format.
  pub const fn command(&self) -> [u8; 2] {
    let flag = match self {
      Self::Off => FORMAT_NORMAL,
      Self::RawBaseline(_) => FORMAT_RAW_BASELINE,
      Self::RawOnly(_) => FORMAT_RAW,
    };
    [Reg::FrameFormat as u8, flag]
  }

  /// Length of one event-stack read in this mode.
  pub const fn frame_len(&self) -> usize {
    if self.is_active() {
      DIAG_FRAME_LEN
    } else {
      NORMAL_FRAME_LEN
    }
  }

  pub const fn shows_cells(&self) -> bool {
    matches!(self.level(), 1..=4)
  }

  pub const fn shows_sums(&self) -> bool {
    matches!(self.level(), 1 | 2 | 5 | 6)
  }
}

/// Decode one diagnostic value.
///
/// A set top bit marks a negative value whose magnitude is the remaining bits
/// masked to `0x4FFF`.
pub const fn decode_value(hi: u8, lo: u8) -> i16 {
  let raw = u16::from_be_bytes([hi, lo]);
  if hi & 0x80 != 0 {
    -((raw & 0x4FFF) as i16)
  } else {
    raw as i16
  }
}

/// Latest captured channel data, overwritten in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagBuffer {
  data: [i16; DIAG_CAPACITY],
}

impl DiagBuffer {
  pub const fn new() -> Self {
    Self { data: [0; DIAG_CAPACITY] }
  }

  /// Store the chunk carried by `frame`.
  ///
  /// The frame is ignored unless all four header bytes agree and name a chunk
  /// in `1..=4`. Returns the chunk number written.
  pub fn capture(&mut self, frame: &[u8]) -> Option<u8> {
    if frame.len() < DIAG_FRAME_LEN {
      return None;
    }

    let header = &frame[HEADER_OFFSET..VALUES_OFFSET];
    let chunk = header[0];
    if header.iter().any(|&b| b != chunk) || !(1..=4).contains(&chunk) {
      return None;
    }

    let index = (chunk as usize - 1) * CHUNK_LEN;
    let values = frame[VALUES_OFFSET..VALUES_OFFSET + CHUNK_LEN * 2].chunks_exact(2);
    for (cell, pair) in self.data[index..index + CHUNK_LEN].iter_mut().zip(values) {
      *cell = decode_value(pair[0], pair[1]);
    }

    Some(chunk)
  }

  /// The cell and channel-sum regions sized by `geometry`.
  pub fn regions(&self, geometry: ChannelGeometry) -> (&[i16], &[i16]) {
    let cells = &self.data[..geometry.cells()];
    let sums = &self.data[CELL_REGION..CELL_REGION + geometry.sums()];
    (cells, sums)
  }

  pub fn as_slice(&self) -> &[i16] {
    &self.data
  }
}

impl Default for DiagBuffer {
  fn default() -> Self {
    Self::new()
  }
}

impl<T: Transport, D, P, S> Hx8526a<T, D, P, S> {
  /// Switch the controller's frame format.
  ///
  /// The command pair is written first; the mode (and with it the frame length
  /// of the next read) only changes once the controller accepted it.
  pub async fn set_diag_mode(&mut self, selector: u8) -> Result<DiagnosticMode, Error<T::Error>> {
    let mode = DiagnosticMode::from_selector(selector);
    self.bus.write_raw(&mode.command()).await.map_err(Error::Bus)?;
    debug!("diag_command={}", mode.level());
    self.diag_mode = mode;
    Ok(mode)
  }
}

impl<T, D, P, S> Hx8526a<T, D, P, S> {
  pub const fn diag_mode(&self) -> DiagnosticMode {
    self.diag_mode
  }

  /// Cell and channel-sum regions of the latest capture.
  pub fn diag_regions(&self) -> (&[i16], &[i16]) {
    self.diag.regions(self.info.geometry)
  }
}
