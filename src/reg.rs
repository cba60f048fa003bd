/******************************************************************************
 *                      HX8526-A - Commands & Register Map                    *
 * ========================================================================== *
 * The controller is driven by single-byte commands, optionally followed by  *
 * a short payload. Reads are a command write followed by a repeated-start   *
 * read of the response.                                                      *
*******************************************************************************/

pub const DEFAULT_ADDR: u8 = 0x48;

#[allow(dead_code)]
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Reg {
  // Power sequencing
  SleepIn = 0x80,
  SleepOut = 0x81,
  SenseOff = 0x82,
  SenseOn = 0x83,

  // Identification
  FirmwareId = 0x31,
  FirmwareVersion = 0x32,
  ChannelCount = 0xEA,

  // Event stack: one frame of status registers (24 bytes, 128 in diagnostic mode)
  EventStack = 0x86,

  // Mode setup written during resume
  AnalogSetup = 0x42,
  FlashControl = 0x35,
  ScanTiming = 0x36,
  ReportSetup = 0xDD,

  // Frame format selector, followed by the format flag
  FrameFormat = 0x91,
  DeepSleep = 0xD7,
}

impl From<Reg> for u8 {
  #[inline]
  fn from(r: Reg) -> Self {
    r as u8
  }
}

/// Frame format flags written after [`Reg::FrameFormat`].
pub(crate) const FORMAT_SUSPENDED: u8 = 0x00;
pub(crate) const FORMAT_RAW: u8 = 0x01;
pub(crate) const FORMAT_RAW_BASELINE: u8 = 0x02 | FORMAT_RAW;
pub(crate) const FORMAT_NORMAL: u8 = 0xFC;
