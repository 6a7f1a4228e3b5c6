//! Device property codes

use std::fmt;

/// Numeric code of a device property
#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct PropertyCode(pub u32);

impl fmt::Debug for PropertyCode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "PropertyCode(0x{:04x})", self.0)
  }
}

impl fmt::Display for PropertyCode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "0x{:04x}", self.0)
  }
}

/// Half-press of the shutter button (focus and metering lock)
pub const S1: PropertyCode = PropertyCode(0x0001);
/// Auto exposure lock
pub const AEL: PropertyCode = PropertyCode(0x0002);

/// Aperture, in hundredths of an f-stop (f/2.8 is `280`)
pub const F_NUMBER: PropertyCode = PropertyCode(0x0100);
/// Exposure compensation, in thousandths of a stop
pub const EXPOSURE_BIAS: PropertyCode = PropertyCode(0x0101);
/// Flash compensation, in thousandths of a stop
pub const FLASH_COMPENSATION: PropertyCode = PropertyCode(0x0102);
/// Shutter speed, numerator in the high 16 bits and denominator in the low 16 bits
pub const SHUTTER_SPEED: PropertyCode = PropertyCode(0x0103);
/// ISO sensitivity
pub const ISO: PropertyCode = PropertyCode(0x0104);
/// Exposure program (manual, aperture priority, ...)
pub const EXPOSURE_PROGRAM: PropertyCode = PropertyCode(0x0105);
/// Still image file type (JPEG, RAW, RAW+JPEG)
pub const FILE_TYPE: PropertyCode = PropertyCode(0x0106);
/// JPEG quality
pub const JPEG_QUALITY: PropertyCode = PropertyCode(0x0107);
/// White balance preset
pub const WHITE_BALANCE: PropertyCode = PropertyCode(0x0108);
/// Focus mode
pub const FOCUS_MODE: PropertyCode = PropertyCode(0x0109);
/// Metering mode
pub const METERING_MODE: PropertyCode = PropertyCode(0x010A);
/// Flash mode
pub const FLASH_MODE: PropertyCode = PropertyCode(0x010B);
/// Drive mode (single, continuous, bracket, ...)
pub const DRIVE_MODE: PropertyCode = PropertyCode(0x010E);

/// Lock indicator value for a released button
pub const UNLOCKED: i64 = 1;
/// Lock indicator value for a held button
pub const LOCKED: i64 = 2;
