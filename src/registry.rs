//! Names of the camera properties that can be read and written

use remote_sdk::{property, PropertyCode};

/// A named property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyEntry {
  /// Name used on the command line
  pub name: &'static str,
  /// SDK property code
  pub code: PropertyCode,
}

const fn entry(name: &'static str, code: PropertyCode) -> PropertyEntry {
  PropertyEntry { name, code }
}

static PROPERTIES: &[PropertyEntry] = &[
  entry("aperture", property::F_NUMBER),
  entry("exposure_bias", property::EXPOSURE_BIAS),
  entry("flash_compensation", property::FLASH_COMPENSATION),
  entry("shutter_speed", property::SHUTTER_SPEED),
  entry("iso", property::ISO),
  entry("exposure_program", property::EXPOSURE_PROGRAM),
  entry("file_type", property::FILE_TYPE),
  entry("jpeg_quality", property::JPEG_QUALITY),
  entry("white_balance", property::WHITE_BALANCE),
  entry("focus_mode", property::FOCUS_MODE),
  entry("metering_mode", property::METERING_MODE),
  entry("flash_mode", property::FLASH_MODE),
  entry("drive_mode", property::DRIVE_MODE),
];

/// Find a property by name, ignoring ASCII case
pub fn lookup(name: &str) -> Option<&'static PropertyEntry> {
  PROPERTIES.iter().find(|entry| entry.name.eq_ignore_ascii_case(name))
}

/// All known property names
pub fn names() -> impl Iterator<Item = &'static str> {
  PROPERTIES.iter().map(|entry| entry.name)
}
