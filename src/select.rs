//! Choosing one camera out of the enumerated ones

use remote_sdk::CameraInfo;
use std::fmt;

/// Strategy picking the camera to control
pub trait DeviceSelector: fmt::Display {
  /// Index of the chosen camera in `cameras`, if any matches
  fn select(&self, cameras: &[CameraInfo]) -> Option<usize>;
}

/// Built-in selection strategies
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
  /// Camera at a position in the enumeration order
  Index(usize),
  /// First camera with this model name
  Model(String),
}

impl Default for Selection {
  fn default() -> Self {
    Selection::Index(0)
  }
}

impl DeviceSelector for Selection {
  fn select(&self, cameras: &[CameraInfo]) -> Option<usize> {
    match self {
      Selection::Index(index) => (*index < cameras.len()).then_some(*index),
      Selection::Model(model) => cameras.iter().position(|camera| &camera.model == model),
    }
  }
}

impl fmt::Display for Selection {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Selection::Index(index) => write!(f, "camera #{}", index),
      Selection::Model(model) => write!(f, "camera model '{}'", model),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn cameras(models: &[&str]) -> Vec<CameraInfo> {
    models
      .iter()
      .enumerate()
      .map(|(i, model)| CameraInfo { model: model.to_string(), id: i.to_string() })
      .collect()
  }

  #[test]
  fn index_selection() {
    let list = cameras(&["A", "B", "C"]);

    assert_eq!(Selection::default().select(&list), Some(0));
    assert_eq!(Selection::Index(2).select(&list), Some(2));
    assert_eq!(Selection::Index(3).select(&list), None);
    assert_eq!(Selection::Index(0).select(&[]), None);
  }

  #[test]
  fn model_selection() {
    let list = cameras(&["ILCE-7M4", "ILCE-1", "ILCE-1"]);

    assert_eq!(Selection::Model("ILCE-1".into()).select(&list), Some(1));
    assert_eq!(Selection::Model("ZV-E10".into()).select(&list), None);
  }
}
