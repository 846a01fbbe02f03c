//! Persisted record types: images, page state, window state, annotations.

use std::path::{Path, PathBuf};

use crate::geometry::Color;

pub type ImageId = i64;
pub type AnnotationId = i64;

/// One imported image with its view transform.
///
/// Identity is the normalized file path: two records pointing at the same
/// file are the same image, which is what suppresses duplicate imports.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    pub id: ImageId,
    pub full_path: String,
    pub scale_x: f64,
    pub scale_y: f64,
    pub angle: f64,
}

impl ImageRecord {
    pub fn new(full_path: impl Into<String>) -> Self {
        Self {
            id: 0,
            full_path: full_path.into(),
            scale_x: 1.0,
            scale_y: 1.0,
            angle: 0.0,
        }
    }

    pub fn file_name(&self) -> String {
        Path::new(&self.full_path)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn same_source(&self, other: &Self) -> bool {
        normalize_path(&self.full_path) == normalize_path(&other.full_path)
    }
}

impl PartialEq for ImageRecord {
    fn eq(&self, other: &Self) -> bool {
        self.same_source(other)
    }
}

fn normalize_path(raw: &str) -> PathBuf {
    Path::new(raw).components().collect()
}

/// Singleton page settings: panel visibility and the displayed image.
#[derive(Debug, Clone, PartialEq)]
pub struct PageState {
    pub id: i64,
    pub list_visible: bool,
    pub edit_bar_visible: bool,
    pub image_id: Option<ImageId>,
}

impl PageState {
    pub const fn new() -> Self {
        Self {
            id: 0,
            list_visible: false,
            edit_bar_visible: false,
            image_id: None,
        }
    }
}

impl Default for PageState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowMode {
    #[default]
    Normal,
    Minimized,
    Maximized,
}

impl WindowMode {
    /// Small-integer form persisted in the window row.
    pub const fn code(self) -> i64 {
        match self {
            Self::Normal => 0,
            Self::Minimized => 1,
            Self::Maximized => 2,
        }
    }

    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Normal),
            1 => Some(Self::Minimized),
            2 => Some(Self::Maximized),
            _ => None,
        }
    }
}

/// Singleton window geometry and chrome state, committed at close time.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowState {
    pub id: i64,
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    pub mode: WindowMode,
}

impl WindowState {
    pub const fn new(left: f64, top: f64, width: f64, height: f64, mode: WindowMode) -> Self {
        Self {
            id: 0,
            left,
            top,
            width,
            height,
            mode,
        }
    }
}

/// One persisted shape. Immutable after insert: create and delete only.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationRecord {
    pub id: AnnotationId,
    pub image_id: ImageId,
    pub path: String,
    pub border_color: Color,
    pub background_color: Color,
    pub background_opacity: f64,
}

impl AnnotationRecord {
    pub fn new(
        image_id: ImageId,
        path: impl Into<String>,
        border_color: Color,
        background_color: Color,
        background_opacity: f64,
    ) -> Self {
        Self {
            id: 0,
            image_id,
            path: path.into(),
            border_color,
            background_color,
            background_opacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_is_derived_from_full_path() {
        let record = ImageRecord::new("/home/user/pictures/sunset.png");
        assert_eq!(record.file_name(), "sunset.png");

        let bare = ImageRecord::new("");
        assert_eq!(bare.file_name(), "");
    }

    #[test]
    fn image_identity_compares_normalized_paths() {
        let plain = ImageRecord::new("/data/photos/cat.jpg");
        let doubled = ImageRecord::new("/data//photos/cat.jpg");
        let dotted = ImageRecord::new("/data/photos/./cat.jpg");
        let other = ImageRecord::new("/data/photos/dog.jpg");

        assert!(plain.same_source(&doubled));
        assert!(plain.same_source(&dotted));
        assert!(!plain.same_source(&other));
        assert_eq!(plain, dotted);
    }

    #[test]
    fn image_identity_ignores_ids_and_transform() {
        let mut left = ImageRecord::new("/a.png");
        let mut right = ImageRecord::new("/a.png");
        left.id = 1;
        right.id = 9;
        right.scale_x = 2.0;
        right.angle = 90.0;
        assert_eq!(left, right);
    }

    #[test]
    fn window_mode_codes_round_trip() {
        for mode in [
            WindowMode::Normal,
            WindowMode::Minimized,
            WindowMode::Maximized,
        ] {
            assert_eq!(WindowMode::from_code(mode.code()), Some(mode));
        }
        assert_eq!(WindowMode::from_code(3), None);
        assert_eq!(WindowMode::from_code(-1), None);
    }

    #[test]
    fn new_image_record_defaults_to_unit_scale_and_no_rotation() {
        let record = ImageRecord::new("/a.png");
        assert_eq!(record.scale_x, 1.0);
        assert_eq!(record.scale_y, 1.0);
        assert_eq!(record.angle, 0.0);
    }
}
