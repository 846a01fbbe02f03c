//! Renders the visible region of the current image for the copy and save
//! commands: source file, optional crop clip, PNG out.

use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, ImageFormat};
use thiserror::Error;

use crate::geometry::RectShape;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to load image {path}: {source}")]
    Load {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to encode snapshot: {0}")]
    Encode(#[source] image::ImageError),
    #[error("failed to write snapshot {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("clip region does not intersect the image")]
    EmptyClip,
}

pub type SnapshotResult<T> = std::result::Result<T, SnapshotError>;

pub fn load_source(path: &Path) -> SnapshotResult<DynamicImage> {
    image::open(path).map_err(|source| SnapshotError::Load {
        path: path.display().to_string(),
        source,
    })
}

/// Applies the committed crop clip, clamped to the image bounds. Without a
/// clip the image passes through unchanged.
pub fn apply_clip(image: &DynamicImage, clip: Option<RectShape>) -> SnapshotResult<DynamicImage> {
    let Some(clip) = clip else {
        return Ok(image.clone());
    };

    let width = f64::from(image.width());
    let height = f64::from(image.height());
    let left = clip.x.clamp(0.0, width);
    let top = clip.y.clamp(0.0, height);
    let right = (clip.x + clip.width).clamp(0.0, width);
    let bottom = (clip.y + clip.height).clamp(0.0, height);

    let crop_width = (right - left).round() as u32;
    let crop_height = (bottom - top).round() as u32;
    if crop_width == 0 || crop_height == 0 {
        return Err(SnapshotError::EmptyClip);
    }

    Ok(image.crop_imm(left.round() as u32, top.round() as u32, crop_width, crop_height))
}

pub fn save_png(image: &DynamicImage, dest: &Path) -> SnapshotResult<()> {
    image
        .save_with_format(dest, ImageFormat::Png)
        .map_err(|source| SnapshotError::Write {
            path: dest.display().to_string(),
            source,
        })
}

pub fn encode_png(image: &DynamicImage) -> SnapshotResult<Vec<u8>> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(SnapshotError::Encode)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checker(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(image::RgbaImage::from_fn(width, height, |x, y| {
            if (x + y) % 2 == 0 {
                image::Rgba([255, 255, 255, 255])
            } else {
                image::Rgba([0, 0, 0, 255])
            }
        }))
    }

    #[test]
    fn without_a_clip_the_image_passes_through() {
        let source = checker(10, 8);
        let out = apply_clip(&source, None).expect("identity clip should succeed");
        assert_eq!(out.width(), 10);
        assert_eq!(out.height(), 8);
    }

    #[test]
    fn clip_inside_the_image_crops_to_the_rectangle() {
        let source = checker(10, 8);
        let out = apply_clip(&source, Some(RectShape::new(2.0, 2.0, 4.0, 3.0)))
            .expect("inner clip should succeed");
        assert_eq!(out.width(), 4);
        assert_eq!(out.height(), 3);
    }

    #[test]
    fn clip_overhanging_the_edge_is_clamped() {
        let source = checker(10, 8);
        let out = apply_clip(&source, Some(RectShape::new(7.0, -2.0, 100.0, 6.0)))
            .expect("overhanging clip should clamp");
        assert_eq!(out.width(), 3);
        assert_eq!(out.height(), 4);
    }

    #[test]
    fn clip_outside_the_image_is_rejected() {
        let source = checker(10, 8);
        let err = apply_clip(&source, Some(RectShape::new(50.0, 50.0, 5.0, 5.0)))
            .expect_err("disjoint clip should fail");
        assert!(matches!(err, SnapshotError::EmptyClip));
    }

    #[test]
    fn encode_png_emits_a_png_stream() {
        let bytes = encode_png(&checker(4, 4)).expect("encode should succeed");
        assert_eq!(&bytes[..8], &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
    }

    #[test]
    fn save_png_round_trips_through_disk() {
        let mut dest = std::env::temp_dir();
        dest.push("markview_snapshot_roundtrip.png");

        save_png(&checker(6, 5), &dest).expect("save should succeed");
        let loaded = load_source(&dest).expect("load should succeed");
        assert_eq!(loaded.width(), 6);
        assert_eq!(loaded.height(), 5);

        let _ = std::fs::remove_file(&dest);
    }

    #[test]
    fn load_source_reports_missing_files() {
        let err = load_source(Path::new("/nonexistent/markview.png"))
            .expect_err("missing file should fail");
        assert!(matches!(err, SnapshotError::Load { .. }));
    }
}
