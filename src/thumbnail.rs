use crate::error::{PlayerError, Result};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::path::Path;

pub const THUMBNAIL_SIZE: u32 = 512;

/// Opens `path` and requires an exact 512x512 image.
pub fn validate(path: &Path) -> Result<DynamicImage> {
    let image = image::open(path).map_err(|err| {
        PlayerError::ThumbnailInvalid(format!("cannot read {}: {err}", path.display()))
    })?;
    if image.width() != THUMBNAIL_SIZE || image.height() != THUMBNAIL_SIZE {
        return Err(PlayerError::ThumbnailInvalid(format!(
            "image must be {THUMBNAIL_SIZE}x{THUMBNAIL_SIZE}, got {}x{}",
            image.width(),
            image.height()
        )));
    }
    Ok(image)
}

pub fn save_png(image: &DynamicImage, dest: &Path) -> Result<()> {
    image
        .save_with_format(dest, ImageFormat::Png)
        .map_err(|err| PlayerError::ThumbnailInvalid(format!("cannot write {}: {err}", dest.display())))
}

/// Writes the blank 512x512 cover used by playlists without their own image.
pub fn write_placeholder(dest: &Path) -> Result<()> {
    let image = RgbImage::from_fn(THUMBNAIL_SIZE, THUMBNAIL_SIZE, |_, y| {
        let shade = 236 - (y * 24 / THUMBNAIL_SIZE) as u8;
        Rgb([shade, shade, shade])
    });
    save_png(&DynamicImage::ImageRgb8(image), dest)
}

/// Downscaled RGB grid for terminal rendering: one pixel per column and two
/// pixels per text row (half blocks), so `rows` text lines need `rows * 2`
/// pixel rows.
pub fn preview(path: &Path, columns: u16, rows: u16) -> Result<RgbImage> {
    let image = image::open(path).map_err(|err| {
        PlayerError::ThumbnailInvalid(format!("cannot read {}: {err}", path.display()))
    })?;
    let width = u32::from(columns.max(1));
    let height = u32::from(rows.max(1)) * 2;
    Ok(image
        .resize_exact(width, height, FilterType::Triangle)
        .to_rgb8())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::tempdir;

    pub(crate) fn write_png(path: &Path, width: u32, height: u32) {
        RgbImage::from_pixel(width, height, Rgb([200, 40, 40]))
            .save_with_format(path, ImageFormat::Png)
            .expect("png fixture");
    }

    #[test]
    fn accepts_exact_size() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("ok.png");
        write_png(&path, 512, 512);
        let image = validate(&path).expect("valid");
        assert_eq!((image.width(), image.height()), (512, 512));
    }

    #[test]
    fn placeholder_passes_validation() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("blank.png");
        write_placeholder(&path).expect("write");
        validate(&path).expect("placeholder is a valid thumbnail");
    }

    #[test]
    fn rejects_wrong_dimensions() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("small.png");
        write_png(&path, 256, 512);
        let err = validate(&path).expect_err("wrong size");
        assert!(matches!(err, PlayerError::ThumbnailInvalid(ref msg) if msg.contains("256x512")));
    }

    #[test]
    fn rejects_unreadable_files() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("garbage.png");
        std::fs::write(&path, b"not an image").expect("write");
        assert!(matches!(validate(&path), Err(PlayerError::ThumbnailInvalid(_))));
    }

    #[test]
    fn preview_is_downscaled_to_half_block_grid() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("ok.png");
        write_png(&path, 512, 512);
        let grid = preview(&path, 16, 8).expect("preview");
        assert_eq!(grid.dimensions(), (16, 16));
        let Rgb([r, g, b]) = *grid.get_pixel(0, 0);
        assert!(r.abs_diff(200) <= 2 && g.abs_diff(40) <= 2 && b.abs_diff(40) <= 2);
    }
}
