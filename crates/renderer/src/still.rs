//! CPU still-frame export.
//!
//! Evaluates [`FragmentProgram::color`] for every pixel, so a frame can be
//! previewed or snapshotted on machines without a usable GPU.

use std::path::Path;

use anyhow::{Context, Result};
use image::{ImageFormat, Rgba, RgbaImage};

use crate::error::RenderError;
use crate::program::FragmentProgram;
use crate::uniforms::{RESOLUTION_UNIFORM, TIME_UNIFORM};

/// Renders one frame of `program` at `time` seconds.
///
/// Image row 0 is the top of the frame; the program sees GL coordinates with
/// the origin at the bottom-left and pixel centres at `.5`.
pub fn render_still(
    program: &FragmentProgram,
    (width, height): (u32, u32),
    time: f64,
) -> Result<RgbaImage, RenderError> {
    if width == 0 || height == 0 {
        return Err(RenderError::InvalidUniformValue {
            name: RESOLUTION_UNIFORM,
            reason: format!("still frame size must be non-zero, got {width}x{height}"),
        });
    }
    if !time.is_finite() || time < 0.0 {
        return Err(RenderError::InvalidUniformValue {
            name: TIME_UNIFORM,
            reason: format!("still frame time must be finite and non-negative, got {time}"),
        });
    }

    let resolution = [width as f32, height as f32];
    let time = time as f32;
    let image = RgbaImage::from_fn(width, height, |column, row| {
        let pixel = [column as f32 + 0.5, (height - 1 - row) as f32 + 0.5];
        let color = program.color(pixel, resolution, time);
        Rgba(color.map(to_channel))
    });
    Ok(image)
}

/// Writes `image` as a PNG, creating parent directories as needed.
pub fn export_png(image: &RgbaImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    image
        .save_with_format(path, ImageFormat::Png)
        .with_context(|| format!("failed to write still frame to {}", path.display()))?;
    tracing::info!(
        path = %path.display(),
        width = image.width(),
        height = image.height(),
        "exported still frame"
    );
    Ok(())
}

fn to_channel(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{ProgramPreset, ProgramTuning};

    #[test]
    fn still_frames_are_deterministic_and_opaque() {
        let program = FragmentProgram::preset(ProgramPreset::Landing);
        let first = render_still(&program, (32, 18), 2.5).unwrap();
        let second = render_still(&program, (32, 18), 2.5).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.dimensions(), (32, 18));
        assert!(first.pixels().all(|pixel| pixel.0[3] == 255));
    }

    #[test]
    fn rows_follow_the_gl_origin() {
        let program = FragmentProgram::default();
        let image = render_still(&program, (4, 3), 1.0).unwrap();
        let bottom_left = program.color([0.5, 0.5], [4.0, 3.0], 1.0).map(to_channel);
        assert_eq!(image.get_pixel(0, 2).0, bottom_left);
    }

    #[test]
    fn rejects_degenerate_requests() {
        let program = FragmentProgram::new(ProgramTuning::default());
        assert!(matches!(
            render_still(&program, (0, 10), 0.0),
            Err(RenderError::InvalidUniformValue { name: RESOLUTION_UNIFORM, .. })
        ));
        assert!(matches!(
            render_still(&program, (10, 10), -1.0),
            Err(RenderError::InvalidUniformValue { name: TIME_UNIFORM, .. })
        ));
    }

    #[test]
    fn channels_are_clamped() {
        assert_eq!(to_channel(-0.2), 0);
        assert_eq!(to_channel(1.7), 255);
        assert_eq!(to_channel(0.5), 128);
    }

    #[test]
    fn png_export_writes_a_readable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frames").join("still.png");
        let image = render_still(&FragmentProgram::default(), (8, 8), 0.0).unwrap();
        export_png(&image, &path).unwrap();

        let reloaded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(reloaded, image);
    }
}
