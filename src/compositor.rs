//! Spanning-image builder for desktops without per-monitor wallpapers.
//!
//! Each monitor's image is stretched to exactly that monitor's size (aspect
//! ratio is not kept) and pasted at the monitor's offset on one canvas as big
//! as the bounding box of all monitors. The result goes to a kept temporary
//! PNG; nothing in the crate deletes it afterwards.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::{ImageFormat, ImageReader, RgbImage};
use tracing::debug;

use crate::error::{Result, WallError};
use crate::monitor::Monitor;

/// `(max(x + width), max(y + height))` over all monitors.
pub fn canvas_size(displays: &[Monitor]) -> Result<(u32, u32)> {
    let width = displays.iter().map(Monitor::right).max();
    let height = displays.iter().map(Monitor::bottom).max();
    let (Some(width), Some(height)) = (width, height) else {
        return Err(WallError::Composition("no displays to compose for".into()));
    };
    let dimension = |value: i64| {
        u32::try_from(value)
            .ok()
            .filter(|v| *v > 0)
            .ok_or_else(|| WallError::Composition(format!("canvas dimension {value} out of range")))
    };
    Ok((dimension(width)?, dimension(height)?))
}

/// Compose into the system temporary directory.
pub fn combine(displays: &[Monitor], files: &[PathBuf]) -> Result<PathBuf> {
    combine_into(displays, files, &std::env::temp_dir())
}

/// Compose `files[i]` onto `displays[i]` and write one PNG into `dir`.
pub fn combine_into(displays: &[Monitor], files: &[PathBuf], dir: &Path) -> Result<PathBuf> {
    if files.len() != displays.len() {
        return Err(WallError::Composition(format!(
            "{} images for {} displays",
            files.len(),
            displays.len()
        )));
    }
    let (width, height) = canvas_size(displays)?;
    let mut canvas = RgbImage::new(width, height);

    for (monitor, file) in displays.iter().zip(files) {
        let decode_failed = |err: &dyn std::fmt::Display| {
            WallError::Composition(format!("{}: {err}", file.display()))
        };
        let image = ImageReader::open(file)
            .and_then(ImageReader::with_guessed_format)
            .map_err(|e| decode_failed(&e))?
            .decode()
            .map_err(|e| decode_failed(&e))?;

        let resized = image
            .resize_exact(monitor.width, monitor.height, FilterType::Triangle)
            .to_rgb8();
        imageops::replace(&mut canvas, &resized, i64::from(monitor.x), i64::from(monitor.y));
    }

    let path = persist_png(dir, |out| Ok(canvas.write_to(out, ImageFormat::Png)?))?;
    debug!(path = %path.display(), width, height, "wrote composite image");

    Ok(path)
}

/// Run `write` against a fresh temporary file in `dir` and keep the file
/// only if it succeeds.
fn persist_png(
    dir: &Path,
    write: impl FnOnce(&mut BufWriter<&mut File>) -> Result<()>,
) -> Result<PathBuf> {
    let mut file = tempfile::Builder::new()
        .prefix("konawall-")
        .suffix(".png")
        .tempfile_in(dir)?;
    {
        let mut out = BufWriter::new(file.as_file_mut());
        write(&mut out)?;
        out.flush()?;
    }
    let (_, path) = file.keep().map_err(|e| WallError::Io(e.error))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use image::Rgb;

    use super::*;

    fn solid(dir: &Path, name: &str, width: u32, height: u32, colour: [u8; 3]) -> PathBuf {
        let path = dir.join(name);
        RgbImage::from_pixel(width, height, Rgb(colour))
            .save_with_format(&path, ImageFormat::Png)
            .unwrap();
        path
    }

    /// Resampling may be off by a rounding step; placement may not.
    fn assert_colour(canvas: &RgbImage, x: u32, y: u32, expected: [u8; 3]) {
        let Rgb(actual) = *canvas.get_pixel(x, y);
        for (a, e) in actual.iter().zip(expected) {
            assert!(a.abs_diff(e) <= 2, "pixel ({x}, {y}) is {actual:?}, expected {expected:?}");
        }
    }

    #[test]
    fn canvas_is_bounding_box_of_displays() {
        let displays = vec![
            Monitor::new("eDP-1", 0, 0, 1920, 1080),
            Monitor::new("DP-3", 1920, 0, 3840, 2160),
        ];
        assert_eq!(canvas_size(&displays).unwrap(), (5760, 2160));
    }

    #[test]
    fn canvas_counts_vertical_offsets() {
        let displays = vec![
            Monitor::new("top", 0, 0, 100, 50),
            Monitor::new("bottom", 20, 50, 60, 40),
        ];
        assert_eq!(canvas_size(&displays).unwrap(), (100, 90));
    }

    #[test]
    fn canvas_of_nothing_is_an_error() {
        assert!(matches!(canvas_size(&[]), Err(WallError::Composition(_))));
    }

    #[test]
    fn stretches_and_pastes_at_offsets() {
        let dir = tempfile::tempdir().unwrap();
        // Source sizes deliberately differ from the monitors: stretched, not cropped.
        let red = solid(dir.path(), "red.png", 7, 3, [255, 0, 0]);
        let blue = solid(dir.path(), "blue", 5, 5, [0, 0, 255]);
        let displays = vec![Monitor::new("a", 0, 0, 40, 20), Monitor::new("b", 40, 10, 30, 30)];

        let out = combine_into(&displays, &[red, blue], dir.path()).unwrap();
        let canvas = image::open(&out).unwrap().to_rgb8();

        assert_eq!(canvas.dimensions(), (70, 40));
        assert_colour(&canvas, 0, 0, [255, 0, 0]);
        assert_colour(&canvas, 39, 19, [255, 0, 0]);
        assert_colour(&canvas, 40, 10, [0, 0, 255]);
        assert_colour(&canvas, 69, 39, [0, 0, 255]);
        // Uncovered area stays black.
        assert_colour(&canvas, 50, 0, [0, 0, 0]);
        assert_colour(&canvas, 5, 30, [0, 0, 0]);
    }

    #[test]
    fn identical_inputs_give_identical_output() {
        let dir = tempfile::tempdir().unwrap();
        let green = solid(dir.path(), "green.png", 3, 3, [0, 200, 0]);
        let displays = vec![Monitor::new("a", 0, 0, 16, 9), Monitor::new("b", 16, 0, 16, 9)];
        let files = vec![green.clone(), green];

        let first = combine_into(&displays, &files, dir.path()).unwrap();
        let second = combine_into(&displays, &files, dir.path()).unwrap();

        assert_ne!(first, second, "every composite gets a fresh file");
        assert_eq!(
            image::open(first).unwrap().to_rgb8(),
            image::open(second).unwrap().to_rgb8()
        );
    }

    #[test]
    fn undecodable_file_fails_whole_composite() {
        let dir = tempfile::tempdir().unwrap();
        let good = solid(dir.path(), "good.png", 2, 2, [1, 2, 3]);
        let bad = dir.path().join("bad.png");
        std::fs::write(&bad, b"definitely not an image").unwrap();
        let displays = vec![Monitor::new("a", 0, 0, 4, 4), Monitor::new("b", 4, 0, 4, 4)];

        let before = std::fs::read_dir(dir.path()).unwrap().count();
        let err = combine_into(&displays, &[good, bad], dir.path()).unwrap_err();
        assert!(matches!(err, WallError::Composition(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), before, "no partial canvas");
    }

    #[test]
    fn failed_encode_leaves_no_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let err = persist_png(dir.path(), |out| {
            out.write_all(b"\x89PNG")?;
            Err(WallError::Composition("encoder gave up".into()))
        })
        .unwrap_err();
        assert!(matches!(err, WallError::Composition(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn composite_is_kept_after_writing() {
        let dir = tempfile::tempdir().unwrap();
        let path = persist_png(dir.path(), |out| Ok(out.write_all(b"done")?)).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"done");
        assert_eq!(path.extension().unwrap(), "png");
    }

    #[test]
    fn mismatched_counts_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let one = solid(dir.path(), "one.png", 2, 2, [0, 0, 0]);
        let displays = vec![Monitor::new("a", 0, 0, 4, 4), Monitor::new("b", 4, 0, 4, 4)];
        assert!(matches!(
            combine_into(&displays, &[one], dir.path()),
            Err(WallError::Composition(_))
        ));
    }
}
