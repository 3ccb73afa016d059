// Screenshot functionality
//
// Dumps the PPU framebuffer to a PNG file, optionally scaled. This is
// the headless driver's only visual output.

use std::fmt;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

/// Errors that can occur when saving screenshots
#[derive(Debug)]
pub enum ScreenshotError {
    /// I/O error creating or writing the file
    Io(io::Error),

    /// PNG encoding error
    Encoding(png::EncodingError),
}

impl fmt::Display for ScreenshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScreenshotError::Io(e) => write!(f, "I/O error: {}", e),
            ScreenshotError::Encoding(e) => write!(f, "PNG encoding error: {}", e),
        }
    }
}

impl std::error::Error for ScreenshotError {}

impl From<io::Error> for ScreenshotError {
    fn from(e: io::Error) -> Self {
        ScreenshotError::Io(e)
    }
}

impl From<png::EncodingError> for ScreenshotError {
    fn from(e: png::EncodingError) -> Self {
        ScreenshotError::Encoding(e)
    }
}

/// Build a screenshot path from a directory, ROM stem, and timestamp flag
pub fn screenshot_path(directory: &Path, rom_stem: &str, with_timestamp: bool) -> PathBuf {
    let name = if with_timestamp {
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        format!("{}_{}.png", rom_stem, stamp)
    } else {
        format!("{}.png", rom_stem)
    };
    directory.join(name)
}

/// Save a 0x00RRGGBB framebuffer as a PNG, replicated by `scale`
pub fn save_screenshot<P: AsRef<Path>>(
    framebuffer: &[u32],
    width: usize,
    height: usize,
    scale: usize,
    path: P,
) -> Result<(), ScreenshotError> {
    let scale = scale.max(1);
    let out_width = width * scale;
    let out_height = height * scale;

    let mut data = Vec::with_capacity(out_width * out_height * 3);
    for y in 0..out_height {
        for x in 0..out_width {
            let pixel = framebuffer[(y / scale) * width + x / scale];
            data.push((pixel >> 16) as u8);
            data.push((pixel >> 8) as u8);
            data.push(pixel as u8);
        }
    }

    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let mut encoder = png::Encoder::new(writer, out_width as u32, out_height as u32);
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);
    let mut png_writer = encoder.write_header()?;
    png_writer.write_image_data(&data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screenshot_path_without_timestamp() {
        let path = screenshot_path(Path::new("shots"), "demo", false);
        assert_eq!(path, PathBuf::from("shots/demo.png"));
    }

    #[test]
    fn test_screenshot_path_with_timestamp() {
        let path = screenshot_path(Path::new("shots"), "demo", true);
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("demo_"));
        assert!(name.ends_with(".png"));
    }

    #[test]
    fn test_save_and_reload_screenshot() {
        let dir = std::env::temp_dir().join("ncdx_screenshot_test");
        let path = dir.join("frame.png");
        let framebuffer = vec![0x00FF0000u32; 4 * 2]; // 4x2 red

        save_screenshot(&framebuffer, 4, 2, 2, &path).expect("save");

        let decoder = png::Decoder::new(std::io::BufReader::new(File::open(&path).expect("open")));
        let mut reader = decoder.read_info().expect("read info");
        let info = reader.info();
        assert_eq!(info.width, 8, "2x scale doubles width");
        assert_eq!(info.height, 4);

        let mut buf = vec![0u8; 8 * 4 * 3];
        reader.next_frame(&mut buf).expect("decode");
        assert_eq!(&buf[0..3], &[0xFF, 0x00, 0x00]);

        let _ = std::fs::remove_dir_all(dir);
    }
}
