use favsync::config::{load_config_with_hash, Config};
use image::{ImageFormat, RgbImage};
use std::io::Cursor;
use std::path::Path;
use tempfile::TempDir;

/// Encodes a solid PNG of the given size
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, image::Rgb([40, 90, 200]));
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, ImageFormat::Png)
        .expect("Failed to encode test image");
    bytes.into_inner()
}

/// Writes a config file into `dir` and loads it
///
/// Delays are zero so runs finish quickly; `section` holds the provider table.
pub fn write_config(dir: &TempDir, max_dup_count: u32, section: &str) -> (Config, String) {
    let content = format!(
        r#"
[files]
dir = '{files}'

[database]
path = '{db}'

[sync]
max-dup-count = {max_dup_count}
item-delay-ms = 0
max-page-failures = 1
page-retry-delay-ms = 0

{section}
"#,
        files = dir.path().join("files").display(),
        db = dir.path().join("favsync.db").display(),
        max_dup_count = max_dup_count,
        section = section,
    );

    let path = dir.path().join("config.toml");
    std::fs::write(&path, content).expect("Failed to write config");
    load_config_with_hash(&path).expect("Failed to load config")
}

pub fn file_count(root: &Path) -> usize {
    if !root.exists() {
        return 0;
    }
    let mut count = 0;
    for entry in std::fs::read_dir(root).expect("Failed to read dir") {
        let path = entry.expect("Failed to read entry").path();
        if path.is_dir() {
            count += file_count(&path);
        } else {
            count += 1;
        }
    }
    count
}
