//! Content inspection of downloaded files
//!
//! Everything here is blocking file IO and decoding; callers run it under
//! `spawn_blocking`.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

const HASH_CHUNK_SIZE: usize = 64 * 1024;
const SNIFF_LEN: usize = 64;

/// What the bytes of a file say about it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedMedia {
    pub mime_type: Option<String>,

    /// Pixel size, for formats the image decoder understands
    pub dimensions: Option<(u32, u32)>,

    /// MD5 hex digest of the whole file
    pub content_hash: String,
}

/// Hashes a file and sniffs its type and dimensions
pub fn inspect_file(path: &Path) -> io::Result<DetectedMedia> {
    let content_hash = hash_file(path)?;
    let header = read_header(path)?;
    let mime_type = sniff_mime(&header)
        .or_else(|| mime_from_extension(path))
        .map(str::to_string);
    let dimensions = image_dimensions(path);

    Ok(DetectedMedia {
        mime_type,
        dimensions,
        content_hash,
    })
}

/// Computes the MD5 hex digest of a file, reading it in chunks
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut context = md5::Context::new();
    let mut buf = vec![0u8; HASH_CHUNK_SIZE];

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        context.consume(&buf[..n]);
    }

    Ok(format!("{:x}", context.compute()))
}

fn read_header(path: &Path) -> io::Result<Vec<u8>> {
    let mut header = Vec::with_capacity(SNIFF_LEN);
    File::open(path)?
        .take(SNIFF_LEN as u64)
        .read_to_end(&mut header)?;
    Ok(header)
}

/// Identifies a MIME type from leading magic bytes
pub fn sniff_mime(header: &[u8]) -> Option<&'static str> {
    if let Ok(format) = image::guess_format(header) {
        return Some(format.to_mime_type());
    }

    if header.len() >= 12 && &header[4..8] == b"ftyp" {
        return Some(match &header[8..12] {
            b"qt  " => "video/quicktime",
            b"M4A " => "audio/mp4",
            _ => "video/mp4",
        });
    }

    if header.len() >= 12 && header.starts_with(b"RIFF") {
        match &header[8..12] {
            b"WAVE" => return Some("audio/wav"),
            b"AVI " => return Some("video/x-msvideo"),
            _ => {}
        }
    }

    const SIGNATURES: &[(&[u8], &str)] = &[
        (&[0x1A, 0x45, 0xDF, 0xA3], "video/webm"),
        (b"FWS", "application/x-shockwave-flash"),
        (b"CWS", "application/x-shockwave-flash"),
        (b"ZWS", "application/x-shockwave-flash"),
        (b"FLV", "video/x-flv"),
        (b"ID3", "audio/mpeg"),
        (&[0xFF, 0xFB], "audio/mpeg"),
        (&[0xFF, 0xF3], "audio/mpeg"),
        (b"OggS", "audio/ogg"),
        (b"fLaC", "audio/flac"),
        (b"%PDF", "application/pdf"),
        (b"{\\rtf", "application/rtf"),
        (b"PK\x03\x04", "application/zip"),
    ];

    SIGNATURES
        .iter()
        .find(|(magic, _)| header.starts_with(magic))
        .map(|(_, mime)| *mime)
}

/// Guesses a MIME type from the file extension
pub fn mime_from_extension(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "swf" => "application/x-shockwave-flash",
        "mp3" => "audio/mpeg",
        "ogg" => "audio/ogg",
        "wav" => "audio/wav",
        "txt" => "text/plain",
        "rtf" => "application/rtf",
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => return None,
    };
    Some(mime)
}

/// Reads pixel dimensions from the image header, without decoding pixels
pub fn image_dimensions(path: &Path) -> Option<(u32, u32)> {
    let file = File::open(path).ok()?;
    image::ImageReader::new(BufReader::new(file))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}
