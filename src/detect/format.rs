use bytes::Bytes;

use crate::error::DecodeError;

const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Webp,
    Bmp,
    Unknown,
}

/// Detect the image format from the leading bytes of a file.
pub fn detect_format(header: &[u8]) -> ImageFormat {
    // PNG: fixed 8-byte signature
    if header.len() >= 8 && header[0..8] == PNG_MAGIC {
        return ImageFormat::Png;
    }

    // JPEG: SOI marker followed by the start of another marker
    if header.len() >= 3 && header[0..3] == [0xFF, 0xD8, 0xFF] {
        return ImageFormat::Jpeg;
    }

    // GIF: "GIF87a" / "GIF89a"
    if header.len() >= 6 && (&header[0..6] == b"GIF87a" || &header[0..6] == b"GIF89a") {
        return ImageFormat::Gif;
    }

    // WebP: RIFF container with "WEBP" form type at offset 8
    if header.len() >= 12 && &header[0..4] == b"RIFF" && &header[8..12] == b"WEBP" {
        return ImageFormat::Webp;
    }

    if header.len() >= 2 && &header[0..2] == b"BM" {
        return ImageFormat::Bmp;
    }

    ImageFormat::Unknown
}

/// Read pixel dimensions from the header when the format stores them at a
/// fixed offset. Returns (width, height).
pub fn read_dimensions(header: &[u8], format: ImageFormat) -> Option<(u32, u32)> {
    match format {
        ImageFormat::Png => {
            // IHDR is always the first chunk: width/height big-endian at 16..24.
            if header.len() < 24 || &header[12..16] != b"IHDR" {
                return None;
            }
            let width = u32::from_be_bytes([header[16], header[17], header[18], header[19]]);
            let height = u32::from_be_bytes([header[20], header[21], header[22], header[23]]);
            Some((width, height))
        }
        ImageFormat::Gif => {
            // Logical screen descriptor, little-endian u16s at 6..10.
            if header.len() < 10 {
                return None;
            }
            let width = u16::from_le_bytes([header[6], header[7]]) as u32;
            let height = u16::from_le_bytes([header[8], header[9]]) as u32;
            Some((width, height))
        }
        ImageFormat::Bmp => {
            // BITMAPINFOHEADER: i32 width/height at 18..26; height may be negative (top-down).
            if header.len() < 26 {
                return None;
            }
            let width = i32::from_le_bytes([header[18], header[19], header[20], header[21]]);
            let height = i32::from_le_bytes([header[22], header[23], header[24], header[25]]);
            Some((width.unsigned_abs(), height.unsigned_abs()))
        }
        _ => None,
    }
}

/// A decoded artifact ready to hand to a sink.
///
/// Decoding validates the payload as a recognised image and records its
/// format (and dimensions where cheaply available). Pixel decoding is left to
/// the sink, which knows its rendering target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    bytes: Bytes,
    format: ImageFormat,
    dimensions: Option<(u32, u32)>,
}

impl Artifact {
    pub fn decode(bytes: impl Into<Bytes>) -> Result<Self, DecodeError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(DecodeError::Empty);
        }

        let format = detect_format(&bytes);
        if format == ImageFormat::Unknown {
            return Err(DecodeError::UnknownFormat);
        }

        let dimensions = read_dimensions(&bytes, format);
        Ok(Self {
            bytes,
            format,
            dimensions,
        })
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
