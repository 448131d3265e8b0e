//! Turns uploaded bytes into a canonical RGBA buffer.
//!
//! Normalization happens in a fixed order:
//! 1. reject empty or oversized payloads before touching the decoder
//! 2. classify the declared mime type and sniff the content
//! 3. decode under dimension limits
//! 4. apply the EXIF orientation so the buffer matches what a viewer shows
//! 5. convert to 8-bit sRGB with an explicit alpha channel
//! 6. build the reduced copy used for palette extraction

use crate::config::SamplerConfig;
use crate::error::{Error, Result};
use image::imageops::FilterType;
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader, Limits, RgbaImage};
use std::io::Cursor;
use tracing::debug;

/// Raster formats accepted for upload.
const ALLOWED_MIME_TYPES: [(&str, ImageFormat); 6] = [
    ("image/jpeg", ImageFormat::Jpeg),
    ("image/jpg", ImageFormat::Jpeg),
    ("image/pjpeg", ImageFormat::Jpeg),
    ("image/png", ImageFormat::Png),
    ("image/webp", ImageFormat::WebP),
    ("image/gif", ImageFormat::Gif),
];

/// Image-like formats that are recognised but deliberately not decoded.
const KNOWN_UNSUPPORTED_MIME_TYPES: [&str; 14] = [
    "image/heic",
    "image/heif",
    "image/heic-sequence",
    "image/heif-sequence",
    "image/avif",
    "image/x-adobe-dng",
    "image/x-canon-cr2",
    "image/x-canon-cr3",
    "image/x-nikon-nef",
    "image/x-sony-arw",
    "image/x-fuji-raf",
    "image/x-olympus-orf",
    "image/x-panasonic-rw2",
    "image/tiff",
];

/// ISO-BMFF brands used by HEIF-family containers.
const HEIF_BRANDS: [&[u8; 4]; 8] = [b"heic", b"heix", b"hevc", b"hevx", b"heim", b"heis", b"mif1", b"avif"];

/// Declared payload type plus diagnostics-only details about the upload.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SourceMetadata {
    pub filename: Option<String>,
    pub byte_len: usize,
    /// The mime type as declared by the uploader.
    pub mime: String,
    /// Mime type of the format the content actually decoded as.
    pub format: String,
}

/// A decoded upload.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    /// Full-resolution buffer in visual orientation, used for sampling.
    pub pixels: RgbaImage,
    /// Downscaled copy bounded by the extraction dimension, used for palettes.
    pub reduced: RgbaImage,
    pub format: ImageFormat,
}

impl NormalizedImage {
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

#[derive(Debug, Clone)]
pub struct ImageNormalizer {
    max_upload_bytes: usize,
    max_decode_dimension: u32,
    extract_max_dimension: u32,
}

impl ImageNormalizer {
    pub fn new(config: &SamplerConfig) -> Self {
        Self {
            max_upload_bytes: config.max_upload_bytes,
            max_decode_dimension: config.max_decode_dimension,
            extract_max_dimension: config.extract_max_dimension,
        }
    }

    /// Decode `bytes` and build both buffers. `extract_max_dimension` overrides the configured
    /// bound on the reduced copy.
    pub fn normalize(
        &self,
        bytes: &[u8],
        mime: &str,
        extract_max_dimension: Option<u32>,
    ) -> Result<NormalizedImage> {
        let (format, pixels) = self.decode_rgba(bytes, mime)?;
        let bound = extract_max_dimension
            .unwrap_or(self.extract_max_dimension)
            .max(1);
        let reduced = reduce(&pixels, bound);

        debug!(
            format = ?format,
            width = pixels.width(),
            height = pixels.height(),
            reduced_width = reduced.width(),
            reduced_height = reduced.height(),
            "normalized upload"
        );

        Ok(NormalizedImage {
            pixels,
            reduced,
            format,
        })
    }

    /// Decode without building the reduced copy.
    pub fn decode_rgba(&self, bytes: &[u8], mime: &str) -> Result<(ImageFormat, RgbaImage)> {
        if bytes.is_empty() {
            return Err(Error::EmptyInput);
        }

        if bytes.len() > self.max_upload_bytes {
            return Err(Error::PayloadTooLarge {
                size: bytes.len(),
                max: self.max_upload_bytes,
            });
        }

        let declared = classify_mime(mime)?;
        let format = sniff_format(bytes)?.unwrap_or(declared);

        let mut limits = Limits::default();
        limits.max_image_width = Some(self.max_decode_dimension);
        limits.max_image_height = Some(self.max_decode_dimension);

        let mut reader = ImageReader::with_format(Cursor::new(bytes), format);
        reader.limits(limits);

        let mut decoder = reader.into_decoder().map_err(map_image_error)?;
        let orientation = decoder.orientation().map_err(map_image_error)?;
        let mut image = DynamicImage::from_decoder(decoder).map_err(map_image_error)?;
        image.apply_orientation(orientation);

        Ok((format, image.into_rgba8()))
    }
}

/// Map a declared mime type onto a decodable format.
pub fn classify_mime(mime: &str) -> Result<ImageFormat> {
    let essence = mime
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if let Some((_, format)) = ALLOWED_MIME_TYPES.iter().find(|(name, _)| *name == essence) {
        return Ok(*format);
    }

    if KNOWN_UNSUPPORTED_MIME_TYPES.contains(&essence.as_str()) {
        return Err(Error::FormatNotSupported(essence));
    }

    Err(Error::UnsupportedMime(essence))
}

/// Detect the content format from magic bytes. Returns `Ok(None)` when nothing is recognised so
/// the declared type gets a chance, and rejects content that is recognisably outside the
/// allow-list even when its declared type was acceptable.
fn sniff_format(bytes: &[u8]) -> Result<Option<ImageFormat>> {
    if is_heif_container(bytes) {
        return Err(Error::FormatNotSupported("image/heif".to_string()));
    }

    match image::guess_format(bytes) {
        Ok(format) if ALLOWED_MIME_TYPES.iter().any(|(_, allowed)| *allowed == format) => Ok(Some(format)),
        Ok(format) => Err(Error::FormatNotSupported(format.to_mime_type().to_string())),
        Err(_) => Ok(None),
    }
}

fn is_heif_container(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[4..8] == b"ftyp" && HEIF_BRANDS.iter().any(|brand| &bytes[8..12] == *brand)
}

fn map_image_error(err: image::ImageError) -> Error {
    match err {
        image::ImageError::Unsupported(unsupported) => Error::FormatNotSupported(unsupported.to_string()),
        other => Error::Decode(other),
    }
}

/// Downscale so the longest side is at most `max_dimension`, preserving aspect ratio.
fn reduce(pixels: &RgbaImage, max_dimension: u32) -> RgbaImage {
    let (width, height) = pixels.dimensions();
    let longest = width.max(height);

    if longest <= max_dimension {
        return pixels.clone();
    }

    let scale = max_dimension as f64 / longest as f64;
    let target_width = ((width as f64 * scale).round() as u32).max(1);
    let target_height = ((height as f64 * scale).round() as u32).max(1);

    image::imageops::resize(pixels, target_width, target_height, FilterType::Triangle)
}
