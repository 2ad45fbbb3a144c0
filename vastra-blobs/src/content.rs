use image::ImageFormat;

/// Image formats accepted for upload.
pub const SUPPORTED_IMAGE_FORMATS: [ImageFormat; 3] =
    [ImageFormat::Jpeg, ImageFormat::Png, ImageFormat::WebP];

/// Detect a supported image format from magic bytes.
pub fn detect_image(bytes: &[u8]) -> Option<ImageFormat> {
    image::guess_format(bytes)
        .ok()
        .filter(|format| SUPPORTED_IMAGE_FORMATS.contains(format))
}

/// MIME type for serving `bytes`, falling back to `application/octet-stream`.
pub fn content_type(bytes: &[u8]) -> &'static str {
    match image::guess_format(bytes) {
        Ok(format) => format.to_mime_type(),
        Err(_) => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    const JPEG_MAGIC: &[u8] = b"\xFF\xD8\xFF\xE0\0\x10JFIF\0";
    const GIF_MAGIC: &[u8] = b"GIF89a\x01\0\x01\0";

    #[test]
    fn detects_supported_formats() {
        assert_eq!(detect_image(PNG_MAGIC), Some(ImageFormat::Png));
        assert_eq!(detect_image(JPEG_MAGIC), Some(ImageFormat::Jpeg));
        assert_eq!(detect_image(GIF_MAGIC), None);
        assert_eq!(detect_image(b"plain text"), None);
    }

    #[test]
    fn content_type_falls_back() {
        assert_eq!(content_type(PNG_MAGIC), "image/png");
        assert_eq!(content_type(b"not an image"), "application/octet-stream");
    }
}
