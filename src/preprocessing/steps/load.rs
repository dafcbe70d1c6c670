use crate::error::PreprocessError;
use image::{DynamicImage, ImageReader};
use std::io::Cursor;
use std::path::Path;

/// Load an image from disk
///
/// The format is sniffed from the file content first, so an upload with a
/// misleading extension still decodes. Empty, truncated or undecodable files
/// fail with `PreprocessError::Decode`.
pub fn apply(path: &Path) -> Result<DynamicImage, PreprocessError> {
    let reader = ImageReader::open(path)
        .map_err(|e| PreprocessError::Decode(format!("{}: {}", path.display(), e)))?
        .with_guessed_format()
        .map_err(|e| PreprocessError::Decode(format!("{}: {}", path.display(), e)))?;

    let image = reader
        .decode()
        .map_err(|e| PreprocessError::Decode(format!("{}: {}", path.display(), e)))?;

    validate(image)
}

/// Load an image from an in-memory byte stream
pub fn from_bytes(data: &[u8]) -> Result<DynamicImage, PreprocessError> {
    if data.is_empty() {
        return Err(PreprocessError::Decode("empty input".to_string()));
    }

    let image = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| PreprocessError::Decode(e.to_string()))?
        .decode()
        .map_err(|e| PreprocessError::Decode(e.to_string()))?;

    validate(image)
}

fn validate(image: DynamicImage) -> Result<DynamicImage, PreprocessError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(PreprocessError::Decode(format!(
            "image has no pixels ({}x{})",
            image.width(),
            image.height()
        )));
    }
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, ImageFormat, Luma};
    use std::io::Write;

    fn png_bytes() -> Vec<u8> {
        let img = GrayImage::from_pixel(8, 4, Luma([200]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageLuma8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_load_decodes_png() {
        let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        file.write_all(&png_bytes()).unwrap();

        let img = apply(file.path()).unwrap();
        assert_eq!((img.width(), img.height()), (8, 4));
    }

    #[test]
    fn test_load_sniffs_format_despite_extension() {
        let mut file = tempfile::Builder::new().suffix(".jpg").tempfile().unwrap();
        file.write_all(&png_bytes()).unwrap();

        assert!(apply(file.path()).is_ok());
    }

    #[test]
    fn test_zero_byte_file_is_decode_error() {
        let file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        let err = apply(file.path()).unwrap_err();
        assert!(matches!(err, PreprocessError::Decode(_)));
    }

    #[test]
    fn test_truncated_file_is_decode_error() {
        let bytes = png_bytes();
        let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        file.write_all(&bytes[..bytes.len() / 2]).unwrap();

        let err = apply(file.path()).unwrap_err();
        assert!(matches!(err, PreprocessError::Decode(_)));
    }

    #[test]
    fn test_missing_file_is_decode_error() {
        let err = apply(Path::new("/definitely/not/here.png")).unwrap_err();
        assert!(matches!(err, PreprocessError::Decode(_)));
    }

    #[test]
    fn test_from_bytes() {
        assert!(from_bytes(&png_bytes()).is_ok());
        assert!(matches!(
            from_bytes(&[]).unwrap_err(),
            PreprocessError::Decode(_)
        ));
        assert!(matches!(
            from_bytes(b"not an image at all").unwrap_err(),
            PreprocessError::Decode(_)
        ));
    }
}
