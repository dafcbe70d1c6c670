use crate::error::PreprocessError;
use image::{GrayImage, ImageFormat};
use std::path::Path;

/// Write the preprocessed image to `path` as PNG for inspection
/// The caller decides whether a failure here matters; the pipeline does not.
pub fn save(image: &GrayImage, path: &Path) -> Result<(), PreprocessError> {
    image
        .save_with_format(path, ImageFormat::Png)
        .map_err(|e| PreprocessError::Persist {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_save_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("debug.png");
        let img = GrayImage::from_fn(8, 4, |x, _| Luma([(x * 30) as u8]));

        save(&img, &path).unwrap();

        let reloaded = image::open(&path).unwrap().into_luma8();
        assert_eq!(reloaded, img);
    }

    #[test]
    fn test_save_into_missing_directory_is_persist_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("debug.png");
        let img = GrayImage::new(4, 4);

        match save(&img, &path) {
            Err(PreprocessError::Persist { path: failed, .. }) => assert_eq!(failed, path),
            other => panic!("expected persist error, got {:?}", other),
        }
    }
}
