//! Image inspection and transforms. Codec work runs on the blocking pool.

use crate::error::AppError;
use image::imageops::FilterType;
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub format: Option<String>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ImageService;

fn image_err(e: impl std::fmt::Display) -> AppError {
    AppError::collaborator("image", e)
}

async fn blocking<T, F>(f: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| image_err(format!("image task failed: {e}")))?
}

fn open(path: &Path) -> Result<DynamicImage, AppError> {
    image::open(path).map_err(|e| image_err(format!("{}: {e}", path.display())))
}

fn save(img: &DynamicImage, path: &Path) -> Result<ImageInfo, AppError> {
    let format = ImageFormat::from_path(path).map_err(image_err)?;
    // JPEG has no alpha channel.
    let img = if format == ImageFormat::Jpeg {
        DynamicImage::ImageRgb8(img.to_rgb8())
    } else {
        img.clone()
    };
    img.save_with_format(path, format)
        .map_err(|e| image_err(format!("{}: {e}", path.display())))?;
    Ok(info_of(&img, Some(format)))
}

fn info_of(img: &DynamicImage, format: Option<ImageFormat>) -> ImageInfo {
    ImageInfo {
        width: img.width(),
        height: img.height(),
        format: format.and_then(|f| f.extensions_str().first()).map(|s| s.to_string()),
    }
}

impl ImageService {
    pub async fn info(&self, path: &Path) -> Result<ImageInfo, AppError> {
        let path = path.to_path_buf();
        blocking(move || {
            let (width, height) = image::image_dimensions(&path).map_err(image_err)?;
            let format = ImageFormat::from_path(&path).ok();
            Ok(ImageInfo {
                width,
                height,
                format: format.and_then(|f| f.extensions_str().first()).map(|s| s.to_string()),
            })
        })
        .await
    }

    /// Fit inside `max_width` x `max_height`, keeping the aspect ratio.
    pub async fn resize(&self, src: &Path, dst: &Path, max_width: u32, max_height: u32) -> Result<ImageInfo, AppError> {
        if max_width == 0 || max_height == 0 {
            return Err(AppError::BadRequest("resize box must be non-empty".into()));
        }
        let (src, dst) = (src.to_path_buf(), dst.to_path_buf());
        blocking(move || {
            let img = open(&src)?.resize(max_width, max_height, FilterType::Lanczos3);
            save(&img, &dst)
        })
        .await
    }

    /// Keep the rectangle from `(x1, y1)` to `(x2, y2)`, exclusive of the far corner.
    pub async fn crop(&self, src: &Path, dst: &Path, x1: u32, y1: u32, x2: u32, y2: u32) -> Result<ImageInfo, AppError> {
        if x2 <= x1 || y2 <= y1 {
            return Err(AppError::BadRequest(format!("invalid crop rectangle ({x1},{y1})-({x2},{y2})")));
        }
        let (src, dst) = (src.to_path_buf(), dst.to_path_buf());
        blocking(move || {
            let img = open(&src)?;
            if x2 > img.width() || y2 > img.height() {
                return Err(AppError::BadRequest(format!(
                    "crop rectangle exceeds {}x{} image",
                    img.width(),
                    img.height()
                )));
            }
            save(&img.crop_imm(x1, y1, x2 - x1, y2 - y1), &dst)
        })
        .await
    }

    /// Exactly `width` x `height`: scale to cover, then center-crop.
    pub async fn thumbnail(&self, src: &Path, dst: &Path, width: u32, height: u32) -> Result<ImageInfo, AppError> {
        if width == 0 || height == 0 {
            return Err(AppError::BadRequest("thumbnail size must be non-empty".into()));
        }
        let (src, dst) = (src.to_path_buf(), dst.to_path_buf());
        blocking(move || {
            let img = open(&src)?.resize_to_fill(width, height, FilterType::Lanczos3);
            save(&img, &dst)
        })
        .await
    }

    /// Apply the EXIF orientation. Writes over `src` when `dst` is `None`.
    pub async fn auto_orient(&self, src: &Path, dst: Option<&Path>) -> Result<ImageInfo, AppError> {
        let src = src.to_path_buf();
        let dst: PathBuf = dst.map(Path::to_path_buf).unwrap_or_else(|| src.clone());
        blocking(move || {
            let mut decoder = ImageReader::open(&src)?
                .with_guessed_format()?
                .into_decoder()
                .map_err(image_err)?;
            let orientation = decoder.orientation().map_err(image_err)?;
            let mut img = DynamicImage::from_decoder(decoder).map_err(image_err)?;
            img.apply_orientation(orientation);
            save(&img, &dst)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn sample(dir: &Path) -> PathBuf {
        let path = dir.join("wide.png");
        RgbImage::from_pixel(40, 20, Rgb([200, 10, 10])).save(&path).unwrap();
        path
    }

    #[tokio::test]
    async fn transforms_report_new_dimensions() {
        let dir = tempfile::tempdir().unwrap();
        let src = sample(dir.path());
        let svc = ImageService;

        let info = svc.info(&src).await.unwrap();
        assert_eq!((info.width, info.height, info.format.as_deref()), (40, 20, Some("png")));

        let out = dir.path().join("small.jpg");
        let resized = svc.resize(&src, &out, 10, 10).await.unwrap();
        assert_eq!((resized.width, resized.height), (10, 5));
        assert_eq!(svc.info(&out).await.unwrap().width, 10);

        let cropped = svc.crop(&src, &dir.path().join("c.png"), 5, 5, 15, 10).await.unwrap();
        assert_eq!((cropped.width, cropped.height), (10, 5));

        let thumb = svc.thumbnail(&src, &dir.path().join("t.png"), 8, 8).await.unwrap();
        assert_eq!((thumb.width, thumb.height), (8, 8));

        let oriented = svc.auto_orient(&src, None).await.unwrap();
        assert_eq!((oriented.width, oriented.height), (40, 20));
    }

    #[tokio::test]
    async fn rejects_bad_rectangles() {
        let dir = tempfile::tempdir().unwrap();
        let src = sample(dir.path());
        let out = dir.path().join("c.png");
        assert!(matches!(ImageService.crop(&src, &out, 5, 5, 5, 9).await, Err(AppError::BadRequest(_))));
        assert!(matches!(ImageService.crop(&src, &out, 0, 0, 41, 9).await, Err(AppError::BadRequest(_))));
    }
}
