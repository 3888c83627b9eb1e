//! Image manifest fetch and decode pipeline for the overlay collage.
//!
//! The manifest endpoint returns `{ "images": ["url", ...] }`. Failure is
//! silent by design: the overlay degrades to an empty canvas, no retries.

use eframe::egui;
use image::RgbaImage;
use serde::Deserialize;
use std::sync::mpsc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::GalleryConfig;

/// Errors from the manifest or image pipeline.
#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("gallery endpoint returned {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed image manifest: {0}")]
    Manifest(#[from] serde_json::Error),
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),
}

/// Wire format of the manifest endpoint. A missing `images` field reads
/// as an empty list.
#[derive(Debug, Deserialize)]
struct ImageManifest {
    #[serde(default)]
    images: Vec<String>,
}

/// RGBA pixels ready for texture upload.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// Messages from the loader tasks to the UI thread.
pub enum GalleryEvent {
    ManifestLoaded(Vec<String>),
    ManifestFailed,
    ImageReady { url: String, image: DecodedImage },
    ImageFailed { url: String },
}

/// HTTP client for the gallery endpoint.
#[derive(Clone)]
pub struct GalleryClient {
    http: reqwest::Client,
    endpoint: String,
}

impl GalleryClient {
    pub fn new(config: &GalleryConfig) -> Result<Self, GalleryError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            http,
            endpoint: config.endpoint_url.clone(),
        })
    }

    /// Fetch and parse the image manifest.
    pub async fn fetch_manifest(&self) -> Result<Vec<String>, GalleryError> {
        let response = self.http.get(&self.endpoint).send().await?;
        if !response.status().is_success() {
            return Err(GalleryError::Status(response.status()));
        }
        let body = response.text().await?;
        parse_manifest(&body)
    }

    /// Download and decode one image to RGBA.
    pub async fn fetch_image(&self, url: &str) -> Result<DecodedImage, GalleryError> {
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            return Err(GalleryError::Status(response.status()));
        }
        let bytes = response.bytes().await?;
        let rgba = image::load_from_memory(&bytes)?.to_rgba8();
        debug!("Decoded {} ({}x{})", url, rgba.width(), rgba.height());
        Ok(DecodedImage {
            width: rgba.width(),
            height: rgba.height(),
            rgba: rgba.into_raw(),
        })
    }

    /// Kick off the manifest fetch and, on success, one decode task per URL.
    /// Every outcome lands in `tx` and pokes the UI awake.
    pub fn spawn_load(
        &self,
        handle: &tokio::runtime::Handle,
        tx: mpsc::Sender<GalleryEvent>,
        ctx: egui::Context,
    ) {
        let client = self.clone();
        handle.spawn(async move {
            match client.fetch_manifest().await {
                Ok(images) => {
                    info!("Image manifest loaded: {} entries", images.len());
                    let _ = tx.send(GalleryEvent::ManifestLoaded(images.clone()));
                    ctx.request_repaint();

                    for url in images {
                        let client = client.clone();
                        let tx = tx.clone();
                        let ctx = ctx.clone();
                        tokio::spawn(async move {
                            let event = match client.fetch_image(&url).await {
                                Ok(image) => GalleryEvent::ImageReady { url, image },
                                Err(e) => {
                                    warn!("Failed to load image {}: {}", url, e);
                                    GalleryEvent::ImageFailed { url }
                                }
                            };
                            let _ = tx.send(event);
                            ctx.request_repaint();
                        });
                    }
                }
                Err(e) => {
                    warn!("Gallery fetch failed, overlay degrades to empty: {}", e);
                    let _ = tx.send(GalleryEvent::ManifestFailed);
                    ctx.request_repaint();
                }
            }
        });
    }
}

/// Parse a manifest body.
fn parse_manifest(body: &str) -> Result<Vec<String>, GalleryError> {
    let manifest: ImageManifest = serde_json::from_str(body)?;
    Ok(manifest.images)
}

/// Gaussian-blur an image, preserving dimensions. A zero sigma is a no-op.
pub fn blur(image: &DecodedImage, sigma: f32) -> DecodedImage {
    if sigma <= 0.0 {
        return image.clone();
    }
    let Some(buf) = RgbaImage::from_raw(image.width, image.height, image.rgba.clone()) else {
        return image.clone();
    };
    let blurred = image::imageops::blur(&buf, sigma);
    DecodedImage {
        width: blurred.width(),
        height: blurred.height(),
        rgba: blurred.into_raw(),
    }
}

/// Center-crop an image to a square, for uniform collage cards.
pub fn center_square_crop(image: &DecodedImage) -> DecodedImage {
    let side = image.width.min(image.height);
    if side == 0 || image.width == image.height {
        return image.clone();
    }
    let Some(buf) = RgbaImage::from_raw(image.width, image.height, image.rgba.clone()) else {
        return image.clone();
    };
    let x0 = (image.width - side) / 2;
    let y0 = (image.height - side) / 2;
    let cropped = image::imageops::crop_imm(&buf, x0, y0, side, side).to_image();
    DecodedImage {
        width: side,
        height: side,
        rgba: cropped.into_raw(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32) -> DecodedImage {
        DecodedImage {
            width,
            height,
            rgba: vec![128; (width * height * 4) as usize],
        }
    }

    #[test]
    fn manifest_parses_image_list() {
        let images = parse_manifest(r#"{"images": ["a.jpg", "b.png"]}"#).unwrap();
        assert_eq!(images, vec!["a.jpg".to_string(), "b.png".to_string()]);
    }

    #[test]
    fn manifest_missing_field_reads_as_empty() {
        let images = parse_manifest("{}").unwrap();
        assert!(images.is_empty());
    }

    #[test]
    fn manifest_garbage_is_an_error() {
        assert!(parse_manifest("not json at all").is_err());
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let err = image::load_from_memory(b"definitely not an image");
        assert!(err.is_err());
    }

    #[test]
    fn blur_preserves_dimensions() {
        let blurred = blur(&solid(6, 4), 1.5);
        assert_eq!((blurred.width, blurred.height), (6, 4));
        assert_eq!(blurred.rgba.len(), 6 * 4 * 4);
    }

    #[test]
    fn zero_sigma_blur_is_identity() {
        let img = solid(3, 3);
        let out = blur(&img, 0.0);
        assert_eq!(out.rgba, img.rgba);
    }

    #[test]
    fn crop_produces_centered_square() {
        let cropped = center_square_crop(&solid(10, 4));
        assert_eq!((cropped.width, cropped.height), (4, 4));
        assert_eq!(cropped.rgba.len(), 4 * 4 * 4);
    }

    #[test]
    fn crop_leaves_squares_alone() {
        let img = solid(5, 5);
        let out = center_square_crop(&img);
        assert_eq!((out.width, out.height), (5, 5));
    }
}
