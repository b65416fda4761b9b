//! Best-effort download of product images, the logo and the PDF font.
use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::AppError;

#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, AppError>;
}

pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new(timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0")
            .build()
            .map_err(|e| AppError::Configuration(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, AppError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::ExternalResource(format!("Failed to fetch {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(AppError::ExternalResource(format!("{} answered {}", url, response.status())));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::ExternalResource(format!("Failed to read {}: {}", url, e)))?;
        Ok(bytes.to_vec())
    }
}

/// Image bytes resolved before rendering. A missing entry renders as an
/// empty cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageSet {
    pub images: HashMap<String, Vec<u8>>,
    pub logo: Option<Vec<u8>>,
}

impl ImageSet {
    pub fn get(&self, image_ref: Option<&str>) -> Option<&[u8]> {
        image_ref.and_then(|r| self.images.get(r)).map(Vec::as_slice)
    }
}

fn is_remote(image_ref: &str) -> bool {
    image_ref.starts_with("http://") || image_ref.starts_with("https://")
}

/// Fetch an optional asset, logging and dropping failures.
pub async fn fetch_optional(fetcher: &dyn ImageFetcher, url: Option<&str>, what: &str) -> Option<Vec<u8>> {
    let url = url?;
    match fetcher.fetch(url).await {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            tracing::warn!(error = %e, asset = what, "Asset unavailable, rendering without it");
            None
        }
    }
}

/// Download every distinct remote image reference plus the logo.
pub async fn resolve_images<'a, I>(fetcher: &dyn ImageFetcher, image_refs: I, logo_url: Option<&str>) -> ImageSet
where
    I: IntoIterator<Item = &'a str>,
{
    let mut set = ImageSet::default();
    let mut failed = 0;

    for image_ref in image_refs {
        if set.images.contains_key(image_ref) {
            continue;
        }
        if !is_remote(image_ref) {
            tracing::warn!(image_ref, "Image reference is not an http(s) URL, skipping");
            continue;
        }
        match fetcher.fetch(image_ref).await {
            Ok(bytes) => {
                set.images.insert(image_ref.to_string(), bytes);
            }
            Err(e) => {
                failed += 1;
                tracing::warn!(error = %e, "Product image unavailable");
            }
        }
    }

    set.logo = fetch_optional(fetcher, logo_url, "logo").await;
    tracing::info!(fetched = set.images.len(), failed, "Images resolved");
    set
}
