//! Image downloads.
//!
//! Downloads run sequentially in selection order so the files on disk
//! line up with the ranking. Each download is fault-isolated: a refusal
//! is logged and the batch moves on to the next candidate.

use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use std::path::Path;
use tracing::{debug, warn};

use crate::config::ImagesConfig;
use crate::models::{CandidateImage, FetchedImage};

/// Derive a file extension from the URL path. Anything outside the
/// usual web image set becomes `jpg`.
pub fn extension_for(url: &str) -> String {
    let path = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or(url).to_string(),
    };
    let ext = path.rsplit('.').next().unwrap_or("jpg").to_ascii_lowercase();
    if matches!(ext.as_str(), "jpg" | "jpeg" | "png" | "webp" | "gif") {
        ext
    } else {
        "jpg".to_string()
    }
}

/// Download one image to `{dir}/img_{index}.{ext}`.
///
/// Returns `None` on any refusal: transport error, non-2xx status, a
/// content type that is not `image/*` (a missing header counts), an
/// empty body, or a failed write.
pub async fn download_image(
    client: &reqwest::Client,
    config: &ImagesConfig,
    url: &str,
    index: usize,
) -> Option<FetchedImage> {
    let resp = match client
        .get(url)
        .header(USER_AGENT, config.user_agent.as_str())
        .timeout(config.download_timeout())
        .send()
        .await
    {
        Ok(resp) => resp,
        Err(e) => {
            warn!(url = %url, error = %e, "Image download failed");
            return None;
        }
    };
    if !resp.status().is_success() {
        warn!(url = %url, status = %resp.status(), "Image download refused");
        return None;
    }

    let content_type = resp
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    if !content_type.starts_with("image/") {
        warn!(url = %url, content_type = %content_type, "Skipping non-image response");
        return None;
    }

    let bytes = match resp.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(url = %url, error = %e, "Reading image body failed");
            return None;
        }
    };
    if bytes.is_empty() {
        warn!(url = %url, "Skipping empty image body");
        return None;
    }

    let path = Path::new(&config.dir).join(format!("img_{index}.{}", extension_for(url)));
    if let Err(e) = tokio::fs::write(&path, &bytes).await {
        warn!(url = %url, path = %path.display(), error = %e, "Writing image file failed");
        return None;
    }

    debug!(url = %url, path = %path.display(), bytes = bytes.len(), "Saved image");
    Some(FetchedImage {
        url: url.to_string(),
        path,
        bytes: bytes.len() as u64,
    })
}

/// Download a ranked batch, keeping whatever succeeds in order.
pub async fn download_images(
    client: &reqwest::Client,
    config: &ImagesConfig,
    selected: &[CandidateImage],
) -> Vec<FetchedImage> {
    let mut fetched = Vec::new();
    for (index, candidate) in selected.iter().enumerate() {
        if let Some(image) = download_image(client, config, &candidate.url, index).await {
            fetched.push(image);
        }
    }
    fetched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::spawn_server;

    fn test_config(dir: &std::path::Path) -> ImagesConfig {
        let mut config = ImagesConfig::default();
        config.dir = dir.display().to_string();
        config.download_timeout_secs = 5;
        config
    }

    fn candidate(url: String) -> CandidateImage {
        CandidateImage {
            url,
            size_hint: None,
        }
    }

    #[test]
    fn test_extension_from_path() {
        assert_eq!(extension_for("https://ex.com/a/photo.png"), "png");
        assert_eq!(extension_for("https://ex.com/a/photo.JPEG"), "jpeg");
        assert_eq!(extension_for("https://ex.com/a/photo.webp?w=1600"), "webp");
    }

    #[test]
    fn test_extension_defaults_to_jpg() {
        assert_eq!(extension_for("https://ex.com/a/photo"), "jpg");
        assert_eq!(extension_for("https://ex.com/a/photo.svg"), "jpg");
        assert_eq!(extension_for("not a url"), "jpg");
    }

    #[tokio::test]
    async fn test_download_accepts_image_response() {
        let server = spawn_server("200 OK", "image/png", b"pngdata").await;
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        let url = format!("{server}/shot.png");
        let image = download_image(&reqwest::Client::new(), &config, &url, 3)
            .await
            .unwrap();
        assert_eq!(image.bytes, 7);
        assert!(image.path.ends_with("img_3.png"));
        assert_eq!(std::fs::read(&image.path).unwrap(), b"pngdata");
    }

    #[tokio::test]
    async fn test_download_rejects_non_image_content_type() {
        let server = spawn_server("200 OK", "text/html", b"<html>soft 404</html>").await;
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        let url = format!("{server}/shot.jpg");
        assert!(download_image(&reqwest::Client::new(), &config, &url, 0)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_download_rejects_error_status() {
        let server = spawn_server("404 Not Found", "image/jpeg", b"x").await;
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        let url = format!("{server}/shot.jpg");
        assert!(download_image(&reqwest::Client::new(), &config, &url, 0)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_batch_skips_failures_and_keeps_order() {
        let good = spawn_server("200 OK", "image/jpeg", b"jpegdata").await;
        let bad = spawn_server("404 Not Found", "text/html", b"gone").await;
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        let selected = vec![
            candidate(format!("{good}/a.jpg")),
            candidate(format!("{bad}/b.jpg")),
            candidate(format!("{good}/c.png")),
            candidate(format!("{bad}/d.jpg")),
            candidate(format!("{good}/e.webp")),
        ];
        let fetched = download_images(&reqwest::Client::new(), &config, &selected).await;

        assert_eq!(fetched.len(), 3);
        assert!(fetched[0].url.ends_with("a.jpg"));
        assert!(fetched[1].url.ends_with("c.png"));
        assert!(fetched[2].url.ends_with("e.webp"));
        assert!(fetched[0].path.ends_with("img_0.jpg"));
        assert!(fetched[1].path.ends_with("img_2.png"));
        assert!(fetched[2].path.ends_with("img_4.webp"));
    }
}
