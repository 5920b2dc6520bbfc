//! Page posting.
//!
//! Graph-API-shaped interface: plain posts go straight to the page
//! feed with the link inline; posts with images first upload each file
//! unpublished, then attach the collected media ids to the feed post.
//! Because an image post carries no link field, the article link is
//! added under it as a comment. A failed upload is skipped rather than
//! sinking the whole post; a failed comment leaves the post standing.

use async_trait::async_trait;
use reqwest::multipart;
use serde_json::{json, Value};
use std::error::Error;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::SocialConfig;
use crate::models::FetchedImage;

/// Timeout per posting call, in seconds.
const POST_TIMEOUT_SECS: u64 = 30;

/// Publishes a finished post to a page.
#[async_trait]
pub trait PagePoster: Send + Sync {
    /// Publish `message` with zero or more local images. Returns the
    /// created post id. The link rides on the feed post itself when
    /// there are no images, and in a follow-up comment when there are.
    async fn publish(
        &self,
        message: &str,
        link: Option<&str>,
        images: &[FetchedImage],
    ) -> Result<String, Box<dyn Error + Send + Sync>>;
}

/// Poster for a Facebook page through the Graph API.
pub struct GraphPoster {
    client: reqwest::Client,
    page_id: String,
    access_token: String,
    api_base: String,
}

impl GraphPoster {
    /// Build the poster from the social config section. Fails when the
    /// page id or access token is missing.
    pub fn from_config(
        client: reqwest::Client,
        config: &SocialConfig,
    ) -> Result<Self, Box<dyn Error>> {
        let page_id = config.page_id.clone().ok_or("social page_id missing")?;
        let access_token = config
            .access_token
            .clone()
            .ok_or("social access_token missing")?;
        Ok(Self {
            client,
            page_id,
            access_token,
            api_base: config.api_base.clone(),
        })
    }

    /// Upload one image unpublished and return its media id.
    async fn upload_photo(
        &self,
        image: &FetchedImage,
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        let bytes = tokio::fs::read(&image.path).await?;
        let file_name = image
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("img.jpg")
            .to_string();
        let form = multipart::Form::new()
            .text("published", "false")
            .text("access_token", self.access_token.clone())
            .part("source", multipart::Part::bytes(bytes).file_name(file_name));

        let url = format!("{}/{}/photos", self.api_base, self.page_id);
        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .timeout(Duration::from_secs(POST_TIMEOUT_SECS))
            .send()
            .await?
            .error_for_status()?;
        let payload: Value = resp.json().await?;
        match extract_id(&payload) {
            Some(id) => Ok(id),
            None => Err("photo upload response carried no id".into()),
        }
    }

    /// Post a comment under a published object and return the comment id.
    async fn post_comment(
        &self,
        object_id: &str,
        message: &str,
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        let params = [
            ("message", message),
            ("access_token", self.access_token.as_str()),
        ];
        let url = format!("{}/{}/comments", self.api_base, object_id);
        let resp = self
            .client
            .post(&url)
            .form(&params)
            .timeout(Duration::from_secs(POST_TIMEOUT_SECS))
            .send()
            .await?
            .error_for_status()?;
        let payload: Value = resp.json().await?;
        match extract_id(&payload) {
            Some(id) => Ok(id),
            None => Err("comment response carried no id".into()),
        }
    }
}

/// Pull the created object id out of a Graph response body.
pub fn extract_id(body: &Value) -> Option<String> {
    body.get("id")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

#[async_trait]
impl PagePoster for GraphPoster {
    async fn publish(
        &self,
        message: &str,
        link: Option<&str>,
        images: &[FetchedImage],
    ) -> Result<String, Box<dyn Error + Send + Sync>> {
        let mut media_ids = Vec::new();
        for image in images {
            match self.upload_photo(image).await {
                Ok(id) => {
                    debug!(path = %image.path.display(), media_id = %id, "Uploaded photo");
                    media_ids.push(id);
                }
                Err(e) => {
                    warn!(
                        path = %image.path.display(),
                        error = %e,
                        "Photo upload failed, posting without it"
                    );
                }
            }
        }

        let mut params: Vec<(String, String)> = vec![
            ("message".to_string(), message.to_string()),
            ("access_token".to_string(), self.access_token.clone()),
        ];
        if media_ids.is_empty() {
            if let Some(link) = link {
                params.push(("link".to_string(), link.to_string()));
            }
        }
        for (i, id) in media_ids.iter().enumerate() {
            params.push((
                format!("attached_media[{i}]"),
                json!({ "media_fbid": id }).to_string(),
            ));
        }

        let url = format!("{}/{}/feed", self.api_base, self.page_id);
        let resp = self
            .client
            .post(&url)
            .form(&params)
            .timeout(Duration::from_secs(POST_TIMEOUT_SECS))
            .send()
            .await?
            .error_for_status()?;
        let payload: Value = resp.json().await?;
        let post_id = match extract_id(&payload) {
            Some(id) => id,
            None => return Err("feed response carried no id".into()),
        };

        // With photos attached the feed post has no link field; the
        // article link follows as a comment instead.
        if !media_ids.is_empty() {
            if let Some(link) = link {
                match self.post_comment(&post_id, link).await {
                    Ok(comment_id) => {
                        debug!(post_id = %post_id, comment_id = %comment_id, "Commented article link");
                    }
                    Err(e) => {
                        warn!(
                            post_id = %post_id,
                            error = %e,
                            "Posting the link comment failed, the post stands without it"
                        );
                    }
                }
            }
        }

        info!(post_id = %post_id, photos = media_ids.len(), "Published page post");
        Ok(post_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(api_base: String) -> SocialConfig {
        SocialConfig {
            page_id: Some("12345".to_string()),
            access_token: Some("token".to_string()),
            api_base,
        }
    }

    #[test]
    fn test_extract_id_present() {
        let body = json!({ "id": "12345_67890", "post_supports_client_mutation_id": true });
        assert_eq!(extract_id(&body).as_deref(), Some("12345_67890"));
    }

    #[test]
    fn test_extract_id_missing_on_error_body() {
        let body = json!({ "error": { "message": "Invalid OAuth access token", "code": 190 } });
        assert!(extract_id(&body).is_none());
    }

    #[test]
    fn test_from_config_requires_credentials() {
        let config = SocialConfig::default();
        assert!(GraphPoster::from_config(reqwest::Client::new(), &config).is_err());
    }

    #[tokio::test]
    async fn test_publish_plain_post_returns_id() {
        let server =
            crate::utils::spawn_server("200 OK", "application/json", br#"{"id":"12345_1"}"#).await;
        let poster = GraphPoster::from_config(reqwest::Client::new(), &test_config(server)).unwrap();

        let id = poster
            .publish("Hello page", Some("https://news.example.com/a"), &[])
            .await
            .unwrap();
        assert_eq!(id, "12345_1");
    }

    #[tokio::test]
    async fn test_publish_with_images_uploads_then_posts() {
        // One server answers both the photos and the feed calls.
        let server =
            crate::utils::spawn_server("200 OK", "application/json", br#"{"id":"900"}"#).await;
        let poster = GraphPoster::from_config(reqwest::Client::new(), &test_config(server)).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img_0.jpg");
        std::fs::write(&path, b"jpegdata").unwrap();
        let images = vec![FetchedImage {
            url: "https://cdn.example.com/a.jpg".to_string(),
            path,
            bytes: 8,
        }];

        let id = poster.publish("With photo", None, &images).await.unwrap();
        assert_eq!(id, "900");
    }

    #[tokio::test]
    async fn test_publish_with_images_comments_the_link() {
        let (server, requests) =
            crate::utils::spawn_recording_server("200 OK", "application/json", br#"{"id":"900"}"#)
                .await;
        let poster = GraphPoster::from_config(reqwest::Client::new(), &test_config(server)).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("img_0.jpg");
        std::fs::write(&path, b"jpegdata").unwrap();
        let images = vec![FetchedImage {
            url: "https://cdn.example.com/a.jpg".to_string(),
            path,
            bytes: 8,
        }];

        let id = poster
            .publish("With photo", Some("https://news.example.com/a"), &images)
            .await
            .unwrap();
        assert_eq!(id, "900");

        let lines = requests.lock().await;
        assert!(lines.iter().any(|l| l.starts_with("POST /12345/photos")));
        assert!(lines.iter().any(|l| l.starts_with("POST /12345/feed")));
        assert!(lines.iter().any(|l| l.starts_with("POST /900/comments")));
    }

    #[tokio::test]
    async fn test_publish_plain_post_skips_comment() {
        let (server, requests) = crate::utils::spawn_recording_server(
            "200 OK",
            "application/json",
            br#"{"id":"12345_1"}"#,
        )
        .await;
        let poster = GraphPoster::from_config(reqwest::Client::new(), &test_config(server)).unwrap();

        poster
            .publish("Hello page", Some("https://news.example.com/a"), &[])
            .await
            .unwrap();

        let lines = requests.lock().await;
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("POST /12345/feed"));
    }

    #[tokio::test]
    async fn test_publish_error_body_is_err() {
        let server = crate::utils::spawn_server(
            "200 OK",
            "application/json",
            br#"{"error":{"message":"bad token"}}"#,
        )
        .await;
        let poster = GraphPoster::from_config(reqwest::Client::new(), &test_config(server)).unwrap();

        assert!(poster.publish("Hello", None, &[]).await.is_err());
    }
}
