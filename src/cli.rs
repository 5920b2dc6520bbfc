//! Command-line interface definitions for Feedcaster.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Secrets can be provided via command-line flags or environment variables.

use clap::Parser;

/// Command-line arguments for the Feedcaster application.
///
/// Most behavior lives in the YAML config file; the CLI carries the config
/// path, a couple of path overrides, and the secrets that should not be
/// written into the config file.
///
/// # Examples
///
/// ```sh
/// # Basic usage with a config file
/// feedcaster --config feedcaster.yaml
///
/// # Override the posted-keys store and image directory
/// feedcaster -c feedcaster.yaml --store /tmp/posted.json --images-dir /tmp/img
///
/// # Secrets from the environment
/// GEMINI_API_KEY=... FB_PAGE_ID=... FB_ACCESS_TOKEN=... feedcaster
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the YAML config file
    #[arg(short, long, default_value = "feedcaster.yaml")]
    pub config: String,

    /// Override the posted-keys store path
    #[arg(long)]
    pub store: Option<String>,

    /// Override the image download directory
    #[arg(long)]
    pub images_dir: Option<String>,

    /// Generative-text API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    /// Target page identifier
    #[arg(long, env = "FB_PAGE_ID")]
    pub page_id: Option<String>,

    /// Page access token
    #[arg(long, env = "FB_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["feedcaster"]);

        assert_eq!(cli.config, "feedcaster.yaml");
        assert!(cli.store.is_none());
        assert!(cli.images_dir.is_none());
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from([
            "feedcaster",
            "-c",
            "/etc/feedcaster.yaml",
            "--store",
            "/tmp/posted.json",
            "--images-dir",
            "/tmp/img",
        ]);

        assert_eq!(cli.config, "/etc/feedcaster.yaml");
        assert_eq!(cli.store.as_deref(), Some("/tmp/posted.json"));
        assert_eq!(cli.images_dir.as_deref(), Some("/tmp/img"));
    }

    #[test]
    fn test_cli_secret_flags() {
        let cli = Cli::parse_from([
            "feedcaster",
            "--gemini-api-key",
            "k",
            "--page-id",
            "123",
            "--access-token",
            "t",
        ]);

        assert_eq!(cli.gemini_api_key.as_deref(), Some("k"));
        assert_eq!(cli.page_id.as_deref(), Some("123"));
        assert_eq!(cli.access_token.as_deref(), Some("t"));
    }
}
