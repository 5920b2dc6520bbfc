//! # Feedcaster
//!
//! Watches a news feed and posts fresh articles to a social page. Each
//! run is one cycle: discover candidates, let the duplicate gate pick
//! the first fresh one, write copy with a generative API, download the
//! article's best images, publish, and record the article so the next
//! run skips it.
//!
//! ## Usage
//!
//! ```sh
//! GEMINI_API_KEY=... FB_PAGE_ID=... FB_ACCESS_TOKEN=... \
//!     feedcaster --config feedcaster.yaml
//! ```
//!
//! ## Architecture
//!
//! The application is a single linear pipeline:
//! 1. **Discovery**: fetch the configured RSS or Google News feed
//! 2. **Dedupe**: scan candidates in feed order through the gate
//! 3. **Generation**: ask the model for a short page post
//! 4. **Images**: rank candidate images by probed size, download the best
//! 5. **Posting**: publish to the page and record the posted key
//!
//! Once startup validation passes, nothing in the pipeline is fatal:
//! failures are logged and the run ends cleanly, worst case having done
//! nothing.

use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cli;
mod config;
mod dedupe;
mod generate;
mod images;
mod models;
mod social;
mod sources;
mod utils;

use cli::Cli;
use dedupe::first_postable;
use generate::{CopyWriter, GeminiWriter};
use images::ImageSelector;
use models::PostedRecord;
use social::{GraphPoster, PagePoster};
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("feedcaster starting up");

    // Parse CLI, load config, fold the overrides in
    let args = Cli::parse();
    debug!(?args.config, "Parsed CLI arguments");

    let mut config = config::load(&args.config).await?;
    if let Some(store) = args.store {
        config.dedupe.store_path = store;
    }
    if let Some(images_dir) = args.images_dir {
        config.images.dir = images_dir;
    }
    if args.gemini_api_key.is_some() {
        config.generation.api_key = args.gemini_api_key;
    }
    if args.page_id.is_some() {
        config.social.page_id = args.page_id;
    }
    if args.access_token.is_some() {
        config.social.access_token = args.access_token;
    }
    config.validate()?;
    info!(config_path = %args.config, "Loaded configuration");

    // Early check: ensure the image directory is writable
    if let Err(e) = ensure_writable_dir(&config.images.dir).await {
        error!(
            path = %config.images.dir,
            error = %e,
            "Image directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    // One shared HTTP client; components clone it and share the pool.
    let client = reqwest::Client::builder()
        .user_agent(config.images.user_agent.clone())
        .build()?;

    let source = sources::build_source(&client, &config.source)?;
    let gate = dedupe::build_gate(&client, &config.dedupe).await?;
    let selector = ImageSelector::new(client.clone(), config.images.clone());
    let writer = GeminiWriter::from_config(client.clone(), &config.generation)?;
    let poster = GraphPoster::from_config(client.clone(), &config.social)?;

    // ---- Discover candidates ----
    let candidates = match source.discover().await {
        Ok(candidates) => candidates,
        Err(e) => {
            error!(
                source = source.name(),
                error = %e,
                "Feed fetch failed; nothing to do this run"
            );
            return Ok(());
        }
    };
    if candidates.is_empty() {
        info!(source = source.name(), "Feed is empty; nothing to do this run");
        return Ok(());
    }

    // ---- Pick the first fresh article ----
    let Some(candidate) = first_postable(gate.as_ref(), &candidates).await else {
        info!(
            count = candidates.len(),
            "Every candidate was posted before; nothing to do this run"
        );
        return Ok(());
    };

    // ---- Generate copy ----
    let message = match writer.write_post(candidate).await {
        Ok(message) => message,
        Err(e) => {
            error!(
                url = %candidate.url,
                error = %e,
                "Copy generation failed; ending run without posting"
            );
            return Ok(());
        }
    };

    // ---- Resolve images ----
    let fetched = selector.resolve(&candidate.image_urls).await;
    info!(count = fetched.len(), "Images ready");

    // ---- Publish and record ----
    let post_id = match poster
        .publish(&message, Some(&candidate.url), &fetched)
        .await
    {
        Ok(post_id) => post_id,
        Err(e) => {
            // Under the remote gate the key was registered during check,
            // so the next run will treat this article as already posted.
            error!(url = %candidate.url, error = %e, "Publishing failed; ending run");
            return Ok(());
        }
    };

    if let Err(e) = gate.record(&PostedRecord::new(candidate.url.as_str())).await {
        error!(
            url = %candidate.url,
            error = %e,
            "Posted but failed to record the key; expect a duplicate next run"
        );
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        post_id = %post_id,
        "Execution complete"
    );

    Ok(())
}
