use anyhow::{Context, Result};
use chrono::Utc;

use hmnb::cli::{Flags, PlatformKind};
use hmnb::controllers::{time_window_filter, NewsFilters};
use hmnb::models::news::load_news_file;
use hmnb::models::Config;
use hmnb::platforms::{BlueskyClient, MastodonClient, NostrClient, Platform, PlatformOptions};
use hmnb::{run, RunOptions};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let flags = Flags::from_args();

    match &flags.env_file {
        Some(path) => {
            dotenvy::from_path(path).with_context(|| format!("loading env file {:?}", path))?;
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }

    let mut config = Config::from_env().context("reading configuration")?;
    if flags.dry_run {
        config.dry_run = true;
    }
    if let Some(dir) = &flags.snapshot_dir {
        config.snapshot_dir = dir.clone();
    }

    let news = load_news_file(&config.news_path)?;
    log::info!("Found {} news entries total", news.len());

    let mut news_filters = NewsFilters::new();
    news_filters.push(time_window_filter(Utc::now(), config.window_days));

    let options = PlatformOptions {
        dry_run: config.dry_run,
        max_posts: config.max_posts,
        post_delay: config.post_delay,
        news_filters,
    };
    if config.dry_run {
        log::info!("Dry run: nothing will be posted");
    }

    let mut platforms: Vec<Box<dyn Platform>> = Vec::new();

    if flags.wants(PlatformKind::Mastodon) {
        platforms.push(Box::new(MastodonClient::new(&config.mastodon, options.clone())));
    }
    if flags.wants(PlatformKind::Bluesky) {
        let client = BlueskyClient::login(&config.bluesky, options.clone())
            .await
            .context("creating Bluesky client")?;
        platforms.push(Box::new(client));
    }
    if flags.wants(PlatformKind::Nostr) {
        match &config.nostr {
            Some(settings) => {
                let client = NostrClient::new(settings, options.clone())?;
                client.connect_relays().await.context("connecting to Nostr relays")?;
                platforms.push(Box::new(client));
            }
            None => log::debug!("Nostr not configured, skipping"),
        }
    }

    let run_options = RunOptions {
        snapshot_dir: config.snapshot_dir.clone(),
        pagination: config.pagination.clone(),
    };
    let reports = run(&news, &platforms, &run_options)
        .await
        .context("posting news entries")?;

    let posted: usize = reports.iter().map(|report| report.posted).sum();
    log::info!("Posted {} news entries across {} platforms", posted, reports.len());
    Ok(())
}
