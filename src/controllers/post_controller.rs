use std::path::PathBuf;

use crate::controllers::filter_controller::DuplicateFilter;
use crate::error::HmnbError;
use crate::models::snapshot::save_posts_snapshot;
use crate::models::NewsEntry;
use crate::platforms::Platform;
use crate::text::{canonicalize, split_into_posts, PaginationConfig};

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub snapshot_dir: PathBuf,
    pub pagination: PaginationConfig,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            snapshot_dir: PathBuf::from("."),
            pagination: PaginationConfig::default(),
        }
    }
}

/// What one platform's pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub platform: String,
    pub eligible: usize,
    pub existing: usize,
    pub unposted: usize,
    pub posted: usize,
}

/// Publishes unposted news to every platform in turn. The first error aborts
/// the run, including the platforms that have not been processed yet.
pub async fn run(
    news: &[NewsEntry],
    platforms: &[Box<dyn Platform>],
    options: &RunOptions,
) -> Result<Vec<RunReport>, HmnbError> {
    let mut reports = Vec::with_capacity(platforms.len());

    for platform in platforms {
        let report = run_platform(news, platform.as_ref(), options).await?;
        log::info!(
            "[{}] done: {} eligible, {} existing posts, {} unposted, {} posted",
            report.platform,
            report.eligible,
            report.existing,
            report.unposted,
            report.posted
        );
        reports.push(report);
    }

    Ok(reports)
}

async fn run_platform(
    news: &[NewsEntry],
    platform: &dyn Platform,
    options: &RunOptions,
) -> Result<RunReport, HmnbError> {
    let name = platform.name().to_string();

    let filters = platform.news_filters();
    log::debug!("[{}] news filters: {:?}", name, filters.names().collect::<Vec<_>>());
    let eligible = filters.apply(news.to_vec(), &name);
    log::info!("[{}] {} of {} news entries eligible", name, eligible.len(), news.len());

    let existing = platform.list_posts().await?;
    log::info!("[{}] found {} existing posts", name, existing.len());

    let snapshot = save_posts_snapshot(&options.snapshot_dir, &name, &existing)?;
    log::debug!("[{}] wrote post snapshot to {:?}", name, snapshot);

    let eligible_count = eligible.len();
    let duplicates = DuplicateFilter::new(&existing);
    let mut unposted: Vec<NewsEntry> = eligible
        .into_iter()
        .filter(|entry| {
            if canonicalize(&entry.message).is_empty() {
                log::warn!("[{}] skipping news entry with empty message at {:?}", name, entry.time);
                return false;
            }
            true
        })
        .filter(|entry| duplicates.is_unposted(entry))
        .collect();
    // Stable, and entries without a timestamp sort first.
    unposted.sort_by(|a, b| a.time.cmp(&b.time));
    log::info!("[{}] {} news entries not yet posted", name, unposted.len());

    let cap = platform.max_posts_per_run();
    let mut posted = 0;
    for entry in unposted.iter().take(cap) {
        let chain =
            split_into_posts(&entry.message, platform.max_post_length(), &options.pagination);
        log::info!(
            "[{}] posting news entry from {:?} as {} post(s)",
            name,
            entry.time,
            chain.len()
        );
        platform.create_post_chain(&chain).await?;
        posted += 1;
    }

    if unposted.len() > cap {
        log::info!("[{}] {} news entries left for the next run", name, unposted.len() - cap);
    }

    Ok(RunReport {
        platform: name,
        eligible: eligible_count,
        existing: existing.len(),
        unposted: unposted.len(),
        posted,
    })
}
