use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::models::{NewsEntry, Post};
use crate::text::canonicalize;

type Predicate = Arc<dyn Fn(&NewsEntry) -> bool + Send + Sync>;

/// A named predicate over news entries.
#[derive(Clone)]
pub struct NewsFilter {
    pub name: String,
    predicate: Predicate,
}

impl NewsFilter {
    pub fn new<P>(name: impl Into<String>, predicate: P) -> Self
    where
        P: Fn(&NewsEntry) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }

    pub fn matches(&self, entry: &NewsEntry) -> bool {
        (self.predicate)(entry)
    }
}

impl fmt::Debug for NewsFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewsFilter").field("name", &self.name).finish()
    }
}

/// Ordered set of named filters. Order only affects the per-stage log lines,
/// the surviving set is the intersection of all predicates.
#[derive(Clone, Debug, Default)]
pub struct NewsFilters {
    filters: Vec<NewsFilter>,
}

impl NewsFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<P>(mut self, name: impl Into<String>, predicate: P) -> Self
    where
        P: Fn(&NewsEntry) -> bool + Send + Sync + 'static,
    {
        self.filters.push(NewsFilter::new(name, predicate));
        self
    }

    pub fn push(&mut self, filter: NewsFilter) {
        self.filters.push(filter);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.filters.iter().map(|filter| filter.name.as_str())
    }

    pub fn apply(&self, mut entries: Vec<NewsEntry>, platform: &str) -> Vec<NewsEntry> {
        for filter in &self.filters {
            entries.retain(|entry| filter.matches(entry));
            log::info!(
                "[{}] {} news entries left after filter {:?}",
                platform,
                entries.len(),
                filter.name
            );
        }
        entries
    }
}

/// True for entries strictly newer than `now - days`. Entries without a
/// timestamp never match.
pub fn in_time_window(
    now: DateTime<Utc>,
    days: i64,
) -> impl Fn(&NewsEntry) -> bool + Send + Sync + 'static {
    let cutoff = now - Duration::days(days);
    move |entry| entry.time.is_some_and(|time| time > cutoff)
}

pub fn time_window_filter(now: DateTime<Utc>, days: i64) -> NewsFilter {
    NewsFilter::new(format!("not older than {}d", days), in_time_window(now, days))
}

/// Canonical texts of a platform's existing posts, computed once per run.
pub struct DuplicateFilter {
    posted: Vec<String>,
}

impl DuplicateFilter {
    pub fn new(posts: &[Post]) -> Self {
        Self {
            posted: posts.iter().map(|post| canonicalize(&post.text)).collect(),
        }
    }

    /// An entry is unposted when no existing post contains its canonical
    /// message. Containment rather than equality, because posts carry
    /// hashtags and position markers around the original text.
    pub fn is_unposted(&self, entry: &NewsEntry) -> bool {
        let message = canonicalize(&entry.message);
        !self.posted.iter().any(|post| post.contains(&message))
    }
}

pub fn not_yet_posted(posts: &[Post]) -> impl Fn(&NewsEntry) -> bool {
    let filter = DuplicateFilter::new(posts);
    move |entry| filter.is_unposted(entry)
}
