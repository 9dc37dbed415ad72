use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::HmnbError;

/// One timestamped unit of content eligible for posting.
///
/// `time` is `None` when the feed carried no parseable timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewsEntry {
    pub time: Option<DateTime<Utc>>,
    pub message: String,
}

impl NewsEntry {
    pub fn new(time: Option<DateTime<Utc>>, message: impl Into<String>) -> Self {
        Self {
            time,
            message: message.into(),
        }
    }
}

impl<'de> Deserialize<'de> for NewsEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Raw {
            #[serde(default)]
            time: Option<String>,
            message: String,
        }

        let raw = Raw::deserialize(deserializer)?;
        let time = match raw.time.as_deref() {
            Some(time) => match DateTime::parse_from_rfc3339(time) {
                Ok(parsed) => Some(parsed.with_timezone(&Utc)),
                Err(e) => {
                    log::warn!("Error parsing time {:?}: {}", time, e);
                    None
                }
            },
            None => {
                log::warn!("News entry without time: {:?}", raw.message);
                None
            }
        };

        Ok(NewsEntry {
            time,
            message: raw.message,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct NewsFile {
    pub entries: Vec<NewsEntry>,
}

/// Reads the feed at `path` and normalizes whitespace in every message.
pub fn load_news_file(path: &Path) -> Result<Vec<NewsEntry>, HmnbError> {
    let data = fs::read_to_string(path)
        .map_err(|e| HmnbError::Feed(format!("Failed to read news file at {:?}: {}", path, e)))?;
    parse_news(&data)
}

pub fn parse_news(data: &str) -> Result<Vec<NewsEntry>, HmnbError> {
    let news_file: NewsFile = serde_json::from_str(data)
        .map_err(|e| HmnbError::Feed(format!("Failed to parse news file: {}", e)))?;
    Ok(transform_entries(news_file.entries, trim_space))
}

pub fn transform_entries<F>(entries: Vec<NewsEntry>, transform: F) -> Vec<NewsEntry>
where
    F: Fn(NewsEntry) -> NewsEntry,
{
    entries.into_iter().map(transform).collect()
}

/// Collapses every run of whitespace to a single space and trims the ends.
pub fn trim_space(mut entry: NewsEntry) -> NewsEntry {
    entry.message = entry.message.split_whitespace().collect::<Vec<_>>().join(" ");
    entry
}
