use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::HmnbError;
use crate::text::paginate::{
    PaginationConfig, SuffixPlacement, DEFAULT_HASHTAGS, DEFAULT_MARKER_WIDTH,
};

pub const DEFAULT_WINDOW_DAYS: i64 = 90;
pub const DEFAULT_POST_DELAY_SECS: u64 = 2;
pub const DEFAULT_MASTODON_MAX_POST_LEN: usize = 500;
pub const DEFAULT_NOSTR_MAX_POST_LEN: usize = 1000;

/// A credential that never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Secret(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

#[derive(Debug, Clone)]
pub struct BlueskySettings {
    pub handle: String,
    pub app_password: Secret,
}

#[derive(Debug, Clone)]
pub struct MastodonSettings {
    pub server: String,
    pub access_token: Secret,
    pub max_post_length: usize,
}

#[derive(Debug, Clone)]
pub struct NostrSettings {
    pub secret_key: Secret,
    pub relays: Vec<String>,
    pub max_post_length: usize,
}

/// Process configuration, read once at startup from `HMNB_*` variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub news_path: PathBuf,
    pub max_posts: usize,
    pub dry_run: bool,
    pub window_days: i64,
    pub snapshot_dir: PathBuf,
    pub post_delay: Duration,
    pub pagination: PaginationConfig,
    pub bluesky: BlueskySettings,
    pub mastodon: MastodonSettings,
    pub nostr: Option<NostrSettings>,
}

impl Config {
    pub fn from_env() -> Result<Self, HmnbError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, HmnbError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars { lookup };

        let nostr = match vars.optional("HMNB_NOSTR_SECRET_KEY") {
            Some(secret_key) => {
                let relays: Vec<String> = vars
                    .required("HMNB_NOSTR_RELAYS")?
                    .split(',')
                    .map(str::trim)
                    .filter(|relay| !relay.is_empty())
                    .map(str::to_string)
                    .collect();
                if relays.is_empty() {
                    return Err(HmnbError::Config(
                        "HMNB_NOSTR_RELAYS must name at least one relay".to_string(),
                    ));
                }
                Some(NostrSettings {
                    secret_key: Secret::new(secret_key),
                    relays,
                    max_post_length: vars
                        .parsed_or("HMNB_NOSTR_MAX_POST_LEN", DEFAULT_NOSTR_MAX_POST_LEN)?,
                })
            }
            None => None,
        };

        let placement = match vars.optional("HMNB_SUFFIX_PLACEMENT").as_deref() {
            None | Some("first") => SuffixPlacement::First,
            Some("last") => SuffixPlacement::Last,
            Some(other) => {
                return Err(HmnbError::Config(format!(
                    "HMNB_SUFFIX_PLACEMENT must be \"first\" or \"last\", got {:?}",
                    other
                )))
            }
        };
        let snapshot_dir = vars
            .optional("HMNB_SNAPSHOT_DIR")
            .unwrap_or_else(|| ".".to_string());
        let post_delay = vars.parsed_or("HMNB_POST_DELAY_SECS", DEFAULT_POST_DELAY_SECS)?;
        let suffix = match vars.optional("HMNB_HASHTAGS") {
            Some(tags) => format!("\n{}", tags.trim()),
            None => DEFAULT_HASHTAGS.to_string(),
        };

        Ok(Config {
            news_path: PathBuf::from(vars.required("HMNB_PATH")?),
            max_posts: vars.parsed("HMNB_MAX_POSTS")?,
            dry_run: parse_bool("HMNB_DRY_RUN", &vars.required("HMNB_DRY_RUN")?)?,
            window_days: vars.parsed_or("HMNB_WINDOW_DAYS", DEFAULT_WINDOW_DAYS)?,
            snapshot_dir: PathBuf::from(snapshot_dir),
            post_delay: Duration::from_secs(post_delay),
            pagination: PaginationConfig {
                suffix,
                placement,
                marker_width: DEFAULT_MARKER_WIDTH,
            },
            bluesky: BlueskySettings {
                handle: vars.required("HMNB_BLUESKY_HANDLE")?,
                app_password: Secret::new(vars.required("HMNB_BLUESKY_APPKEY")?),
            },
            mastodon: MastodonSettings {
                server: vars.required("HMNB_MASTODON_SERVER")?,
                access_token: Secret::new(vars.required("HMNB_MASTODON_ACCESS_TOKEN")?),
                max_post_length: vars
                    .parsed_or("HMNB_MASTODON_MAX_POST_LEN", DEFAULT_MASTODON_MAX_POST_LEN)?,
            },
            nostr,
        })
    }
}

struct Vars<F> {
    lookup: F,
}

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key).filter(|value| !value.trim().is_empty())
    }

    fn required(&self, key: &str) -> Result<String, HmnbError> {
        self.optional(key)
            .ok_or_else(|| HmnbError::Config(format!("{} not set", key)))
    }

    fn parsed<T>(&self, key: &str) -> Result<T, HmnbError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        let value = self.required(key)?;
        value
            .trim()
            .parse()
            .map_err(|e| HmnbError::Config(format!("parsing {}: {}", key, e)))
    }

    fn parsed_or<T>(&self, key: &str, default: T) -> Result<T, HmnbError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.optional(key) {
            Some(_) => self.parsed(key),
            None => Ok(default),
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, HmnbError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(HmnbError::Config(format!(
            "parsing {}: expected a boolean, got {:?}",
            key, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_vars() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("HMNB_PATH", "news.json"),
            ("HMNB_MAX_POSTS", "3"),
            ("HMNB_DRY_RUN", "true"),
            ("HMNB_BLUESKY_HANDLE", "@bot.bsky.social"),
            ("HMNB_BLUESKY_APPKEY", "app-key"),
            ("HMNB_MASTODON_SERVER", "https://techhub.social"),
            ("HMNB_MASTODON_ACCESS_TOKEN", "token"),
        ])
    }

    fn load(vars: &HashMap<&'static str, &'static str>) -> Result<Config, HmnbError> {
        Config::from_lookup(|key| vars.get(key).map(|value| value.to_string()))
    }

    #[test]
    fn test_defaults() {
        let config = load(&base_vars()).unwrap();
        assert_eq!(config.news_path, PathBuf::from("news.json"));
        assert_eq!(config.max_posts, 3);
        assert!(config.dry_run);
        assert_eq!(config.window_days, DEFAULT_WINDOW_DAYS);
        assert_eq!(config.snapshot_dir, PathBuf::from("."));
        assert_eq!(config.post_delay, Duration::from_secs(2));
        assert_eq!(config.pagination, PaginationConfig::default());
        assert_eq!(config.mastodon.max_post_length, 500);
        assert!(config.nostr.is_none());
    }

    #[test]
    fn test_missing_required_setting() {
        let required = [
            "HMNB_PATH",
            "HMNB_MAX_POSTS",
            "HMNB_DRY_RUN",
            "HMNB_BLUESKY_APPKEY",
            "HMNB_MASTODON_SERVER",
        ];
        for key in required {
            let mut vars = base_vars();
            vars.remove(key);
            match load(&vars) {
                Err(HmnbError::Config(message)) => assert!(message.contains(key), "{}", message),
                other => panic!("expected config error for {}, got {:?}", key, other),
            }
        }
    }

    #[test]
    fn test_unparsable_settings() {
        let mut vars = base_vars();
        vars.insert("HMNB_MAX_POSTS", "many");
        assert!(matches!(load(&vars), Err(HmnbError::Config(_))));

        let mut vars = base_vars();
        vars.insert("HMNB_DRY_RUN", "maybe");
        assert!(matches!(load(&vars), Err(HmnbError::Config(_))));

        let mut vars = base_vars();
        vars.insert("HMNB_SUFFIX_PLACEMENT", "middle");
        assert!(matches!(load(&vars), Err(HmnbError::Config(_))));
    }

    #[test]
    fn test_nostr_requires_relays() {
        let mut vars = base_vars();
        vars.insert("HMNB_NOSTR_SECRET_KEY", "nsec1xyz");
        assert!(matches!(load(&vars), Err(HmnbError::Config(_))));

        vars.insert("HMNB_NOSTR_RELAYS", "wss://relay.damus.io, wss://nos.lol ,");
        let nostr = load(&vars).unwrap().nostr.unwrap();
        assert_eq!(nostr.relays, vec!["wss://relay.damus.io", "wss://nos.lol"]);
        assert_eq!(nostr.max_post_length, DEFAULT_NOSTR_MAX_POST_LEN);
    }

    #[test]
    fn test_overrides() {
        let mut vars = base_vars();
        vars.insert("HMNB_HASHTAGS", "#Rust #Bots");
        vars.insert("HMNB_SUFFIX_PLACEMENT", "last");
        vars.insert("HMNB_WINDOW_DAYS", "30");
        vars.insert("HMNB_DRY_RUN", "No");
        let config = load(&vars).unwrap();
        assert_eq!(config.pagination.suffix, "\n#Rust #Bots");
        assert_eq!(config.pagination.placement, SuffixPlacement::Last);
        assert_eq!(config.window_days, 30);
        assert!(!config.dry_run);
    }

    #[test]
    fn test_secrets_are_redacted() {
        let config = load(&base_vars()).unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("app-key"));
        assert!(!debug.contains("token\""));
    }
}
