use serde::{Deserialize, Serialize};

pub const DEFAULT_HASHTAGS: &str = "\n#NixOS #Nix #HomeManager";

/// Width reserved for a `[n/n]` position marker.
pub const DEFAULT_MARKER_WIDTH: usize = 5;

/// Which chunk of a chain carries the hashtag suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuffixPlacement {
    #[default]
    First,
    Last,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationConfig {
    pub suffix: String,
    pub placement: SuffixPlacement,
    pub marker_width: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            suffix: DEFAULT_HASHTAGS.to_string(),
            placement: SuffixPlacement::default(),
            marker_width: DEFAULT_MARKER_WIDTH,
        }
    }
}

/// Splits `message` into posts of at most `max_len` characters.
///
/// A message that fits together with the suffix becomes a single post with
/// no position marker. Longer messages are packed word by word; each chunk
/// gets a `[i/N]` marker and the designated chunk gets the suffix. Words are
/// never broken, so a single word longer than the budget ends up alone in an
/// oversized chunk.
///
/// The marker reservation is fixed at `marker_width`, which is exact only
/// while the chain has fewer than ten chunks.
pub fn split_into_posts(message: &str, max_len: usize, config: &PaginationConfig) -> Vec<String> {
    if message.is_empty() {
        return Vec::new();
    }

    let suffix_len = char_len(&config.suffix);
    if char_len(message) + suffix_len <= max_len {
        return vec![format!("{}{}", message, config.suffix)];
    }

    let words: Vec<&str> = message.split_whitespace().collect();
    let chunks = match config.placement {
        SuffixPlacement::First => {
            pack(words.iter().copied(), max_len, config.marker_width, suffix_len)
        }
        SuffixPlacement::Last => {
            // Pack from the end so the suffix-carrying chunk is the one that
            // reserves room for it.
            let mut chunks =
                pack(words.iter().rev().copied(), max_len, config.marker_width, suffix_len);
            chunks.reverse();
            for chunk in &mut chunks {
                chunk.reverse();
            }
            chunks
        }
    };

    let total = chunks.len();
    let suffix_index = match config.placement {
        SuffixPlacement::First => 0,
        SuffixPlacement::Last => total.saturating_sub(1),
    };

    chunks
        .into_iter()
        .enumerate()
        .map(|(i, words)| {
            let mut post: String = words.iter().map(|word| format!("{} ", word)).collect();
            post.push_str(&format!("[{}/{}]", i + 1, total));
            if i == suffix_index {
                post.push_str(&config.suffix);
            }
            post
        })
        .collect()
}

/// Greedy packing. The first chunk produced reserves room for the suffix.
fn pack<'a>(
    words: impl Iterator<Item = &'a str>,
    max_len: usize,
    marker_width: usize,
    suffix_len: usize,
) -> Vec<Vec<&'a str>> {
    let mut chunks: Vec<Vec<&str>> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0;

    for word in words {
        let reserved = if chunks.is_empty() {
            marker_width + suffix_len
        } else {
            marker_width
        };
        let budget = max_len.saturating_sub(reserved);
        let word_len = char_len(word) + 1;

        if !current.is_empty() && current_len + word_len > budget {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        current.push(word);
        current_len += word_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
