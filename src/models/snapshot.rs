use std::fs;
use std::path::{Path, PathBuf};

use crate::error::HmnbError;
use crate::models::post::Post;

pub fn snapshot_file(dir: &Path, platform: &str) -> PathBuf {
    dir.join(format!("{}.json", platform))
}

/// Writes the platform's current post history to `<dir>/<platform>.json`,
/// replacing whatever a previous run left there.
pub fn save_posts_snapshot(
    dir: &Path,
    platform: &str,
    posts: &[Post],
) -> Result<PathBuf, HmnbError> {
    fs::create_dir_all(dir).map_err(|e| {
        HmnbError::Snapshot(format!("Failed to create snapshot directory {:?}: {}", dir, e))
    })?;

    let path = snapshot_file(dir, platform);
    let json = serde_json::to_string_pretty(posts)
        .map_err(|e| HmnbError::Snapshot(format!("Failed to serialize posts: {}", e)))?;

    fs::write(&path, json).map_err(|e| {
        HmnbError::Snapshot(format!("Failed to write snapshot file {:?}: {}", path, e))
    })?;

    Ok(path)
}

pub fn load_posts_snapshot(dir: &Path, platform: &str) -> Result<Vec<Post>, HmnbError> {
    let path = snapshot_file(dir, platform);
    match fs::read_to_string(&path) {
        Ok(data) => serde_json::from_str(&data)
            .map_err(|e| HmnbError::Snapshot(format!("Failed to parse snapshot data: {}", e))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(HmnbError::Snapshot(format!("Failed to read snapshot file: {}", e))),
    }
}
