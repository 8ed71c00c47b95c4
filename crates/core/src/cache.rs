use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use tokio::fs;

use crate::{error::Result, types::VideoRecord};

pub fn get_root_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("kinscope")
}

/// Get the path of the upload cache for an index
pub fn get_index_cache_path(cache_dir: &Path, index_id: &str) -> PathBuf {
    cache_dir.join(format!("index_{}.json", index_id))
}

/// Cache key for a local video: file name plus size, so a replaced file is re-uploaded.
pub fn video_cache_key(video: &VideoRecord) -> Option<String> {
    let file_name = video.file_path.file_name()?.to_string_lossy().to_string();
    let size = std::fs::metadata(&video.file_path).ok()?.len();
    Some(format!("{}:{}", file_name, size))
}

/// Remembers which local videos were already indexed, so re-runs skip the upload.
#[derive(Debug, Clone)]
pub struct IndexCache {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl IndexCache {
    pub async fn load(cache_dir: &Path, index_id: &str) -> Result<Self> {
        let path = get_index_cache_path(cache_dir, index_id);
        let entries = match fs::read_to_string(&path).await {
            Ok(json_content) => serde_json::from_str(&json_content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, entries })
    }

    pub fn video_id(&self, video: &VideoRecord) -> Option<&str> {
        let key = video_cache_key(video)?;
        self.entries.get(&key).map(String::as_str)
    }

    pub fn insert(&mut self, video: &VideoRecord, video_id: &str) {
        if let Some(key) = video_cache_key(video) {
            self.entries.insert(key, video_id.to_string());
        }
    }

    /// Forget a video whose id the service no longer knows.
    pub fn remove(&mut self, video: &VideoRecord) -> Option<String> {
        let key = video_cache_key(video)?;
        self.entries.remove(&key)
    }

    pub async fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let pretty_json = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, &pretty_json).await?;
        Ok(())
    }
}
