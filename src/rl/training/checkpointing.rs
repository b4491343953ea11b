//! Model Checkpointing
//!
//! Save and load agent snapshots as JSON files.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{Result, TradeGymError};
use crate::rl::agent::ModelSnapshot;

const CHECKPOINT_EXTENSION: &str = "json";

/// Checkpointer for saving and loading models
pub struct Checkpointer {
    /// Directory for checkpoints
    checkpoint_dir: PathBuf,
    /// Maximum checkpoints to keep
    max_checkpoints: usize,
}

impl Checkpointer {
    /// Create a new checkpointer, creating the directory if needed
    pub fn new<P: AsRef<Path>>(checkpoint_dir: P, max_checkpoints: usize) -> Result<Self> {
        let checkpoint_dir = checkpoint_dir.as_ref().to_path_buf();
        fs::create_dir_all(&checkpoint_dir)?;

        Ok(Self {
            checkpoint_dir,
            max_checkpoints: max_checkpoints.max(1),
        })
    }

    /// Get checkpoint path for a given name
    pub fn checkpoint_path(&self, name: &str) -> PathBuf {
        self.checkpoint_dir
            .join(format!("{}.{}", name, CHECKPOINT_EXTENSION))
    }

    /// Save a snapshot under `name`
    pub fn save(&self, snapshot: &ModelSnapshot, name: &str) -> Result<PathBuf> {
        let path = self.checkpoint_path(name);
        let json = serde_json::to_string(snapshot)?;
        fs::write(&path, json)?;

        info!(
            path = %path.display(),
            training_step = snapshot.metadata.training_step,
            "Saved checkpoint"
        );

        self.cleanup_old_checkpoints();
        Ok(path)
    }

    /// Load the snapshot stored under `name`
    pub fn load(&self, name: &str) -> Result<ModelSnapshot> {
        let path = self.checkpoint_path(name);
        if !path.exists() {
            return Err(TradeGymError::CheckpointNotFound(
                path.display().to_string(),
            ));
        }
        let content = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// List available checkpoints
    pub fn list_checkpoints(&self) -> Vec<String> {
        let suffix = format!(".{}", CHECKPOINT_EXTENSION);
        let mut checkpoints = Vec::new();

        if let Ok(entries) = fs::read_dir(&self.checkpoint_dir) {
            for entry in entries.flatten() {
                if let Some(name) = entry.file_name().to_str() {
                    if let Some(stem) = name.strip_suffix(&suffix) {
                        checkpoints.push(stem.to_string());
                    }
                }
            }
        }

        checkpoints.sort();
        checkpoints
    }

    /// Get latest checkpoint name
    pub fn latest_checkpoint(&self) -> Option<String> {
        self.list_checkpoints().into_iter().last()
    }

    /// Cleanup old checkpoints keeping only max_checkpoints
    fn cleanup_old_checkpoints(&self) {
        let checkpoints = self.list_checkpoints();

        if checkpoints.len() <= self.max_checkpoints {
            return;
        }

        let to_remove = checkpoints.len() - self.max_checkpoints;
        for name in checkpoints.into_iter().take(to_remove) {
            let path = self.checkpoint_path(&name);
            if let Err(e) = fs::remove_file(&path) {
                warn!("Failed to remove old checkpoint {:?}: {}", path, e);
            } else {
                info!("Removed old checkpoint: {}", name);
            }
        }
    }

    /// Check if a checkpoint exists
    pub fn exists(&self, name: &str) -> bool {
        self.checkpoint_path(name).exists()
    }

    pub fn checkpoint_dir(&self) -> &Path {
        &self.checkpoint_dir
    }
}

/// Generate a checkpoint name with timestamp
pub fn timestamped_name(prefix: &str) -> String {
    let now = chrono::Utc::now();
    format!("{}_{}", prefix, now.format("%Y%m%d_%H%M%S"))
}

/// Generate a checkpoint name with episode number
pub fn episode_name(prefix: &str, episode: usize) -> String {
    format!("{}_ep{:06}", prefix, episode)
}
