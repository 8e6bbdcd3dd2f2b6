//! Upload progress snapshots.

use serde::{Deserialize, Serialize};

/// One upload progress event. Recomputed on every event, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadProgress {
    /// Bytes handed to the transport so far
    pub loaded: u64,
    /// Total bytes to upload
    pub total: u64,
    /// round(loaded / total * 100), clamped to 0..=100
    pub percentage: u8,
}

impl UploadProgress {
    pub fn new(loaded: u64, total: u64) -> Self {
        let loaded = loaded.min(total);
        let percentage = if total == 0 {
            100
        } else {
            ((loaded as f64 / total as f64) * 100.0).round().clamp(0.0, 100.0) as u8
        };
        Self {
            loaded,
            total,
            percentage,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.loaded == self.total
    }
}
