use crate::error::ShareError;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

pub const DEFAULT_SHARE_TITLE: &str = "Check out this video!";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareRequest {
    pub title: String,
    pub url: String,
}

/// Optional platform share hook
#[async_trait]
pub trait ShareTarget: Send + Sync {
    async fn share(&self, request: &ShareRequest) -> Result<(), ShareError>;
}

/// Share target that keeps every request it accepts
#[derive(Debug, Clone, Default)]
pub struct RecordingShareTarget {
    requests: Arc<Mutex<Vec<ShareRequest>>>,
    reject_with: Option<ShareError>,
}

impl RecordingShareTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// A target that refuses every request, as when the user dismisses the share sheet
    pub fn rejecting(error: ShareError) -> Self {
        Self {
            requests: Arc::default(),
            reject_with: Some(error),
        }
    }

    pub fn requests(&self) -> Vec<ShareRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ShareTarget for RecordingShareTarget {
    async fn share(&self, request: &ShareRequest) -> Result<(), ShareError> {
        if let Some(error) = &self.reject_with {
            return Err(error.clone());
        }
        info!("Share sheet: \"{}\" {}", request.title, request.url);
        self.requests.lock().push(request.clone());
        Ok(())
    }
}
