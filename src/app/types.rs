use serde::{Deserialize, Serialize};

/// Component lifecycle states
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
}

/// System shutdown reason
#[derive(Debug, Clone, PartialEq)]
pub enum ShutdownReason {
    Signal(String),
    Error(String),
    UserRequest,
}

impl ShutdownReason {
    pub fn exit_code(&self) -> i32 {
        match self {
            ShutdownReason::Error(_) => 1,
            _ => 0,
        }
    }
}

/// Which surface the host drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Vertical short-video feed
    Feed,
    /// Live camera with object detection overlay
    Camera,
}
