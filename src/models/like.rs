use serde::{Deserialize, Serialize};

/// Project identifier as assigned by the project store.
pub type ProjectId = i64;

/// Membership of one caller in one project's likes set after a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LikeState {
    Liked,
    Unliked,
}

impl LikeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LikeState::Liked => "liked",
            LikeState::Unliked => "unliked",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            LikeState::Liked => "Project liked successfully.",
            LikeState::Unliked => "Project unliked successfully.",
        }
    }
}

/// Result of `Store::toggle_like`. Missing rows are reported, never created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    Toggled(LikeState),
    ProjectNotFound,
    UserNotFound,
}
