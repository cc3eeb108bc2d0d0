//! Virtualized render window and scroll-pin scheduling.
//!
//! Geometry is in CSS-style pixels (`f64`). The window only tracks keys and
//! heights of grouped items; it never owns session data.

mod scheduler;
mod window;

use serde::{Deserialize, Serialize};

pub use scheduler::{FrameHandle, FrameScheduler};
pub use window::{Correction, RenderWindow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollBehavior {
    /// Immediate jump.
    Auto,
    Smooth,
}

/// A scroll write for the host to apply.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScrollCommand {
    pub top: f64,
    pub behavior: ScrollBehavior,
}

/// Window geometry settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Height assumed for an item until it is measured.
    pub estimated_item_px: f64,
    /// Extra range rendered above and below the viewport.
    pub overscan_px: f64,
    /// Distance from the bottom edge that still counts as "at the bottom".
    pub bottom_threshold_px: f64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            estimated_item_px: 120.0,
            overscan_px: 600.0,
            bottom_threshold_px: 64.0,
        }
    }
}
