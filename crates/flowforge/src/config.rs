//! Configuration types for Flowforge.
//!
//! All types implement [`serde::Deserialize`] so they can be loaded from
//! external sources such as a TOML file. Every section and field is optional
//! and falls back to its default.
//!
//! # Overview
//!
//! - [`AppConfig`] - Top-level configuration combining the sections below.
//! - [`LayoutConfig`] - Node box size, gaps and padding for the layout engine.
//! - [`PipelineConfig`] - How a [`PipelineSession`](crate::pipeline::PipelineSession)
//!   runs requests.
//! - [`StyleConfig`] - Styling defaults such as the theme.
//!
//! # Example
//!
//! ```
//! # use flowforge::config::AppConfig;
//! let config = AppConfig::default();
//! assert_eq!(config.layout().node_width(), 160.0);
//! assert!(config.style().theme().is_none());
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::pipeline::ExecutionPolicy;

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    layout: LayoutConfig,

    #[serde(default)]
    pipeline: PipelineConfig,

    #[serde(default)]
    style: StyleConfig,
}

impl AppConfig {
    pub fn new(layout: LayoutConfig, pipeline: PipelineConfig, style: StyleConfig) -> Self {
        Self {
            layout,
            pipeline,
            style,
        }
    }

    pub fn layout(&self) -> &LayoutConfig {
        &self.layout
    }

    pub fn pipeline(&self) -> &PipelineConfig {
        &self.pipeline
    }

    pub fn style(&self) -> &StyleConfig {
        &self.style
    }
}

/// Dimensions used by the layered layout engine.
///
/// Every node gets the same box; there is no text measurement.
#[derive(Debug, Clone, Deserialize)]
pub struct LayoutConfig {
    #[serde(default = "default_node_width")]
    node_width: f32,

    #[serde(default = "default_node_height")]
    node_height: f32,

    /// Gap between adjacent levels.
    #[serde(default = "default_horizontal_gap")]
    horizontal_gap: f32,

    /// Gap between nodes of the same level.
    #[serde(default = "default_vertical_gap")]
    vertical_gap: f32,

    /// Margin around the whole drawing.
    #[serde(default = "default_padding")]
    padding: f32,
}

fn default_node_width() -> f32 {
    160.0
}

fn default_node_height() -> f32 {
    48.0
}

fn default_horizontal_gap() -> f32 {
    60.0
}

fn default_vertical_gap() -> f32 {
    40.0
}

fn default_padding() -> f32 {
    20.0
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_width: default_node_width(),
            node_height: default_node_height(),
            horizontal_gap: default_horizontal_gap(),
            vertical_gap: default_vertical_gap(),
            padding: default_padding(),
        }
    }
}

impl LayoutConfig {
    pub fn node_width(&self) -> f32 {
        self.node_width
    }

    pub fn node_height(&self) -> f32 {
        self.node_height
    }

    pub fn horizontal_gap(&self) -> f32 {
        self.horizontal_gap
    }

    pub fn vertical_gap(&self) -> f32 {
        self.vertical_gap
    }

    pub fn padding(&self) -> f32 {
        self.padding
    }

    /// A copy with different gaps, as requested by a diagram's layout hint.
    pub fn with_gaps(&self, horizontal_gap: f32, vertical_gap: f32) -> Self {
        Self {
            horizontal_gap,
            vertical_gap,
            ..self.clone()
        }
    }
}

/// Request execution settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    policy: ExecutionPolicy,

    /// How long a caller waits for a response before giving up.
    #[serde(default)]
    request_timeout_ms: Option<u64>,
}

impl PipelineConfig {
    pub fn new(policy: ExecutionPolicy, request_timeout: Option<Duration>) -> Self {
        Self {
            policy,
            request_timeout_ms: request_timeout.map(|timeout| timeout.as_millis() as u64),
        }
    }

    pub fn policy(&self) -> ExecutionPolicy {
        self.policy
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

/// Styling defaults.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct StyleConfig {
    /// Theme applied when a diagram does not declare one.
    #[serde(default)]
    theme: Option<String>,
}

impl StyleConfig {
    pub fn new(theme: Option<String>) -> Self {
        Self { theme }
    }

    pub fn theme(&self) -> Option<&str> {
        self.theme.as_deref()
    }
}
