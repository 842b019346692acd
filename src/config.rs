//! Editor configuration: defaults, optional JSON file, environment overrides

use std::path::Path;

use egui::Color32;
use serde::{Deserialize, Serialize};

use crate::error::EditorError;
use crate::history::MAX_HISTORY_SIZE;
use crate::mode::BrushStyle;
use crate::scene::DEFAULT_BACKGROUND;
use crate::viewport::DEFAULT_MAX_ZOOM;

pub const ENV_API_URL: &str = "INPAINT_API_URL";
pub const ENV_HISTORY_DEPTH: &str = "INPAINT_HISTORY_DEPTH";

/// Options for an editing session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Maximum number of undo snapshots (default: 10)
    pub history_depth: usize,
    /// Upper zoom clamp (default: 5.0)
    pub max_zoom: f32,
    /// Mask brush width in scene pixels
    pub brush_width: f32,
    /// Translucent overlay color of mask strokes
    pub brush_color: Color32,
    /// Canvas background
    pub background: Color32,
    /// Resolution multiplier for downloads (default: 2.0)
    pub download_multiplier: f32,
    /// Share of the canvas a result takes when there is no base image to align to
    pub result_fallback_fraction: f32,
    /// Base URL of the generation service
    pub service_url: String,
    /// Timeout for one generation request, in seconds
    pub request_timeout_secs: u64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_depth: MAX_HISTORY_SIZE,
            max_zoom: DEFAULT_MAX_ZOOM,
            brush_width: 30.0,
            brush_color: Color32::from_rgba_unmultiplied(99, 102, 241, 128),
            background: DEFAULT_BACKGROUND,
            download_multiplier: 2.0,
            result_fallback_fraction: 0.8,
            service_url: "http://localhost:8000".to_string(),
            request_timeout_secs: 120,
        }
    }
}

impl EditorConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, EditorError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: EditorConfig = serde_json::from_str(&text)
            .map_err(|e| EditorError::Config(format!("{}: {}", path.as_ref().display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults (or `path` when given) with environment overrides applied
    pub fn resolve(path: Option<&Path>) -> Result<Self, EditorError> {
        let mut config = match path {
            Some(p) => Self::load(p)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (normally `std::env::var`)
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            self.service_url = url.trim().to_string();
        }
        if let Some(depth) = lookup(ENV_HISTORY_DEPTH) {
            match depth.trim().parse::<usize>() {
                Ok(d) => self.history_depth = d,
                Err(_) => tracing::warn!("Ignoring {}={:?}: not a number", ENV_HISTORY_DEPTH, depth),
            }
        }
    }

    pub fn validate(&self) -> Result<(), EditorError> {
        if self.history_depth == 0 {
            return Err(EditorError::Config("history_depth must be at least 1".into()));
        }
        if !(self.max_zoom > 0.0) {
            return Err(EditorError::Config("max_zoom must be positive".into()));
        }
        if !(self.brush_width > 0.0) {
            return Err(EditorError::Config("brush_width must be positive".into()));
        }
        if !(self.download_multiplier > 0.0) {
            return Err(EditorError::Config("download_multiplier must be positive".into()));
        }
        if !(self.result_fallback_fraction > 0.0 && self.result_fallback_fraction <= 1.0) {
            return Err(EditorError::Config(
                "result_fallback_fraction must be in (0, 1]".into(),
            ));
        }
        Ok(())
    }

    pub fn brush(&self) -> BrushStyle {
        BrushStyle {
            width: self.brush_width,
            color: self.brush_color,
        }
    }
}
