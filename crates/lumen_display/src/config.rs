//! Display configuration (lumen.toml)

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use lumen_animation::{CursorAnimationMode, EffectSettings, TransitionKind};
use lumen_text::AtlasConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {field}: {value}")]
    Invalid { field: &'static str, value: String },
}

/// Top-level display configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct DisplayConfig {
    #[serde(default)]
    pub atlas: AtlasSection,
    #[serde(default)]
    pub animation: AnimationSection,
    #[serde(default)]
    pub surface: SurfaceSection,
}

/// Glyph atlas capacity
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AtlasSection {
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(default = "default_max_glyphs")]
    pub max_glyphs: usize,
}

fn default_page_size() -> u32 {
    1024
}

fn default_max_pages() -> u32 {
    4
}

fn default_max_glyphs() -> usize {
    4096
}

impl Default for AtlasSection {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            max_glyphs: default_max_glyphs(),
        }
    }
}

/// Cursor, scroll and buffer-switch animation settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AnimationSection {
    #[serde(default = "default_true")]
    pub cursor_blink: bool,
    #[serde(default = "default_blink_interval_ms")]
    pub blink_interval_ms: u64,
    /// Glide the cursor between positions
    #[serde(default)]
    pub smooth_cursor: bool,
    #[serde(default = "default_smooth_cursor_ms")]
    pub smooth_cursor_ms: u64,
    #[serde(default = "default_scroll_ms")]
    pub scroll_ms: u64,
    /// Default buffer transition kind, e.g. "fade" or "page-flip"
    #[serde(default = "default_transition")]
    pub transition: String,
    #[serde(default = "default_transition_ms")]
    pub transition_ms: u64,
    /// Run the default transition whenever a window's content changes
    #[serde(default)]
    pub auto_transition: bool,
    /// Cursor jump decoration, e.g. "railgun" or "ripple"
    #[serde(default = "default_cursor_effect")]
    pub cursor_effect: String,
    #[serde(default = "default_particle_count")]
    pub particle_count: u32,
}

fn default_true() -> bool {
    true
}

fn default_blink_interval_ms() -> u64 {
    530
}

fn default_smooth_cursor_ms() -> u64 {
    80
}

fn default_scroll_ms() -> u64 {
    150
}

fn default_transition() -> String {
    "fade".to_string()
}

fn default_transition_ms() -> u64 {
    200
}

fn default_cursor_effect() -> String {
    "none".to_string()
}

fn default_particle_count() -> u32 {
    15
}

impl Default for AnimationSection {
    fn default() -> Self {
        Self {
            cursor_blink: true,
            blink_interval_ms: default_blink_interval_ms(),
            smooth_cursor: false,
            smooth_cursor_ms: default_smooth_cursor_ms(),
            scroll_ms: default_scroll_ms(),
            transition: default_transition(),
            transition_ms: default_transition_ms(),
            auto_transition: false,
            cursor_effect: default_cursor_effect(),
            particle_count: default_particle_count(),
        }
    }
}

/// Presentation settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SurfaceSection {
    /// Consecutive acquire failures tolerated before the window is lost
    #[serde(default = "default_max_acquire_failures")]
    pub max_acquire_failures: u32,
    #[serde(default = "default_present_mode")]
    pub present_mode: String,
}

fn default_max_acquire_failures() -> u32 {
    8
}

fn default_present_mode() -> String {
    "auto_vsync".to_string()
}

impl Default for SurfaceSection {
    fn default() -> Self {
        Self {
            max_acquire_failures: default_max_acquire_failures(),
            present_mode: default_present_mode(),
        }
    }
}

impl DisplayConfig {
    /// Parse and validate TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: DisplayConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config = Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    /// Serialize to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.atlas.page_size < 64 {
            return Err(ConfigError::Invalid {
                field: "atlas.page_size",
                value: self.atlas.page_size.to_string(),
            });
        }
        if self.atlas.max_pages == 0 {
            return Err(ConfigError::Invalid {
                field: "atlas.max_pages",
                value: "0".to_string(),
            });
        }
        if TransitionKind::from_name(&self.animation.transition).is_none() {
            return Err(ConfigError::Invalid {
                field: "animation.transition",
                value: self.animation.transition.clone(),
            });
        }
        let effect = self.animation.cursor_effect.to_ascii_lowercase();
        if CursorAnimationMode::from_name(&effect).name() != effect {
            return Err(ConfigError::Invalid {
                field: "animation.cursor_effect",
                value: self.animation.cursor_effect.clone(),
            });
        }
        if lumen_gpu::parse_present_mode(&self.surface.present_mode).is_none() {
            return Err(ConfigError::Invalid {
                field: "surface.present_mode",
                value: self.surface.present_mode.clone(),
            });
        }
        Ok(())
    }

    pub fn atlas_config(&self) -> AtlasConfig {
        AtlasConfig {
            page_size: self.atlas.page_size,
            max_pages: self.atlas.max_pages,
            max_glyphs: self.atlas.max_glyphs,
        }
    }

    pub fn blink_interval(&self) -> Duration {
        Duration::from_millis(self.animation.blink_interval_ms)
    }

    pub fn smooth_cursor_duration(&self) -> Duration {
        Duration::from_millis(self.animation.smooth_cursor_ms)
    }

    pub fn scroll_duration(&self) -> Duration {
        Duration::from_millis(self.animation.scroll_ms)
    }

    pub fn transition_duration(&self) -> Duration {
        Duration::from_millis(self.animation.transition_ms)
    }

    /// Configured transition kind, fade when unparsable
    pub fn transition_kind(&self) -> TransitionKind {
        TransitionKind::from_name(&self.animation.transition).unwrap_or(TransitionKind::Fade)
    }

    pub fn cursor_mode(&self) -> CursorAnimationMode {
        CursorAnimationMode::from_name(&self.animation.cursor_effect)
    }

    pub fn effect_settings(&self) -> EffectSettings {
        EffectSettings::default().with_particle_count(self.animation.particle_count)
    }

    pub fn present_mode(&self) -> wgpu::PresentMode {
        lumen_gpu::parse_present_mode(&self.surface.present_mode)
            .unwrap_or(wgpu::PresentMode::AutoVsync)
    }
}
