// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Configuration for the studio engine.
//!
//! Settings are loaded from YAML with per-field defaults, so a partial
//! file (or none at all) yields a working engine.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Engine-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StudioConfig {
    /// Skip amount for transport skip, in seconds.
    #[serde(default = "default_skip_seconds")]
    pub skip_seconds: f64,
    /// Section length used when no word timing exists, in seconds.
    #[serde(default = "default_slice_seconds")]
    pub fallback_slice_seconds: f64,
    /// Initial master volume, 0.0 - 1.0.
    #[serde(default = "default_master_volume")]
    pub master_volume: f32,
    /// How often to poll a processing job when no push update has
    /// arrived, in milliseconds.
    #[serde(default = "default_job_poll_ms")]
    pub job_poll_ms: u64,
    /// Volume used for A/B variant preview playback, 0.0 - 1.0.
    #[serde(default = "default_preview_volume")]
    pub preview_volume: f32,
}

fn default_skip_seconds() -> f64 {
    10.0
}
fn default_slice_seconds() -> f64 {
    30.0
}
fn default_master_volume() -> f32 {
    1.0
}
fn default_job_poll_ms() -> u64 {
    5000
}
fn default_preview_volume() -> f32 {
    1.0
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            skip_seconds: default_skip_seconds(),
            fallback_slice_seconds: default_slice_seconds(),
            master_volume: default_master_volume(),
            job_poll_ms: default_job_poll_ms(),
            preview_volume: default_preview_volume(),
        }
    }
}

impl StudioConfig {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse YAML configuration")
    }

    /// Serialize to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize configuration to YAML")
    }

    /// Save configuration to a YAML file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = self.to_yaml()?;
        fs::write(path.as_ref(), yaml)
            .with_context(|| format!("Failed to write config file: {:?}", path.as_ref()))
    }
}
