// SPDX-License-Identifier: MIT OR Apache-2.0
//! Compiler settings.
//!
//! Settings are stored as RON next to the project and control the
//! resource heuristics applied to render targets without an explicit
//! resource node.

use crate::pipeline::TextureFormat;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Conventional settings file name
pub const CONFIG_FILE_NAME: &str = "render_graph.ron";

/// Settings for graph compilation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Class-name fragments of passes that need HDR targets
    pub hdr_class_keywords: Vec<String>,
    /// Class-name fragments of passes that benefit from MSAA targets
    pub msaa_class_keywords: Vec<String>,
    /// Format given to HDR targets
    pub hdr_format: TextureFormat,
    /// Format for targets without a more specific rule
    pub default_format: TextureFormat,
    /// Sample count given to MSAA targets
    pub msaa_samples: u32,
    /// Treat any error diagnostic as a failed compile
    pub fail_fast: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            hdr_class_keywords: ["postprocess", "post_process", "bloom", "tonemap", "color"]
                .map(String::from)
                .to_vec(),
            msaa_class_keywords: ["color", "depth", "skybox"].map(String::from).to_vec(),
            hdr_format: TextureFormat::Rgba16Float,
            default_format: TextureFormat::Rgba8Unorm,
            msaa_samples: 4,
            fail_fast: false,
        }
    }
}

impl CompilerConfig {
    /// Load settings from a RON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron(&contents)
    }

    /// Parse settings from RON text
    pub fn from_ron(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = ron::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save settings to a RON file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.msaa_samples, 1 | 2 | 4 | 8 | 16) {
            return Err(ConfigError::Invalid(format!(
                "msaa_samples must be 1, 2, 4, 8, or 16 (got {})",
                self.msaa_samples
            )));
        }
        Ok(())
    }

    /// Whether a pass class matches the HDR keywords
    pub fn wants_hdr(&self, class_name: &str) -> bool {
        matches_keyword(&self.hdr_class_keywords, class_name)
    }

    /// Whether a pass class matches the MSAA keywords
    pub fn wants_msaa(&self, class_name: &str) -> bool {
        matches_keyword(&self.msaa_class_keywords, class_name)
    }
}

fn matches_keyword(keywords: &[String], class_name: &str) -> bool {
    let class_name = class_name.to_ascii_lowercase();
    keywords
        .iter()
        .any(|keyword| class_name.contains(&keyword.to_ascii_lowercase()))
}

/// Error loading or saving settings
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// RON parse error
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// RON serialization error
    #[error("Serialization error: {0}")]
    Serialize(#[from] ron::Error),

    /// Value out of range
    #[error("Invalid setting: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_keywords() {
        let config = CompilerConfig::default();
        assert!(config.wants_hdr("BloomPass"));
        assert!(config.wants_hdr("PostProcessPass"));
        assert!(config.wants_hdr("ColorGradingPass"));
        assert!(!config.wants_hdr("ShadowPass"));
        assert!(config.wants_msaa("DepthPass"));
        assert!(!config.wants_msaa("PresentToScreenPass"));
    }

    #[test]
    fn test_serialization() {
        let config = CompilerConfig {
            msaa_samples: 8,
            fail_fast: true,
            ..CompilerConfig::default()
        };
        let ron_str =
            ron::ser::to_string_pretty(&config, ron::ser::PrettyConfig::default()).unwrap();
        let loaded = CompilerConfig::from_ron(&ron_str).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let loaded = CompilerConfig::from_ron("(msaa_samples: 2)").unwrap();
        assert_eq!(loaded.msaa_samples, 2);
        assert_eq!(loaded.hdr_format, TextureFormat::Rgba16Float);
    }

    #[test]
    fn test_invalid_samples_rejected() {
        assert!(matches!(
            CompilerConfig::from_ron("(msaa_samples: 3)"),
            Err(ConfigError::Invalid(_))
        ));
    }
}
