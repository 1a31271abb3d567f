/// Quality ladder
///
/// Catalog of enabled renditions offered for adaptive streaming, kept sorted
/// descending by bitrate with at most one rendition per resolution.
use std::collections::HashSet;
use tracing::debug;

use crate::error::ConfigurationError;
use crate::models::{EncodingPreset, Rendition};

#[derive(Debug, Clone)]
pub struct QualityLadder {
    renditions: Vec<Rendition>,
}

impl QualityLadder {
    /// Build a ladder from configured entries, dropping disabled ones.
    pub fn new(entries: Vec<Rendition>) -> Result<Self, ConfigurationError> {
        let total = entries.len();
        let mut renditions: Vec<Rendition> = entries.into_iter().filter(|r| r.enabled).collect();

        if renditions.is_empty() {
            return Err(ConfigurationError::EmptyLadder);
        }

        let mut resolutions = HashSet::new();
        let mut names = HashSet::new();
        for rendition in &renditions {
            if rendition.bitrate_kbps == 0 {
                return Err(ConfigurationError::InvalidRendition {
                    name: rendition.name.clone(),
                    reason: "bitrate must be greater than zero".to_string(),
                });
            }
            if !names.insert(rendition.name.as_str()) {
                return Err(ConfigurationError::InvalidRendition {
                    name: rendition.name.clone(),
                    reason: "name is used more than once".to_string(),
                });
            }
            if !resolutions.insert(rendition.resolution) {
                return Err(ConfigurationError::DuplicateResolution {
                    resolution: rendition.resolution.to_string(),
                });
            }
        }

        renditions.sort_by(|a, b| b.bitrate_kbps.cmp(&a.bitrate_kbps));

        debug!(
            "Quality ladder built: enabled={}, disabled={}",
            renditions.len(),
            total - renditions.len()
        );
        debug!(
            "Quality ladder: {}",
            renditions
                .iter()
                .map(|r| format!("{}@{}", r.name, r.bitrate_kbps))
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(Self { renditions })
    }

    /// Enabled renditions, highest bitrate first
    pub fn renditions(&self) -> &[Rendition] {
        &self.renditions
    }

    pub fn highest(&self) -> Option<&Rendition> {
        self.renditions.first()
    }

    pub fn lowest(&self) -> Option<&Rendition> {
        self.renditions.last()
    }

    pub fn get(&self, name: &str) -> Option<&Rendition> {
        self.renditions.iter().find(|r| r.name == name)
    }

    /// Index of a rendition in ladder order (0 = highest)
    pub fn position(&self, name: &str) -> Option<usize> {
        self.renditions.iter().position(|r| r.name == name)
    }

    pub fn len(&self) -> usize {
        self.renditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renditions.is_empty()
    }

    /// Encoding presets for every enabled rendition, in ladder order
    pub fn presets(&self) -> Vec<EncodingPreset> {
        self.renditions
            .iter()
            .map(EncodingPreset::for_rendition)
            .collect()
    }
}
