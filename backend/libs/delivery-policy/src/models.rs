//! Core delivery data models

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::{KEYFRAME_INTERVAL_SECS, MAX_FPS};
use crate::error::ConfigurationError;

/// Frame size of an encoded rendition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .trim()
            .split_once(|c| c == 'x' || c == 'X')
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))?;
        let width = w
            .parse::<u32>()
            .map_err(|_| format!("invalid width '{}'", w))?;
        let height = h
            .parse::<u32>()
            .map_err(|_| format!("invalid height '{}'", h))?;
        if width == 0 || height == 0 {
            return Err(format!("resolution '{}' has a zero dimension", s));
        }
        Ok(Resolution { width, height })
    }
}

/// One encoded quality variant of a video asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rendition {
    pub name: String, // e.g., "1080p", "720p"
    pub resolution: Resolution,
    pub bitrate_kbps: u32,
    pub fps: u32,
    pub codec: String, // "h264", "h265", etc.
    pub enabled: bool,
}

impl Rendition {
    pub fn new(
        name: impl Into<String>,
        resolution: Resolution,
        bitrate_kbps: u32,
        fps: u32,
        codec: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            resolution,
            bitrate_kbps,
            fps,
            codec: codec.into(),
            enabled: true,
        }
    }

    /// Parse a ladder entry of the form `name:WxH:kbps:fps:codec[:disabled]`
    pub fn parse_entry(entry: &str) -> Result<Self, ConfigurationError> {
        let invalid = |reason: String| ConfigurationError::InvalidRendition {
            name: entry.trim().to_string(),
            reason,
        };

        let parts: Vec<&str> = entry.trim().split(':').map(str::trim).collect();
        if parts.len() != 5 && parts.len() != 6 {
            return Err(invalid(format!(
                "expected name:WxH:kbps:fps:codec[:disabled], got {} fields",
                parts.len()
            )));
        }

        let name = parts[0];
        if name.is_empty() {
            return Err(invalid("empty name".to_string()));
        }
        let resolution = parts[1].parse::<Resolution>().map_err(invalid)?;
        let bitrate_kbps = parts[2]
            .parse::<u32>()
            .map_err(|_| invalid(format!("invalid bitrate '{}'", parts[2])))?;
        let fps = parts[3]
            .parse::<u32>()
            .ok()
            .filter(|fps| (1..=MAX_FPS).contains(fps))
            .ok_or_else(|| invalid(format!("fps must be 1..={}, got '{}'", MAX_FPS, parts[3])))?;
        let codec = parts[4];
        if codec.is_empty() {
            return Err(invalid("empty codec".to_string()));
        }

        let enabled = match parts.get(5) {
            None => true,
            Some(flag) if flag.eq_ignore_ascii_case("disabled") => false,
            Some(flag) if flag.eq_ignore_ascii_case("enabled") => true,
            Some(flag) => return Err(invalid(format!("unknown flag '{}'", flag))),
        };

        Ok(Rendition {
            name: name.to_string(),
            resolution,
            bitrate_kbps,
            fps,
            codec: codec.to_lowercase(),
            enabled,
        })
    }
}

/// Encoder settings the external encoding pipeline looks up by rendition name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingPreset {
    pub name: String,
    pub resolution: Resolution,
    pub video_bitrate_kbps: u32,
    pub audio_bitrate_kbps: u32,
    pub fps: u32,
    pub codec: String,
    pub profile: String, // "high", "main", "baseline"
    pub keyframe_interval: u32, // in frames
}

impl EncodingPreset {
    pub fn for_rendition(rendition: &Rendition) -> Self {
        let height = rendition.resolution.height;

        let audio_bitrate_kbps = if height >= 1080 { 192 } else { 128 };
        let profile = if height >= 720 {
            "high"
        } else if height >= 480 {
            "main"
        } else {
            "baseline"
        };

        Self {
            name: rendition.name.clone(),
            resolution: rendition.resolution,
            video_bitrate_kbps: rendition.bitrate_kbps,
            audio_bitrate_kbps,
            fps: rendition.fps,
            codec: rendition.codec.clone(),
            profile: profile.to_string(),
            keyframe_interval: rendition.fps.max(1).saturating_mul(KEYFRAME_INTERVAL_SECS),
        }
    }
}

/// Protection tier of a course asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetTier {
    /// Free preview lessons
    Public,
    /// Course content for enrolled learners
    Enrolled,
    /// Paid premium content
    Premium,
}

impl AssetTier {
    pub const ALL: [AssetTier; 3] = [AssetTier::Public, AssetTier::Enrolled, AssetTier::Premium];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetTier::Public => "public",
            AssetTier::Enrolled => "enrolled",
            AssetTier::Premium => "premium",
        }
    }
}

impl fmt::Display for AssetTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "public" => Ok(AssetTier::Public),
            "enrolled" => Ok(AssetTier::Enrolled),
            "premium" => Ok(AssetTier::Premium),
            other => Err(format!("unknown asset tier '{}'", other)),
        }
    }
}
