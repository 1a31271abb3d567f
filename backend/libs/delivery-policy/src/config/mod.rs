/// Delivery configuration
///
/// The registry is assembled once at startup in three layers: compiled-in
/// defaults, the overlay for the environment tag, then explicit key/value
/// overrides. After `load` returns it is never mutated; share it as
/// `Arc<ConfigRegistry>`.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

pub mod env_utils;

pub use env_utils::{ConfigSource, EnvSource};

use crate::cdn::CdnResolver;
use crate::constants::{
    ABR_UPGRADE_SAMPLES, CDN_DEMOTE_AFTER_FAILURES, CHUNK_RETRY_ATTEMPTS,
    CHUNK_RETRY_INITIAL_BACKOFF_MS, CHUNK_RETRY_MAX_BACKOFF_MS, DEFAULT_CHUNK_SIZE,
    DEFAULT_LADDER, MAX_CHUNK_SIZE, MAX_CONCURRENT_UPLOADS, MAX_DURATION_SECS, MAX_FILE_SIZE,
    MIN_CHUNK_SIZE, TOKEN_TTL_SECS,
};
use crate::error::ConfigurationError;
use crate::ladder::QualityLadder;
use crate::models::{AssetTier, EncodingPreset, Rendition, Resolution};
use crate::security::SecurityPolicyEngine;
use env_utils::{parse_bool, parse_list, parse_megabytes, parse_optional, parse_positive, read_optional};

/// Deployment environment selected by `APP_ENV`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
    Test,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Test => "test",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" => Ok(Environment::Development),
            "production" => Ok(Environment::Production),
            "test" => Ok(Environment::Test),
            _ => Err(ConfigurationError::UnknownEnvironment(s.trim().to_string())),
        }
    }
}

/// Upload limits and chunking bounds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Maximum file size in bytes (default: 10GB)
    pub max_file_size_bytes: u64,
    /// Maximum video duration in seconds (default: 4 hours)
    pub max_duration_seconds: u64,
    pub default_chunk_size_bytes: u64,
    pub min_chunk_size_bytes: u64,
    pub max_chunk_size_bytes: u64,
    /// Parallel chunk transfers per upload
    pub max_concurrent_uploads: usize,
    /// Retries per chunk before the upload is failed
    pub retry_attempts: u32,
    pub retry_initial_backoff: Duration,
    pub retry_max_backoff: Duration,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size_bytes: MAX_FILE_SIZE,
            max_duration_seconds: MAX_DURATION_SECS,
            default_chunk_size_bytes: DEFAULT_CHUNK_SIZE,
            min_chunk_size_bytes: MIN_CHUNK_SIZE,
            max_chunk_size_bytes: MAX_CHUNK_SIZE,
            max_concurrent_uploads: MAX_CONCURRENT_UPLOADS,
            retry_attempts: CHUNK_RETRY_ATTEMPTS,
            retry_initial_backoff: Duration::from_millis(CHUNK_RETRY_INITIAL_BACKOFF_MS),
            retry_max_backoff: Duration::from_millis(CHUNK_RETRY_MAX_BACKOFF_MS),
        }
    }
}

impl UploadConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigurationError> {
        let (min, default, max) = (
            self.min_chunk_size_bytes,
            self.default_chunk_size_bytes,
            self.max_chunk_size_bytes,
        );
        if min == 0 || min > default || default > max {
            return Err(ConfigurationError::InvalidChunkBounds { min, default, max });
        }
        Ok(())
    }
}

/// CDN origins, primary first
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CdnConfig {
    pub origins: Vec<String>,
    /// Consecutive playback failures before an origin is demoted
    pub demote_after_failures: u32,
}

impl Default for CdnConfig {
    fn default() -> Self {
        Self {
            origins: vec!["http://localhost:8080/media".to_string()],
            demote_after_failures: CDN_DEMOTE_AFTER_FAILURES,
        }
    }
}

/// Protection switches for one asset tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TierRules {
    pub encryption_required: bool,
    pub drm_required: bool,
    pub hotlink_protection: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub public: TierRules,
    pub enrolled: TierRules,
    pub premium: TierRules,
    pub drm_license_url: Option<String>,
    /// Referrer domains allowed when hotlink protection is on; `*.` prefix matches subdomains
    pub allowed_domains: Vec<String>,
    pub token_ttl: Duration,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        let protected = TierRules {
            encryption_required: true,
            drm_required: false,
            hotlink_protection: true,
        };
        Self {
            public: TierRules::default(),
            enrolled: protected,
            premium: protected,
            drm_license_url: None,
            allowed_domains: vec!["localhost".to_string()],
            token_ttl: Duration::from_secs(TOKEN_TTL_SECS),
        }
    }
}

impl SecurityConfig {
    pub fn tier(&self, tier: AssetTier) -> &TierRules {
        match tier {
            AssetTier::Public => &self.public,
            AssetTier::Enrolled => &self.enrolled,
            AssetTier::Premium => &self.premium,
        }
    }

    fn tier_mut(&mut self, tier: AssetTier) -> &mut TierRules {
        match tier {
            AssetTier::Public => &mut self.public,
            AssetTier::Enrolled => &mut self.enrolled,
            AssetTier::Premium => &mut self.premium,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbrConfig {
    /// Consecutive favourable samples before a session upgrades
    pub upgrade_samples: u32,
}

impl Default for AbrConfig {
    fn default() -> Self {
        Self {
            upgrade_samples: ABR_UPGRADE_SAMPLES,
        }
    }
}

/// Immutable, process-wide delivery configuration
#[derive(Debug, Clone, Serialize)]
pub struct ConfigRegistry {
    environment: Environment,
    ladder: Vec<Rendition>,
    upload: UploadConfig,
    cdn: CdnConfig,
    security: SecurityConfig,
    abr: AbrConfig,
}

impl ConfigRegistry {
    /// Load configuration from environment variables (and `.env`)
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::load(&EnvSource::new())
    }

    /// Defaults, then the `APP_ENV` overlay, then explicit keys from `source`.
    /// The result has passed `validate`.
    pub fn load(source: &impl ConfigSource) -> Result<Self, ConfigurationError> {
        let environment = match read_optional(source, "APP_ENV") {
            Some(tag) => tag.parse::<Environment>()?,
            None => Environment::default(),
        };
        info!("Loading delivery configuration: environment={}", environment);

        let mut registry = Self::defaults(environment);
        registry.apply_overrides(source)?;
        registry.validate()?;

        info!(
            "Delivery configuration loaded: environment={}, renditions={}, origins={}",
            registry.environment,
            registry.ladder.iter().filter(|r| r.enabled).count(),
            registry.cdn.origins.len()
        );
        Ok(registry)
    }

    /// Compiled-in defaults with the overlay for `environment`, unvalidated
    pub fn defaults(environment: Environment) -> Self {
        let mut registry = Self {
            environment,
            ladder: default_ladder(),
            upload: UploadConfig::default(),
            cdn: CdnConfig::default(),
            security: SecurityConfig::default(),
            abr: AbrConfig::default(),
        };

        match environment {
            Environment::Development => {
                registry.security.allowed_domains =
                    vec!["localhost".to_string(), "127.0.0.1".to_string()];
                for tier in AssetTier::ALL {
                    registry.security.tier_mut(tier).hotlink_protection = false;
                }
                registry.security.token_ttl = Duration::from_secs(24 * 60 * 60);
            }
            Environment::Production => {
                // Origins and the DRM license server are deployment specific
                registry.cdn.origins.clear();
                registry.security.allowed_domains.clear();
                registry.security.premium = TierRules {
                    encryption_required: true,
                    drm_required: true,
                    hotlink_protection: true,
                };
            }
            Environment::Test => {
                registry.cdn.origins = vec![
                    "http://origin-a.test".to_string(),
                    "http://origin-b.test".to_string(),
                ];
                registry.cdn.demote_after_failures = 2;
                registry.security.allowed_domains =
                    vec!["localhost".to_string(), "*.test".to_string()];
                registry.security.token_ttl = Duration::from_secs(5 * 60);
            }
        }

        registry
    }

    fn apply_overrides(&mut self, source: &impl ConfigSource) -> Result<(), ConfigurationError> {
        if let Some(entries) = parse_list(source, "QUALITY_LADDER") {
            self.ladder = entries
                .iter()
                .map(|entry| Rendition::parse_entry(entry))
                .collect::<Result<_, _>>()?;
        }
        if let Some(disabled) = parse_list(source, "QUALITY_DISABLED") {
            for name in disabled {
                let rendition = self
                    .ladder
                    .iter_mut()
                    .find(|r| r.name == name)
                    .ok_or_else(|| {
                        ConfigurationError::invalid_value(
                            "QUALITY_DISABLED",
                            &name,
                            "no such rendition",
                        )
                    })?;
                rendition.enabled = false;
            }
        }

        if let Some(origins) = parse_list(source, "CDN_ORIGINS") {
            self.cdn.origins = origins;
        }
        if let Some(n) = parse_positive::<u32>(source, "CDN_DEMOTE_AFTER_FAILURES")? {
            self.cdn.demote_after_failures = n;
        }

        let upload = &mut self.upload;
        if let Some(bytes) = parse_megabytes(source, "UPLOAD_MAX_FILE_SIZE_MB")? {
            upload.max_file_size_bytes = bytes;
        }
        if let Some(secs) = parse_positive::<u64>(source, "UPLOAD_MAX_DURATION_SECONDS")? {
            upload.max_duration_seconds = secs;
        }
        if let Some(bytes) = parse_megabytes(source, "UPLOAD_CHUNK_SIZE_MB")? {
            upload.default_chunk_size_bytes = bytes;
        }
        if let Some(bytes) = parse_megabytes(source, "UPLOAD_MIN_CHUNK_SIZE_MB")? {
            upload.min_chunk_size_bytes = bytes;
        }
        if let Some(bytes) = parse_megabytes(source, "UPLOAD_MAX_CHUNK_SIZE_MB")? {
            upload.max_chunk_size_bytes = bytes;
        }
        if let Some(n) = parse_positive::<usize>(source, "UPLOAD_MAX_CONCURRENT")? {
            upload.max_concurrent_uploads = n;
        }
        if let Some(n) = parse_optional::<u32>(source, "UPLOAD_RETRY_ATTEMPTS")? {
            upload.retry_attempts = n;
        }

        let security = &mut self.security;
        if let Some(url) = read_optional(source, "DRM_LICENSE_URL") {
            url::Url::parse(&url).map_err(|e| {
                ConfigurationError::invalid_value("DRM_LICENSE_URL", &url, e.to_string())
            })?;
            security.drm_license_url = Some(url);
        }
        if let Some(domains) = parse_list(source, "HOTLINK_ALLOWED_DOMAINS") {
            security.allowed_domains = domains;
        }
        if let Some(secs) = parse_optional::<u64>(source, "TOKEN_TTL_SECONDS")? {
            security.token_ttl = Duration::from_secs(secs);
        }
        for tier in AssetTier::ALL {
            let prefix = format!("SECURITY_{}", tier.as_str().to_uppercase());
            let rules = security.tier_mut(tier);
            if let Some(v) = parse_bool(source, &format!("{}_ENCRYPTION", prefix))? {
                rules.encryption_required = v;
            }
            if let Some(v) = parse_bool(source, &format!("{}_DRM", prefix))? {
                rules.drm_required = v;
            }
            if let Some(v) = parse_bool(source, &format!("{}_HOTLINK_PROTECTION", prefix))? {
                rules.hotlink_protection = v;
            }
        }

        if let Some(n) = parse_positive::<u32>(source, "ABR_UPGRADE_SAMPLES")? {
            self.abr.upgrade_samples = n;
        }

        Ok(())
    }

    /// Check every startup invariant by building the components that own them
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.quality_ladder()?;
        CdnResolver::new(&self.cdn)?;
        SecurityPolicyEngine::new(&self.security)?;
        self.upload.validate()
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Configured ladder entries, including disabled ones
    pub fn ladder_entries(&self) -> &[Rendition] {
        &self.ladder
    }

    pub fn quality_ladder(&self) -> Result<QualityLadder, ConfigurationError> {
        QualityLadder::new(self.ladder.clone())
    }

    pub fn upload(&self) -> &UploadConfig {
        &self.upload
    }

    pub fn cdn(&self) -> &CdnConfig {
        &self.cdn
    }

    pub fn security(&self) -> &SecurityConfig {
        &self.security
    }

    pub fn abr(&self) -> &AbrConfig {
        &self.abr
    }

    /// Encoding preset for an enabled rendition, by name
    pub fn preset(&self, name: &str) -> Option<EncodingPreset> {
        self.ladder
            .iter()
            .find(|r| r.enabled && r.name == name)
            .map(EncodingPreset::for_rendition)
    }
}

fn default_ladder() -> Vec<Rendition> {
    DEFAULT_LADDER
        .iter()
        .map(|&(name, width, height, bitrate_kbps, fps, codec)| {
            Rendition::new(name, Resolution::new(width, height), bitrate_kbps, fps, codec)
        })
        .collect()
}
