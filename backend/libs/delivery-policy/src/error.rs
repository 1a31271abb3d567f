use thiserror::Error;

use crate::models::AssetTier;

pub type Result<T> = std::result::Result<T, DeliveryError>;

/// Broken configuration detected while the process starts.
///
/// Every variant is fatal: nothing should serve traffic on a registry that
/// produced one of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("Quality ladder has no enabled renditions")]
    EmptyLadder,

    #[error("Quality ladder has more than one rendition at {resolution}")]
    DuplicateResolution { resolution: String },

    #[error("Invalid rendition '{name}': {reason}")]
    InvalidRendition { name: String, reason: String },

    #[error("No CDN origins configured")]
    NoOrigins,

    #[error("Invalid CDN origin '{origin}': {reason}")]
    InvalidOrigin { origin: String, reason: String },

    #[error("CDN origin '{0}' is configured more than once")]
    DuplicateOrigin(String),

    #[error("Tier '{tier}' requires DRM but not encryption")]
    DrmWithoutEncryption { tier: AssetTier },

    #[error("Tier '{tier}' requires DRM but DRM_LICENSE_URL is not set")]
    MissingDrmLicenseUrl { tier: AssetTier },

    #[error("TOKEN_TTL_SECONDS must be greater than zero")]
    InvalidTokenTtl,

    #[error("Unknown environment '{0}' (expected development, production or test)")]
    UnknownEnvironment(String),

    #[error("Invalid value for {key}: '{value}' ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Chunk size bounds are inconsistent: min={min} default={default} max={max}")]
    InvalidChunkBounds { min: u64, default: u64, max: u64 },
}

impl ConfigurationError {
    /// Configuration errors always abort startup.
    pub fn is_fatal(&self) -> bool {
        true
    }

    pub(crate) fn invalid_value(key: &str, value: &str, reason: impl Into<String>) -> Self {
        ConfigurationError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Caller-facing rejection of an upload request. Nothing has been transferred
/// when one of these is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("File is empty")]
    EmptyFile,

    #[error("File too large: {size} bytes exceeds limit of {limit} bytes")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("Video too long: {duration_secs}s exceeds limit of {limit_secs}s")]
    DurationTooLong { duration_secs: f64, limit_secs: u64 },

    #[error("Invalid video duration: {duration_secs}")]
    InvalidDuration { duration_secs: f64 },
}

impl ValidationError {
    /// Name of the constraint the request violated.
    pub fn limit(&self) -> &'static str {
        match self {
            ValidationError::EmptyFile => "min_file_size",
            ValidationError::FileTooLarge { .. } => "max_file_size",
            ValidationError::DurationTooLong { .. } | ValidationError::InvalidDuration { .. } => {
                "max_duration"
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Unreachable once the ladder passed startup validation.
    #[error("No renditions available")]
    NoRenditionsAvailable,

    #[error("Request from referrer {referrer:?} rejected by hotlink protection for tier '{tier}'")]
    HotlinkRejected {
        tier: AssetTier,
        referrer: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_names_limit() {
        let err = ValidationError::FileTooLarge {
            size: 11,
            limit: 10,
        };
        assert_eq!(err.limit(), "max_file_size");

        let err = ValidationError::DurationTooLong {
            duration_secs: 7201.0,
            limit_secs: 7200,
        };
        assert_eq!(err.limit(), "max_duration");
        assert!(err.to_string().contains("7200"));
    }

    #[test]
    fn test_configuration_error_is_fatal() {
        assert!(ConfigurationError::NoOrigins.is_fatal());
        assert!(ConfigurationError::EmptyLadder.is_fatal());
    }

    #[test]
    fn test_delivery_error_from_conversions() {
        let err: DeliveryError = ConfigurationError::NoOrigins.into();
        assert!(matches!(err, DeliveryError::Configuration(_)));

        let err: DeliveryError = ValidationError::EmptyFile.into();
        assert!(matches!(err, DeliveryError::Validation(_)));
    }
}
