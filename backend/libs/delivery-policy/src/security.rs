// Security policy engine - per-tier encryption/DRM/hotlink/token rules
// Decides what an asset requires; issuing and verifying tokens is the auth
// service's job.

use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

use crate::config::SecurityConfig;
use crate::error::ConfigurationError;
use crate::models::AssetTier;

/// Query parameter carrying the expiry (unix seconds)
pub const EXPIRY_PARAM: &str = "exp";
/// Query parameter carrying the hex signature
pub const SIGNATURE_PARAM: &str = "sig";

/// Shape of the signed URLs the auth service must issue:
/// `https://{domain}/{asset_key}?exp={unix_seconds}&sig={hmac_sha256_hex}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenContract {
    #[serde(with = "duration_secs")]
    pub ttl: Duration,
    pub expiry_param: &'static str,
    pub signature_param: &'static str,
    pub signature_algorithm: &'static str,
}

impl TokenContract {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            expiry_param: EXPIRY_PARAM,
            signature_param: SIGNATURE_PARAM,
            signature_algorithm: "HMAC-SHA256",
        }
    }

    /// Expiry timestamp a token issued at `issued_at` (unix seconds) must carry
    pub fn expires_at(&self, issued_at: u64) -> u64 {
        issued_at.saturating_add(self.ttl.as_secs())
    }

    /// Structural check only: both parameters present, expiry numeric,
    /// signature non-empty hex. The signature itself is not verified.
    pub fn has_expected_shape(&self, signed_url: &str) -> bool {
        let Ok(parsed) = url::Url::parse(signed_url) else {
            return false;
        };

        let mut expiry_ok = false;
        let mut signature_ok = false;
        for (key, value) in parsed.query_pairs() {
            if key == self.expiry_param {
                expiry_ok = value.parse::<u64>().is_ok();
            } else if key == self.signature_param {
                signature_ok = !value.is_empty() && value.chars().all(|c| c.is_ascii_hexdigit());
            }
        }
        expiry_ok && signature_ok
    }
}

/// Requirements for assets of one tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityPolicy {
    pub tier: AssetTier,
    pub encryption_required: bool,
    pub drm_required: bool,
    pub hotlink_protection: bool,
    pub allowed_domains: Vec<String>,
    pub drm_license_url: Option<String>,
    #[serde(with = "duration_secs")]
    pub token_ttl: Duration,
    pub token: TokenContract,
}

#[derive(Debug, Clone)]
pub struct SecurityPolicyEngine {
    policies: BTreeMap<AssetTier, SecurityPolicy>,
}

impl SecurityPolicyEngine {
    /// Build per-tier policies. Misconfiguration is rejected here, never per request.
    pub fn new(config: &SecurityConfig) -> Result<Self, ConfigurationError> {
        if config.token_ttl.is_zero() {
            return Err(ConfigurationError::InvalidTokenTtl);
        }

        let allowed_domains: Vec<String> = config
            .allowed_domains
            .iter()
            .filter_map(|d| normalize_domain(d))
            .collect();

        let mut policies = BTreeMap::new();
        for tier in AssetTier::ALL {
            let rules = config.tier(tier);

            if rules.drm_required && !rules.encryption_required {
                return Err(ConfigurationError::DrmWithoutEncryption { tier });
            }
            if rules.drm_required && config.drm_license_url.is_none() {
                return Err(ConfigurationError::MissingDrmLicenseUrl { tier });
            }

            policies.insert(
                tier,
                SecurityPolicy {
                    tier,
                    encryption_required: rules.encryption_required,
                    drm_required: rules.drm_required,
                    hotlink_protection: rules.hotlink_protection,
                    allowed_domains: allowed_domains.clone(),
                    drm_license_url: if rules.drm_required {
                        config.drm_license_url.clone()
                    } else {
                        None
                    },
                    token_ttl: config.token_ttl,
                    token: TokenContract::new(config.token_ttl),
                },
            );

            debug!(
                "Security policy: tier={}, encryption={}, drm={}, hotlink_protection={}",
                tier, rules.encryption_required, rules.drm_required, rules.hotlink_protection
            );
        }

        Ok(Self { policies })
    }

    pub fn policy_for(&self, tier: AssetTier) -> &SecurityPolicy {
        // Every tier is inserted in `new`
        &self.policies[&tier]
    }

    /// Whether a request with the given referrer may fetch a `tier` asset
    pub fn request_allowed(&self, tier: AssetTier, referrer: Option<&str>) -> bool {
        let policy = self.policy_for(tier);
        if !policy.hotlink_protection {
            return true;
        }

        let Some(host) = referrer.and_then(referrer_host) else {
            debug!("Hotlink check failed: tier={}, referrer missing", tier);
            return false;
        };

        let allowed = policy
            .allowed_domains
            .iter()
            .any(|pattern| domain_matches(pattern, &host));
        if !allowed {
            debug!("Hotlink check failed: tier={}, host={}", tier, host);
        }
        allowed
    }
}

/// Lowercase, strip port and trailing dot. Keeps a leading `*.` wildcard.
fn normalize_domain(raw: &str) -> Option<String> {
    let domain = raw.trim().trim_end_matches('.').to_lowercase();
    let domain = match domain.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host.to_string(),
        _ => domain,
    };
    if domain.is_empty() {
        None
    } else {
        Some(domain)
    }
}

/// Referrers may be a bare domain or a full URL
fn referrer_host(referrer: &str) -> Option<String> {
    let referrer = referrer.trim();
    if referrer.contains("://") {
        let parsed = url::Url::parse(referrer).ok()?;
        normalize_domain(parsed.host_str()?)
    } else {
        normalize_domain(referrer.split('/').next()?)
    }
}

fn domain_matches(pattern: &str, host: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(parent) => host
            .strip_suffix(parent)
            .is_some_and(|prefix| prefix.ends_with('.')),
        None => pattern == host,
    }
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }
}
