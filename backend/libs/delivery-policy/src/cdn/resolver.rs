/// CDN origin resolver
///
/// Produces the ordered list of candidate URLs for an asset/quality: primary
/// origin first on a fresh resolver, then fallbacks. Demotion publishes a new
/// ordering (copy, reorder, swap the `Arc`); readers only ever clone the
/// current `Arc`, so they see either the old or the new list, never a partial one.
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use super::failover::{OriginHealth, OriginStats};
use crate::config::CdnConfig;
use crate::error::ConfigurationError;

/// Manifest file requested from each origin
const PLAYLIST_FILE: &str = "playlist.m3u8";

#[derive(Debug)]
pub struct CdnResolver {
    /// Origins in configured order (primary first); never mutated
    configured: Vec<String>,
    ordering: RwLock<Arc<Vec<String>>>,
    health: HashMap<String, OriginHealth>,
    demote_after_failures: u32,
}

impl CdnResolver {
    pub fn new(config: &CdnConfig) -> Result<Self, ConfigurationError> {
        if config.origins.is_empty() {
            return Err(ConfigurationError::NoOrigins);
        }

        let mut configured = Vec::with_capacity(config.origins.len());
        for raw in &config.origins {
            let origin = normalize_origin(raw)?;
            if configured.contains(&origin) {
                return Err(ConfigurationError::DuplicateOrigin(origin));
            }
            configured.push(origin);
        }

        let health = configured
            .iter()
            .map(|origin| (origin.clone(), OriginHealth::default()))
            .collect();

        debug!(
            "Initializing CDN resolver: primary={}, fallbacks={}, demote_after_failures={}",
            configured[0],
            configured.len() - 1,
            config.demote_after_failures
        );

        Ok(Self {
            ordering: RwLock::new(Arc::new(configured.clone())),
            configured,
            health,
            demote_after_failures: config.demote_after_failures.max(1),
        })
    }

    /// Primary origin as configured, regardless of demotions
    pub fn primary(&self) -> &str {
        &self.configured[0]
    }

    /// Snapshot of the current origin ordering
    pub fn ordering(&self) -> Arc<Vec<String>> {
        self.ordering.read().clone()
    }

    /// Candidate manifest URLs for an asset/quality, in attempt order
    pub fn resolve_sources(&self, asset_id: &str, quality: &str) -> Vec<String> {
        let ordering = self.ordering();
        let asset = urlencoding::encode(asset_id);
        let quality = urlencoding::encode(quality);

        ordering
            .iter()
            .map(|origin| format!("{}/{}/{}/{}", origin, asset, quality, PLAYLIST_FILE))
            .collect()
    }

    /// Move an origin to the back of the ordering for the rest of the session.
    ///
    /// Returns true if the published ordering changed.
    pub fn demote_origin(&self, origin: &str) -> bool {
        let origin = origin.trim().trim_end_matches('/');
        let Some(health) = self.health.get(origin) else {
            warn!("Demotion requested for unknown origin: {}", origin);
            return false;
        };

        if health.mark_demoted() {
            warn!("Demoting CDN origin for this session: {}", origin);
        }

        let mut guard = self.ordering.write();
        let Some(position) = guard.iter().position(|o| o == origin) else {
            return false;
        };
        if position + 1 == guard.len() {
            debug!("Origin already last in ordering: {}", origin);
            return false;
        }

        let mut next: Vec<String> = (**guard).clone();
        let demoted = next.remove(position);
        next.push(demoted);
        *guard = Arc::new(next);

        true
    }

    /// Record a failed playback attempt; demotes after repeated failures.
    ///
    /// Returns true if this failure triggered a reordering.
    pub fn report_failure(&self, origin: &str) -> bool {
        let key = origin.trim().trim_end_matches('/');
        let Some(health) = self.health.get(key) else {
            warn!("Failure reported for unknown origin: {}", key);
            return false;
        };

        let failures = health.record_failure();
        debug!("Origin failure: origin={}, consecutive={}", key, failures);

        // Keep demoting while the streak lasts: other demotions may have
        // pushed this origin back to the front.
        if failures >= self.demote_after_failures {
            return self.demote_origin(key);
        }
        false
    }

    /// Record a successful playback attempt. Clears the failure streak but does
    /// not promote a demoted origin.
    pub fn report_success(&self, origin: &str) {
        let key = origin.trim().trim_end_matches('/');
        if let Some(health) = self.health.get(key) {
            health.record_success();
        }
    }

    /// Per-origin statistics in configured order
    pub fn origin_stats(&self) -> Vec<OriginStats> {
        self.configured
            .iter()
            .filter_map(|origin| self.health.get(origin).map(|h| h.stats(origin)))
            .collect()
    }
}

fn normalize_origin(raw: &str) -> Result<String, ConfigurationError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let invalid = |reason: &str| ConfigurationError::InvalidOrigin {
        origin: raw.to_string(),
        reason: reason.to_string(),
    };

    let parsed = url::Url::parse(trimmed).map_err(|e| invalid(&e.to_string()))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(invalid("scheme must be http or https"));
    }
    if parsed.cannot_be_a_base() || parsed.host_str().is_none() {
        return Err(invalid("missing host"));
    }
    if parsed.query().is_some() || parsed.fragment().is_some() {
        return Err(invalid("query and fragment are not allowed"));
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdn::OriginState;

    fn config(origins: &[&str]) -> CdnConfig {
        CdnConfig {
            origins: origins.iter().map(|o| o.to_string()).collect(),
            demote_after_failures: 3,
        }
    }

    fn three_origins() -> CdnResolver {
        CdnResolver::new(&config(&[
            "https://cdn-a.example.com",
            "https://cdn-b.example.com/",
            "https://origin.example.com/media",
        ]))
        .unwrap()
    }

    #[test]
    fn test_zero_origins_rejected() {
        assert_eq!(
            CdnResolver::new(&config(&[])).unwrap_err(),
            ConfigurationError::NoOrigins
        );
    }

    #[test]
    fn test_invalid_origins_rejected() {
        assert!(matches!(
            CdnResolver::new(&config(&["ftp://cdn.example.com"])),
            Err(ConfigurationError::InvalidOrigin { .. })
        ));
        assert!(matches!(
            CdnResolver::new(&config(&["not a url"])),
            Err(ConfigurationError::InvalidOrigin { .. })
        ));
        assert!(matches!(
            CdnResolver::new(&config(&["https://a.example.com", "https://a.example.com/"])),
            Err(ConfigurationError::DuplicateOrigin(_))
        ));
    }

    #[test]
    fn test_primary_first_on_fresh_resolver() {
        let resolver = three_origins();
        let sources = resolver.resolve_sources("lesson-42", "720p");
        assert_eq!(
            sources,
            vec![
                "https://cdn-a.example.com/lesson-42/720p/playlist.m3u8",
                "https://cdn-b.example.com/lesson-42/720p/playlist.m3u8",
                "https://origin.example.com/media/lesson-42/720p/playlist.m3u8",
            ]
        );
    }

    #[test]
    fn test_path_segments_encoded() {
        let resolver = three_origins();
        let sources = resolver.resolve_sources("intro to rust/1", "720p");
        assert!(sources[0].contains("intro%20to%20rust%2F1"));
    }

    #[test]
    fn test_demote_preserves_relative_order() {
        let resolver = three_origins();
        assert!(resolver.demote_origin("https://cdn-a.example.com"));

        let ordering = resolver.ordering();
        assert_eq!(
            *ordering,
            vec![
                "https://cdn-b.example.com".to_string(),
                "https://origin.example.com/media".to_string(),
                "https://cdn-a.example.com".to_string(),
            ]
        );
        assert_eq!(resolver.primary(), "https://cdn-a.example.com");
    }

    #[test]
    fn test_demote_last_or_unknown_is_noop() {
        let resolver = three_origins();
        assert!(!resolver.demote_origin("https://origin.example.com/media"));
        assert!(!resolver.demote_origin("https://unknown.example.com"));
        assert_eq!(resolver.ordering()[0], "https://cdn-a.example.com");
    }

    #[test]
    fn test_repeated_failures_demote() {
        let resolver = three_origins();
        assert!(!resolver.report_failure("https://cdn-a.example.com"));
        assert!(!resolver.report_failure("https://cdn-a.example.com"));
        assert!(resolver.report_failure("https://cdn-a.example.com"));
        assert_eq!(resolver.ordering()[0], "https://cdn-b.example.com");

        // No promotion on later success
        resolver.report_success("https://cdn-a.example.com");
        assert_eq!(resolver.ordering()[0], "https://cdn-b.example.com");
        assert_eq!(resolver.origin_stats()[0].state, OriginState::Demoted);
    }

    #[test]
    fn test_failing_origin_demoted_again_after_returning_to_front() {
        let resolver = CdnResolver::new(&config(&[
            "https://a.example.com",
            "https://b.example.com",
        ]))
        .unwrap();

        for _ in 0..3 {
            resolver.report_failure("https://a.example.com");
        }
        assert_eq!(resolver.ordering()[0], "https://b.example.com");

        for _ in 0..3 {
            resolver.report_failure("https://b.example.com");
        }
        resolver.report_success("https://b.example.com");
        assert_eq!(resolver.ordering()[0], "https://a.example.com");

        // a never recovered; its next failure moves it back
        assert!(resolver.report_failure("https://a.example.com"));
        assert_eq!(resolver.ordering()[0], "https://b.example.com");
        for _ in 0..10 {
            resolver.report_failure("https://a.example.com");
        }
        assert_eq!(resolver.ordering()[0], "https://b.example.com");
    }

    #[test]
    fn test_success_breaks_failure_streak() {
        let resolver = three_origins();
        resolver.report_failure("https://cdn-a.example.com");
        resolver.report_failure("https://cdn-a.example.com");
        resolver.report_success("https://cdn-a.example.com");
        resolver.report_failure("https://cdn-a.example.com");

        assert_eq!(resolver.ordering()[0], "https://cdn-a.example.com");
        let stats = resolver.origin_stats();
        assert_eq!(stats[0].state, OriginState::Degraded);
        assert_eq!(stats[0].total_failures, 3);
    }

    #[test]
    fn test_snapshot_unaffected_by_later_demotion() {
        let resolver = three_origins();
        let before = resolver.ordering();
        resolver.demote_origin("https://cdn-a.example.com");
        assert_eq!(before[0], "https://cdn-a.example.com");
        assert_eq!(resolver.ordering()[0], "https://cdn-b.example.com");
    }
}
