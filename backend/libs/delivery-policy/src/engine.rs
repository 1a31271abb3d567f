/// Delivery engine
///
/// Wires the ladder, selector, partitioner, resolver and security engine from
/// one registry into a single handle shared by playback and upload paths.
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::abr::{AdaptiveSelector, HysteresisSelector};
use crate::cdn::{CdnResolver, OriginStats};
use crate::config::ConfigRegistry;
use crate::error::{DeliveryError, Result};
use crate::ladder::QualityLadder;
use crate::models::{AssetTier, EncodingPreset, Rendition};
use crate::security::{SecurityPolicy, SecurityPolicyEngine};
use crate::upload::{UploadPartitioner, UploadPlan};

/// Everything a player needs to start one playback
#[derive(Debug, Clone, Serialize)]
pub struct PlaybackPlan {
    pub asset_id: String,
    pub rendition: Rendition,
    /// Manifest URLs in attempt order
    pub sources: Vec<String>,
    pub policy: SecurityPolicy,
}

#[derive(Debug)]
pub struct DeliveryEngine {
    registry: Arc<ConfigRegistry>,
    selector: AdaptiveSelector,
    partitioner: UploadPartitioner,
    resolver: CdnResolver,
    security: SecurityPolicyEngine,
}

impl DeliveryEngine {
    pub fn from_registry(registry: Arc<ConfigRegistry>) -> Result<Self> {
        info!(
            "Initializing delivery engine: environment={}",
            registry.environment()
        );

        let ladder = Arc::new(registry.quality_ladder()?);
        let resolver = CdnResolver::new(registry.cdn())?;
        let security = SecurityPolicyEngine::new(registry.security())?;
        let partitioner = UploadPartitioner::new(registry.upload().clone())?;

        Ok(Self {
            selector: AdaptiveSelector::new(ladder),
            partitioner,
            resolver,
            security,
            registry,
        })
    }

    pub fn registry(&self) -> &ConfigRegistry {
        &self.registry
    }

    pub fn ladder(&self) -> &QualityLadder {
        self.selector.ladder()
    }

    pub fn selector(&self) -> &AdaptiveSelector {
        &self.selector
    }

    /// Fresh per-session selector over the shared ladder
    pub fn session_selector(&self) -> HysteresisSelector {
        HysteresisSelector::new(self.selector.clone(), self.registry.abr().upgrade_samples)
    }

    /// Gate on hotlink protection, pick a rendition for the bandwidth
    /// estimate and list the origins to try.
    pub fn playback_plan(
        &self,
        asset_id: &str,
        tier: AssetTier,
        bandwidth_kbps: u64,
        referrer: Option<&str>,
    ) -> Result<PlaybackPlan> {
        if !self.security.request_allowed(tier, referrer) {
            return Err(DeliveryError::HotlinkRejected {
                tier,
                referrer: referrer.map(str::to_string),
            });
        }

        let rendition = self.selector.select(bandwidth_kbps)?.clone();
        let sources = self.resolver.resolve_sources(asset_id, &rendition.name);

        debug!(
            "Playback plan: asset_id={}, tier={}, bandwidth_kbps={}, rendition={}, sources={}",
            asset_id,
            tier,
            bandwidth_kbps,
            rendition.name,
            sources.len()
        );

        Ok(PlaybackPlan {
            asset_id: asset_id.to_string(),
            rendition,
            sources,
            policy: self.security.policy_for(tier).clone(),
        })
    }

    pub fn plan_upload(
        &self,
        file_size: u64,
        duration_secs: Option<f64>,
        throughput_mbps: Option<f64>,
    ) -> Result<UploadPlan> {
        Ok(self
            .partitioner
            .plan(file_size, duration_secs, throughput_mbps)?)
    }

    pub fn resolve_sources(&self, asset_id: &str, quality: &str) -> Vec<String> {
        self.resolver.resolve_sources(asset_id, quality)
    }

    pub fn demote_origin(&self, origin: &str) -> bool {
        self.resolver.demote_origin(origin)
    }

    pub fn report_origin_failure(&self, origin: &str) -> bool {
        self.resolver.report_failure(origin)
    }

    pub fn report_origin_success(&self, origin: &str) {
        self.resolver.report_success(origin)
    }

    pub fn origin_stats(&self) -> Vec<OriginStats> {
        self.resolver.origin_stats()
    }

    pub fn policy_for(&self, tier: AssetTier) -> &SecurityPolicy {
        self.security.policy_for(tier)
    }

    pub fn request_allowed(&self, tier: AssetTier, referrer: Option<&str>) -> bool {
        self.security.request_allowed(tier, referrer)
    }

    pub fn preset(&self, name: &str) -> Option<EncodingPreset> {
        self.ladder().get(name).map(EncodingPreset::for_rendition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MB;
    use std::collections::HashMap;

    fn engine(pairs: &[(&str, &str)]) -> DeliveryEngine {
        let mut source: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        source.insert("APP_ENV".to_string(), "test".to_string());
        let registry = ConfigRegistry::load(&source).unwrap();
        DeliveryEngine::from_registry(Arc::new(registry)).unwrap()
    }

    #[test]
    fn test_playback_plan_public_asset() {
        let engine = engine(&[]);
        let plan = engine
            .playback_plan("lesson-1", AssetTier::Public, 9000, None)
            .unwrap();

        assert_eq!(plan.rendition.name, "720p");
        assert_eq!(
            plan.sources,
            vec![
                "http://origin-a.test/lesson-1/720p/playlist.m3u8",
                "http://origin-b.test/lesson-1/720p/playlist.m3u8",
            ]
        );
        assert!(!plan.policy.encryption_required);
    }

    #[test]
    fn test_playback_plan_rejects_foreign_referrer() {
        let engine = engine(&[]);
        let err = engine
            .playback_plan(
                "lesson-1",
                AssetTier::Enrolled,
                9000,
                Some("https://pirate.example.net/embed"),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            DeliveryError::HotlinkRejected {
                tier: AssetTier::Enrolled,
                ..
            }
        ));

        let plan = engine
            .playback_plan("lesson-1", AssetTier::Enrolled, 9000, Some("http://app.test/player"))
            .unwrap();
        assert!(plan.policy.encryption_required);
    }

    #[test]
    fn test_demotion_visible_to_next_plan() {
        let engine = engine(&[]);
        assert!(!engine.report_origin_failure("http://origin-a.test"));
        assert!(engine.report_origin_failure("http://origin-a.test"));

        let plan = engine
            .playback_plan("lesson-1", AssetTier::Public, 600, None)
            .unwrap();
        assert_eq!(plan.rendition.name, "240p");
        assert!(plan.sources[0].starts_with("http://origin-b.test/"));
    }

    #[test]
    fn test_plan_upload_validation_error() {
        let engine = engine(&[("UPLOAD_MAX_FILE_SIZE_MB", "100")]);
        assert!(engine.plan_upload(100 * MB, None, None).is_ok());
        assert!(matches!(
            engine.plan_upload(100 * MB + 1, None, None),
            Err(DeliveryError::Validation(_))
        ));
    }

    #[test]
    fn test_session_selector_uses_configured_samples() {
        let engine = engine(&[("ABR_UPGRADE_SAMPLES", "1")]);
        let mut session = engine.session_selector();
        session.observe(1000).unwrap();
        let decision = session.observe(30000).unwrap();
        assert_eq!(decision.rendition.name, "2160p");
    }

    #[test]
    fn test_preset_lookup() {
        let engine = engine(&[]);
        assert_eq!(engine.preset("1080p").unwrap().profile, "high");
        assert!(engine.preset("8k").is_none());
    }
}
