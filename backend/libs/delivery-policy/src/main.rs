/// Delivery policy startup check
///
/// Loads the registry from the environment, builds the engine and logs what
/// it will serve. Exits non-zero on any configuration error so a deployment
/// never starts on broken settings.
use anyhow::{Context, Result};
use delivery_policy::{AssetTier, ConfigRegistry, DeliveryEngine};
use std::sync::Arc;
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}

fn run() -> Result<()> {
    let registry = ConfigRegistry::from_env().context("Failed to load delivery configuration")?;
    let engine = DeliveryEngine::from_registry(Arc::new(registry))
        .context("Failed to initialize delivery engine")?;

    info!(
        "Quality ladder: {}",
        engine
            .ladder()
            .renditions()
            .iter()
            .map(|r| format!("{} ({}, {} kbps)", r.name, r.resolution, r.bitrate_kbps))
            .collect::<Vec<_>>()
            .join(", ")
    );
    for stats in engine.origin_stats() {
        info!("CDN origin: {} [{}]", stats.origin, stats.state.as_str());
    }
    for tier in AssetTier::ALL {
        let policy = engine.policy_for(tier);
        info!(
            "Tier {}: encryption={}, drm={}, hotlink_protection={}, token_ttl={}s",
            tier,
            policy.encryption_required,
            policy.drm_required,
            policy.hotlink_protection,
            policy.token_ttl.as_secs()
        );
    }

    let effective = serde_json::to_string(engine.registry())?;
    debug!("Effective configuration: {}", effective);
    info!(
        "Delivery policy ready: environment={}",
        engine.registry().environment()
    );
    Ok(())
}

fn main() {
    init_tracing();

    if let Err(e) = run() {
        error!("Delivery policy startup failed: {:#}", e);
        std::process::exit(1);
    }
}
