//! Adaptive video delivery policy engine
//!
//! Decides which encoded quality to stream for a bandwidth estimate, how to
//! partition an upload into chunks, which CDN origins to try and in what
//! order, and what protection each asset tier requires. Transport, encoding
//! and token cryptography stay with the caller.

pub mod abr;
pub mod cdn;
pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod ladder;
pub mod models;
pub mod security;
pub mod upload;

pub use abr::{AbrReason, AdaptiveSelector, HysteresisSelector, QualityDecision};
pub use cdn::{CdnResolver, OriginState, OriginStats};
pub use config::{ConfigRegistry, ConfigSource, EnvSource, Environment};
pub use engine::{DeliveryEngine, PlaybackPlan};
pub use error::{ConfigurationError, DeliveryError, Result, ValidationError};
pub use ladder::QualityLadder;
pub use models::*;
pub use security::{SecurityPolicy, SecurityPolicyEngine, TokenContract};
pub use upload::{ChunkOutcome, ChunkRange, UploadPartitioner, UploadPlan, UploadProgress, UploadStatus};

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[test]
    fn test_default_registry_builds_engine() {
        let registry = ConfigRegistry::load(&HashMap::<String, String>::new()).unwrap();
        let engine = DeliveryEngine::from_registry(Arc::new(registry)).unwrap();

        assert_eq!(engine.ladder().len(), 6);
        assert_eq!(engine.ladder().highest().unwrap().name, "2160p");
        assert_eq!(engine.origin_stats().len(), 1);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_startup_info_logs_emitted_once() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_target(false)
            .without_time()
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let registry = ConfigRegistry::load(&HashMap::<String, String>::new()).unwrap();
            DeliveryEngine::from_registry(Arc::new(registry)).unwrap();
        });

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert!(!lines.is_empty());
        for (i, line) in lines.iter().enumerate() {
            assert!(!lines[i + 1..].contains(line), "repeated log line: {}", line);
        }
        assert!(!output.contains("Quality ladder"));
        assert!(!output.contains("Security policy"));
    }

    #[test]
    fn test_rendition_serialization() {
        let rendition = Rendition::new("720p", Resolution::new(1280, 720), 5000, 30, "h264");
        let json = serde_json::to_value(&rendition).unwrap();
        assert_eq!(json["bitrate_kbps"], 5000);
        assert_eq!(json["resolution"]["height"], 720);
    }
}
