use delivery_policy::{ConfigRegistry, ConfigurationError, DeliveryEngine, Environment};
use serial_test::serial;
use std::sync::Arc;

const KEYS: &[&str] = &[
    "APP_ENV",
    "CDN_ORIGINS",
    "DRM_LICENSE_URL",
    "HOTLINK_ALLOWED_DOMAINS",
    "UPLOAD_MAX_CONCURRENT",
    "TOKEN_TTL_SECONDS",
];

fn with_env(vars: &[(&str, &str)], test: impl FnOnce()) {
    for key in KEYS {
        std::env::remove_var(key);
    }
    for (key, value) in vars {
        std::env::set_var(key, value);
    }
    test();
    for key in KEYS {
        std::env::remove_var(key);
    }
}

#[test]
#[serial]
fn test_from_env_production() {
    with_env(
        &[
            ("APP_ENV", "production"),
            (
                "CDN_ORIGINS",
                "https://cdn-a.example.com, https://cdn-b.example.com",
            ),
            ("DRM_LICENSE_URL", "https://drm.example.com/license"),
            ("HOTLINK_ALLOWED_DOMAINS", "learn.example.com,*.learn.example.com"),
            ("UPLOAD_MAX_CONCURRENT", "8"),
        ],
        || {
            let registry = ConfigRegistry::from_env().unwrap();
            assert_eq!(registry.environment(), Environment::Production);
            assert_eq!(registry.upload().max_concurrent_uploads, 8);

            let engine = DeliveryEngine::from_registry(Arc::new(registry)).unwrap();
            let ordering: Vec<String> = engine
                .origin_stats()
                .into_iter()
                .map(|s| s.origin)
                .collect();
            assert_eq!(
                ordering,
                vec!["https://cdn-a.example.com", "https://cdn-b.example.com"]
            );
        },
    );
}

#[test]
#[serial]
fn test_from_env_unknown_environment() {
    with_env(&[("APP_ENV", "staging")], || {
        assert_eq!(
            ConfigRegistry::from_env().unwrap_err(),
            ConfigurationError::UnknownEnvironment("staging".to_string())
        );
    });
}

#[test]
#[serial]
fn test_from_env_malformed_value() {
    with_env(&[("APP_ENV", "test"), ("TOKEN_TTL_SECONDS", "an hour")], || {
        let err = ConfigRegistry::from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::InvalidValue { ref key, .. } if key == "TOKEN_TTL_SECONDS"
        ));
    });
}
