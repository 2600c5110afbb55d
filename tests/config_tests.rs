use medzone_api::config::{AppConfig, ConfigError, Env, MAX_TOKEN_TTL_DAYS};
use serial_test::serial;
use std::collections::HashMap;

fn from_pairs(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    AppConfig::from_lookup(|key| vars.get(key).cloned())
}

#[test]
fn test_local_defaults() {
    let config = from_pairs(&[]).unwrap();

    assert_eq!(config.env, Env::Local);
    assert_eq!(config.port, 5000);
    assert_eq!(config.token_ttl_days, 365);
    assert!(!config.jwt_secret.is_empty());
    assert!(config.stripe_secret_key.is_none());
    assert_eq!(config.stripe_api_base, "https://api.stripe.com");
    assert_eq!(
        config.cors_origins,
        vec!["http://localhost:5173", "http://localhost:5174"]
    );
}

#[test]
fn test_production_requires_secrets() {
    let err = from_pairs(&[("APP_ENV", "production")]).unwrap_err();
    assert_eq!(err, ConfigError::Missing("DATABASE_URL"));

    let err = from_pairs(&[
        ("APP_ENV", "production"),
        ("DATABASE_URL", "postgres://db/medzone"),
    ])
    .unwrap_err();
    assert_eq!(err, ConfigError::Missing("ACCESS_TOKEN_SECRET"));

    let err = from_pairs(&[
        ("APP_ENV", "production"),
        ("DATABASE_URL", "postgres://db/medzone"),
        ("ACCESS_TOKEN_SECRET", ""),
    ])
    .unwrap_err();
    assert_eq!(err, ConfigError::Missing("ACCESS_TOKEN_SECRET"));

    let err = from_pairs(&[
        ("APP_ENV", "production"),
        ("DATABASE_URL", "postgres://db/medzone"),
        ("ACCESS_TOKEN_SECRET", "prod-secret"),
    ])
    .unwrap_err();
    assert_eq!(err, ConfigError::Missing("STRIPE_SECRET_KEY"));
}

#[test]
fn test_production_with_all_secrets() {
    let config = from_pairs(&[
        ("APP_ENV", "production"),
        ("DATABASE_URL", "postgres://db/medzone"),
        ("ACCESS_TOKEN_SECRET", "prod-secret"),
        ("STRIPE_SECRET_KEY", "sk_live_123"),
        ("CORS_ORIGINS", "https://medzone.example, https://admin.medzone.example,"),
        ("PORT", "8080"),
    ])
    .unwrap();

    assert_eq!(config.env, Env::Production);
    assert_eq!(config.jwt_secret, "prod-secret");
    assert_eq!(config.port, 8080);
    assert_eq!(config.stripe_secret_key.as_deref(), Some("sk_live_123"));
    assert_eq!(
        config.cors_origins,
        vec!["https://medzone.example", "https://admin.medzone.example"]
    );
}

#[test]
fn test_invalid_numbers_are_rejected() {
    let err = from_pairs(&[("PORT", "not-a-port")]).unwrap_err();
    assert_eq!(
        err,
        ConfigError::Invalid {
            var: "PORT",
            value: "not-a-port".to_string()
        }
    );

    assert!(from_pairs(&[("PORT", "70000")]).is_err());
    assert!(from_pairs(&[("TOKEN_TTL_DAYS", "0")]).is_err());
    assert!(from_pairs(&[("TOKEN_TTL_DAYS", "-3")]).is_err());
    assert_eq!(
        from_pairs(&[("TOKEN_TTL_DAYS", "7")]).unwrap().token_ttl_days,
        7
    );
}

#[test]
fn test_token_ttl_is_bounded() {
    for huge in ["1000000000000", "36501"] {
        let err = from_pairs(&[("TOKEN_TTL_DAYS", huge)]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                var: "TOKEN_TTL_DAYS",
                value: huge.to_string()
            }
        );
    }

    let config = from_pairs(&[("TOKEN_TTL_DAYS", "36500")]).unwrap();
    assert_eq!(config.token_ttl_days, MAX_TOKEN_TTL_DAYS);
}

#[test]
#[serial]
fn test_load_reads_process_environment() {
    unsafe {
        std::env::set_var("APP_ENV", "local");
        std::env::set_var("PORT", "5055");
        std::env::set_var("ACCESS_TOKEN_SECRET", "from-env");
    }

    let config = AppConfig::load().unwrap();
    assert_eq!(config.env, Env::Local);
    assert_eq!(config.port, 5055);
    assert_eq!(config.jwt_secret, "from-env");

    unsafe {
        std::env::remove_var("APP_ENV");
        std::env::remove_var("PORT");
        std::env::remove_var("ACCESS_TOKEN_SECRET");
    }
}

#[test]
#[serial]
fn test_load_fails_fast_in_production_without_secret() {
    unsafe {
        std::env::set_var("APP_ENV", "production");
        std::env::set_var("DATABASE_URL", "postgres://db/medzone");
        std::env::remove_var("ACCESS_TOKEN_SECRET");
    }

    let result = AppConfig::load();

    unsafe {
        std::env::remove_var("APP_ENV");
        std::env::remove_var("DATABASE_URL");
    }
    assert_eq!(result.unwrap_err(), ConfigError::Missing("ACCESS_TOKEN_SECRET"));
}
