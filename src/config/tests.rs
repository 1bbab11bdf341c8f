use super::*;
use serial_test::serial;
use std::env;
use std::net::IpAddr;

fn with_env_vars<F, R>(vars: &[(&str, &str)], f: F) -> R
where
    F: FnOnce() -> R,
{
    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for (key, value) in vars {
        unsafe { env::set_var(key, value) };
    }

    let result = f();

    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    for (key, _) in vars {
        unsafe { env::remove_var(key) };
    }

    result
}

fn clear_visage_env() {
    // SAFETY: Test code only, we accept the thread-safety risk in tests.
    unsafe {
        env::remove_var("PORT");
        env::remove_var("BIND_ADDR");
        env::remove_var("ENV");
        env::remove_var("DATABASE_URL");
        env::remove_var("PROVIDER_TYPE");
        env::remove_var("PROVIDER_BASE_URL");
        env::remove_var("PROVIDER_REGION");
        env::remove_var("PROVIDER_COLLECTION_PREFIX");
        env::remove_var("PROVIDER_TIMEOUT_SECS");
        env::remove_var("API_KEY_SECRET");
        env::remove_var("ADMIN_TOKEN");
    }
}

const REQUIRED: &[(&str, &str)] = &[
    ("DATABASE_URL", "postgres://localhost/visage"),
    ("API_KEY_SECRET", "test-secret"),
];

#[test]
fn test_default_config() {
    let config = Config::default();

    assert_eq!(config.port, 3000);
    assert_eq!(config.bind_addr, IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0)));
    assert_eq!(config.environment, Environment::Development);
    assert_eq!(config.provider_type, ProviderType::Local);
    assert_eq!(config.provider_collection_prefix, "visage");
    assert_eq!(config.provider_timeout, Duration::from_secs(5));
    assert!(config.admin_token.is_none());
}

#[test]
fn test_socket_addr() {
    let config = Config {
        port: 8443,
        bind_addr: IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
        ..Default::default()
    };
    assert_eq!(config.socket_addr(), "127.0.0.1:8443");
}

#[test]
#[serial]
fn test_from_env_with_required_only() {
    clear_visage_env();

    let config = with_env_vars(REQUIRED, || Config::from_env().expect("should load"));

    assert_eq!(config.port, 3000);
    assert_eq!(config.database_url, "postgres://localhost/visage");
    assert_eq!(config.api_key_secret, "test-secret");
    assert_eq!(config.provider_type, ProviderType::Local);
}

#[test]
#[serial]
fn test_from_env_missing_database_url() {
    clear_visage_env();

    let err = with_env_vars(&[("API_KEY_SECRET", "s")], || {
        Config::from_env().expect_err("should fail")
    });

    assert!(matches!(
        err,
        ConfigError::MissingEnvVar {
            name: "DATABASE_URL"
        }
    ));
}

#[test]
#[serial]
fn test_from_env_missing_api_key_secret() {
    clear_visage_env();

    let err = with_env_vars(&[("DATABASE_URL", "postgres://x/y")], || {
        Config::from_env().expect_err("should fail")
    });

    assert!(matches!(
        err,
        ConfigError::MissingEnvVar {
            name: "API_KEY_SECRET"
        }
    ));
}

#[test]
#[serial]
fn test_from_env_full() {
    clear_visage_env();

    let vars = [
        ("DATABASE_URL", "postgres://localhost/visage"),
        ("API_KEY_SECRET", "test-secret"),
        ("PORT", "8081"),
        ("ENV", "production"),
        ("PROVIDER_TYPE", "cloud"),
        ("PROVIDER_BASE_URL", "https://faces.example.com"),
        ("PROVIDER_REGION", "eu-west-1"),
        ("PROVIDER_COLLECTION_PREFIX", "acme"),
        ("PROVIDER_TIMEOUT_SECS", "9"),
        ("ADMIN_TOKEN", "sekrit"),
    ];

    let config = with_env_vars(&vars, || Config::from_env().expect("should load"));

    assert_eq!(config.port, 8081);
    assert_eq!(config.environment, Environment::Production);
    assert_eq!(config.provider_type, ProviderType::Cloud);
    assert_eq!(
        config.provider_base_url.as_deref(),
        Some("https://faces.example.com")
    );
    assert_eq!(config.provider_region.as_deref(), Some("eu-west-1"));
    assert_eq!(config.provider_collection_prefix, "acme");
    assert_eq!(config.provider_timeout, Duration::from_secs(9));
    assert_eq!(config.admin_token.as_deref(), Some("sekrit"));
}

#[test]
#[serial]
fn test_invalid_port_zero() {
    clear_visage_env();

    let mut vars = REQUIRED.to_vec();
    vars.push(("PORT", "0"));
    let err = with_env_vars(&vars, || Config::from_env().expect_err("should fail"));

    assert!(matches!(err, ConfigError::InvalidPort { .. }));
}

#[test]
#[serial]
fn test_invalid_environment() {
    clear_visage_env();

    let mut vars = REQUIRED.to_vec();
    vars.push(("ENV", "staging"));
    let err = with_env_vars(&vars, || Config::from_env().expect_err("should fail"));

    assert!(matches!(err, ConfigError::InvalidEnvironment { .. }));
}

#[test]
#[serial]
fn test_invalid_provider_type() {
    clear_visage_env();

    let mut vars = REQUIRED.to_vec();
    vars.push(("PROVIDER_TYPE", "onprem"));
    let err = with_env_vars(&vars, || Config::from_env().expect_err("should fail"));

    assert!(matches!(err, ConfigError::InvalidProviderType { .. }));
}

#[test]
fn test_validate_requires_base_url_for_local() {
    let config = Config {
        database_url: "postgres://x/y".into(),
        api_key_secret: "s".into(),
        ..Default::default()
    };

    let err = config.validate().expect_err("should fail");
    assert!(matches!(
        err,
        ConfigError::MissingProviderOption {
            provider: "local",
            ..
        }
    ));
}

#[test]
fn test_validate_mock_needs_no_base_url() {
    let config = Config {
        database_url: "postgres://x/y".into(),
        api_key_secret: "s".into(),
        provider_type: ProviderType::Mock,
        ..Default::default()
    };

    assert!(config.validate().is_ok());
}
