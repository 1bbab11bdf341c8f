//! Tenant policy extraction.
//!
//! Settings live as loosely-typed JSON on the tenant row; this module is
//! the single place that turns them into typed policy with defaults. The
//! extraction is pure and runs once per request.

use serde_json::Value;

/// Security posture of a tenant's face operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecurityLevel {
    /// Default checks.
    #[default]
    Standard,
    /// Stricter thresholds recommended; no extra hot-path gates.
    Elevated,
    /// Liveness enforced on every search.
    Maximum,
}

impl SecurityLevel {
    fn parse(value: &str) -> Self {
        match value {
            "elevated" => Self::Elevated,
            "maximum" => Self::Maximum,
            _ => Self::Standard,
        }
    }
}

/// Typed per-tenant policy with defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct TenantSettings {
    /// 1:1 verification acceptance threshold.
    pub verification_threshold: f32,
    /// Default 1:N search threshold.
    pub search_threshold: f32,
    /// Default 1:N result cap.
    pub search_max_results: u32,
    /// Searches per minute; zero disables limiting.
    pub search_rate_limit: i64,
    /// Whether 1:N search is available at all.
    pub search_enabled: bool,
    /// Whether registration requires passing liveness.
    pub require_liveness: bool,
    /// Liveness acceptance threshold.
    pub liveness_threshold: f32,
    /// Security posture.
    pub security_level: SecurityLevel,
    /// Registered-face quota; zero means unlimited.
    pub max_faces: i64,
}

impl Default for TenantSettings {
    fn default() -> Self {
        Self {
            verification_threshold: 0.8,
            search_threshold: 0.8,
            search_max_results: 10,
            search_rate_limit: 30,
            search_enabled: true,
            require_liveness: false,
            liveness_threshold: 0.8,
            security_level: SecurityLevel::Standard,
            max_faces: 0,
        }
    }
}

impl TenantSettings {
    /// Extracts typed settings from the tenant's JSON, applying defaults
    /// for absent or malformed fields. Thresholds are clamped into `[0,1]`.
    pub fn from_json(settings: &Value) -> Self {
        let defaults = Self::default();

        Self {
            verification_threshold: threshold_field(
                settings,
                "verification_threshold",
                defaults.verification_threshold,
            ),
            search_threshold: threshold_field(settings, "search_threshold", defaults.search_threshold),
            search_max_results: settings
                .get("search_max_results")
                .and_then(Value::as_u64)
                .map(|v| v as u32)
                .unwrap_or(defaults.search_max_results),
            search_rate_limit: settings
                .get("search_rate_limit")
                .and_then(Value::as_i64)
                .unwrap_or(defaults.search_rate_limit),
            search_enabled: settings
                .get("search_enabled")
                .and_then(Value::as_bool)
                .unwrap_or(defaults.search_enabled),
            require_liveness: settings
                .get("require_liveness")
                .and_then(Value::as_bool)
                .unwrap_or(defaults.require_liveness),
            liveness_threshold: threshold_field(
                settings,
                "liveness_threshold",
                defaults.liveness_threshold,
            ),
            security_level: settings
                .get("security_level")
                .and_then(Value::as_str)
                .map(SecurityLevel::parse)
                .unwrap_or(defaults.security_level),
            max_faces: settings
                .get("max_faces")
                .and_then(Value::as_i64)
                .unwrap_or(defaults.max_faces),
        }
    }
}

fn threshold_field(settings: &Value, field: &str, default: f32) -> f32 {
    settings
        .get(field)
        .and_then(Value::as_f64)
        .map(|v| (v as f32).clamp(0.0, 1.0))
        .unwrap_or(default)
}
