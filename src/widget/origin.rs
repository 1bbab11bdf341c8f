//! Origin parsing and allowlist matching.

use url::Url;

use super::error::WidgetError;

/// A parsed, normalized browser origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedOrigin {
    /// `scheme://host` with nothing else.
    pub origin: String,
    /// Just the host, for allowlist matching.
    pub host: String,
}

/// Parses an origin string, accepting only `http`/`https` with a non-empty
/// host, and normalizes it to `scheme://host`.
pub fn normalize_origin(raw: &str) -> Result<NormalizedOrigin, WidgetError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(WidgetError::InvalidOrigin {
            reason: "origin is empty".to_string(),
        });
    }

    let url = Url::parse(trimmed).map_err(|e| WidgetError::InvalidOrigin {
        reason: e.to_string(),
    })?;

    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(WidgetError::InvalidOrigin {
            reason: format!("unsupported scheme '{scheme}'"),
        });
    }

    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| WidgetError::InvalidOrigin {
            reason: "origin has no host".to_string(),
        })?
        .to_ascii_lowercase();

    Ok(NormalizedOrigin {
        origin: format!("{scheme}://{host}"),
        host,
    })
}

/// Returns `true` when an allowlist entry matches a host.
///
/// An entry matches when it equals the host, or when it begins with `*.`
/// and the host ends with the suffix after the `*`. The wildcard never
/// matches the bare apex: `*.example.com` does not admit `example.com`.
pub fn domain_matches(allowed: &str, host: &str) -> bool {
    let allowed = allowed.trim().to_ascii_lowercase();
    if allowed.is_empty() {
        return false;
    }
    if let Some(suffix) = allowed.strip_prefix('*') {
        return host.ends_with(suffix) && host.len() > suffix.len();
    }
    allowed == host
}
