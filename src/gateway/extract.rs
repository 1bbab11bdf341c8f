//! Multipart extraction and per-request validation.

use std::collections::HashMap;

use axum::extract::Multipart;
use axum::http::HeaderMap;
use uuid::Uuid;

use super::error::GatewayError;
use crate::constants::MAX_EXTERNAL_ID_LEN;
use crate::provider::validate_image;
use crate::service::ServiceError;

/// All parts of a multipart body, keyed by field name.
pub struct FormFields {
    fields: HashMap<String, Vec<u8>>,
}

impl FormFields {
    /// Drains a multipart stream into memory.
    pub async fn collect(mut multipart: Multipart) -> Result<Self, GatewayError> {
        let mut fields = HashMap::new();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| GatewayError::Body {
                message: e.to_string(),
            })?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            let bytes = field.bytes().await.map_err(|e| GatewayError::Body {
                message: e.to_string(),
            })?;
            fields.insert(name, bytes.to_vec());
        }
        Ok(Self { fields })
    }

    /// A required UTF-8 text field.
    pub fn require_text(&self, name: &str) -> Result<String, GatewayError> {
        let bytes = self.fields.get(name).ok_or_else(|| GatewayError::Validation {
            message: format!("missing field '{name}'"),
        })?;
        let text = std::str::from_utf8(bytes)
            .map_err(|_| GatewayError::Validation {
                message: format!("field '{name}' is not valid UTF-8"),
            })?
            .trim()
            .to_string();
        if text.is_empty() {
            return Err(GatewayError::Validation {
                message: format!("field '{name}' is empty"),
            });
        }
        Ok(text)
    }

    /// A required image part, validated against the provider size bounds.
    pub fn require_image(&self, name: &str) -> Result<&[u8], GatewayError> {
        let bytes = self.fields.get(name).ok_or_else(|| GatewayError::Validation {
            message: format!("missing field '{name}'"),
        })?;
        validate_image(bytes).map_err(|e| match e {
            crate::provider::ProviderError::InvalidImage { reason } => {
                GatewayError::Service(ServiceError::InvalidImage { reason })
            }
            other => GatewayError::Validation {
                message: other.to_string(),
            },
        })?;
        Ok(bytes)
    }
}

/// Validates an external id: non-empty, within length limits.
pub fn validate_external_id(external_id: &str) -> Result<(), GatewayError> {
    if external_id.is_empty() {
        return Err(GatewayError::Validation {
            message: "external_id is empty".to_string(),
        });
    }
    if external_id.len() > MAX_EXTERNAL_ID_LEN {
        return Err(GatewayError::Validation {
            message: format!(
                "external_id too long: {} chars (maximum {})",
                external_id.len(),
                MAX_EXTERNAL_ID_LEN
            ),
        });
    }
    Ok(())
}

/// Parses a widget session token. Unparseable tokens are just invalid
/// credentials, not validation errors.
pub fn parse_session_id(raw: &str) -> Result<Uuid, GatewayError> {
    Uuid::parse_str(raw.trim()).map_err(|_| GatewayError::MissingCredentials)
}

/// Best-effort caller address for audit rows.
pub fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
