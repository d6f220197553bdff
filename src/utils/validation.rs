use crate::utils::error::{LandlordError, Result};
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn tenant_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[_\-a-zA-Z0-9]+$").expect("tenant id pattern is valid"))
}

/// Tenant ids: letters, digits, underscore and hyphen, non-empty.
pub fn is_valid_tenant_id(id: &str) -> bool {
    tenant_id_pattern().is_match(id)
}

pub fn validate_tenant_id(id: &str) -> Result<()> {
    if is_valid_tenant_id(id) {
        Ok(())
    } else {
        Err(LandlordError::validation("Invalid id."))
    }
}

pub fn validate_store_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(LandlordError::InvalidConfigValue {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "redis" | "rediss" => Ok(()),
            scheme => Err(LandlordError::InvalidConfigValue {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(LandlordError::InvalidConfigValue {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.trim().is_empty() {
        return Err(LandlordError::InvalidConfigValue {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(LandlordError::InvalidConfigValue {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

/// The whole pool `base..base+count` must be addressable TCP ports.
pub fn validate_port_range(field_name: &str, base: u32, count: u32) -> Result<()> {
    if base == 0 || count == 0 || base as u64 + count as u64 - 1 > u16::MAX as u64 {
        return Err(LandlordError::InvalidConfigValue {
            field: field_name.to_string(),
            value: format!("{}+{}", base, count),
            reason: format!("Port range must lie within 1..={}", u16::MAX),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tenant_ids() {
        assert!(is_valid_tenant_id("abc"));
        assert!(is_valid_tenant_id("tenant_01-x"));
        assert!(!is_valid_tenant_id(""));
        assert!(!is_valid_tenant_id("bad id!"));
        assert!(!is_valid_tenant_id("a:b"));
        assert!(!is_valid_tenant_id("ünïcode"));
    }

    #[test]
    fn test_validate_tenant_id_message() {
        let err = validate_tenant_id("bad id!").unwrap_err();
        assert_eq!(err.to_string(), "Invalid id.");
    }

    #[test]
    fn test_validate_store_url() {
        assert!(validate_store_url("store.url", "redis://127.0.0.1:6380").is_ok());
        assert!(validate_store_url("store.url", "rediss://cache.internal:6380").is_ok());
        assert!(validate_store_url("store.url", "").is_err());
        assert!(validate_store_url("store.url", "http://127.0.0.1").is_err());
        assert!(validate_store_url("store.url", "not a url").is_err());
    }

    #[test]
    fn test_validate_port_range() {
        assert!(validate_port_range("pool", 6381, 10).is_ok());
        assert!(validate_port_range("pool", 65535, 1).is_ok());
        assert!(validate_port_range("pool", 65535, 2).is_err());
        assert!(validate_port_range("pool", 0, 10).is_err());
    }
}
