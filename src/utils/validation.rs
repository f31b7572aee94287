use crate::utils::error::{AssignError, Result};
use std::collections::HashSet;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(AssignError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(AssignError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(AssignError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

/// Paths are joined onto the front end's origin, so they must be absolute.
pub fn validate_route(field_name: &str, route: &str) -> Result<()> {
    if !route.starts_with('/') || route.contains('?') || route.contains('#') {
        return Err(AssignError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: route.to_string(),
            reason: "Route must start with '/' and carry no query or fragment".to_string(),
        });
    }
    Ok(())
}

/// Status lists must be non-empty and free of blank or duplicate entries
/// (compared case-insensitively, the way statuses are matched).
pub fn validate_status_list(field_name: &str, statuses: &[String]) -> Result<()> {
    if statuses.is_empty() {
        return Err(AssignError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: "[]".to_string(),
            reason: "At least one status is required".to_string(),
        });
    }

    let mut seen = HashSet::new();
    for status in statuses {
        validate_non_empty_string(field_name, status)?;
        if !seen.insert(status.trim().to_uppercase()) {
            return Err(AssignError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: status.clone(),
                reason: "Duplicate status".to_string(),
            });
        }
    }
    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AssignError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(AssignError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("registry.base_url", "https://example.com/api").is_ok());
        assert!(validate_url("registry.base_url", "http://localhost:8080/api").is_ok());
        assert!(validate_url("registry.base_url", "").is_err());
        assert!(validate_url("registry.base_url", "invalid-url").is_err());
        assert!(validate_url("registry.base_url", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_route() {
        assert!(validate_route("workflow.map_path", "/vagas/mapa").is_ok());
        assert!(validate_route("workflow.map_path", "vagas/mapa").is_err());
        assert!(validate_route("workflow.map_path", "/vagas/mapa?x=1").is_err());
    }

    #[test]
    fn test_validate_status_list() {
        let ok = vec!["L".to_string(), "LIVRE".to_string()];
        assert!(validate_status_list("workflow.free_slot_statuses", &ok).is_ok());

        let dup = vec!["L".to_string(), "l".to_string()];
        assert!(validate_status_list("workflow.free_slot_statuses", &dup).is_err());

        let blank = vec!["  ".to_string()];
        assert!(validate_status_list("workflow.free_slot_statuses", &blank).is_err());

        assert!(validate_status_list("workflow.free_slot_statuses", &[]).is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("registry.timeout_seconds", 30, 1, 300).is_ok());
        assert!(validate_range("registry.timeout_seconds", 0, 1, 300).is_err());
    }
}
