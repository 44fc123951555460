use super::schema::Config;

/// Validate configuration at startup.
/// Returns all validation errors at once (not just the first).
pub fn validate_config(config: &Config) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if config.tenant_id.trim().is_empty() {
        errors.push("tenant_id: must not be empty".to_string());
    } else if config.tenant_id.contains('/') {
        errors.push(format!("tenant_id: '{}' must not contain '/'", config.tenant_id));
    }

    if config.page_type.trim().is_empty() {
        errors.push("page_type: must not be empty".to_string());
    }

    if let Some(ref api) = config.api {
        if !(api.base_url.starts_with("http://") || api.base_url.starts_with("https://")) {
            errors.push(format!(
                "api.base_url: '{}' must start with http:// or https://",
                api.base_url
            ));
        }
        if let Some(ref timeout) = api.timeout {
            if let Err(e) = humantime::parse_duration(timeout) {
                errors.push(format!("api.timeout: invalid duration '{}' - {}", timeout, e));
            }
        }
        if api.retries == Some(0) {
            errors.push("api.retries: must be at least 1".to_string());
        }
    }

    if config.pricing.max_concurrent_updates == Some(0) {
        errors.push("pricing.max_concurrent_updates: must be at least 1".to_string());
    }

    if let Some(ref timeout) = config.pricing.update_timeout {
        if let Err(e) = humantime::parse_duration(timeout) {
            errors.push(format!(
                "pricing.update_timeout: invalid duration '{}' - {}",
                timeout, e
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
