use crate::config::types::{
    Config, FurAffinityConfig, InkbunnyConfig, RetrySettings, SyncConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.files.dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "files.dir cannot be empty".to_string(),
        ));
    }

    if config.database.path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "database.path cannot be empty".to_string(),
        ));
    }

    if config.http.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "http.timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.http.download_stall_secs == 0 {
        return Err(ConfigError::Validation(
            "http.download-stall-secs must be >= 1".to_string(),
        ));
    }

    validate_sync_config(&config.sync)?;

    if let Some(fa) = &config.furaffinity {
        validate_furaffinity(fa)?;
    }
    if let Some(ib) = &config.inkbunny {
        validate_inkbunny(ib)?;
    }

    Ok(())
}

/// Validates run-loop settings
fn validate_sync_config(config: &SyncConfig) -> Result<(), ConfigError> {
    if config.max_dup_count < 1 {
        return Err(ConfigError::Validation(format!(
            "max-dup-count must be >= 1, got {}",
            config.max_dup_count
        )));
    }

    if config.media_concurrency < 1 || config.media_concurrency > 16 {
        return Err(ConfigError::Validation(format!(
            "media-concurrency must be between 1 and 16, got {}",
            config.media_concurrency
        )));
    }

    Ok(())
}

fn validate_furaffinity(config: &FurAffinityConfig) -> Result<(), ConfigError> {
    if config.username.trim().is_empty() {
        return Err(ConfigError::Validation(
            "furaffinity.username cannot be empty".to_string(),
        ));
    }

    if config.cookie_a.is_empty() || config.cookie_b.is_empty() {
        return Err(ConfigError::Validation(
            "furaffinity.cookie-a and cookie-b are both required".to_string(),
        ));
    }

    validate_base_url("furaffinity", &config.base_url)?;
    validate_retry("furaffinity.listing-retry", &config.listing_retry)?;
    validate_retry("furaffinity.detail-retry", &config.detail_retry)?;
    validate_retry("furaffinity.download-retry", &config.download_retry)?;
    Ok(())
}

fn validate_inkbunny(config: &InkbunnyConfig) -> Result<(), ConfigError> {
    let has_login = config.username.is_some() && config.password.is_some();
    let has_session = config.sid.is_some() && config.user_id.is_some();

    if !has_login && !has_session {
        return Err(ConfigError::Validation(
            "inkbunny needs either username/password or sid/user-id".to_string(),
        ));
    }

    validate_base_url("inkbunny", &config.base_url)?;
    validate_retry("inkbunny.listing-retry", &config.listing_retry)?;
    validate_retry("inkbunny.detail-retry", &config.detail_retry)?;
    validate_retry("inkbunny.download-retry", &config.download_retry)?;
    Ok(())
}

fn validate_base_url(section: &str, base_url: &str) -> Result<(), ConfigError> {
    let url = Url::parse(base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {}.base-url: {}", section, e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "{}.base-url must be http(s), got '{}'",
            section, base_url
        )));
    }

    Ok(())
}

fn validate_retry(name: &str, retry: &RetrySettings) -> Result<(), ConfigError> {
    if retry.attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "{}.attempts must be >= 1, got {}",
            name, retry.attempts
        )));
    }
    Ok(())
}
