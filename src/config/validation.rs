use crate::config::types::{Config, CrawlerConfig, FilterConfig, ScheduleConfig, SiteConfig};
use crate::schedule::parse_interval;
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_site_config(&config.site)?;
    validate_crawler_config(&config.crawler)?;
    validate_filter_config(&config.filter)?;
    validate_schedule_config(&config.schedule)?;
    Ok(())
}

/// Validates the seed URL and output locations
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    let seed = Url::parse(&config.seed_url).map_err(|e| {
        ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", config.seed_url, e))
    })?;

    if seed.scheme() != "http" && seed.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "Seed URL '{}' must use http or https",
            config.seed_url
        )));
    }

    if seed.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "Seed URL '{}' has no host",
            config.seed_url
        )));
    }

    if config.output_dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "output_dir cannot be empty".to_string(),
        ));
    }

    for asset in &config.supplementary_assets {
        if asset.trim().is_empty() {
            return Err(ConfigError::Validation(
                "supplementary asset entries cannot be empty".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.workers < 1 || config.workers > 64 {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and 64, got {}",
            config.workers
        )));
    }

    if config.timeout_secs < 1 || config.timeout_secs > 600 {
        return Err(ConfigError::Validation(format!(
            "timeout_secs must be between 1 and 600, got {}",
            config.timeout_secs
        )));
    }

    Ok(())
}

/// Validates asset filter rules
///
/// Patterns are compiled, and rejected, once by `AssetFilter::from_config`.
fn validate_filter_config(config: &FilterConfig) -> Result<(), ConfigError> {
    if let (Some(min), Some(max)) = (config.min_size, config.max_size) {
        if min > max {
            return Err(ConfigError::Validation(format!(
                "min_size ({}) cannot exceed max_size ({})",
                min, max
            )));
        }
    }

    Ok(())
}

fn validate_schedule_config(config: &ScheduleConfig) -> Result<(), ConfigError> {
    if let Some(interval) = &config.interval {
        if parse_interval(interval).is_none() {
            return Err(ConfigError::Validation(format!(
                "schedule interval '{}' must look like 30m, 6h or 1d",
                interval
            )));
        }
    }
    Ok(())
}
