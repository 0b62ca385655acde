use crate::assets::AssetCategory;
use crate::config::FilterConfig;
use crate::ConfigError;
use regex::Regex;

/// Admission rules applied to every asset before it is persisted
///
/// The category and pattern check runs once response headers are known;
/// the size check runs after the body has been read.
#[derive(Debug, Clone, Default)]
pub struct AssetFilter {
    include_types: Vec<AssetCategory>,
    exclude_types: Vec<AssetCategory>,
    include_patterns: Vec<Regex>,
    exclude_patterns: Vec<Regex>,
    min_size: Option<u64>,
    max_size: Option<u64>,
}

impl AssetFilter {
    /// Compiles the configured rules
    pub fn from_config(config: &FilterConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            include_types: config.include_types.clone(),
            exclude_types: config.exclude_types.clone(),
            include_patterns: compile(&config.include_patterns)?,
            exclude_patterns: compile(&config.exclude_patterns)?,
            min_size: config.min_size,
            max_size: config.max_size,
        })
    }

    /// Filter that admits everything
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Checks category and URL pattern rules
    ///
    /// # Rules (in order)
    ///
    /// 1. A non-empty include-type list must contain `category`
    /// 2. `category` must not be excluded
    /// 3. No exclude pattern may match `url`
    /// 4. A non-empty include-pattern list must have a match
    pub fn admits(&self, url: &str, category: AssetCategory) -> bool {
        if !self.include_types.is_empty() && !self.include_types.contains(&category) {
            return false;
        }

        if self.exclude_types.contains(&category) {
            return false;
        }

        if self.exclude_patterns.iter().any(|re| re.is_match(url)) {
            return false;
        }

        if !self.include_patterns.is_empty() {
            return self.include_patterns.iter().any(|re| re.is_match(url));
        }

        true
    }

    /// Checks the configured size bounds against a body length
    pub fn admits_size(&self, len: u64) -> bool {
        if self.min_size.is_some_and(|min| len < min) {
            return false;
        }
        if self.max_size.is_some_and(|max| len > max) {
            return false;
        }
        true
    }
}

fn compile(patterns: &[String]) -> Result<Vec<Regex>, ConfigError> {
    patterns
        .iter()
        .map(|p| Regex::new(p).map_err(|e| ConfigError::InvalidPattern(format!("'{}': {}", p, e))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(config: FilterConfig) -> AssetFilter {
        AssetFilter::from_config(&config).unwrap()
    }

    #[test]
    fn test_allow_all() {
        let f = AssetFilter::allow_all();
        for category in AssetCategory::ALL {
            assert!(f.admits("https://x.test/a", category));
        }
        assert!(f.admits_size(0));
        assert!(f.admits_size(u64::MAX));
    }

    #[test]
    fn test_include_types() {
        let f = filter(FilterConfig {
            include_types: vec![AssetCategory::Css, AssetCategory::Image],
            ..Default::default()
        });
        assert!(f.admits("https://x.test/s.css", AssetCategory::Css));
        assert!(!f.admits("https://x.test/a.js", AssetCategory::Js));
    }

    #[test]
    fn test_exclude_types() {
        let f = filter(FilterConfig {
            exclude_types: vec![AssetCategory::Media],
            ..Default::default()
        });
        assert!(!f.admits("https://x.test/v.mp4", AssetCategory::Media));
        assert!(f.admits("https://x.test/a.png", AssetCategory::Image));
    }

    #[test]
    fn test_exclude_pattern_beats_include_pattern() {
        let f = filter(FilterConfig {
            include_patterns: vec!["/static/".to_string()],
            exclude_patterns: vec![r"\.map$".to_string()],
            ..Default::default()
        });
        assert!(f.admits("https://x.test/static/app.js", AssetCategory::Js));
        assert!(!f.admits("https://x.test/static/app.js.map", AssetCategory::Other));
        assert!(!f.admits("https://x.test/other/app.js", AssetCategory::Js));
    }

    #[test]
    fn test_size_bounds() {
        let f = filter(FilterConfig {
            min_size: Some(10),
            max_size: Some(1024),
            ..Default::default()
        });
        assert!(!f.admits_size(9));
        assert!(f.admits_size(10));
        assert!(f.admits_size(1024));
        assert!(!f.admits_size(2048));
    }

    #[test]
    fn test_invalid_pattern() {
        let result = AssetFilter::from_config(&FilterConfig {
            include_patterns: vec!["(".to_string()],
            ..Default::default()
        });
        assert!(matches!(result, Err(ConfigError::InvalidPattern(_))));
    }
}
