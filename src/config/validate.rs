//! Config validation (spec §4.1 invariant iv, §6).

use super::model::Config;
use crate::error::{AppError, Result};

/// Validate a freshly parsed config. Called by [`super::loader::load`] and
/// again on every `/config/reload`.
pub fn validate(config: &Config) -> Result<()> {
    if config.trackers.is_empty() {
        return Err(AppError::Config(
            "trackers list must not be empty".to_string(),
        ));
    }

    let last = config.trackers.last().unwrap();
    if !is_catch_all(&last.pattern) {
        return Err(AppError::Config(format!(
            "last tracker entry ({}) must be a catch-all pattern matching any url",
            last.id
        )));
    }

    let mut seen_ids = std::collections::HashSet::new();
    for tracker in &config.trackers {
        if !seen_ids.insert(tracker.id.as_str()) {
            return Err(AppError::Config(format!(
                "duplicate tracker id: {}",
                tracker.id
            )));
        }
        if tracker.max_upload_speed != -1 && tracker.max_upload_speed <= 0 {
            return Err(AppError::Config(format!(
                "tracker {} max_upload_speed must be positive, or -1 for unlimited",
                tracker.id
            )));
        }
        regex::Regex::new(&normalize_pattern(&tracker.pattern)).map_err(|e| {
            AppError::Config(format!("tracker {} has invalid pattern: {e}", tracker.id))
        })?;
    }

    if config.global.rollout_percentage > 100 {
        return Err(AppError::Config(
            "global.rollout_percentage must be between 0 and 100".to_string(),
        ));
    }

    if config.global.update_interval == 0 {
        return Err(AppError::Config(
            "global.update_interval must be greater than zero".to_string(),
        ));
    }

    if config.global.differential_threshold < 0.0 {
        return Err(AppError::Config(
            "global.differential_threshold must not be negative".to_string(),
        ));
    }

    if config.global.dry_run && config.global.dry_run_store_path.is_none() {
        return Err(AppError::Config(
            "global.dry_run_store_path is required when global.dry_run is true".to_string(),
        ));
    }

    if config.cross_seed.enabled && config.cross_seed.url.is_none() {
        return Err(AppError::Config(
            "cross_seed.url is required when cross_seed.enabled is true".to_string(),
        ));
    }

    Ok(())
}

/// A pattern counts as catch-all if, once normalized, it matches any string.
fn is_catch_all(pattern: &str) -> bool {
    matches!(pattern.trim(), ".*" | "^.*$" | ".+" | "^.+$")
}

/// Mirror of the matcher's forgiving normalization, used so validation
/// rejects the same patterns the matcher would refuse to compile.
pub(crate) fn normalize_pattern(pattern: &str) -> String {
    let trimmed = pattern.trim();
    if trimmed.starts_with('^') || trimmed.ends_with('$') || trimmed.contains(".*") {
        trimmed.to_string()
    } else {
        format!(".*{trimmed}.*")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::{GlobalConfig, QbitConfig, TrackerConfigEntry};

    fn base_config(trackers: Vec<TrackerConfigEntry>) -> Config {
        Config {
            global: GlobalConfig::default(),
            qbittorrent: QbitConfig {
                host: "localhost".to_string(),
                port: 8080,
                username: "admin".to_string(),
                password: "adminadmin".to_string(),
            },
            trackers,
            cross_seed: Default::default(),
            rollback: Default::default(),
            logging: Default::default(),
        }
    }

    #[test]
    fn rejects_missing_catch_all() {
        let config = base_config(vec![TrackerConfigEntry {
            id: "a".to_string(),
            name: "A".to_string(),
            pattern: "tracker\\.example\\.com".to_string(),
            max_upload_speed: 1000,
            priority: 0,
        }]);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn accepts_trailing_catch_all() {
        let config = base_config(vec![
            TrackerConfigEntry {
                id: "a".to_string(),
                name: "A".to_string(),
                pattern: "tracker\\.example\\.com".to_string(),
                max_upload_speed: 1000,
                priority: 0,
            },
            TrackerConfigEntry {
                id: "catchall".to_string(),
                name: "Catch All".to_string(),
                pattern: ".*".to_string(),
                max_upload_speed: 500,
                priority: 0,
            },
        ]);
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn accepts_unlimited_catch_all() {
        let config = base_config(vec![TrackerConfigEntry {
            id: "catchall".to_string(),
            name: "Catch All".to_string(),
            pattern: ".*".to_string(),
            max_upload_speed: -1,
            priority: 0,
        }]);
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn rejects_zero_max_upload_speed() {
        let config = base_config(vec![TrackerConfigEntry {
            id: "catchall".to_string(),
            name: "Catch All".to_string(),
            pattern: ".*".to_string(),
            max_upload_speed: 0,
            priority: 0,
        }]);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn rejects_duplicate_ids() {
        let config = base_config(vec![
            TrackerConfigEntry {
                id: "dup".to_string(),
                name: "A".to_string(),
                pattern: "a".to_string(),
                max_upload_speed: 1000,
                priority: 0,
            },
            TrackerConfigEntry {
                id: "dup".to_string(),
                name: "B".to_string(),
                pattern: ".*".to_string(),
                max_upload_speed: 1000,
                priority: 0,
            },
        ]);
        assert!(validate(&config).is_err());
    }
}
