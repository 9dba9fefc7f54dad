//! Tracker Matcher (spec §4.1): maps a torrent's tracker URL to the first
//! configured tracker whose pattern matches it.

use std::collections::HashMap;
use std::sync::RwLock;

use regex::Regex;

use crate::config::TrackerConfigEntry;

struct CompiledTracker {
    id: String,
    pattern: Regex,
}

/// Ordered, first-match-wins matcher with a small memoization cache keyed
/// on the raw tracker URL (spec §4.1 edge case: repeated URLs are common
/// across a swarm's torrents).
pub struct TrackerMatcher {
    trackers: Vec<CompiledTracker>,
    catch_all_id: String,
    cache: RwLock<HashMap<String, String>>,
    cache_cap: usize,
}

impl TrackerMatcher {
    pub fn new(entries: &[TrackerConfigEntry], cache_cap: usize) -> Self {
        let trackers: Vec<CompiledTracker> = entries
            .iter()
            .map(|entry| CompiledTracker {
                id: entry.id.clone(),
                pattern: Regex::new(&normalize_pattern(&entry.pattern))
                    .expect("patterns are validated at config load"),
            })
            .collect();

        let catch_all_id = trackers
            .last()
            .map(|t| t.id.clone())
            .unwrap_or_default();

        Self {
            trackers,
            catch_all_id,
            cache: RwLock::new(HashMap::new()),
            cache_cap,
        }
    }

    /// Returns the id of the first tracker entry whose pattern matches
    /// `url`, falling back to the catch-all entry (always the last one,
    /// enforced at config validation).
    pub fn match_tracker(&self, url: &str) -> &str {
        if let Some(hit) = self.cache.read().unwrap().get(url) {
            return self.resolve(hit);
        }

        let matched = self
            .trackers
            .iter()
            .find(|t| t.pattern.is_match(url))
            .map(|t| t.id.as_str())
            .unwrap_or(&self.catch_all_id);

        let mut cache = self.cache.write().unwrap();
        if cache.len() >= self.cache_cap {
            cache.clear();
        }
        cache.insert(url.to_string(), matched.to_string());

        matched
    }

    /// Workaround for returning a `&str` tied to `self`'s lifetime rather
    /// than a cache guard: the id strings never change after construction,
    /// so we look them up again by reference into `self.trackers`.
    fn resolve(&self, id: &str) -> &str {
        self.trackers
            .iter()
            .find(|t| t.id == id)
            .map(|t| t.id.as_str())
            .unwrap_or(&self.catch_all_id)
    }

    pub fn catch_all_id(&self) -> &str {
        &self.catch_all_id
    }
}

/// Forgiving pattern normalization: a pattern with no anchors or wildcard
/// is wrapped as `.*<pattern>.*` so plain substrings behave as "contains"
/// matches (spec §4.1).
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

    fn entry(id: &str, pattern: &str) -> TrackerConfigEntry {
        TrackerConfigEntry {
            id: id.to_string(),
            name: id.to_string(),
            pattern: pattern.to_string(),
            max_upload_speed: 1_000_000,
            priority: 0,
        }
    }

    #[test]
    fn matches_first_pattern_in_order() {
        let matcher = TrackerMatcher::new(
            &[
                entry("alpha", "alpha\\.example\\.com"),
                entry("beta", "beta\\.example\\.com"),
                entry("catchall", ".*"),
            ],
            100,
        );
        assert_eq!(
            matcher.match_tracker("http://alpha.example.com:6969/announce"),
            "alpha"
        );
        assert_eq!(
            matcher.match_tracker("http://beta.example.com/announce"),
            "beta"
        );
    }

    #[test]
    fn falls_back_to_catch_all() {
        let matcher = TrackerMatcher::new(
            &[entry("alpha", "alpha\\.example\\.com"), entry("catchall", ".*")],
            100,
        );
        assert_eq!(
            matcher.match_tracker("http://unknown.example.org/announce"),
            "catchall"
        );
    }

    #[test]
    fn plain_substring_pattern_is_forgiving() {
        let matcher = TrackerMatcher::new(
            &[entry("alpha", "alpha"), entry("catchall", ".*")],
            100,
        );
        assert_eq!(
            matcher.match_tracker("http://tracker.alpha.example.com/announce"),
            "alpha"
        );
    }

    #[test]
    fn cache_clears_instead_of_growing_unbounded() {
        let matcher = TrackerMatcher::new(&[entry("catchall", ".*")], 2);
        matcher.match_tracker("http://a");
        matcher.match_tracker("http://b");
        matcher.match_tracker("http://c");
        assert!(matcher.cache.read().unwrap().len() <= 2);
    }
}
