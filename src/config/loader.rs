//! YAML config loading with `${VAR}` environment substitution.

use std::path::Path;

use super::model::Config;
use crate::error::{AppError, Result};

/// Replace `${VAR}` occurrences in `input` with the value of the matching
/// environment variable. Unset variables are left as-is so a typo surfaces
/// as a YAML parse error rather than silently becoming an empty string.
pub fn substitute_env(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.char_indices().peekable();
    let bytes = input.as_bytes();

    while let Some((i, c)) = chars.next() {
        if c == '$' && bytes.get(i + 1) == Some(&b'{') {
            if let Some(end) = input[i + 2..].find('}') {
                let var_name = &input[i + 2..i + 2 + end];
                match std::env::var(var_name) {
                    Ok(value) => {
                        out.push_str(&value);
                        for _ in 0..(end + 2) {
                            chars.next();
                        }
                        continue;
                    }
                    Err(_) => {
                        out.push_str(&input[i..i + 3 + end]);
                        for _ in 0..(end + 2) {
                            chars.next();
                        }
                        continue;
                    }
                }
            }
        }
        out.push(c);
    }

    out
}

/// Load and parse the YAML config at `path`, applying `${VAR}` substitution
/// first.
pub fn load(path: impl AsRef<Path>) -> Result<Config> {
    let raw = std::fs::read_to_string(path.as_ref()).map_err(|e| {
        AppError::Config(format!("reading {}: {e}", path.as_ref().display()))
    })?;
    let expanded = substitute_env(&raw);
    let config: Config = serde_yaml::from_str(&expanded)?;
    super::validate::validate(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_known_var() {
        unsafe { std::env::set_var("QGUARDARR_TEST_VAR", "hunter2") };
        let out = substitute_env("password: ${QGUARDARR_TEST_VAR}");
        assert_eq!(out, "password: hunter2");
    }

    #[test]
    fn leaves_unknown_var_untouched() {
        let out = substitute_env("password: ${QGUARDARR_DEFINITELY_UNSET_VAR}");
        assert_eq!(out, "password: ${QGUARDARR_DEFINITELY_UNSET_VAR}");
    }

    #[test]
    fn load_rejects_missing_file() {
        let result = load("/nonexistent/path/config.yaml");
        assert!(result.is_err());
    }

    #[test]
    fn load_parses_minimal_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(
            &path,
            r#"
qbittorrent:
  host: localhost
  port: 8080
  username: admin
  password: adminadmin
trackers:
  - id: catchall
    name: Everything Else
    pattern: ".*"
    max_upload_speed: 1000000
"#,
        )
        .unwrap();

        let config = load(&path).unwrap();
        assert_eq!(config.qbittorrent.port, 8080);
        assert_eq!(config.trackers.len(), 1);
        assert_eq!(config.global.update_interval, 300);
    }
}
