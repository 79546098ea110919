//! Client secret loading.
//!
//! The provider client secret lives outside the repository, either in the
//! `STRAVA_CLIENT_SECRET` environment variable or in a small YAML file with a
//! single `secret` key. Loading never fails the process: any problem is
//! logged and yields an empty secret, which keeps the server up but makes
//! later token exchanges fail with a configuration error.

use std::env;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::warn;

/// Shape of the on-disk secret file.
#[derive(Debug, Deserialize)]
struct SecretFile {
    #[serde(default)]
    secret: String,
}

/// Resolve the provider client secret from the environment or from `path`.
#[must_use]
pub fn load_client_secret(path: &str) -> String {
    resolve_client_secret(env::var("STRAVA_CLIENT_SECRET").ok(), path)
}

fn resolve_client_secret(env_value: Option<String>, path: &str) -> String {
    if let Some(value) = env_value {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    read_secret_file(path)
}

fn read_secret_file(path: &str) -> String {
    if !Path::new(path).exists() {
        warn!(event = "secret_file_missing", path);
        return String::new();
    }

    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            warn!(event = "secret_read_failed", path, error = %err);
            return String::new();
        }
    };
    match serde_yaml::from_str::<SecretFile>(&contents) {
        Ok(file) => {
            let secret = file.secret.trim().to_string();
            if secret.is_empty() {
                warn!(event = "secret_empty", path);
            }
            secret
        }
        Err(err) => {
            warn!(event = "secret_parse_failed", path, error = %err);
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_secret_file(dir: &tempfile::TempDir, contents: &str) -> String {
        let path = dir.path().join("secret.yml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn env_value_wins_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_secret_file(&dir, "secret: from-file\n");

        let secret = resolve_client_secret(Some("from-env".to_string()), &path);
        assert_eq!(secret, "from-env");
    }

    #[test]
    fn blank_env_value_falls_back_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_secret_file(&dir, "secret: from-file\n");

        let secret = resolve_client_secret(Some("   ".to_string()), &path);
        assert_eq!(secret, "from-file");
    }

    #[test]
    fn reads_secret_key_from_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_secret_file(&dir, "secret: s3cr3t-value\n");

        assert_eq!(resolve_client_secret(None, &path), "s3cr3t-value");
    }

    #[test]
    fn missing_file_yields_empty_secret() {
        let secret = resolve_client_secret(None, "/nonexistent/secret.yml");
        assert_eq!(secret, "");
    }

    #[test]
    fn unparseable_file_yields_empty_secret() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_secret_file(&dir, "secret: [unclosed\n");

        assert_eq!(resolve_client_secret(None, &path), "");
    }

    #[test]
    fn file_without_secret_key_yields_empty_secret() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_secret_file(&dir, "other: value\n");

        assert_eq!(resolve_client_secret(None, &path), "");
    }
}
