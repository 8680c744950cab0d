use std::fs;

use anyhow::{Context, Result, anyhow};
use camino::{Utf8Path, Utf8PathBuf};

const ENV_FILENAME: &str = ".env";

/// Read-only view of a `.env` file holding connection settings.
#[derive(Debug, Default)]
pub struct EnvFile {
    path: Option<Utf8PathBuf>,
    entries: Vec<(String, String)>,
}

impl EnvFile {
    /// Load `path` if it exists; a missing file yields an empty set of entries.
    pub fn load(path: &Utf8Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
        Ok(Self {
            path: Some(path.to_owned()),
            entries: parse_entries(&contents),
        })
    }

    pub fn path(&self) -> Option<&Utf8Path> {
        self.path.as_deref()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.as_str())
    }
}

/// Walk up from `start` looking for a `.env`, stopping at the git root.
pub fn locate(start: &Utf8Path) -> Option<Utf8PathBuf> {
    let mut current: Option<&Utf8Path> = Some(start);
    while let Some(dir) = current {
        let candidate = dir.join(ENV_FILENAME);
        if candidate.exists() {
            return Some(candidate);
        }
        if dir.join(".git").exists() {
            return None;
        }
        current = dir.parent();
    }
    None
}

fn parse_entries(contents: &str) -> Vec<(String, String)> {
    contents
        .lines()
        .filter_map(|line| {
            let trimmed = line.trim_end_matches(['\r']).trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                return None;
            }
            let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
            let (key, value) = trimmed.split_once('=')?;
            Some((key.trim().to_owned(), unquote(value.trim()).to_owned()))
        })
        .collect()
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

pub fn current_working_dir() -> Result<Utf8PathBuf> {
    let cwd = std::env::current_dir().context("determining current directory")?;
    Utf8PathBuf::from_path_buf(cwd).map_err(|_| anyhow!("current directory is not valid UTF-8"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn parses_quoted_and_exported_values() {
        let content = r#"
# connection for the load test box
BASE_URL="http://localhost:8080"
export ADMIN_USER=admin
ADMIN_PWD='s3cr=t'
EMPTY=
"#;
        let entries = parse_entries(content);
        assert_eq!(entries.len(), 4);
        assert_eq!(
            entries[0],
            ("BASE_URL".to_string(), "http://localhost:8080".to_string())
        );
        assert_eq!(entries[1], ("ADMIN_USER".to_string(), "admin".to_string()));
        assert_eq!(entries[2], ("ADMIN_PWD".to_string(), "s3cr=t".to_string()));
        assert_eq!(entries[3], ("EMPTY".to_string(), String::new()));
    }

    #[test]
    fn later_entries_override_earlier_ones() {
        let env = EnvFile {
            path: None,
            entries: parse_entries("ADMIN_USER=first\nADMIN_USER=second\n"),
        };
        assert_eq!(env.get("ADMIN_USER"), Some("second"));
        assert_eq!(env.get("MISSING"), None);
    }

    fn unique_temp_dir() -> Utf8PathBuf {
        let mut dir = std::env::temp_dir();
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        dir.push(format!("seedkit-envfile-test-{ts}"));
        Utf8PathBuf::from_path_buf(dir).unwrap()
    }

    #[test]
    fn locate_walks_up_to_parent_env() {
        let root = unique_temp_dir();
        let nested = root.join("repo").join("jmeter").join("webdav");
        fs::create_dir_all(nested.as_std_path()).unwrap();
        fs::write(root.join("repo").join(".env").as_std_path(), "BASE_URL=http://a\n").unwrap();

        assert_eq!(locate(&nested), Some(root.join("repo").join(".env")));

        let _ = fs::remove_dir_all(root.as_std_path());
    }

    #[test]
    fn locate_stops_at_git_root() {
        let root = unique_temp_dir();
        let repo = root.join("repo");
        let nested = repo.join("src");
        fs::create_dir_all(nested.as_std_path()).unwrap();
        fs::create_dir_all(repo.join(".git").as_std_path()).unwrap();
        // Above the repository, so it must not be picked up.
        fs::write(root.join(".env").as_std_path(), "BASE_URL=http://outside\n").unwrap();

        assert_eq!(locate(&nested), None);

        let _ = fs::remove_dir_all(root.as_std_path());
    }

    #[test]
    fn missing_file_loads_empty() {
        let path = Utf8Path::new("/definitely/not/here/.env");
        let env = EnvFile::load(path).unwrap();
        assert!(env.path().is_none());
        assert_eq!(env.get("BASE_URL"), None);
    }
}
