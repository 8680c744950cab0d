use std::fmt::Write as _;
use std::fs;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use camino::Utf8Path;
use reqwest::Url;
use serde::Deserialize;
use toml_edit::{DocumentMut, Item, Table, value};

use crate::envfile::EnvFile;
use crate::templates;

pub const BASE_URL_KEY: &str = "BASE_URL";
pub const ADMIN_USER_KEY: &str = "ADMIN_USER";
pub const ADMIN_PWD_KEY: &str = "ADMIN_PWD";

/// Root configuration document loaded from `.seed/config.toml` by default.
#[derive(Debug, Default, Deserialize)]
pub struct SeedFile {
    pub base_url: Option<String>,
    pub admin_user: Option<String>,
    pub admin_pwd: Option<String>,
    pub timeout_secs: Option<u64>,
    pub folders: Option<FolderDefaults>,
    pub users: Option<UserDefaults>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FolderDefaults {
    pub count: Option<usize>,
    pub output: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserDefaults {
    pub count: Option<usize>,
    pub prefix: Option<String>,
    pub last_name: Option<String>,
    pub site: Option<String>,
    pub group: Option<String>,
    pub output: Option<String>,
}

/// Connection settings shared by every request of a run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedConfig {
    pub base_url: String,
    pub admin_user: String,
    pub admin_pwd: String,
    pub timeout: Option<Duration>,
}

/// Values given on the command line; these win over every other source.
#[derive(Debug, Default)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub admin_user: Option<String>,
    pub admin_pwd: Option<String>,
}

/// Load a configuration file from disk and deserialize it.
pub fn load_from_path(path: &Utf8Path) -> Result<SeedFile> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading config {}", path))?;
    toml::from_str(&raw).with_context(|| format!("parsing config {}", path))
}

/// Like [`load_from_path`], but a missing file is an empty config.
pub fn load_or_default(path: &Utf8Path) -> Result<SeedFile> {
    if path.exists() {
        load_from_path(path)
    } else {
        Ok(SeedFile::default())
    }
}

/// Merge flags, process environment, `.env` and the config file, in that order.
pub fn resolve(
    overrides: &Overrides,
    env_var: impl Fn(&str) -> Option<String>,
    env_file: &EnvFile,
    file: &SeedFile,
) -> Result<SeedConfig> {
    let pick = |flag: &Option<String>, key: &str, from_file: &Option<String>| {
        flag.clone()
            .or_else(|| env_var(key))
            .or_else(|| env_file.get(key).map(str::to_owned))
            .or_else(|| from_file.clone())
            .filter(|value| !value.is_empty())
    };

    let base_url = pick(&overrides.base_url, BASE_URL_KEY, &file.base_url)
        .ok_or_else(|| anyhow!("no base URL configured; pass --base-url or set {BASE_URL_KEY}"))?;
    let admin_user = pick(&overrides.admin_user, ADMIN_USER_KEY, &file.admin_user).ok_or_else(
        || anyhow!("no admin user configured; pass --admin-user or set {ADMIN_USER_KEY}"),
    )?;
    let admin_pwd = pick(&overrides.admin_pwd, ADMIN_PWD_KEY, &file.admin_pwd).ok_or_else(
        || anyhow!("no admin password configured; pass --admin-pwd or set {ADMIN_PWD_KEY}"),
    )?;

    let base_url = normalize_base_url(&base_url)?;
    if file.timeout_secs == Some(0) {
        bail!("`timeout_secs` must be positive");
    }
    Ok(SeedConfig {
        base_url,
        admin_user,
        admin_pwd,
        timeout: file.timeout_secs.map(Duration::from_secs),
    })
}

fn normalize_base_url(raw: &str) -> Result<String> {
    let url = Url::parse(raw).with_context(|| format!("invalid base URL `{}`", raw))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("base URL `{}` must use http or https", raw);
    }
    Ok(raw.trim_end_matches('/').to_owned())
}

pub fn write_example_config(path: &Utf8Path, overwrite: bool) -> Result<()> {
    if path.exists() && !overwrite {
        bail!("{} already exists; rerun with --force to overwrite", path);
    }

    templates::write_template(path, "config/example.config.toml")
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ValueKind {
    Text,
    Integer,
    PositiveInteger,
}

const SETTABLE_KEYS: &[(&str, ValueKind)] = &[
    ("base_url", ValueKind::Text),
    ("admin_user", ValueKind::Text),
    ("admin_pwd", ValueKind::Text),
    ("timeout_secs", ValueKind::PositiveInteger),
    ("folders.count", ValueKind::Integer),
    ("folders.output", ValueKind::Text),
    ("users.count", ValueKind::Integer),
    ("users.prefix", ValueKind::Text),
    ("users.last_name", ValueKind::Text),
    ("users.site", ValueKind::Text),
    ("users.group", ValueKind::Text),
    ("users.output", ValueKind::Text),
];

/// Set a single (possibly dotted) key, preserving the rest of the document.
pub fn set_value(path: &Utf8Path, key: &str, raw: &str) -> Result<()> {
    let kind = SETTABLE_KEYS
        .iter()
        .find(|(known, _)| *known == key)
        .map(|(_, kind)| *kind)
        .ok_or_else(|| anyhow!("unknown config key `{}`", key))?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating directory {}", parent))?;
    }

    let mut doc: DocumentMut = if path.exists() {
        let raw = fs::read_to_string(path).with_context(|| format!("reading config {}", path))?;
        raw.parse()
            .with_context(|| format!("parsing config {}", path))?
    } else {
        DocumentMut::new()
    };

    let new_value = match kind {
        ValueKind::Text => value(raw),
        ValueKind::Integer | ValueKind::PositiveInteger => {
            let number: i64 = raw
                .parse()
                .with_context(|| format!("`{}` expects an integer, got `{}`", key, raw))?;
            if number < 0 {
                bail!("`{}` must not be negative", key);
            }
            if number == 0 && kind == ValueKind::PositiveInteger {
                bail!("`{}` must be positive", key);
            }
            value(number)
        }
    };

    match key.split_once('.') {
        None => doc[key] = new_value,
        Some((section, field)) => {
            if !doc.as_table().contains_key(section) {
                doc[section] = Item::Table(Table::new());
            }
            let table = doc
                .get_mut(section)
                .and_then(Item::as_table_mut)
                .ok_or_else(|| anyhow!("config has non-table `{}` entry", section))?;
            table.insert(field, new_value);
        }
    }

    fs::write(path, doc.to_string()).with_context(|| format!("writing config {}", path))
}

pub fn format_summary(config: &SeedFile) -> String {
    let mut out = String::new();
    let base_url = config.base_url.as_deref().unwrap_or("<unset>");
    let admin_user = config.admin_user.as_deref().unwrap_or("<unset>");
    let admin_pwd = match config.admin_pwd.as_deref() {
        Some("") | None => "<unset>",
        Some(_) => "*****",
    };

    let _ = writeln!(out, "Base URL: {}", base_url);
    let _ = writeln!(out, "Admin user: {}", admin_user);
    let _ = writeln!(out, "Admin password: {}", admin_pwd);
    if let Some(timeout) = config.timeout_secs {
        let _ = writeln!(out, "Timeout: {}s", timeout);
    }

    if let Some(folders) = &config.folders {
        let _ = writeln!(
            out,
            "Folders: count={}, output={}",
            display_or_default(folders.count),
            folders.output.as_deref().unwrap_or("<default>")
        );
    }

    if let Some(users) = &config.users {
        let _ = writeln!(
            out,
            "Users: count={}, prefix={}, site={}, group={}, output={}",
            display_or_default(users.count),
            users.prefix.as_deref().unwrap_or("<default>"),
            users.site.as_deref().unwrap_or("<default>"),
            users.group.as_deref().unwrap_or("<default>"),
            users.output.as_deref().unwrap_or("<default>")
        );
    }

    out
}

fn display_or_default(count: Option<usize>) -> String {
    count
        .map(|c| c.to_string())
        .unwrap_or_else(|| "<default>".to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use std::collections::HashMap;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_temp_dir() -> Utf8PathBuf {
        let mut dir = std::env::temp_dir();
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        dir.push(format!("seedkit-config-test-{ts}"));
        Utf8PathBuf::from_path_buf(dir).unwrap()
    }

    fn file_with(base_url: &str) -> SeedFile {
        SeedFile {
            base_url: Some(base_url.to_owned()),
            admin_user: Some("file-admin".to_owned()),
            admin_pwd: Some("file-pwd".to_owned()),
            ..SeedFile::default()
        }
    }

    #[test]
    fn flags_win_over_environment_and_file() {
        let vars: HashMap<&str, &str> = [(BASE_URL_KEY, "http://env:8080")].into();
        let overrides = Overrides {
            base_url: Some("http://flag:8080/".to_owned()),
            ..Overrides::default()
        };
        let resolved = resolve(
            &overrides,
            |key| vars.get(key).map(|v| v.to_string()),
            &EnvFile::default(),
            &file_with("http://file:8080"),
        )
        .unwrap();
        assert_eq!(resolved.base_url, "http://flag:8080");
        assert_eq!(resolved.admin_user, "file-admin");
        assert_eq!(resolved.admin_pwd, "file-pwd");
    }

    #[test]
    fn environment_wins_over_file() {
        let vars: HashMap<&str, &str> = [(ADMIN_USER_KEY, "env-admin")].into();
        let resolved = resolve(
            &Overrides::default(),
            |key| vars.get(key).map(|v| v.to_string()),
            &EnvFile::default(),
            &file_with("https://file.example.org"),
        )
        .unwrap();
        assert_eq!(resolved.base_url, "https://file.example.org");
        assert_eq!(resolved.admin_user, "env-admin");
    }

    #[test]
    fn missing_base_url_is_reported() {
        let err = resolve(
            &Overrides::default(),
            |_| None,
            &EnvFile::default(),
            &SeedFile::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("no base URL configured"));
    }

    #[test]
    fn rejects_non_http_base_url() {
        let err = resolve(
            &Overrides::default(),
            |_| None,
            &EnvFile::default(),
            &file_with("ftp://files.example.org"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("must use http or https"));
    }

    #[test]
    fn parses_sections_and_timeout() {
        let raw = r#"
base_url = "http://localhost:8080"
admin_user = "admin"
admin_pwd = "admin"
timeout_secs = 5

[folders]
count = 3

[users]
count = 7
site = "loadtest"
"#;
        let file: SeedFile = toml::from_str(raw).unwrap();
        let resolved = resolve(&Overrides::default(), |_| None, &EnvFile::default(), &file)
            .unwrap();
        assert_eq!(resolved.timeout, Some(Duration::from_secs(5)));
        assert_eq!(file.folders.unwrap().count, Some(3));
        let users = file.users.unwrap();
        assert_eq!(users.count, Some(7));
        assert_eq!(users.site.as_deref(), Some("loadtest"));
    }

    #[test]
    fn set_value_creates_sections_and_keeps_existing_keys() {
        let root = unique_temp_dir();
        let path = root.join("config.toml");
        fs::create_dir_all(root.as_std_path()).unwrap();
        fs::write(path.as_std_path(), "# seed settings\nbase_url = \"http://a\"\n").unwrap();

        set_value(&path, "users.count", "12").unwrap();
        set_value(&path, "admin_user", "admin").unwrap();

        let raw = fs::read_to_string(path.as_std_path()).unwrap();
        assert!(raw.contains("# seed settings"));
        let file: SeedFile = toml::from_str(&raw).unwrap();
        assert_eq!(file.base_url.as_deref(), Some("http://a"));
        assert_eq!(file.admin_user.as_deref(), Some("admin"));
        assert_eq!(file.users.unwrap().count, Some(12));

        let _ = fs::remove_dir_all(root.as_std_path());
    }

    #[test]
    fn set_value_rejects_unknown_keys_and_bad_integers() {
        let root = unique_temp_dir();
        let path = root.join("config.toml");
        assert!(set_value(&path, "nope", "1").is_err());
        assert!(set_value(&path, "folders.count", "many").is_err());
        let _ = fs::remove_dir_all(root.as_std_path());
    }

    #[test]
    fn zero_timeout_in_file_is_rejected() {
        let file = SeedFile {
            timeout_secs: Some(0),
            ..file_with("http://localhost:8080")
        };
        let err = resolve(&Overrides::default(), |_| None, &EnvFile::default(), &file)
            .unwrap_err();
        assert!(err.to_string().contains("`timeout_secs` must be positive"));
    }

    #[test]
    fn set_value_rejects_zero_timeout() {
        let root = unique_temp_dir();
        let path = root.join("config.toml");

        let err = set_value(&path, "timeout_secs", "0").unwrap_err();
        assert!(err.to_string().contains("`timeout_secs` must be positive"));
        assert!(!path.exists());

        set_value(&path, "timeout_secs", "3").unwrap();
        set_value(&path, "folders.count", "0").unwrap();
        let file = load_from_path(&path).unwrap();
        assert_eq!(file.timeout_secs, Some(3));
        assert_eq!(file.folders.unwrap().count, Some(0));

        let _ = fs::remove_dir_all(root.as_std_path());
    }

    #[test]
    fn dotenv_beats_file_but_loses_to_process_environment() {
        let root = unique_temp_dir();
        fs::create_dir_all(root.as_std_path()).unwrap();
        let env_path = root.join(".env");
        fs::write(
            env_path.as_std_path(),
            "BASE_URL=http://dotenv:8080\nADMIN_USER=dotenv-admin\n",
        )
        .unwrap();
        let env_file = EnvFile::load(&env_path).unwrap();

        let vars: HashMap<&str, &str> = [(ADMIN_USER_KEY, "env-admin")].into();
        let resolved = resolve(
            &Overrides::default(),
            |key| vars.get(key).map(|v| v.to_string()),
            &env_file,
            &file_with("http://file:8080"),
        )
        .unwrap();
        assert_eq!(resolved.base_url, "http://dotenv:8080");
        assert_eq!(resolved.admin_user, "env-admin");
        assert_eq!(resolved.admin_pwd, "file-pwd");

        let _ = fs::remove_dir_all(root.as_std_path());
    }

    #[test]
    fn summary_masks_password() {
        let summary = format_summary(&file_with("http://localhost:8080"));
        assert!(summary.contains("Base URL: http://localhost:8080"));
        assert!(summary.contains("Admin password: *****"));
        assert!(!summary.contains("file-pwd"));
    }
}
