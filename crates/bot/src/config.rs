use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use artisan_core::ZonedClock;
use artisan_core::account::DEFAULT_ALLOWED_ROLES;
use artisan_core::clock::DEFAULT_TIMEZONE;
use artisan_storage::WritePolicy;
use serde::{Deserialize, Serialize};

pub const ENV_SPREADSHEET_ID: &str = "ARTISAN_SPREADSHEET_ID";
pub const ENV_SHEET_NAME: &str = "ARTISAN_SHEET_NAME";
pub const ENV_SHEETS_TOKEN: &str = "ARTISAN_SHEETS_TOKEN";
pub const ENV_SHEETS_CREDENTIALS: &str = "ARTISAN_SHEETS_CREDENTIALS";
pub const ENV_LOGS_DIR: &str = "ARTISAN_LOGS_DIR";

/// Table name used by the local backends.
pub const LOCAL_TABLE: &str = "members";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoreConfig {
    Memory,
    Sqlite {
        path: PathBuf,
    },
    Sheets {
        spreadsheet_id: String,
        sheet_name: String,
        /// Service-account key file; tokens are minted and refreshed from it.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        credentials_path: Option<PathBuf>,
        /// Fixed bearer token. Takes precedence over `credentials_path`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        access_token: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base_url: Option<String>,
    },
}

impl StoreConfig {
    pub fn store_id(&self) -> &str {
        match self {
            Self::Sheets { sheet_name, .. } => sheet_name.as_str(),
            Self::Memory | Self::Sqlite { .. } => LOCAL_TABLE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteConfig {
    #[serde(default = "default_verify")]
    pub verify_before_write: bool,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for WriteConfig {
    fn default() -> Self {
        Self {
            verify_before_write: default_verify(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl From<WriteConfig> for WritePolicy {
    fn from(config: WriteConfig) -> Self {
        WritePolicy {
            verify_before_write: config.verify_before_write,
            max_attempts: config.max_attempts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotConfig {
    pub store: StoreConfig,
    #[serde(default = "default_allowed_roles")]
    pub allowed_roles: Vec<String>,
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_logs_dir")]
    pub logs_dir: PathBuf,
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
    #[serde(default)]
    pub write: WriteConfig,
}

fn default_verify() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_allowed_roles() -> Vec<String> {
    DEFAULT_ALLOWED_ROLES.iter().map(|r| r.to_string()).collect()
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_logs_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 7878))
}

/// Load configuration from a YAML file, apply environment overrides and
/// validate the result.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<BotConfig> {
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
    let mut config = parse_config(&content)?;
    apply_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config)?;
    Ok(config)
}

pub fn parse_config(content: &str) -> Result<BotConfig> {
    serde_yaml_ng::from_str(content).with_context(|| "Failed to parse YAML configuration")
}

/// Environment values win over the file. Sheets settings only apply when
/// the sheets backend is configured.
pub fn apply_overrides<F>(config: &mut BotConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(dir) = lookup(ENV_LOGS_DIR) {
        config.logs_dir = PathBuf::from(dir);
    }
    if let StoreConfig::Sheets {
        spreadsheet_id,
        sheet_name,
        credentials_path,
        access_token,
        ..
    } = &mut config.store
    {
        if let Some(id) = lookup(ENV_SPREADSHEET_ID) {
            *spreadsheet_id = id;
        }
        if let Some(name) = lookup(ENV_SHEET_NAME) {
            *sheet_name = name;
        }
        if let Some(path) = lookup(ENV_SHEETS_CREDENTIALS) {
            *credentials_path = Some(PathBuf::from(path));
        }
        if let Some(token) = lookup(ENV_SHEETS_TOKEN) {
            *access_token = Some(token);
        }
    }
}

pub fn validate_config(config: &BotConfig) -> Result<()> {
    if config.allowed_roles.iter().all(|r| r.trim().is_empty()) {
        anyhow::bail!("allowed_roles must name at least one role");
    }

    ZonedClock::parse(&config.timezone)
        .with_context(|| format!("timezone {} is not a known IANA zone", config.timezone))?;

    if config.write.max_attempts == 0 {
        anyhow::bail!("write.max_attempts must be greater than 0");
    }

    match &config.store {
        StoreConfig::Sheets {
            spreadsheet_id,
            sheet_name,
            credentials_path,
            access_token,
            ..
        } => {
            if spreadsheet_id.trim().is_empty() {
                anyhow::bail!("store.spreadsheet_id cannot be empty");
            }
            if sheet_name.trim().is_empty() {
                anyhow::bail!("store.sheet_name cannot be empty");
            }
            let has_token = access_token.as_deref().is_some_and(|t| !t.trim().is_empty());
            let has_key = credentials_path.as_ref().is_some_and(|p| !p.as_os_str().is_empty());
            if !has_token && !has_key {
                anyhow::bail!(
                    "store.credentials_path or store.access_token is required (or set {ENV_SHEETS_CREDENTIALS})"
                );
            }
        }
        StoreConfig::Sqlite { path } => {
            if path.as_os_str().is_empty() {
                anyhow::bail!("store.path cannot be empty");
            }
        }
        StoreConfig::Memory => {}
    }

    Ok(())
}

pub const EXAMPLE_CONFIG: &str = r#"# artisan configuration
store:
  kind: sqlite
  path: artisan.db
# store:
#   kind: sheets
#   spreadsheet_id: your-spreadsheet-id
#   sheet_name: Members
#   credentials_path: credentials.json   # or set ARTISAN_SHEETS_CREDENTIALS
#   access_token: ""                     # fixed token override, ARTISAN_SHEETS_TOKEN

allowed_roles:
  - Admin
  - Council
  - Noble
  - Lord
  - Lady
  - Commander
  - Master of Coin

timezone: America/Chicago
logs_dir: logs
listen: 127.0.0.1:7878

write:
  verify_before_write: true
  max_attempts: 3
"#;

/// Writes [`EXAMPLE_CONFIG`] to `path`, refusing to overwrite.
pub fn init_config<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if path.exists() {
        anyhow::bail!("Config file already exists: {}", path.display());
    }
    std::fs::write(path, EXAMPLE_CONFIG)
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn sheets_config() -> BotConfig {
        parse_config(
            "store:\n  kind: sheets\n  spreadsheet_id: abc\n  sheet_name: Members\n  credentials_path: key.json\n",
        )
        .unwrap()
    }

    #[test]
    fn example_config_is_valid() {
        let config = parse_config(EXAMPLE_CONFIG).unwrap();
        validate_config(&config).unwrap();
        assert_eq!(config.store, StoreConfig::Sqlite { path: "artisan.db".into() });
        assert_eq!(config.allowed_roles.len(), 7);
        assert_eq!(config.listen.port(), 7878);
    }

    #[test]
    fn defaults_fill_missing_fields() {
        let config = parse_config("store:\n  kind: memory\n").unwrap();
        assert_eq!(config.timezone, "America/Chicago");
        assert_eq!(config.logs_dir, PathBuf::from("logs"));
        assert_eq!(config.write, WriteConfig::default());
        assert!(config.allowed_roles.iter().any(|r| r == "Master of Coin"));
        assert_eq!(config.store.store_id(), LOCAL_TABLE);
    }

    #[test]
    fn environment_overrides_sheet_settings() {
        let mut config = sheets_config();
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_SHEET_NAME, "Roster"),
            (ENV_SHEETS_TOKEN, "fresh"),
            (ENV_LOGS_DIR, "/var/log/artisan"),
        ]);
        apply_overrides(&mut config, |k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.store.store_id(), "Roster");
        assert!(matches!(
            config.store,
            StoreConfig::Sheets { access_token: Some(ref token), .. } if token == "fresh"
        ));
        assert_eq!(config.logs_dir, PathBuf::from("/var/log/artisan"));
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut no_roles = sheets_config();
        no_roles.allowed_roles.clear();
        assert!(validate_config(&no_roles).is_err());

        let mut bad_zone = sheets_config();
        bad_zone.timezone = "Central".into();
        assert!(validate_config(&bad_zone).is_err());

        let mut no_attempts = sheets_config();
        no_attempts.write.max_attempts = 0;
        assert!(validate_config(&no_attempts).is_err());

        let mut no_id = sheets_config();
        apply_overrides(&mut no_id, |k| (k == ENV_SPREADSHEET_ID).then(String::new));
        assert!(validate_config(&no_id).is_err());

        let mut no_credentials = sheets_config();
        apply_overrides(&mut no_credentials, |k| (k == ENV_SHEETS_CREDENTIALS).then(String::new));
        assert!(validate_config(&no_credentials).is_err());
        apply_overrides(&mut no_credentials, |k| (k == ENV_SHEETS_TOKEN).then(|| "t0k".to_string()));
        assert!(validate_config(&no_credentials).is_ok());

        assert!(validate_config(&sheets_config()).is_ok());
    }

    #[test]
    fn init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artisan.yaml");
        init_config(&path).unwrap();
        assert!(load_config(&path).is_ok());
        assert!(init_config(&path).is_err());
    }
}
