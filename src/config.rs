use crate::error::ConfigurationError;
use crate::util;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Development-only fallback; deployments are expected to set `JWT_SECRET`.
pub const DEFAULT_JWT_SECRET: &str = "gimnasio_secreto_jwt_desarrollo";

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn default_storage() -> StorageKind {
    env::var("STORAGE")
        .ok()
        .and_then(|it| StorageKind::parse(&it).ok())
        .unwrap_or(StorageKind::Mongodb)
}

fn default_mongodb_uri() -> String {
    env_or("MONGODB_URI", "mongodb://localhost:27017")
}

fn default_mongodb_db() -> String {
    env_or("MONGODB_DB_NAME", "gimnasio")
}

fn default_address() -> String {
    env_or("ADDRESS", "0.0.0.0")
}

fn default_port() -> u16 {
    env::var("PORT")
        .ok()
        .and_then(|it| it.parse().ok())
        .unwrap_or(8080)
}

fn default_jwt_secret() -> String {
    env_or("JWT_SECRET", DEFAULT_JWT_SECRET)
}

fn default_cors_origins() -> Vec<String> {
    match env::var("CORS_ORIGINS") {
        Ok(list) => list
            .split(',')
            .map(str::trim)
            .filter(|it| !it.is_empty())
            .map(String::from)
            .collect(),
        Err(_) => vec![
            String::from("http://localhost:3000"),
            String::from("http://localhost"),
            String::from("http://localhost:80"),
        ],
    }
}

fn default_admin() -> AdminSeed {
    AdminSeed {
        name: env_or("ADMIN_NAME", "Administrador"),
        email: env_or("ADMIN_EMAIL", "admin@proyecto-gym.com"),
        password: env_or("ADMIN_PASSWORD", "admin123"),
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Mongodb,
    Memory,
}

impl StorageKind {
    pub fn parse(value: &str) -> Result<StorageKind, ConfigurationError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mongodb" | "mongo" => Ok(StorageKind::Mongodb),
            "memory" => Ok(StorageKind::Memory),
            other => Err(ConfigurationError::UnknownStorage(other.to_string())),
        }
    }
}

/// Administrator account created on first boot.
#[derive(Clone, Serialize, Deserialize)]
pub struct AdminSeed {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for AdminSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AdminSeed:{}", self.email)
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_storage")]
    pub storage: StorageKind,
    #[serde(default = "default_mongodb_uri")]
    pub mongodb_uri: String,
    #[serde(default = "default_mongodb_db")]
    pub mongodb_db: String,

    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    #[serde(default = "default_admin")]
    pub admin: AdminSeed,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("storage", &self.storage)
            .field("mongodb_db", &self.mongodb_db)
            .field("address", &self.address)
            .field("port", &self.port)
            .field("cors_origins", &self.cors_origins)
            .field("admin", &self.admin)
            .finish_non_exhaustive()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage: default_storage(),
            mongodb_uri: default_mongodb_uri(),
            mongodb_db: default_mongodb_db(),
            address: default_address(),
            port: default_port(),
            jwt_secret: default_jwt_secret(),
            cors_origins: default_cors_origins(),
            admin: default_admin(),
        }
    }
}

#[inline]
fn config_dir() -> PathBuf {
    PathBuf::from(env_or("CONFIG_DIR", "./config"))
}

impl Config {
    pub fn load() -> Result<Config, ConfigurationError> {
        let config_file = util::find_first_subpath(
            config_dir(),
            &["settings.yml", "settings.yaml"],
            Path::exists,
        )
        .ok_or_else(|| ConfigurationError::NotFound(config_dir()))?;

        let file = File::open(config_file)?;
        let config = serde_yaml::from_reader(BufReader::new(file))?;

        Ok(config)
    }

    /// Loads the settings file, falling back to an environment-only config
    /// when there is none.
    pub fn load_or_default() -> Result<Config, ConfigurationError> {
        match Config::load() {
            Ok(c) => Ok(c),
            Err(ConfigurationError::NotFound(dir)) => {
                tracing::info!(
                    "No settings file in '{}', using environment.",
                    dir.display()
                );
                Ok(Config::default())
            }
            Err(other) => Err(other),
        }
    }

    pub fn uses_default_secret(&self) -> bool {
        self.jwt_secret == DEFAULT_JWT_SECRET
    }
}
