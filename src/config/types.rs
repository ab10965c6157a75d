//! Configuration types. Built once at startup and passed by reference into every Facade.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub smtp: Option<SmtpConfig>,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Schema that migrations and the table lifecycle commands operate on.
    #[serde(default = "default_schema")]
    pub schema: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
    #[serde(default)]
    pub from_name: Option<String>,
}

/// Filesystem layout. Relative entries resolve against `root`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_root")]
    pub root: PathBuf,
    #[serde(default = "default_views")]
    pub views: PathBuf,
    #[serde(default = "default_tables")]
    pub tables: PathBuf,
    #[serde(default = "default_uploads")]
    pub uploads: PathBuf,
    #[serde(default = "default_i18n")]
    pub i18n: PathBuf,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    #[serde(default = "default_session_cookie")]
    pub session_cookie: String,
    #[serde(default = "default_lang")]
    pub default_lang: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl PathsConfig {
    pub fn resolve(&self, p: &Path) -> PathBuf {
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.root.join(p)
        }
    }

    pub fn views_dir(&self) -> PathBuf {
        self.resolve(&self.views)
    }

    pub fn tables_dir(&self) -> PathBuf {
        self.resolve(&self.tables)
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.resolve(&self.uploads)
    }

    pub fn i18n_file(&self) -> PathBuf {
        self.resolve(&self.i18n)
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        PathsConfig {
            root: default_root(),
            views: default_views(),
            tables: default_tables(),
            uploads: default_uploads(),
            i18n: default_i18n(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            max_body_bytes: default_max_body_bytes(),
            max_upload_bytes: default_max_upload_bytes(),
            session_cookie: default_session_cookie(),
            default_lang: default_lang(),
            user_agent: default_user_agent(),
        }
    }
}

impl AppConfig {
    /// Config with defaults everywhere except the database URL.
    pub fn with_database_url(url: impl Into<String>) -> Self {
        AppConfig {
            database: DatabaseConfig {
                url: url.into(),
                max_connections: default_max_connections(),
                schema: default_schema(),
            },
            smtp: None,
            paths: PathsConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

fn default_schema() -> String {
    "public".into()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_views() -> PathBuf {
    PathBuf::from("app/view")
}

fn default_tables() -> PathBuf {
    PathBuf::from("table")
}

fn default_uploads() -> PathBuf {
    PathBuf::from("upload")
}

fn default_i18n() -> PathBuf {
    PathBuf::from("app/view/i18n.json")
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_max_upload_bytes() -> usize {
    8 * 1024 * 1024
}

fn default_session_cookie() -> String {
    "token".into()
}

fn default_lang() -> String {
    "en".into()
}

fn default_user_agent() -> String {
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).into()
}
