//! Load config from a JSON file (`CONFIG_PATH`) or from environment variables.

use crate::config::types::*;
use crate::config::validate;
use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Load and validate the process configuration. `.env` is honoured when present.
pub fn load() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    let config = match std::env::var("CONFIG_PATH") {
        Ok(path) if !path.trim().is_empty() => load_from_file(Path::new(path.trim()))?,
        _ => load_from_env()?,
    };
    validate(&config)?;
    Ok(config)
}

pub fn load_from_file(path: &Path) -> Result<AppConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&raw).map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))
}

pub fn load_from_env() -> Result<AppConfig, ConfigError> {
    from_lookup(|key| std::env::var(key).ok())
}

/// Build config from an arbitrary key lookup. Unset keys fall back to defaults.
pub fn from_lookup<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    let url = get("DATABASE_URL").ok_or_else(|| ConfigError::Load("DATABASE_URL is not set".into()))?;
    let mut config = AppConfig::with_database_url(url);

    if let Some(v) = get("DATABASE_MAX_CONNECTIONS") {
        config.database.max_connections = parse_number("DATABASE_MAX_CONNECTIONS", &v)?;
    }
    if let Some(v) = get("DATABASE_SCHEMA") {
        config.database.schema = v;
    }

    if let Some(host) = get("SMTP_HOST") {
        let port = match get("SMTP_PORT") {
            Some(v) => parse_number("SMTP_PORT", &v)?,
            None => 587,
        };
        config.smtp = Some(SmtpConfig {
            host,
            port,
            username: get("SMTP_USERNAME").unwrap_or_default(),
            password: get("SMTP_PASSWORD").unwrap_or_default(),
            from_email: get("SMTP_FROM").ok_or_else(|| ConfigError::Load("SMTP_FROM is required when SMTP_HOST is set".into()))?,
            from_name: get("SMTP_FROM_NAME"),
        });
    }

    if let Some(root) = get("APP_ROOT") {
        config.paths.root = PathBuf::from(root);
    }
    if let Some(lang) = get("DEFAULT_LANG") {
        config.http.default_lang = lang;
    }
    if let Some(v) = get("MAX_BODY_BYTES") {
        config.http.max_body_bytes = parse_number("MAX_BODY_BYTES", &v)?;
    }
    if let Some(v) = get("MAX_UPLOAD_BYTES") {
        config.http.max_upload_bytes = parse_number("MAX_UPLOAD_BYTES", &v)?;
    }
    if let Some(v) = get("SESSION_COOKIE") {
        config.http.session_cookie = v;
    }
    Ok(config)
}

fn parse_number<T: std::str::FromStr>(key: &str, v: &str) -> Result<T, ConfigError> {
    v.parse()
        .map_err(|_| ConfigError::Load(format!("{} must be a number, got '{}'", key, v)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn database_url_is_required() {
        let err = from_lookup(lookup(&[])).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn env_overrides_defaults() {
        let config = from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/app"),
            ("DATABASE_MAX_CONNECTIONS", "12"),
            ("SMTP_HOST", "smtp.example.com"),
            ("SMTP_FROM", "noreply@example.com"),
            ("APP_ROOT", "/srv/app"),
            ("DEFAULT_LANG", "pt"),
        ]))
        .unwrap();
        assert_eq!(config.database.max_connections, 12);
        assert_eq!(config.database.schema, "public");
        let smtp = config.smtp.unwrap();
        assert_eq!(smtp.port, 587);
        assert_eq!(smtp.from_email, "noreply@example.com");
        assert_eq!(config.paths.views_dir(), PathBuf::from("/srv/app/app/view"));
        assert_eq!(config.http.default_lang, "pt");
    }

    #[test]
    fn malformed_number_is_rejected() {
        let err = from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/app"),
            ("MAX_BODY_BYTES", "lots"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }

    #[test]
    fn file_sections_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "database": { "url": "postgres://db/app" }, "smtp": { "host": "mail", "username": "u", "password": "p", "from_email": "a@b.c" } }"#,
        )
        .unwrap();
        let config = load_from_file(&path).unwrap();
        assert_eq!(config.database.url, "postgres://db/app");
        assert_eq!(config.smtp.as_ref().map(|s| s.port), Some(587));
        assert_eq!(config.http.session_cookie, "token");
    }
}
