//! Config validation: connection parameters and identifiers.

use crate::config::AppConfig;
use crate::error::ConfigError;
use crate::sql::is_identifier;

pub fn validate(config: &AppConfig) -> Result<(), ConfigError> {
    let url = config.database.url.trim();
    if url.is_empty() {
        return Err(ConfigError::Validation("database.url is empty".into()));
    }
    if !(url.starts_with("postgres://") || url.starts_with("postgresql://")) {
        return Err(ConfigError::Validation(
            "database.url must be a postgres:// or postgresql:// URL".into(),
        ));
    }
    if config.database.max_connections == 0 {
        return Err(ConfigError::Validation("database.max_connections must be at least 1".into()));
    }
    if !is_identifier(&config.database.schema) {
        return Err(ConfigError::Validation(format!(
            "database.schema '{}' is not a valid identifier",
            config.database.schema
        )));
    }

    if let Some(smtp) = &config.smtp {
        if smtp.host.trim().is_empty() {
            return Err(ConfigError::Validation("smtp.host is empty".into()));
        }
        if smtp.port == 0 {
            return Err(ConfigError::Validation("smtp.port must be non-zero".into()));
        }
        if !smtp.from_email.contains('@') {
            return Err(ConfigError::Validation("smtp.from_email must be an email address".into()));
        }
    }

    if config.http.session_cookie.is_empty() {
        return Err(ConfigError::Validation("http.session_cookie is empty".into()));
    }
    Ok(())
}
