//! Email/password accounts and token sessions on top of the `users` and `sessions` tables.

use crate::error::AppError;
use crate::extractors::IncomingRequest;
use crate::service::validation::{RequestValidator, Rules, ValidationRule};
use crate::sql::{columns, RowData};
use crate::store::CrudStore;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

pub const USERS_TABLE: &str = "users";
pub const SESSIONS_TABLE: &str = "sessions";

/// Columns never handed back to callers.
pub const SENSITIVE_COLUMNS: [&str; 2] = ["password_hash", "salt"];

const SESSION_DAYS: i64 = 30;
const MIN_PASSWORD_LEN: u32 = 8;

#[derive(Clone, Debug, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct Session {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub user: Value,
}

/// Hex SHA-256 of `salt || password`. A single fast round: offline guessing against a
/// leaked `users` table is cheap, so swap in a slow KDF before storing real accounts.
pub fn hash_password(salt: &str, password: &str) -> String {
    let digest = Sha256::new()
        .chain_update(salt.as_bytes())
        .chain_update(password.as_bytes())
        .finalize();
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

pub fn verify_password(salt: &str, password: &str, expected: &str) -> bool {
    constant_time_eq::constant_time_eq(hash_password(salt, password).as_bytes(), expected.as_bytes())
}

pub fn strip_sensitive(mut user: Value) -> Value {
    if let Some(obj) = user.as_object_mut() {
        for col in SENSITIVE_COLUMNS {
            obj.remove(col);
        }
    }
    user
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn signup_rules() -> Rules {
    Rules::from([
        ("email".to_string(), ValidationRule::required().format("email").max_length(254)),
        ("password".to_string(), ValidationRule::required().min_length(MIN_PASSWORD_LEN)),
    ])
}

fn invalid_login() -> AppError {
    AppError::Unauthorized("invalid email or password".into())
}

pub struct Auth {
    cookie_name: String,
}

impl Auth {
    pub fn new(cookie_name: impl Into<String>) -> Self {
        Auth {
            cookie_name: cookie_name.into(),
        }
    }

    /// Session token from the session cookie, else `Authorization: Bearer`.
    pub fn token(&self, request: &IncomingRequest) -> Option<String> {
        request.cookie(&self.cookie_name).filter(|t| !t.is_empty()).or_else(|| {
            request
                .header("authorization")
                .and_then(|h| h.strip_prefix("Bearer "))
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
        })
    }

    /// The signed-in user, without sensitive columns. Expired sessions count as signed out.
    pub async fn is_authenticated(&self, store: &CrudStore, request: &IncomingRequest) -> Result<Option<Value>, AppError> {
        let Some(token) = self.token(request) else {
            return Ok(None);
        };
        let Some(session) = store
            .read(SESSIONS_TABLE, &columns([("token", json!(token))]))
            .await?
        else {
            return Ok(None);
        };
        let expired = session
            .get("expires_at")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .is_some_and(|t| t < Utc::now());
        if expired {
            return Ok(None);
        }
        let Some(user_id) = session.get("user_id").cloned() else {
            return Ok(None);
        };
        let user = store.read(USERS_TABLE, &columns([("id", user_id)])).await?;
        Ok(user.map(strip_sensitive))
    }

    pub async fn sign_in(&self, store: &CrudStore, credentials: &Credentials) -> Result<Session, AppError> {
        let email = normalize_email(&credentials.email);
        let user = store
            .read(USERS_TABLE, &columns([("email", json!(email))]))
            .await?
            .ok_or_else(invalid_login)?;
        let salt = user.get("salt").and_then(Value::as_str).unwrap_or_default();
        let hash = user.get("password_hash").and_then(Value::as_str).unwrap_or_default();
        if !verify_password(salt, &credentials.password, hash) {
            return Err(invalid_login());
        }
        tracing::debug!(email = %email, "signed in");
        self.open_session(store, user).await
    }

    async fn open_session(&self, store: &CrudStore, user: Value) -> Result<Session, AppError> {
        let user_id = user.get("id").cloned().unwrap_or(Value::Null);
        let token = uuid::Uuid::new_v4().to_string();
        let expires_at = Utc::now() + Duration::days(SESSION_DAYS);
        store
            .create(
                SESSIONS_TABLE,
                &columns([
                    ("user_id", user_id),
                    ("token", json!(token)),
                    ("expires_at", json!(expires_at.to_rfc3339())),
                ]),
            )
            .await?;
        Ok(Session {
            token,
            expires_at,
            user: strip_sensitive(user),
        })
    }

    /// Create an account from `email`, `password` and any other `users` columns, then sign it in.
    pub async fn sign_up(&self, store: &CrudStore, mut data: RowData) -> Result<Session, AppError> {
        RequestValidator::validate(&data, &signup_rules())?;
        let email = data
            .get("email")
            .and_then(Value::as_str)
            .map(normalize_email)
            .unwrap_or_default();
        let password = data
            .remove("password")
            .and_then(|p| p.as_str().map(str::to_string))
            .unwrap_or_default();

        if store.count(USERS_TABLE, &columns([("email", json!(email))])).await? > 0 {
            return Err(AppError::Conflict(format!("{} is already registered", email)));
        }

        let salt = uuid::Uuid::new_v4().simple().to_string();
        data.insert("email".into(), json!(email));
        data.insert("password_hash".into(), json!(hash_password(&salt, &password)));
        data.insert("salt".into(), json!(salt));
        let id = store.create(USERS_TABLE, &data).await?;
        let user = store
            .read(USERS_TABLE, &columns([("id", id)]))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {} vanished after insert", email)))?;
        tracing::debug!(email = %email, "signed up");
        self.open_session(store, user).await
    }

    /// `Ok(true)` when a session was removed.
    pub async fn sign_out(&self, store: &CrudStore, request: &IncomingRequest) -> Result<bool, AppError> {
        match self.token(request) {
            Some(token) => store.delete(SESSIONS_TABLE, &columns([("token", json!(token))])).await,
            None => Ok(false),
        }
    }

    /// `Set-Cookie` value for a session.
    pub fn cookie(&self, session: &Session) -> String {
        format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
            self.cookie_name,
            session.token,
            Duration::days(SESSION_DAYS).num_seconds()
        )
    }

    /// `Set-Cookie` value that clears the session cookie.
    pub fn clear_cookie(&self) -> String {
        format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", self.cookie_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    #[test]
    fn password_hash_is_salted() {
        let h = hash_password("s1", "secret-pass");
        assert_eq!(h.len(), 64);
        assert_ne!(h, hash_password("s2", "secret-pass"));
        assert!(verify_password("s1", "secret-pass", &h));
        assert!(!verify_password("s1", "Secret-pass", &h));
    }

    #[test]
    fn hash_is_sha256_of_salt_then_password() {
        assert_eq!(
            hash_password("a", "bc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn strips_sensitive_columns() {
        let user = strip_sensitive(json!({"id": 1, "email": "a@b.io", "password_hash": "x", "salt": "y"}));
        assert_eq!(user, json!({"id": 1, "email": "a@b.io"}));
    }

    #[test]
    fn token_from_cookie_then_bearer() {
        let auth = Auth::new("token");
        let req = IncomingRequest::new("GET", "/")
            .with_header("cookie", "token=abc")
            .with_header("authorization", "Bearer xyz");
        assert_eq!(auth.token(&req).as_deref(), Some("abc"));
        let req = IncomingRequest::new("GET", "/").with_header("authorization", "Bearer xyz");
        assert_eq!(auth.token(&req).as_deref(), Some("xyz"));
        assert_eq!(auth.token(&IncomingRequest::new("GET", "/")), None);
    }

    #[tokio::test]
    async fn sign_up_validates_before_touching_the_database() {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost:1/never_connected")
            .unwrap();
        let store = CrudStore::new(pool, "public");
        let data = columns([("email", json!("ann@example")), ("password", json!("short"))]);
        let err = Auth::new("token").sign_up(&store, data).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn sign_out_without_token_is_a_no_op() {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost:1/never_connected")
            .unwrap();
        let store = CrudStore::new(pool, "public");
        let out = Auth::new("token").sign_out(&store, &IncomingRequest::new("DELETE", "/sessions")).await;
        assert!(matches!(out, Ok(false)));
    }
}
