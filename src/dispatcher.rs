//! Request dispatch: path segments and verb to a handler group method.
//!
//! Three phases run once per request, with no retries:
//! segment extraction, verb resolution, then target resolution and invocation.
//! A group with no registered handler falls back to `Home.not_found()`.

use crate::case::handler_group_name;
use crate::error::{AppError, ConfigError};
use crate::extractors::IncomingRequest;
use crate::facade::Facade;
use crate::handlers::{Handler, HandlerRegistry, DEFAULT_GROUP};
use axum::response::Response;
use std::fmt;
use std::sync::Arc;

/// Segment 0 when the path is empty or `/`.
pub const ROOT_SEGMENT: &str = "/";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verb {
    Create,
    Read,
    Update,
    Delete,
}

impl Verb {
    /// Total mapping from a transport or override verb. Unknown values read.
    pub fn from_method(method: &str) -> Verb {
        match method.trim().to_ascii_uppercase().as_str() {
            "POST" | "CREATE" => Verb::Create,
            "PUT" | "PATCH" | "UPDATE" => Verb::Update,
            "DELETE" => Verb::Delete,
            _ => Verb::Read,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Create => "create",
            Verb::Read => "read",
            Verb::Update => "update",
            Verb::Delete => "delete",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Split a path on `/`, dropping empty pieces. Never yields an empty segment 0.
pub fn extract_segments(path: &str) -> Vec<String> {
    let segments: Vec<String> = path
        .split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    if segments.is_empty() {
        vec![ROOT_SEGMENT.to_string()]
    } else {
        segments
    }
}

/// The override verb, when present, beats the transport verb.
pub fn resolve_verb(transport: &str, override_verb: Option<&str>) -> Verb {
    Verb::from_method(override_verb.unwrap_or(transport))
}

/// Where a request goes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Route {
    pub group: String,
    pub verb: Verb,
    pub arg: Option<String>,
}

pub fn route(request: &IncomingRequest) -> Route {
    let verb = resolve_verb(request.method(), request.override_verb());
    match request.segment(0) {
        None | Some(ROOT_SEGMENT) => Route {
            group: DEFAULT_GROUP.to_string(),
            verb,
            arg: None,
        },
        Some(first) => Route {
            group: handler_group_name(first),
            verb,
            arg: request.segment(1).map(str::to_string),
        },
    }
}

async fn invoke(handler: &dyn Handler, verb: Verb, arg: Option<&str>) -> Result<Response, AppError> {
    match verb {
        Verb::Create => handler.create(arg).await,
        Verb::Read => handler.read(arg).await,
        Verb::Update => handler.update(arg).await,
        Verb::Delete => handler.delete(arg).await,
    }
}

/// Route the facade's request and run the handler. Unknown groups are recovered here
/// by calling the default group's `not_found`; a missing default group is fatal.
pub async fn dispatch(facade: Arc<Facade>, registry: &HandlerRegistry) -> Result<Response, AppError> {
    let route = route(facade.request());
    tracing::debug!(group = %route.group, verb = %route.verb, arg = ?route.arg, "dispatch");

    if let Some(handler) = registry.resolve(&route.group, Arc::clone(&facade)) {
        return invoke(handler.as_ref(), route.verb, route.arg.as_deref()).await;
    }

    if route.group == DEFAULT_GROUP {
        return Err(ConfigError::MissingHandler(DEFAULT_GROUP.to_string()).into());
    }
    tracing::info!(group = %route.group, path = %facade.request().path(), "no handler, falling back to not_found");
    let home = registry
        .resolve(DEFAULT_GROUP, facade)
        .ok_or_else(|| ConfigError::MissingHandler(DEFAULT_GROUP.to_string()))?;
    home.not_found().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_zero_is_never_empty() {
        for path in ["", "/", "//", "///x", "/users/", "users", "/a//b/", "?", " "] {
            let segs = extract_segments(path);
            assert!(!segs[0].is_empty(), "path {path:?} gave {segs:?}");
        }
        assert_eq!(extract_segments("/"), ["/"]);
        assert_eq!(extract_segments("//users//42/"), ["users", "42"]);
    }

    #[test]
    fn verb_table_is_total() {
        let cases = [
            ("POST", Verb::Create),
            ("CREATE", Verb::Create),
            ("PUT", Verb::Update),
            ("PATCH", Verb::Update),
            ("UPDATE", Verb::Update),
            ("DELETE", Verb::Delete),
            ("GET", Verb::Read),
            ("HEAD", Verb::Read),
            ("OPTIONS", Verb::Read),
            ("", Verb::Read),
            ("frobnicate", Verb::Read),
            ("delete", Verb::Delete),
        ];
        for (method, expected) in cases {
            assert_eq!(Verb::from_method(method), expected, "{method}");
        }
    }

    #[test]
    fn override_takes_precedence() {
        assert_eq!(resolve_verb("POST", Some("DELETE")), Verb::Delete);
        assert_eq!(resolve_verb("POST", Some("bogus")), Verb::Read);
        assert_eq!(resolve_verb("POST", None), Verb::Create);
    }

    #[test]
    fn put_on_member_path() {
        let r = route(&IncomingRequest::new("PUT", "/users/42"));
        assert_eq!(
            r,
            Route {
                group: "User".into(),
                verb: Verb::Update,
                arg: Some("42".into())
            }
        );
    }

    #[test]
    fn root_goes_home_without_arg() {
        let r = route(&IncomingRequest::new("GET", "/"));
        assert_eq!(r.group, "Home");
        assert_eq!(r.verb, Verb::Read);
        assert_eq!(r.arg, None);
    }

    #[test]
    fn form_override_routes_delete() {
        let req = IncomingRequest::new("POST", "/posts/9").with_form("_method", "DELETE");
        let r = route(&req);
        assert_eq!((r.group.as_str(), r.verb, r.arg.as_deref()), ("Post", Verb::Delete, Some("9")));
    }
}
