//! Template rendering and the i18n dictionary.

use crate::error::AppError;
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

const TEMPLATE_EXT: &str = "html";

fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{\s*(i18n:)?([A-Za-z0-9_.\-]+)\s*\}\}").expect("static regex")
    })
}

/// `{lang: {key: text}}`.
#[derive(Clone, Debug, Default)]
pub struct I18n {
    dict: HashMap<String, HashMap<String, String>>,
}

impl I18n {
    /// A missing file gives an empty dictionary; a malformed one is an error.
    pub async fn load(path: &Path) -> Result<Self, AppError> {
        let raw = match tokio::fs::read(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no i18n dictionary");
                return Ok(I18n::default());
            }
            Err(e) => return Err(e.into()),
        };
        Self::from_slice(&raw)
    }

    pub fn from_slice(raw: &[u8]) -> Result<Self, AppError> {
        let dict = serde_json::from_slice(raw).map_err(|e| AppError::collaborator("i18n", e))?;
        Ok(I18n { dict })
    }

    /// Text for `key` in `lang`, or the key itself.
    pub fn translate<'a>(&'a self, lang: &str, key: &'a str) -> &'a str {
        self.dict
            .get(lang)
            .and_then(|d| d.get(key))
            .map(String::as_str)
            .unwrap_or(key)
    }
}

pub struct View {
    dir: PathBuf,
    i18n: I18n,
    lang: String,
}

impl View {
    pub fn new(dir: PathBuf, i18n: I18n, lang: impl Into<String>) -> Self {
        View {
            dir,
            i18n,
            lang: lang.into(),
        }
    }

    pub fn lang(&self) -> &str {
        &self.lang
    }

    pub fn i18n(&self, key: &str) -> String {
        self.i18n.translate(&self.lang, key).to_string()
    }

    /// Render `<views>/<name>.html` with `data`.
    pub async fn view(&self, name: &str, data: &Value) -> Result<String, AppError> {
        let path = self.template_path(name)?;
        let template = tokio::fs::read_to_string(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::NotFound(format!("template {}", name))
            } else {
                e.into()
            }
        })?;
        Ok(self.render_str(&template, data))
    }

    /// Substitute `{{ key }}`, `{{ a.b }}` and `{{ i18n:key }}`. Values are HTML-escaped;
    /// unknown keys render empty.
    pub fn render_str(&self, template: &str, data: &Value) -> String {
        placeholder()
            .replace_all(template, |caps: &Captures| {
                let key = &caps[2];
                let text = if caps.get(1).is_some() {
                    self.i18n.translate(&self.lang, key).to_string()
                } else {
                    lookup(data, key).map(display).unwrap_or_default()
                };
                escape_html(&text)
            })
            .into_owned()
    }

    fn template_path(&self, name: &str) -> Result<PathBuf, AppError> {
        let rel = Path::new(name);
        if rel.components().any(|c| !matches!(c, Component::Normal(_))) {
            return Err(AppError::BadRequest(format!("invalid template name: {}", name)));
        }
        let mut path = self.dir.join(rel);
        if path.extension().is_none() {
            path.set_extension(TEMPLATE_EXT);
        }
        Ok(path)
    }
}

fn lookup<'a>(data: &'a Value, key: &str) -> Option<&'a Value> {
    key.split('.').try_fold(data, |cur, part| match cur {
        Value::Object(map) => map.get(part),
        Value::Array(items) => part.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn display(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn view(dir: &Path) -> View {
        let i18n = I18n::from_slice(br#"{"pt": {"hello": "Ola"}, "en": {"hello": "Hello"}}"#).unwrap();
        View::new(dir.to_path_buf(), i18n, "pt")
    }

    #[test]
    fn placeholders_are_escaped() {
        let v = view(Path::new("."));
        let out = v.render_str(
            "<p>{{ user.name }} / {{user.tags.1}} / {{ missing }} / {{ i18n:hello }}</p>",
            &json!({"user": {"name": "<b>Ann</b>", "tags": ["a", 7]}}),
        );
        assert_eq!(out, "<p>&lt;b&gt;Ann&lt;/b&gt; / 7 /  / Ola</p>");
    }

    #[test]
    fn missing_translation_returns_key() {
        let v = view(Path::new("."));
        assert_eq!(v.i18n("hello"), "Ola");
        assert_eq!(v.i18n("bye"), "bye");
    }

    #[tokio::test]
    async fn renders_template_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("user")).unwrap();
        std::fs::write(dir.path().join("user/show.html"), "Hi {{ name }}").unwrap();
        let v = view(dir.path());
        assert_eq!(v.view("user/show", &json!({"name": "Bo"})).await.unwrap(), "Hi Bo");
        assert!(matches!(v.view("nope", &json!({})).await, Err(AppError::NotFound(_))));
        assert!(matches!(v.view("../secret", &json!({})).await, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn missing_dictionary_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let i18n = I18n::load(&dir.path().join("i18n.json")).await.unwrap();
        assert_eq!(i18n.translate("en", "k"), "k");
    }
}
