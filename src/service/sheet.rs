//! Tabular files as `Vec<Vec<String>>`. Only CSV is supported.

use crate::error::AppError;
use std::path::Path;

pub type SheetRows = Vec<Vec<String>>;

#[derive(Clone, Copy, Debug, Default)]
pub struct Sheet;

impl Sheet {
    pub async fn to_array(&self, path: &Path) -> Result<SheetRows, AppError> {
        check_format(path)?;
        let raw = tokio::fs::read_to_string(path).await?;
        parse_csv(&raw)
    }

    /// Overwrites `path`.
    pub async fn to_sheet(&self, rows: &[Vec<String>], path: &Path) -> Result<(), AppError> {
        check_format(path)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, write_csv(rows)).await?;
        Ok(())
    }
}

fn check_format(path: &Path) -> Result<(), AppError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => Ok(()),
        _ => Err(AppError::collaborator(
            "sheet",
            format!("unsupported sheet format: {}", path.display()),
        )),
    }
}

/// RFC 4180 reader. Accepts LF or CRLF; an empty line is an empty row.
pub fn parse_csv(raw: &str) -> Result<SheetRows, AppError> {
    let mut rows = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut started = false;
    let mut in_quotes = false;
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
            continue;
        }
        match c {
            '"' => {
                in_quotes = true;
                started = true;
            }
            ',' => {
                row.push(std::mem::take(&mut field));
                started = false;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                if started || !row.is_empty() {
                    row.push(std::mem::take(&mut field));
                }
                rows.push(std::mem::take(&mut row));
                started = false;
            }
            _ => {
                field.push(c);
                started = true;
            }
        }
    }
    if in_quotes {
        return Err(AppError::collaborator("sheet", "unterminated quoted field"));
    }
    if started || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    Ok(rows)
}

pub fn write_csv(rows: &[Vec<String>]) -> String {
    let mut out = String::new();
    for row in rows {
        let lone = row.len() == 1;
        let line: Vec<String> = row
            .iter()
            .map(|f| {
                if f.contains([',', '"', '\n', '\r']) || (lone && f.is_empty()) {
                    format!("\"{}\"", f.replace('"', "\"\""))
                } else {
                    f.clone()
                }
            })
            .collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(raw: &[&[&str]]) -> SheetRows {
        raw.iter().map(|r| r.iter().map(|s| s.to_string()).collect()).collect()
    }

    #[test]
    fn quoting_rules() {
        let parsed = parse_csv("a,\"b,c\",\"say \"\"hi\"\"\"\r\n1,,\"multi\nline\"\n").unwrap();
        assert_eq!(parsed, rows(&[&["a", "b,c", "say \"hi\""], &["1", "", "multi\nline"]]));
        assert!(parse_csv("\"open").is_err());
    }

    #[tokio::test]
    async fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/report.CSV");
        let data = rows(&[&["name", "note"], &["Ann", "a, b"], &[""], &[], &["x", ""]]);
        Sheet.to_sheet(&data, &path).await.unwrap();
        assert_eq!(Sheet.to_array(&path).await.unwrap(), data);
    }

    #[tokio::test]
    async fn other_formats_are_rejected() {
        let err = Sheet.to_array(Path::new("book.xlsx")).await.unwrap_err();
        assert!(matches!(err, AppError::Collaborator { service: "sheet", .. }));
    }
}
