//! Reading folder contents from the public folder page.
//!
//! Without an API key, the listing comes from the folder's HTML page. The
//! page embeds its children as a JavaScript string literal assigned to
//! `window['_DRIVE_ivd']`; that literal holds a JSON array whose first element
//! lists the children as `[id, parents, name, mimeType, ...]` rows.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::listing::RemoteFile;

/// `window['_DRIVE_ivd'] = '<escaped JSON>'`.
#[allow(clippy::expect_used)]
static DRIVE_IVD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"window\['_DRIVE_ivd'\]\s*=\s*'((?:[^'\\]|\\.)*)'"#)
        .expect("folder data regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<title>(.*?)</title>").expect("title regex is valid") // Static pattern, safe to panic
});

const TITLE_SUFFIX: &str = " - Google Drive";

/// A folder as read from its public page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FolderPage {
    pub name: String,
    pub files: Vec<RemoteFile>,
}

/// Parses a folder page.
///
/// Returns `None` when the page carries no folder data, which is what the
/// service serves for files and for folders that are not shared publicly.
pub(crate) fn parse_folder_page(id: &str, html: &str) -> Option<FolderPage> {
    let literal = DRIVE_IVD_RE.captures(html)?.get(1)?.as_str();
    let decoded: String = serde_json::from_str(&js_literal_to_json(literal)).ok()?;
    let data: Value = serde_json::from_str(&decoded).ok()?;

    let files = match data.get(0) {
        Some(Value::Array(rows)) => rows.iter().filter_map(row_to_file).collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(_) => return None,
    };

    let name = TITLE_RE
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|title| {
            let title = title.as_str().trim();
            unescape_html(title.strip_suffix(TITLE_SUFFIX).unwrap_or(title))
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| id.to_string());

    Some(FolderPage { name, files })
}

fn row_to_file(row: &Value) -> Option<RemoteFile> {
    Some(RemoteFile {
        id: row.get(0)?.as_str()?.to_string(),
        name: row.get(2)?.as_str()?.to_string(),
        mime_type: row.get(3)?.as_str().unwrap_or_default().to_string(),
    })
}

/// Rewrites the body of a single-quoted JavaScript string literal as a JSON
/// string literal, so `serde_json` can decode the escapes.
fn js_literal_to_json(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 2);
    out.push('"');
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('x') => {
                    out.push_str("\\u00");
                    out.extend(chars.by_ref().take(2));
                }
                Some(next @ ('"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't' | 'u')) => {
                    out.push('\\');
                    out.push(next);
                }
                Some(other) => out.push(other),
                None => {}
            },
            '"' => out.push_str("\\\""),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", u32::from(c))),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn unescape_html(text: &str) -> String {
    text.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

    /// Escapes JSON the way the service embeds it in the page.
    fn page_with(title: &str, data: &str) -> String {
        let escaped = data
            .replace('\\', "\\\\")
            .replace('"', "\\x22")
            .replace('\'', "\\x27");
        format!(
            "<html><head><title>{title}</title></head><body>\
             <script>window['_DRIVE_ivd'] = '{escaped}';</script></body></html>"
        )
    }

    #[test]
    fn test_parses_children_and_title() {
        let data = format!(
            r#"[[["a1",["root"],"notes.txt","text/plain"],["s1",["root"],"sub","{FOLDER_MIME}"]]]"#
        );
        let html = page_with("Papers &amp; Notes - Google Drive", &data);

        let page = parse_folder_page("root", &html).unwrap();
        assert_eq!(page.name, "Papers & Notes");
        assert_eq!(page.files.len(), 2);
        assert_eq!(page.files[0].id, "a1");
        assert_eq!(page.files[0].name, "notes.txt");
        assert!(!page.files[0].is_folder());
        assert!(page.files[1].is_folder());
    }

    #[test]
    fn test_decodes_escaped_names() {
        let data = r#"[[["a1",["root"],"it's \"quoted\" é.txt","text/plain"]]]"#;
        let page = parse_folder_page("root", &page_with("R - Google Drive", data)).unwrap();
        assert_eq!(page.files[0].name, "it's \"quoted\" \u{e9}.txt");
    }

    #[test]
    fn test_empty_folder_has_null_children() {
        let page = parse_folder_page("root", &page_with("Empty - Google Drive", "[null]")).unwrap();
        assert_eq!(page.name, "Empty");
        assert!(page.files.is_empty());
    }

    #[test]
    fn test_missing_title_falls_back_to_id() {
        let html = "<script>window['_DRIVE_ivd'] = '[[]]';</script>";
        let page = parse_folder_page("1Abc", html).unwrap();
        assert_eq!(page.name, "1Abc");
    }

    #[test]
    fn test_page_without_folder_data_is_none() {
        assert!(parse_folder_page("x", "<html><title>Sign in</title></html>").is_none());
    }

    #[test]
    fn test_js_literal_escapes() {
        let json = js_literal_to_json(r#"a\x22b\'c\/d\\e"f"#);
        let decoded: String = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, r#"a"b'c/d\e"f"#);
    }
}
