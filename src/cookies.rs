//! Cookie boundary: converting a browser-automation JSON cookie export
//! into the Netscape jar yt-dlp consumes, plus jar validation.
//!
//! The jar itself is produced out-of-band (a headless login harvests the
//! session); this side only converts and reads it.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::core::{config, AppError};

/// Netscape cookie file header line; yt-dlp refuses jars without it
const NETSCAPE_HEADER: &str = "# Netscape HTTP Cookie File";

/// One cookie as exported by the browser-automation login (Playwright /
/// CDP JSON shape).
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserCookie {
    #[serde(default)]
    pub domain: String,
    #[serde(default = "default_path")]
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    /// Unix timestamp; absent or negative means a session cookie
    #[serde(default)]
    pub expires: Option<f64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
}

fn default_path() -> String {
    "/".to_string()
}

/// Renders cookies in Netscape jar format.
///
/// Line shape: `domain \t flag \t path \t secure \t expiry \t name \t value`
/// where flag is TRUE for domain-wide cookies (leading dot).
pub fn to_netscape(cookies: &[BrowserCookie]) -> String {
    let mut out = String::from(NETSCAPE_HEADER);
    out.push('\n');

    for cookie in cookies {
        let flag = if cookie.domain.starts_with('.') { "TRUE" } else { "FALSE" };
        let secure = if cookie.secure { "TRUE" } else { "FALSE" };
        let expiry = match cookie.expires {
            Some(ts) if ts > 0.0 => (ts as i64).to_string(),
            _ => "0".to_string(),
        };
        out.push_str(&format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\n",
            cookie.domain, flag, cookie.path, secure, expiry, cookie.name, cookie.value
        ));
    }

    out
}

/// Converts a JSON cookie export file into a Netscape jar file.
///
/// Returns the number of cookies written.
pub fn convert_file(input: &Path, output: &Path) -> Result<usize, AppError> {
    let raw = std::fs::read_to_string(input)?;
    let cookies: Vec<BrowserCookie> = serde_json::from_str(&raw)?;
    std::fs::write(output, to_netscape(&cookies))?;
    log::info!(
        "converted {} cookies: {} -> {}",
        cookies.len(),
        input.display(),
        output.display()
    );
    Ok(cookies.len())
}

/// The configured jar path with tilde expansion, if any.
pub fn configured_jar() -> Option<PathBuf> {
    let raw = config::YTDL_COOKIES_FILE.as_ref()?;
    if raw.is_empty() {
        return None;
    }
    Some(PathBuf::from(shellexpand::tilde(raw).to_string()))
}

/// Cheap sanity check: the file exists and starts with the Netscape header.
pub fn jar_looks_valid(path: &Path) -> bool {
    match std::fs::read_to_string(path) {
        Ok(content) => content.starts_with(NETSCAPE_HEADER),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_json() -> &'static str {
        r#"[
            {"domain": ".youtube.com", "path": "/", "secure": true, "expires": 1767225600.25, "name": "SID", "value": "abc"},
            {"domain": "accounts.google.com", "name": "NID", "value": "xyz"}
        ]"#
    }

    // ==================== conversion tests ====================

    #[test]
    fn test_to_netscape_fields_and_order() {
        let cookies: Vec<BrowserCookie> = serde_json::from_str(sample_json()).expect("fixture parses");
        let jar = to_netscape(&cookies);
        let lines: Vec<&str> = jar.lines().collect();

        assert_eq!(lines[0], "# Netscape HTTP Cookie File");
        assert_eq!(lines[1], ".youtube.com\tTRUE\t/\tTRUE\t1767225600\tSID\tabc");
        assert_eq!(lines[2], "accounts.google.com\tFALSE\t/\tFALSE\t0\tNID\txyz");
    }

    #[test]
    fn test_dotted_domain_sets_flag_true() {
        let cookie = BrowserCookie {
            domain: ".example.com".to_string(),
            path: "/".to_string(),
            secure: false,
            expires: None,
            name: "a".to_string(),
            value: "b".to_string(),
        };
        assert!(to_netscape(&[cookie]).contains("\tTRUE\t/\t"));
    }

    #[test]
    fn test_session_cookie_expiry_is_zero() {
        let cookie = BrowserCookie {
            domain: "x".to_string(),
            path: "/".to_string(),
            secure: false,
            expires: Some(-1.0),
            name: "a".to_string(),
            value: "b".to_string(),
        };
        assert!(to_netscape(&[cookie]).contains("\t0\ta\tb"));
    }

    #[test]
    fn test_empty_export_still_has_header() {
        assert_eq!(to_netscape(&[]), "# Netscape HTTP Cookie File\n");
    }

    // ==================== file tests ====================

    #[test]
    fn test_convert_file_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("cookies.json");
        let output = dir.path().join("cookies.txt");
        std::fs::write(&input, sample_json()).expect("write input");

        let count = convert_file(&input, &output).expect("convert");
        assert_eq!(count, 2);
        assert!(jar_looks_valid(&output));
    }

    #[test]
    fn test_convert_file_rejects_bad_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input = dir.path().join("cookies.json");
        let output = dir.path().join("cookies.txt");
        std::fs::write(&input, "not json").expect("write input");

        assert!(matches!(convert_file(&input, &output), Err(AppError::CookieFormat(_))));
    }

    #[test]
    fn test_jar_looks_valid_rejects_missing_and_non_netscape() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(!jar_looks_valid(&dir.path().join("missing.txt")));

        let bogus = dir.path().join("bogus.txt");
        std::fs::write(&bogus, "[{\"name\": \"json\"}]").expect("write");
        assert!(!jar_looks_valid(&bogus));
    }
}
