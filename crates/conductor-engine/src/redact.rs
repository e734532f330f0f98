use std::sync::LazyLock;

use regex::Regex;

pub const REDACTED: &str = "[REDACTED]";

/// Query strings of http(s) URLs.
static QUERY_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r#"(https?://[^\s?#"']+)\?[^\s#"')]*"#).unwrap());

/// `token=...`, `"password": "..."`, `Authorization: Bearer ...` and friends.
static CREDENTIAL_RE: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(
    r#"(?i)\b((?:[a-z]+[_-])?(?:token|key|secret|password|passwd|authorization))(["']?\s*[:=]\s*["']?)(?:bearer\s+|basic\s+)?[^\s&,;"']+"#,
  )
  .unwrap()
});

/// Mask credentials in a message. Applying it twice changes nothing.
pub fn redact(message: &str) -> String {
  let masked = QUERY_RE.replace_all(message, format!("${{1}}?{}", REDACTED).as_str());
  CREDENTIAL_RE
    .replace_all(&masked, format!("${{1}}${{2}}{}", REDACTED).as_str())
    .into_owned()
}
