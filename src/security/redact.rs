//! Credential redaction for log output.
//!
//! Transport errors often embed the full upstream URL, query string
//! included. Everything written to the log about a failed call goes through
//! [`redact_credentials`] first.

use std::error::Error;
use std::sync::LazyLock;

use regex::Regex;

/// Replacement for a credential value.
pub const REDACTED: &str = "[REDACTED]";

static CREDENTIAL_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(api_?key=)[^&\s"']+"#).expect("credential pattern is valid")
});

/// Replace every `apiKey=<token>` (any case, optional underscore) with a
/// redaction marker.
pub fn redact_credentials(text: &str) -> String {
    CREDENTIAL_PARAM
        .replace_all(text, format!("${{1}}{REDACTED}"))
        .into_owned()
}

/// Render an error and its full `source()` chain as `outer: inner: root`.
pub fn error_chain(err: &(dyn Error + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        let text = inner.to_string();
        if !rendered.ends_with(&text) {
            rendered.push_str(": ");
            rendered.push_str(&text);
        }
        source = inner.source();
    }
    rendered
}

/// [`error_chain`] passed through [`redact_credentials`].
pub fn sanitize_error(err: &(dyn Error + 'static)) -> String {
    redact_credentials(&error_chain(err))
}
