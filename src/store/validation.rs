//! Field constraints every persisted document must satisfy.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;
use utoipa::ToSchema;

use super::document::{Document, Platform};

pub const TITLE_MAX: usize = 100;
pub const DESCRIPTION_MAX: usize = 500;
pub const KEYWORDS_MAX: usize = 200;
pub const VERSION_MAX: usize = 32;
pub const COMPANY_MAX: usize = 100;
pub const ANALYTICS_ID_MAX: usize = 64;
pub const CUSTOM_CODE_MAX: usize = 10_000;

/// A single failed constraint, keyed by the dotted field path.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email))
}

/// Absolute http(s) URL with a host.
pub fn valid_url(value: &str) -> bool {
    Url::parse(value).is_ok_and(|url| {
        matches!(url.scheme(), "http" | "https") && url.host_str().is_some_and(|h| !h.is_empty())
    })
}

fn check_length(
    errors: &mut Vec<FieldError>,
    field: &str,
    value: &str,
    min: usize,
    max: usize,
) {
    let len = value.chars().count();
    if len < min || len > max {
        let message = if min == 0 {
            format!("must be at most {max} characters")
        } else {
            format!("must be between {min} and {max} characters")
        };
        errors.push(FieldError::new(field, message));
    }
}

/// Check every constrained field of `doc`.
///
/// Returns all violations at once so the caller can report the full list.
pub fn validate(doc: &Document) -> Vec<FieldError> {
    let mut errors = Vec::new();

    check_length(&mut errors, "site.title", &doc.site.title, 1, TITLE_MAX);
    check_length(
        &mut errors,
        "site.description",
        &doc.site.description,
        1,
        DESCRIPTION_MAX,
    );
    check_length(&mut errors, "site.keywords", &doc.site.keywords, 0, KEYWORDS_MAX);

    for platform in Platform::ALL {
        let download = doc.downloads.get(platform);
        if !valid_url(&download.url) {
            errors.push(FieldError::new(
                format!("downloads.{}.url", platform.as_str()),
                "must be an absolute http(s) URL",
            ));
        }
        check_length(
            &mut errors,
            &format!("downloads.{}.version", platform.as_str()),
            &download.version,
            1,
            VERSION_MAX,
        );
    }

    check_length(
        &mut errors,
        "analytics.google.id",
        &doc.analytics.google.id,
        0,
        ANALYTICS_ID_MAX,
    );
    check_length(
        &mut errors,
        "analytics.custom.code",
        &doc.analytics.custom.code,
        0,
        CUSTOM_CODE_MAX,
    );

    if !valid_email(&doc.contact.email) {
        errors.push(FieldError::new("contact.email", "must be a valid email address"));
    }
    check_length(&mut errors, "contact.company", &doc.contact.company, 0, COMPANY_MAX);

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::document::sample;

    #[test]
    fn sample_document_is_valid() {
        assert!(validate(&sample()).is_empty());
    }

    #[test]
    fn valid_email_rejects_missing_parts() {
        assert!(valid_email("name.surname@example.co"));
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-domain@"));
        assert!(!valid_email("spaces in@example.com"));
    }

    #[test]
    fn valid_url_requires_http_scheme_and_host() {
        assert!(valid_url("https://example.com/app.apk"));
        assert!(valid_url("http://localhost:8080/x"));
        assert!(!valid_url("ftp://example.com/file"));
        assert!(!valid_url("example.com/app"));
        assert!(!valid_url("javascript:alert(1)"));
        assert!(!valid_url(""));
    }

    #[test]
    fn reports_every_offending_field() {
        let mut doc = sample();
        doc.site.title = String::new();
        doc.site.keywords = "k".repeat(KEYWORDS_MAX + 1);
        doc.downloads.mac.url = "not a url".to_string();
        doc.contact.email = "nope".to_string();

        let fields: Vec<String> = validate(&doc).into_iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "site.title",
                "site.keywords",
                "downloads.mac.url",
                "contact.email"
            ]
        );
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        let mut doc = sample();
        doc.site.title = "网".repeat(TITLE_MAX);
        assert!(validate(&doc).is_empty());
        doc.site.title.push('站');
        assert_eq!(validate(&doc).len(), 1);
    }
}
