//! The persisted site configuration document.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub site: Site,
    pub downloads: Downloads,
    pub analytics: Analytics,
    pub contact: Contact,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
    #[serde(default)]
    pub version: String,
    /// Keys this crate does not manage; written back untouched.
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub extra: Map<String, Value>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Site {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub keywords: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub extra: Map<String, Value>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Download {
    pub url: String,
    #[serde(default)]
    pub version: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Downloads {
    pub android: Download,
    pub ios: Download,
    pub windows: Download,
    pub mac: Download,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Android,
    Ios,
    Windows,
    Mac,
}

impl Platform {
    pub const ALL: [Self; 4] = [Self::Android, Self::Ios, Self::Windows, Self::Mac];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Android => "android",
            Self::Ios => "ios",
            Self::Windows => "windows",
            Self::Mac => "mac",
        }
    }
}

impl Downloads {
    #[must_use]
    pub fn get(&self, platform: Platform) -> &Download {
        match platform {
            Platform::Android => &self.android,
            Platform::Ios => &self.ios,
            Platform::Windows => &self.windows,
            Platform::Mac => &self.mac,
        }
    }

    pub fn get_mut(&mut self, platform: Platform) -> &mut Download {
        match platform {
            Platform::Android => &mut self.android,
            Platform::Ios => &mut self.ios,
            Platform::Windows => &mut self.windows,
            Platform::Mac => &mut self.mac,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Analytics {
    pub google: AnalyticsProvider,
    pub custom: CustomAnalytics,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct AnalyticsProvider {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub enabled: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct CustomAnalytics {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub enabled: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Contact {
    pub email: String,
    #[serde(default)]
    pub company: String,
}

impl Document {
    /// Parse a document from its on-disk JSON form.
    ///
    /// # Errors
    /// Returns the `serde_json` error when the input is not a valid document.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Serialize to the on-disk form: pretty JSON with two-space indentation.
    ///
    /// # Errors
    /// Returns the `serde_json` error if serialization fails.
    pub fn to_pretty_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }
}

#[cfg(test)]
pub(crate) fn sample() -> Document {
    let download = |url: &str| Download {
        url: url.to_string(),
        version: "1.0.0".to_string(),
    };
    Document {
        site: Site {
            title: "68 Chat".to_string(),
            description: "Secure messaging for everyone".to_string(),
            keywords: "chat,messaging".to_string(),
            favicon: Some("public/favicon.ico".to_string()),
            extra: Map::new(),
        },
        downloads: Downloads {
            android: download("https://example.com/app.apk"),
            ios: download("https://apps.apple.com/app/id1"),
            windows: download("https://example.com/setup.exe"),
            mac: download("https://example.com/app.dmg"),
        },
        analytics: Analytics {
            google: AnalyticsProvider {
                id: "G-TEST".to_string(),
                enabled: false,
            },
            custom: CustomAnalytics::default(),
        },
        contact: Contact {
            email: "hello@example.com".to_string(),
            company: "Example Ltd".to_string(),
        },
        last_modified: Some("2024-01-01T00:00:00.000Z".to_string()),
        version: "1.0.0".to_string(),
        extra: Map::new(),
    }
}
