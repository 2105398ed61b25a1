//! Typed partial update of the configuration document.
//!
//! Only the four managed sections can be patched. Keys outside this shape are
//! dropped at deserialization, so an unknown field can never reach the file.

use serde::Deserialize;
use utoipa::ToSchema;

use super::document::{Document, Platform};

#[derive(ToSchema, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigPatch {
    pub site: Option<SitePatch>,
    pub downloads: Option<DownloadsPatch>,
    pub analytics: Option<AnalyticsPatch>,
    pub contact: Option<ContactPatch>,
}

#[derive(ToSchema, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct SitePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub keywords: Option<String>,
    /// Set only by the icon upload path.
    #[serde(skip_deserializing)]
    pub favicon: Option<String>,
}

#[derive(ToSchema, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadsPatch {
    pub android: Option<DownloadPatch>,
    pub ios: Option<DownloadPatch>,
    pub windows: Option<DownloadPatch>,
    pub mac: Option<DownloadPatch>,
}

#[derive(ToSchema, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadPatch {
    pub url: Option<String>,
    /// Empty keeps the current version.
    pub version: Option<String>,
}

#[derive(ToSchema, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalyticsPatch {
    pub google: Option<ProviderPatch>,
    pub custom: Option<CustomAnalyticsPatch>,
}

#[derive(ToSchema, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderPatch {
    /// Empty keeps the current id.
    pub id: Option<String>,
    pub enabled: Option<bool>,
}

#[derive(ToSchema, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomAnalyticsPatch {
    pub code: Option<String>,
    pub enabled: Option<bool>,
}

#[derive(ToSchema, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactPatch {
    pub email: Option<String>,
    /// Empty keeps the current company.
    pub company: Option<String>,
}

fn set_trimmed(target: &mut String, value: Option<&String>) {
    if let Some(value) = value {
        value.trim().clone_into(target);
    }
}

fn set_non_empty(target: &mut String, value: Option<&String>) {
    if let Some(value) = value.map(|v| v.trim()).filter(|v| !v.is_empty()) {
        value.clone_into(target);
    }
}

impl ConfigPatch {
    /// Patch that only records a new icon location.
    #[must_use]
    pub fn favicon(path: impl Into<String>) -> Self {
        Self {
            site: Some(SitePatch {
                favicon: Some(path.into()),
                ..SitePatch::default()
            }),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    fn download(&self, platform: Platform) -> Option<&DownloadPatch> {
        let downloads = self.downloads.as_ref()?;
        match platform {
            Platform::Android => downloads.android.as_ref(),
            Platform::Ios => downloads.ios.as_ref(),
            Platform::Windows => downloads.windows.as_ref(),
            Platform::Mac => downloads.mac.as_ref(),
        }
    }

    /// Merge the patch into a copy of `current`. Bookkeeping fields are left
    /// alone; the store stamps them after validation.
    #[must_use]
    pub fn apply(&self, current: &Document) -> Document {
        let mut doc = current.clone();

        if let Some(site) = &self.site {
            set_trimmed(&mut doc.site.title, site.title.as_ref());
            set_trimmed(&mut doc.site.description, site.description.as_ref());
            set_trimmed(&mut doc.site.keywords, site.keywords.as_ref());
            if let Some(favicon) = &site.favicon {
                doc.site.favicon = Some(favicon.clone());
            }
        }

        for platform in Platform::ALL {
            if let Some(patch) = self.download(platform) {
                let target = doc.downloads.get_mut(platform);
                set_trimmed(&mut target.url, patch.url.as_ref());
                set_non_empty(&mut target.version, patch.version.as_ref());
            }
        }

        if let Some(analytics) = &self.analytics {
            if let Some(google) = &analytics.google {
                set_non_empty(&mut doc.analytics.google.id, google.id.as_ref());
                if let Some(enabled) = google.enabled {
                    doc.analytics.google.enabled = enabled;
                }
            }
            if let Some(custom) = &analytics.custom {
                if let Some(code) = &custom.code {
                    doc.analytics.custom.code.clone_from(code);
                }
                if let Some(enabled) = custom.enabled {
                    doc.analytics.custom.enabled = enabled;
                }
            }
        }

        if let Some(contact) = &self.contact {
            set_trimmed(&mut doc.contact.email, contact.email.as_ref());
            set_non_empty(&mut doc.contact.company, contact.company.as_ref());
        }

        doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::document::sample;
    use anyhow::Result;

    #[test]
    fn empty_patch_changes_nothing() {
        let doc = sample();
        let patch = ConfigPatch::default();
        assert!(patch.is_empty());
        assert_eq!(patch.apply(&doc), doc);
    }

    #[test]
    fn unknown_and_bookkeeping_keys_are_ignored() -> Result<()> {
        let patch: ConfigPatch = serde_json::from_str(
            r#"{
                "version": "9.9.9",
                "lastModified": "never",
                "secrets": { "x": 1 },
                "site": { "favicon": "../../etc/passwd", "color": "red" }
            }"#,
        )?;
        let doc = sample();
        let merged = patch.apply(&doc);
        assert_eq!(merged, doc);
        Ok(())
    }

    #[test]
    fn trims_text_and_keeps_versions_when_blank() -> Result<()> {
        let patch: ConfigPatch = serde_json::from_str(
            r#"{
                "site": { "title": "  New title  " },
                "downloads": { "ios": { "url": " https://example.com/ios ", "version": "" } },
                "contact": { "company": "   " }
            }"#,
        )?;
        let doc = sample();
        let merged = patch.apply(&doc);
        assert_eq!(merged.site.title, "New title");
        assert_eq!(merged.downloads.ios.url, "https://example.com/ios");
        assert_eq!(merged.downloads.ios.version, doc.downloads.ios.version);
        assert_eq!(merged.contact.company, doc.contact.company);
        assert_eq!(merged.site.description, doc.site.description);
        Ok(())
    }

    #[test]
    fn analytics_flags_follow_the_patch() -> Result<()> {
        let patch: ConfigPatch = serde_json::from_str(
            r#"{ "analytics": { "google": { "enabled": true }, "custom": { "code": "<script></script>", "enabled": true } } }"#,
        )?;
        let merged = patch.apply(&sample());
        assert!(merged.analytics.google.enabled);
        assert_eq!(merged.analytics.google.id, "G-TEST");
        assert!(merged.analytics.custom.enabled);
        assert_eq!(merged.analytics.custom.code, "<script></script>");
        Ok(())
    }

    #[test]
    fn favicon_patch_sets_only_the_icon() {
        let doc = sample();
        let merged = ConfigPatch::favicon("public/favicon.png").apply(&doc);
        assert_eq!(merged.site.favicon.as_deref(), Some("public/favicon.png"));
        assert_eq!(merged.site.title, doc.site.title);
    }
}
