use super::handlers::{
    admin::{config_update, favicon, login, logout, panel, verification},
    health,
};
use crate::store::asset::DEFAULT_MAX_BYTES;
use axum::extract::DefaultBodyLimit;
use utoipa::openapi::{Contact, InfoBuilder, License, OpenApiBuilder, Tag};
use utoipa_axum::{router::OpenApiRouter, routes};

pub const DEFAULT_ADMIN_PATH: &str = "/admin";

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    // Same wiring as the server, documented under the default admin path.
    let (_router, openapi) = api_router(DEFAULT_ADMIN_PATH, DEFAULT_MAX_BYTES).split_for_parts();
    openapi
}

/// Body ceiling for the icon upload route.
#[must_use]
pub fn upload_body_limit(max_file_size: usize) -> usize {
    max_file_size
        .saturating_mul(2)
        .saturating_add(favicon::MULTIPART_OVERHEAD)
}

fn admin_router(max_file_size: usize) -> OpenApiRouter {
    let upload = OpenApiRouter::new()
        .routes(routes!(favicon::upload_favicon))
        .layer(DefaultBodyLimit::max(upload_body_limit(max_file_size)));

    OpenApiRouter::new()
        .routes(routes!(panel::index))
        .routes(routes!(login::login_page, login::login))
        .routes(routes!(panel::panel))
        .routes(routes!(panel::preview))
        .routes(routes!(config_update::update_config))
        .routes(routes!(verification::verification_code))
        .routes(routes!(logout::logout))
        .merge(upload)
}

/// Build the router that also drives the `OpenAPI` document.
///
/// Admin routes are nested under `admin_path`; an empty path mounts them at the
/// root. Routes added outside (like `OPTIONS /health`) are not documented.
pub(crate) fn api_router(admin_path: &str, max_file_size: usize) -> OpenApiRouter {
    let router =
        OpenApiRouter::with_openapi(cargo_openapi()).routes(routes!(health::health));
    if admin_path.is_empty() {
        router.merge(admin_router(max_file_size))
    } else {
        router.nest(admin_path, admin_router(max_file_size))
    }
}

fn api_tags() -> Vec<Tag> {
    let mut gardi_tag = Tag::new("admin");
    gardi_tag.description = Some("Session, CSRF and configuration management".to_string());

    let mut health_tag = Tag::new("health");
    health_tag.description = Some("Liveness and configuration readability".to_string());

    vec![gardi_tag, health_tag]
}

fn cargo_openapi() -> utoipa::openapi::OpenApi {
    // Use Cargo.toml metadata instead of the utoipa-axum crate info defaults.
    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();

    info.contact = cargo_contact();
    info.license = cargo_license();

    // Tags live on the base document; merged and nested routers keep them.
    OpenApiBuilder::new().info(info).tags(Some(api_tags())).build()
}

fn cargo_contact() -> Option<Contact> {
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(':').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    match author.split_once('<') {
        Some((name, email)) => {
            let name = Some(name.trim()).filter(|n| !n.is_empty());
            let email = Some(email.trim_end_matches('>').trim()).filter(|e| !e.is_empty());
            (name, email)
        }
        None => (Some(author.trim()).filter(|n| !n.is_empty()), None),
    }
}
