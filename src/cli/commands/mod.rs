pub mod admin;
pub mod logging;

use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ColorChoice, Command,
};

pub const ARG_PORT: &str = "port";
pub const ARG_CONFIG_PATH: &str = "config-path";
pub const ARG_PUBLIC_DIR: &str = "public-dir";
pub const ARG_CORS_ORIGIN: &str = "cors-origin";

#[must_use]
pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let long_version: &'static str = Box::leak(
        format!("{} - {}", env!("CARGO_PKG_VERSION"), crate::GIT_COMMIT_HASH).into_boxed_str(),
    );

    let command = Command::new("gardi")
        .about("Site configuration admin panel")
        .version(env!("CARGO_PKG_VERSION"))
        .long_version(long_version)
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long(ARG_PORT)
                .help("Port to listen on")
                .default_value("3001")
                .env("GARDI_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_CONFIG_PATH)
                .short('c')
                .long(ARG_CONFIG_PATH)
                .help("Path of the JSON configuration document")
                .default_value("data.json")
                .env("GARDI_CONFIG_PATH"),
        )
        .arg(
            Arg::new(ARG_PUBLIC_DIR)
                .long(ARG_PUBLIC_DIR)
                .help("Directory that receives the uploaded site icon")
                .default_value("public")
                .env("GARDI_PUBLIC_DIR"),
        )
        .arg(
            Arg::new(ARG_CORS_ORIGIN)
                .long(ARG_CORS_ORIGIN)
                .help("Comma separated list of origins allowed to call the API with credentials")
                .env("GARDI_CORS_ORIGIN")
                .value_delimiter(',')
                .default_values([
                    "http://localhost:3001",
                    "http://localhost:8080",
                    "http://localhost:8081",
                ]),
        );

    let command = admin::with_args(command);
    logging::with_args(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUIRED: [&str; 7] = [
        "gardi",
        "--admin-username",
        "admin",
        "--admin-password",
        "secret",
        "--session-secret",
        "signing-key",
    ];

    #[test]
    fn test_new() {
        let command = new();

        assert_eq!(command.get_name(), "gardi");
        assert_eq!(
            command.get_about().map(ToString::to_string),
            Some("Site configuration admin panel".to_string())
        );
        assert_eq!(
            command.get_version().map(ToString::to_string),
            Some(env!("CARGO_PKG_VERSION").to_string())
        );
    }

    #[test]
    fn test_defaults() {
        temp_env::with_vars(
            [
                ("GARDI_PORT", None::<&str>),
                ("GARDI_CONFIG_PATH", None),
                ("GARDI_CORS_ORIGIN", None),
            ],
            || {
                let matches = new().get_matches_from(REQUIRED);
                assert_eq!(matches.get_one::<u16>(ARG_PORT).copied(), Some(3001));
                assert_eq!(
                    matches.get_one::<String>(ARG_CONFIG_PATH).cloned(),
                    Some("data.json".to_string())
                );
                let origins: Vec<&String> = matches
                    .get_many::<String>(ARG_CORS_ORIGIN)
                    .map(Iterator::collect)
                    .unwrap_or_default();
                assert_eq!(origins.len(), 3);
            },
        );
    }

    #[test]
    fn test_check_env() {
        temp_env::with_vars(
            [
                ("GARDI_PORT", Some("8443")),
                ("GARDI_CONFIG_PATH", Some("/srv/site/data.json")),
                ("GARDI_CORS_ORIGIN", Some("https://a.test,https://b.test")),
                ("GARDI_ADMIN_USERNAME", Some("admin")),
                ("GARDI_ADMIN_PASSWORD", Some("secret")),
                ("GARDI_SESSION_SECRET", Some("signing-key")),
                ("GARDI_LOG_LEVEL", Some("info")),
            ],
            || {
                let matches = new().get_matches_from(vec!["gardi"]);
                assert_eq!(matches.get_one::<u16>(ARG_PORT).copied(), Some(8443));
                assert_eq!(
                    matches.get_one::<String>(ARG_CONFIG_PATH).cloned(),
                    Some("/srv/site/data.json".to_string())
                );
                let origins: Vec<String> = matches
                    .get_many::<String>(ARG_CORS_ORIGIN)
                    .map(|values| values.cloned().collect())
                    .unwrap_or_default();
                assert_eq!(origins, vec!["https://a.test", "https://b.test"]);
                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    Some(2)
                );
            },
        );
    }

    #[test]
    fn test_check_log_level_verbosity() {
        let levels = ["error", "warn", "info", "debug", "trace"];
        for (index, _) in levels.iter().enumerate() {
            temp_env::with_vars([("GARDI_LOG_LEVEL", None::<String>)], || {
                let mut args: Vec<String> = REQUIRED.iter().map(ToString::to_string).collect();
                if index > 0 {
                    args.push(format!("-{}", "v".repeat(index)));
                }

                let matches = new().get_matches_from(args);

                assert_eq!(
                    matches.get_one::<u8>(logging::ARG_VERBOSITY).copied(),
                    u8::try_from(index).ok()
                );
            });
        }
    }

    #[test]
    fn test_invalid_log_level_fails() {
        temp_env::with_vars([("GARDI_LOG_LEVEL", Some("loud"))], || {
            let result = new().try_get_matches_from(REQUIRED);
            assert!(result.is_err());
        });
    }
}
