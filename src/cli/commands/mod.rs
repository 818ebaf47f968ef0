use clap::{
    builder::{
        styling::{AnsiColor, Effects, Styles},
        ValueParser,
    },
    Arg, ArgAction, ColorChoice, Command,
};

pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            // Successfully parsed as a number
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    Command::new("portone")
        .about("SSO front-door for the mail admin suite")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("PORTONE_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new("public-url")
                .long("public-url")
                .help("External base URL the suite is reachable at")
                .default_value("http://localhost:8080")
                .env("PORTONE_PUBLIC_URL"),
        )
        .arg(
            Arg::new("secret-key")
                .long("secret-key")
                .help("Long-lived application secret, used to derive signing keys")
                .env("PORTONE_SECRET_KEY")
                .required(true),
        )
        .arg(
            Arg::new("admin-path")
                .long("admin-path")
                .help("Path of the admin application behind the proxy")
                .default_value("/admin")
                .env("PORTONE_ADMIN_PATH"),
        )
        .arg(
            Arg::new("webmail-path")
                .long("webmail-path")
                .help("Path of the webmail application behind the proxy")
                .default_value("/webmail")
                .env("PORTONE_WEBMAIL_PATH"),
        )
        .arg(
            Arg::new("proxy-auth-header")
                .long("proxy-auth-header")
                .help("Header the reverse proxy asserts identities in")
                .default_value("X-Auth-Email")
                .env("PORTONE_PROXY_AUTH_HEADER"),
        )
        .arg(
            Arg::new("proxy-auth-whitelist")
                .long("proxy-auth-whitelist")
                .help("Comma separated CIDRs allowed to assert identities")
                .env("PORTONE_PROXY_AUTH_WHITELIST")
                .value_delimiter(','),
        )
        .arg(
            Arg::new("proxy-auth-create")
                .long("proxy-auth-create")
                .help("Auto-provision users asserted by a whitelisted proxy")
                .env("PORTONE_PROXY_AUTH_CREATE")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("proxy-auth-logout-url")
                .long("proxy-auth-logout-url")
                .help("Where to send the browser after logout, for proxy setups")
                .env("PORTONE_PROXY_AUTH_LOGOUT_URL"),
        )
        .arg(
            Arg::new("ratelimit-ip-attempts")
                .long("ratelimit-ip-attempts")
                .help("Failed attempts per client IP before throttling")
                .default_value("60")
                .env("PORTONE_RATELIMIT_IP_ATTEMPTS")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("ratelimit-ip-window")
                .long("ratelimit-ip-window")
                .help("IP throttle window in seconds")
                .default_value("3600")
                .env("PORTONE_RATELIMIT_IP_WINDOW")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("ratelimit-user-attempts")
                .long("ratelimit-user-attempts")
                .help("Failed attempts per username before throttling")
                .default_value("100")
                .env("PORTONE_RATELIMIT_USER_ATTEMPTS")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("ratelimit-user-window")
                .long("ratelimit-user-window")
                .help("Username throttle window in seconds")
                .default_value("86400")
                .env("PORTONE_RATELIMIT_USER_WINDOW")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("device-cookie-max-age")
                .long("device-cookie-max-age")
                .help("Lifetime of the remembered-device cookie in seconds")
                .default_value("31536000")
                .env("PORTONE_DEVICE_COOKIE_MAX_AGE")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("bootstrap-user")
                .long("bootstrap-user")
                .help("Seed the in-memory store with this user, e.g. admin@example.com")
                .env("PORTONE_BOOTSTRAP_USER"),
        )
        .arg(
            Arg::new("bootstrap-password")
                .long("bootstrap-password")
                .help("Password for the bootstrap user")
                .env("PORTONE_BOOTSTRAP_PASSWORD"),
        )
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("PORTONE_LOG_LEVEL")
                .global(true)
                .action(ArgAction::Count)
                .value_parser(validator_log_level()),
        )
}
