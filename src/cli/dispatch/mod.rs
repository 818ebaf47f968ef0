use crate::cli::actions::{server::Args, Action};
use anyhow::{Context, Result};
use ipnetwork::IpNetwork;
use secrecy::SecretString;
use url::Url;

/// # Errors
/// Returns an error if required arguments are missing or malformed.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);

    let public_url = matches
        .get_one::<String>("public-url")
        .context("missing required argument: --public-url")?;
    let public_url = Url::parse(public_url)
        .with_context(|| format!("invalid public URL: {public_url}"))?;

    let secret_key = matches
        .get_one::<String>("secret-key")
        .cloned()
        .map(SecretString::from)
        .context("missing required argument: --secret-key")?;

    let proxy_auth_whitelist = matches
        .get_many::<String>("proxy-auth-whitelist")
        .unwrap_or_default()
        .map(|cidr| {
            cidr.parse::<IpNetwork>()
                .with_context(|| format!("invalid proxy whitelist CIDR: {cidr}"))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Action::Server(Args {
        port,
        public_url,
        secret_key,
        admin_path: matches
            .get_one::<String>("admin-path")
            .cloned()
            .context("missing required argument: --admin-path")?,
        webmail_path: matches
            .get_one::<String>("webmail-path")
            .cloned()
            .context("missing required argument: --webmail-path")?,
        proxy_auth_header: matches
            .get_one::<String>("proxy-auth-header")
            .cloned()
            .context("missing required argument: --proxy-auth-header")?,
        proxy_auth_whitelist,
        proxy_auth_create: matches.get_flag("proxy-auth-create"),
        proxy_auth_logout_url: matches.get_one::<String>("proxy-auth-logout-url").cloned(),
        ratelimit_ip_attempts: matches
            .get_one::<u64>("ratelimit-ip-attempts")
            .copied()
            .unwrap_or(60),
        ratelimit_ip_window: matches
            .get_one::<u64>("ratelimit-ip-window")
            .copied()
            .unwrap_or(3600),
        ratelimit_user_attempts: matches
            .get_one::<u64>("ratelimit-user-attempts")
            .copied()
            .unwrap_or(100),
        ratelimit_user_window: matches
            .get_one::<u64>("ratelimit-user-window")
            .copied()
            .unwrap_or(86_400),
        device_cookie_max_age: matches
            .get_one::<u64>("device-cookie-max-age")
            .copied()
            .unwrap_or(31_536_000),
        bootstrap_user: matches.get_one::<String>("bootstrap-user").cloned(),
        bootstrap_password: matches
            .get_one::<String>("bootstrap-password")
            .cloned()
            .map(SecretString::from),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;
    use secrecy::ExposeSecret;

    #[test]
    fn handler_builds_a_server_action() -> Result<()> {
        let matches = commands::new().get_matches_from(vec![
            "portone",
            "--secret-key",
            "changeme",
            "--public-url",
            "https://mail.example",
            "--proxy-auth-whitelist",
            "10.0.0.0/8",
        ]);
        let Action::Server(args) = handler(&matches)?;
        assert_eq!(args.port, 8080);
        assert_eq!(args.public_url.as_str(), "https://mail.example/");
        assert_eq!(args.secret_key.expose_secret(), "changeme");
        assert_eq!(args.proxy_auth_whitelist.len(), 1);
        assert!(!args.proxy_auth_create);
        Ok(())
    }

    #[test]
    fn handler_rejects_a_bad_cidr() {
        let matches = commands::new().get_matches_from(vec![
            "portone",
            "--secret-key",
            "changeme",
            "--proxy-auth-whitelist",
            "not-a-cidr",
        ]);
        assert!(handler(&matches).is_err());
    }

    #[test]
    fn handler_rejects_a_bad_public_url() {
        let matches = commands::new().get_matches_from(vec![
            "portone",
            "--secret-key",
            "changeme",
            "--public-url",
            "not a url",
        ]);
        assert!(handler(&matches).is_err());
    }
}
