//! Open-redirect guard for caller-supplied destinations.

use url::Url;

/// Resolve `requested` against `current` and accept it only when the result
/// stays on the current authority.
///
/// Rejects absolute URLs to other hosts, protocol-relative URLs, and
/// anything that fails to parse.
#[must_use]
pub fn validate(requested: &str, current: &Url) -> Option<Url> {
    let target = current.join(requested).ok()?;
    let same_host = target.host_str() == current.host_str();
    let same_port = target.port_or_known_default() == current.port_or_known_default();
    if same_host && same_port {
        Some(target)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn current() -> Result<Url> {
        Ok(Url::parse("https://mail.example/sso/login")?)
    }

    #[test]
    fn foreign_absolute_url_is_rejected() -> Result<()> {
        assert_eq!(validate("https://evil.example/x", &current()?), None);
        Ok(())
    }

    #[test]
    fn protocol_relative_url_is_rejected() -> Result<()> {
        assert_eq!(validate("//evil.example/", &current()?), None);
        Ok(())
    }

    #[test]
    fn relative_path_resolves_on_the_same_authority() -> Result<()> {
        let target = validate("/admin/users", &current()?).expect("should be accepted");
        assert_eq!(target.as_str(), "https://mail.example/admin/users");
        Ok(())
    }

    #[test]
    fn same_authority_absolute_url_is_accepted() -> Result<()> {
        let target =
            validate("https://mail.example/webmail", &current()?).expect("should be accepted");
        assert_eq!(target.path(), "/webmail");
        Ok(())
    }

    #[test]
    fn unparseable_input_is_rejected() -> Result<()> {
        assert_eq!(validate("https://", &current()?), None);
        Ok(())
    }

    #[test]
    fn different_port_is_a_different_authority() -> Result<()> {
        assert_eq!(validate("https://mail.example:8443/x", &current()?), None);
        Ok(())
    }
}
