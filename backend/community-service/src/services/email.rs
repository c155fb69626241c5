/// Console email backend
///
/// Messages are written to the log instead of being delivered, which is all
/// the password reset flow needs in development.
use tracing::info;

#[derive(Debug, Clone)]
pub struct EmailService {
    from: String,
    /// Base URL reset links are built on, e.g. `http://localhost:8000`
    site_url: String,
}

impl EmailService {
    pub fn new(from: impl Into<String>, site_url: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            site_url: site_url.into(),
        }
    }

    pub fn password_reset_link(&self, token: &str) -> String {
        format!(
            "{}/accounts/password/reset/key/{}/",
            self.site_url.trim_end_matches('/'),
            token
        )
    }

    /// Log the password reset message for `recipient`
    pub fn send_password_reset(&self, recipient: &str, username: &str, token: &str) {
        let body = format!(
            "Hello {username},\n\nYou're receiving this email because a password reset was requested for your account.\nClick the link below to choose a new password:\n{link}\n\nIf you did not request this, you can ignore this email.",
            link = self.password_reset_link(token),
        );

        info!(
            target: "email",
            from = %self.from,
            to = %recipient,
            subject = "Password reset",
            "{}",
            body
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_link_joins_site_url() {
        let email = EmailService::new("noreply@agora.dev", "http://localhost:8000/");
        assert_eq!(
            email.password_reset_link("abc123"),
            "http://localhost:8000/accounts/password/reset/key/abc123/"
        );
    }
}
