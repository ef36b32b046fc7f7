//! Email template rendering with HTML (Askama) and a plain-text alternative.
use askama::Template;

#[derive(Template)]
#[template(path = "password_reset_email.html")]
pub struct PasswordResetEmailTemplate {
    pub login: String,
    pub reset_url: String,
    /// Human readable lifetime of the link, e.g. "1 hour"
    pub expires_in: String,
}

impl PasswordResetEmailTemplate {
    #[tracing::instrument(skip(self))]
    pub fn render_html(&self) -> Result<String, askama::Error> {
        self.render()
    }

    #[tracing::instrument(skip(self))]
    pub fn render_text(&self) -> String {
        format!(
            r#"Hello,

We received a request to reset the password of the account {}.

Choose a new password by opening the link below:

{}

This link expires in {} and can only be used once. If you did not ask for a password reset you can ignore this email.
"#,
            self.login, self.reset_url, self.expires_in
        )
    }
}

/// Render a lifetime in seconds the way it reads in an email.
pub fn human_duration(secs: i64) -> String {
    let (value, unit) = if secs % 86400 == 0 {
        (secs / 86400, "day")
    } else if secs % 3600 == 0 {
        (secs / 3600, "hour")
    } else if secs % 60 == 0 {
        (secs / 60, "minute")
    } else {
        (secs, "second")
    };
    if value == 1 {
        format!("1 {unit}")
    } else {
        format!("{value} {unit}s")
    }
}
