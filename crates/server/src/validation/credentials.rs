use crate::error::AuthError;

pub const LOGIN_MIN_LEN: usize = 5;
pub const PASSWORD_MIN_LEN: usize = 5;
pub const PASSWORD_MAX_LEN: usize = 24;

/// Trim and lower-case a login so lookups are case-insensitive.
pub fn normalize_login(login: &str) -> String {
    login.trim().to_lowercase()
}

/// Validate an email-shaped login and return its normalized form.
pub fn validate_login(login: &str) -> Result<String, AuthError> {
    let login = normalize_login(login);
    if login.chars().count() < LOGIN_MIN_LEN {
        return Err(AuthError::Validation(format!(
            "login must be at least {LOGIN_MIN_LEN} characters"
        )));
    }

    let Some((local, domain)) = login.rsplit_once('@') else {
        return Err(AuthError::Validation(
            "login must be an email address".to_string(),
        ));
    };
    if local.is_empty() || domain.is_empty() || login.chars().any(char::is_whitespace) {
        return Err(AuthError::Validation(
            "login must be an email address".to_string(),
        ));
    }

    Ok(login)
}

pub fn validate_password(password: &str) -> Result<(), AuthError> {
    let len = password.chars().count();
    if !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&len) {
        return Err(AuthError::Validation(format!(
            "password must be between {PASSWORD_MIN_LEN} and {PASSWORD_MAX_LEN} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_is_normalized() {
        assert_eq!(
            validate_login("  Name@Example.COM ").expect("valid"),
            "name@example.com"
        );
    }

    #[test]
    fn login_must_look_like_an_email() {
        assert!(validate_login("a@b").is_err()); // too short
        assert!(validate_login("nameexample.com").is_err());
        assert!(validate_login("@example.com").is_err());
        assert!(validate_login("name@").is_err());
        assert!(validate_login("na me@example.com").is_err());
        assert!(validate_login("a@b.c").is_ok());
    }

    #[test]
    fn password_length_bounds() {
        assert!(validate_password("1234").is_err());
        assert!(validate_password("12345").is_ok());
        assert!(validate_password(&"x".repeat(24)).is_ok());
        assert!(validate_password(&"x".repeat(25)).is_err());
        assert!(matches!(
            validate_password(""),
            Err(AuthError::Validation(_))
        ));
    }
}
