use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Login mutation sent over the query channel by [`TowerClient::auth`](crate::TowerClient::auth).
pub(crate) const LOGIN_MUTATION: &str = "mutation($data: LoginInput!) {login(data: $data) {token}}";

/// Where the session token lives in the login response's `data`.
pub(crate) const TOKEN_PATH: [&str; 2] = ["login", "token"];

/// Which directory Tower should check the credentials against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserSource {
    /// Tower's own user database.
    #[default]
    Local,
    /// An LDAP directory configured on the Tower side.
    Ldap,
}

impl UserSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "LOCAL",
            Self::Ldap => "LDAP",
        }
    }
}

/// Credentials exchanged for a session token at login.
#[derive(Debug, Clone)]
pub struct LoginCredentials {
    pub username: String,
    pub password: SecretString,
    pub source: UserSource,
}

impl LoginCredentials {
    pub fn new(username: impl Into<String>, password: SecretString) -> Self {
        Self {
            username: username.into(),
            password,
            source: UserSource::default(),
        }
    }

    pub fn with_source(mut self, source: UserSource) -> Self {
        self.source = source;
        self
    }

    /// The `LoginInput` value bound to the login mutation's `$data`.
    pub(crate) fn login_input(&self) -> Value {
        json!({
            "username": self.username,
            "password": self.password.expose_secret(),
            "source": self.source.as_str(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_input_exposes_password_only_in_payload() {
        let creds = LoginCredentials::new("admin", SecretString::from("s3cret"))
            .with_source(UserSource::Ldap);

        let input = creds.login_input();
        assert_eq!(input["username"], "admin");
        assert_eq!(input["password"], "s3cret");
        assert_eq!(input["source"], "LDAP");

        // Debug output of the credentials themselves stays redacted.
        assert!(!format!("{creds:?}").contains("s3cret"));
    }

    #[test]
    fn default_source_is_local() {
        let creds = LoginCredentials::new("admin", SecretString::from("x"));
        assert_eq!(creds.source, UserSource::Local);
    }
}
