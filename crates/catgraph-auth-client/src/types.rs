//! Wire types of the identity service.

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// A user as returned by the identity service.
///
/// The service is a document store and may answer with `_id`; both spellings
/// are accepted. Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(alias = "_id")]
    pub id: String,
    pub user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Response to login, registration and self-service updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginMessageResponse {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub user: User,
}

/// Login credentials. `Debug` never prints the password.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: Zeroizing<String>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: Zeroizing::new(password.into()),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Fields accepted when registering or updating a user. Absent fields are
/// not sent.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct UserInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<Zeroizing<String>>,
}

impl std::fmt::Debug for UserInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserInput")
            .field("user_name", &self.user_name)
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_accepts_mongo_id() {
        let user: User = serde_json::from_value(serde_json::json!({
            "_id": "64f1",
            "user_name": "tom",
            "email": "tom@example.com",
            "role": "user",
            "password": "never-modelled"
        }))
        .unwrap();
        assert_eq!(user.id, "64f1");
        assert_eq!(user.role.as_deref(), Some("user"));
    }

    #[test]
    fn debug_redacts_passwords() {
        let creds = Credentials::new("tom", "hunter2");
        assert!(!format!("{creds:?}").contains("hunter2"));

        let input = UserInput {
            password: Some(Zeroizing::new("hunter2".into())),
            ..Default::default()
        };
        assert!(!format!("{input:?}").contains("hunter2"));
    }

    #[test]
    fn user_input_skips_absent_fields() {
        let input = UserInput {
            email: Some("new@example.com".into()),
            ..Default::default()
        };
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json, serde_json::json!({ "email": "new@example.com" }));
    }
}
