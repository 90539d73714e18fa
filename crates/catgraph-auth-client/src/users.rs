//! Typed client for the identity service.

use std::time::Duration;

use reqwest::header::{HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;

use crate::config::AuthServiceConfig;
use crate::error::AuthApiError;
use crate::retry::retry_send;
use crate::types::{Credentials, LoginMessageResponse, User, UserInput};

/// Header carrying the caller's role on admin calls.
const ROLE_HEADER: &str = "role";

/// Client for the identity service. Cheap to clone.
#[derive(Debug, Clone)]
pub struct AuthClient {
    http: reqwest::Client,
    config: AuthServiceConfig,
}

impl AuthClient {
    pub fn new(config: AuthServiceConfig) -> Result<Self, AuthApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AuthApiError::Http {
                endpoint: "client_init".into(),
                source: e,
            })?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &AuthServiceConfig {
        &self.config
    }

    /// List every user.
    ///
    /// Calls `GET {base_url}/users`.
    pub async fn users(&self) -> Result<Vec<User>, AuthApiError> {
        let endpoint = "GET /users";
        let url = self.config.endpoint_url("users");
        let resp = retry_send(endpoint, || self.http.get(&url).send())
            .await
            .map_err(|e| http_error(endpoint, e))?;
        read_json(endpoint, resp).await
    }

    /// Get a user by id. `Ok(None)` when the service answers 404.
    ///
    /// Calls `GET {base_url}/users/{id}`.
    pub async fn user_by_id(&self, id: &str) -> Result<Option<User>, AuthApiError> {
        let endpoint = format!("GET /users/{id}");
        let url = self.config.endpoint_url(&format!("users/{id}"));
        let resp = retry_send(&endpoint, || self.http.get(&url).send())
            .await
            .map_err(|e| http_error(&endpoint, e))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        read_json(&endpoint, resp).await.map(Some)
    }

    /// Resolve the user behind `token`.
    ///
    /// Calls `GET {base_url}/users/token` once. Not retried: this sits on
    /// the per-request identity path, which has its own deadline.
    pub async fn check_token(&self, token: &str) -> Result<User, AuthApiError> {
        let endpoint = "GET /users/token";
        let url = self.config.endpoint_url("users/token");
        let resp = self
            .http
            .get(&url)
            .header(AUTHORIZATION, bearer(token)?)
            .send()
            .await
            .map_err(|e| http_error(endpoint, e))?;
        read_json(endpoint, resp).await
    }

    /// Calls `POST {base_url}/auth/login`.
    pub async fn login(&self, credentials: &Credentials) -> Result<LoginMessageResponse, AuthApiError> {
        let endpoint = "POST /auth/login";
        let url = self.config.endpoint_url("auth/login");
        let resp = self
            .http
            .post(&url)
            .json(credentials)
            .send()
            .await
            .map_err(|e| http_error(endpoint, e))?;
        read_json(endpoint, resp).await
    }

    /// Calls `POST {base_url}/users`.
    pub async fn register(&self, user: &UserInput) -> Result<LoginMessageResponse, AuthApiError> {
        let endpoint = "POST /users";
        let url = self.config.endpoint_url("users");
        let resp = self
            .http
            .post(&url)
            .json(user)
            .send()
            .await
            .map_err(|e| http_error(endpoint, e))?;
        read_json(endpoint, resp).await
    }

    /// Update the user that owns `token`.
    ///
    /// Calls `PUT {base_url}/users`.
    pub async fn update_user(
        &self,
        token: &str,
        user: &UserInput,
    ) -> Result<LoginMessageResponse, AuthApiError> {
        let endpoint = "PUT /users";
        let url = self.config.endpoint_url("users");
        let auth = bearer(token)?;
        let resp = self
            .http
            .put(&url)
            .header(AUTHORIZATION, auth)
            .json(user)
            .send()
            .await
            .map_err(|e| http_error(endpoint, e))?;
        read_json(endpoint, resp).await
    }

    /// Delete the user that owns `token`.
    ///
    /// Calls `DELETE {base_url}/users`.
    pub async fn delete_user(&self, token: &str) -> Result<LoginMessageResponse, AuthApiError> {
        let endpoint = "DELETE /users";
        let url = self.config.endpoint_url("users");
        let auth = bearer(token)?;
        let resp = self
            .http
            .delete(&url)
            .header(AUTHORIZATION, auth)
            .send()
            .await
            .map_err(|e| http_error(endpoint, e))?;
        read_json(endpoint, resp).await
    }

    /// Update any user, forwarding the caller's role.
    ///
    /// Calls `PUT {base_url}/users/{id}`.
    pub async fn update_user_as_admin(
        &self,
        token: &str,
        role: &str,
        id: &str,
        user: &UserInput,
    ) -> Result<User, AuthApiError> {
        let endpoint = format!("PUT /users/{id}");
        let url = self.config.endpoint_url(&format!("users/{id}"));
        let auth = bearer(token)?;
        let role = role_header(role)?;
        let resp = self
            .http
            .put(&url)
            .header(AUTHORIZATION, auth)
            .header(ROLE_HEADER, role)
            .json(user)
            .send()
            .await
            .map_err(|e| http_error(&endpoint, e))?;
        read_json(&endpoint, resp).await
    }

    /// Delete any user, forwarding the caller's role.
    ///
    /// Calls `DELETE {base_url}/users/{id}`.
    pub async fn delete_user_as_admin(
        &self,
        token: &str,
        role: &str,
        id: &str,
    ) -> Result<User, AuthApiError> {
        let endpoint = format!("DELETE /users/{id}");
        let url = self.config.endpoint_url(&format!("users/{id}"));
        let auth = bearer(token)?;
        let role = role_header(role)?;
        let resp = self
            .http
            .delete(&url)
            .header(AUTHORIZATION, auth)
            .header(ROLE_HEADER, role)
            .send()
            .await
            .map_err(|e| http_error(&endpoint, e))?;
        read_json(&endpoint, resp).await
    }
}

fn bearer(token: &str) -> Result<HeaderValue, AuthApiError> {
    let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|_| AuthApiError::InvalidHeader("authorization"))?;
    value.set_sensitive(true);
    Ok(value)
}

fn role_header(role: &str) -> Result<HeaderValue, AuthApiError> {
    HeaderValue::from_str(role).map_err(|_| AuthApiError::InvalidHeader(ROLE_HEADER))
}

fn http_error(endpoint: &str, source: reqwest::Error) -> AuthApiError {
    AuthApiError::Http {
        endpoint: endpoint.to_string(),
        source,
    }
}

async fn read_json<T: DeserializeOwned>(
    endpoint: &str,
    resp: reqwest::Response,
) -> Result<T, AuthApiError> {
    if !resp.status().is_success() {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        return Err(AuthApiError::ApiError {
            endpoint: endpoint.to_string(),
            status,
            body,
        });
    }
    resp.json().await.map_err(|e| AuthApiError::Deserialization {
        endpoint: endpoint.to_string(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_header_is_sensitive() {
        let value = bearer("abc").unwrap();
        assert!(value.is_sensitive());
        assert_eq!(value.to_str().unwrap(), "Bearer abc");
    }

    #[test]
    fn header_values_reject_newlines() {
        assert!(matches!(
            bearer("abc\r\nx: y"),
            Err(AuthApiError::InvalidHeader("authorization"))
        ));
        assert!(matches!(role_header("admin\n"), Err(AuthApiError::InvalidHeader("role"))));
    }
}
