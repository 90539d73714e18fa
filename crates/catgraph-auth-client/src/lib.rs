//! # catgraph-auth-client -- Typed client for the identity service
//!
//! The gateway never stores users itself. Every `User` field, login,
//! registration and token check is forwarded to the identity service at
//! `AUTH_URL` through this crate.
//!
//! ## Endpoints
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | GET    | `/users` | List users |
//! | GET    | `/users/{id}` | Get by id |
//! | GET    | `/users/token` | Resolve the bearer token's user |
//! | POST   | `/auth/login` | Log in |
//! | POST   | `/users` | Register |
//! | PUT    | `/users` | Update the caller |
//! | DELETE | `/users` | Delete the caller |
//! | PUT    | `/users/{id}` | Update any user (admin) |
//! | DELETE | `/users/{id}` | Delete any user (admin) |
//!
//! Admin calls forward the caller's role in a `role` header alongside the
//! bearer token; the identity service makes the final decision.

pub mod config;
pub mod error;
pub(crate) mod retry;
pub mod types;
pub mod users;

pub use config::{AuthServiceConfig, ConfigError};
pub use error::AuthApiError;
pub use types::{Credentials, LoginMessageResponse, User, UserInput};
pub use users::AuthClient;
