//! Backend adapters for the storefront core: HTTP client, session and
//! configuration.

pub mod api;
pub mod config;
pub mod dto;
pub mod session;

pub use api::{ApiClient, ApiError};
pub use config::{ClientConfig, ConfigError};
pub use dto::{LoginRequest, LoginResponse};
pub use session::{Session, SessionClaims, decode_claims};
