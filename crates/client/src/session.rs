//! Authenticated session: bearer token and operator identity.
//!
//! The token payload is read without signature verification. The backend
//! verifies it; the client only needs its `exp` and `empleadoId` claims.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tracing::{debug, warn};

use storefront_checkout::OperatorResolver;
use storefront_core::EmployeeId;

use crate::dto::LoginResponse;

/// Claims the client cares about. Everything else in the token is ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SessionClaims {
    #[serde(default, rename = "empleadoId")]
    pub employee_id: Option<ClaimId>,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub sub: Option<String>,
}

/// Backends emit the employee claim either as a number or as a string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ClaimId {
    Number(i64),
    Text(String),
}

impl ClaimId {
    pub fn employee_id(&self) -> Option<EmployeeId> {
        match self {
            ClaimId::Number(n) => Some(EmployeeId::new(*n)),
            ClaimId::Text(s) => s.parse().ok(),
        }
    }
}

impl SessionClaims {
    /// Tokens without `exp` never expire client-side.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.exp, Some(exp) if exp <= now.timestamp())
    }
}

/// Read the payload of a JWT without verifying its signature.
pub fn decode_claims(token: &str) -> Result<SessionClaims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims = HashSet::new();

    let data = jsonwebtoken::decode::<SessionClaims>(token, &DecodingKey::from_secret(&[]), &validation)?;
    Ok(data.claims)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct SessionData {
    token: Option<String>,
    employee_id: Option<EmployeeId>,
    employee_name: Option<String>,
}

/// Shared session state.
///
/// Cheap to clone; clones observe the same session.
#[derive(Debug, Clone, Default)]
pub struct Session {
    inner: Arc<RwLock<SessionData>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session holding only a token (e.g. restored from a previous run).
    pub fn with_token(token: impl Into<String>) -> Self {
        let session = Self::new();
        session.write().token = Some(token.into());
        session
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionData> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionData> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store what a successful login returned.
    pub fn login(&self, response: &LoginResponse) {
        let mut data = self.write();
        data.token = Some(response.token.clone());
        data.employee_id = response.employee_id;
        data.employee_name = Some(response.display_name());
        debug!(employee_id = ?response.employee_id, "session started");
    }

    pub fn logout(&self) {
        *self.write() = SessionData::default();
        debug!("session cleared");
    }

    pub fn token(&self) -> Option<String> {
        self.read().token.clone()
    }

    pub fn employee_id(&self) -> Option<EmployeeId> {
        self.read().employee_id
    }

    /// Display name of the operator: the stored name, else the token
    /// subject, else `"Usuario"`.
    pub fn employee_name(&self) -> String {
        if let Some(name) = self.read().employee_name.clone() {
            return name;
        }
        self.token()
            .and_then(|token| decode_claims(&token).ok())
            .and_then(|claims| claims.sub)
            .unwrap_or_else(|| "Usuario".to_string())
    }

    /// Drop only the token, keeping the operator identity.
    pub fn clear_token(&self) {
        self.write().token = None;
    }

    /// Token to attach to a request at `now`.
    ///
    /// An expired or unreadable token is removed from the session instead of
    /// being sent.
    pub fn bearer_token_at(&self, now: DateTime<Utc>) -> Option<String> {
        let token = self.token()?;
        match decode_claims(&token) {
            Ok(claims) if !claims.is_expired(now) => Some(token),
            Ok(_) => {
                warn!("stored token has expired, removing it");
                self.clear_token();
                None
            }
            Err(err) => {
                warn!(error = %err, "stored token is unreadable, removing it");
                self.clear_token();
                None
            }
        }
    }

    pub fn bearer_token(&self) -> Option<String> {
        self.bearer_token_at(Utc::now())
    }
}

impl OperatorResolver for Session {
    /// Stored employee id first, else the token's `empleadoId` claim. A
    /// claim-derived id is cached back into the session.
    fn resolve_operator(&self) -> Option<EmployeeId> {
        if let Some(id) = self.employee_id() {
            return Some(id);
        }

        let token = self.token()?;
        let claims = match decode_claims(&token) {
            Ok(claims) => claims,
            Err(err) => {
                warn!(error = %err, "could not read employee id from token");
                return None;
            }
        };
        let id = claims.employee_id.as_ref().and_then(ClaimId::employee_id)?;
        self.write().employee_id = Some(id);
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use jsonwebtoken::{EncodingKey, Header};
    use serde_json::json;

    fn mint(claims: serde_json::Value) -> String {
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"backend-secret"),
        )
        .expect("failed to encode jwt")
    }

    fn login_response(employee_id: Option<i64>) -> LoginResponse {
        LoginResponse {
            token: mint(json!({ "sub": "caja1" })),
            employee_id: employee_id.map(EmployeeId::new),
            username: Some("caja1".to_string()),
            role: Some("CAJERO".to_string()),
            first_name: Some("Laura".to_string()),
            last_name: Some("Mejía".to_string()),
            position: None,
        }
    }

    #[test]
    fn stored_employee_id_wins() {
        let session = Session::new();
        session.login(&login_response(Some(12)));
        assert_eq!(session.resolve_operator(), Some(EmployeeId::new(12)));
        assert_eq!(session.employee_name(), "Laura Mejía");
    }

    #[test]
    fn employee_id_falls_back_to_token_claim_and_is_cached() {
        let session = Session::with_token(mint(json!({ "empleadoId": 31, "sub": "caja2" })));
        assert_eq!(session.employee_id(), None);

        assert_eq!(session.resolve_operator(), Some(EmployeeId::new(31)));
        assert_eq!(session.employee_id(), Some(EmployeeId::new(31)));
        assert_eq!(session.employee_name(), "caja2");
    }

    #[test]
    fn string_claim_is_accepted() {
        let session = Session::with_token(mint(json!({ "empleadoId": "44" })));
        assert_eq!(session.resolve_operator(), Some(EmployeeId::new(44)));
    }

    #[test]
    fn no_identity_means_no_operator() {
        assert_eq!(Session::new().resolve_operator(), None);
        let session = Session::with_token(mint(json!({ "sub": "anon" })));
        assert_eq!(session.resolve_operator(), None);
        assert_eq!(Session::with_token("garbage").resolve_operator(), None);
    }

    #[test]
    fn expired_token_is_dropped_not_sent() {
        let now = Utc::now();
        let expired = mint(json!({ "exp": (now - Duration::minutes(5)).timestamp() }));
        let session = Session::with_token(expired);

        assert_eq!(session.bearer_token_at(now), None);
        assert_eq!(session.token(), None);
    }

    #[test]
    fn live_token_and_token_without_exp_are_sent() {
        let now = Utc::now();
        let live = mint(json!({ "exp": (now + Duration::minutes(5)).timestamp() }));
        assert_eq!(Session::with_token(live.clone()).bearer_token_at(now), Some(live));

        let no_exp = mint(json!({ "sub": "caja1" }));
        assert_eq!(Session::with_token(no_exp.clone()).bearer_token_at(now), Some(no_exp));
    }

    #[test]
    fn unreadable_token_is_dropped() {
        let session = Session::with_token("not-a-jwt");
        assert_eq!(session.bearer_token(), None);
        assert_eq!(session.token(), None);
    }

    #[test]
    fn logout_clears_everything() {
        let session = Session::new();
        session.login(&login_response(Some(3)));
        let clone = session.clone();
        clone.logout();
        assert_eq!(session.token(), None);
        assert_eq!(session.employee_id(), None);
    }
}
