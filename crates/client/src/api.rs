//! HTTP adapter for the backend contract.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

use storefront_cart::ProductSnapshot;
use storefront_checkout::{
    Customer, InvoiceConfirmation, InvoiceSubmission, InvoiceSubmitter, SubmissionError,
};

use crate::config::ClientConfig;
use crate::dto::{
    CustomerListResponse, ErrorBody, InvoiceRequestDto, InvoiceResponseDto, LoginRequest,
    LoginResponse, ProductListResponse,
};
use crate::session::Session;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),
    /// Non-success response. `message` is the server's text when it sent one.
    #[error("API error ({status}): {}", .message.as_deref().unwrap_or("no message"))]
    Api { status: u16, message: Option<String> },
    #[error("parse error: {0}")]
    Parse(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Api { status, .. } => Some(*status),
            ApiError::Network(_) | ApiError::Parse(_) => None,
        }
    }
}

impl From<ApiError> for SubmissionError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Api {
                status,
                message: Some(message),
            } => SubmissionError::new(Some(status), message),
            other => SubmissionError::fallback(other.status()),
        }
    }
}

/// Client for the storefront backend.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Session,
}

impl ApiClient {
    pub fn new(config: &ClientConfig, session: Session) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.api_url.clone(),
            session,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.http.request(method, url);

        // Public auth endpoints never carry the bearer token.
        if !path.starts_with("/auth") {
            if let Some(token) = self.session.bearer_token() {
                req = req.bearer_auth(token);
            }
        }
        req
    }

    async fn send(&self, req: RequestBuilder, path: &str) -> Result<Response, ApiError> {
        let resp = req.send().await.map_err(|e| {
            error!(path, error = %e, "request failed");
            ApiError::Network(e.to_string())
        })?;

        let status = resp.status();
        debug!(path, status = status.as_u16(), "response");
        if status.is_success() {
            return Ok(resp);
        }

        if status == StatusCode::UNAUTHORIZED {
            warn!(path, "token rejected by backend, removing it");
            self.session.clear_token();
        }

        let body = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(ErrorBody::into_message);
        Err(ApiError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
        resp.json().await.map_err(|e| ApiError::Parse(e.to_string()))
    }

    /// `POST /auth/login`; on success the session holds the new token.
    pub async fn login(&self, credentials: &LoginRequest) -> Result<LoginResponse, ApiError> {
        let path = "/auth/login";
        let resp = self
            .send(self.request(Method::POST, path).json(credentials), path)
            .await?;
        let login: LoginResponse = Self::read_json(resp).await?;
        self.session.login(&login);
        Ok(login)
    }

    pub async fn list_products(&self) -> Result<Vec<ProductSnapshot>, ApiError> {
        let path = "/productos";
        let resp = self.send(self.request(Method::GET, path), path).await?;
        let list: ProductListResponse = Self::read_json(resp).await?;
        Ok(list.into_snapshots())
    }

    pub async fn list_customers(&self) -> Result<Vec<Customer>, ApiError> {
        let path = "/clientes";
        let resp = self.send(self.request(Method::GET, path), path).await?;
        let list: CustomerListResponse = Self::read_json(resp).await?;
        Ok(list.into_customers())
    }

    /// `POST /facturas`.
    pub async fn submit_invoice(
        &self,
        submission: &InvoiceSubmission,
    ) -> Result<InvoiceConfirmation, ApiError> {
        let path = "/facturas";
        let body = InvoiceRequestDto::from(submission);
        let resp = self
            .send(self.request(Method::POST, path).json(&body), path)
            .await?;

        // A success without a readable body still finalised the sale.
        let text = resp.text().await.map_err(|e| ApiError::Network(e.to_string()))?;
        let dto = serde_json::from_str::<InvoiceResponseDto>(&text).unwrap_or_else(|e| {
            warn!(error = %e, "invoice response body unreadable");
            InvoiceResponseDto::default()
        });
        Ok(dto.into())
    }
}

#[async_trait]
impl InvoiceSubmitter for ApiClient {
    async fn submit(
        &self,
        submission: &InvoiceSubmission,
    ) -> Result<InvoiceConfirmation, SubmissionError> {
        self.submit_invoice(submission).await.map_err(SubmissionError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_message_becomes_submission_message() {
        let err = SubmissionError::from(ApiError::Api {
            status: 400,
            message: Some("Stock insuficiente".to_string()),
        });
        assert_eq!(err, SubmissionError::new(Some(400), "Stock insuficiente"));
    }

    #[test]
    fn missing_message_falls_back() {
        let err = SubmissionError::from(ApiError::Api {
            status: 500,
            message: None,
        });
        assert_eq!(err, SubmissionError::fallback(Some(500)));

        let err = SubmissionError::from(ApiError::Network("connection refused".to_string()));
        assert_eq!(err.status, None);
        assert_eq!(err.message, storefront_checkout::FALLBACK_SUBMISSION_MESSAGE);
    }
}
