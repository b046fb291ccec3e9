//! Dashboard REST client with bearer-token authentication

use super::credentials::CredentialSupplier;
use coldchain_core::{
    Error, Result, ShipmentFilter, ShipmentId, ShipmentListResponse, ShipmentSummary,
};
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT},
    Client, RequestBuilder, Response,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

const USER_AGENT_VALUE: &str = concat!("coldchain-tracker/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// HTTP client for the operations dashboard API
///
/// Attaches `Authorization: Bearer <token>` when the credential supplier
/// has a token. The tracking socket never goes through this client.
pub struct ApiClient {
    http: Client,
    api_base: String,
    credentials: Arc<dyn CredentialSupplier>,
}

impl ApiClient {
    /// Create a client for `base_url` (e.g. `https://ops.example.com`)
    pub fn new(base_url: &str, credentials: Arc<dyn CredentialSupplier>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT_VALUE)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            api_base: format!("{}/api", base_url.trim_end_matches('/')),
            credentials,
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn default_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(token) = self.credentials.bearer_token() {
            match HeaderValue::from_str(&format!("Bearer {}", token)) {
                Ok(value) => {
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => {
                    warn!("Bearer token contains invalid header characters; sending without it")
                }
            }
        }

        headers
    }

    /// Check if response indicates authentication failure
    fn check_auth_error(response: &Response) -> Option<Error> {
        match response.status().as_u16() {
            401 => Some(Error::TokenExpired),
            403 => Some(Error::Authentication("Access forbidden".to_string())),
            _ => None,
        }
    }

    /// Authenticated GET on `path` below the API base
    fn get(&self, path: &str) -> RequestBuilder {
        self.http
            .get(format!("{}{}", self.api_base, path))
            .headers(self.default_headers())
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        let url = response.url().clone();

        debug!("GET {} -> {}", url, response.status());

        if let Some(err) = Self::check_auth_error(&response) {
            return Err(err);
        }

        let response = response.error_for_status().map_err(|e| {
            error!("Request to {} failed: {}", url, e);
            Error::Api(e.to_string())
        })?;

        response.json().await.map_err(|e| {
            error!("Failed to parse response from {}: {}", url, e);
            Error::InvalidData(e.to_string())
        })
    }

    fn list_shipments_request(&self, filter: &ShipmentFilter) -> RequestBuilder {
        self.get("/shipments/").query(filter)
    }

    /// List shipments matching `filter`
    #[instrument(skip(self))]
    pub async fn list_shipments(&self, filter: &ShipmentFilter) -> Result<Vec<ShipmentSummary>> {
        let shipments = self
            .send_json::<ShipmentListResponse>(self.list_shipments_request(filter))
            .await?
            .into_vec();
        debug!("Fetched {} shipments", shipments.len());
        Ok(shipments)
    }

    /// Fetch one shipment
    #[instrument(skip(self))]
    pub async fn get_shipment(&self, id: &ShipmentId) -> Result<ShipmentSummary> {
        self.send_json(self.get(&format!("/shipments/{}/", id))).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::StaticCredentials;
    use coldchain_core::ShipmentStatus;

    #[test]
    fn test_api_base_trims_trailing_slash() {
        let client =
            ApiClient::new("http://localhost:8000/", Arc::new(StaticCredentials::none())).unwrap();
        assert_eq!(client.api_base(), "http://localhost:8000/api");
    }

    #[test]
    fn test_bearer_header_only_with_token() {
        let anonymous = ApiClient::new("http://x", Arc::new(StaticCredentials::none())).unwrap();
        assert!(anonymous.default_headers().get(AUTHORIZATION).is_none());

        let authed =
            ApiClient::new("http://x", Arc::new(StaticCredentials::new("abc123"))).unwrap();
        assert_eq!(
            authed.default_headers().get(AUTHORIZATION).unwrap(),
            "Bearer abc123"
        );
    }

    fn query_for(filter: &ShipmentFilter) -> Option<String> {
        let client = ApiClient::new("http://x", Arc::new(StaticCredentials::none())).unwrap();
        let request = client.list_shipments_request(filter).build().unwrap();
        assert_eq!(request.url().path(), "/api/shipments/");
        request.url().query().map(str::to_string)
    }

    #[test]
    fn test_shipment_query() {
        assert_eq!(query_for(&ShipmentFilter::default()), None);

        let filter = ShipmentFilter {
            status: Some(ShipmentStatus::InTransit),
            search: Some("milk & eggs".to_string()),
            ..ShipmentFilter::default()
        };
        assert_eq!(
            query_for(&filter).as_deref(),
            Some("status=in_transit&search=milk+%26+eggs")
        );
    }
}
