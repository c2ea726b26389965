use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::{domain::ApiGeneration, error::ApiError};
use tracing::{debug, warn};
use url::Url;

use crate::{auth, config::Settings, credentials::Credentials, error::ClientError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Put,
    Delete,
}

impl HttpMethod {
    fn as_reqwest(self) -> Method {
        match self {
            Self::Get => Method::GET,
            Self::Put => Method::PUT,
            Self::Delete => Method::DELETE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    /// Path relative to the API generation prefix, without a leading slash.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: HttpMethod::Put,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Delete,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait StoreTransport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ClientError>;
}

// non-2xx is ApiClient, a 2xx envelope with `code` is Api, anything else
// that does not fit `T` is Decode.
pub fn decode_record<T: DeserializeOwned>(response: ApiResponse) -> Result<T, ClientError> {
    if !response.is_success() {
        return Err(ClientError::ApiClient {
            status: response.status,
            error: ApiError::from_body(&response.body),
        });
    }
    if let Some(error) = ApiError::from_body(&response.body) {
        return Err(ClientError::Api(error));
    }
    Ok(serde_json::from_value(response.body)?)
}

pub struct HttpTransport {
    http: Client,
    api_root: String,
    credentials: Credentials,
    timeout: Duration,
    get_retries: u32,
    retry_delay: Duration,
}

impl HttpTransport {
    pub fn new(credentials: Credentials, settings: &Settings) -> Result<Self, ClientError> {
        let timeout = settings.request_timeout();
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ClientError::Network(format!("failed to build http client: {err}")))?;
        Ok(Self {
            http,
            api_root: api_root(credentials.base_url(), settings.api_generation)?,
            credentials,
            timeout,
            get_retries: settings.get_retries,
            retry_delay: settings.retry_delay(),
        })
    }

    pub fn api_root(&self) -> &str {
        &self.api_root
    }

    async fn send_once(&self, request: &ApiRequest) -> Result<ApiResponse, ClientError> {
        let url = format!("{}/{}", self.api_root, request.path.trim_start_matches('/'));
        let mut builder = self
            .http
            .request(request.method.as_reqwest(), &url)
            .query(&request.query);
        builder = auth::authorize(builder, &self.credentials);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|err| self.classify(err))?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(|err| self.classify(err))?;

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            match serde_json::from_slice::<Value>(&bytes) {
                Ok(body) => body,
                Err(_) if !(200..300).contains(&status) => Value::Null,
                Err(err) => return Err(ClientError::Decode(err.to_string())),
            }
        };

        debug!(method = ?request.method, path = %request.path, status, "store request completed");
        Ok(ApiResponse { status, body })
    }

    fn classify(&self, err: reqwest::Error) -> ClientError {
        if err.is_timeout() {
            ClientError::Timeout(self.timeout)
        } else {
            ClientError::from(err)
        }
    }
}

#[async_trait]
impl StoreTransport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        let retries = if request.method == HttpMethod::Get {
            self.get_retries
        } else {
            0
        };

        let mut attempt = 0;
        loop {
            match self.send_once(&request).await {
                Err(err) if err.is_network() && attempt < retries => {
                    attempt += 1;
                    warn!(
                        path = %request.path,
                        attempt,
                        error = %err,
                        "store request failed; retrying"
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                result => return result,
            }
        }
    }
}

pub fn api_root(base_url: &str, generation: ApiGeneration) -> Result<String, ClientError> {
    let trimmed = base_url.trim().trim_end_matches('/');
    let parsed = Url::parse(trimmed)
        .map_err(|err| ClientError::Credentials(format!("invalid base url '{trimmed}': {err}")))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ClientError::Credentials(format!(
            "base url must use http or https, got '{}'",
            parsed.scheme()
        )));
    }
    Ok(format!("{trimmed}{}", generation.prefix()))
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
