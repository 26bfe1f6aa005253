// HTTP client wrapper for the FarmFit datastore
//
// Every request carries the project `apikey` header and, once signed in,
// the user's bearer token.

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::{Arc, RwLock};

use crate::config::ClientConfig;
use crate::error::ClientError;

pub type QueryParams = Vec<(String, String)>;

#[derive(Clone)]
pub struct RestClient {
    base_url: String,
    api_key: String,
    access_token: Arc<RwLock<Option<String>>>,
    http: reqwest::Client,
}

impl RestClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .connect_timeout(config.http_timeout)
            .build()?;
        Ok(Self {
            base_url: config.api_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            access_token: Arc::new(RwLock::new(None)),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Use `token` as the bearer for subsequent requests (`None` to clear)
    pub fn set_access_token(&self, token: Option<String>) {
        let mut slot = self
            .access_token
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = token;
    }

    fn request(&self, method: Method, path: &str, query: &[(String, String)]) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self.http.request(method, &url).query(query);
        if !self.api_key.is_empty() {
            builder = builder.header("apikey", &self.api_key);
        }
        let token = self
            .access_token
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
            .unwrap_or_else(|| self.api_key.clone());
        if !token.is_empty() {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<T, ClientError> {
        let response = self.request(Method::GET, path, query).send().await?;
        self.handle_response(response).await
    }

    /// POST returning the stored representation
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let response = self
            .request(Method::POST, path, &[])
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// PATCH returning the stored representation
    pub async fn patch<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &[(String, String)],
        body: &B,
    ) -> Result<T, ClientError> {
        let response = self
            .request(Method::PATCH, path, query)
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await?;
        self.handle_response(response).await
    }

    pub async fn delete(&self, path: &str, query: &[(String, String)]) -> Result<(), ClientError> {
        let response = self.request(Method::DELETE, path, query).send().await?;

        if response.status() == StatusCode::NO_CONTENT || response.status() == StatusCode::OK {
            return Ok(());
        }

        let status = response.status();
        let message = response.text().await.unwrap_or_default();
        Err(ClientError::from_status(status, message))
    }

    /// Open a long-lived `text/event-stream` response
    pub async fn open_stream(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> Result<reqwest::Response, ClientError> {
        let response = self
            .request(Method::GET, path, query)
            .header("Accept", "text/event-stream")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::from_status(status, message));
        }
        Ok(response)
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::from_status(status, message));
        }

        let body = response.json().await?;
        Ok(body)
    }
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.base_url)
            .finish()
    }
}
