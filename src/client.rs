//! Watch requests against the App Services functions endpoint
//!
//! A watch is a streaming call of the `watch` service function. The call is
//! sent as a `GET` whose `baas_request` query parameter carries the
//! base64-encoded JSON function call, and the response body is the
//! event stream consumed by [`crate::watch::change_stream`].

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{header, Client, Url};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::{
    config::Settings,
    error::{Error, Result},
    events::Document,
    watch::{change_stream, ChangeStream},
};

/// What to watch: a whole collection, a set of ids, or a filter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatchRequest {
    pub database: String,
    pub collection: String,

    /// Only report changes to documents with these `_id`s
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<Value>>,

    /// Only report changes matching this filter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Document>,
}

impl WatchRequest {
    /// Watch every change in a collection
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
            ids: None,
            filter: None,
        }
    }

    /// Restrict to documents with the given ids (replaces any filter)
    #[must_use]
    pub fn with_ids(mut self, ids: Vec<Value>) -> Self {
        self.ids = Some(ids);
        self.filter = None;
        self
    }

    /// Restrict to changes matching `filter` (replaces any ids)
    #[must_use]
    pub fn with_filter(mut self, filter: Document) -> Self {
        self.filter = Some(filter);
        self.ids = None;
        self
    }
}

/// Body of a remote function call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
}

impl FunctionCall {
    /// The `watch` call for a request on a service
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be serialized
    pub fn watch(request: &WatchRequest, service: &str) -> Result<Self> {
        Ok(Self {
            name: "watch".to_string(),
            arguments: vec![serde_json::to_value(request)?],
            service: Some(service.to_string()),
        })
    }

    /// Base64 of the JSON body, as sent in `baas_request`
    ///
    /// # Errors
    ///
    /// Returns an error if the call cannot be serialized
    pub fn encode(&self) -> Result<String> {
        Ok(STANDARD.encode(serde_json::to_vec(self)?))
    }
}

/// HTTP client for opening change streams
pub struct WatchClient {
    http: Client,
    settings: Settings,
    base_url: Url,
}

impl WatchClient {
    /// Create a client from validated settings
    ///
    /// # Errors
    ///
    /// Returns an error if the settings are invalid or the HTTP client
    /// cannot be built
    pub fn new(settings: Settings) -> Result<Self> {
        settings.validate()?;
        let base_url = Url::parse(&settings.base_url)
            .map_err(|e| Error::InvalidConfig(format!("invalid base_url: {e}")))?;

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("text/event-stream"),
        );
        if let Some(token) = &settings.access_token {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                    Error::InvalidConfig("Invalid access token format".to_string())
                })?,
            );
        }

        let http = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            http,
            settings,
            base_url,
        })
    }

    /// URL of the streaming function call for `request`
    ///
    /// # Errors
    ///
    /// Returns an error if the call cannot be serialized
    pub fn watch_url(&self, request: &WatchRequest) -> Result<Url> {
        let mut url = self.base_url.clone();
        let path = format!(
            "{}/api/client/v2.0/app/{}/functions/call",
            url.path().trim_end_matches('/'),
            self.settings.app_id
        );
        url.set_path(&path);

        let call = FunctionCall::watch(request, &self.settings.service_name)?;
        url.query_pairs_mut()
            .clear()
            .append_pair("baas_request", &call.encode()?);
        Ok(url)
    }

    /// Open a change stream
    ///
    /// The returned stream ends after the first error. Dropping it closes
    /// the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server answers with a
    /// non-success status
    pub async fn watch<T>(&self, request: &WatchRequest) -> Result<ChangeStream<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let url = self.watch_url(request)?;
        tracing::debug!(
            database = %request.database,
            collection = %request.collection,
            "opening change stream"
        );

        let response = self.http.get(url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response.text().await?;
            return Err(Error::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(change_stream(response.bytes_stream()))
    }
}
