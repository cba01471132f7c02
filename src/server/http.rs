//! `reqwest` implementation of [`ImagingServer`].

use super::{DebugPlotRequest, ImagingServer, MainImageRequest, StatusReply};
use crate::config::ServerConfig;
use crate::error::{AppResult, PanelError};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Response};
use tracing::trace;
use url::Url;

/// HTTP client for the imaging server.
#[derive(Debug, Clone)]
pub struct HttpImagingServer {
    client: Client,
    base: Url,
    status_path: String,
    status_payload: String,
}

impl HttpImagingServer {
    /// Client for the server at `config.base_url`.
    pub fn new(config: &ServerConfig) -> AppResult<Self> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            base: normalize_base(&config.base_url)?,
            status_path: config.status_path.clone(),
            status_payload: config.status_payload.clone(),
        })
    }

    /// Base URL with a trailing slash.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Resolve a server resource against the base URL.
    ///
    /// The base is treated as a directory, so `http://host/panel` and
    /// `http://host/panel/` both resolve `debug` to `http://host/panel/debug`.
    pub fn endpoint(&self, path: &str) -> AppResult<Url> {
        Ok(self.base.join(path.trim_start_matches('/'))?)
    }

    async fn get_image(&self, path: &str, query: &[(&str, String)]) -> AppResult<Bytes> {
        let url = self.endpoint(path)?;
        trace!(%url, "GET");
        let response = self.client.get(url).query(query).send().await?;
        let response = check_status(response, path)?;
        Ok(response.bytes().await?)
    }
}

fn normalize_base(base_url: &str) -> AppResult<Url> {
    let mut base = Url::parse(base_url)?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base)
}

fn check_status(response: Response, path: &str) -> AppResult<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(PanelError::ServerStatus {
            status: status.as_u16(),
            path: path.to_string(),
        })
    }
}

#[async_trait]
impl ImagingServer for HttpImagingServer {
    async fn fetch_main_image(&self, request: &MainImageRequest) -> AppResult<Bytes> {
        self.get_image(request.path(), &request.query()).await
    }

    async fn fetch_debug_plot(&self, request: &DebugPlotRequest) -> AppResult<Bytes> {
        self.get_image(DebugPlotRequest::PATH, &request.query()).await
    }

    async fn micro_status(&self) -> AppResult<StatusReply> {
        let url = self.endpoint(&self.status_path)?;
        trace!(%url, "POST");
        let response = self
            .client
            .post(url)
            .json(&self.status_payload)
            .send()
            .await?;
        let response = check_status(response, &self.status_path)?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| PanelError::MalformedStatus(e.to_string()))
    }
}
