//! HTTP implementation of the remote document gateway.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{multipart, Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use cadshelf_core::{
    AssetUpload, DocumentGateway, DocumentPage, Error, ListQuery, RemoteDocument, RemoteVersion,
    RemoteWorkspace, Result, ThumbnailDescriptor, UploadedAsset,
};

use crate::config::GatewayConfig;
use crate::types::{ApiErrorBody, ThumbnailInfo};

/// Gateway speaking the remote service's REST API over HTTPS.
pub struct HttpGateway {
    client: Client,
    config: GatewayConfig,
}

impl HttpGateway {
    /// Create a new gateway with the given configuration.
    pub fn new(config: GatewayConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            base_url = %config.base_url,
            authenticated = config.access_key.is_some(),
            "Initializing HTTP gateway"
        );

        Ok(Self { client, config })
    }

    /// Create from environment variables, requiring credentials.
    pub fn from_env() -> Result<Self> {
        let config = GatewayConfig::from_env();
        config.validate_with_credentials()?;
        Self::new(config)
    }

    /// Get the current configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Absolute URL for an API path. Absolute hrefs (continuation pointers,
    /// thumbnail links) pass through unchanged.
    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.config.base_url, path)
        }
    }

    fn authorize(&self, req: RequestBuilder) -> RequestBuilder {
        match (&self.config.access_key, &self.config.secret_key) {
            (Some(access), secret) => req.basic_auth(access, secret.as_ref()),
            _ => req,
        }
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.authorize(self.client.get(self.url(path)))
            .header("Accept", "application/json")
    }

    /// Send a request, retrying failures allowed by `policy` up to
    /// `max_retries` times.
    ///
    /// `build` is called once per attempt because multipart bodies cannot be
    /// cloned.
    async fn send<F>(&self, op: &'static str, policy: RetryPolicy, build: F) -> Result<Response>
    where
        F: Fn() -> Result<RequestBuilder>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let (result, connect_failed) = match build()?.send().await {
                Ok(response) => (check_status(response).await, false),
                Err(e) => {
                    let connect_failed = e.is_connect();
                    (Err(Error::from(e)), connect_failed)
                }
            };
            let retry = match (&result, policy) {
                (Err(e), RetryPolicy::Transient) => e.is_retryable(),
                (Err(_), RetryPolicy::ConnectOnly) => connect_failed,
                (Ok(_), _) => false,
            };

            match result {
                Err(e) if retry && attempt <= self.config.max_retries => {
                    let wait_ms = self.config.retry_backoff_ms * attempt as u64;
                    warn!(op, attempt, wait_ms, error = %e, "Transient upstream failure, retrying");
                    sleep(Duration::from_millis(wait_ms)).await;
                }
                other => return other,
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, op: &'static str, path: &str) -> Result<T> {
        let response = self
            .send(op, RetryPolicy::Transient, || Ok(self.get(path)))
            .await?;
        response
            .json::<T>()
            .await
            .map_err(|e| Error::Serialization(format!("{}: failed to parse response: {}", op, e)))
    }

    fn upload_form(upload: &AssetUpload) -> Result<multipart::Form> {
        let part = multipart::Part::bytes(upload.bytes.clone())
            .file_name(upload.filename.clone())
            .mime_str(&upload.media_type)
            .map_err(|e| Error::InvalidInput(format!("Invalid media type: {}", e)))?;

        let mut form = multipart::Form::new()
            .part("file", part)
            .text("encodedFilename", upload.filename.clone());
        if let Some(ref name) = upload.display_name {
            form = form.text("displayName", name.clone());
        }
        Ok(form)
    }

    async fn post_asset(
        &self,
        op: &'static str,
        policy: RetryPolicy,
        path: String,
        upload: &AssetUpload,
    ) -> Result<UploadedAsset> {
        let response = self
            .send(op, policy, || {
                let form = Self::upload_form(upload)?;
                Ok(self
                    .authorize(self.client.post(self.url(&path)))
                    .header("Accept", "application/json")
                    .multipart(form))
            })
            .await?;

        let asset: UploadedAsset = response.json().await.map_err(|e| {
            Error::Serialization(format!("{}: failed to parse response: {}", op, e))
        })?;
        info!(
            document_id = %upload.document_id,
            element_id = %asset.id,
            size_bytes = upload.bytes.len(),
            "Asset stored"
        );
        Ok(asset)
    }
}

/// Which failures a request may be retried on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RetryPolicy {
    /// Connection failures, timeouts, 429 and 5xx.
    Transient,
    /// Only failures to connect, where the request never reached the server.
    ConnectOnly,
}

/// Turn non-success responses into taxonomy errors.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::from_status(
        status.as_u16(),
        ApiErrorBody::detail(&body),
    ))
}

/// Reject ids that would escape their path segment.
fn segment<'a>(kind: &str, id: &'a str) -> Result<&'a str> {
    if id.is_empty() || id.contains('/') || id.contains('?') || id.contains('#') {
        return Err(Error::InvalidInput(format!("Invalid {} id: {:?}", kind, id)));
    }
    Ok(id)
}

/// Query parameters for a listing request.
fn list_params(query: &ListQuery, default_limit: u32) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();
    if let Some(filter) = query.filter {
        params.push(("filter", filter.code().to_string()));
    }
    if let Some(ref q) = query.query {
        if !q.is_empty() {
            params.push(("q", q.clone()));
        }
    }
    if let Some(ref column) = query.sort_column {
        params.push(("sortColumn", column.clone()));
    }
    if let Some(order) = query.sort_order {
        params.push(("sortOrder", order.as_str().to_string()));
    }
    params.push(("offset", "0".to_string()));
    params.push((
        "limit",
        query.limit.unwrap_or(default_limit).max(1).to_string(),
    ));
    params
}

#[async_trait]
impl DocumentGateway for HttpGateway {
    #[instrument(skip(self), fields(subsystem = "gateway", component = "http", op = "get_document"))]
    async fn get_document(&self, document_id: &str) -> Result<RemoteDocument> {
        let id = segment("document", document_id)?;
        self.get_json("get_document", &format!("/documents/{}", id))
            .await
    }

    #[instrument(skip(self), fields(subsystem = "gateway", component = "http", op = "get_workspaces"))]
    async fn get_workspaces(&self, document_id: &str) -> Result<Vec<RemoteWorkspace>> {
        let id = segment("document", document_id)?;
        self.get_json("get_workspaces", &format!("/documents/d/{}/workspaces", id))
            .await
    }

    #[instrument(skip(self), fields(subsystem = "gateway", component = "http", op = "get_versions"))]
    async fn get_versions(&self, document_id: &str) -> Result<Vec<RemoteVersion>> {
        let id = segment("document", document_id)?;
        self.get_json("get_versions", &format!("/documents/d/{}/versions", id))
            .await
    }

    #[instrument(skip(self), fields(subsystem = "gateway", component = "http", op = "get_thumbnails"))]
    async fn get_thumbnail_descriptors(
        &self,
        document_id: &str,
    ) -> Result<Vec<ThumbnailDescriptor>> {
        let id = segment("document", document_id)?;
        let info: ThumbnailInfo = self
            .get_json("get_thumbnails", &format!("/thumbnails/d/{}", id))
            .await?;
        Ok(info.sizes)
    }

    #[instrument(skip(self), fields(subsystem = "gateway", component = "http", op = "download_thumbnail"))]
    async fn download_thumbnail(&self, href: &str) -> Result<Vec<u8>> {
        let response = self
            .send("download_thumbnail", RetryPolicy::Transient, || {
                Ok(self.authorize(self.client.get(self.url(href))))
            })
            .await?;
        let bytes = response.bytes().await?;
        debug!(size_bytes = bytes.len(), "Thumbnail downloaded");
        Ok(bytes.to_vec())
    }

    #[instrument(skip(self, query), fields(subsystem = "gateway", component = "http", op = "list_documents"))]
    async fn list_documents(&self, query: &ListQuery, next: Option<&str>) -> Result<DocumentPage> {
        let page: DocumentPage = match next {
            Some(href) => self.get_json("list_documents", href).await?,
            None => {
                let params = list_params(query, self.config.page_size);
                let response = self
                    .send("list_documents", RetryPolicy::Transient, || {
                        Ok(self.get("/documents").query(&params))
                    })
                    .await?;
                response.json().await.map_err(|e| {
                    Error::Serialization(format!("list_documents: failed to parse response: {}", e))
                })?
            }
        };
        debug!(
            result_count = page.items.len(),
            has_next = page.next.is_some(),
            "Listing page fetched"
        );
        Ok(page)
    }

    #[instrument(skip(self, upload), fields(subsystem = "gateway", component = "http", op = "upload_asset", document_id = %upload.document_id))]
    async fn upload_document_asset(&self, upload: AssetUpload) -> Result<UploadedAsset> {
        let path = format!(
            "/blobelements/d/{}/w/{}",
            segment("document", &upload.document_id)?,
            segment("workspace", &upload.workspace_id)?
        );
        // A create that reached the server may have succeeded; retrying it
        // could add a duplicate element.
        self.post_asset("upload_asset", RetryPolicy::ConnectOnly, path, &upload)
            .await
    }

    #[instrument(skip(self, upload), fields(subsystem = "gateway", component = "http", op = "update_asset", document_id = %upload.document_id))]
    async fn update_document_asset(
        &self,
        element_id: &str,
        upload: AssetUpload,
    ) -> Result<UploadedAsset> {
        let path = format!(
            "/blobelements/d/{}/w/{}/e/{}",
            segment("document", &upload.document_id)?,
            segment("workspace", &upload.workspace_id)?,
            segment("element", element_id)?
        );
        self.post_asset("update_asset", RetryPolicy::Transient, path, &upload)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadshelf_core::{DocumentFilter, SortOrder};

    fn gateway() -> HttpGateway {
        HttpGateway::new(GatewayConfig::default().with_base_url("http://localhost:9/api")).unwrap()
    }

    #[test]
    fn test_url_joins_relative_paths() {
        let gw = gateway();
        assert_eq!(gw.url("/documents/x"), "http://localhost:9/api/documents/x");
    }

    #[test]
    fn test_url_passes_absolute_through() {
        let gw = gateway();
        let next = "https://other.example.com/api/documents?offset=20";
        assert_eq!(gw.url(next), next);
    }

    #[test]
    fn test_segment_rejects_traversal() {
        assert!(segment("document", "abc123").is_ok());
        assert!(segment("document", "").is_err());
        assert!(segment("document", "../etc").is_err());
        assert!(segment("document", "a?b").is_err());
    }

    #[test]
    fn test_list_params_full_query() {
        let query = ListQuery {
            filter: Some(DocumentFilter::Public),
            query: Some("bracket".to_string()),
            sort_column: Some("name".to_string()),
            sort_order: Some(SortOrder::Asc),
            limit: Some(50),
        };
        let params = list_params(&query, 20);
        assert!(params.contains(&("filter", "4".to_string())));
        assert!(params.contains(&("q", "bracket".to_string())));
        assert!(params.contains(&("sortColumn", "name".to_string())));
        assert!(params.contains(&("sortOrder", "asc".to_string())));
        assert!(params.contains(&("limit", "50".to_string())));
    }

    #[test]
    fn test_list_params_defaults() {
        let params = list_params(&ListQuery::default(), 20);
        assert!(params.iter().all(|(k, _)| *k != "filter" && *k != "q"));
        assert!(params.contains(&("limit", "20".to_string())));
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let result = HttpGateway::new(GatewayConfig::default().with_base_url("not-a-url"));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
