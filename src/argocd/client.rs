use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{stream, Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Response, Url};
use tracing::{debug, info, warn};

use crate::error::ApiError;
use crate::model::ResourceNode;

use super::sse::SseLineBuffer;
use super::{wire, AppListing, ApplicationSource, EventStream, TreeStream, WatchFilter};

/// Connection settings for [`ArgoClient`].
#[derive(Clone, Debug)]
pub struct ClientOptions {
    pub server: Url,
    pub auth_token: Option<String>,
    pub insecure: bool,
    /// Applies to unary requests and stream connects, not to open streams.
    pub request_timeout: Duration,
}

/// HTTP client for the Argo CD REST API.
pub struct ArgoClient {
    http: Client,
    base: Url,
    request_timeout: Duration,
}

impl ArgoClient {
    pub fn new(options: ClientOptions) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = options.auth_token.as_deref().filter(|t| !t.is_empty()) {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ApiError::Setup("auth token is not a valid header value".into()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = Client::builder()
            .default_headers(headers)
            .danger_accept_invalid_certs(options.insecure)
            .connect_timeout(options.request_timeout)
            .build()
            .map_err(|e| ApiError::Setup(e.to_string()))?;

        Ok(Self {
            http,
            base: options.server,
            request_timeout: options.request_timeout,
        })
    }

    pub fn server(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| ApiError::InvalidUrl(self.base.to_string()))?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    async fn get_bytes(&self, url: Url) -> Result<Vec<u8>, ApiError> {
        debug!(%url, "GET");
        let response = self
            .http
            .get(url.clone())
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|source| ApiError::Transport { url: url.to_string(), source })?;
        let response = check_status(&url, response).await?;
        let body = response
            .bytes()
            .await
            .map_err(|source| ApiError::Transport { url: url.to_string(), source })?;
        Ok(body.to_vec())
    }

    async fn post_json(&self, url: Url, body: &serde_json::Value) -> Result<(), ApiError> {
        debug!(%url, "POST");
        let response = self
            .http
            .post(url.clone())
            .timeout(self.request_timeout)
            .json(body)
            .send()
            .await
            .map_err(|source| ApiError::Transport { url: url.to_string(), source })?;
        check_status(&url, response).await?;
        Ok(())
    }

    async fn open_stream(&self, url: &Url) -> Result<Response, ApiError> {
        debug!(%url, "opening stream");
        let response = self
            .http
            .get(url.clone())
            .header("Accept", "text/event-stream")
            .send()
            .await
            .map_err(|source| ApiError::Transport { url: url.to_string(), source })?;
        check_status(url, response).await
    }
}

fn with_app_namespace(mut url: Url, app_namespace: Option<&str>) -> Url {
    if let Some(ns) = app_namespace.filter(|ns| !ns.is_empty()) {
        url.query_pairs_mut().append_pair("appNamespace", ns);
    }
    url
}

fn sync_request_body(app_namespace: Option<&str>) -> serde_json::Value {
    let mut body = serde_json::json!({ "prune": false, "dryRun": false });
    if let Some(ns) = app_namespace.filter(|ns| !ns.is_empty()) {
        body["appNamespace"] = serde_json::Value::from(ns);
    }
    body
}

async fn check_status(url: &Url, response: Response) -> Result<Response, ApiError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body: String = response.text().await.unwrap_or_default().chars().take(300).collect();
    Err(ApiError::Status {
        url: url.to_string(),
        status,
        body,
    })
}

struct SseState<S, F, T> {
    bytes: S,
    lines: SseLineBuffer,
    ready: VecDeque<Result<T, ApiError>>,
    decode: F,
    url: String,
    done: bool,
}

impl<S, F, T> SseState<S, F, T>
where
    F: Fn(&str) -> Result<Option<T>, ApiError>,
{
    /// Queue a decoded payload. Malformed payloads are logged and dropped; any
    /// other decode error ends the stream.
    fn accept(&mut self, payload: &str) {
        match (self.decode)(payload) {
            Ok(Some(item)) => self.ready.push_back(Ok(item)),
            Ok(None) => {}
            Err(e) if e.is_malformed() => {
                warn!(url = %self.url, error = %e, "dropping malformed stream event");
            }
            Err(e) => {
                self.ready.push_back(Err(e));
                self.done = true;
            }
        }
    }
}

/// Turn an SSE response into a stream of decoded items.
fn sse_stream<T, F>(response: Response, url: String, decode: F) -> stream::BoxStream<'static, Result<T, ApiError>>
where
    T: Send + 'static,
    F: Fn(&str) -> Result<Option<T>, ApiError> + Send + 'static,
{
    let state = SseState {
        bytes: Box::pin(response.bytes_stream()),
        lines: SseLineBuffer::new(),
        ready: VecDeque::new(),
        decode,
        url,
        done: false,
    };
    unfold_sse(state).boxed()
}

fn unfold_sse<S, B, F, T>(state: SseState<S, F, T>) -> impl Stream<Item = Result<T, ApiError>>
where
    S: Stream<Item = Result<B, reqwest::Error>> + Unpin,
    B: AsRef<[u8]>,
    F: Fn(&str) -> Result<Option<T>, ApiError>,
{
    stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.ready.pop_front() {
                return Some((item, st));
            }
            if st.done {
                return None;
            }
            match st.bytes.next().await {
                Some(Ok(chunk)) => {
                    for payload in st.lines.push(chunk.as_ref()) {
                        st.accept(&payload);
                        if st.done {
                            break;
                        }
                    }
                }
                Some(Err(source)) => {
                    let url = st.url.clone();
                    st.ready.push_back(Err(ApiError::Transport { url, source }));
                    st.done = true;
                }
                None => {
                    if let Some(payload) = st.lines.finish() {
                        st.accept(&payload);
                    }
                    debug!(url = %st.url, "stream closed by server");
                    st.done = true;
                }
            }
        }
    })
}

#[async_trait]
impl ApplicationSource for ArgoClient {
    async fn list_applications(&self) -> Result<AppListing, ApiError> {
        let url = self.endpoint(&["api", "v1", "applications"])?;
        let body = self.get_bytes(url).await?;
        let listing = wire::decode_listing(&body)?;
        info!(
            count = listing.applications.len(),
            cursor = %listing.resource_version,
            "listed applications"
        );
        Ok(listing)
    }

    async fn watch_applications(&self, cursor: &str, filter: &WatchFilter) -> Result<EventStream, ApiError> {
        let mut url = self.endpoint(&["api", "v1", "stream", "applications"])?;
        if !cursor.is_empty() || !filter.projects.is_empty() {
            let mut query = url.query_pairs_mut();
            if !cursor.is_empty() {
                query.append_pair("resourceVersion", cursor);
            }
            for project in &filter.projects {
                query.append_pair("projects", project);
            }
        }
        let response = self.open_stream(&url).await?;
        info!(cursor, projects = ?filter.projects, "application watch established");
        Ok(sse_stream(response, url.to_string(), wire::decode_watch_event))
    }

    async fn get_resource_tree(&self, app: &str) -> Result<Vec<ResourceNode>, ApiError> {
        let url = self.endpoint(&["api", "v1", "applications", app, "resource-tree"])?;
        let body = self.get_bytes(url).await?;
        wire::decode_tree(&body)
    }

    async fn watch_resource_tree(&self, app: &str) -> Result<TreeStream, ApiError> {
        let url = self.endpoint(&["api", "v1", "stream", "applications", app, "resource-tree"])?;
        let response = self.open_stream(&url).await?;
        debug!(app, "resource tree watch established");
        Ok(sse_stream(response, url.to_string(), wire::decode_tree_event))
    }

    async fn sync_application(&self, app: &str, app_namespace: Option<&str>) -> Result<(), ApiError> {
        let url = self.endpoint(&["api", "v1", "applications", app, "sync"])?;
        self.post_json(url, &sync_request_body(app_namespace)).await?;
        info!(app, "sync requested");
        Ok(())
    }

    async fn refresh_application(&self, app: &str, app_namespace: Option<&str>) -> Result<(), ApiError> {
        let mut url = self.endpoint(&["api", "v1", "applications", app])?;
        url.query_pairs_mut().append_pair("refresh", "normal");
        let url = with_app_namespace(url, app_namespace);
        self.get_bytes(url).await?;
        info!(app, "refresh requested");
        Ok(())
    }
}
