use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use futures_util::stream::BoxStream;

use crate::Result;

/// Metadata returned by a HEAD request. Redirects are reported, not followed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HeadResponse {
    pub status: u16,
    pub location: Option<String>,
    pub content_disposition: Option<String>,
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
}

/// A response whose body is consumed as a stream of chunks.
pub struct Response {
    pub status: u16,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub body: BoxStream<'static, Result<Bytes>>,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Collect the whole body into memory.
    pub async fn bytes(self) -> Result<Bytes> {
        let mut body = self.body;
        let mut buf = BytesMut::new();
        while let Some(chunk) = body.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }

    pub async fn text(self) -> Result<String> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// HTTP operations the mirror engine needs.
///
/// Every call is expected to carry a timeout; for `get` it limits stalls,
/// not total transfer time. `head` must not follow
/// redirects; `get` may.
pub trait HttpClient: Send + Sync {
    fn head(&self, url: &str) -> impl Future<Output = Result<HeadResponse>> + Send;

    fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> impl Future<Output = Result<Response>> + Send;

    fn post(
        &self,
        url: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> impl Future<Output = Result<Response>> + Send;
}

impl<T: HttpClient> HttpClient for Arc<T> {
    fn head(&self, url: &str) -> impl Future<Output = Result<HeadResponse>> + Send {
        (**self).head(url)
    }

    fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
    ) -> impl Future<Output = Result<Response>> + Send {
        (**self).get(url, headers)
    }

    fn post(
        &self,
        url: &str,
        content_type: &str,
        body: Vec<u8>,
    ) -> impl Future<Output = Result<Response>> + Send {
        (**self).post(url, content_type, body)
    }
}

/// Transport settings shared by every request.
#[derive(Clone, Debug)]
pub struct HttpConfig {
    /// Deadline for HEAD and POST requests; connect and idle-read limit
    /// for GET.
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: concat!("pkgmirror/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[cfg(feature = "reqwest")]
mod reqwest_impl {
    use super::*;
    use crate::FetchError;
    use reqwest::header::{self, HeaderMap};

    /// Production client backed by reqwest.
    ///
    /// HEAD requests never follow redirects. HEAD and POST requests are
    /// bounded by a whole-request deadline. GET downloads follow redirects
    /// and are bounded only by connect and idle-read timeouts, so a slow but
    /// live transfer of a large artifact is never cut off.
    #[derive(Clone, Debug)]
    pub struct ReqwestClient {
        probe: reqwest::Client,
        api: reqwest::Client,
        download: reqwest::Client,
    }

    impl ReqwestClient {
        pub fn new(config: &HttpConfig) -> Result<Self> {
            let builder = || {
                reqwest::Client::builder()
                    .connect_timeout(config.timeout)
                    .user_agent(config.user_agent.clone())
            };
            let build = |builder: reqwest::ClientBuilder| {
                builder
                    .build()
                    .map_err(|e| FetchError::Client(e.to_string()))
            };
            Ok(Self {
                probe: build(
                    builder()
                        .timeout(config.timeout)
                        .redirect(reqwest::redirect::Policy::none()),
                )?,
                api: build(builder().timeout(config.timeout))?,
                download: build(builder().read_timeout(config.timeout))?,
            })
        }
    }

    fn map_err(url: &str, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout { url: url.to_string() }
        } else if e.is_builder() {
            FetchError::InvalidUrl {
                url: url.to_string(),
                reason: e.to_string(),
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            }
        }
    }

    fn header_str(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    fn into_response(url: &str, response: reqwest::Response) -> Response {
        let status = response.status().as_u16();
        let content_type = header_str(response.headers(), header::CONTENT_TYPE);
        let content_length = response.content_length();
        let owned_url = url.to_string();
        let body = response
            .bytes_stream()
            .map(move |chunk| chunk.map_err(|e| map_err(&owned_url, e)))
            .boxed();
        Response {
            status,
            content_type,
            content_length,
            body,
        }
    }

    impl HttpClient for ReqwestClient {
        async fn head(&self, url: &str) -> Result<HeadResponse> {
            let response = self
                .probe
                .head(url)
                .send()
                .await
                .map_err(|e| map_err(url, e))?;
            let headers = response.headers();
            Ok(HeadResponse {
                status: response.status().as_u16(),
                location: header_str(headers, header::LOCATION),
                content_disposition: header_str(headers, header::CONTENT_DISPOSITION),
                content_length: header_str(headers, header::CONTENT_LENGTH)
                    .and_then(|s| s.trim().parse().ok()),
                content_type: header_str(headers, header::CONTENT_TYPE),
            })
        }

        async fn get(&self, url: &str, headers: &[(String, String)]) -> Result<Response> {
            let mut request = self.download.get(url);
            for (key, value) in headers {
                request = request.header(key, value);
            }
            let response = request.send().await.map_err(|e| map_err(url, e))?;
            Ok(into_response(url, response))
        }

        async fn post(&self, url: &str, content_type: &str, body: Vec<u8>) -> Result<Response> {
            let response = self
                .api
                .post(url)
                .header(header::CONTENT_TYPE, content_type)
                .body(body)
                .send()
                .await
                .map_err(|e| map_err(url, e))?;
            Ok(into_response(url, response))
        }
    }
}

#[cfg(feature = "reqwest")]
pub use reqwest_impl::ReqwestClient;
