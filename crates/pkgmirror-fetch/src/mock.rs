//! In-memory [`HttpClient`] with canned routes and a call log.

use std::collections::HashMap;
use std::sync::Mutex;

use bytes::Bytes;
use futures_util::StreamExt;

use crate::http::{HeadResponse, HttpClient, Response};
use crate::{FetchError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Head,
    Get,
    Post,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Call {
    pub method: Method,
    pub url: String,
}

/// Canned answer for one URL, shared by HEAD, GET and POST.
#[derive(Clone, Debug, Default)]
pub struct MockRoute {
    status: u16,
    content_type: Option<String>,
    location: Option<String>,
    content_disposition: Option<String>,
    content_length: Option<u64>,
    body: Bytes,
    transport_error: Option<String>,
}

impl MockRoute {
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::status(200).body(body)
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn redirect(location: &str) -> Self {
        Self::status(302).location(location)
    }

    pub fn transport_error(message: &str) -> Self {
        Self {
            transport_error: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn content_type(mut self, value: &str) -> Self {
        self.content_type = Some(value.to_string());
        self
    }

    pub fn location(mut self, value: &str) -> Self {
        self.location = Some(value.to_string());
        self
    }

    pub fn content_disposition(mut self, value: &str) -> Self {
        self.content_disposition = Some(value.to_string());
        self
    }

    /// Override the length HEAD reports; defaults to the body length.
    pub fn content_length(mut self, value: u64) -> Self {
        self.content_length = Some(value);
        self
    }
}

/// Routes are looked up by exact URL; unknown URLs answer 404.
#[derive(Debug, Default)]
pub struct MockClient {
    routes: Mutex<HashMap<String, MockRoute>>,
    calls: Mutex<Vec<Call>>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_route(self, url: &str, route: MockRoute) -> Self {
        self.set_route(url, route);
        self
    }

    pub fn set_route(&self, url: &str, route: MockRoute) {
        lock(&self.routes).insert(url.to_string(), route);
    }

    pub fn remove_route(&self, url: &str) {
        lock(&self.routes).remove(url);
    }

    pub fn calls(&self) -> Vec<Call> {
        lock(&self.calls).clone()
    }

    pub fn count(&self, method: Method) -> usize {
        lock(&self.calls).iter().filter(|c| c.method == method).count()
    }

    pub fn count_url(&self, method: Method, url: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| c.method == method && c.url == url)
            .count()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    fn answer(&self, method: Method, url: &str) -> Result<MockRoute> {
        lock(&self.calls).push(Call {
            method,
            url: url.to_string(),
        });
        let route = lock(&self.routes)
            .get(url)
            .cloned()
            .unwrap_or_else(|| MockRoute::status(404));
        match &route.transport_error {
            Some(message) => Err(FetchError::Transport {
                url: url.to_string(),
                message: message.clone(),
            }),
            None => Ok(route),
        }
    }

    fn respond(route: MockRoute) -> Response {
        let body = route.body.clone();
        Response {
            status: route.status,
            content_type: route.content_type,
            content_length: Some(body.len() as u64),
            body: futures_util::stream::iter(
                body.chunks(7)
                    .map(|c| Ok(Bytes::copy_from_slice(c)))
                    .collect::<Vec<_>>(),
            )
            .boxed(),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl HttpClient for MockClient {
    async fn head(&self, url: &str) -> Result<HeadResponse> {
        let route = self.answer(Method::Head, url)?;
        Ok(HeadResponse {
            status: route.status,
            content_length: route.content_length.or(Some(route.body.len() as u64)),
            location: route.location,
            content_disposition: route.content_disposition,
            content_type: route.content_type,
        })
    }

    async fn get(&self, url: &str, _headers: &[(String, String)]) -> Result<Response> {
        self.answer(Method::Get, url).map(Self::respond)
    }

    async fn post(&self, url: &str, _content_type: &str, _body: Vec<u8>) -> Result<Response> {
        self.answer(Method::Post, url).map(Self::respond)
    }
}
