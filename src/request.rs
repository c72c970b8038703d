//! Incoming HTTP request type.

use std::collections::HashMap;

use bytes::Bytes;
use http::request::Parts;
use http::{HeaderMap, Method, Uri};

use crate::body::Body;
use crate::context::RequestContext;
use crate::error::BoxError;

/// An incoming HTTP request.
///
/// The body is a shared, lazily buffered [`Body`]; reading it never prevents
/// another component from reading it again.
pub struct Request {
    head: Parts,
    body: Body,
    params: HashMap<String, String>,
    context: RequestContext,
}

impl Request {
    /// Wraps an `http::Request` with any body type, starting a fresh
    /// [`RequestContext`].
    pub fn from_http<B>(req: http::Request<B>) -> Self
    where
        B: hyper::body::Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let (head, body) = req.into_parts();
        Self {
            head,
            body: Body::from_stream(body),
            params: HashMap::new(),
            context: RequestContext::new(),
        }
    }

    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }

    pub fn method(&self) -> &Method { &self.head.method }
    pub fn uri(&self) -> &Uri { &self.head.uri }
    pub fn path(&self) -> &str { self.head.uri.path() }
    pub fn headers(&self) -> &HeaderMap { &self.head.headers }
    pub fn body(&self) -> &Body { &self.body }
    pub fn context(&self) -> &RequestContext { &self.context }

    /// Case-insensitive header lookup. Values that are not visible ASCII are
    /// treated as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.headers.get(name)?.to_str().ok()
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use http_body_util::Full;

    fn request() -> Request {
        let req = http::Request::builder()
            .method(Method::POST)
            .uri("/users/42?verbose=1")
            .header("Content-Type", "application/json")
            .body(Full::new(Bytes::from_static(b"{}")))
            .unwrap();
        Request::from_http(req)
    }

    #[test]
    fn exposes_request_line() {
        let req = request();
        assert_eq!(req.method(), Method::POST);
        assert_eq!(req.path(), "/users/42");
        assert_eq!(req.uri().query(), Some("verbose=1"));
    }

    #[test]
    fn header_lookup_ignores_case() {
        let req = request();
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(req.header("CONTENT-TYPE"), Some("application/json"));
        assert_eq!(req.header("accept"), None);
    }

    #[test]
    fn params_are_set_by_the_router() {
        let mut req = request();
        assert_eq!(req.param("id"), None);

        req.set_params(HashMap::from([("id".to_owned(), "42".to_owned())]));
        assert_eq!(req.param("id"), Some("42"));
    }

    #[tokio::test]
    async fn body_is_readable() {
        let req = request();
        assert_eq!(req.body().text().await.unwrap(), "{}");
    }
}
