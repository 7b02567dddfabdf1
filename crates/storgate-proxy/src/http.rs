//! Buffered HTTP request/response model at the proxy boundary

use std::collections::HashMap;

/// A fully buffered HTTP request as seen by the interception hook.
///
/// The raw transport lives outside this crate; by the time a request
/// reaches the classifier its body has been read in full.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method ("GET", "PUT", ...)
    pub method: String,
    /// URL path, path-style ("/bucket/key")
    pub path: String,
    /// Decoded query parameters; bare markers map to an empty value
    pub query: HashMap<String, String>,
    /// Headers with lower-cased names
    pub headers: HashMap<String, String>,
    /// Fully buffered request body
    pub body: Vec<u8>,
    /// Remote peer address ("ip:port")
    pub remote_addr: String,
}

impl HttpRequest {
    /// Creates a request with the given method and path.
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            method: method.to_string(),
            path: path.to_string(),
            query: HashMap::new(),
            headers: HashMap::new(),
            body: Vec::new(),
            remote_addr: String::new(),
        }
    }

    /// Adds a query parameter.
    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.query.insert(key.to_string(), value.to_string());
        self
    }

    /// Adds a header (name is lower-cased).
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_lowercase(), value.to_string());
        self
    }

    /// Sets the buffered body.
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Sets the remote peer address.
    pub fn with_remote_addr(mut self, addr: &str) -> Self {
        self.remote_addr = addr.to_string();
        self
    }

    /// Returns true if the query string carries the given bare marker.
    pub fn has_query_marker(&self, key: &str) -> bool {
        self.query.contains_key(key)
    }

    /// Looks up a header value (case-insensitive name).
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(&key.to_lowercase()).map(|s| s.as_str())
    }

    /// Splits a path-style URL into (bucket, key).
    pub fn parse_path(&self) -> (String, String) {
        let path = self.path.trim_start_matches('/');
        if path.is_empty() {
            return (String::new(), String::new());
        }
        if let Some(pos) = path.find('/') {
            (path[..pos].to_string(), path[pos + 1..].to_string())
        } else {
            (path.to_string(), String::new())
        }
    }
}

/// A fully buffered upstream HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Headers with lower-cased names
    pub headers: HashMap<String, String>,
    /// Fully buffered response body
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response with the given status and no body.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    /// Adds a header (name is lower-cased).
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_lowercase(), value.to_string());
        self
    }

    /// Sets the buffered body.
    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Looks up a header value (case-insensitive name).
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(&key.to_lowercase()).map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_path_splits_bucket_and_key() {
        let req = HttpRequest::new("PUT", "/photos/img/a.jpg");
        assert_eq!(
            req.parse_path(),
            ("photos".to_string(), "img/a.jpg".to_string())
        );
    }

    #[test]
    fn test_parse_path_bucket_only() {
        let req = HttpRequest::new("GET", "/photos");
        assert_eq!(req.parse_path(), ("photos".to_string(), String::new()));
    }

    #[test]
    fn test_parse_path_empty() {
        let req = HttpRequest::new("GET", "/");
        assert_eq!(req.parse_path(), (String::new(), String::new()));
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let req = HttpRequest::new("PUT", "/b/k").with_header("X-Amz-Copy-Source", "/src/obj");
        assert_eq!(req.header("x-amz-copy-source"), Some("/src/obj"));
        assert_eq!(req.header("X-AMZ-COPY-SOURCE"), Some("/src/obj"));
    }

    #[test]
    fn test_query_marker_present_with_empty_value() {
        let req = HttpRequest::new("GET", "/b").with_query("notification", "");
        assert!(req.has_query_marker("notification"));
        assert!(!req.has_query_marker("versioning"));
    }

    #[test]
    fn test_response_header_lookup() {
        let resp = HttpResponse::new(200).with_header("ETag", "\"abc\"");
        assert_eq!(resp.header("etag"), Some("\"abc\""));
    }
}
