//! Per-response classification of proxied storage operations

use crate::event::EventName;
use crate::http::{HttpRequest, HttpResponse};

/// Query markers that mark an admin user call as key/quota management
/// rather than user creation.
const KEY_MANAGEMENT_MARKERS: [&str; 4] = ["subuser", "key", "quota", "caps"];

/// Everything the classifier and the event builder need from one
/// request/response exchange. Derived per response, never persisted.
#[derive(Debug, Clone)]
pub struct ObjectOperationContext {
    /// Request method
    pub method: String,
    /// Bucket parsed from the request path
    pub bucket: String,
    /// Object key parsed from the request path
    pub key: String,
    /// Upstream response status
    pub status: u16,
    /// ETag response header, if present
    pub etag: Option<String>,
    /// True if the request carried a copy-source header
    pub has_copy_source: bool,
    /// Request id echoed by the upstream response
    pub request_id: String,
    /// Remote peer address of the original request
    pub remote_addr: String,
    /// Object size taken from the request content length
    pub object_size: u64,
    /// True if the request path is the admin "create user" endpoint
    pub is_admin_user_request: bool,
    /// True if the request carried a key/quota/caps management marker
    pub has_key_management_marker: bool,
}

impl ObjectOperationContext {
    /// Derives a context from a buffered request/response exchange.
    pub fn from_exchange(req: &HttpRequest, resp: &HttpResponse) -> Self {
        let (bucket, key) = req.parse_path();
        let object_size = req
            .header("content-length")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(req.body.len() as u64);

        Self {
            method: req.method.clone(),
            bucket,
            key,
            status: resp.status,
            etag: resp.header("etag").map(|s| s.to_string()),
            has_copy_source: req.header("x-amz-copy-source").is_some(),
            request_id: resp
                .header("x-amz-request-id")
                .unwrap_or_default()
                .to_string(),
            remote_addr: req.remote_addr.clone(),
            object_size,
            is_admin_user_request: is_admin_user_path(&req.path),
            has_key_management_marker: KEY_MANAGEMENT_MARKERS
                .iter()
                .any(|marker| req.has_query_marker(marker)),
        }
    }
}

/// True for the admin "create user" endpoint (path-style only).
pub fn is_admin_user_path(path: &str) -> bool {
    path == "/admin/user" || path == "/admin/user/"
}

/// The side effect one proxied response calls for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Admin user creation: dispatch the export provisioner, detached
    ProvisionExport,
    /// Storage mutation: run the notification path with this event name
    Notify(EventName),
    /// Leave the response alone
    None,
}

/// The decision table, evaluated top-to-bottom; the first matching row
/// wins. Stateless per request.
pub fn classify(ctx: &ObjectOperationContext) -> Classification {
    if ctx.is_admin_user_request && ctx.status == 200 {
        return Classification::ProvisionExport;
    }
    if ctx.has_copy_source {
        return Classification::Notify(EventName::ObjectCreatedCopy);
    }
    if ctx.etag.is_some() && ctx.method == "PUT" && ctx.status == 200 {
        return Classification::Notify(EventName::ObjectCreatedPut);
    }
    if ctx.method == "DELETE" && ctx.status == 204 {
        return Classification::Notify(EventName::ObjectRemovedDelete);
    }
    Classification::None
}
