//! Response interception hook and the bucket-notification API surface

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::auth::Authenticator;
use crate::classify::{classify, Classification, ObjectOperationContext};
use crate::config_store::NotificationConfigStore;
use crate::error::ApiErrorCode;
use crate::export::ExportProvisioner;
use crate::http::{HttpRequest, HttpResponse};
use crate::notify::Notifier;
use crate::rules::BucketNotificationConfig;

/// Result of intercepting one proxied response. The response is always
/// forwarded to the client intact; `export_task`, when present, is the
/// detached provisioning task (dropping the handle detaches it).
pub struct Intercepted {
    /// The response to forward to the client
    pub response: HttpResponse,
    /// Detached export-provisioning task, if one was dispatched
    pub export_task: Option<JoinHandle<()>>,
}

/// Runs once per proxied response, after the upstream body has been
/// fully buffered and before it is forwarded to the client.
pub struct ResponseInterceptor {
    notifier: Arc<Notifier>,
    provisioner: Arc<ExportProvisioner>,
}

impl ResponseInterceptor {
    /// Creates an interceptor over the given notifier and provisioner.
    pub fn new(notifier: Arc<Notifier>, provisioner: Arc<ExportProvisioner>) -> Self {
        Self {
            notifier,
            provisioner,
        }
    }

    /// Classifies the exchange and drives the matching side effect.
    ///
    /// The notification path runs synchronously here; its failures are
    /// logged and never alter the client response. Export provisioning
    /// is dispatched on a detached blocking task with its own error sink.
    pub fn intercept(&self, req: &HttpRequest, resp: HttpResponse) -> Intercepted {
        let ctx = ObjectOperationContext::from_exchange(req, &resp);

        match classify(&ctx) {
            Classification::ProvisionExport => {
                let provisioner = Arc::clone(&self.provisioner);
                let body = resp.body.clone();
                let task = tokio::task::spawn_blocking(move || {
                    match provisioner.handle_user_response(&ctx, &body) {
                        Ok(outcome) => debug!("export provisioning finished: {:?}", outcome),
                        Err(err) => error!("export provisioning failed: {}", err),
                    }
                });
                Intercepted {
                    response: resp,
                    export_task: Some(task),
                }
            }
            Classification::Notify(event_name) => {
                if let Err(err) = self.notifier.notify(&ctx, event_name) {
                    error!(
                        "notification path failed for {}/{}: {}",
                        ctx.bucket, ctx.key, err
                    );
                }
                Intercepted {
                    response: resp,
                    export_task: None,
                }
            }
            Classification::None => Intercepted {
                response: resp,
                export_task: None,
            },
        }
    }
}

/// What the routing layer should do with a client request.
#[derive(Debug)]
pub enum RouteAction {
    /// Answer the client directly with this response
    Respond(HttpResponse),
    /// Forward the request to the upstream gateway untouched
    Forward,
}

fn error_response(code: ApiErrorCode) -> HttpResponse {
    let body = serde_json::json!({ "Code": code.code() });
    HttpResponse::new(code.http_status()).with_body(body.to_string().into_bytes())
}

/// GET/PUT handlers for the bucket `notification` resource, consumed by
/// clients of this proxy. Requests without the `notification` query
/// marker pass through to the upstream.
pub struct BucketNotificationApi {
    authenticator: Arc<dyn Authenticator>,
    config_store: NotificationConfigStore,
}

impl BucketNotificationApi {
    /// Creates the API surface over the given authenticator and store.
    pub fn new(
        authenticator: Arc<dyn Authenticator>,
        config_store: NotificationConfigStore,
    ) -> Self {
        Self {
            authenticator,
            config_store,
        }
    }

    /// GET on a bucket with the `notification` marker returns the stored
    /// subscription document; an unconfigured bucket returns an empty
    /// document, not an error.
    pub fn get_bucket_notification(&self, req: &HttpRequest) -> RouteAction {
        let (_, code) = self.authenticator.authenticate(req);
        if code != ApiErrorCode::None {
            return RouteAction::Respond(error_response(code));
        }

        if !req.has_query_marker("notification") {
            return RouteAction::Forward;
        }

        let (bucket, _) = req.parse_path();
        let config = match self.config_store.get(&bucket) {
            Ok(Some(config)) => config,
            Ok(None) => BucketNotificationConfig::empty(),
            Err(err) => {
                warn!("notification config read failed for {}: {}", bucket, err);
                return RouteAction::Respond(error_response(err.api_error_code()));
            }
        };

        match serde_json::to_vec(&config) {
            Ok(body) => RouteAction::Respond(HttpResponse::new(200).with_body(body)),
            Err(err) => {
                error!("notification config serialization failed: {}", err);
                RouteAction::Respond(error_response(ApiErrorCode::InternalError))
            }
        }
    }

    /// PUT on a bucket with the `notification` marker parses, validates
    /// and stores the subscription document, overwriting any prior one.
    pub fn put_bucket_notification(&self, req: &HttpRequest) -> RouteAction {
        let (_, code) = self.authenticator.authenticate(req);
        if code != ApiErrorCode::None {
            return RouteAction::Respond(error_response(code));
        }

        if !req.has_query_marker("notification") {
            return RouteAction::Forward;
        }

        let (bucket, _) = req.parse_path();
        let config: BucketNotificationConfig = match serde_json::from_slice(&req.body) {
            Ok(config) => config,
            Err(err) => {
                debug!("rejecting notification document for {}: {}", bucket, err);
                return RouteAction::Respond(error_response(
                    ApiErrorCode::MalformedNotificationDocument,
                ));
            }
        };
        if let Err(err) = config.validate() {
            debug!("rejecting notification document for {}: {}", bucket, err);
            return RouteAction::Respond(error_response(err.api_error_code()));
        }

        match self.config_store.put(&bucket, &config) {
            Ok(()) => RouteAction::Respond(HttpResponse::new(200)),
            Err(err) => {
                error!("notification config write failed for {}: {}", bucket, err);
                RouteAction::Respond(error_response(err.api_error_code()))
            }
        }
    }
}
