#![warn(missing_docs)]

//! Storgate proxy server (S3 notification routing + NFS export provisioning)

use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use storgate_proxy::auth::StaticAuthenticator;
use storgate_proxy::config::ProxyConfig;
use storgate_proxy::config_store::{MemoryConfigCache, NotificationConfigStore};
use storgate_proxy::event::EventBuilder;
use storgate_proxy::export::ExportProvisioner;
use storgate_proxy::notify::Notifier;
use storgate_proxy::proxy::{BucketNotificationApi, ResponseInterceptor};
use storgate_proxy::publish::{MemoryDeliveryStore, TargetQueuePublisher};
use storgate_proxy::store::{MemoryObjectStore, ObjectStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let config = ProxyConfig::from_env();
    tracing::info!(
        "storgate proxy starting (region {}, upstream {})",
        config.region,
        config.upstream_host
    );

    let cache = Arc::new(MemoryConfigCache::new());
    let delivery = Arc::new(MemoryDeliveryStore::new());
    let objects = Arc::new(MemoryObjectStore::new()) as Arc<dyn ObjectStore>;

    let notifier = Notifier::new(
        NotificationConfigStore::new(cache.clone()),
        EventBuilder::new(&config.region),
        TargetQueuePublisher::new(delivery),
    );
    let provisioner =
        ExportProvisioner::new(objects, &config.export_pool, &config.export_index);
    let _interceptor = ResponseInterceptor::new(Arc::new(notifier), Arc::new(provisioner));
    let _api = BucketNotificationApi::new(
        Arc::new(StaticAuthenticator::allow_all()),
        NotificationConfigStore::new(cache),
    );

    tracing::info!("storgate proxy components wired; transport attaches here");

    Ok(())
}
