//! The notification path: config lookup, rule match, build, publish

use tracing::{debug, error};

use crate::classify::ObjectOperationContext;
use crate::config_store::NotificationConfigStore;
use crate::error::Result;
use crate::event::{EventBuilder, EventName};
use crate::publish::TargetQueuePublisher;

/// Drives one storage-mutation notification end to end, synchronously:
/// look up the bucket's configuration, match rules, build the event and
/// publish it to every matched target.
pub struct Notifier {
    config_store: NotificationConfigStore,
    builder: EventBuilder,
    publisher: TargetQueuePublisher,
}

impl Notifier {
    /// Creates a notifier over the given store, builder and publisher.
    pub fn new(
        config_store: NotificationConfigStore,
        builder: EventBuilder,
        publisher: TargetQueuePublisher,
    ) -> Self {
        Self {
            config_store,
            builder,
            publisher,
        }
    }

    /// Runs the notification path for one classified response. Returns
    /// the number of targets published to. A bucket with no stored
    /// configuration publishes to zero targets and is not an error.
    /// Publish failures are logged per target and the first one is
    /// returned after all targets have been attempted.
    pub fn notify(&self, ctx: &ObjectOperationContext, event_name: EventName) -> Result<usize> {
        let config = match self.config_store.get(&ctx.bucket)? {
            Some(config) => config,
            None => {
                debug!("no notification configuration for bucket {}", ctx.bucket);
                return Ok(0);
            }
        };

        let targets = config.targets_for(event_name, &ctx.key);
        if targets.is_empty() {
            return Ok(0);
        }

        let event = self.builder.build(ctx, event_name);
        let mut published = 0;
        let mut first_failure = None;
        for target in &targets {
            match self.publisher.publish(target, &event) {
                Ok(()) => published += 1,
                Err(err) => {
                    error!(
                        "failed to publish {} for {}/{} to {}: {}",
                        event_name.as_str(),
                        ctx.bucket,
                        ctx.key,
                        target.queue_key(),
                        err
                    );
                    if first_failure.is_none() {
                        first_failure = Some(err);
                    }
                }
            }
        }

        match first_failure {
            Some(err) => Err(err),
            None => Ok(published),
        }
    }
}
