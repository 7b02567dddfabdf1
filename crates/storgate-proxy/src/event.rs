//! Event model and message builder for S3-style notifications

use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer, Visitor};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

use crate::classify::ObjectOperationContext;

/// Event schema version stamped into every event.
pub const EVENT_VERSION: &str = "2.0";
/// Source designation stamped into every event.
pub const EVENT_SOURCE: &str = "aws:s3";
/// Schema version of the `s3` sub-record.
pub const S3_SCHEMA_VERSION: &str = "1.0";

/// S3 event-type names, including the wildcard categories a subscription
/// may use. Wildcard subsumption is an explicit table (`expand`), not
/// string matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    /// Object created by a PUT
    ObjectCreatedPut,
    /// Object created by a POST (browser upload)
    ObjectCreatedPost,
    /// Object created by a server-side copy
    ObjectCreatedCopy,
    /// Object created by completing a multipart upload
    ObjectCreatedCompleteMultipartUpload,
    /// Any create event (wildcard category)
    ObjectCreatedAll,
    /// Object removed by a DELETE
    ObjectRemovedDelete,
    /// Delete marker created on a versioned object
    ObjectRemovedDeleteMarkerCreated,
    /// Any remove event (wildcard category)
    ObjectRemovedAll,
}

impl EventName {
    /// Returns the S3 wire name (e.g. "s3:ObjectCreated:Put").
    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::ObjectCreatedPut => "s3:ObjectCreated:Put",
            EventName::ObjectCreatedPost => "s3:ObjectCreated:Post",
            EventName::ObjectCreatedCopy => "s3:ObjectCreated:Copy",
            EventName::ObjectCreatedCompleteMultipartUpload => {
                "s3:ObjectCreated:CompleteMultipartUpload"
            }
            EventName::ObjectCreatedAll => "s3:ObjectCreated:*",
            EventName::ObjectRemovedDelete => "s3:ObjectRemoved:Delete",
            EventName::ObjectRemovedDeleteMarkerCreated => "s3:ObjectRemoved:DeleteMarkerCreated",
            EventName::ObjectRemovedAll => "s3:ObjectRemoved:*",
        }
    }

    /// Parses an S3 wire name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "s3:ObjectCreated:Put" => Some(EventName::ObjectCreatedPut),
            "s3:ObjectCreated:Post" => Some(EventName::ObjectCreatedPost),
            "s3:ObjectCreated:Copy" => Some(EventName::ObjectCreatedCopy),
            "s3:ObjectCreated:CompleteMultipartUpload" => {
                Some(EventName::ObjectCreatedCompleteMultipartUpload)
            }
            "s3:ObjectCreated:*" => Some(EventName::ObjectCreatedAll),
            "s3:ObjectRemoved:Delete" => Some(EventName::ObjectRemovedDelete),
            "s3:ObjectRemoved:DeleteMarkerCreated" => {
                Some(EventName::ObjectRemovedDeleteMarkerCreated)
            }
            "s3:ObjectRemoved:*" => Some(EventName::ObjectRemovedAll),
            _ => None,
        }
    }

    /// True for the wildcard categories.
    pub fn is_wildcard(&self) -> bool {
        matches!(self, EventName::ObjectCreatedAll | EventName::ObjectRemovedAll)
    }

    /// The concrete event names a subscription to this name covers.
    /// A concrete name covers only itself.
    pub fn expand(&self) -> &'static [EventName] {
        match self {
            EventName::ObjectCreatedAll => &[
                EventName::ObjectCreatedPut,
                EventName::ObjectCreatedPost,
                EventName::ObjectCreatedCopy,
                EventName::ObjectCreatedCompleteMultipartUpload,
            ],
            EventName::ObjectRemovedAll => &[
                EventName::ObjectRemovedDelete,
                EventName::ObjectRemovedDeleteMarkerCreated,
            ],
            EventName::ObjectCreatedPut => &[EventName::ObjectCreatedPut],
            EventName::ObjectCreatedPost => &[EventName::ObjectCreatedPost],
            EventName::ObjectCreatedCopy => &[EventName::ObjectCreatedCopy],
            EventName::ObjectCreatedCompleteMultipartUpload => {
                &[EventName::ObjectCreatedCompleteMultipartUpload]
            }
            EventName::ObjectRemovedDelete => &[EventName::ObjectRemovedDelete],
            EventName::ObjectRemovedDeleteMarkerCreated => {
                &[EventName::ObjectRemovedDeleteMarkerCreated]
            }
        }
    }

    /// True if a subscription to `self` covers the concrete event `other`.
    pub fn subsumes(&self, other: EventName) -> bool {
        self.expand().contains(&other)
    }
}

impl Serialize for EventName {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct NameVisitor;

        impl<'de> Visitor<'de> for NameVisitor {
            type Value = EventName;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("an S3 event name such as \"s3:ObjectCreated:Put\"")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<EventName, E> {
                EventName::parse(v)
                    .ok_or_else(|| E::custom(format!("unknown event name: {}", v)))
            }
        }

        deserializer.deserialize_str(NameVisitor)
    }
}

/// Requester or owner identity embedded in an event.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Identity {
    /// Principal id; may be empty
    #[serde(rename = "principalId")]
    pub principal_id: String,
}

/// Bucket sub-record of an event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BucketRecord {
    /// Bucket name
    pub name: String,
    /// Bucket owner identity
    #[serde(rename = "ownerIdentity")]
    pub owner_identity: Identity,
    /// Bucket ARN; may be empty
    pub arn: String,
}

/// Object sub-record of an event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ObjectRecord {
    /// Object key
    pub key: String,
    /// Object size in bytes
    pub size: u64,
    /// ETag from the response, or empty if absent
    #[serde(rename = "eTag")]
    pub etag: String,
    /// Uppercase-hex nanosecond timestamp for best-effort same-key
    /// ordering by consumers. Not unique across concurrent producers.
    pub sequencer: String,
}

/// `s3` sub-record of an event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct S3Record {
    /// Schema version of this sub-record
    #[serde(rename = "s3SchemaVersion")]
    pub schema_version: String,
    /// Subscription configuration id
    #[serde(rename = "configurationId")]
    pub configuration_id: String,
    /// Bucket the event happened in
    pub bucket: BucketRecord,
    /// Object the event is about
    pub object: ObjectRecord,
}

/// An immutable record describing one storage mutation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Event {
    /// Event schema version
    #[serde(rename = "eventVersion")]
    pub event_version: String,
    /// Source designation ("aws:s3")
    #[serde(rename = "eventSource")]
    pub event_source: String,
    /// Region the event originated in
    #[serde(rename = "awsRegion")]
    pub aws_region: String,
    /// UTC event time, ISO-8601, second precision
    #[serde(rename = "eventTime")]
    pub event_time: String,
    /// Concrete event-type name
    #[serde(rename = "eventName")]
    pub event_name: EventName,
    /// Requester identity
    #[serde(rename = "userIdentity")]
    pub user_identity: Identity,
    /// Request parameters (source IP)
    #[serde(rename = "requestParameters")]
    pub request_parameters: RequestParameters,
    /// Response elements (echoed request id)
    #[serde(rename = "responseElements")]
    pub response_elements: ResponseElements,
    /// Storage sub-record
    pub s3: S3Record,
}

/// Request parameters carried in an event.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct RequestParameters {
    /// Source IP address of the original request
    #[serde(rename = "sourceIPAddress")]
    pub source_ip_address: String,
}

/// Response elements carried in an event.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ResponseElements {
    /// Request id echoed from the upstream response
    #[serde(rename = "x-amz-request-id")]
    pub request_id: String,
}

/// Builds canonical events from response metadata.
pub struct EventBuilder {
    region: String,
}

impl EventBuilder {
    /// Creates a builder stamping events with the given region.
    pub fn new(region: &str) -> Self {
        Self {
            region: region.to_string(),
        }
    }

    /// Builds an event for the given operation context. Pure given its
    /// inputs except for the wall-clock read.
    pub fn build(&self, ctx: &ObjectOperationContext, event_name: EventName) -> Event {
        self.build_at(ctx, event_name, Utc::now())
    }

    /// Builds an event at a fixed instant. Used by `build` and by tests
    /// that need a deterministic timestamp.
    pub fn build_at(
        &self,
        ctx: &ObjectOperationContext,
        event_name: EventName,
        at: DateTime<Utc>,
    ) -> Event {
        let nanos = at.timestamp_nanos_opt().unwrap_or(0);
        Event {
            event_version: EVENT_VERSION.to_string(),
            event_source: EVENT_SOURCE.to_string(),
            aws_region: self.region.clone(),
            event_time: at.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            event_name,
            user_identity: Identity::default(),
            request_parameters: RequestParameters {
                source_ip_address: ctx.remote_addr.clone(),
            },
            response_elements: ResponseElements {
                request_id: ctx.request_id.clone(),
            },
            s3: S3Record {
                schema_version: S3_SCHEMA_VERSION.to_string(),
                configuration_id: "Config".to_string(),
                bucket: BucketRecord {
                    name: ctx.bucket.clone(),
                    owner_identity: Identity::default(),
                    arn: String::new(),
                },
                object: ObjectRecord {
                    key: ctx.key.clone(),
                    size: ctx.object_size,
                    etag: ctx.etag.clone().unwrap_or_default(),
                    sequencer: format!("{:X}", nanos),
                },
            },
        }
    }
}
