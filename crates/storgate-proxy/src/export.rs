//! Automatic NFS export provisioning on storage-user creation

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::classify::ObjectOperationContext;
use crate::config::{EXPORT_APPEND_COOKIE, EXPORT_APPEND_DESC, EXPORT_APPEND_LOCK};
use crate::error::{ProxyError, Result};
use crate::store::ObjectStore;

/// One credential key-pair in an admin user record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserKey {
    /// S3 access key
    pub access_key: String,
    /// S3 secret key
    pub secret_key: String,
}

/// The admin response body for user operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// Account id of the user
    pub user_id: String,
    /// Credential key-pairs currently attached to the account
    #[serde(default)]
    pub keys: Vec<UserKey>,
}

impl UserRecord {
    /// Parses a buffered admin response body.
    pub fn parse(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).map_err(|err| ProxyError::MalformedUserRecord {
            reason: err.to_string(),
        })
    }
}

/// What a provisioning call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// A new export definition was written and indexed
    Provisioned {
        /// Storage key of the export object
        export_obj: String,
        /// Generated export id
        export_id: u16,
    },
    /// The response was not an initial user creation; nothing was done
    Skipped,
}

/// The name of the export object for a user.
pub fn export_object_name(user_id: &str) -> String {
    format!("export_{}", user_id)
}

// Lock owners in rados are (client, cookie); the shared cookie alone does
// not identify a holder. Each append acquires as a distinct owner, the
// way the original holds the lock from a fresh per-export connection.
static NEXT_LOCK_OWNER: AtomicU64 = AtomicU64::new(0);

fn next_lock_owner() -> String {
    format!(
        "{}:{}",
        EXPORT_APPEND_COOKIE,
        NEXT_LOCK_OWNER.fetch_add(1, Ordering::Relaxed)
    )
}

/// Renders an NFS-Ganesha export block for one storage user. The
/// network path `/` is mapped to a pseudo path derived from the account
/// id, protocol fixed to NFSv4 over TCP, RGW FSAL with the user's
/// credentials embedded.
pub fn render_export(export_id: u16, user_id: &str, access_key: &str, secret_key: &str) -> String {
    format!(
        r#"Export {{
	Export_ID = {export_id};
	Path = "/";
	Pseudo = "/{user_id}";
	Access_Type = RW;
	Protocols = 4;
	Transports = TCP;
	FSAL {{
		Name = RGW;
		User_Id = "{user_id}";
		Access_Key_Id = "{access_key}";
		Secret_Access_Key = "{secret_key}";
	}}
}}
"#
    )
}

/// Idempotently provisions filesystem exports for newly created storage
/// users. Runs detached from the request path; its failures are logged
/// by the caller's sink and never reach the client.
pub struct ExportProvisioner {
    store: Arc<dyn ObjectStore>,
    pool: String,
    index: String,
}

impl ExportProvisioner {
    /// Creates a provisioner writing into `pool` and indexing exports in
    /// the shared `index` object.
    pub fn new(store: Arc<dyn ObjectStore>, pool: &str, index: &str) -> Self {
        Self {
            store,
            pool: pool.to_string(),
            index: index.to_string(),
        }
    }

    /// Entry point for an intercepted admin user response. Key, subuser,
    /// quota and caps management calls and non-PUT methods are not user
    /// creation and are skipped.
    pub fn handle_user_response(
        &self,
        ctx: &ObjectOperationContext,
        body: &[u8],
    ) -> Result<ProvisionOutcome> {
        if ctx.has_key_management_marker || ctx.method != "PUT" {
            return Ok(ProvisionOutcome::Skipped);
        }
        self.provision(body)
    }

    /// Provisions one export from a buffered user record.
    ///
    /// A record with other than exactly one credential key-pair is a
    /// key-rotation or secondary-key response, not an initial creation,
    /// and is skipped silently. The export id is drawn uniformly from
    /// [1, 65535) with no collision check against existing exports; a
    /// clash overwrites nothing but leaves two exports sharing an id.
    pub fn provision(&self, body: &[u8]) -> Result<ProvisionOutcome> {
        let record = UserRecord::parse(body)?;
        if record.keys.len() != 1 {
            debug!(
                "skipping export for user {}: {} credential keys",
                record.user_id,
                record.keys.len()
            );
            return Ok(ProvisionOutcome::Skipped);
        }

        let key = &record.keys[0];
        let export_id: u16 = rand::thread_rng().gen_range(1..65535);
        let export_obj = export_object_name(&record.user_id);
        let definition = render_export(export_id, &record.user_id, &key.access_key, &key.secret_key);

        self.store.write_full(&export_obj, definition.as_bytes())?;
        self.append_to_index(&export_obj)?;

        info!(
            "provisioned NFS export {} (id {}) for user {}",
            export_obj, export_id, record.user_id
        );
        Ok(ProvisionOutcome::Provisioned {
            export_obj,
            export_id,
        })
    }

    /// Appends the export's storage URL to the shared index under the
    /// process-wide exclusive lock name, acquiring as a distinct owner
    /// per call, so at most one append proceeds at a time across the
    /// whole system and every other exporter blocks until it completes.
    fn append_to_index(&self, export_obj: &str) -> Result<()> {
        let line = format!("%url \"rados://{}/{}\"\n", self.pool, export_obj);
        let owner = next_lock_owner();
        self.store
            .lock_exclusive(&self.index, EXPORT_APPEND_LOCK, &owner, EXPORT_APPEND_DESC)?;
        let appended = self.store.append(&self.index, line.as_bytes());
        self.store.unlock(&self.index, EXPORT_APPEND_LOCK, &owner)?;
        appended
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryObjectStore;

    fn provisioner() -> (Arc<MemoryObjectStore>, ExportProvisioner) {
        let store = Arc::new(MemoryObjectStore::new());
        let provisioner =
            ExportProvisioner::new(store.clone() as Arc<dyn ObjectStore>, "nfs-ganesha", "export");
        (store, provisioner)
    }

    fn one_key_body(user: &str) -> Vec<u8> {
        format!(
            r#"{{"user_id":"{}","keys":[{{"access_key":"AK","secret_key":"SK"}}]}}"#,
            user
        )
        .into_bytes()
    }

    #[test]
    fn test_single_key_record_writes_export_and_index() {
        let (store, provisioner) = provisioner();
        let outcome = provisioner.provision(&one_key_body("u1")).unwrap();

        assert!(matches!(outcome, ProvisionOutcome::Provisioned { .. }));
        let export = store.read("export_u1").unwrap().unwrap();
        let export = String::from_utf8(export).unwrap();
        assert!(export.contains("Pseudo = \"/u1\";"));
        assert!(export.contains("Access_Key_Id = \"AK\";"));
        assert!(export.contains("Secret_Access_Key = \"SK\";"));

        let index = store.read("export").unwrap().unwrap();
        assert_eq!(
            String::from_utf8(index).unwrap(),
            "%url \"rados://nfs-ganesha/export_u1\"\n"
        );
    }

    #[test]
    fn test_zero_keys_is_a_noop() {
        let (store, provisioner) = provisioner();
        let outcome = provisioner
            .provision(br#"{"user_id":"u1","keys":[]}"#)
            .unwrap();
        assert_eq!(outcome, ProvisionOutcome::Skipped);
        assert!(store.read("export_u1").unwrap().is_none());
        assert!(store.read("export").unwrap().is_none());
    }

    #[test]
    fn test_two_keys_is_a_noop() {
        let (store, provisioner) = provisioner();
        let body = br#"{"user_id":"u1","keys":[
            {"access_key":"AK1","secret_key":"SK1"},
            {"access_key":"AK2","secret_key":"SK2"}]}"#;
        let outcome = provisioner.provision(body).unwrap();
        assert_eq!(outcome, ProvisionOutcome::Skipped);
        assert!(store.read("export_u1").unwrap().is_none());
    }

    #[test]
    fn test_malformed_body_is_an_error() {
        let (_, provisioner) = provisioner();
        let err = provisioner.provision(b"not json").unwrap_err();
        assert!(matches!(err, ProxyError::MalformedUserRecord { .. }));
    }

    #[test]
    fn test_export_id_is_in_range() {
        for _ in 0..32 {
            let (_, provisioner) = provisioner();
            match provisioner.provision(&one_key_body("u1")).unwrap() {
                ProvisionOutcome::Provisioned { export_id, .. } => {
                    assert!((1..65535).contains(&(export_id as u32)));
                }
                ProvisionOutcome::Skipped => panic!("expected a provisioned export"),
            }
        }
    }

    #[test]
    fn test_reprovision_overwrites_export_but_appends_index_again() {
        let (store, provisioner) = provisioner();
        provisioner.provision(&one_key_body("u1")).unwrap();
        provisioner.provision(&one_key_body("u1")).unwrap();

        let index = String::from_utf8(store.read("export").unwrap().unwrap()).unwrap();
        assert_eq!(index.lines().count(), 2);
    }

    #[test]
    fn test_key_management_marker_skips_provisioning() {
        use crate::http::{HttpRequest, HttpResponse};

        let (store, provisioner) = provisioner();
        let req = HttpRequest::new("PUT", "/admin/user").with_query("key", "");
        let resp = HttpResponse::new(200);
        let ctx = ObjectOperationContext::from_exchange(&req, &resp);

        let outcome = provisioner
            .handle_user_response(&ctx, &one_key_body("u1"))
            .unwrap();
        assert_eq!(outcome, ProvisionOutcome::Skipped);
        assert!(store.read("export_u1").unwrap().is_none());
    }

    #[test]
    fn test_non_put_method_skips_provisioning() {
        use crate::http::{HttpRequest, HttpResponse};

        let (_, provisioner) = provisioner();
        let req = HttpRequest::new("POST", "/admin/user");
        let resp = HttpResponse::new(200);
        let ctx = ObjectOperationContext::from_exchange(&req, &resp);

        let outcome = provisioner
            .handle_user_response(&ctx, &one_key_body("u1"))
            .unwrap();
        assert_eq!(outcome, ProvisionOutcome::Skipped);
    }

    #[test]
    fn test_provision_blocks_while_index_lock_is_held_elsewhere() {
        let store = Arc::new(MemoryObjectStore::new());
        store
            .lock_exclusive("export", EXPORT_APPEND_LOCK, "other-holder", EXPORT_APPEND_DESC)
            .unwrap();

        let worker = {
            let store = store.clone();
            std::thread::spawn(move || {
                let provisioner = ExportProvisioner::new(
                    store as Arc<dyn ObjectStore>,
                    "nfs-ganesha",
                    "export",
                );
                provisioner.provision(&one_key_body("u2")).unwrap();
            })
        };

        // nothing may land in the index while another owner holds the lock
        std::thread::sleep(std::time::Duration::from_millis(50));
        assert!(store.read("export").unwrap().is_none());

        store
            .unlock("export", EXPORT_APPEND_LOCK, "other-holder")
            .unwrap();
        worker.join().unwrap();
        assert_eq!(
            String::from_utf8(store.read("export").unwrap().unwrap()).unwrap(),
            "%url \"rados://nfs-ganesha/export_u2\"\n"
        );
    }

    #[test]
    fn test_each_append_acquires_as_a_distinct_owner() {
        let first = next_lock_owner();
        let second = next_lock_owner();
        assert_ne!(first, second);
        assert!(first.starts_with(EXPORT_APPEND_COOKIE));
        assert!(second.starts_with(EXPORT_APPEND_COOKIE));
    }

    #[test]
    fn test_concurrent_provisioning_serializes_index_appends() {
        let store = Arc::new(MemoryObjectStore::new());
        let n = 16;

        let handles: Vec<_> = (0..n)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    let provisioner = ExportProvisioner::new(
                        store as Arc<dyn ObjectStore>,
                        "nfs-ganesha",
                        "export",
                    );
                    provisioner
                        .provision(&one_key_body(&format!("u{}", i)))
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let index = String::from_utf8(store.read("export").unwrap().unwrap()).unwrap();
        let lines: Vec<&str> = index.lines().collect();
        assert_eq!(lines.len(), n);
        for line in lines {
            assert!(line.starts_with("%url \"rados://nfs-ganesha/export_u"));
            assert!(line.ends_with('"'));
        }
    }

    #[test]
    fn test_render_export_contains_all_fields() {
        let text = render_export(42, "u9", "AKX", "SKY");
        assert!(text.contains("Export_ID = 42;"));
        assert!(text.contains("Path = \"/\";"));
        assert!(text.contains("Pseudo = \"/u9\";"));
        assert!(text.contains("Protocols = 4;"));
        assert!(text.contains("Name = RGW;"));
        assert!(text.contains("User_Id = \"u9\";"));
    }
}
