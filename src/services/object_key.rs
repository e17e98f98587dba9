//! Object key derivation.
//!
//! Start, part signing, completion and abort all recompute the key from the
//! session's file name, so they must share one `ObjectKeys` instance.

use std::{fmt, sync::Arc};

/// `(uploader identity, file name) -> object key`
pub type KeyFn = Arc<dyn Fn(&str, &str) -> String + Send + Sync>;

#[derive(Clone)]
pub struct ObjectKeys {
    identity: String,
    derive: KeyFn,
}

impl ObjectKeys {
    pub fn new(identity: impl Into<String>, derive: KeyFn) -> Self {
        Self {
            identity: identity.into(),
            derive,
        }
    }

    /// Keys laid out as `{identity}/{file_name}`.
    pub fn per_uploader(identity: impl Into<String>) -> Self {
        Self::new(identity, Arc::new(uploader_prefixed))
    }

    pub fn key_for(&self, file_name: &str) -> String {
        (self.derive)(&self.identity, file_name)
    }
}

impl fmt::Debug for ObjectKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectKeys")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

pub fn uploader_prefixed(identity: &str, file_name: &str) -> String {
    format!("{}/{}", identity, file_name)
}
