use std::time::Duration;

/// Maximum time to wait when acquiring the store's read or write lock.
pub const LOCK_TIMEOUT: Duration = Duration::from_secs(1);

/// Request body limit. Bulk imports of large documents exceed axum's 2MB default.
pub const MAX_BODY_SIZE: usize = 64 * 1024 * 1024;

/// Database that always exists and cannot be dropped.
pub const SYSTEM_DATABASE: &str = "_system";

pub const MAX_KEY_LENGTH: usize = 254;

/// Cursor batch size when the request does not name one.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Value reported in the `server` field of the version endpoint.
pub const SERVER_NAME: &str = "docbench";
