//! OAuth token records, their storage and the manager that refreshes them.

mod manager;
mod storage;
mod tokens;

pub use manager::{Manager, MAX_AUTH_RETRIES};
pub use storage::{MemoryStorage, Storage};
pub use tokens::{AuthStatus, TokenGrant, TokenRecord};
