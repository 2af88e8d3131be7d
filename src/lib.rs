pub mod backend;
pub mod metrics;
pub mod protocol;
pub mod splitter;
pub(crate) mod utils;

pub use backend::pool::{BackendHost, ConnPool, PoolCallbacks, PoolHandle};
pub use metrics::{Counter, MemoryScope, Scope};
pub use protocol::redis::{CommandKind, RespValue};
pub use splitter::{SplitCallbacks, SplitRequest, Splitter};
