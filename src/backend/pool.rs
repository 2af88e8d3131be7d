use std::rc::Rc;
use std::sync::Arc;

use crate::protocol::redis::RespValue;

/// Upstream host identity (host:port string) as reported by the pool's
/// hashing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BackendHost(pub Arc<str>);

impl BackendHost {
    pub fn new(addr: String) -> Self {
        Self(addr.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Terminal callbacks for one in-flight upstream request. Exactly one of the
/// two fires, and never from inside `ConnPool::make_request`.
pub trait PoolCallbacks {
    fn on_response(&self, response: RespValue);
    fn on_failure(&self);
}

/// Cancellable in-flight upstream request. Cancelling consumes the handle, so
/// a request is cancelled at most once; after cancellation neither callback
/// fires.
pub trait PoolHandle {
    fn cancel(self: Box<Self>);
}

/// The upstream connection pool as seen by the splitter. The pool owns hosts,
/// sockets and encoding; the splitter only routes through it.
pub trait ConnPool {
    /// Host that owns `key` under the pool's hashing. Must be a pure function
    /// of the key for the lifetime of the pool.
    fn get_host(&self, key: &[u8]) -> BackendHost;

    /// Issues `request` to the host owning `key`. Returns `None` when no
    /// upstream is available; otherwise the handle stays live until exactly
    /// one callback fires or the handle is cancelled.
    fn make_request(
        &self,
        key: &[u8],
        request: RespValue,
        callbacks: Rc<dyn PoolCallbacks>,
    ) -> Option<Box<dyn PoolHandle>>;
}
