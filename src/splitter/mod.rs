mod request;

use std::rc::Rc;

use bytes::Bytes;
use hashbrown::HashMap;
use tracing::debug;

use crate::backend::pool::ConnPool;
use crate::metrics::{Counter, Scope};
use crate::protocol::redis::{all_commands, CommandKind, RespValue};
use crate::utils::lower_copy;

pub use request::SplitRequest;

/// Caller-supplied sink for the single reply of a logical request. Invoked
/// exactly once, on success, on aggregated error, or on the first validation
/// rejection.
pub trait SplitCallbacks {
    fn on_response(&self, response: RespValue);
}

struct HandlerEntry {
    total: Counter,
    kind: CommandKind,
}

struct SplitterStats {
    invalid_request: Counter,
    unsupported_command: Counter,
}

/// Front door of the command splitter. Validates the RESP envelope, resolves
/// the routing class of the command and hands the request to the matching
/// request variant.
pub struct Splitter {
    conn_pool: Rc<dyn ConnPool>,
    command_map: HashMap<Vec<u8>, HandlerEntry>,
    stats: SplitterStats,
}

impl Splitter {
    pub fn new(conn_pool: Rc<dyn ConnPool>, scope: &dyn Scope, stat_prefix: &str) -> Self {
        let mut command_map = HashMap::new();
        for (name, kind) in all_commands() {
            let lowered = lower_copy(name.as_bytes());
            let total = scope.counter(&format!(
                "{}command.{}.total",
                stat_prefix,
                String::from_utf8_lossy(&lowered)
            ));
            command_map.insert(lowered, HandlerEntry { total, kind });
        }

        let stats = SplitterStats {
            invalid_request: scope.counter(&format!("{}splitter.invalid_request", stat_prefix)),
            unsupported_command: scope
                .counter(&format!("{}splitter.unsupported_command", stat_prefix)),
        };

        Self {
            conn_pool,
            command_map,
            stats,
        }
    }

    /// Routes one client command. Returns the cancellable in-flight handle,
    /// or `None` when the reply was already delivered through `callbacks`
    /// (validation rejection, unsupported command, or a request that
    /// resolved during submission).
    pub fn make_request(
        &self,
        request: RespValue,
        callbacks: Rc<dyn SplitCallbacks>,
    ) -> Option<SplitRequest> {
        let args = match request {
            RespValue::Array(args) if args.len() >= 2 => args,
            _ => return self.on_invalid_request(&callbacks),
        };

        let mut parts = Vec::with_capacity(args.len());
        for arg in args {
            match arg {
                RespValue::BulkString(data) => parts.push(data),
                _ => return self.on_invalid_request(&callbacks),
            }
        }

        let lowered = lower_copy(&parts[0]);
        let entry = match self.command_map.get(&lowered) {
            Some(entry) => entry,
            None => {
                self.stats.unsupported_command.inc();
                callbacks.on_response(RespValue::error(format!(
                    "unsupported command '{}'",
                    String::from_utf8_lossy(&parts[0])
                )));
                return None;
            }
        };

        debug!(command = %render_frame(&parts), "splitting request");
        entry.total.inc();
        match entry.kind {
            CommandKind::Simple => request::start_single(&self.conn_pool, parts, callbacks),
            CommandKind::Eval => request::start_eval(&self.conn_pool, parts, callbacks),
            CommandKind::MultiGet => request::start_mget(&self.conn_pool, parts, callbacks),
            CommandKind::MultiSet => request::start_mset(&self.conn_pool, parts, callbacks),
            CommandKind::SumResult => request::start_sum(&self.conn_pool, parts, callbacks),
        }
    }

    fn on_invalid_request(&self, callbacks: &Rc<dyn SplitCallbacks>) -> Option<SplitRequest> {
        self.stats.invalid_request.inc();
        callbacks.on_response(RespValue::error("invalid request"));
        None
    }
}

fn render_frame(parts: &[Bytes]) -> RespValue {
    RespValue::array(parts.iter().cloned().map(RespValue::BulkString).collect())
}
