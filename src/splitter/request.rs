use std::cell::RefCell;
use std::rc::{Rc, Weak};

use bytes::Bytes;
use hashbrown::HashMap;
use tracing::debug;

use crate::backend::pool::{BackendHost, ConnPool, PoolCallbacks, PoolHandle};
use crate::protocol::redis::RespValue;

use super::SplitCallbacks;

const KEY_RAW_POS: usize = 1;
const KEY_EVAL_POS: usize = 3;

/// Handle for one in-flight logical client request. Dropping the handle
/// before the reply was delivered cancels every outstanding upstream
/// fragment; after delivery the drop is a no-op.
#[must_use = "dropping the handle cancels the request"]
pub struct SplitRequest {
    inner: RequestState,
}

enum RequestState {
    Single(Rc<RefCell<SingleServerRequest>>),
    Fragmented(Rc<RefCell<FragmentedRequest>>),
}

impl SplitRequest {
    /// Cancels every outstanding upstream fragment. Consuming the handle
    /// makes a second cancel, or a cancel after completion, unrepresentable.
    pub fn cancel(self) {}
}

impl Drop for SplitRequest {
    fn drop(&mut self) {
        match &self.inner {
            RequestState::Single(state) => {
                if let Some(handle) = state.borrow_mut().handle.take() {
                    handle.cancel();
                }
            }
            RequestState::Fragmented(state) => {
                for slot in state.borrow_mut().handles.iter_mut() {
                    if let Some(handle) = slot.take() {
                        handle.cancel();
                    }
                }
            }
        }
    }
}

fn to_resp(parts: &[Bytes]) -> RespValue {
    RespValue::array(parts.iter().cloned().map(RespValue::BulkString).collect())
}

fn on_wrong_number_of_arguments(callbacks: &Rc<dyn SplitCallbacks>, name: &[u8]) {
    callbacks.on_response(RespValue::error(format!(
        "wrong number of arguments for '{}' command",
        String::from_utf8_lossy(name)
    )));
}

pub(crate) fn start_single(
    conn_pool: &Rc<dyn ConnPool>,
    parts: Vec<Bytes>,
    callbacks: Rc<dyn SplitCallbacks>,
) -> Option<SplitRequest> {
    SingleServerRequest::start(conn_pool, parts, KEY_RAW_POS, callbacks)
}

pub(crate) fn start_eval(
    conn_pool: &Rc<dyn ConnPool>,
    parts: Vec<Bytes>,
    callbacks: Rc<dyn SplitCallbacks>,
) -> Option<SplitRequest> {
    // EVAL looks like: EVAL script numkeys key [key ...] arg [arg ...].
    // Anything shorter cannot be hashed. numkeys itself is not validated;
    // cross-shard invocations are the client's responsibility.
    if parts.len() <= KEY_EVAL_POS {
        on_wrong_number_of_arguments(&callbacks, &parts[0]);
        return None;
    }
    SingleServerRequest::start(conn_pool, parts, KEY_EVAL_POS, callbacks)
}

pub(crate) fn start_mget(
    conn_pool: &Rc<dyn ConnPool>,
    parts: Vec<Bytes>,
    callbacks: Rc<dyn SplitCallbacks>,
) -> Option<SplitRequest> {
    let key_count = parts.len() - 1;
    let mut groups: HashMap<BackendHost, KeyGroup> = HashMap::new();
    for (position, key) in parts.into_iter().skip(1).enumerate() {
        let host = conn_pool.get_host(&key);
        let group = groups.entry(host).or_default();
        group.keys.push(key);
        group.response_indexes.push(position);
    }

    let plans = groups
        .into_iter()
        .map(|(_host, group)| {
            let mut fragment = Vec::with_capacity(group.keys.len() + 1);
            fragment.push(Bytes::from_static(b"MGET"));
            fragment.extend(group.keys);
            FragmentPlan {
                parts: fragment,
                response_indexes: group.response_indexes,
            }
        })
        .collect();

    FragmentedRequest::submit(
        conn_pool,
        callbacks,
        Reducer::MultiGet {
            slots: vec![RespValue::NullBulk; key_count],
        },
        plans,
    )
}

pub(crate) fn start_mset(
    conn_pool: &Rc<dyn ConnPool>,
    parts: Vec<Bytes>,
    callbacks: Rc<dyn SplitCallbacks>,
) -> Option<SplitRequest> {
    if (parts.len() - 1) % 2 != 0 {
        on_wrong_number_of_arguments(&callbacks, &parts[0]);
        return None;
    }

    let mut groups: HashMap<BackendHost, KeyGroup> = HashMap::new();
    for pair_start in (1..parts.len()).step_by(2) {
        let key = parts[pair_start].clone();
        let value = parts[pair_start + 1].clone();
        let host = conn_pool.get_host(&key);
        let group = groups.entry(host).or_default();
        group.keys.push(key);
        group.keys.push(value);
        group.response_indexes.push(pair_start - 1);
    }

    let plans = groups
        .into_iter()
        .map(|(_host, group)| {
            let mut fragment = Vec::with_capacity(group.keys.len() + 1);
            fragment.push(Bytes::from_static(b"MSET"));
            fragment.extend(group.keys);
            FragmentPlan {
                parts: fragment,
                response_indexes: group.response_indexes,
            }
        })
        .collect();

    FragmentedRequest::submit(conn_pool, callbacks, Reducer::MultiSet, plans)
}

pub(crate) fn start_sum(
    conn_pool: &Rc<dyn ConnPool>,
    parts: Vec<Bytes>,
    callbacks: Rc<dyn SplitCallbacks>,
) -> Option<SplitRequest> {
    let name = parts[0].clone();

    let mut groups: HashMap<BackendHost, KeyGroup> = HashMap::new();
    for (position, key) in parts.into_iter().skip(1).enumerate() {
        let host = conn_pool.get_host(&key);
        let group = groups.entry(host).or_default();
        group.keys.push(key);
        group.response_indexes.push(position);
    }

    let plans = groups
        .into_iter()
        .map(|(_host, group)| {
            let mut fragment = Vec::with_capacity(group.keys.len() + 1);
            fragment.push(name.clone());
            fragment.extend(group.keys);
            FragmentPlan {
                parts: fragment,
                response_indexes: group.response_indexes,
            }
        })
        .collect();

    FragmentedRequest::submit(conn_pool, callbacks, Reducer::SumResult { total: 0 }, plans)
}

#[derive(Default)]
struct KeyGroup {
    keys: Vec<Bytes>,
    response_indexes: Vec<usize>,
}

struct FragmentPlan {
    parts: Vec<Bytes>,
    response_indexes: Vec<usize>,
}

struct SingleServerRequest {
    callbacks: Rc<dyn SplitCallbacks>,
    handle: Option<Box<dyn PoolHandle>>,
}

impl SingleServerRequest {
    fn start(
        conn_pool: &Rc<dyn ConnPool>,
        parts: Vec<Bytes>,
        key_pos: usize,
        callbacks: Rc<dyn SplitCallbacks>,
    ) -> Option<SplitRequest> {
        let key = parts[key_pos].clone();
        let incoming = to_resp(&parts);
        let state = Rc::new(RefCell::new(SingleServerRequest {
            callbacks: callbacks.clone(),
            handle: None,
        }));
        let child = Rc::new(SingleServerCallbacks {
            request: Rc::downgrade(&state),
        });
        match conn_pool.make_request(&key, incoming, child) {
            Some(handle) => {
                state.borrow_mut().handle = Some(handle);
                Some(SplitRequest {
                    inner: RequestState::Single(state),
                })
            }
            None => {
                callbacks.on_response(RespValue::error("no upstream host"));
                None
            }
        }
    }
}

struct SingleServerCallbacks {
    request: Weak<RefCell<SingleServerRequest>>,
}

impl PoolCallbacks for SingleServerCallbacks {
    fn on_response(&self, response: RespValue) {
        let state = match self.request.upgrade() {
            Some(state) => state,
            None => return,
        };
        let callbacks = {
            let mut request = state.borrow_mut();
            request.handle = None;
            request.callbacks.clone()
        };
        // The borrow is released first: the sink may drop the SplitRequest
        // handle from inside the callback.
        callbacks.on_response(response);
    }

    fn on_failure(&self) {
        self.on_response(RespValue::error("upstream failure"));
    }
}

struct FragmentedRequest {
    callbacks: Rc<dyn SplitCallbacks>,
    reducer: Reducer,
    num_pending: usize,
    error_count: u64,
    handles: Vec<Option<Box<dyn PoolHandle>>>,
}

enum Reducer {
    MultiGet { slots: Vec<RespValue> },
    MultiSet,
    SumResult { total: i64 },
}

impl FragmentedRequest {
    fn submit(
        conn_pool: &Rc<dyn ConnPool>,
        callbacks: Rc<dyn SplitCallbacks>,
        reducer: Reducer,
        plans: Vec<FragmentPlan>,
    ) -> Option<SplitRequest> {
        let state = Rc::new(RefCell::new(FragmentedRequest {
            callbacks,
            reducer,
            num_pending: plans.len(),
            error_count: 0,
            handles: std::iter::repeat_with(|| None).take(plans.len()).collect(),
        }));

        for (index, plan) in plans.into_iter().enumerate() {
            let pending = Rc::new(PendingRequest {
                request: Rc::downgrade(&state),
                index,
                response_indexes: plan.response_indexes,
            });
            let route_key = plan.parts[1].clone();
            let fragment = to_resp(&plan.parts);
            match conn_pool.make_request(&route_key, fragment, pending.clone()) {
                Some(handle) => state.borrow_mut().handles[index] = Some(handle),
                None => pending.on_response(RespValue::error("no upstream host")),
            }
        }

        if state.borrow().num_pending == 0 {
            // Every fragment already resolved, so the aggregated reply went
            // out during submission.
            None
        } else {
            Some(SplitRequest {
                inner: RequestState::Fragmented(state),
            })
        }
    }

    fn on_child_response(
        state: &Rc<RefCell<FragmentedRequest>>,
        response: RespValue,
        index: usize,
        response_indexes: &[usize],
    ) {
        let (callbacks, reply) = {
            let mut request = state.borrow_mut();
            request.handles[index] = None;
            request.absorb(response, response_indexes);
            debug_assert!(request.num_pending > 0);
            request.num_pending -= 1;
            if request.num_pending > 0 {
                return;
            }
            let reply = request.finish();
            (request.callbacks.clone(), reply)
        };
        debug!(response = %reply, "aggregated fan-out response");
        callbacks.on_response(reply);
    }

    fn absorb(&mut self, response: RespValue, response_indexes: &[usize]) {
        match &mut self.reducer {
            Reducer::MultiGet { slots } => match response {
                RespValue::Integer(_)
                | RespValue::SimpleString(_)
                | RespValue::NullBulk
                | RespValue::NullArray => {
                    for &slot in response_indexes {
                        slots[slot] = RespValue::error("upstream protocol error");
                        self.error_count += 1;
                    }
                }
                // Whole-fragment errors and bulk strings are copied into
                // every dependent slot. The counter moves for bulk strings
                // too: a non-array reply from a multi-key fragment counts as
                // anomalous even when it is propagated verbatim.
                RespValue::Error(_) | RespValue::BulkString(_) => {
                    for &slot in response_indexes {
                        slots[slot] = response.clone();
                        self.error_count += 1;
                    }
                }
                RespValue::Array(values) => {
                    assert_eq!(
                        values.len(),
                        response_indexes.len(),
                        "fragment reply length must match its key count"
                    );
                    for (&slot, value) in response_indexes.iter().zip(values) {
                        match value {
                            RespValue::NullBulk | RespValue::BulkString(_) => slots[slot] = value,
                            other => {
                                panic!("unexpected element in fragment reply: {:?}", other)
                            }
                        }
                    }
                }
            },
            Reducer::MultiSet => match &response {
                RespValue::SimpleString(status) if status.as_ref() == b"OK" => {}
                _ => self.error_count += response_indexes.len() as u64,
            },
            Reducer::SumResult { total } => match response {
                RespValue::Integer(value) => *total += value,
                _ => self.error_count += response_indexes.len() as u64,
            },
        }
    }

    fn finish(&mut self) -> RespValue {
        match &mut self.reducer {
            Reducer::MultiGet { slots } => RespValue::Array(std::mem::take(slots)),
            Reducer::MultiSet => {
                if self.error_count == 0 {
                    RespValue::simple("OK")
                } else {
                    RespValue::error(format!("finished with {} error(s)", self.error_count))
                }
            }
            Reducer::SumResult { total } => {
                if self.error_count == 0 {
                    RespValue::Integer(*total)
                } else {
                    RespValue::error(format!("finished with {} error(s)", self.error_count))
                }
            }
        }
    }
}

struct PendingRequest {
    request: Weak<RefCell<FragmentedRequest>>,
    index: usize,
    response_indexes: Vec<usize>,
}

impl PoolCallbacks for PendingRequest {
    fn on_response(&self, response: RespValue) {
        if let Some(state) = self.request.upgrade() {
            FragmentedRequest::on_child_response(
                &state,
                response,
                self.index,
                &self.response_indexes,
            );
        }
    }

    fn on_failure(&self) {
        self.on_response(RespValue::error("upstream failure"));
    }
}
