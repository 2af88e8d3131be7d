#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use cleaver::{BackendHost, ConnPool, PoolCallbacks, PoolHandle, RespValue, SplitCallbacks};

/// Builds a client command frame out of string parts.
pub fn command(parts: &[&str]) -> RespValue {
    RespValue::array(parts.iter().map(RespValue::bulk).collect())
}

/// Sink that records every reply it receives.
#[derive(Default)]
pub struct CapturingSink {
    responses: RefCell<Vec<RespValue>>,
}

impl SplitCallbacks for CapturingSink {
    fn on_response(&self, response: RespValue) {
        self.responses.borrow_mut().push(response);
    }
}

impl CapturingSink {
    pub fn responses(&self) -> Vec<RespValue> {
        self.responses.borrow().clone()
    }

    pub fn only(&self) -> RespValue {
        let responses = self.responses.borrow();
        assert_eq!(responses.len(), 1, "expected exactly one reply");
        responses[0].clone()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.borrow().is_empty()
    }
}

struct UpstreamRequest {
    host: String,
    key: Vec<u8>,
    frame: RespValue,
    callbacks: Rc<dyn PoolCallbacks>,
    cancelled: Rc<Cell<bool>>,
}

/// Scripted connection pool: keys map to hosts through an explicit table
/// (unmapped keys land on the default host), submissions are recorded, and
/// the test decides when and how each one completes.
pub struct ScriptedPool {
    hosts: HashMap<Vec<u8>, String>,
    default_host: String,
    down_hosts: RefCell<HashSet<String>>,
    requests: RefCell<Vec<UpstreamRequest>>,
}

impl ScriptedPool {
    pub fn single_host(host: &str) -> Self {
        Self::new(host, &[])
    }

    pub fn new(default_host: &str, assignments: &[(&str, &str)]) -> Self {
        let hosts = assignments
            .iter()
            .map(|(key, host)| (key.as_bytes().to_vec(), host.to_string()))
            .collect();
        Self {
            hosts,
            default_host: default_host.to_string(),
            down_hosts: RefCell::new(HashSet::new()),
            requests: RefCell::new(Vec::new()),
        }
    }

    /// Makes every submission routed to `host` fail with no upstream.
    pub fn mark_down(&self, host: &str) {
        self.down_hosts.borrow_mut().insert(host.to_string());
    }

    pub fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }

    pub fn host_of(&self, index: usize) -> String {
        self.requests.borrow()[index].host.clone()
    }

    pub fn route_key_of(&self, index: usize) -> Vec<u8> {
        self.requests.borrow()[index].key.clone()
    }

    pub fn frame(&self, index: usize) -> RespValue {
        self.requests.borrow()[index].frame.clone()
    }

    pub fn is_cancelled(&self, index: usize) -> bool {
        self.requests.borrow()[index].cancelled.get()
    }

    /// Index of the single recorded submission routed to `host`.
    pub fn index_for_host(&self, host: &str) -> usize {
        let requests = self.requests.borrow();
        let mut matches = requests
            .iter()
            .enumerate()
            .filter(|(_, request)| request.host == host)
            .map(|(index, _)| index);
        let index = matches.next().unwrap_or_else(|| {
            panic!("no submission routed to {}", host);
        });
        assert!(matches.next().is_none(), "multiple submissions to {}", host);
        index
    }

    /// Delivers an upstream reply for the submission at `index`.
    pub fn respond(&self, index: usize, response: RespValue) {
        let callbacks = self.requests.borrow()[index].callbacks.clone();
        callbacks.on_response(response);
    }

    /// Delivers an upstream transport failure for the submission at `index`.
    pub fn fail(&self, index: usize) {
        let callbacks = self.requests.borrow()[index].callbacks.clone();
        callbacks.on_failure();
    }
}

impl ConnPool for ScriptedPool {
    fn get_host(&self, key: &[u8]) -> BackendHost {
        let host = self
            .hosts
            .get(key)
            .cloned()
            .unwrap_or_else(|| self.default_host.clone());
        BackendHost::new(host)
    }

    fn make_request(
        &self,
        key: &[u8],
        request: RespValue,
        callbacks: Rc<dyn PoolCallbacks>,
    ) -> Option<Box<dyn PoolHandle>> {
        let host = self.get_host(key).as_str().to_string();
        if self.down_hosts.borrow().contains(&host) {
            return None;
        }
        let cancelled = Rc::new(Cell::new(false));
        self.requests.borrow_mut().push(UpstreamRequest {
            host,
            key: key.to_vec(),
            frame: request,
            callbacks,
            cancelled: cancelled.clone(),
        });
        Some(Box::new(ScriptedHandle { cancelled }))
    }
}

struct ScriptedHandle {
    cancelled: Rc<Cell<bool>>,
}

impl PoolHandle for ScriptedHandle {
    fn cancel(self: Box<Self>) {
        self.cancelled.set(true);
    }
}
