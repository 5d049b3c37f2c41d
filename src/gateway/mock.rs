//! Scriptable in-memory gateway for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Semaphore;

use super::{ApiRequest, Gateway, GatewayError, Method};

type Route = (Method, String);
type Reply = Result<Value, GatewayError>;

#[derive(Default)]
struct MockState {
    /// Reply used for every call once the queue for a route is empty.
    sticky: HashMap<Route, Reply>,
    /// One-shot replies, consumed in order before the sticky one.
    queued: HashMap<Route, VecDeque<Reply>>,
    latches: HashMap<Route, Arc<Semaphore>>,
    calls: Vec<ApiRequest>,
}

/// Mock gateway: returns scripted replies and records every request.
///
/// Routes match on method and exact path; query parameters are recorded but
/// not matched. An unscripted route answers `GatewayError::NotFound`.
#[derive(Clone, Default)]
pub struct MockGateway {
    state: Arc<Mutex<MockState>>,
}

/// Holds requests to a route until released, one request per `release()`.
#[derive(Clone)]
pub struct MockLatch {
    semaphore: Arc<Semaphore>,
}

impl MockLatch {
    pub fn release(&self) {
        self.semaphore.add_permits(1);
    }
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Type-erased handle for `Api::new` / `CoreState::with_gateway`.
    pub fn shared(self) -> Arc<dyn Gateway> {
        Arc::new(self)
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Always answer `method path` with `value`.
    pub fn respond(&self, method: Method, path: &str, value: Value) {
        self.lock().sticky.insert((method, path.to_string()), Ok(value));
    }

    /// Always answer `method path` with `error`.
    pub fn fail(&self, method: Method, path: &str, error: GatewayError) {
        self.lock().sticky.insert((method, path.to_string()), Err(error));
    }

    /// Answer the next call to `method path` with `reply`, then fall back.
    pub fn enqueue(&self, method: Method, path: &str, reply: Reply) {
        self.lock()
            .queued
            .entry((method, path.to_string()))
            .or_default()
            .push_back(reply);
    }

    /// Hold calls to `method path` until the returned latch is released.
    pub fn hold(&self, method: Method, path: &str) -> MockLatch {
        let semaphore = Arc::new(Semaphore::new(0));
        self.lock()
            .latches
            .insert((method, path.to_string()), Arc::clone(&semaphore));
        MockLatch { semaphore }
    }

    /// Every request received so far, in order.
    pub fn calls(&self) -> Vec<ApiRequest> {
        self.lock().calls.clone()
    }

    /// Number of requests received for `method path`.
    pub fn count(&self, method: Method, path: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.method == method && c.path == path)
            .count()
    }

    /// Number of requests received with `method`, any path.
    pub fn count_method(&self, method: Method) -> usize {
        self.lock().calls.iter().filter(|c| c.method == method).count()
    }

    fn next_reply(&self, route: &Route) -> Reply {
        let mut state = self.lock();
        if let Some(reply) = state.queued.get_mut(route).and_then(VecDeque::pop_front) {
            return reply;
        }
        state
            .sticky
            .get(route)
            .cloned()
            .unwrap_or_else(|| Err(GatewayError::NotFound(route.1.clone())))
    }
}

#[async_trait]
impl Gateway for MockGateway {
    async fn send(&self, request: ApiRequest) -> Result<Value, GatewayError> {
        let route = (request.method, request.path.clone());
        let latch = {
            let mut state = self.lock();
            state.calls.push(request);
            state.latches.get(&route).cloned()
        };

        if let Some(semaphore) = latch {
            match semaphore.acquire().await {
                Ok(permit) => permit.forget(),
                Err(_) => return Err(GatewayError::Network("latch closed".into())),
            }
        }

        self.next_reply(&route)
    }
}
