// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Asynchronous, cancelable data requests.
//!
//! A [`Request`] wraps one unit of work, usually "compute this region of this
//! slot". It is resolved exactly once: with a result, with an error, or by
//! cancellation. Callers either block on [`Request::wait`], await
//! [`Request::wait_async`], or register callbacks that fire on the thread that
//! resolves the request.
//!
//! Work starts lazily. Registering a finished/failed callback hands the
//! request to the graph's worker pool; waiting on a request that has not
//! started yet runs it on the waiting thread, so requests issued from inside
//! `execute` never wait for a free worker.

use parking_lot::{Condvar, Mutex};
use std::fmt::{Debug, Formatter};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::array::ArrayData;
use crate::errors::ExecutionError;
use crate::graph::{Graph, GraphInner};
use crate::observability::messages::request::{
    RequestCancelled, RequestFailed, RequestFinished, RequestSubmitted,
};
use crate::observability::messages::StructuredLog;

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Observable state of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    Pending,
    Running,
    Finished,
    Failed,
    Cancelled,
}

type Work<T> = Box<dyn FnOnce(&CancellationToken) -> Result<T, ExecutionError> + Send>;
type FinishedCallback<T> = Box<dyn FnOnce(&T) + Send>;
type FailedCallback = Box<dyn FnOnce(&ExecutionError) + Send>;
type CancelledCallback = Box<dyn FnOnce() + Send>;

enum State<T> {
    Pending,
    Running,
    Finished(T),
    Failed(ExecutionError),
    Cancelled,
}

struct Shared<T> {
    state: State<T>,
    work: Option<Work<T>>,
    submitted: bool,
    on_finished: Vec<FinishedCallback<T>>,
    on_failed: Vec<FailedCallback>,
    on_cancelled: Vec<CancelledCallback>,
}

struct RequestInner<T> {
    id: u64,
    shared: Mutex<Shared<T>>,
    resolved: Condvar,
    token: CancellationToken,
    graph: Weak<GraphInner>,
}

/// Handle to a pending or resolved computation. Clones share the same request.
pub struct Request<T = Arc<ArrayData>>(Arc<RequestInner<T>>);

impl<T> Clone for Request<T> {
    fn clone(&self) -> Self {
        Request(self.0.clone())
    }
}

impl<T> Debug for Request<T>
where
    T: Clone + Send + 'static,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.0.id)
            .field("status", &self.status())
            .finish()
    }
}

impl<T> Request<T>
where
    T: Clone + Send + 'static,
{
    /// A request that runs `work` on `graph`'s worker pool, or on the calling
    /// thread when no graph is given.
    pub fn new(
        graph: Option<&Graph>,
        work: impl FnOnce(&CancellationToken) -> Result<T, ExecutionError> + Send + 'static,
    ) -> Self {
        Self::with_token(graph, CancellationToken::new(), work)
    }

    /// Like [`Request::new`], but cancelled together with `token`.
    pub fn with_token(
        graph: Option<&Graph>,
        token: CancellationToken,
        work: impl FnOnce(&CancellationToken) -> Result<T, ExecutionError> + Send + 'static,
    ) -> Self {
        Self::build(
            graph,
            token,
            State::Pending,
            Some(Box::new(work) as Work<T>),
        )
    }

    /// An already failed request.
    pub fn failed(error: ExecutionError) -> Self {
        Self::build(None, CancellationToken::new(), State::Failed(error), None)
    }

    /// An already finished request.
    pub fn finished(value: T) -> Self {
        Self::build(None, CancellationToken::new(), State::Finished(value), None)
    }

    fn build(
        graph: Option<&Graph>,
        token: CancellationToken,
        state: State<T>,
        work: Option<Work<T>>,
    ) -> Self {
        Request(Arc::new(RequestInner {
            id: NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed),
            shared: Mutex::new(Shared {
                state,
                work,
                submitted: false,
                on_finished: Vec::new(),
                on_failed: Vec::new(),
                on_cancelled: Vec::new(),
            }),
            resolved: Condvar::new(),
            token,
            graph: graph.map(|g| Arc::downgrade(&g.0)).unwrap_or_default(),
        }))
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn status(&self) -> RequestStatus {
        match self.0.shared.lock().state {
            State::Pending => RequestStatus::Pending,
            State::Running => RequestStatus::Running,
            State::Finished(_) => RequestStatus::Finished,
            State::Failed(_) => RequestStatus::Failed,
            State::Cancelled => RequestStatus::Cancelled,
        }
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.0.token
    }

    /// Start the request on the worker pool if it has not started yet.
    pub fn submit(&self) -> &Self {
        {
            let mut shared = self.0.shared.lock();
            if shared.submitted || !matches!(shared.state, State::Pending) {
                return self;
            }
            shared.submitted = true;
        }

        let handle = self.0.graph.upgrade().map(Graph).and_then(|g| g.handle());
        RequestSubmitted {
            request_id: self.0.id,
            inline: handle.is_none(),
        }
        .log();
        match handle {
            Some(handle) => {
                let request = self.clone();
                // The join handle is dropped; the result is delivered through the request.
                drop(handle.spawn_blocking(move || request.run()));
            }
            None => self.run(),
        }
        self
    }

    /// Block until the request is resolved and return its result.
    pub fn wait(&self) -> Result<T, ExecutionError> {
        self.run();
        let mut shared = self.0.shared.lock();
        loop {
            match &shared.state {
                State::Pending | State::Running => self.0.resolved.wait(&mut shared),
                State::Finished(value) => return Ok(value.clone()),
                State::Failed(error) => return Err(error.clone()),
                State::Cancelled => return Err(ExecutionError::Cancelled),
            }
        }
    }

    /// Await the result from async code without blocking the executor.
    pub async fn wait_async(&self) -> Result<T, ExecutionError> {
        let request = self.clone();
        tokio::task::spawn_blocking(move || request.wait())
            .await
            .map_err(|e| ExecutionError::Internal(e.to_string()))?
    }

    /// Call `f` with the result once the request finishes. Fires immediately
    /// if it already has; never fires if the request fails or is cancelled.
    pub fn notify_finished(&self, f: impl FnOnce(&T) + Send + 'static) -> &Self {
        let mut shared = self.0.shared.lock();
        let finished = match &shared.state {
            State::Finished(value) => Some(value.clone()),
            State::Failed(_) | State::Cancelled => return self,
            State::Pending | State::Running => None,
        };
        if let Some(value) = finished {
            drop(shared);
            f(&value);
            return self;
        }
        shared.on_finished.push(Box::new(f));
        drop(shared);
        self.submit()
    }

    /// Call `f` with the error once the request fails.
    pub fn notify_failed(&self, f: impl FnOnce(&ExecutionError) + Send + 'static) -> &Self {
        let mut shared = self.0.shared.lock();
        let failed = match &shared.state {
            State::Failed(error) => Some(error.clone()),
            State::Finished(_) | State::Cancelled => return self,
            State::Pending | State::Running => None,
        };
        if let Some(error) = failed {
            drop(shared);
            f(&error);
            return self;
        }
        shared.on_failed.push(Box::new(f));
        drop(shared);
        self.submit()
    }

    /// Call `f` if the request is cancelled.
    pub fn notify_cancelled(&self, f: impl FnOnce() + Send + 'static) -> &Self {
        let mut shared = self.0.shared.lock();
        match &shared.state {
            State::Cancelled => {
                drop(shared);
                f();
            }
            State::Finished(_) | State::Failed(_) => {}
            State::Pending | State::Running => shared.on_cancelled.push(Box::new(f)),
        }
        self
    }

    /// Cancel the request. Finished and failed callbacks are dropped, a result
    /// that arrives later is discarded, and work that checks its cancellation
    /// token stops early. Has no effect on a resolved request.
    pub fn cancel(&self) {
        let callbacks = {
            let mut shared = self.0.shared.lock();
            match shared.state {
                State::Pending | State::Running => {}
                _ => return,
            }
            shared.state = State::Cancelled;
            shared.work = None;
            shared.on_finished.clear();
            shared.on_failed.clear();
            std::mem::take(&mut shared.on_cancelled)
        };
        self.0.resolved.notify_all();
        self.0.token.cancel();
        RequestCancelled {
            request_id: self.0.id,
        }
        .log();
        for callback in callbacks {
            callback();
        }
    }

    /// Run the work on the current thread if nobody has started it yet.
    fn run(&self) {
        let work = {
            let mut shared = self.0.shared.lock();
            if !matches!(shared.state, State::Pending) {
                return;
            }
            match shared.work.take() {
                Some(work) => {
                    shared.state = State::Running;
                    work
                }
                None => return,
            }
        };

        let started = Instant::now();
        let token = self.0.token.clone();
        let result = if token.is_cancelled() {
            Err(ExecutionError::Cancelled)
        } else {
            catch_unwind(AssertUnwindSafe(|| work(&token))).unwrap_or_else(|panic| {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(ExecutionError::Internal(format!("request panicked: {}", message)))
            })
        };
        self.resolve(result, started);
    }

    fn resolve(&self, result: Result<T, ExecutionError>, started: Instant) {
        let mut shared = self.0.shared.lock();
        if matches!(shared.state, State::Cancelled) {
            return;
        }
        match result {
            Ok(value) => {
                let callbacks = std::mem::take(&mut shared.on_finished);
                shared.on_failed.clear();
                shared.on_cancelled.clear();
                shared.state = State::Finished(value.clone());
                drop(shared);
                self.0.resolved.notify_all();
                RequestFinished {
                    request_id: self.0.id,
                    duration: started.elapsed(),
                }
                .log();
                for callback in callbacks {
                    callback(&value);
                }
            }
            Err(error) => {
                let callbacks = std::mem::take(&mut shared.on_failed);
                shared.on_finished.clear();
                shared.on_cancelled.clear();
                shared.state = State::Failed(error.clone());
                drop(shared);
                self.0.resolved.notify_all();
                RequestFailed {
                    request_id: self.0.id,
                    error: &error,
                }
                .log();
                for callback in callbacks {
                    callback(&error);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn runs_inline_without_a_graph() {
        let request = Request::new(None, |_| Ok(41 + 1));
        assert_eq!(request.status(), RequestStatus::Pending);
        assert_eq!(request.wait(), Ok(42));
        assert_eq!(request.status(), RequestStatus::Finished);
    }

    #[test]
    fn work_runs_exactly_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let request = Request::new(None, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        request.wait().unwrap();
        request.wait().unwrap();
        request.submit();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failure_reaches_wait_and_callbacks() {
        let request: Request<u32> =
            Request::new(None, |_| Err(ExecutionError::Io("disk gone".into())));
        let (tx, rx) = mpsc::channel();
        request.notify_failed(move |e| tx.send(e.clone()).unwrap());
        assert_eq!(rx.recv().unwrap(), ExecutionError::Io("disk gone".into()));
        assert_eq!(request.wait(), Err(ExecutionError::Io("disk gone".into())));
    }

    #[test]
    fn callbacks_on_resolved_requests_fire_immediately() {
        let done = Request::finished(7u8);
        let (tx, rx) = mpsc::channel();
        done.notify_finished(move |v| tx.send(*v).unwrap());
        assert_eq!(rx.try_recv(), Ok(7));

        let failed: Request<u8> = Request::failed(ExecutionError::Cancelled);
        let (tx, rx) = mpsc::channel();
        failed.notify_finished(move |v| tx.send(*v).unwrap());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn cancel_before_start_skips_the_work() {
        let request: Request<u32> = Request::new(None, |_| panic!("must not run"));
        let cancelled = Arc::new(AtomicUsize::new(0));
        let c = cancelled.clone();
        request.notify_cancelled(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        request.cancel();
        request.cancel();
        assert_eq!(request.wait(), Err(ExecutionError::Cancelled));
        assert_eq!(request.status(), RequestStatus::Cancelled);
        assert_eq!(cancelled.load(Ordering::SeqCst), 1);
        assert!(request.cancellation_token().is_cancelled());
    }

    #[test]
    fn panics_become_failures() {
        let request: Request<u32> = Request::new(None, |_| panic!("boom"));
        match request.wait() {
            Err(ExecutionError::Internal(message)) => assert!(message.contains("boom")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn runs_on_the_worker_pool_and_honours_cancellation() {
        let graph = Graph::with_defaults().unwrap();
        let (started_tx, started_rx) = mpsc::channel();
        let request: Request<u32> = Request::new(Some(&graph), move |token| {
            started_tx.send(()).unwrap();
            while !token.is_cancelled() {
                std::thread::sleep(Duration::from_millis(2));
            }
            Ok(1)
        });
        let (tx, rx) = mpsc::channel();
        request.notify_finished(move |v| tx.send(*v).unwrap());
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        request.cancel();
        assert_eq!(request.wait(), Err(ExecutionError::Cancelled));
        // The late result is discarded.
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    }

    #[tokio::test]
    async fn wait_async_bridges_to_async_callers() {
        let graph = Graph::with_defaults().unwrap();
        let request = Request::new(Some(&graph), |_| Ok(String::from("done")));
        request.submit();
        assert_eq!(request.wait_async().await.unwrap(), "done");
    }
}
