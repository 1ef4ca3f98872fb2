//! An owned pipeline session that runs requests off the caller's thread.
//!
//! A [`PipelineSession`] owns one worker thread (in [`ExecutionPolicy::Background`]
//! mode) that takes requests from a channel strictly in submission order.
//! Every request gets an id from a monotonically increasing counter and a
//! slot in the pending table; the worker answers through that slot and the
//! caller receives the answer through its [`Ticket`].
//!
//! # Failure handling
//!
//! - If the worker thread cannot be created the session runs every request
//!   synchronously instead.
//! - A panic inside a transform becomes an error response for that request;
//!   the worker keeps serving.
//! - A cancelled or timed-out request leaves the pending table and is skipped
//!   if the worker has not started it yet.
//! - [`PipelineSession::dispose`] settles every outstanding ticket with
//!   [`PipelineError::Disposed`] and stops the worker.

use std::{
    any::Any,
    collections::HashMap,
    io,
    marker::PhantomData,
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, AtomicU64, Ordering},
        mpsc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use log::{debug, error, info, trace, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AppConfig;

use super::{
    Transform, Transformer,
    options::{
        BuildDiagramOptions, DiagramResult, FlowGraphResult, ParseCodeOptions, ParseDslOptions,
    },
    transport::{Request, Response, ResponsePayload},
};

const WORKER_NAME: &str = "flowforge-pipeline";

/// Where a session runs its requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionPolicy {
    /// On a dedicated worker thread.
    #[default]
    Background,
    /// On the submitting thread, before `submit` returns.
    Synchronous,
}

/// Errors settling a [`Ticket`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("the pipeline session was disposed")]
    Disposed,

    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("the request was cancelled")]
    Cancelled,

    #[error("the pipeline worker stopped without answering")]
    Disconnected,

    #[error("the request failed: {0}")]
    WorkerFailure(String),

    #[error("the response does not match the request")]
    ProtocolMismatch,
}

/// Creates the worker thread of a background session.
pub trait Spawn: Send + Sync {
    fn spawn(
        &self,
        name: &str,
        task: Box<dyn FnOnce() + Send + 'static>,
    ) -> io::Result<JoinHandle<()>>;
}

/// Spawns named OS threads.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSpawner;

impl Spawn for ThreadSpawner {
    fn spawn(
        &self,
        name: &str,
        task: Box<dyn FnOnce() + Send + 'static>,
    ) -> io::Result<JoinHandle<()>> {
        thread::Builder::new().name(name.to_string()).spawn(task)
    }
}

type Reply = mpsc::Sender<Result<Response, PipelineError>>;

enum Message {
    Run(Request),
    Shutdown,
}

/// State shared between the session, its tickets and its worker.
struct Shared {
    pending: Mutex<HashMap<u64, Reply>>,
    transform: Arc<dyn Transform>,
}

impl Shared {
    fn pending(&self) -> MutexGuard<'_, HashMap<u64, Reply>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_pending(&self, id: u64) -> bool {
        self.pending().contains_key(&id)
    }

    fn forget(&self, id: u64) -> Option<Reply> {
        self.pending().remove(&id)
    }

    /// Run `request` and deliver the answer if anyone still waits for it.
    fn run(&self, request: Request) {
        let id = request.id();
        if !self.is_pending(id) {
            debug!(id; "Skipping request that is no longer pending");
            return;
        }

        let operation = request.operation();
        debug!(id, operation:%; "Running request");
        let response = match panic::catch_unwind(AssertUnwindSafe(|| {
            request.execute(self.transform.as_ref())
        })) {
            Ok(payload) => Response::Success { id, payload },
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(id, operation:%, message = message.as_str(); "Request panicked");
                Response::error(id, message)
            }
        };

        match self.forget(id) {
            Some(reply) => {
                let _ = reply.send(Ok(response));
            }
            None => trace!(id; "Dropping response of a cancelled request"),
        }
    }
}

struct Worker {
    sender: mpsc::Sender<Message>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    fn start(shared: Arc<Shared>, spawner: &dyn Spawn) -> io::Result<Self> {
        let (sender, receiver) = mpsc::channel::<Message>();
        let handle = spawner.spawn(
            WORKER_NAME,
            Box::new(move || worker_loop(&shared, &receiver)),
        )?;

        Ok(Self {
            sender,
            handle: Some(handle),
        })
    }

    fn stop(&mut self) {
        let _ = self.sender.send(Message::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Pipeline worker terminated abnormally");
            }
        }
    }
}

fn worker_loop(shared: &Shared, receiver: &mpsc::Receiver<Message>) {
    debug!("Pipeline worker started");
    while let Ok(message) = receiver.recv() {
        match message {
            Message::Run(request) => shared.run(request),
            Message::Shutdown => break,
        }
    }
    debug!("Pipeline worker stopped");
}

/// Owner of the pipeline's worker and pending table.
///
/// # Example
///
/// ```
/// use flowforge::pipeline::{ExecutionPolicy, ParseDslOptions, PipelineSession};
///
/// let session = PipelineSession::new(ExecutionPolicy::Background);
/// let result = session
///     .parse_dsl(ParseDslOptions::new(r#"diagram "A" { node a  node b  a -> b }"#))
///     .wait()
///     .unwrap();
///
/// assert_eq!(result.model.edges.len(), 1);
/// ```
pub struct PipelineSession {
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
    next_id: AtomicU64,
    disposed: AtomicBool,
    policy: ExecutionPolicy,
    timeout: Option<Duration>,
}

impl PipelineSession {
    /// A session over the default [`Transformer`], spawning OS threads.
    pub fn new(policy: ExecutionPolicy) -> Self {
        Self::builder().with_policy(policy).build()
    }

    /// A session configured from the `pipeline` section of `config`.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::builder()
            .with_policy(config.pipeline().policy())
            .with_timeout(config.pipeline().request_timeout())
            .with_transform(Transformer::new(config.clone()))
            .build()
    }

    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    /// The policy in effect, which is `Synchronous` after a failed spawn.
    pub fn policy(&self) -> ExecutionPolicy {
        self.policy
    }

    /// Number of requests submitted and not yet answered.
    pub fn pending(&self) -> usize {
        self.shared.pending().len()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    pub fn parse_code(&self, options: ParseCodeOptions) -> Ticket<FlowGraphResult> {
        self.submit(Request::ParseCode {
            id: 0,
            payload: options,
        })
    }

    pub fn parse_dsl(&self, options: ParseDslOptions) -> Ticket<DiagramResult> {
        self.submit(Request::ParseDsl {
            id: 0,
            payload: options,
        })
    }

    pub fn build_diagram(&self, options: BuildDiagramOptions) -> Ticket<DiagramResult> {
        self.submit(Request::BuildDiagram {
            id: 0,
            payload: options,
        })
    }

    /// Answer a transport request, echoing its id.
    ///
    /// Waits at most the session's configured timeout. Failures of any kind
    /// become an error response.
    pub fn handle(&self, request: Request) -> Response {
        let client_id = request.id();
        let ticket: Ticket<ResponsePayload> = self.submit(request);

        match ticket.wait_response(self.timeout) {
            Ok(response) => response.with_id(client_id),
            Err(err) => Response::error(client_id, err.to_string()),
        }
    }

    /// Submit `request` under a fresh id.
    ///
    /// The id carried by `request` is replaced.
    pub fn submit<T>(&self, mut request: Request) -> Ticket<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        request.set_id(id);

        let (reply, receiver) = mpsc::channel();
        let ticket = Ticket {
            id,
            receiver,
            shared: Arc::clone(&self.shared),
            cancelled: AtomicBool::new(false),
            _result: PhantomData,
        };

        if self.is_disposed() {
            let _ = reply.send(Err(PipelineError::Disposed));
            return ticket;
        }
        self.shared.pending().insert(id, reply);
        trace!(id, operation:% = request.operation(); "Request submitted");

        let request = match self.worker().as_ref() {
            Some(worker) => match worker.sender.send(Message::Run(request)) {
                Ok(()) => return ticket,
                Err(mpsc::SendError(Message::Run(request))) => {
                    warn!(id; "Pipeline worker is gone, running request synchronously");
                    request
                }
                Err(mpsc::SendError(Message::Shutdown)) => return ticket,
            },
            None => request,
        };

        self.shared.run(request);
        ticket
    }

    /// Stop the worker and settle every outstanding ticket with
    /// [`PipelineError::Disposed`]. Idempotent.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        let outstanding: Vec<(u64, Reply)> = self.shared.pending().drain().collect();
        info!(outstanding = outstanding.len(); "Disposing pipeline session");
        for (_, reply) in outstanding {
            let _ = reply.send(Err(PipelineError::Disposed));
        }

        let worker = self.worker().take();
        if let Some(mut worker) = worker {
            worker.stop();
        }
    }

    fn worker(&self) -> MutexGuard<'_, Option<Worker>> {
        self.worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for PipelineSession {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Builder for [`PipelineSession`].
pub struct SessionBuilder {
    policy: ExecutionPolicy,
    timeout: Option<Duration>,
    transform: Arc<dyn Transform>,
    spawner: Box<dyn Spawn>,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self {
            policy: ExecutionPolicy::default(),
            timeout: None,
            transform: Arc::new(Transformer::default()),
            spawner: Box::new(ThreadSpawner),
        }
    }
}

impl SessionBuilder {
    pub fn with_policy(mut self, policy: ExecutionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Upper bound for [`PipelineSession::handle`] to wait on a response.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_transform(mut self, transform: impl Transform + 'static) -> Self {
        self.transform = Arc::new(transform);
        self
    }

    pub fn with_spawner(mut self, spawner: impl Spawn + 'static) -> Self {
        self.spawner = Box::new(spawner);
        self
    }

    pub fn build(self) -> PipelineSession {
        let shared = Arc::new(Shared {
            pending: Mutex::new(HashMap::new()),
            transform: self.transform,
        });

        let (policy, worker) = match self.policy {
            ExecutionPolicy::Synchronous => (ExecutionPolicy::Synchronous, None),
            ExecutionPolicy::Background => {
                match Worker::start(Arc::clone(&shared), self.spawner.as_ref()) {
                    Ok(worker) => (ExecutionPolicy::Background, Some(worker)),
                    Err(err) => {
                        warn!(err:%; "Could not start pipeline worker, running synchronously");
                        (ExecutionPolicy::Synchronous, None)
                    }
                }
            }
        };
        info!(policy:?; "Pipeline session started");

        PipelineSession {
            shared,
            worker: Mutex::new(worker),
            next_id: AtomicU64::new(1),
            disposed: AtomicBool::new(false),
            policy,
            timeout: self.timeout,
        }
    }
}

/// Handle to the eventual result of one request.
///
/// Dropping a ticket does not cancel the request; use [`Ticket::cancel`].
pub struct Ticket<T> {
    id: u64,
    receiver: mpsc::Receiver<Result<Response, PipelineError>>,
    shared: Arc<Shared>,
    cancelled: AtomicBool,
    _result: PhantomData<fn() -> T>,
}

impl<T> Ticket<T> {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Withdraw the request. It is skipped if the worker has not started it,
    /// and waiting on the ticket afterwards yields [`PipelineError::Cancelled`].
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.shared.forget(self.id);
        debug!(id = self.id; "Request cancelled");
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    fn wait_response(self, timeout: Option<Duration>) -> Result<Response, PipelineError> {
        if self.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        let received = match timeout {
            None => self
                .receiver
                .recv()
                .map_err(|_| PipelineError::Disconnected),
            Some(timeout) => self.receiver.recv_timeout(timeout).map_err(|err| match err {
                mpsc::RecvTimeoutError::Timeout => {
                    self.shared.forget(self.id);
                    warn!(id = self.id, timeout:?; "Request timed out");
                    PipelineError::Timeout(timeout)
                }
                mpsc::RecvTimeoutError::Disconnected => PipelineError::Disconnected,
            }),
        };
        received?
    }
}

impl<T> Ticket<T>
where
    T: TryFrom<ResponsePayload, Error = PipelineError>,
{
    /// Block until the response arrives.
    pub fn wait(self) -> Result<T, PipelineError> {
        settle(self.wait_response(None)?)
    }

    /// Block for at most `timeout`; on expiry the request is withdrawn.
    pub fn wait_timeout(self, timeout: Duration) -> Result<T, PipelineError> {
        settle(self.wait_response(Some(timeout))?)
    }
}

fn settle<T>(response: Response) -> Result<T, PipelineError>
where
    T: TryFrom<ResponsePayload, Error = PipelineError>,
{
    match response {
        Response::Success { payload, .. } => T::try_from(payload),
        Response::Error { payload, .. } => Err(PipelineError::WorkerFailure(payload.message)),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "transform panicked".to_string()
    }
}
