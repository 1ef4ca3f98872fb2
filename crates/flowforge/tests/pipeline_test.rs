use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
        mpsc,
    },
    thread,
    time::Duration,
};

use flowforge::pipeline::{
    BuildDiagramOptions, DiagramResult, ExecutionPolicy, FlowGraphResult, ParseCodeOptions,
    ParseDslOptions, PipelineError, PipelineSession, Request, Response, ResponsePayload,
    Transform, Transformer,
};

const SOURCE: &str = r#"
    diagram "Orders" {
        layout vertical
        group backend label "Backend" {
            node api label "API"
            node db label "Database" type database
        }
        node client label "Client"
        client -> backend.api : "HTTP"
        backend.api => backend.db
    }
"#;

/// Delegates to [`Transformer`], but `parse_dsl` first waits for the gate
/// to open and panics on the source `"panic"`.
struct GatedTransform {
    inner: Transformer,
    gate: Mutex<mpsc::Receiver<()>>,
    calls: Arc<AtomicUsize>,
}

impl GatedTransform {
    fn new() -> (Self, mpsc::Sender<()>, Arc<AtomicUsize>) {
        let (open, gate) = mpsc::channel();
        let calls = Arc::new(AtomicUsize::new(0));
        let transform = Self {
            inner: Transformer::default(),
            gate: Mutex::new(gate),
            calls: Arc::clone(&calls),
        };
        (transform, open, calls)
    }
}

impl Transform for GatedTransform {
    fn parse_code(&self, options: &ParseCodeOptions) -> FlowGraphResult {
        self.inner.parse_code(options)
    }

    fn parse_dsl(&self, options: &ParseDslOptions) -> DiagramResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _ = self.gate.lock().unwrap().recv();
        if options.source == "panic" {
            panic!("transform exploded");
        }
        self.inner.parse_dsl(options)
    }

    fn build_diagram(&self, options: &BuildDiagramOptions) -> DiagramResult {
        self.inner.build_diagram(options)
    }
}

#[test]
fn test_background_and_synchronous_agree() {
    let background = PipelineSession::new(ExecutionPolicy::Background);
    let synchronous = PipelineSession::new(ExecutionPolicy::Synchronous);
    assert_eq!(background.policy(), ExecutionPolicy::Background);

    let a = background
        .build_diagram(BuildDiagramOptions::dsl(SOURCE))
        .wait()
        .unwrap();
    let b = synchronous
        .build_diagram(BuildDiagramOptions::dsl(SOURCE))
        .wait()
        .unwrap();

    assert_eq!(a.model, b.model);
    assert_eq!(a.diagnostics, b.diagnostics);
    assert_eq!(a.layout, b.layout);
    assert_eq!(a.model.nodes.len(), 3);
    assert_eq!(a.model.edges.len(), 2);
    assert!(a.diagnostics.is_empty());

    let code = "function f(x) { for (const y of x) { if (y) break; } }";
    let a = background
        .parse_code(ParseCodeOptions::new(code, "js"))
        .wait()
        .unwrap();
    let b = synchronous
        .parse_code(ParseCodeOptions::new(code, "js"))
        .wait()
        .unwrap();
    assert_eq!(a.graph, b.graph);
}

#[test]
fn test_handle_echoes_request_ids() {
    let session = PipelineSession::new(ExecutionPolicy::Background);

    let requests: Vec<Request> = [
        r#"{"type": "parse-dsl", "id": 42, "payload": {"source": "diagram \"A\" { node a }"}}"#,
        r#"{"type": "parse-code", "id": 7, "payload": {"source": "function f() {}", "language": "js"}}"#,
        r#"{"type": "build-diagram", "id": 42, "payload": {"sourceType": "code", "source": "g()"}}"#,
    ]
    .iter()
    .map(|json| serde_json::from_str(json).unwrap())
    .collect();

    let responses: Vec<Response> = requests
        .into_iter()
        .map(|request| session.handle(request))
        .collect();

    let ids: Vec<u64> = responses.iter().map(Response::id).collect();
    assert_eq!(ids, [42, 7, 42]);
    assert!(responses.iter().all(Response::is_success));
    assert!(matches!(
        &responses[1],
        Response::Success {
            payload: ResponsePayload::FlowGraph(_),
            ..
        }
    ));
}

#[test]
fn test_panic_fails_only_its_request() {
    let (transform, open, _) = GatedTransform::new();
    let session = PipelineSession::builder()
        .with_transform(transform)
        .build();

    let exploding = session.parse_dsl(ParseDslOptions::new("panic"));
    let healthy = session.parse_dsl(ParseDslOptions::new(r#"diagram "A" { node a }"#));
    open.send(()).unwrap();
    open.send(()).unwrap();

    match exploding.wait() {
        Err(PipelineError::WorkerFailure(message)) => assert_eq!(message, "transform exploded"),
        other => panic!("expected a worker failure, got {other:?}"),
    }
    assert_eq!(healthy.wait().unwrap().model.nodes.len(), 1);
    assert_eq!(session.pending(), 0);
}

#[test]
fn test_timeout_withdraws_request() {
    let (transform, open, _) = GatedTransform::new();
    let session = PipelineSession::builder()
        .with_transform(transform)
        .build();

    let blocked = session.parse_dsl(ParseDslOptions::new(""));
    let outcome = blocked.wait_timeout(Duration::from_millis(20));
    assert_eq!(
        outcome.unwrap_err(),
        PipelineError::Timeout(Duration::from_millis(20))
    );
    assert_eq!(session.pending(), 0);

    open.send(()).unwrap();
    open.send(()).unwrap();
    let next = session.parse_dsl(ParseDslOptions::new(r#"diagram "B" {}"#));
    assert_eq!(next.wait().unwrap().model.id, "b");
}

#[test]
fn test_cancelled_request_is_skipped() {
    let (transform, open, calls) = GatedTransform::new();
    let session = PipelineSession::builder()
        .with_transform(transform)
        .build();

    let first = session.parse_dsl(ParseDslOptions::new(""));
    let cancelled = session.parse_dsl(ParseDslOptions::new(""));
    cancelled.cancel();
    let last = session.parse_dsl(ParseDslOptions::new(""));

    open.send(()).unwrap();
    open.send(()).unwrap();

    assert!(first.wait().is_ok());
    assert!(last.wait().is_ok());
    assert_eq!(cancelled.wait().unwrap_err(), PipelineError::Cancelled);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_dispose_settles_outstanding_tickets() {
    let (transform, open, _) = GatedTransform::new();
    let session = PipelineSession::builder()
        .with_transform(transform)
        .build();

    let running = session.parse_dsl(ParseDslOptions::new(""));
    let queued = session.parse_dsl(ParseDslOptions::new(""));
    assert_eq!(session.pending(), 2);

    let opener = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        let _ = open.send(());
        let _ = open.send(());
    });
    session.dispose();
    opener.join().unwrap();

    assert!(session.is_disposed());
    assert_eq!(running.wait().unwrap_err(), PipelineError::Disposed);
    assert_eq!(queued.wait().unwrap_err(), PipelineError::Disposed);
    assert_eq!(session.pending(), 0);
}

#[test]
fn test_concurrent_submitters() {
    let session = Arc::new(PipelineSession::new(ExecutionPolicy::Background));

    thread::scope(|scope| {
        for index in 0..8 {
            let session = Arc::clone(&session);
            scope.spawn(move || {
                let source = format!(r#"diagram "D{index}" {{ node a{index} }}"#);
                let result = session.parse_dsl(ParseDslOptions::new(source)).wait().unwrap();
                assert_eq!(result.model.nodes[0].id, format!("a{index}"));
            });
        }
    });

    assert_eq!(session.pending(), 0);
}

/// Delegates to [`Transformer`] and records the source of every `parse_dsl`
/// call in the order the calls run.
struct RecordingTransform {
    inner: Transformer,
    log: Arc<Mutex<Vec<String>>>,
}

impl Transform for RecordingTransform {
    fn parse_code(&self, options: &ParseCodeOptions) -> FlowGraphResult {
        self.inner.parse_code(options)
    }

    fn parse_dsl(&self, options: &ParseDslOptions) -> DiagramResult {
        self.log.lock().unwrap().push(options.source.clone());
        self.inner.parse_dsl(options)
    }

    fn build_diagram(&self, options: &BuildDiagramOptions) -> DiagramResult {
        self.inner.build_diagram(options)
    }
}

#[test]
fn test_background_runs_in_submission_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let session = PipelineSession::builder()
        .with_policy(ExecutionPolicy::Background)
        .with_transform(RecordingTransform {
            inner: Transformer::default(),
            log: Arc::clone(&log),
        })
        .build();
    assert_eq!(session.policy(), ExecutionPolicy::Background);

    let sources: Vec<String> = (0..6)
        .map(|index| format!(r#"diagram "d{index}" {{ node n{index} }}"#))
        .collect();
    let tickets: Vec<_> = sources
        .iter()
        .map(|source| session.parse_dsl(ParseDslOptions::new(source.as_str())))
        .collect();

    let mut titles: Vec<String> = tickets
        .into_iter()
        .rev()
        .map(|ticket| ticket.wait().unwrap().model.title)
        .collect();
    titles.reverse();

    assert_eq!(titles, ["d0", "d1", "d2", "d3", "d4", "d5"]);
    assert_eq!(*log.lock().unwrap(), sources);
}
