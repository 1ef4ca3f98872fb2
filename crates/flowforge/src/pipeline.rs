//! Request orchestration.
//!
//! The three operations (`parse-code`, `parse-dsl`, `build-diagram`) are
//! defined by the [`Transform`] trait and implemented by [`Transformer`].
//! A [`PipelineSession`] runs them on a worker thread, correlating requests
//! and responses by id; [`Request`] and [`Response`] are the JSON transport
//! contract for hosts that talk to a session over a byte stream.

mod options;
mod resolver;
mod session;
mod transform;
mod transport;

pub use options::{
    BuildDiagramOptions, DiagramConfig, DiagramResult, FlowGraphResult, ParseCodeOptions,
    ParseDslOptions, Perf, SourceType,
};
pub use resolver::FileImportResolver;
pub use session::{
    ExecutionPolicy, PipelineError, PipelineSession, SessionBuilder, Spawn, ThreadSpawner, Ticket,
};
pub use transform::{Transform, Transformer};
pub use transport::{ErrorPayload, Operation, Request, Response, ResponsePayload};
