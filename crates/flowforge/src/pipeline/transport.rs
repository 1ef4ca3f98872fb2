//! The message contract between a caller and a pipeline worker.
//!
//! Requests and responses are JSON objects tagged by `type`:
//!
//! ```json
//! {"type": "parse-dsl", "id": 7, "payload": {"source": "diagram \"A\" {}"}}
//! {"type": "success", "id": 7, "payload": {"model": {}, "diagnostics": [], "perf": {}}}
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{
    PipelineError, Transform,
    options::{BuildDiagramOptions, DiagramResult, FlowGraphResult, ParseCodeOptions, ParseDslOptions},
};

/// The kind of work a [`Request`] asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ParseCode,
    ParseDsl,
    BuildDiagram,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::ParseCode => "parse-code",
            Operation::ParseDsl => "parse-dsl",
            Operation::BuildDiagram => "build-diagram",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Request {
    ParseCode { id: u64, payload: ParseCodeOptions },
    ParseDsl { id: u64, payload: ParseDslOptions },
    BuildDiagram { id: u64, payload: BuildDiagramOptions },
}

impl Request {
    pub fn id(&self) -> u64 {
        match self {
            Request::ParseCode { id, .. }
            | Request::ParseDsl { id, .. }
            | Request::BuildDiagram { id, .. } => *id,
        }
    }

    pub(crate) fn set_id(&mut self, new_id: u64) {
        match self {
            Request::ParseCode { id, .. }
            | Request::ParseDsl { id, .. }
            | Request::BuildDiagram { id, .. } => *id = new_id,
        }
    }

    pub fn operation(&self) -> Operation {
        match self {
            Request::ParseCode { .. } => Operation::ParseCode,
            Request::ParseDsl { .. } => Operation::ParseDsl,
            Request::BuildDiagram { .. } => Operation::BuildDiagram,
        }
    }

    /// Run the request against `transform`.
    pub fn execute(&self, transform: &dyn Transform) -> ResponsePayload {
        match self {
            Request::ParseCode { payload, .. } => {
                ResponsePayload::FlowGraph(transform.parse_code(payload))
            }
            Request::ParseDsl { payload, .. } => {
                ResponsePayload::Diagram(transform.parse_dsl(payload))
            }
            Request::BuildDiagram { payload, .. } => {
                ResponsePayload::Diagram(transform.build_diagram(payload))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Response {
    Success { id: u64, payload: ResponsePayload },
    Error { id: u64, payload: ErrorPayload },
}

impl Response {
    pub fn error(id: u64, message: impl Into<String>) -> Self {
        Response::Error {
            id,
            payload: ErrorPayload {
                message: message.into(),
            },
        }
    }

    pub fn id(&self) -> u64 {
        match self {
            Response::Success { id, .. } | Response::Error { id, .. } => *id,
        }
    }

    pub(crate) fn with_id(self, id: u64) -> Self {
        match self {
            Response::Success { payload, .. } => Response::Success { id, payload },
            Response::Error { payload, .. } => Response::Error { id, payload },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Response::Success { .. })
    }
}

/// Result of a successful request. Distinguished by its `model` or `graph`
/// field on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponsePayload {
    Diagram(DiagramResult),
    FlowGraph(FlowGraphResult),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
}

impl TryFrom<ResponsePayload> for DiagramResult {
    type Error = PipelineError;

    fn try_from(payload: ResponsePayload) -> Result<Self, Self::Error> {
        match payload {
            ResponsePayload::Diagram(result) => Ok(result),
            ResponsePayload::FlowGraph(_) => Err(PipelineError::ProtocolMismatch),
        }
    }
}

impl TryFrom<ResponsePayload> for FlowGraphResult {
    type Error = PipelineError;

    fn try_from(payload: ResponsePayload) -> Result<Self, Self::Error> {
        match payload {
            ResponsePayload::FlowGraph(result) => Ok(result),
            ResponsePayload::Diagram(_) => Err(PipelineError::ProtocolMismatch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Transformer;

    #[test]
    fn test_request_from_json() {
        let request: Request = serde_json::from_str(
            r#"{"type": "build-diagram", "id": 3, "payload": {"sourceType": "code", "source": "f()", "language": "ts"}}"#,
        )
        .unwrap();

        assert_eq!(request.id(), 3);
        assert_eq!(request.operation(), Operation::BuildDiagram);
        assert_eq!(request.operation().to_string(), "build-diagram");
    }

    #[test]
    fn test_response_round_trips_through_json() {
        let request = Request::ParseCode {
            id: 9,
            payload: ParseCodeOptions::new("function f() { g(); }", "js"),
        };
        let response = Response::Success {
            id: request.id(),
            payload: request.execute(&Transformer::default()),
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.starts_with(r#"{"type":"success","id":9"#));

        let decoded: Response = serde_json::from_str(&json).unwrap();
        let Response::Success { payload, .. } = decoded else {
            panic!("expected a success response");
        };
        assert!(matches!(payload, ResponsePayload::FlowGraph(_)));
    }

    #[test]
    fn test_error_response_shape() {
        let json = serde_json::to_value(Response::error(4, "boom")).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["id"], 4);
        assert_eq!(json["payload"]["message"], "boom");
    }

    #[test]
    fn test_payload_conversion_checks_the_variant() {
        let payload = Request::ParseDsl {
            id: 1,
            payload: ParseDslOptions::new(r#"diagram "A" { node a }"#),
        }
        .execute(&Transformer::default());

        assert!(FlowGraphResult::try_from(payload.clone()).is_err());
        assert_eq!(DiagramResult::try_from(payload).unwrap().model.nodes.len(), 1);
    }
}
