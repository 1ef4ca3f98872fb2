//! Flowforge Core Types
//!
//! Shared types for the Flowforge pipelines. It includes:
//!
//! - **Diagnostics**: Codes, severities and a collector ([`error`] module)
//! - **Positions**: Byte spans and line/column locations ([`span`] module)
//! - **Diagram model**: The renderer-agnostic output of both pipelines ([`model`] module)
//! - **Control flow**: Graphs extracted from source code ([`flow`] module)
//! - **Colors**: CSS color validation ([`color::Color`])

pub mod color;
pub mod error;
pub mod flow;
pub mod model;
pub mod span;
