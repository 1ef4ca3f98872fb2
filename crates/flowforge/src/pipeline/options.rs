//! Request options and result types of the three pipeline operations.
//!
//! Field names follow the JSON transport contract (camelCase).

use serde::{Deserialize, Serialize};

use flowforge_core::{error::Diagnostic, flow::FlowGraph, model::DiagramModel};
use flowforge_parser::Variables;

use crate::layout::PositionedDiagram;

fn default_language() -> String {
    "js".to_string()
}

/// Options of a `parse-code` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseCodeOptions {
    pub source: String,

    /// `js` or `ts`; the usual file extensions are accepted too.
    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default, rename = "enableJSX")]
    pub enable_jsx: bool,

    /// Extra grammar features. Only `jsx` has an effect.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub features: Vec<String>,
}

impl ParseCodeOptions {
    pub fn new(source: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            language: language.into(),
            enable_jsx: false,
            features: Vec::new(),
        }
    }

    pub fn with_jsx(mut self, enable_jsx: bool) -> Self {
        self.enable_jsx = enable_jsx;
        self
    }

    /// Whether JSX syntax should be accepted, from the flag, the feature list
    /// or a `jsx`/`tsx` language name.
    pub fn jsx(&self) -> bool {
        self.enable_jsx
            || self.features.iter().any(|feature| feature == "jsx")
            || matches!(self.language.to_ascii_lowercase().as_str(), "jsx" | "tsx")
    }
}

/// Options of a `parse-dsl` request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseDslOptions {
    pub source: String,

    /// Variables visible to `${var}` interpolation.
    #[serde(default, skip_serializing_if = "Variables::is_empty")]
    pub scope: Variables,
}

impl ParseDslOptions {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            scope: Variables::new(),
        }
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.scope.insert(name.into(), value.into());
        self
    }
}

/// The input language of a `build-diagram` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Code,
    Dsl,
}

/// Options of a `build-diagram` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildDiagramOptions {
    pub source_type: SourceType,

    pub source: String,

    /// Language of `code` sources; `js` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<DiagramConfig>,
}

impl BuildDiagramOptions {
    pub fn dsl(source: impl Into<String>) -> Self {
        Self {
            source_type: SourceType::Dsl,
            source: source.into(),
            language: None,
            config: None,
        }
    }

    pub fn code(source: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            source_type: SourceType::Code,
            source: source.into(),
            language: Some(language.into()),
            config: None,
        }
    }

    pub fn with_config(mut self, config: DiagramConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Whether the layout engine should run; defaults to `true`.
    pub fn auto_layout(&self) -> bool {
        self.config
            .as_ref()
            .and_then(|config| config.auto_layout)
            .unwrap_or(true)
    }

    pub fn theme(&self) -> Option<&str> {
        self.config
            .as_ref()
            .and_then(|config| config.theme.as_deref())
    }
}

/// Per-request diagram settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_layout: Option<bool>,

    /// Used when the source declares no theme.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
}

/// Stage timings in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Perf {
    pub parse_ms: f64,
    pub transform_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout_ms: Option<f64>,
}

/// Result of `parse-code`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowGraphResult {
    pub graph: FlowGraph,
    pub diagnostics: Vec<Diagnostic>,
    pub perf: Perf,
}

/// Result of `parse-dsl` and `build-diagram`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramResult {
    pub model: DiagramModel,
    pub diagnostics: Vec<Diagnostic>,
    pub perf: Perf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<PositionedDiagram>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_code_options_from_json() {
        let options: ParseCodeOptions =
            serde_json::from_str(r#"{"source": "f()", "enableJSX": true}"#).unwrap();
        assert_eq!(options.language, "js");
        assert!(options.enable_jsx);
        assert!(options.jsx());

        let options: ParseCodeOptions =
            serde_json::from_str(r#"{"source": "", "language": "ts", "features": ["jsx"]}"#)
                .unwrap();
        assert!(options.jsx());
        assert!(!ParseCodeOptions::new("", "ts").jsx());
        assert!(ParseCodeOptions::new("", "tsx").jsx());
    }

    #[test]
    fn test_build_diagram_defaults() {
        let options: BuildDiagramOptions =
            serde_json::from_str(r#"{"sourceType": "dsl", "source": "diagram \"A\" {}"}"#)
                .unwrap();
        assert_eq!(options.source_type, SourceType::Dsl);
        assert!(options.auto_layout());
        assert_eq!(options.theme(), None);

        let options = options.with_config(DiagramConfig {
            auto_layout: Some(false),
            theme: Some("dark".to_string()),
        });
        assert!(!options.auto_layout());
        assert_eq!(options.theme(), Some("dark"));
    }

    #[test]
    fn test_perf_serializes_camel_case() {
        let perf = Perf {
            parse_ms: 1.5,
            transform_ms: 0.25,
            layout_ms: None,
        };
        let json = serde_json::to_value(perf).unwrap();
        assert_eq!(json["parseMs"], 1.5);
        assert_eq!(json["transformMs"], 0.25);
        assert!(json.get("layoutMs").is_none());
    }
}
