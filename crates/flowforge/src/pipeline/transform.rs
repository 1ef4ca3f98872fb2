//! The standard transforms behind every pipeline operation.
//!
//! Each operation records its stage timings in a [`Perf`].

use std::{sync::Arc, time::Instant};

use log::{debug, info, trace};

use flowforge_cfg::{build_flow_graph, parse_unit};
use flowforge_core::{flow::FlowGraph, model::DiagramModel};
use flowforge_parser::{DiagramBuilder, ImportResolver, parse_document};

use crate::{
    config::AppConfig,
    layout::{PositionedDiagram, layered_layout},
};

use super::options::{
    BuildDiagramOptions, DiagramResult, FlowGraphResult, ParseCodeOptions, ParseDslOptions, Perf,
    SourceType,
};

/// The three pipeline operations.
///
/// Implementations must be pure functions of their input so that a session
/// may run them on any thread.
pub trait Transform: Send + Sync {
    fn parse_code(&self, options: &ParseCodeOptions) -> FlowGraphResult;

    fn parse_dsl(&self, options: &ParseDslOptions) -> DiagramResult;

    fn build_diagram(&self, options: &BuildDiagramOptions) -> DiagramResult;
}

/// The standard [`Transform`] over the DSL parser, the CFG builder and the
/// layout engine.
#[derive(Default, Clone)]
pub struct Transformer {
    config: AppConfig,
    resolver: Option<Arc<dyn ImportResolver + Send + Sync>>,
}

impl Transformer {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            resolver: None,
        }
    }

    /// Follow DSL `import` statements through `resolver`.
    pub fn with_resolver(mut self, resolver: impl ImportResolver + Send + Sync + 'static) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn code_graph(&self, source: &str, language: &str, jsx: bool, perf: &mut Perf) -> FlowGraph {
        let started = Instant::now();
        let unit = parse_unit(source, language, jsx);
        perf.parse_ms = elapsed_ms(started);

        let unit = match unit {
            Ok(unit) => unit,
            Err(err) => {
                debug!(language = language; "No flow graph for source");
                return err.into_graph();
            }
        };

        let started = Instant::now();
        let graph = build_flow_graph(&unit);
        perf.transform_ms = elapsed_ms(started);
        graph
    }

    fn dsl_model(&self, options: &ParseDslOptions, perf: &mut Perf) -> DiagramModel {
        let started = Instant::now();
        let document = parse_document(&options.source);
        perf.parse_ms = elapsed_ms(started);

        let started = Instant::now();
        let mut builder = DiagramBuilder::new().with_scope(options.scope.clone());
        if let Some(resolver) = &self.resolver {
            builder = builder.with_resolver(resolver.as_ref());
        }
        let model = builder.build(&document);
        perf.transform_ms = elapsed_ms(started);
        model
    }

    fn layout(&self, model: &DiagramModel, perf: &mut Perf) -> PositionedDiagram {
        let started = Instant::now();
        let layout = layered_layout(model, self.config.layout());
        perf.layout_ms = Some(elapsed_ms(started));
        layout
    }
}

impl Transform for Transformer {
    fn parse_code(&self, options: &ParseCodeOptions) -> FlowGraphResult {
        info!(language = options.language.as_str(); "Parsing code");
        for feature in options.features.iter().filter(|feature| *feature != "jsx") {
            debug!(feature = feature.as_str(); "Ignoring unsupported feature");
        }

        let mut perf = Perf::default();
        let graph = self.code_graph(&options.source, &options.language, options.jsx(), &mut perf);
        debug!(
            nodes = graph.nodes.len(),
            edges = graph.edges.len(),
            diagnostics = graph.meta.diagnostics.len();
            "Flow graph built"
        );
        trace!(graph:?; "Built flow graph");

        FlowGraphResult {
            diagnostics: graph.meta.diagnostics.clone(),
            graph,
            perf,
        }
    }

    fn parse_dsl(&self, options: &ParseDslOptions) -> DiagramResult {
        info!(bytes = options.source.len(); "Parsing diagram source");

        let mut perf = Perf::default();
        let model = self.dsl_model(options, &mut perf);
        debug!(
            nodes = model.nodes.len(),
            edges = model.edges.len(),
            diagnostics = model.meta.diagnostics.len();
            "Diagram model built"
        );
        trace!(model:?; "Built diagram model");

        DiagramResult {
            diagnostics: model.meta.diagnostics.clone(),
            model,
            perf,
            layout: None,
        }
    }

    fn build_diagram(&self, options: &BuildDiagramOptions) -> DiagramResult {
        info!(source_type:? = options.source_type; "Building diagram");

        let mut perf = Perf::default();
        let mut model = match options.source_type {
            SourceType::Dsl => self.dsl_model(
                &ParseDslOptions::new(options.source.as_str()),
                &mut perf,
            ),
            SourceType::Code => {
                let language = options.language.as_deref().unwrap_or("js");
                let jsx = matches!(language.to_ascii_lowercase().as_str(), "jsx" | "tsx");
                self.code_graph(&options.source, language, jsx, &mut perf)
                    .to_diagram_model()
            }
        };

        if model.theme.is_none() {
            model.theme = options
                .theme()
                .or_else(|| self.config.style().theme())
                .map(str::to_string);
        }

        let layout = options
            .auto_layout()
            .then(|| self.layout(&model, &mut perf));
        debug!(
            nodes = model.nodes.len(),
            edges = model.edges.len(),
            laid_out = layout.is_some();
            "Diagram built"
        );

        DiagramResult {
            diagnostics: model.meta.diagnostics.clone(),
            model,
            perf,
            layout,
        }
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use flowforge_core::{error::DiagnosticCode, model::ModelSource};

    use super::*;
    use crate::pipeline::DiagramConfig;

    const CHECKOUT: &str = r#"
        diagram "Checkout" {
            node cart label "Cart"
            node pay label "Payment"
            cart -> pay
        }
    "#;

    #[test]
    fn test_build_diagram_from_dsl() {
        let result = Transformer::default().build_diagram(&BuildDiagramOptions::dsl(CHECKOUT));

        assert_eq!(result.model.nodes.len(), 2);
        assert_eq!(result.model.edges.len(), 1);
        assert!(result.diagnostics.is_empty());

        let layout = result.layout.unwrap();
        assert_eq!(layout.nodes.len(), 2);
        assert!(result.perf.layout_ms.is_some());
    }

    #[test]
    fn test_build_diagram_without_layout_uses_theme() {
        let options = BuildDiagramOptions::dsl(CHECKOUT).with_config(DiagramConfig {
            auto_layout: Some(false),
            theme: Some("ocean".to_string()),
        });
        let result = Transformer::default().build_diagram(&options);

        assert!(result.layout.is_none());
        assert!(result.perf.layout_ms.is_none());
        assert_eq!(result.model.theme.as_deref(), Some("ocean"));
    }

    #[test]
    fn test_declared_theme_wins() {
        let source = r#"diagram "A" { theme forest node a }"#;
        let options = BuildDiagramOptions::dsl(source).with_config(DiagramConfig {
            auto_layout: None,
            theme: Some("ocean".to_string()),
        });
        let result = Transformer::default().build_diagram(&options);
        assert_eq!(result.model.theme.as_deref(), Some("forest"));
    }

    #[test]
    fn test_build_diagram_from_code() {
        let options = BuildDiagramOptions::code("function f(x) { if (x) { a(); } }", "js");
        let result = Transformer::default().build_diagram(&options);

        assert_eq!(result.model.meta.source, ModelSource::Code);
        assert_eq!(result.model.id, "f");
        assert_eq!(
            result.layout.map(|layout| layout.nodes.len()),
            Some(result.model.nodes.len())
        );
    }

    #[test]
    fn test_parse_code_reports_unknown_language() {
        let result = Transformer::default().parse_code(&ParseCodeOptions::new("x", "cobol"));
        assert!(result.graph.is_empty());
        assert_eq!(result.diagnostics[0].code(), Some(DiagnosticCode::FC101));
    }

    #[test]
    fn test_parse_dsl_applies_scope() {
        let options = ParseDslOptions::new(r#"diagram "A" { node ${name} }"#)
            .with_variable("name", "server");
        let result = Transformer::default().parse_dsl(&options);

        assert!(result.model.node("server").is_some());
        assert!(result.layout.is_none());
    }
}
