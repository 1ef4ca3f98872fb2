use std::collections::{HashMap, HashSet, VecDeque};

use flowforge_cfg::parse_code;
use flowforge_core::{
    error::DiagnosticCode,
    flow::{FlowEdgeKind, FlowGraph, FlowNodeKind},
};

/// Node ids reachable from `from` along any edge.
fn reachable(graph: &FlowGraph, from: &str) -> HashSet<String> {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in &graph.edges {
        adjacency.entry(&edge.from).or_default().push(&edge.to);
    }

    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([from.to_string()]);
    while let Some(id) = queue.pop_front() {
        if !seen.insert(id.clone()) {
            continue;
        }
        for next in adjacency.get(id.as_str()).into_iter().flatten() {
            queue.push_back(next.to_string());
        }
    }
    seen
}

fn assert_single_start_and_end(graph: &FlowGraph) {
    assert_eq!(graph.nodes_of_kind(FlowNodeKind::Start).count(), 1);
    assert_eq!(graph.nodes_of_kind(FlowNodeKind::End).count(), 1);
}

#[test]
fn test_if_with_early_return() {
    let graph = parse_code("function f(x){ if (x) { return 1; } return 2; }", "js", false);
    assert_single_start_and_end(&graph);
    assert!(graph.meta.diagnostics.is_empty());

    let conditions: Vec<_> = graph.nodes_of_kind(FlowNodeKind::Condition).collect();
    assert_eq!(conditions.len(), 1);
    assert_eq!(conditions[0].label, "if (x)");

    let kinds: Vec<_> = graph.outgoing(&conditions[0].id).map(|edge| edge.kind).collect();
    assert_eq!(kinds, [FlowEdgeKind::True, FlowEdgeKind::False]);

    let end = graph.meta.exit_node_id.clone().unwrap();
    for edge in graph.outgoing(&conditions[0].id) {
        assert!(reachable(&graph, &edge.to).contains(&end));
    }
}

#[test]
fn test_while_loop() {
    let graph = parse_code("function f(){ while(x){ y(); } }", "js", false);
    assert_single_start_and_end(&graph);

    let loops: Vec<_> = graph.nodes_of_kind(FlowNodeKind::Loop).collect();
    assert_eq!(loops.len(), 1);
    let header = &loops[0].id;

    assert!(
        graph
            .incoming(header)
            .any(|edge| edge.kind == FlowEdgeKind::Loop)
    );

    let false_edges: Vec<_> = graph
        .outgoing(header)
        .filter(|edge| edge.kind == FlowEdgeKind::False)
        .collect();
    assert_eq!(false_edges.len(), 1);
    assert_eq!(graph.node(&false_edges[0].to).unwrap().label, "after loop");
}

#[test]
fn test_every_node_reaches_end() {
    let source = r#"
        export function process(items) {
            const results = [];
            for (const item of items) {
                if (!item) continue;
                try {
                    results.push(transform(item));
                } catch (err) {
                    if (fatal(err)) throw err;
                } finally {
                    release(item);
                }
            }
            do { flush(); } while (pending());
            return results;
        }
    "#;
    let graph = parse_code(source, "js", false);
    assert_single_start_and_end(&graph);
    assert_eq!(graph.meta.function_name.as_deref(), Some("process"));

    let end = graph.meta.exit_node_id.clone().unwrap();
    let from_start = reachable(&graph, &graph.meta.entry_node_id);
    assert_eq!(from_start.len(), graph.nodes.len());
    for node in &graph.nodes {
        assert!(
            reachable(&graph, &node.id).contains(&end),
            "node {} ({}) cannot reach the end",
            node.id,
            node.label
        );
    }
}

#[test]
fn test_ids_are_sequential() {
    let graph = parse_code("function f(a) { a(); if (a) { b(); } }", "js", false);
    for (index, node) in graph.nodes.iter().enumerate() {
        assert_eq!(node.id, format!("n{index}"));
    }
    for (index, edge) in graph.edges.iter().enumerate() {
        assert_eq!(edge.id, format!("e{index}"));
    }
}

#[test]
fn test_top_level_fallback() {
    let graph = parse_code("import fs from 'fs';\nconst x = read();\nif (x) { log(x); }", "js", false);
    assert_single_start_and_end(&graph);

    let codes: Vec<_> = graph.meta.diagnostics.iter().filter_map(|d| d.code()).collect();
    assert_eq!(codes, [DiagnosticCode::FC200]);
    assert_eq!(graph.nodes_of_kind(FlowNodeKind::Condition).count(), 1);
}

#[test]
fn test_dead_code_after_return() {
    let graph = parse_code("function f() {\n  return 1;\n  cleanup();\n}", "js", false);

    let diagnostic = &graph.meta.diagnostics[0];
    assert_eq!(diagnostic.code(), Some(DiagnosticCode::FC201));
    assert_eq!(diagnostic.location().map(|location| location.line), Some(3));
    assert!(graph.nodes.iter().all(|node| node.label != "expression"));
}

#[test]
fn test_syntax_error_yields_empty_graph() {
    let graph = parse_code("function f( {", "js", false);
    assert!(graph.is_empty());

    let diagnostic = &graph.meta.diagnostics[0];
    assert_eq!(diagnostic.code(), Some(DiagnosticCode::FC100));
    assert!(diagnostic.severity().is_error());
    assert!(diagnostic.location().is_some());
}

#[test]
fn test_unsupported_language() {
    let graph = parse_code("def f(): pass", "python", false);
    assert!(graph.is_empty());
    assert_eq!(graph.meta.diagnostics[0].code(), Some(DiagnosticCode::FC101));
}

#[test]
fn test_typescript_source() {
    let source = "function total(xs: number[]): number {\n  let sum = 0;\n  for (let i = 0; i < xs.length; i++) { sum += xs[i]; }\n  return sum;\n}";
    let graph = parse_code(source, "ts", false);
    assert!(graph.meta.diagnostics.is_empty());
    assert_eq!(graph.nodes_of_kind(FlowNodeKind::Loop).count(), 1);
    assert!(graph.nodes.iter().any(|node| node.label == "let i = 0"));
    assert!(graph.nodes.iter().any(|node| node.label == "i++"));
}

#[test]
fn test_adapts_into_diagram_model() {
    let graph = parse_code("function f(x){ while (x) { x--; } }", "js", false);
    let model = graph.to_diagram_model();

    assert_eq!(model.id, "f");
    assert_eq!(model.nodes.len(), graph.nodes.len());
    assert_eq!(model.edges.len(), graph.edges.len());
    assert!(model.edges.iter().any(|edge| edge.label.as_deref() == Some("loop")));
}

#[test]
fn test_exported_arrow_function() {
    let source = "import x from 'y';\nexport const f = (a) => { if (a) { return 1; } return 2; };\nfoo();";
    let graph = parse_code(source, "js", false);

    assert!(graph.meta.diagnostics.is_empty());
    assert_eq!(graph.meta.function_name.as_deref(), Some("f"));
    assert_eq!(graph.nodes_of_kind(FlowNodeKind::Condition).count(), 1);
    assert!(graph.nodes.iter().all(|node| node.label != "export"));
}

#[test]
fn test_exported_arrow_with_expression_body() {
    let source = "export const area = (r: number): number => Math.PI * r * r;";
    let graph = parse_code(source, "ts", false);

    assert_single_start_and_end(&graph);
    assert_eq!(graph.meta.function_name.as_deref(), Some("area"));
    assert!(graph.nodes.iter().any(|node| node.label == "return Math.PI * r * r"));
}
