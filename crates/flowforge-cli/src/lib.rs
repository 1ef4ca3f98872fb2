//! CLI logic for the Flowforge flowchart tool.
//!
//! Two modes are supported:
//!
//! - **File mode** converts one input file into Mermaid text, the JSON
//!   result, or the computed layout.
//! - **Serve mode** (`--serve`) reads JSON requests from standard input, one
//!   per line, and answers each with one JSON response line.

pub mod error_adapter;

mod args;
mod config;

pub use args::{Args, OutputFormat};

use std::{
    fs,
    io::{self, BufRead, Write},
    path::Path,
};

use log::{debug, info, warn};
use serde::Deserialize;

use flowforge::{
    FlowforgeError, check_diagnostics,
    config::AppConfig,
    diagnostics::Diagnostic,
    export::{diagram_to_mermaid, flow_graph_to_mermaid},
    pipeline::{
        BuildDiagramOptions, DiagramConfig, FileImportResolver, ParseCodeOptions,
        PipelineSession, Request, Response, Ticket, Transformer,
    },
    read_source,
};

const CODE_EXTENSIONS: &[&str] = &["js", "jsx", "mjs", "cjs", "ts", "tsx", "mts", "cts"];

/// Run the Flowforge CLI application
///
/// # Errors
///
/// Returns `FlowforgeError` for:
/// - File I/O errors
/// - Configuration loading errors
/// - Pipeline failures
/// - Error-severity diagnostics in the input, after the output is written
pub fn run(args: &Args) -> Result<(), FlowforgeError> {
    let app_config = config::load_config(args.config.as_ref())?;

    if args.serve {
        let session = PipelineSession::from_config(&app_config);
        return serve(&session, io::stdin().lock(), io::stdout().lock());
    }

    let Some(input) = args.input.as_deref() else {
        return Err(FlowforgeError::Config(
            "an input file is required unless --serve is given".to_string(),
        ));
    };
    info!(input_path = input, format:? = args.format; "Processing input");

    let source = read_source(input)?;
    let session = session_for(&app_config, Path::new(input));
    let language = args
        .language
        .clone()
        .or_else(|| code_language(Path::new(input)));

    let (output, diagnostics) = match language {
        Some(language) => convert_code(&session, args, source.clone(), language, &app_config)?,
        None => convert_dsl(&session, args, source.clone(), &app_config)?,
    };

    match &args.output {
        Some(path) => {
            fs::write(path, output)?;
            info!(output_file = path.as_str(); "Output written");
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(output.as_bytes())?;
            stdout.flush()?;
        }
    }

    report(&diagnostics);
    check_diagnostics(&diagnostics, &source)
}

/// Answer transport requests read line by line from `input`.
///
/// Blank lines are skipped. A line that is not a valid request gets an
/// error response carrying its `id` when one can be found, otherwise `0`.
///
/// # Errors
///
/// Returns `FlowforgeError` if reading or writing fails.
pub fn serve(
    session: &PipelineSession,
    input: impl BufRead,
    mut output: impl Write,
) -> Result<(), FlowforgeError> {
    info!("Serving requests");
    let mut served = 0_usize;

    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let response = match decode_request(&line) {
            Ok(request) => session.handle(request),
            Err((id, err)) => {
                warn!(id, err:%; "Malformed request");
                Response::error(id, format!("malformed request: {err}"))
            }
        };

        serde_json::to_writer(&mut output, &response)?;
        writeln!(output)?;
        output.flush()?;
        served += 1;
    }

    info!(served; "Input closed");
    Ok(())
}

fn decode_request(line: &str) -> Result<Request, (u64, serde_json::Error)> {
    let value: serde_json::Value = serde_json::from_str(line).map_err(|err| (0, err))?;
    let id = value.get("id").and_then(serde_json::Value::as_u64).unwrap_or(0);
    Request::deserialize(value).map_err(|err| (id, err))
}

fn session_for(config: &AppConfig, input: &Path) -> PipelineSession {
    let transform =
        Transformer::new(config.clone()).with_resolver(FileImportResolver::for_file(input));
    PipelineSession::builder()
        .with_policy(config.pipeline().policy())
        .with_transform(transform)
        .build()
}

/// The language named by a code file's extension.
fn code_language(path: &Path) -> Option<String> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    CODE_EXTENSIONS
        .contains(&extension.as_str())
        .then_some(extension)
}

fn convert_code(
    session: &PipelineSession,
    args: &Args,
    source: String,
    language: String,
    config: &AppConfig,
) -> Result<(String, Vec<Diagnostic>), FlowforgeError> {
    debug!(language = language.as_str(); "Input is source code");
    match args.format {
        OutputFormat::Mermaid | OutputFormat::Json => {
            let result = wait(session.parse_code(ParseCodeOptions::new(source, language)), config)?;
            let output = match args.format {
                OutputFormat::Mermaid => flow_graph_to_mermaid(&result.graph),
                _ => serde_json::to_string_pretty(&result)? + "\n",
            };
            Ok((output, result.diagnostics))
        }
        OutputFormat::Layout => {
            let options = BuildDiagramOptions::code(source, language)
                .with_config(diagram_config(args, true));
            let result = wait(session.build_diagram(options), config)?;
            let output = serde_json::to_string_pretty(&result.layout.unwrap_or_default())? + "\n";
            Ok((output, result.diagnostics))
        }
    }
}

fn convert_dsl(
    session: &PipelineSession,
    args: &Args,
    source: String,
    config: &AppConfig,
) -> Result<(String, Vec<Diagnostic>), FlowforgeError> {
    debug!("Input is a diagram");
    let auto_layout = args.format != OutputFormat::Mermaid;
    let options = BuildDiagramOptions::dsl(source).with_config(diagram_config(args, auto_layout));
    let result = wait(session.build_diagram(options), config)?;

    let output = match args.format {
        OutputFormat::Mermaid => diagram_to_mermaid(&result.model),
        OutputFormat::Json => serde_json::to_string_pretty(&result)? + "\n",
        OutputFormat::Layout => {
            serde_json::to_string_pretty(&result.layout.clone().unwrap_or_default())? + "\n"
        }
    };
    Ok((output, result.diagnostics))
}

fn diagram_config(args: &Args, auto_layout: bool) -> DiagramConfig {
    DiagramConfig {
        auto_layout: Some(auto_layout),
        theme: args.theme.clone(),
    }
}

fn wait<T>(ticket: Ticket<T>, config: &AppConfig) -> Result<T, FlowforgeError>
where
    T: TryFrom<flowforge::pipeline::ResponsePayload, Error = flowforge::pipeline::PipelineError>,
{
    let result = match config.pipeline().request_timeout() {
        Some(timeout) => ticket.wait_timeout(timeout),
        None => ticket.wait(),
    };
    Ok(result?)
}

/// Log warnings and infos; errors are reported by the caller.
fn report(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        let severity = diagnostic.severity();
        if severity.is_warning() {
            warn!("{diagnostic}");
        } else if severity.is_info() {
            info!("{diagnostic}");
        }
    }
}
