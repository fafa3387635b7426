//! pyc-dis
//!
//! Field-by-field disassembly of `.pyc` files and bare marshal streams.
//! The binary is a thin wrapper; rendering lives here so it can be tested.

use std::io::{self, Write};

use anyhow::Context;
use pyc_marshal::{
    decode_marshal_with, decode_pyc_with, DecodeOptions, Field, Graph, Header, TraceEvent,
    TraceValue, Value,
};
use tracing::{debug, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize logging with a default filter.
///
/// Use `RUST_LOG` environment variable to override the default filter.
/// Logs go to stderr, next to the disassembly.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// How trace events are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// Indented `(<len>) <field> = <value>` lines.
    #[default]
    Human,
    /// One JSON object per event.
    Json,
}

/// What to decode and how to show it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Config {
    /// Input is a bare marshal payload without the 16-byte preamble.
    pub bare: bool,
    pub format: Format,
    /// Skip the event listing; print only the summary.
    pub quiet: bool,
    pub options: DecodeOptions,
}

/// Decodes `input`, writing its events and a root summary to `out`.
///
/// Events recorded before a decode failure are written before the error is
/// returned.
pub fn disassemble<W: Write>(input: &[u8], config: &Config, out: &mut W) -> anyhow::Result<()> {
    let mut events: Vec<TraceEvent<'_>> = Vec::new();
    let result = if config.bare {
        decode_marshal_with(input, config.options, &mut events).map(|graph| (None, graph))
    } else {
        decode_pyc_with(input, config.options, &mut events).map(|pyc| (Some(pyc.header), pyc.graph))
    };
    debug!(events = events.len(), ok = result.is_ok(), "decode finished");

    if !config.quiet {
        render_events(&events, config.format, out).context("failed to write events")?;
    }

    let kind = if config.bare { "marshal stream" } else { "pyc file" };
    let (header, graph) = result.with_context(|| format!("failed to decode {kind}"))?;
    if let Some(header) = header {
        check_layout(&header);
    }
    writeln!(out, "{}", summarize(&graph)).context("failed to write summary")?;
    Ok(())
}

fn check_layout(header: &Header) {
    if header.code_layout_matches() {
        return;
    }
    match header.python_version() {
        Some((major, minor)) => warn!(
            magic = header.bytecode_magic(),
            "written by {major}.{minor}; code objects may not follow the 3.8-3.10 layout"
        ),
        None => warn!(magic = header.bytecode_magic(), "unrecognized bytecode magic"),
    }
}

/// Writes every event in the given format.
pub fn render_events<W: Write>(events: &[TraceEvent<'_>], format: Format, out: &mut W) -> io::Result<()> {
    for event in events {
        match format {
            Format::Human => writeln!(out, "{}", render_event(event))?,
            Format::Json => {
                serde_json::to_writer(&mut *out, event)?;
                writeln!(out)?;
            }
        }
    }
    Ok(())
}

/// Formats one event as an indented line.
///
/// Slot markers print as `<field> =` with the slot's content on the
/// following, deeper lines.
pub fn render_event(event: &TraceEvent<'_>) -> String {
    let indent = "    ".repeat(event.depth);
    let field = field_name(&event.field);
    match &event.value {
        TraceValue::Slot => format!("{indent}    {field} ="),
        value => format!("{indent}({}) {field} = {}", event.len, render_value(&event.field, value)),
    }
}

fn field_name(field: &Field) -> String {
    match field {
        Field::Header(name) | Field::Code(name) => (*name).to_string(),
        Field::Type => "type".to_string(),
        Field::Value => "val".to_string(),
        Field::Length => "len".to_string(),
        Field::Real => "real".to_string(),
        Field::Imag => "imag".to_string(),
        Field::Item(i) => format!("item[{i}]"),
        Field::Key(i) => format!("dkey[{i}]"),
        Field::DictValue(i) => format!("dval[{i}]"),
        Field::RefIndex => "ref".to_string(),
    }
}

fn render_value(field: &Field, value: &TraceValue<'_>) -> String {
    match value {
        TraceValue::Slot => String::new(),
        TraceValue::Tag { tag, referenceable } => {
            let flag = if *referenceable { " | FLAG_REF" } else { "" };
            format!("{:?} ({}){flag}", tag.as_u8() as char, tag.name())
        }
        TraceValue::Int(v) => v.to_string(),
        TraceValue::Flags(v) => format!("{v:#010x}"),
        TraceValue::Float(v) => format!("{:016x} ({v:?})", v.to_bits()),
        TraceValue::FloatText { text, value } => format!("{text:?} ({value:?})"),
        // Preamble bytes are digests, not text.
        TraceValue::Bytes(bytes) if matches!(field, Field::Header(_)) => hex(bytes),
        TraceValue::Bytes(bytes) => format!("b\"{}\"", bytes.escape_ascii()),
        TraceValue::Text(text) => format!("{text:?}"),
        TraceValue::Mode(kind) => kind.name().to_string(),
        TraceValue::Ref { index, target } => format!("{index} -> {target}"),
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// One line describing the decoded root.
pub fn summarize(graph: &Graph<'_>) -> String {
    let root = graph.root();
    let value = graph.get(root);
    let detail = match value {
        Value::Code(code) => match graph.get(code.name).as_str() {
            Some(name) => format!(" {name:?}"),
            None => String::new(),
        },
        Value::Tuple(items)
        | Value::List(items)
        | Value::Set(items)
        | Value::FrozenSet(items) => format!(" of {} items", items.len()),
        Value::Dict(entries) => format!(" of {} entries", entries.len()),
        Value::Bool(v) => format!(" {v}"),
        Value::Int32(_) | Value::Int64(_) => value
            .as_int()
            .map(|v| format!(" {v}"))
            .unwrap_or_default(),
        Value::Float64(v) => format!(" {v:?}"),
        Value::Text(s) => format!(" {s:?}"),
        Value::Bytes(b) => format!(" of {} bytes", b.len()),
        _ => String::new(),
    };
    let mut slots = vec![0usize; graph.len()];
    slots[root.index()] += 1;
    for (_, node) in graph.iter() {
        for child in node.children() {
            slots[child.index()] += 1;
        }
    }
    let shared = slots.iter().filter(|&&n| n > 1).count();
    format!(
        "root {root}: {}{detail} ({} nodes, {shared} shared)",
        value.kind(),
        graph.len()
    )
}
