//! Output formatting for dissections.
//!
//! The tree format indents one level per node and tags each line with its
//! byte range, so fields can be matched against a hex dump by eye. The JSON
//! formats emit the serialized [`Dissection`] as-is.

use std::io::{self, Write};

use clap::ValueEnum;

use pktscope_core::{Dissection, FieldNode, FieldValue};

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Indented field tree (default)
    Tree,
    /// Pretty-printed JSON, one document per packet
    Json,
    /// JSON Lines (one JSON object per packet)
    Jsonl,
}

/// Formats dissections for output.
pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    /// Create a new formatter with the specified format.
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Format a dissection and write it to the given writer.
    pub fn write<W: Write>(&self, dissection: &Dissection, writer: &mut W) -> io::Result<()> {
        match self.format {
            OutputFormat::Tree => self.write_tree(dissection, writer),
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut *writer, dissection)?;
                writeln!(writer)
            }
            OutputFormat::Jsonl => {
                serde_json::to_writer(&mut *writer, dissection)?;
                writeln!(writer)
            }
        }
    }

    fn write_tree<W: Write>(&self, dissection: &Dissection, writer: &mut W) -> io::Result<()> {
        write_node(&dissection.tree, 0, writer)?;

        if let Some(err) = &dissection.error {
            writeln!(writer, "  !! {err}")?;
        }
        if let Some(raw) = &dissection.unclassified {
            match &raw.reason {
                Some(reason) => writeln!(
                    writer,
                    "  -- {} unclassified bytes at offset {}: {reason}",
                    raw.length, raw.offset
                )?,
                None => writeln!(
                    writer,
                    "  -- {} unclassified bytes at offset {}",
                    raw.length, raw.offset
                )?,
            }
        }
        writeln!(writer)
    }
}

fn write_node<W: Write>(node: &FieldNode, depth: usize, writer: &mut W) -> io::Result<()> {
    let indent = depth * 2;
    let range = match node.bits {
        Some(b) => format!(
            "[{}..{} bits {}..{}]",
            node.offset,
            node.end(),
            b.start,
            u16::from(b.start) + u16::from(b.len)
        ),
        None => format!("[{}..{}]", node.offset, node.end()),
    };
    match &node.value {
        FieldValue::Empty => writeln!(writer, "{:indent$}{} {range}", "", node.name)?,
        value => writeln!(writer, "{:indent$}{}: {value} {range}", "", node.name)?,
    }
    for child in &node.children {
        write_node(child, depth + 1, writer)?;
    }
    Ok(())
}
