//! pktscope CLI entry point.

use std::io::{self, Write};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pktscope::cli::{collect_packets, Args, OutputFormatter};
use pktscope_core::protocol::{default_registry, Protocol, ProtocolRegistry};
use pktscope_core::{dissect, parse_hex};

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Set up logging
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| args.log_filter().into()),
        )
        .init();

    let registry = default_registry();

    // Bindings last for the whole run; the guards restore the table on drop
    let _bindings: Vec<_> = args
        .ports
        .iter()
        .map(|spec| {
            let binding = registry.bind_port(&spec.layer, spec.port);
            if registry.get_parser(&spec.layer, u32::from(spec.port)).is_none() {
                warn!(layer = %spec.layer, port = spec.port, "no parser for layer; payloads will stay unclassified");
            }
            binding
        })
        .collect();

    // Handle info-only commands
    if args.is_info_only() {
        list_protocols(&registry);
        return Ok(());
    }

    let packets = collect_packets(&args)?;
    if packets.is_empty() {
        bail!("No packets given. Use --help for usage.");
    }
    info!(count = packets.len(), "dissecting packets");

    let formatter = OutputFormatter::new(args.format);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for (idx, text) in packets.iter().enumerate() {
        let bytes = parse_hex(text).with_context(|| format!("Packet {}: bad hex input", idx + 1))?;
        let dissection = dissect(&registry, &bytes, args.offset, args.start_layer.into());
        formatter
            .write(&dissection, &mut out)
            .context("Failed to write output")?;
    }
    out.flush().context("Failed to write output")?;

    Ok(())
}

fn list_protocols(registry: &ProtocolRegistry) {
    println!("Registered Protocol Parsers:");
    println!("{:-<50}", "");

    for (layer, type_code, parser) in registry.bindings() {
        println!(
            "  {} ({})  layer={layer} type={type_code:#06x}",
            parser.display_name(),
            parser.name()
        );

        let children = parser.child_layers();
        if !children.is_empty() {
            println!("    -> {}", children.join(", "));
        }
    }

    println!();
    println!("Port Bindings:");
    println!("{:-<50}", "");
    for (port, layer) in registry.ports().snapshot() {
        println!("  {port:>5}  {layer}");
    }
}
