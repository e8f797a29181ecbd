//! Packet input: hex arguments, files and stdin.

use std::fs::File;
use std::io::{self, BufRead, BufReader};

use anyhow::{Context, Result};

use super::Args;

/// Hex packets from a reader: one per line, skipping blank lines and lines
/// starting with `#`.
pub fn read_packet_lines<R: BufRead>(reader: R) -> io::Result<Vec<String>> {
    let mut packets = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        packets.push(line.to_string());
    }
    Ok(packets)
}

/// Gather packets from `--file`, then positional arguments in order, with
/// `-` expanding to the packets on stdin.
pub fn collect_packets(args: &Args) -> Result<Vec<String>> {
    let mut packets = Vec::new();

    if let Some(path) = &args.file {
        let file = File::open(path)
            .with_context(|| format!("Failed to open packet file: {}", path.display()))?;
        let lines = read_packet_lines(BufReader::new(file))
            .with_context(|| format!("Failed to read packet file: {}", path.display()))?;
        packets.extend(lines);
    }

    for arg in &args.packets {
        if arg == "-" {
            let stdin = io::stdin();
            let lines = read_packet_lines(stdin.lock()).context("Failed to read stdin")?;
            packets.extend(lines);
        } else {
            packets.push(arg.clone());
        }
    }

    Ok(packets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_packet_lines_skips_comments() {
        let input = "# capture 1\nffff\n\n   \n  # indented comment\n  00 11 22  \n";
        let packets = read_packet_lines(input.as_bytes()).unwrap();
        assert_eq!(packets, vec!["ffff", "00 11 22"]);
    }
}
