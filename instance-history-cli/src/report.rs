//! Report generation
//!
//! Renders instance and node histories as a plain-text summary or as JSON.

use anyhow::Result;
use instance_history::{InstanceHistory, InstanceSetHistory, NodeSetHistory, Tenancy, Timestamp};
use serde::Serialize;
use std::fmt::{self, Write};

const RULE: &str = "═══════════════════════════════════════════════";
const THIN_RULE: &str = "───────────────────────────────────────────────";

fn format_time(timestamp: Timestamp) -> String {
    timestamp.format("%Y-%m-%d %H:%M").to_string()
}

fn instance_name(instance: &InstanceHistory) -> String {
    instance
        .reference
        .as_ref()
        .map(|r| r.name.clone())
        .unwrap_or_else(|| format!("#{}", instance.instance_id))
}

/// Render a human readable report
pub fn render_text(
    history: &InstanceSetHistory,
    nodes: &NodeSetHistory<'_>,
) -> std::result::Result<String, fmt::Error> {
    let mut out = String::new();
    let count = |tenancy: Tenancy| history.instances.iter().filter(|i| i.tenancy == tenancy).count();

    writeln!(out, "{}", RULE)?;
    writeln!(out, "  Instance History Report")?;
    writeln!(out, "{}\n", RULE)?;
    writeln!(
        out,
        "Window: {} .. {}",
        format_time(history.start),
        format_time(history.end)
    )?;

    writeln!(out, "\nInstances: {}", history.instances.len())?;
    writeln!(out, "  Sole-tenant: {}", count(Tenancy::SoleTenant))?;
    writeln!(out, "  Fleet:       {}", count(Tenancy::Fleet))?;
    writeln!(out, "  Unknown:     {}", count(Tenancy::Unknown))?;

    let incomplete: Vec<&InstanceHistory> = history
        .instances
        .iter()
        .filter(|i| !i.state.is_complete())
        .collect();
    if !incomplete.is_empty() {
        writeln!(out, "\nIncomplete instances:")?;
        for instance in incomplete {
            write!(out, "  {:<24} {}", instance_name(instance), instance.state)?;
            if let Some(dangling) = &instance.dangling_placement {
                write!(
                    out,
                    " (on {} since {}, end unknown)",
                    dangling.node_id,
                    format_time(dangling.from)
                )?;
            }
            writeln!(out)?;
        }
    }

    writeln!(out, "\nNodes: {}", nodes.nodes.len())?;
    writeln!(out, "{}", THIN_RULE)?;
    for node in &nodes.nodes {
        writeln!(
            out,
            "{:<24} {} .. {}  peak {}",
            node.node_id,
            format_time(node.first_use),
            format_time(node.last_use),
            node.peak_concurrent_placements
        )?;
        for placement in &node.placements {
            writeln!(
                out,
                "    {:<20} {} .. {}",
                instance_name(placement.instance),
                format_time(placement.from),
                format_time(placement.to)
            )?;
        }
    }

    Ok(out)
}

#[derive(Serialize)]
struct JsonReport<'a> {
    start: Timestamp,
    end: Timestamp,
    instances: &'a [InstanceHistory],
    nodes: &'a NodeSetHistory<'a>,
}

/// Render the full report as pretty-printed JSON
pub fn render_json(history: &InstanceSetHistory, nodes: &NodeSetHistory<'_>) -> Result<String> {
    let report = JsonReport {
        start: history.start,
        end: history.end,
        instances: &history.instances,
        nodes,
    };
    Ok(serde_json::to_string_pretty(&report)?)
}
