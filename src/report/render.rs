//! Text and JSON rendering for reports and selection decisions.

use std::fmt::Write as _;

use crate::report::reporter::{HealthReport, HealthRow};
use crate::selection::SelectionDecision;

/// Longest detail shown in a table cell.
const DETAIL_WIDTH: usize = 60;

pub fn to_json<T: serde::Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}

/// Fixed-width table, configured rows first, followed by a summary line.
pub fn health_table(report: &HealthReport) -> String {
    let headers = ["BACKEND", "TARGET", "ORIGIN", "STATUS", "HTTP", "LATENCY", "DETAIL"];
    let cells: Vec<[String; 7]> = report.rows.iter().map(row_cells).collect();

    let mut widths = headers.map(str::len);
    for row in &cells {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_line(&mut out, &headers.map(String::from), &widths);
    for row in &cells {
        push_line(&mut out, row, &widths);
    }

    if report.rows.is_empty() {
        out.push_str("(no targets)\n");
    }
    let _ = write!(
        out,
        "\n{} scanned, {} unreachable",
        report.scanned, report.unreachable
    );
    if report.hidden_down > 0 {
        let _ = write!(out, ", {} down discovered hidden (use --all)", report.hidden_down);
    }
    if report.deadline_hit {
        out.push_str(", scan deadline hit (results partial)");
    }
    let _ = writeln!(out, " in {}ms", report.elapsed.as_millis());
    out
}

fn row_cells(row: &HealthRow) -> [String; 7] {
    [
        row.backend.clone().unwrap_or_else(|| "-".to_string()),
        format!("{}://{}", row.target.scheme, row.target),
        row.origin.as_str().to_string(),
        row.classification.to_string(),
        row.status.map_or_else(|| "-".to_string(), |s| s.to_string()),
        format!("{}ms", row.latency.as_millis()),
        row.detail.as_deref().map_or_else(|| "-".to_string(), |d| truncate(d, DETAIL_WIDTH)),
    ]
}

fn push_line(out: &mut String, cells: &[String; 7], widths: &[usize; 7]) {
    let line: Vec<String> = cells
        .iter()
        .zip(widths.iter())
        .map(|(cell, &w)| format!("{:<w$}", cell, w = w))
        .collect();
    out.push_str(line.join("  ").trim_end());
    out.push('\n');
}

fn truncate(s: &str, max: usize) -> String {
    let line = s.lines().next().unwrap_or_default();
    if line.chars().count() <= max {
        return line.to_string();
    }
    let cut: String = line.chars().take(max.saturating_sub(3)).collect();
    format!("{}...", cut)
}

/// Human summary of a selection: outcome, per-step lines, failure detail.
pub fn decision_text(decision: &SelectionDecision) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} {} ({}): {}",
        decision.backend,
        decision.endpoint,
        decision.classification,
        if decision.is_ready() { decision.summary() } else { "failed" }
    );

    for attempt in &decision.attempts {
        let _ = writeln!(out, "  plan {}:", attempt.kind);
        for result in &attempt.outcome.results {
            let mark = if result.success { "ok" } else { "FAILED" };
            let _ = writeln!(
                out,
                "    [{}] {} ({}ms)",
                mark,
                result.label,
                result.elapsed.as_millis()
            );
            if let Some(message) = &result.message {
                let _ = writeln!(out, "        {}", message);
            }
        }
    }

    if let Some(failed) = decision.failure() {
        let _ = writeln!(out, "error: {}", failed.detail().trim());
    }
    let _ = writeln!(out, "run id: {}", decision.run_id);
    out
}
