//! Renderers consume a [`Snapshot`] and display it somewhere.
//!
//! The real visual dashboard lives elsewhere; the text view here is enough to
//! serve over HTTP and print from the CLI. Unavailable sources render as a
//! placeholder, never as an error.

use std::fmt::Write as _;
use std::io::Write as _;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

use crate::aggregate::{Snapshot, SourceEntry};
use crate::normalize::{pod_total, schema, NormalizedRow};
use crate::sources::types::{SourceKind, SourceResult};

pub trait Renderer: Send + Sync {
    /// Display `snapshot`. Must accept any mix of available and unavailable sources.
    fn render(&self, snapshot: Snapshot);
}

pub fn placeholder(kind: SourceKind) -> String {
    format!("No {} data available", kind.label())
}

/// Plain-text dashboard.
pub fn render_text(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "DevOps Monitoring Dashboard @ {}",
        snapshot.assembled_at().format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(
        out,
        "{}/{} sources available",
        snapshot.available_count(),
        snapshot.len()
    );

    for entry in snapshot.entries() {
        out.push('\n');
        render_section(&mut out, entry);
    }

    if let Some(h) = snapshot.host() {
        out.push('\n');
        let _ = writeln!(out, "== System Performance ==");
        let disk = h
            .disk_percent
            .map(|d| format!("{d:.1}%"))
            .unwrap_or_else(|| "n/a".to_string());
        let _ = writeln!(
            out,
            "CPU {:.1}% | Memory {:.1}% | Disk {}",
            h.cpu_percent, h.memory_percent, disk
        );
    }
    out
}

fn render_section(out: &mut String, entry: &SourceEntry) {
    let _ = writeln!(out, "== {} [{}] ==", entry.kind.label(), entry.source_id);
    match &entry.result {
        SourceResult::Unavailable { reason } => {
            let _ = writeln!(out, "{} ({reason})", placeholder(entry.kind));
        }
        SourceResult::Available { rows } if rows.is_empty() => {
            let _ = writeln!(out, "(no rows)");
        }
        SourceResult::Available { rows } => {
            if entry.kind == SourceKind::Cluster {
                let _ = writeln!(out, "Total pods: {}", pod_total(rows));
            }
            render_table(out, schema(entry.kind), rows);
        }
    }
}

fn render_table(out: &mut String, columns: &[&str], rows: &[NormalizedRow]) {
    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            columns
                .iter()
                .map(|c| r.get(c).map(ToString::to_string).unwrap_or_default())
                .collect()
        })
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            cells
                .iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(c.len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    write_row(out, columns.iter().copied(), &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    let _ = writeln!(out, "{}", rule.join("-+-"));
    for row in &cells {
        write_row(out, row.iter().map(String::as_str), &widths);
    }
}

fn write_row<'a>(out: &mut String, values: impl Iterator<Item = &'a str>, widths: &[usize]) {
    let parts: Vec<String> = values
        .zip(widths.iter().copied())
        .map(|(v, w)| format!("{v:<w$}"))
        .collect();
    let _ = writeln!(out, "{}", parts.join(" | ").trim_end());
}

/// JSON view: the snapshot plus a placeholder message per unavailable source.
pub fn render_json(snapshot: &Snapshot) -> Value {
    let sources: Vec<Value> = snapshot
        .entries()
        .iter()
        .map(|e| match &e.result {
            SourceResult::Available { rows } => json!({
                "source_id": e.source_id,
                "kind": e.kind,
                "state": "available",
                "columns": schema(e.kind),
                "rows": rows,
            }),
            SourceResult::Unavailable { reason } => json!({
                "source_id": e.source_id,
                "kind": e.kind,
                "state": "unavailable",
                "reason": reason,
                "message": placeholder(e.kind),
            }),
        })
        .collect();

    json!({
        "assembled_at": snapshot.assembled_at(),
        "sources": sources,
        "host": snapshot.host(),
    })
}

/// Latest rendered tick, as served by the HTTP layer.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedView {
    pub rendered_at: DateTime<Utc>,
    pub text: String,
    pub json: Value,
}

/// Shared slot holding only the most recent rendered view.
#[derive(Clone, Default)]
pub struct DashboardBoard {
    inner: Arc<RwLock<Option<RenderedView>>>,
}

impl DashboardBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, view: RenderedView) {
        let mut slot = match self.inner.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = Some(view);
    }

    pub fn latest(&self) -> Option<RenderedView> {
        match self.inner.read() {
            Ok(g) => g.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Renders each snapshot into a [`DashboardBoard`].
pub struct BoardRenderer {
    board: DashboardBoard,
}

impl BoardRenderer {
    pub fn new(board: DashboardBoard) -> Self {
        Self { board }
    }
}

impl Renderer for BoardRenderer {
    fn render(&self, snapshot: Snapshot) {
        self.board.publish(RenderedView {
            rendered_at: Utc::now(),
            text: render_text(&snapshot),
            json: render_json(&snapshot),
        });
    }
}

/// Prints the text dashboard to stdout.
pub struct StdoutRenderer;

impl Renderer for StdoutRenderer {
    fn render(&self, snapshot: Snapshot) {
        let text = render_text(&snapshot);
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = stdout.write_all(text.as_bytes()).and_then(|_| stdout.flush()) {
            tracing::warn!(error = %e, "stdout render failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::normalize;
    use chrono::TimeZone;

    fn entry(kind: SourceKind, result: SourceResult) -> SourceEntry {
        SourceEntry {
            source_id: kind.id().to_string(),
            kind,
            result,
        }
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn unavailable_sources_render_placeholders() {
        let snap = Snapshot::assemble(
            at(),
            SourceKind::ALL
                .iter()
                .map(|k| {
                    entry(
                        *k,
                        SourceResult::Unavailable {
                            reason: "network_error".into(),
                        },
                    )
                })
                .collect(),
            None,
        );
        let text = render_text(&snap);
        assert!(text.contains("0/4 sources available"));
        assert!(text.contains("No Jenkins data available (network_error)"));
        assert!(text.contains("No ArgoCD data available"));
        assert!(text.contains("No Docker Hub data available"));
        assert!(text.contains("No Kubernetes data available"));

        let v = render_json(&snap);
        assert_eq!(v["sources"].as_array().map(Vec::len), Some(4));
        assert_eq!(v["sources"][0]["state"], "unavailable");
    }

    #[test]
    fn tables_are_aligned_with_schema_headers() {
        let raw = serde_json::json!({ "items": [
            { "status": { "phase": "Running" } },
            { "status": { "phase": "Running" } },
            { "status": { "phase": "CrashLoopBackOff" } },
        ]});
        let rows = normalize(SourceKind::Cluster, &raw);
        let snap = Snapshot::assemble(
            at(),
            vec![entry(SourceKind::Cluster, SourceResult::available(rows))],
            None,
        );
        let text = render_text(&snap);
        assert!(text.contains("Total pods: 3"));
        assert!(text.contains("status           | count"));
        assert!(text.contains("Running          | 2"));
    }

    #[test]
    fn board_keeps_only_latest_view() {
        let board = DashboardBoard::new();
        assert!(board.latest().is_none());
        let r = BoardRenderer::new(board.clone());
        r.render(Snapshot::assemble(at(), vec![], None));
        r.render(Snapshot::assemble(
            at(),
            vec![entry(SourceKind::DockerHub, SourceResult::available(vec![]))],
            None,
        ));
        let latest = board.latest().expect("published");
        assert!(latest.text.contains("Docker Hub"));
        assert!(latest.text.contains("(no rows)"));
    }
}
