//! Text views of a payload: the indented field tree, the citation block and
//! terminal drawings of a [`ChartSpec`].

use std::fmt::Write as _;

use serde_json::Value;

use crate::chart::{label_text, ChartKind, ChartSpec};

const CITATION_KEY: &str = "citation";
const BAR_WIDTH: usize = 30;
const SPARKS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub label: String,
    /// Set for primitive leaves only.
    pub value: Option<String>,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    fn leaf(label: String, value: String) -> Self {
        Self {
            label,
            value: Some(value),
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CitationView {
    Text(String),
    Fields(Vec<(String, String)>),
}

/// String form of a primitive: strings unquoted, `null` spelled out.
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn node(label: String, value: &Value) -> TreeNode {
    match value {
        Value::Object(_) | Value::Array(_) => TreeNode {
            label,
            value: None,
            children: children(value),
        },
        scalar => TreeNode::leaf(label, scalar_text(scalar)),
    }
}

fn children(value: &Value) -> Vec<TreeNode> {
    match value {
        Value::Object(fields) => fields.iter().map(|(k, v)| node(k.clone(), v)).collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| node(i.to_string(), v))
            .collect(),
        _ => Vec::new(),
    }
}

/// Tree of every payload field except the top-level citation.
pub fn build_tree(payload: &Value) -> Vec<TreeNode> {
    match payload {
        Value::Object(fields) => fields
            .iter()
            .filter(|(key, _)| key.as_str() != CITATION_KEY)
            .map(|(key, value)| node(key.clone(), value))
            .collect(),
        Value::Array(_) => children(payload),
        scalar => vec![TreeNode::leaf("value".to_string(), scalar_text(scalar))],
    }
}

pub fn citation_view(payload: &Value) -> Option<CitationView> {
    match payload.as_object()?.get(CITATION_KEY)? {
        Value::Null => None,
        Value::String(text) => Some(CitationView::Text(text.clone())),
        Value::Object(fields) => Some(CitationView::Fields(
            fields
                .iter()
                .map(|(key, value)| (key.clone(), label_text(value)))
                .collect(),
        )),
        other => Some(CitationView::Text(other.to_string())),
    }
}

fn write_nodes(out: &mut String, nodes: &[TreeNode], depth: usize) {
    for node in nodes {
        let indent = "  ".repeat(depth);
        match &node.value {
            Some(value) => {
                let _ = writeln!(out, "{}{}: {}", indent, node.label, value);
            }
            None => {
                let _ = writeln!(out, "{}{}:", indent, node.label);
                write_nodes(out, &node.children, depth + 1);
            }
        }
    }
}

pub fn render_tree(nodes: &[TreeNode]) -> String {
    let mut out = String::new();
    write_nodes(&mut out, nodes, 0);
    out
}

pub fn render_citation(citation: &CitationView) -> String {
    match citation {
        CitationView::Text(text) => format!("Source: {}\n", text),
        CitationView::Fields(fields) => {
            let mut out = String::from("Source:\n");
            for (key, value) in fields {
                let _ = writeln!(out, "  {}: {}", key, value);
            }
            out
        }
    }
}

fn bar(value: f64, max: f64) -> String {
    if max <= 0.0 || value <= 0.0 {
        return String::new();
    }
    let cells = ((value / max) * BAR_WIDTH as f64).round() as usize;
    "█".repeat(cells.clamp(1, BAR_WIDTH))
}

fn sparkline(series: &[f64]) -> String {
    let min = series.iter().copied().fold(f64::INFINITY, f64::min);
    let max = series.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;
    series
        .iter()
        .map(|v| {
            if span <= 0.0 {
                SPARKS[SPARKS.len() / 2]
            } else {
                let idx = (((v - min) / span) * (SPARKS.len() - 1) as f64).round() as usize;
                SPARKS[idx.min(SPARKS.len() - 1)]
            }
        })
        .collect()
}

pub fn render_chart(chart: &ChartSpec) -> String {
    let mut out = String::new();
    let field = chart.field.as_deref().unwrap_or("?");
    match chart.kind {
        ChartKind::None => out.push_str("No chart available\n"),
        ChartKind::Pie => {
            let _ = writeln!(out, "Pie chart of '{}'", field);
            let total: f64 = chart.series.iter().sum();
            let max = chart.series.iter().copied().fold(0.0, f64::max);
            let labels = chart.labels.as_deref().unwrap_or(&[]);
            let width = labels.iter().map(|l| l.chars().count()).max().unwrap_or(0);
            for (i, value) in chart.series.iter().enumerate() {
                let label = labels.get(i).map(String::as_str).unwrap_or("");
                let share = if total > 0.0 { value / total * 100.0 } else { 0.0 };
                let _ = writeln!(
                    out,
                    "  {:<width$}  {:>8} {:>5.1}% {}",
                    label,
                    value,
                    share,
                    bar(*value, max),
                    width = width
                );
            }
        }
        ChartKind::Bar => {
            let _ = writeln!(out, "Bar chart of '{}'", field);
            let max = chart.series.iter().copied().fold(0.0, f64::max);
            let width = chart.series.len().to_string().len() + 1;
            for (i, value) in chart.series.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "  {:>width$} {} {}",
                    format!("#{}", i + 1),
                    bar(*value, max),
                    value,
                    width = width
                );
            }
        }
        ChartKind::Line => {
            let _ = writeln!(out, "Line chart of '{}'", field);
            let min = chart.series.iter().copied().fold(f64::INFINITY, f64::min);
            let max = chart.series.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let _ = writeln!(out, "  {}", sparkline(&chart.series));
            let _ = writeln!(out, "  min {}  max {}  points {}", min, max, chart.series.len());
        }
    }
    out
}
