use std::fmt;

use serde_json::Value;
use tracing::{debug, warn};

use crate::chart::{derive_chart, ChartError, ChartSpec};
use crate::render::{self, CitationView, TreeNode};

/// Everything a response card shows for one payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Visualization {
    pub title: Option<String>,
    pub chart: ChartSpec,
    pub tree: Vec<TreeNode>,
    pub citation: Option<CitationView>,
}

/// Derives the chart, tree and citation views of a payload.
///
/// Never fails: a payload whose chart data cannot be derived still gets its
/// tree and citation, with the chart reported as unavailable.
pub fn visualize(payload: &Value) -> Visualization {
    let chart = chart_or_none(derive_chart(payload));
    debug!(
        kind = %chart.kind,
        field = ?chart.field,
        points = chart.series.len(),
        "Derived chart"
    );

    Visualization {
        title: payload
            .get("title")
            .and_then(Value::as_str)
            .map(str::to_string),
        chart,
        tree: render::build_tree(payload),
        citation: render::citation_view(payload),
    }
}

fn chart_or_none(derived: Result<ChartSpec, ChartError>) -> ChartSpec {
    derived.unwrap_or_else(|e| {
        warn!(error = %e, "Could not derive chart data, showing text only");
        ChartSpec::none()
    })
}

impl fmt::Display for Visualization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(title) = &self.title {
            writeln!(f, "== {} ==", title)?;
        }
        f.write_str(&render::render_chart(&self.chart))?;
        f.write_str(&render::render_tree(&self.tree))?;
        if let Some(citation) = &self.citation {
            f.write_str(&render::render_citation(citation))?;
        }
        Ok(())
    }
}
