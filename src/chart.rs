//! Chart inference over model payloads.
//!
//! A payload gets at most one chart. The array to draw is found by name first
//! (`data`, `values`, ...) and then by shape; its elements decide the chart kind
//! and how each element turns into a number.

use serde_json::{Map, Value};
use thiserror::Error;

/// Field names checked, in order, before falling back to a shape scan.
pub const CANDIDATE_FIELDS: [&str; 5] = ["data", "values", "numbers", "statistics", "results"];

/// Side arrays that may carry pie labels positionally.
pub const LABEL_FIELDS: [&str; 3] = ["labels", "categories", "months"];

const NAME_KEYS: [&str; 3] = ["name", "category", "label"];

const PIE_MAX: usize = 7;
const BAR_MAX: usize = 20;
const MIXED_LINE_MIN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Pie,
    Bar,
    Line,
    None,
}

impl std::fmt::Display for ChartKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ChartKind::Pie => "pie",
            ChartKind::Bar => "bar",
            ChartKind::Line => "line",
            ChartKind::None => "none",
        };
        f.write_str(name)
    }
}

/// Render-ready chart description. `labels` is only set for pie charts and
/// always has the same length as `series`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    pub kind: ChartKind,
    pub field: Option<String>,
    pub series: Vec<f64>,
    pub labels: Option<Vec<String>>,
}

impl ChartSpec {
    pub fn none() -> Self {
        Self {
            kind: ChartKind::None,
            field: None,
            series: Vec::new(),
            labels: None,
        }
    }

    pub fn is_none(&self) -> bool {
        self.kind == ChartKind::None
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ChartError {
    #[error("field '{field}' produced an empty series")]
    EmptySeries { field: String },
}

/// Finds the array to chart: named candidates first, then the first array
/// field (in key order) whose elements all look numeric.
pub fn find_chart_array(payload: &Value) -> Option<(&str, &[Value])> {
    let object = payload.as_object()?;

    for name in CANDIDATE_FIELDS {
        if let Some((key, Value::Array(items))) = object.get_key_value(name) {
            if !items.is_empty() {
                return Some((key.as_str(), items.as_slice()));
            }
        }
    }

    object.iter().find_map(|(key, value)| match value {
        Value::Array(items) if !items.is_empty() && items.iter().all(is_numeric_element) => {
            Some((key.as_str(), items.as_slice()))
        }
        _ => None,
    })
}

fn is_numeric_element(item: &Value) -> bool {
    match item {
        Value::Number(_) => true,
        Value::Object(fields) => {
            matches!(fields.get("value"), Some(Value::Number(_)))
                || matches!(fields.get("y"), Some(Value::Number(_)))
        }
        _ => false,
    }
}

fn has_xy(item: &Value) -> bool {
    item.as_object()
        .map(|fields| fields.contains_key("x") && fields.contains_key("y"))
        .unwrap_or(false)
}

fn has_name(item: &Value) -> bool {
    item.as_object()
        .map(|fields| NAME_KEYS.iter().any(|key| fields.contains_key(*key)))
        .unwrap_or(false)
}

/// Picks a chart kind from the shape of a non-empty array.
pub fn classify(items: &[Value]) -> ChartKind {
    if items.is_empty() {
        return ChartKind::None;
    }
    let count = items.len();

    if items.iter().all(has_xy) {
        return ChartKind::Line;
    }

    if items.iter().all(Value::is_object) && items.iter().any(has_name) {
        return if count <= PIE_MAX {
            ChartKind::Pie
        } else {
            ChartKind::Bar
        };
    }

    if items.iter().all(Value::is_number) {
        return match count {
            n if n <= PIE_MAX => ChartKind::Pie,
            n if n <= BAR_MAX => ChartKind::Bar,
            _ => ChartKind::Line,
        };
    }

    if count > MIXED_LINE_MIN {
        ChartKind::Line
    } else {
        ChartKind::Bar
    }
}

fn number_field(fields: &Map<String, Value>, key: &str) -> Option<f64> {
    fields.get(key).and_then(Value::as_f64)
}

/// Numeric value of one element, looking at the given keys in order.
fn element_value(item: &Value, keys: &[&str]) -> f64 {
    match item {
        Value::Number(n) => n.as_f64().unwrap_or(1.0),
        Value::Object(fields) => keys
            .iter()
            .find_map(|key| number_field(fields, key))
            .unwrap_or(1.0),
        _ => 1.0,
    }
}

fn line_value(item: &Value) -> f64 {
    if has_xy(item) {
        if let Some(fields) = item.as_object() {
            return number_field(fields, "y").unwrap_or(1.0);
        }
    }
    element_value(item, &["y", "value"])
}

/// Display form of a label value: strings as-is, anything else as JSON text.
pub fn label_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn side_labels<'a>(payload: &'a Value) -> Option<&'a [Value]> {
    let object = payload.as_object()?;
    LABEL_FIELDS
        .iter()
        .find_map(|name| object.get(*name).and_then(Value::as_array))
        .map(Vec::as_slice)
}

fn pie_label(item: &Value, index: usize, side: Option<&[Value]>) -> String {
    let own = item.as_object().and_then(|fields| {
        NAME_KEYS
            .iter()
            .find_map(|key| fields.get(*key).filter(|v| !v.is_null()))
            .map(label_text)
    });

    own.or_else(|| side.and_then(|labels| labels.get(index)).map(label_text))
        .unwrap_or_else(|| format!("Item {}", index + 1))
}

/// Turns the selected array into the values a chart of `kind` needs.
pub fn normalize(
    payload: &Value,
    field: &str,
    items: &[Value],
    kind: ChartKind,
) -> Result<ChartSpec, ChartError> {
    let (series, labels) = match kind {
        ChartKind::None => return Ok(ChartSpec::none()),
        ChartKind::Pie => {
            let side = side_labels(payload);
            let series: Vec<f64> = items
                .iter()
                .map(|item| element_value(item, &["value", "y"]))
                .collect();
            let labels: Vec<String> = items
                .iter()
                .enumerate()
                .map(|(i, item)| pie_label(item, i, side))
                .collect();
            (series, Some(labels))
        }
        ChartKind::Bar => (
            items
                .iter()
                .map(|item| element_value(item, &["value", "y"]))
                .collect(),
            None,
        ),
        ChartKind::Line => (items.iter().map(line_value).collect(), None),
    };

    if series.is_empty() {
        return Err(ChartError::EmptySeries {
            field: field.to_string(),
        });
    }

    Ok(ChartSpec {
        kind,
        field: Some(field.to_string()),
        series,
        labels,
    })
}

/// Full chart derivation. `Ok(ChartSpec::none())` when there is nothing to draw.
pub fn derive_chart(payload: &Value) -> Result<ChartSpec, ChartError> {
    let Some((field, items)) = find_chart_array(payload) else {
        return Ok(ChartSpec::none());
    };
    let kind = classify(items);
    normalize(payload, field, items, kind)
}
