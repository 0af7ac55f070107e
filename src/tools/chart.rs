//! Chart specification tool.
//!
//! The model picks the chart type; this tool only checks that the chart spec is
//! renderable and hands it back as structured data for the presenter.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::{Tool, ToolOutput};

const CHART_TYPES: &[&str] = &["bar", "line", "pie", "area", "scatter", "stacked_bar"];

#[derive(Debug, Serialize, Deserialize)]
struct ChartSpec {
    chart_type: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    x_key: String,
    y_keys: Vec<String>,
    data: Vec<Map<String, Value>>,
}

/// Validate a chart specification and return it for rendering.
pub struct ChartTool;

#[async_trait]
impl Tool for ChartTool {
    fn name(&self) -> &str {
        "chart"
    }

    fn description(&self) -> &str {
        "Produce a chart from tabular data. Every row in `data` must contain `x_key` and all `y_keys`. Returns the validated chart specification."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "chart_type": {
                    "type": "string",
                    "enum": CHART_TYPES,
                    "description": "Kind of chart"
                },
                "title": { "type": "string" },
                "description": { "type": "string" },
                "x_key": {
                    "type": "string",
                    "description": "Field used for the x axis (or slice label for pie charts)"
                },
                "y_keys": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Numeric fields to plot"
                },
                "data": {
                    "type": "array",
                    "items": { "type": "object" },
                    "description": "Rows of data"
                }
            },
            "required": ["chart_type", "x_key", "y_keys", "data"]
        })
    }

    async fn execute(&self, args: Value, _workspace: &Path) -> anyhow::Result<ToolOutput> {
        let spec: ChartSpec = serde_json::from_value(args)
            .map_err(|e| anyhow::anyhow!("Malformed chart spec: {}", e))?;
        validate(&spec)?;
        Ok(ToolOutput::Json(serde_json::to_value(&spec)?))
    }
}

fn validate(spec: &ChartSpec) -> anyhow::Result<()> {
    if !CHART_TYPES.contains(&spec.chart_type.as_str()) {
        anyhow::bail!(
            "unsupported chart_type '{}', expected one of: {}",
            spec.chart_type,
            CHART_TYPES.join(", ")
        );
    }
    if spec.y_keys.is_empty() {
        anyhow::bail!("y_keys must name at least one field");
    }
    if spec.chart_type == "pie" && spec.y_keys.len() != 1 {
        anyhow::bail!("pie charts take exactly one y key");
    }
    if spec.data.is_empty() {
        anyhow::bail!("data must contain at least one row");
    }

    for (i, row) in spec.data.iter().enumerate() {
        if !row.contains_key(&spec.x_key) {
            anyhow::bail!("row {} is missing x_key '{}'", i, spec.x_key);
        }
        for key in &spec.y_keys {
            match row.get(key) {
                Some(v) if v.is_number() => {}
                Some(_) => anyhow::bail!("row {} field '{}' is not numeric", i, key),
                None => anyhow::bail!("row {} is missing y key '{}'", i, key),
            }
        }
    }
    Ok(())
}
