//! Plotly-shaped chart description consumed by the browser.

use crate::breakdown::{self, FlowSeries};
use crate::model::{DayData, Uom};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Marker {
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarTrace {
    pub x: Vec<String>,
    pub y: Vec<f64>,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<Marker>,
}

impl BarTrace {
    fn from_flow(labels: &[String], series: FlowSeries) -> Self {
        Self {
            x: labels[..series.values.len()].to_vec(),
            name: series.name().to_string(),
            kind: "bar",
            marker: Some(Marker {
                color: series.color().to_string(),
            }),
            y: series.values,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Axis {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tickangle: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Legend {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layout {
    pub title: String,
    pub barmode: &'static str,
    pub xaxis: Axis,
    pub yaxis: Axis,
    pub legend: Legend,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartConfig {
    pub editable: bool,
    pub scroll_zoom: bool,
    pub display_mode_bar: bool,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            editable: false,
            scroll_zoom: false,
            display_mode_bar: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chart {
    pub data: Vec<BarTrace>,
    pub layout: Layout,
    pub config: ChartConfig,
}

impl Chart {
    /// Relative bar chart of the day's five energy flows.
    pub fn breakdown(day: &DayData, uom: &Uom) -> Self {
        let labels = day.interval_labels();
        let data = breakdown::derive(day)
            .into_iter()
            .map(|series| BarTrace::from_flow(&labels, series))
            .collect();

        Self {
            data,
            layout: Layout {
                title: format!("Energy Flows {}", day.interval_date().format("%Y-%m-%d")),
                barmode: "relative",
                xaxis: Axis {
                    title: "Time of Day".to_string(),
                    tickangle: Some(-45),
                },
                yaxis: Axis {
                    title: format!("Usage ({})", uom.name),
                    tickangle: None,
                },
                legend: Legend { x: -0.2, y: 1.3 },
            },
            config: ChartConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{IntervalLength, Readings, UOM};
    use chrono::NaiveDate;

    fn day() -> DayData {
        DayData::new(
            NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            IntervalLength::ThirtyMinutes,
            Readings {
                meter_consumptions: vec![2.0, 1.0, 0.5],
                meter_generations: vec![5.0, 0.0],
                solar_generations: vec![8.0, 0.0],
                charge_quantities: vec![1.0, 0.0],
                discharge_quantities: vec![0.0, 0.7],
            },
        )
    }

    #[test]
    fn test_traces_align_with_labels() {
        let chart = Chart::breakdown(&day(), &UOM);

        assert_eq!(chart.data.len(), 5);
        for trace in &chart.data {
            assert_eq!(trace.x, vec!["00:00", "00:30"]);
            assert_eq!(trace.y.len(), 2);
            assert_eq!(trace.kind, "bar");
        }
        assert_eq!(chart.data[1].name, "Solar Self Use");
        assert_eq!(chart.data[1].y, vec![2.0, 0.0]);
    }

    #[test]
    fn test_chart_json_shape() {
        let chart = Chart::breakdown(&day(), &UOM);
        let json = serde_json::to_value(&chart).unwrap();

        assert_eq!(json["layout"]["barmode"], "relative");
        assert_eq!(json["layout"]["xaxis"]["title"], "Time of Day");
        assert_eq!(json["layout"]["yaxis"]["title"], "Usage (kWh)");
        assert!(json["layout"]["yaxis"].get("tickangle").is_none());
        assert_eq!(json["config"]["scrollZoom"], false);
        assert_eq!(json["config"]["displayModeBar"], true);
        assert_eq!(json["data"][0]["type"], "bar");
        assert_eq!(json["data"][0]["name"], "Grid Consumption");
        assert_eq!(json["data"][4]["y"][0], -5.0);
        assert!(json["data"][0]["marker"]["color"].is_string());
    }
}
