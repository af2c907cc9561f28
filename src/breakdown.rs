//! Mutually-exclusive energy flows of a day, laid out for a relative
//! (stacked) bar chart: imports and on-site sources stack upward, flows
//! leaving the household ledger (battery charge, export) stack downward.

use crate::model::DayData;
use serde::Serialize;

/// The five flows, in stacking order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FlowKind {
    GridConsumption,
    SolarSelfUse,
    BatteryDischarge,
    BatteryCharge,
    GridGeneration,
}

impl FlowKind {
    pub const ALL: [FlowKind; 5] = [
        FlowKind::GridConsumption,
        FlowKind::SolarSelfUse,
        FlowKind::BatteryDischarge,
        FlowKind::BatteryCharge,
        FlowKind::GridGeneration,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FlowKind::GridConsumption => "Grid Consumption",
            FlowKind::SolarSelfUse => "Solar Self Use",
            FlowKind::BatteryDischarge => "Battery Discharge",
            FlowKind::BatteryCharge => "Battery Charge",
            FlowKind::GridGeneration => "Grid Generation",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            FlowKind::GridConsumption => "#d62728",
            FlowKind::SolarSelfUse => "#ffbf00",
            FlowKind::BatteryDischarge => "#2ca02c",
            FlowKind::BatteryCharge => "#98df8a",
            FlowKind::GridGeneration => "#1f77b4",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowSeries {
    pub kind: FlowKind,
    pub values: Vec<f64>,
}

impl FlowSeries {
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn color(&self) -> &'static str {
        self.kind.color()
    }
}

/// Splits a day into its five flows.
///
/// Every series is truncated to the shortest of the five inputs. Solar self
/// use is `solar - meter generation - charge` and is not clamped: inconsistent
/// inputs show up as a negative segment.
pub fn derive(day: &DayData) -> Vec<FlowSeries> {
    let len = day.aligned_len();

    let grid_consumption = day.meter_consumptions()[..len].to_vec();
    let solar_self_use: Vec<f64> = day
        .solar_generations()
        .iter()
        .zip(day.meter_generations())
        .zip(day.charge_quantities())
        .map(|((solar, exported), charged)| solar - exported - charged)
        .take(len)
        .collect();
    let battery_discharge = day.discharge_quantities()[..len].to_vec();
    let battery_charge = negated(&day.charge_quantities()[..len]);
    let grid_generation = negated(&day.meter_generations()[..len]);

    FlowKind::ALL
        .into_iter()
        .zip([
            grid_consumption,
            solar_self_use,
            battery_discharge,
            battery_charge,
            grid_generation,
        ])
        .map(|(kind, values)| FlowSeries { kind, values })
        .collect()
}

fn negated(values: &[f64]) -> Vec<f64> {
    values.iter().map(|v| -v).collect()
}
