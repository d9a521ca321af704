use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// One on-demand load cell measurement. Overwritten on each read; the bench
/// shows the value rounded to two decimals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadCellValue {
    /// One-based cell index as labelled on the bench.
    pub cell: u8,

    /// Raw measurement as decoded from the wire.
    pub value: f32,
}

impl LoadCellValue {
    pub fn new(cell: u8, value: f32) -> Self {
        Self { cell, value }
    }

    /// The display value, rounded to two decimal places. Computed in f64 so
    /// the scaling itself cannot push a value across the rounding boundary.
    pub fn rounded(&self) -> f32 {
        (((self.value as f64) * 100.0).round() / 100.0) as f32
    }
}

impl Display for LoadCellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Format the raw value directly; rounding twice can move values
        // that sit just below a half-cent boundary.
        write!(f, "<Load Cell {} | {:.2}>", self.cell, self.value)
    }
}
