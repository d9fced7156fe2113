//! Reducers applied to the units selected for a cell.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Reducer {
    #[default]
    Sum,
    Mean,
    Max,
}

impl Reducer {
    /// Starting accumulator; also what a missing unit contributes.
    pub fn identity(self) -> f64 {
        match self {
            Reducer::Sum | Reducer::Mean => 0.0,
            Reducer::Max => f64::NEG_INFINITY,
        }
    }

    pub fn combine(self, acc: f64, value: f64) -> f64 {
        match self {
            Reducer::Sum | Reducer::Mean => acc + value,
            Reducer::Max => acc.max(value),
        }
    }

    /// Final cell value from an accumulator that has seen `count` values.
    ///
    /// An empty sum is 0. Mean and max have no value in the output domain for
    /// an empty selection, so they yield `nodata`.
    pub fn finish(self, acc: f64, count: u32, nodata: f32) -> f32 {
        match (self, count) {
            (Reducer::Sum, _) => acc as f32,
            (_, 0) => nodata,
            (Reducer::Mean, n) => (acc / f64::from(n)) as f32,
            (Reducer::Max, _) => acc as f32,
        }
    }
}
