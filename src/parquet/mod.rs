//! Handles serialising and saving data to disk in the _parquet_ file format.

pub mod predictors;

pub use predictors::{save_predictors, ColumnData, PredictorTable};
