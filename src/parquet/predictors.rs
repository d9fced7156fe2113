//! Save a predictor table (one row per grid cell) to a parquet file.

use std::{fs::File, path::Path, sync::Arc};

use anyhow::{bail, Result};
use arrow::{
    array::{ArrayRef, Float32Array, Int32Array},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use parquet::{arrow::ArrowWriter, file::properties::WriterProperties};

const CHUNK_SIZE: usize = 100_000;

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Float32(Vec<f32>),
    Int32(Vec<i32>),
}

impl ColumnData {
    fn len(&self) -> usize {
        match self {
            ColumnData::Float32(values) => values.len(),
            ColumnData::Int32(values) => values.len(),
        }
    }

    fn data_type(&self) -> DataType {
        match self {
            ColumnData::Float32(_) => DataType::Float32,
            ColumnData::Int32(_) => DataType::Int32,
        }
    }

    fn slice(&self, start: usize, end: usize) -> ArrayRef {
        match self {
            ColumnData::Float32(values) => Arc::new(Float32Array::from(values[start..end].to_vec())),
            ColumnData::Int32(values) => Arc::new(Int32Array::from(values[start..end].to_vec())),
        }
    }
}

/// Equal-length named columns, in output order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredictorTable {
    columns: Vec<(String, ColumnData)>,
}

impl PredictorTable {
    /// Appends a column; its length must match the columns already present.
    pub fn push(&mut self, name: &str, data: ColumnData) -> Result<()> {
        if self.columns.iter().any(|(existing, _)| existing == name) {
            bail!("Column `{}` added twice", name);
        }
        if let Some(rows) = self.num_rows() {
            if data.len() != rows {
                bail!(
                    "Column `{}` has {} rows, expected {}",
                    name,
                    data.len(),
                    rows
                );
            }
        }

        self.columns.push((name.to_string(), data));
        Ok(())
    }

    pub fn num_rows(&self) -> Option<usize> {
        self.columns.first().map(|(_, data)| data.len())
    }

    #[cfg(test)]
    pub fn column(&self, name: &str) -> Option<&ColumnData> {
        self.columns
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, data)| data)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _)| name.as_str()).collect()
    }
}

pub fn save_predictors(table: &PredictorTable, file_path: &Path) -> Result<()> {
    let Some(total_rows) = table.num_rows() else {
        bail!("Predictor table for {:?} has no columns", file_path);
    };

    let file = File::create(file_path)?;

    let schema = Arc::new(Schema::new(
        table
            .columns
            .iter()
            .map(|(name, data)| Field::new(name, data.data_type(), false))
            .collect::<Vec<_>>(),
    ));

    let props = WriterProperties::builder()
        .set_compression(parquet::basic::Compression::SNAPPY)
        .build();

    let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;

    let mut rows_processed = 0;
    while rows_processed < total_rows {
        let batch_end = (rows_processed + CHUNK_SIZE).min(total_rows);

        let arrays: Vec<ArrayRef> = table
            .columns
            .iter()
            .map(|(_, data)| data.slice(rows_processed, batch_end))
            .collect();

        let batch = RecordBatch::try_new(schema.clone(), arrays)?;
        writer.write(&batch)?;

        rows_processed = batch_end;
    }

    writer.close()?;

    Ok(())
}

// -- Tests -------------------------------------------------------------------
