//! Tabular frames and labelled series.
//!
//! These are storage shapes only: a frame is a 2-D value array plus column
//! labels, a series is a 1-D value array plus an index. No dataframe
//! operations live here.

use super::array::NdArray;
use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A 2-D table with named columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataFrame {
    columns: Vec<String>,
    index_columns: Vec<String>,
    values: NdArray,
    dtypes: BTreeMap<String, String>,
}

impl DataFrame {
    /// Build a frame whose column dtypes all follow the value array
    pub fn new(columns: Vec<String>, values: NdArray) -> Result<Self> {
        let dtype = values.dtype().as_str().to_string();
        let dtypes = columns
            .iter()
            .map(|column| (column.clone(), dtype.clone()))
            .collect();
        Self::from_parts(columns, Vec::new(), values, dtypes)
    }

    /// Build a frame from every stored part, validating the shape
    pub fn from_parts(
        columns: Vec<String>,
        index_columns: Vec<String>,
        values: NdArray,
        dtypes: BTreeMap<String, String>,
    ) -> Result<Self> {
        let shape = values.shape();
        if shape.len() != 2 {
            return Err(Error::deserialization(
                "DataFrame",
                format!("values must be 2-D, got shape {shape:?}"),
            ));
        }
        if shape[1] != columns.len() {
            return Err(Error::deserialization(
                "DataFrame",
                format!(
                    "{} columns for values with {} columns",
                    columns.len(),
                    shape[1]
                ),
            ));
        }
        if let Some(missing) = index_columns.iter().find(|c| !columns.contains(c)) {
            return Err(Error::deserialization(
                "DataFrame",
                format!("index column '{missing}' is not a column"),
            ));
        }
        Ok(Self {
            columns,
            index_columns,
            values,
            dtypes,
        })
    }

    /// Mark columns as the frame index
    pub fn with_index_columns(mut self, index_columns: Vec<String>) -> Result<Self> {
        if let Some(missing) = index_columns.iter().find(|c| !self.columns.contains(c)) {
            return Err(Error::configuration(format!(
                "index column '{missing}' is not a column"
            )));
        }
        self.index_columns = index_columns;
        Ok(self)
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn index_columns(&self) -> &[String] {
        &self.index_columns
    }

    #[must_use]
    pub fn values(&self) -> &NdArray {
        &self.values
    }

    #[must_use]
    pub fn dtypes(&self) -> &BTreeMap<String, String> {
        &self.dtypes
    }

    /// `(rows, columns)`
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        let shape = self.values.shape();
        (shape[0], shape[1])
    }
}

/// A 1-D array of values with an index of the same length
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    name: Option<String>,
    values: NdArray,
    index: NdArray,
}

impl Series {
    pub fn new(values: NdArray, index: NdArray) -> Result<Self> {
        if values.ndim() != 1 || index.ndim() != 1 {
            return Err(Error::deserialization(
                "Series",
                "values and index must both be 1-D",
            ));
        }
        if values.len() != index.len() {
            return Err(Error::deserialization(
                "Series",
                format!(
                    "{} values for an index of length {}",
                    values.len(),
                    index.len()
                ),
            ));
        }
        Ok(Self {
            name: None,
            values,
            index,
        })
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn values(&self) -> &NdArray {
        &self.values
    }

    #[must_use]
    pub fn index(&self) -> &NdArray {
        &self.index
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
