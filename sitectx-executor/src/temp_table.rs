//! Temp tables produced by plan executors.
//!
//! The execution context never creates or destroys a temp table; operators own
//! them. The context only needs to count rows and release row storage, which is
//! all [`TempTable`] exposes.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use arrow::compute::concat_batches;
use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use sitectx_result::{Error, Result};

/// Row storage of a transient, operator-produced result.
pub trait TempTable: Send + Sync + fmt::Debug {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Number of live rows.
    fn active_tuple_count(&self) -> usize;

    /// Release every row. The table object stays usable and empty.
    fn delete_all_tuples(&self);

    fn is_empty(&self) -> bool {
        self.active_tuple_count() == 0
    }
}

/// Shared handle to an operator's output table.
pub type TempTableRef = Arc<dyn TempTable>;

/// In-memory temp table holding Arrow record batches.
pub struct BatchTempTable {
    name: String,
    schema: SchemaRef,
    batches: Mutex<Vec<RecordBatch>>,
}

impl BatchTempTable {
    pub fn new(name: impl Into<String>, schema: SchemaRef) -> Self {
        Self {
            name: name.into(),
            schema,
            batches: Mutex::new(Vec::new()),
        }
    }

    pub fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    /// Append a batch of rows. The batch schema must equal the table schema.
    pub fn append(&self, batch: RecordBatch) -> Result<()> {
        if batch.schema() != self.schema {
            return Err(Error::InvalidArgumentError(format!(
                "batch schema does not match temp table '{}'",
                self.name
            )));
        }
        if batch.num_rows() > 0 {
            self.lock().push(batch);
        }
        Ok(())
    }

    /// Copy of the stored batches, in append order.
    pub fn batches(&self) -> Vec<RecordBatch> {
        self.lock().clone()
    }

    /// All rows as a single batch.
    pub fn concat(&self) -> Result<RecordBatch> {
        let batches = self.lock();
        Ok(concat_batches(&self.schema, batches.iter())?)
    }

    // Batches are pushed whole, so a poisoned lock still guards a consistent Vec.
    fn lock(&self) -> MutexGuard<'_, Vec<RecordBatch>> {
        self.batches
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for BatchTempTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchTempTable")
            .field("name", &self.name)
            .field("rows", &self.active_tuple_count())
            .finish()
    }
}

impl TempTable for BatchTempTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn active_tuple_count(&self) -> usize {
        self.lock().iter().map(RecordBatch::num_rows).sum()
    }

    fn delete_all_tuples(&self) {
        let mut batches = self.lock();
        if !batches.is_empty() {
            tracing::trace!(table = %self.name, "deleting temp table rows");
        }
        batches.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Int64Array};
    use arrow::datatypes::{DataType, Field, Schema};

    fn int_batch(schema: &SchemaRef, values: Vec<i64>) -> RecordBatch {
        RecordBatch::try_new(
            Arc::clone(schema),
            vec![Arc::new(Int64Array::from(values)) as ArrayRef],
        )
        .expect("valid batch")
    }

    #[test]
    fn append_counts_and_clears_rows() {
        let schema = Arc::new(Schema::new(vec![Field::new("a", DataType::Int64, false)]));
        let table = BatchTempTable::new("scan_output", Arc::clone(&schema));

        table.append(int_batch(&schema, vec![1, 2, 3])).unwrap();
        table.append(int_batch(&schema, vec![4])).unwrap();
        assert_eq!(table.active_tuple_count(), 4);
        assert_eq!(table.concat().unwrap().num_rows(), 4);

        table.delete_all_tuples();
        assert!(table.is_empty());
        // Clearing an already empty table is harmless.
        table.delete_all_tuples();
        assert!(table.is_empty());
    }

    #[test]
    fn append_rejects_foreign_schema() {
        let schema = Arc::new(Schema::new(vec![Field::new("a", DataType::Int64, false)]));
        let other = Arc::new(Schema::new(vec![Field::new("b", DataType::Int64, false)]));
        let table = BatchTempTable::new("t", schema);

        let err = table.append(int_batch(&other, vec![1])).unwrap_err();
        assert!(matches!(err, Error::InvalidArgumentError(_)));
        assert!(table.is_empty());
    }
}
