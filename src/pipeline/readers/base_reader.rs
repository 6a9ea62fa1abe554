use crate::data_model::WorkItem;
use crate::error::Result;

/// Trait for sources that produce the work items of a run.
pub trait BaseReader {
    fn read_items(&self) -> Result<Vec<WorkItem>>;
}
