use crate::domain::model::{Checkpoint, Rider, RiderId, Stage, StageId};
use crate::utils::error::Result;

/// Read access to the entity store, as consumed by the results repository
/// and the ranking engine.
pub trait EntityLookup {
    fn lookup_stage(&self, id: StageId) -> Option<&Stage>;
    fn lookup_rider(&self, id: RiderId) -> Option<&Rider>;

    /// Checkpoints of a stage sorted by location, ties by checkpoint id.
    /// `None` when the stage is unknown.
    fn checkpoints_of(&self, id: StageId) -> Option<Vec<&Checkpoint>>;
}

pub trait Storage {
    fn read_file(&self, path: &str) -> Result<Vec<u8>>;
    fn write_file(&self, path: &str, data: &[u8]) -> Result<()>;
}
