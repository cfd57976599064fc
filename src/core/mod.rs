pub mod elapsed;
pub mod portal;
pub mod ranking;
pub mod report;
pub mod results;
pub mod store;

pub use crate::domain::model::{RiderId, StageId, StageResult};
pub use crate::domain::ports::{EntityLookup, Storage};
pub use crate::utils::error::Result;
