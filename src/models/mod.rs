//! Core data records for the engine.

mod ids;
mod match_record;
mod round;
mod standings;
mod tournament;

pub use ids::*;
pub use match_record::*;
pub use round::*;
pub use standings::*;
pub use tournament::*;
