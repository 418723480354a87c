pub mod bracket;
pub mod matches;
pub mod schedule;
pub mod tournaments;
