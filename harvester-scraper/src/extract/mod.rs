pub mod candidate;
pub mod datetime;
pub mod heuristics;
pub mod page;

pub use candidate::{CandidateEvent, RawUnit};
