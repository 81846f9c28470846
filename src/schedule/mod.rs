pub mod types;
pub mod slot_utils;
pub mod field;
pub mod condition;
pub mod node;
pub mod scoring;
pub mod generator;
pub mod solution;
pub mod explorer;
pub mod searcher;

pub use condition::{Condition, SearchInput};
pub use explorer::{DriveOutcome, Explorer};
pub use searcher::{SearchStatus, Searcher, SolutionsReport, StartReport, StatusReport};
pub use solution::{Solution, SolutionGame};
