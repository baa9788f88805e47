pub mod assembler;
pub mod dates;
pub mod error;
pub mod form;
pub mod generator;
pub mod granularity;
pub mod history;
pub mod intent;
pub mod knowledge_base;
pub mod selector;

pub use error::{Result, StudioError};
pub use generator::{GeneratedQuery, QueryStudio};
pub use granularity::Granularity;
pub use intent::QueryIntent;
