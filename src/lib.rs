pub mod constraint;
pub mod error;
pub mod math;
pub mod metric;
pub mod path;
pub mod projection;
pub mod space;
pub mod steering;

pub use error::{FoliaError, Result};
