pub mod api;
pub mod error;
pub mod lifecycle;
pub mod registry;
pub mod report;
pub mod status;
pub mod unit;

pub use api::*;
pub use error::{RefactorError, RefactorResult};
pub use lifecycle::*;
pub use registry::*;
pub use report::*;
pub use status::*;
pub use unit::*;
