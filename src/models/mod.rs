pub mod common;
pub mod content;
pub mod metrics;
pub mod outcome;
pub mod pose;

pub use common::*;
pub use content::*;
pub use metrics::*;
pub use outcome::*;
pub use pose::*;
