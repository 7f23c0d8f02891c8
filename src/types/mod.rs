//! Type definitions

pub mod batch;
pub mod job;
pub mod messages;
pub mod options;
pub mod record;
pub mod store;

pub use batch::*;
pub use job::*;
pub use messages::*;
pub use options::*;
pub use record::*;
pub use store::*;
