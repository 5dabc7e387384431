//! Tool execution engine: the per-conversation document copy, the operation
//! catalog and the dispatcher that runs it.

pub mod context;
pub mod definitions;
pub mod error;
mod read;
pub mod registry;
pub mod validation;
mod write;

pub use context::{ExecutionContext, ItemHit};
pub use definitions::tool_definitions;
pub use error::ToolError;
pub use registry::{Handler, ReadHandler, ToolOutcome, ToolRegistry, WriteHandler};
pub use write::{Applied, OPTION_FIELDS};
