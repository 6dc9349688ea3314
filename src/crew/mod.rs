//! The shopping crew: agent personas, their tasks, and the runner that
//! executes them in order

pub mod agent;
pub mod definitions;
pub mod pipeline;
pub mod task;

pub use agent::Agent;
pub use definitions::{shopping_tasks, ShoppingAgents, EXAMPLE_QUERIES};
pub use pipeline::{PipelineRunner, PipelineSettings, PipelineState, RunReport, StageOutput};
pub use task::{Task, TaskKind};
