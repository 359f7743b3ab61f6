// Tue Jan 13 2026 - Alex

pub mod control;
pub mod core;
pub mod pipeline;
pub mod queue;
pub mod reorder;
pub mod result;
pub mod runner;
pub mod stage;
pub mod stream;
pub mod unit;
pub mod worker;

pub use self::core::{Flow, InterruptHandle, RunState};
pub use control::{CancelToken, RunControl};
pub use pipeline::{FlowBuilder, StageBuilder};
pub use queue::{Message, Queue};
pub use reorder::{ReorderBuffer, ReorderStats, Reordered};
pub use result::{RunCounter, RunReport};
pub use runner::{FlowHandle, FlowRunner};
pub use stage::{SharedRegistry, StageDescriptor, StageRegistry, StageTable};
pub use unit::{ExecutionKind, ExecutionUnit, Transform, TransformFactory};
pub use worker::{PoolOutput, PoolStats, Worker, WorkerPool};
