// Tue Jan 15 2026 - Alex

pub mod builtin;
pub mod config;
pub mod engine;
pub mod error;
pub mod io;
pub mod record;
pub mod retry;
pub mod utils;

pub use config::FlowConfig;
pub use engine::{ExecutionKind, Flow, FlowBuilder, FlowRunner, RunReport, StageRegistry, StageTable};
pub use error::{FlowError, StageError};
pub use io::{Sink, Source};
pub use record::{Outcome, Record, Tagged};
pub use retry::{catch_errors, RetryPolicy};
