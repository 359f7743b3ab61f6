// Wed Jan 14 2026 - Alex

use crate::error::{FlowError, StageError};
use crate::record::Record;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::str::FromStr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionKind {
    /// Every worker runs its own transform instance; nothing is shared between workers.
    #[default]
    Isolated,
    /// One transform instance is built per pool and shared by all of its workers.
    Shared,
}

impl ExecutionKind {
    pub fn name(&self) -> &'static str {
        match self {
            ExecutionKind::Isolated => "isolated",
            ExecutionKind::Shared => "shared",
        }
    }
}

impl fmt::Display for ExecutionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExecutionKind {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "isolated" | "process" => Ok(ExecutionKind::Isolated),
            "shared" | "thread" => Ok(ExecutionKind::Shared),
            other => Err(FlowError::Config(format!("unknown execution kind '{}'", other))),
        }
    }
}

pub trait Transform: Send + Sync {
    fn apply(&self, record: Record, worker: usize) -> Result<Record, StageError>;
}

impl<F> Transform for F
where
    F: Fn(Record, usize) -> Result<Record, StageError> + Send + Sync,
{
    fn apply(&self, record: Record, worker: usize) -> Result<Record, StageError> {
        self(record, worker)
    }
}

pub type TransformFactory = Arc<dyn Fn() -> Arc<dyn Transform> + Send + Sync>;

pub trait ExecutionUnit: Send + Sync {
    fn kind(&self) -> ExecutionKind;

    fn transform_for(&self, worker: usize) -> Arc<dyn Transform>;
}

pub struct IsolatedUnit {
    factory: TransformFactory,
}

impl IsolatedUnit {
    pub fn new(factory: TransformFactory) -> Self {
        Self { factory }
    }
}

impl ExecutionUnit for IsolatedUnit {
    fn kind(&self) -> ExecutionKind {
        ExecutionKind::Isolated
    }

    fn transform_for(&self, _worker: usize) -> Arc<dyn Transform> {
        (self.factory)()
    }
}

pub struct SharedUnit {
    transform: Arc<dyn Transform>,
}

impl SharedUnit {
    pub fn new(factory: &TransformFactory) -> Self {
        Self {
            transform: factory(),
        }
    }
}

impl ExecutionUnit for SharedUnit {
    fn kind(&self) -> ExecutionKind {
        ExecutionKind::Shared
    }

    fn transform_for(&self, _worker: usize) -> Arc<dyn Transform> {
        self.transform.clone()
    }
}

pub fn unit_for(kind: ExecutionKind, factory: &TransformFactory) -> Box<dyn ExecutionUnit> {
    match kind {
        ExecutionKind::Isolated => Box::new(IsolatedUnit::new(factory.clone())),
        ExecutionKind::Shared => Box::new(SharedUnit::new(factory)),
    }
}

/// Runs the transform, turning a panic into a fatal stage error.
pub fn apply_guarded(transform: &dyn Transform, record: Record, worker: usize) -> Result<Record, StageError> {
    match panic::catch_unwind(AssertUnwindSafe(|| transform.apply(record, worker))) {
        Ok(result) => result,
        Err(payload) => Err(StageError::Fatal(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", msg)
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panicked: {}", msg)
    } else {
        "panicked".to_string()
    }
}

pub fn spawn_unit<F>(name: String, body: F) -> Result<JoinHandle<()>, FlowError>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.clone())
        .spawn(body)
        .map_err(|source| FlowError::Spawn { unit: name, source })
}
