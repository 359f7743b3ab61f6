// Tue Jan 13 2026 - Alex

use crate::engine::unit::{ExecutionKind, Transform, TransformFactory};
use crate::error::{FlowError, StageError};
use crate::record::Record;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageDescriptor {
    pipeline: String,
    name: String,
    workers: usize,
    kind: ExecutionKind,
}

impl StageDescriptor {
    pub fn new(pipeline: &str, name: &str, workers: usize, kind: ExecutionKind) -> Result<Self, FlowError> {
        if workers == 0 {
            return Err(FlowError::Registry(format!(
                "stage '{}' of '{}' needs at least one worker",
                name, pipeline
            )));
        }

        Ok(Self {
            pipeline: pipeline.to_string(),
            name: name.to_string(),
            workers,
            kind,
        })
    }

    pub fn pipeline(&self) -> &str {
        &self.pipeline
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn kind(&self) -> ExecutionKind {
        self.kind
    }

    pub fn is_parallel(&self) -> bool {
        self.workers > 1
    }
}

impl fmt::Display for StageDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} (workers: {}, kind: {})",
            self.pipeline, self.name, self.workers, self.kind
        )
    }
}

/// Ordered catalogue of stage descriptors, filled before any run starts.
#[derive(Debug, Clone, Default)]
pub struct StageRegistry {
    stages: Vec<StageDescriptor>,
}

pub type SharedRegistry = Arc<RwLock<StageRegistry>>;

impl StageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedRegistry {
        Arc::new(RwLock::new(Self::new()))
    }

    pub fn register(
        &mut self,
        pipeline: &str,
        name: &str,
        workers: usize,
        kind: ExecutionKind,
    ) -> Result<(), FlowError> {
        let descriptor = StageDescriptor::new(pipeline, name, workers, kind)?;
        log::debug!("Registered stage {}", descriptor);
        self.stages.push(descriptor);
        Ok(())
    }

    pub fn stages_for(&self, pipeline: &str) -> Vec<StageDescriptor> {
        self.stages
            .iter()
            .filter(|s| s.pipeline == pipeline)
            .cloned()
            .collect()
    }

    pub fn max_worker_count(&self, pipeline: &str) -> usize {
        self.stages
            .iter()
            .filter(|s| s.pipeline == pipeline)
            .map(|s| s.workers)
            .max()
            .unwrap_or(0)
    }

    pub fn clear(&mut self) {
        self.stages.clear();
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn all(&self) -> &[StageDescriptor] {
        &self.stages
    }
}

/// Maps stage names to the transforms that implement them.
#[derive(Clone, Default)]
pub struct StageTable {
    entries: HashMap<String, TransformFactory>,
}

impl StageTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a stateless transform. Every worker uses the same function.
    pub fn insert_fn<F>(&mut self, name: &str, f: F)
    where
        F: Fn(Record, usize) -> Result<Record, StageError> + Send + Sync + 'static,
    {
        let transform: Arc<dyn Transform> = Arc::new(f);
        self.entries
            .insert(name.to_string(), Arc::new(move || transform.clone()));
    }

    /// Registers a transform built by `factory`; isolated stages call it once per
    /// worker, shared stages once per pool.
    pub fn insert_factory<F, T>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> T + Send + Sync + 'static,
        T: Transform + 'static,
    {
        self.entries.insert(
            name.to_string(),
            Arc::new(move || Arc::new(factory()) as Arc<dyn Transform>),
        );
    }

    pub fn with_fn<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(Record, usize) -> Result<Record, StageError> + Send + Sync + 'static,
    {
        self.insert_fn(name, f);
        self
    }

    pub fn with_factory<F, T>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
        T: Transform + 'static,
    {
        self.insert_factory(name, factory);
        self
    }

    /// Adds the entries of `other` whose names are not already present.
    pub fn merge(&mut self, other: StageTable) {
        for (name, factory) in other.entries {
            self.entries.entry(name).or_insert(factory);
        }
    }

    pub fn get(&self, name: &str) -> Option<&TransformFactory> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(|k| k.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for StageTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageTable").field("stages", &self.names()).finish()
    }
}
