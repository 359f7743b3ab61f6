// Tue Jan 13 2026 - Alex

use crate::config::FlowConfig;
use crate::engine::core::Flow;
use crate::engine::stage::{SharedRegistry, StageTable};
use crate::engine::unit::{ExecutionKind, Transform};
use crate::error::{FlowError, StageError};
use crate::io::{Sink, Source};
use crate::record::Record;

#[derive(Debug, Clone)]
struct PlannedStage {
    name: String,
    workers: usize,
    kind: ExecutionKind,
}

pub struct FlowBuilder {
    identity: String,
    planned: Vec<PlannedStage>,
    table: StageTable,
    source: Option<Box<dyn Source>>,
    sink: Option<Box<dyn Sink>>,
    config: FlowConfig,
}

impl FlowBuilder {
    pub fn new(identity: &str) -> Self {
        Self {
            identity: identity.to_string(),
            planned: Vec::new(),
            table: StageTable::new(),
            source: None,
            sink: None,
            config: FlowConfig::default(),
        }
    }

    pub fn stage(self, name: &str) -> StageBuilder {
        StageBuilder {
            flow_builder: self,
            stage: PlannedStage {
                name: name.to_string(),
                workers: 1,
                kind: ExecutionKind::default(),
            },
        }
    }

    /// Transforms for stages added without one of their own. A transform set
    /// through `StageBuilder` wins over a table entry of the same name.
    pub fn table(mut self, table: StageTable) -> Self {
        self.table.merge(table);
        self
    }

    pub fn source<S: Source + 'static>(mut self, source: S) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn boxed_source(mut self, source: Box<dyn Source>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn sink<S: Sink + 'static>(mut self, sink: S) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    pub fn boxed_sink(mut self, sink: Box<dyn Sink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn config(mut self, config: FlowConfig) -> Self {
        self.config = config;
        self
    }

    /// Registers the planned stages under this flow's identity and builds the flow.
    pub fn build(self, registry: &SharedRegistry) -> Result<Flow, FlowError> {
        self.config.validate()?;

        let source = self
            .source
            .ok_or_else(|| FlowError::InvalidState(format!("flow '{}' has no source", self.identity)))?;
        let sink = self
            .sink
            .ok_or_else(|| FlowError::InvalidState(format!("flow '{}' has no sink", self.identity)))?;

        {
            let mut registry = registry.write();
            for stage in &self.planned {
                registry.register(&self.identity, &stage.name, stage.workers, stage.kind)?;
            }
        }

        Ok(Flow::new(
            &self.identity,
            registry.clone(),
            self.table,
            source,
            sink,
            self.config,
        ))
    }
}

pub struct StageBuilder {
    flow_builder: FlowBuilder,
    stage: PlannedStage,
}

impl StageBuilder {
    pub fn workers(mut self, workers: usize) -> Self {
        self.stage.workers = workers;
        self
    }

    pub fn kind(mut self, kind: ExecutionKind) -> Self {
        self.stage.kind = kind;
        self
    }

    pub fn transform<F>(mut self, f: F) -> Self
    where
        F: Fn(Record, usize) -> Result<Record, StageError> + Send + Sync + 'static,
    {
        self.flow_builder.table.insert_fn(&self.stage.name, f);
        self
    }

    pub fn factory<F, T>(mut self, factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
        T: Transform + 'static,
    {
        self.flow_builder.table.insert_factory(&self.stage.name, factory);
        self
    }

    pub fn done(mut self) -> FlowBuilder {
        self.flow_builder.planned.push(self.stage);
        self.flow_builder
    }
}
