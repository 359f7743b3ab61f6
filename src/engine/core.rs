// Tue Jan 13 2026 - Alex

use crate::config::FlowConfig;
use crate::engine::control::RunControl;
use crate::engine::reorder::{ReorderBuffer, Reordered};
use crate::engine::result::{RunCounter, RunReport};
use crate::engine::stage::{SharedRegistry, StageDescriptor, StageTable};
use crate::engine::stream::{strip_origin, Clip, Count, EnvelopeStream, InlineStage, TaggedStream};
use crate::engine::unit::unit_for;
use crate::engine::worker::WorkerPool;
use crate::error::FlowError;
use crate::io::{Sink, Source};
use crate::utils::{ScopedTimer, Throughput};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Created,
    Clipping,
    Staging,
    Counting,
    Reordering,
    Sinking,
    Finished,
}

/// Cancels a running flow from another thread.
#[derive(Debug, Clone)]
pub struct InterruptHandle {
    control: RunControl,
}

impl InterruptHandle {
    pub fn trigger(&self) {
        log::info!("Interrupt requested");
        self.control.interrupt();
    }

    pub fn is_triggered(&self) -> bool {
        self.control.is_cancelled()
    }
}

pub struct Flow {
    identity: String,
    registry: SharedRegistry,
    stages: StageTable,
    source: Box<dyn Source>,
    sink: Box<dyn Sink>,
    config: FlowConfig,
    control: RunControl,
    counter: Arc<RunCounter>,
    state: RunState,
}

impl Flow {
    pub fn new(
        identity: &str,
        registry: SharedRegistry,
        stages: StageTable,
        source: Box<dyn Source>,
        sink: Box<dyn Sink>,
        config: FlowConfig,
    ) -> Self {
        Self {
            identity: identity.to_string(),
            registry,
            stages,
            source,
            sink,
            config,
            control: RunControl::new(),
            counter: Arc::new(RunCounter::new()),
            state: RunState::Created,
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle {
            control: self.control.clone(),
        }
    }

    pub fn run(&mut self) -> Result<RunReport, FlowError> {
        self.main(self.config.offset, self.config.head_count)
    }

    /// Runs the whole chain into the sink, skipping `offset` source records and
    /// processing at most `limit` of the rest.
    pub fn main(&mut self, offset: usize, limit: Option<usize>) -> Result<RunReport, FlowError> {
        if self.state != RunState::Created {
            return Err(FlowError::InvalidState(format!(
                "flow '{}' can only run once (state: {:?})",
                self.identity, self.state
            )));
        }

        let _timer = ScopedTimer::new(&format!("flow {}", self.identity));
        let started = Instant::now();

        let descriptors = self.registry.read().stages_for(&self.identity);
        let max_workers = self.running_worker_count(&descriptors);

        for (index, descriptor) in descriptors.iter().enumerate() {
            log::info!("stage_{}: {}", index, descriptor);
        }

        let outcome = self.drive(&descriptors, max_workers, offset, limit);
        self.state = RunState::Finished;

        if let Some(fault) = self.control.take_fault() {
            return Err(fault);
        }
        outcome?;

        let report = RunReport::from_counter(
            &self.identity,
            &self.counter,
            self.control.is_cancelled(),
            started.elapsed(),
        );
        log::info!("[{}] {}", self.identity, report);

        Ok(report)
    }

    fn drive(
        &mut self,
        descriptors: &[StageDescriptor],
        max_workers: usize,
        offset: usize,
        limit: Option<usize>,
    ) -> Result<(), FlowError> {
        let source = self.source.open()?;

        self.state = RunState::Clipping;
        let clipped: EnvelopeStream = Box::new(
            Clip::new(source, offset, limit, self.control.clone()).verbose(self.config.verbose),
        );

        self.state = RunState::Staging;
        let staged = self.run_stages(clipped, descriptors)?;

        self.state = RunState::Counting;
        let counted: TaggedStream = Box::new(Count::new(staged, self.counter.clone()));

        let ordered: TaggedStream = if self.config.keep_order {
            self.state = RunState::Reordering;
            let buffer = ReorderBuffer::for_workers(max_workers, self.config.reorder_slack);
            log::debug!("Restoring order with a buffer of {}", buffer.bound());
            Box::new(Reordered::new(counted, buffer).with_counter(self.counter.clone()))
        } else {
            counted
        };

        let records = strip_origin(ordered, self.counter.clone());
        let mut records = Throughput::new(records, &self.identity, self.config.progress_step);

        self.state = RunState::Sinking;
        let result = self.sink.consume(&mut records);

        // Joins every pool still running when the sink stopped early.
        drop(records);

        result
    }

    /// Largest worker count among the stages that have a transform and will run.
    fn running_worker_count(&self, descriptors: &[StageDescriptor]) -> usize {
        descriptors
            .iter()
            .filter(|d| self.stages.contains(d.name()))
            .map(|d| d.workers())
            .max()
            .unwrap_or(0)
    }

    fn run_stages(
        &self,
        mut items: EnvelopeStream,
        descriptors: &[StageDescriptor],
    ) -> Result<EnvelopeStream, FlowError> {
        for descriptor in descriptors {
            let factory = match self.stages.get(descriptor.name()) {
                Some(factory) => factory,
                None => {
                    log::warn!("No transform for stage '{}', skipping", descriptor.name());
                    continue;
                }
            };

            items = if descriptor.is_parallel() {
                let unit = unit_for(descriptor.kind(), factory);
                let pool = WorkerPool::new(descriptor.name(), descriptor.workers(), self.control.clone())
                    .with_capacity(self.config.queue_capacity)
                    .with_poll_interval(self.config.poll_interval());
                Box::new(pool.run(items, unit.as_ref())?)
            } else {
                Box::new(InlineStage::new(
                    items,
                    descriptor.name(),
                    factory(),
                    self.control.clone(),
                ))
            };
        }

        Ok(items)
    }
}
