// Tue Jan 13 2026 - Alex

use crate::engine::core::{Flow, InterruptHandle};
use crate::engine::result::RunReport;
use crate::error::FlowError;
use crossbeam_channel::{bounded, Receiver};
use std::thread;
use std::time::Duration;

/// Runs a flow on a background thread.
pub struct FlowRunner;

impl FlowRunner {
    pub fn spawn(mut flow: Flow) -> Result<FlowHandle, FlowError> {
        let interrupt = flow.interrupt_handle();
        let (tx, rx) = bounded(1);
        let name = format!("flow-{}", flow.identity());

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                let result = flow.run();
                let _ = tx.send(result);
            })
            .map_err(|source| FlowError::Spawn { unit: name, source })?;

        Ok(FlowHandle {
            thread_handle: Some(handle),
            result_receiver: rx,
            interrupt,
        })
    }
}

pub struct FlowHandle {
    thread_handle: Option<thread::JoinHandle<()>>,
    result_receiver: Receiver<Result<RunReport, FlowError>>,
    interrupt: InterruptHandle,
}

impl FlowHandle {
    pub fn wait(mut self) -> Result<RunReport, FlowError> {
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                return Err(FlowError::InvalidState("flow thread panicked".to_string()));
            }
        }

        self.result_receiver
            .recv()
            .unwrap_or_else(|_| Err(FlowError::InvalidState("No result received".to_string())))
    }

    pub fn try_get_result(&self) -> Option<Result<RunReport, FlowError>> {
        self.result_receiver.try_recv().ok()
    }

    pub fn stop(&self) {
        self.interrupt.trigger();
    }

    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    pub fn wait_timeout(self, timeout: Duration) -> Option<Result<RunReport, FlowError>> {
        self.result_receiver.recv_timeout(timeout).ok()
    }
}
