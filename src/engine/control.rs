// Tue Jan 13 2026 - Alex

use crate::error::FlowError;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    parent: Option<Arc<CancelToken>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that is cancelled on its own or whenever `self` is.
    pub fn child(&self) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            parent: Some(Arc::new(self.clone())),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        if self.flag.load(Ordering::SeqCst) {
            return true;
        }

        match &self.parent {
            Some(parent) => parent.is_cancelled(),
            None => false,
        }
    }
}

/// Cancellation and fault slot shared by every unit of one run.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    token: CancelToken,
    fault: Arc<Mutex<Option<FlowError>>>,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> &CancelToken {
        &self.token
    }

    pub fn interrupt(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Records a fatal fault and cancels the run. Only the first fault is kept.
    pub fn fail(&self, error: FlowError) {
        {
            let mut slot = self.fault.lock();
            if slot.is_none() {
                log::error!("{}", error);
                *slot = Some(error);
            } else {
                log::debug!("Additional fault after run was already failing: {}", error);
            }
        }

        self.token.cancel();
    }

    pub fn has_fault(&self) -> bool {
        self.fault.lock().is_some()
    }

    pub fn take_fault(&self) -> Option<FlowError> {
        self.fault.lock().take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_follows_parent() {
        let parent = CancelToken::new();
        let child = parent.child();
        let grandchild = child.child();

        assert!(!grandchild.is_cancelled());
        parent.cancel();
        assert!(child.is_cancelled());
        assert!(grandchild.is_cancelled());
    }

    #[test]
    fn test_child_cancel_does_not_reach_parent() {
        let parent = CancelToken::new();
        let child = parent.child();

        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[test]
    fn test_first_fault_wins() {
        let control = RunControl::new();
        control.fail(FlowError::Sink("first".to_string()));
        control.fail(FlowError::Sink("second".to_string()));

        assert!(control.is_cancelled());
        match control.take_fault() {
            Some(FlowError::Sink(msg)) => assert_eq!(msg, "first"),
            other => panic!("unexpected fault: {:?}", other),
        }
        assert!(!control.has_fault());
    }
}
