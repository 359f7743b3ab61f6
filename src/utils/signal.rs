// Fri Jan 16 2026 - Alex

use crate::error::FlowError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

static INTERRUPTED: AtomicBool = AtomicBool::new(false);

#[cfg(unix)]
extern "C" fn on_sigint(_signal: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Installs a SIGINT handler that only raises a flag; see [`interrupted`].
#[cfg(unix)]
pub fn install_sigint_handler() -> Result<(), FlowError> {
    let handler = on_sigint as extern "C" fn(libc::c_int) as libc::sighandler_t;
    let previous = unsafe { libc::signal(libc::SIGINT, handler) };

    if previous == libc::SIG_ERR {
        return Err(FlowError::Io(std::io::Error::last_os_error()));
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn install_sigint_handler() -> Result<(), FlowError> {
    log::warn!("Interrupt handling is not supported on this platform");
    Ok(())
}

pub fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

pub fn raise_interrupt() {
    INTERRUPTED.store(true, Ordering::SeqCst);
}

pub fn reset_interrupt() {
    INTERRUPTED.store(false, Ordering::SeqCst);
}

/// Background thread that calls `on_interrupt` once when the flag is raised.
pub struct InterruptWatcher {
    done: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl InterruptWatcher {
    pub fn spawn<F>(poll: Duration, on_interrupt: F) -> Result<Self, FlowError>
    where
        F: FnOnce() + Send + 'static,
    {
        let done = Arc::new(AtomicBool::new(false));
        let stop = done.clone();

        let handle = thread::Builder::new()
            .name("interrupt-watcher".to_string())
            .spawn(move || {
                while !stop.load(Ordering::SeqCst) {
                    if interrupted() {
                        log::warn!("Interrupt received, stopping");
                        on_interrupt();
                        return;
                    }
                    thread::sleep(poll);
                }
            })
            .map_err(|source| FlowError::Spawn {
                unit: "interrupt-watcher".to_string(),
                source,
            })?;

        Ok(Self {
            done,
            thread_handle: Some(handle),
        })
    }
}

impl Drop for InterruptWatcher {
    fn drop(&mut self) {
        self.done.store(true, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watcher_fires_on_flag() {
        reset_interrupt();
        let fired = Arc::new(AtomicBool::new(false));
        let seen = fired.clone();

        let watcher = InterruptWatcher::spawn(Duration::from_millis(1), move || {
            seen.store(true, Ordering::SeqCst);
        })
        .unwrap();

        raise_interrupt();
        for _ in 0..500 {
            if fired.load(Ordering::SeqCst) {
                break;
            }
            thread::sleep(Duration::from_millis(2));
        }
        drop(watcher);
        reset_interrupt();

        assert!(fired.load(Ordering::SeqCst));
    }
}
