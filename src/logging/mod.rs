//! This module contains the logging infrastructure for the application.
//!
//! Diagnostics go to stderr through the usual fmt layer. While the log viewer
//! owns the terminal it attaches to the `DiagnosticsHandle`, which silences
//! the fmt layer and routes warnings and errors into the viewer instead.
pub mod collector;

pub use collector::DiagnosticsCollector;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,machine_builder=debug";

#[derive(Default)]
struct Sink {
    attached: AtomicBool,
    sender: Mutex<Option<mpsc::UnboundedSender<String>>>,
}

/// Switches diagnostics between stderr and an attached viewer.
#[derive(Clone, Default)]
pub struct DiagnosticsHandle {
    sink: Arc<Sink>,
}

impl DiagnosticsHandle {
    /// Starts routing warnings and errors to the returned receiver. A second
    /// attach replaces the first receiver.
    pub fn attach(&self) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.lock_sender() = Some(tx);
        self.sink.attached.store(true, Ordering::Release);
        rx
    }

    pub fn detach(&self) {
        self.sink.attached.store(false, Ordering::Release);
        self.lock_sender().take();
    }

    pub fn is_attached(&self) -> bool {
        self.sink.attached.load(Ordering::Acquire)
    }

    fn forward(&self, line: String) {
        if let Some(sender) = self.lock_sender().as_ref() {
            let _ = sender.send(line);
        }
    }

    fn lock_sender(&self) -> std::sync::MutexGuard<'_, Option<mpsc::UnboundedSender<String>>> {
        self.sink.sender.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Installs the global subscriber.
///
/// `RUST_LOG` overrides `DEFAULT_FILTER`. Calling this twice keeps the first
/// subscriber.
pub fn init() -> DiagnosticsHandle {
    let handle = DiagnosticsHandle::default();
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let stderr_handle = handle.clone();
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter::filter_fn(move |_| !stderr_handle.is_attached()));

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(DiagnosticsCollector::new(handle.clone()))
        .try_init();

    handle
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detach_closes_the_viewer_channel() {
        let handle = DiagnosticsHandle::default();
        let mut rx = handle.attach();
        assert!(handle.is_attached());

        handle.forward("WARN: slow".to_string());
        handle.detach();
        handle.forward("WARN: lost".to_string());

        assert_eq!(rx.try_recv().unwrap(), "WARN: slow");
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
        assert!(!handle.is_attached());
    }
}
