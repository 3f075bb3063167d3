//! Runtime - Graceful shutdown, background tasks, timers and signal handling
//!
//! Background work runs on tokio natively and on the browser event loop
//! (`spawn_local` + `setTimeout`) in wasm32 builds with the `wasm` feature.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::watch;

/// Shutdown signal broadcaster
#[derive(Clone)]
pub struct Shutdown {
    sender: watch::Sender<bool>,
}

impl Default for Shutdown {
    fn default() -> Self { Self::new() }
}

impl Shutdown {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self { sender }
    }

    /// Subscribe to shutdown signal
    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal { receiver: self.sender.subscribe() }
    }

    /// Trigger shutdown. Later calls are no-ops.
    pub fn trigger(&self) {
        self.sender.send_if_modified(|triggered| {
            if *triggered {
                return false;
            }
            *triggered = true;
            true
        });
    }

    /// Check if shutdown was triggered
    pub fn is_triggered(&self) -> bool {
        *self.sender.borrow()
    }
}

/// Receiving half handed to background tasks.
pub struct ShutdownSignal {
    receiver: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Resolves once shutdown is triggered (or the `Shutdown` is gone).
    pub async fn wait(&mut self) {
        let _ = self.receiver.wait_for(|triggered| *triggered).await;
    }

    pub fn is_triggered(&self) -> bool {
        *self.receiver.borrow()
    }
}

// =============================================================================
// Background tasks
// =============================================================================

#[cfg(not(all(feature = "wasm", target_arch = "wasm32")))]
mod exec {
    use super::*;

    pub type Delay = Pin<Box<tokio::time::Sleep>>;

    pub fn delay(period: Duration) -> Delay {
        Box::pin(tokio::time::sleep(period))
    }

    pub struct Task {
        handle: tokio::task::JoinHandle<()>,
    }

    impl Task {
        pub async fn join(self) {
            if let Err(e) = self.handle.await {
                tracing::warn!("background task ended abnormally: {}", e);
            }
        }
    }

    /// Runs `future` on the ambient tokio runtime.
    pub fn spawn<F>(future: F) -> Task
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Task { handle: tokio::spawn(future) }
    }
}

#[cfg(all(feature = "wasm", target_arch = "wasm32"))]
mod exec {
    use super::*;
    use tokio::sync::oneshot;

    pub type Delay = Pin<Box<dyn Future<Output = ()>>>;

    /// `setTimeout` as a future. Never resolves outside a window context.
    pub fn delay(period: Duration) -> Delay {
        let ms = period.as_millis().min(i32::MAX as u128) as i32;
        let promise = js_sys::Promise::new(&mut |resolve, _reject| {
            if let Some(window) = web_sys::window() {
                let _ = window.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms);
            }
        });
        Box::pin(async move {
            let _ = wasm_bindgen_futures::JsFuture::from(promise).await;
        })
    }

    pub struct Task {
        done: oneshot::Receiver<()>,
    }

    impl Task {
        pub async fn join(self) {
            let _ = self.done.await;
        }
    }

    /// Runs `future` on the browser event loop.
    pub fn spawn<F>(future: F) -> Task
    where
        F: Future<Output = ()> + 'static,
    {
        let (tx, done) = oneshot::channel();
        wasm_bindgen_futures::spawn_local(async move {
            future.await;
            let _ = tx.send(());
        });
        Task { done }
    }
}

pub use exec::Task;
pub(crate) use exec::{delay, spawn, Delay};

/// Install signal handlers and return shutdown handle
#[cfg(feature = "native")]
pub fn install_signal_handlers() -> Shutdown {
    let shutdown = Shutdown::new();
    let handle = shutdown.clone();

    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let (mut sigterm, mut sigint) =
                match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                    (Ok(term), Ok(int)) => (term, int),
                    _ => {
                        tracing::warn!("signal handlers unavailable");
                        return;
                    }
                };

            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
                _ = sigint.recv() => tracing::info!("Received SIGINT"),
            }
        }

        #[cfg(not(unix))]
        {
            if tokio::signal::ctrl_c().await.is_err() {
                tracing::warn!("Ctrl+C handler unavailable");
                return;
            }
            tracing::info!("Received Ctrl+C");
        }

        handle.trigger();
    });

    shutdown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn signal_resolves_after_trigger() {
        let shutdown = Shutdown::new();
        let mut signal = shutdown.signal();
        assert!(!signal.is_triggered());

        shutdown.trigger();
        shutdown.trigger();
        signal.wait().await;
        assert!(shutdown.is_triggered());

        // late subscribers see the triggered state immediately
        shutdown.signal().wait().await;
    }

    #[tokio::test]
    async fn spawned_task_joins_after_shutdown() {
        let shutdown = Shutdown::new();
        let mut signal = shutdown.signal();
        let task = spawn(async move {
            tokio::select! {
                _ = signal.wait() => {}
                _ = delay(Duration::from_secs(30)) => panic!("delay won the race"),
            }
        });
        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(2), task.join())
            .await
            .expect("task did not stop");
    }
}
