//! Ordered release of resources acquired during startup.

use std::fmt::Display;

use tokio::runtime::{Handle, RuntimeFlavor};

type Action = Box<dyn FnOnce() -> Result<(), String> + Send>;

/// Registry of named teardown actions.
///
/// Actions run in registration order, each at most once. A failing action
/// is logged and the rest still run. A `Teardown` dropped without an explicit
/// [`Teardown::run`] runs its actions on drop, so every exit path releases
/// what was acquired before it.
///
/// Actions may block. When dropped on a worker of a multi-threaded `tokio`
/// runtime they run inside [`tokio::task::block_in_place`]; a current-thread
/// runtime is blocked until they finish.
#[derive(Default)]
pub struct Teardown {
    actions: Vec<(&'static str, Action)>,
}

impl Teardown {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `action` under `name`.
    pub fn register<F, E>(&mut self, name: &'static str, action: F)
    where
        F: FnOnce() -> Result<(), E> + Send + 'static,
        E: Display,
    {
        self.actions
            .push((name, Box::new(move || action().map_err(|e| e.to_string()))));
    }

    /// Number of actions that have not run yet.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether there is nothing left to run.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Run every registered action, returns how many of them failed.
    pub fn run(&mut self) -> usize {
        let mut failed = 0;

        for (name, action) in self.actions.drain(..) {
            vlog::debug!("running teardown action '{name}'");

            if let Err(e) = action() {
                vlog::error!("teardown action '{name}' failed: {e}");
                failed += 1;
            }
        }

        failed
    }
}

impl Drop for Teardown {
    fn drop(&mut self) {
        if self.actions.is_empty() {
            return;
        }

        let on_worker = Handle::try_current()
            .map(|handle| handle.runtime_flavor() == RuntimeFlavor::MultiThread)
            .unwrap_or(false);

        if on_worker {
            tokio::task::block_in_place(|| self.run());
        } else {
            self.run();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Mutex,
        },
        time::Duration,
    };

    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn actions_run_once_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut teardown = Teardown::new();

        for name in ["telemetry", "subscription"] {
            let log = log.clone();
            teardown.register(name, move || {
                log.lock().unwrap().push(name);
                Ok::<_, String>(())
            });
        }

        assert_eq!(teardown.run(), 0);
        assert_eq!(teardown.run(), 0);
        drop(teardown);

        assert_eq!(*log.lock().unwrap(), vec!["telemetry", "subscription"]);
    }

    #[test]
    fn failure_does_not_stop_the_rest() {
        let ran = Arc::new(AtomicUsize::new(0));
        let mut teardown = Teardown::new();

        teardown.register("failing", || Err("collector unreachable"));
        let counter = ran.clone();
        teardown.register("after", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(())
        });

        assert_eq!(teardown.run(), 1);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert!(teardown.is_empty());
    }

    #[test]
    fn drop_runs_pending_actions() {
        let ran = Arc::new(AtomicUsize::new(0));
        let mut teardown = Teardown::new();

        let counter = ran.clone();
        teardown.register("telemetry", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(())
        });
        assert_eq!(teardown.len(), 1);

        drop(teardown);

        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn drop_on_worker_does_not_stall_other_tasks() {
        let (started_tx, started_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let mut teardown = Teardown::new();

        teardown.register("telemetry", move || {
            started_tx.send(()).map_err(|e| e.to_string())?;
            release_rx.recv().map_err(|e| e.to_string())
        });

        let dropped = tokio::spawn(async move { drop(teardown) });

        tokio::task::spawn_blocking(move || started_rx.recv())
            .await
            .unwrap()
            .unwrap();

        // The only worker is inside the action, another task still gets to run.
        let other = tokio::spawn(async { 7 });
        let res = tokio::time::timeout(Duration::from_secs(5), other).await;

        release_tx.send(()).unwrap();
        assert_eq!(res.unwrap().unwrap(), 7);
        dropped.await.unwrap();
    }
}
