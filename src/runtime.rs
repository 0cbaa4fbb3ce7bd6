//! Runtime abstraction layer for async operations
//!
//! Tile fetches are spawned through [`spawn`], which dispatches to the
//! process-wide [`AsyncSpawner`]. With the `tokio-runtime` feature the default
//! spawner uses the ambient Tokio runtime, or a shared background runtime when
//! called from outside one. Without the feature each task is driven to
//! completion on its own thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use futures::future::{AbortHandle, Abortable};

use crate::prelude::{Future, Pin};

pub type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// A trait for spawning async tasks (object-safe version)
pub trait AsyncSpawner: Send + Sync + 'static {
    /// Spawn a future and return a handle to it
    fn spawn_boxed(&self, future: BoxFuture) -> Box<dyn AsyncHandle>;
}

/// Handle to a spawned async task
pub trait AsyncHandle: Send + Sync {
    /// Check if the task is finished
    fn is_finished(&self) -> bool;

    /// Cancel the task
    fn cancel(&self);
}

/// Convenience function for spawning with type safety
pub fn spawn<F>(future: F) -> Box<dyn AsyncHandle>
where
    F: Future<Output = ()> + Send + 'static,
{
    log::trace!("runtime::spawn");
    runtime().spawn_boxed(Box::pin(future))
}

/// Default spawner implementations
pub mod spawners {
    use super::*;

    /// Runs each task on a dedicated thread with a minimal executor.
    pub struct ThreadSpawner;

    impl AsyncSpawner for ThreadSpawner {
        fn spawn_boxed(&self, future: BoxFuture) -> Box<dyn AsyncHandle> {
            let (abort, registration) = AbortHandle::new_pair();
            let finished = Arc::new(AtomicBool::new(false));
            let done = Arc::clone(&finished);
            std::thread::spawn(move || {
                let _ = futures::executor::block_on(Abortable::new(future, registration));
                done.store(true, Ordering::Release);
            });
            Box::new(ThreadHandle { abort, finished })
        }
    }

    struct ThreadHandle {
        abort: AbortHandle,
        finished: Arc<AtomicBool>,
    }

    impl AsyncHandle for ThreadHandle {
        fn is_finished(&self) -> bool {
            self.finished.load(Ordering::Acquire)
        }

        fn cancel(&self) {
            self.abort.abort();
        }
    }

    #[cfg(feature = "tokio-runtime")]
    pub mod tokio_impl {
        use super::*;
        use ::tokio::runtime::{Builder, Handle, Runtime};
        use ::tokio::task::JoinHandle;
        use once_cell::sync::Lazy;

        /// Background runtime for callers outside of any Tokio context.
        /// HTTP clients need the Tokio reactor, so a bare executor won't do.
        static FALLBACK: Lazy<Option<Runtime>> = Lazy::new(|| {
            Builder::new_multi_thread()
                .worker_threads(2)
                .thread_name("tilecast-fetch")
                .enable_all()
                .build()
                .map_err(|e| log::warn!("failed to build fallback tokio runtime: {e}"))
                .ok()
        });

        /// Tokio-based async spawner.
        pub struct TokioSpawner;

        impl AsyncSpawner for TokioSpawner {
            fn spawn_boxed(&self, future: BoxFuture) -> Box<dyn AsyncHandle> {
                if let Ok(handle) = Handle::try_current() {
                    return Box::new(TokioHandle(handle.spawn(future)));
                }
                match FALLBACK.as_ref() {
                    Some(runtime) => {
                        log::trace!("no tokio runtime in scope, using the shared one");
                        Box::new(TokioHandle(runtime.spawn(future)))
                    }
                    None => ThreadSpawner.spawn_boxed(future),
                }
            }
        }

        struct TokioHandle(JoinHandle<()>);

        impl AsyncHandle for TokioHandle {
            fn is_finished(&self) -> bool {
                self.0.is_finished()
            }

            fn cancel(&self) {
                self.0.abort();
            }
        }
    }
}

/// Global runtime instance
static RUNTIME: OnceLock<Box<dyn AsyncSpawner>> = OnceLock::new();

/// Install a spawner. Only the first call takes effect.
pub fn init_runtime(spawner: Box<dyn AsyncSpawner>) {
    if RUNTIME.set(spawner).is_err() {
        log::warn!("runtime already initialised; ignoring new spawner");
    }
}

/// Get the global runtime spawner
pub fn runtime() -> &'static dyn AsyncSpawner {
    RUNTIME
        .get_or_init(|| {
            #[cfg(feature = "tokio-runtime")]
            {
                Box::new(spawners::tokio_impl::TokioSpawner)
            }

            #[cfg(not(feature = "tokio-runtime"))]
            {
                Box::new(spawners::ThreadSpawner)
            }
        })
        .as_ref()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[cfg(feature = "tokio-runtime")]
    #[::tokio::test]
    async fn test_tokio_spawner() {
        let handle = spawn(async {
            ::tokio::time::sleep(Duration::from_millis(10)).await;
        });

        assert!(!handle.is_finished());

        ::tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.is_finished());
    }

    #[cfg(feature = "tokio-runtime")]
    #[test]
    fn test_tokio_spawner_outside_runtime_has_reactor() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        // tokio timers panic without a reactor
        let handle = spawners::tokio_impl::TokioSpawner.spawn_boxed(Box::pin(async move {
            ::tokio::time::sleep(Duration::from_millis(5)).await;
            flag.store(true, Ordering::SeqCst);
        }));

        for _ in 0..200 {
            if handle.is_finished() {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(handle.is_finished());
        assert!(fired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_thread_spawner_outside_runtime() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let handle = spawners::ThreadSpawner.spawn_boxed(Box::pin(async move {
            flag.store(true, Ordering::SeqCst);
        }));

        for _ in 0..100 {
            if handle.is_finished() {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(handle.is_finished());
        assert!(ran.load(Ordering::SeqCst));
    }
}
