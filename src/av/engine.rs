//! One-shot initialized handle to a decode engine.
//!
//! A handle starts out uninitialized and settles exactly once, either to
//! ready (holding the engine) or to failed. Observers block on [`wait`],
//! await [`ready`] or register a continuation with [`on_ready`]; continuations
//! registered after settlement run immediately.
//!
//! Handles are cheap to clone and are passed explicitly to whatever builds a
//! decode pipeline, so independent pipelines can use independent engines.
//! [`DecoderBuffer::decode_with`] drives a buffer from a handle holding a
//! [`FrameDecoder`].
//!
//! [`DecoderBuffer::decode_with`]: crate::av::DecoderBuffer::decode_with
//! [`FrameDecoder`]: crate::av::FrameDecoder
//!
//! [`wait`]: EngineHandle::wait
//! [`ready`]: EngineHandle::ready
//! [`on_ready`]: EngineHandle::on_ready

use crate::error::{Result, TsError};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use tokio::sync::oneshot;

type Continuation<E> = Box<dyn FnOnce(Result<Arc<E>>) + Send>;

/// Observable state of an [`EngineHandle`].
#[derive(Debug)]
pub enum EngineState<E> {
    /// Initialization has not completed yet.
    Uninitialized,
    /// The engine is available.
    Ready(Arc<E>),
    /// Initialization failed; the reason is kept for every observer.
    Failed(String),
}

impl<E> Clone for EngineState<E> {
    fn clone(&self) -> Self {
        match self {
            EngineState::Uninitialized => EngineState::Uninitialized,
            EngineState::Ready(engine) => EngineState::Ready(engine.clone()),
            EngineState::Failed(reason) => EngineState::Failed(reason.clone()),
        }
    }
}

impl<E> EngineState<E> {
    fn outcome(&self) -> Option<Result<Arc<E>>> {
        match self {
            EngineState::Uninitialized => None,
            EngineState::Ready(engine) => Some(Ok(engine.clone())),
            EngineState::Failed(reason) => Some(Err(TsError::Engine(reason.clone()))),
        }
    }
}

struct Slot<E> {
    state: EngineState<E>,
    started: bool,
    continuations: Vec<Continuation<E>>,
}

struct Shared<E> {
    slot: Mutex<Slot<E>>,
    settled: Condvar,
}

/// Shared, one-shot initialized decode engine.
pub struct EngineHandle<E> {
    shared: Arc<Shared<E>>,
}

impl<E> Clone for EngineHandle<E> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<E: Send + Sync + 'static> Default for EngineHandle<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Send + Sync + 'static> EngineHandle<E> {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot {
                    state: EngineState::Uninitialized,
                    started: false,
                    continuations: Vec::new(),
                }),
                settled: Condvar::new(),
            }),
        }
    }

    /// A handle that is already ready.
    pub fn ready_with(engine: E) -> Self {
        let handle = Self::new();
        {
            let mut slot = handle.shared.slot.lock();
            slot.started = true;
            slot.state = EngineState::Ready(Arc::new(engine));
        }
        handle
    }

    pub fn state(&self) -> EngineState<E> {
        self.shared.slot.lock().state.clone()
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.shared.slot.lock().state, EngineState::Ready(_))
    }

    /// Runs `init` if no initialization has started yet and settles the
    /// handle with its result. Later calls do not run their closure; they
    /// wait for the first initialization to settle and return its outcome.
    pub fn initialize<F>(&self, init: F) -> Result<Arc<E>>
    where
        F: FnOnce() -> Result<E>,
    {
        {
            let mut slot = self.shared.slot.lock();
            if slot.started {
                drop(slot);
                return self.wait();
            }
            slot.started = true;
        }

        let mut guard = SettleOnUnwind {
            handle: self,
            armed: true,
        };
        let result = init();
        guard.armed = false;

        let state = match result {
            Ok(engine) => {
                log::info!("decode engine ready");
                EngineState::Ready(Arc::new(engine))
            }
            Err(e) => {
                log::error!("decode engine failed to initialize: {}", e);
                EngineState::Failed(e.to_string())
            }
        };
        self.settle(state)
    }

    /// Blocks the current thread until the handle settles.
    pub fn wait(&self) -> Result<Arc<E>> {
        let mut slot = self.shared.slot.lock();
        loop {
            if let Some(outcome) = slot.state.outcome() {
                return outcome;
            }
            self.shared.settled.wait(&mut slot);
        }
    }

    /// Registers `continuation` to run once the handle settles. Runs it
    /// immediately, on the calling thread, if it already has.
    pub fn on_ready<F>(&self, continuation: F)
    where
        F: FnOnce(Result<Arc<E>>) + Send + 'static,
    {
        let mut slot = self.shared.slot.lock();
        let outcome = slot.state.outcome();
        match outcome {
            Some(outcome) => {
                drop(slot);
                continuation(outcome);
            }
            None => slot.continuations.push(Box::new(continuation)),
        }
    }

    /// Resolves once the handle settles.
    pub async fn ready(&self) -> Result<Arc<E>> {
        let (tx, rx) = oneshot::channel();
        self.on_ready(move |outcome| {
            let _ = tx.send(outcome);
        });
        rx.await
            .map_err(|_| TsError::Engine("engine handle dropped before settling".into()))?
    }

    fn settle(&self, state: EngineState<E>) -> Result<Arc<E>> {
        let continuations = {
            let mut slot = self.shared.slot.lock();
            slot.state = state.clone();
            self.shared.settled.notify_all();
            std::mem::take(&mut slot.continuations)
        };

        // Continuations run outside the lock so they may use the handle.
        for continuation in continuations {
            if let Some(outcome) = state.outcome() {
                continuation(outcome);
            }
        }
        state
            .outcome()
            .unwrap_or_else(|| Err(TsError::Engine("engine did not settle".into())))
    }
}

/// Settles the handle as failed if the init closure unwinds, so waiters
/// are released instead of blocking forever.
struct SettleOnUnwind<'a, E: Send + Sync + 'static> {
    handle: &'a EngineHandle<E>,
    armed: bool,
}

impl<E: Send + Sync + 'static> Drop for SettleOnUnwind<'_, E> {
    fn drop(&mut self) {
        if self.armed {
            log::error!("decode engine initialization panicked");
            let _ = self
                .handle
                .settle(EngineState::Failed("initialization panicked".into()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[derive(Debug)]
    struct Engine {
        id: usize,
    }

    #[test]
    fn test_initializes_once() {
        let handle = EngineHandle::<Engine>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let c = calls.clone();
        let first = handle
            .initialize(|| {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(Engine { id: 1 })
            })
            .unwrap();
        let c = calls.clone();
        let second = handle
            .initialize(|| {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(Engine { id: 2 })
            })
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 1);
        assert!(handle.is_ready());
    }

    #[test]
    fn test_failure_is_terminal() {
        let handle = EngineHandle::<Engine>::new();
        let err = handle
            .initialize(|| Err(TsError::Engine("missing module".into())))
            .unwrap_err();
        assert!(err.to_string().contains("missing module"));
        assert!(matches!(handle.state(), EngineState::Failed(_)));
        assert!(handle.initialize(|| Ok(Engine { id: 3 })).is_err());
    }

    #[test]
    fn test_continuations_and_waiters() {
        let handle = EngineHandle::<Engine>::new();
        let seen = Arc::new(AtomicUsize::new(0));

        let s = seen.clone();
        handle.on_ready(move |outcome| {
            s.store(outcome.unwrap().id, Ordering::SeqCst);
        });
        assert_eq!(seen.load(Ordering::SeqCst), 0);

        let waiter = {
            let handle = handle.clone();
            thread::spawn(move || handle.wait().map(|e| e.id))
        };

        handle.initialize(|| Ok(Engine { id: 7 })).unwrap();
        assert_eq!(waiter.join().unwrap().unwrap(), 7);
        assert_eq!(seen.load(Ordering::SeqCst), 7);

        // Registered after settling: runs immediately
        let s = seen.clone();
        handle.on_ready(move |outcome| {
            s.store(outcome.unwrap().id + 1, Ordering::SeqCst);
        });
        assert_eq!(seen.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn test_panicking_init_fails_handle() {
        let handle = EngineHandle::<Engine>::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let s = seen.clone();
        handle.on_ready(move |outcome| {
            if outcome.is_err() {
                s.store(1, Ordering::SeqCst);
            }
        });

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            handle.initialize(|| -> Result<Engine> { panic!("module trapped") })
        }));
        assert!(result.is_err());

        assert!(matches!(handle.state(), EngineState::Failed(_)));
        assert!(handle.wait().is_err());
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert!(handle.initialize(|| Ok(Engine { id: 5 })).is_err());
    }

    #[test]
    fn test_ready_future() {
        let handle = EngineHandle::ready_with(Engine { id: 4 });
        let engine = tokio_test::block_on(handle.ready()).unwrap();
        assert_eq!(engine.id, 4);
    }
}
