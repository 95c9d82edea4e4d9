//! Asynchronous renderer
//!
//! Runs a caller supplied render operation on one dedicated worker thread.
//! At most one render is in flight; requests made while the worker is busy
//! collapse into a single follow-up render that uses the latest request.
//! Finished images travel back to the owning thread over a channel, which is
//! the only way pixels leave the worker.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc;

use crate::types::{Priority, RenderedImage, Size};
use crate::{RenderError, Result};

/// Render operation: fills `image` from an immutable content snapshot
pub type RenderFn<S> = dyn Fn(&RenderContext, &S, &mut RenderedImage) + Send + Sync;

/// Extra wake condition evaluated by the worker while it is idle
pub type WakePredicate = dyn Fn(&WakeState) -> bool + Send + Sync;

/// Options for spawning a renderer
#[derive(Debug, Clone)]
pub struct RendererOptions {
    /// Name given to the worker thread
    pub worker_name: String,
}

impl Default for RendererOptions {
    fn default() -> Self {
        Self {
            worker_name: "render-worker".to_string(),
        }
    }
}

/// Coarse renderer state as seen from the owning thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    /// Nothing requested, nothing running, nothing waiting to be delivered
    Idle,
    /// A request is waiting for the worker
    Pending,
    /// The worker is painting, or its image has not been received yet
    Rendering,
}

/// Counters kept by a renderer for diagnostics and tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub scheduled: u64,
    pub coalesced: u64,
    pub rendered: u64,
    pub delivered: u64,
}

/// What an extra wake predicate can observe
#[derive(Debug, Clone, Copy)]
pub struct WakeState {
    pub has_pending: bool,
    pub has_previous: bool,
    pub aborted: bool,
}

/// Polled by long renders to bail out once the renderer is aborted
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Per-render information handed to the render operation
#[derive(Debug, Clone)]
pub struct RenderContext {
    pub sequence: u64,
    pub priority: Priority,
    pub size: Size,
    pub cancel: CancelToken,
}

/// A finished render, delivered to the owning thread
#[derive(Debug, PartialEq)]
pub struct RenderCompleted {
    /// Sequence number returned by the `schedule` call that was rendered
    pub sequence: u64,
    pub priority: Priority,
    pub image: RenderedImage,
}

struct RenderRequest<S> {
    sequence: u64,
    priority: Priority,
    size: Size,
    snapshot: Arc<S>,
}

impl<S> Clone for RenderRequest<S> {
    fn clone(&self) -> Self {
        Self {
            sequence: self.sequence,
            priority: self.priority,
            size: self.size,
            snapshot: self.snapshot.clone(),
        }
    }
}

struct State<S> {
    pending: Option<RenderRequest<S>>,
    previous: Option<RenderRequest<S>>,
    painting: bool,
    aborted: bool,
    next_sequence: u64,
    scheduled: u64,
    coalesced: u64,
    rendered: u64,
}

impl<S> State<S> {
    fn wake_state(&self) -> WakeState {
        WakeState {
            has_pending: self.pending.is_some(),
            has_previous: self.previous.is_some(),
            aborted: self.aborted,
        }
    }
}

/// Delivery bookkeeping shared with the receiver.
///
/// `aborted` mirrors the state flag and is only written while the state
/// mutex is held.
#[derive(Default)]
struct Delivery {
    aborted: Arc<AtomicBool>,
    in_transit: AtomicUsize,
    delivered: AtomicU64,
}

struct Shared<S> {
    state: Mutex<State<S>>,
    wake: Condvar,
    delivery: Arc<Delivery>,
}

impl<S> Shared<S> {
    fn lock(&self) -> MutexGuard<'_, State<S>> {
        // The state is updated in single assignments, a panic elsewhere
        // cannot leave it half written.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Owns the render worker thread
pub struct AsyncRenderer<S> {
    shared: Arc<Shared<S>>,
    worker: Option<JoinHandle<()>>,
    name: String,
}

impl<S> AsyncRenderer<S>
where
    S: Send + Sync + 'static,
{
    /// Start the worker and return the renderer with its completion stream
    pub fn spawn<F>(options: RendererOptions, render: F) -> Result<(Self, CompletionReceiver)>
    where
        F: Fn(&RenderContext, &S, &mut RenderedImage) + Send + Sync + 'static,
    {
        Self::spawn_inner(options, Box::new(render), None)
    }

    /// Like [`AsyncRenderer::spawn`], with an additional wake condition.
    ///
    /// The worker wakes when a request is pending, on abort, or when
    /// `predicate` returns true. A wake caused only by the predicate
    /// re-renders the most recent request. The predicate is re-evaluated
    /// after [`AsyncRenderer::wake`] and should consume its trigger.
    pub fn spawn_with_predicate<F, P>(
        options: RendererOptions,
        render: F,
        predicate: P,
    ) -> Result<(Self, CompletionReceiver)>
    where
        F: Fn(&RenderContext, &S, &mut RenderedImage) + Send + Sync + 'static,
        P: Fn(&WakeState) -> bool + Send + Sync + 'static,
    {
        Self::spawn_inner(options, Box::new(render), Some(Box::new(predicate)))
    }

    fn spawn_inner(
        options: RendererOptions,
        render: Box<RenderFn<S>>,
        predicate: Option<Box<WakePredicate>>,
    ) -> Result<(Self, CompletionReceiver)> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let delivery = Arc::new(Delivery::default());

        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                pending: None,
                previous: None,
                painting: false,
                aborted: false,
                next_sequence: 1,
                scheduled: 0,
                coalesced: 0,
                rendered: 0,
            }),
            wake: Condvar::new(),
            delivery: delivery.clone(),
        });

        let worker_shared = shared.clone();
        let worker_name = options.worker_name.clone();
        let worker = thread::Builder::new()
            .name(options.worker_name.clone())
            .spawn(move || {
                log::debug!("[{}] render worker started", worker_name);
                run_worker(&worker_shared, render.as_ref(), predicate.as_deref(), &sender);
                log::debug!("[{}] render worker exited", worker_name);
            })
            .map_err(RenderError::Spawn)?;

        let renderer = Self {
            shared,
            worker: Some(worker),
            name: options.worker_name,
        };

        Ok((renderer, CompletionReceiver { receiver, delivery }))
    }

    /// Request a render of `snapshot` into an image of `size`.
    ///
    /// Returns the sequence number that the matching completion will carry.
    /// If a request is already pending it is replaced, so exactly one
    /// render follows the one currently running.
    pub fn schedule(&self, priority: Priority, size: Size, snapshot: S) -> Result<u64> {
        let sequence = {
            let mut state = self.shared.lock();
            if state.aborted {
                log::warn!("[{}] schedule after abort ignored", self.name);
                return Err(RenderError::Aborted);
            }

            let sequence = state.next_sequence;
            state.next_sequence += 1;
            state.scheduled += 1;

            let replaced = state.pending.replace(RenderRequest {
                sequence,
                priority,
                size,
                snapshot: Arc::new(snapshot),
            });

            if let Some(old) = replaced {
                state.coalesced += 1;
                log::trace!("[{}] request #{} coalesced into #{}", self.name, old.sequence, sequence);
            }
            sequence
        };

        self.shared.wake.notify_one();
        Ok(sequence)
    }
}

impl<S> AsyncRenderer<S> {
    /// Re-evaluate the wake predicate without scheduling
    pub fn wake(&self) {
        self.shared.wake.notify_one();
    }

    /// Stop the worker and wait for it to exit.
    ///
    /// Any pending request is dropped and nothing is delivered afterwards.
    /// Calling it more than once is harmless.
    pub fn abort(&mut self) {
        {
            let mut state = self.shared.lock();
            if !state.aborted {
                log::debug!("[{}] aborting render worker", self.name);
            }
            state.aborted = true;
            state.pending = None;
            self.shared.delivery.aborted.store(true, Ordering::Release);
        }
        self.shared.wake.notify_all();

        if let Some(worker) = self.worker.take() {
            if worker.thread().id() == thread::current().id() {
                return;
            }
            if worker.join().is_err() {
                log::error!("[{}] render worker panicked during shutdown", self.name);
            }
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.shared.lock().aborted
    }

    pub fn status(&self) -> RenderStatus {
        let state = self.shared.lock();
        if state.painting {
            RenderStatus::Rendering
        } else if state.pending.is_some() {
            RenderStatus::Pending
        } else if self.shared.delivery.in_transit.load(Ordering::Acquire) > 0 {
            RenderStatus::Rendering
        } else {
            RenderStatus::Idle
        }
    }

    pub fn stats(&self) -> RenderStats {
        let state = self.shared.lock();
        RenderStats {
            scheduled: state.scheduled,
            coalesced: state.coalesced,
            rendered: state.rendered,
            delivered: self.shared.delivery.delivered.load(Ordering::Acquire),
        }
    }
}

impl<S> Drop for AsyncRenderer<S> {
    fn drop(&mut self) {
        self.abort();
    }
}

fn run_worker<S>(
    shared: &Shared<S>,
    render: &RenderFn<S>,
    predicate: Option<&WakePredicate>,
    sender: &mpsc::UnboundedSender<RenderCompleted>,
) {
    let cancel = CancelToken {
        flag: shared.delivery.aborted.clone(),
    };

    loop {
        let request = {
            let state = shared.lock();
            let mut state = shared
                .wake
                .wait_while(state, |s| {
                    let base = s.aborted || s.pending.is_some();
                    !base && !predicate.is_some_and(|p| p(&s.wake_state()))
                })
                .unwrap_or_else(PoisonError::into_inner);

            if state.aborted {
                return;
            }

            let request = match state.pending.take() {
                Some(request) => request,
                None => match state.previous.clone() {
                    Some(previous) => previous,
                    None => continue,
                },
            };
            state.previous = Some(request.clone());
            state.painting = true;
            request
        };

        let context = RenderContext {
            sequence: request.sequence,
            priority: request.priority,
            size: request.size,
            cancel: cancel.clone(),
        };

        let outcome = if request.size.is_empty() {
            log::trace!("render #{} skipped for empty size {}", request.sequence, request.size);
            Ok(RenderedImage::empty())
        } else {
            log::trace!("render #{} started ({}, {:?})", request.sequence, request.size, request.priority);
            panic::catch_unwind(AssertUnwindSafe(|| {
                let mut image = RenderedImage::new(request.size);
                render(&context, &request.snapshot, &mut image);
                image
            }))
        };

        let mut state = shared.lock();
        state.painting = false;

        if state.aborted {
            log::trace!("render #{} discarded after abort", request.sequence);
            return;
        }

        let image = match outcome {
            Ok(image) => image,
            Err(_) => {
                log::error!("render #{} panicked, no image delivered", request.sequence);
                continue;
            }
        };

        state.rendered += 1;
        shared.delivery.in_transit.fetch_add(1, Ordering::AcqRel);

        let completed = RenderCompleted {
            sequence: request.sequence,
            priority: request.priority,
            image,
        };

        // Sent while the lock is held so `abort` cannot slip in between the
        // abort check and the send.
        if sender.send(completed).is_err() {
            shared.delivery.in_transit.fetch_sub(1, Ordering::AcqRel);
            log::debug!("render #{} finished but the receiver is gone", request.sequence);
        }
    }
}

/// Owning-thread end of the completion channel.
///
/// Yields completions in production order. Once the renderer is aborted it
/// yields nothing, even for images that were queued before the abort.
pub struct CompletionReceiver {
    receiver: mpsc::UnboundedReceiver<RenderCompleted>,
    delivery: Arc<Delivery>,
}

impl CompletionReceiver {
    /// Take the next completion without blocking
    pub fn try_recv(&mut self) -> Option<RenderCompleted> {
        if self.discard_if_aborted() {
            return None;
        }
        let completed = self.receiver.try_recv().ok()?;
        Some(self.accept(completed))
    }

    /// Wait for the next completion. `None` once the renderer is gone.
    pub async fn recv(&mut self) -> Option<RenderCompleted> {
        if self.discard_if_aborted() {
            return None;
        }
        let completed = self.receiver.recv().await?;
        if self.discard_if_aborted() {
            return None;
        }
        Some(self.accept(completed))
    }

    /// Drain everything currently queued, oldest first
    pub fn drain(&mut self) -> Vec<RenderCompleted> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    pub fn is_aborted(&self) -> bool {
        self.delivery.aborted.load(Ordering::Acquire)
    }

    fn accept(&self, completed: RenderCompleted) -> RenderCompleted {
        self.delivery.in_transit.fetch_sub(1, Ordering::AcqRel);
        self.delivery.delivered.fetch_add(1, Ordering::AcqRel);
        completed
    }

    fn discard_if_aborted(&mut self) -> bool {
        if !self.is_aborted() {
            return false;
        }
        while self.receiver.try_recv().is_ok() {}
        self.delivery.in_transit.store(0, Ordering::Release);
        true
    }
}
