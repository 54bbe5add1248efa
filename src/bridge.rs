//! One async primitive, delivered either by `.await` or by callback.
//!
//! Every client operation returns a [`Completion`]. Awaiting it is the native path;
//! [`Completion::on_complete`] drives the same future without an executor and hands
//! the outcome to a callback exactly once.

use core::{
    fmt,
    future::{Future, IntoFuture},
    sync::atomic::{AtomicBool, Ordering},
    task::{Context, Poll},
};
use std::sync::Arc;

use async_lock::Mutex;
use futures_channel::oneshot;
use futures_util::{
    Stream, StreamExt,
    future::BoxFuture,
    task::{ArcWake, waker_ref},
};

use crate::{Error, Result};

/// A pending outcome of an asynchronous operation.
#[must_use = "a completion does nothing unless awaited or given a callback"]
pub struct Completion<T> {
    future: BoxFuture<'static, Result<T>>,
}

impl<T> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion").finish_non_exhaustive()
    }
}

impl<T: Send + 'static> Completion<T> {
    /// Wrap a future.
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        Self {
            future: Box::pin(future),
        }
    }

    /// An already finished completion.
    pub fn ready(result: Result<T>) -> Self {
        Self::new(core::future::ready(result))
    }

    /// Adapt a callback-style source.
    ///
    /// `start` runs immediately and receives a [`Resolver`]. It may resolve on the spot,
    /// later from any thread, or never; dropping the resolver unresolved completes with
    /// [`Error::EmptyResource`].
    pub fn from_callback(start: impl FnOnce(Resolver<T>)) -> Self {
        let (sender, receiver) = oneshot::channel();
        start(Resolver { sender });
        Self::new(async move { receiver.await.unwrap_or(Err(Error::EmptyResource)) })
    }

    /// Complete with the first item of `stream`, or [`Error::EmptyResource`] if it ends
    /// without one.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<T>> + Send + 'static,
    {
        Self::new(async move {
            futures_util::pin_mut!(stream);
            stream.next().await.unwrap_or(Err(Error::EmptyResource))
        })
    }

    /// Transform the success value.
    pub fn map<U, F>(self, f: F) -> Completion<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Result<U> + Send + 'static,
    {
        Completion::new(async move { f(self.future.await?) })
    }

    /// Chain another completion after this one succeeds.
    pub fn and_then<U, F>(self, f: F) -> Completion<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Completion<U> + Send + 'static,
    {
        Completion::new(async move { f(self.future.await?).await })
    }

    /// Deliver the outcome to `callback`.
    ///
    /// The future is polled on the calling thread first and then on whichever thread
    /// wakes it. `callback` runs exactly once, after the future has been dropped. If the
    /// operation completes synchronously, `callback` runs before this returns. If the
    /// future is abandoned by its wakers, it is dropped together with `callback`.
    pub fn on_complete<F>(self, callback: F)
    where
        F: FnOnce(Result<T>) + Send + 'static,
    {
        let task = Arc::new(Task {
            slot: Mutex::new(Some(Pending {
                future: self.future,
                callback: Box::new(callback),
            })),
            notified: AtomicBool::new(false),
        });
        task.run();
    }
}

impl<T> IntoFuture for Completion<T> {
    type Output = Result<T>;
    type IntoFuture = BoxFuture<'static, Result<T>>;

    fn into_future(self) -> Self::IntoFuture {
        self.future
    }
}

/// One-shot handle completing a [`Completion::from_callback`].
pub struct Resolver<T> {
    sender: oneshot::Sender<Result<T>>,
}

impl<T> fmt::Debug for Resolver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("canceled", &self.sender.is_canceled())
            .finish()
    }
}

impl<T> Resolver<T> {
    /// Complete with `result`. Ignored if nobody is waiting any more.
    pub fn resolve(self, result: Result<T>) {
        let _ = self.sender.send(result);
    }

    /// Complete successfully.
    pub fn succeed(self, value: T) {
        self.resolve(Ok(value));
    }

    /// Complete with an error.
    pub fn fail(self, error: Error) {
        self.resolve(Err(error));
    }
}

struct Pending<T> {
    future: BoxFuture<'static, Result<T>>,
    callback: Box<dyn FnOnce(Result<T>) + Send>,
}

struct Task<T> {
    slot: Mutex<Option<Pending<T>>>,
    // Set by every wake; cleared by the poller before each poll. Wakers store it
    // and then try the lock, the poller unlocks and then loads it, so every access
    // is `SeqCst`: at least one side must observe the other.
    notified: AtomicBool,
}

impl<T: Send + 'static> Task<T> {
    fn run(self: &Arc<Self>) {
        self.notified.store(true, Ordering::SeqCst);
        loop {
            // A wake from inside `poll`, or from another thread mid-poll, leaves
            // `notified` set for the current poller to pick up.
            let Some(mut slot) = self.slot.try_lock() else {
                return;
            };

            let mut delivered = None;
            while self.notified.swap(false, Ordering::SeqCst) {
                let Some(pending) = slot.as_mut() else {
                    return;
                };
                let waker = waker_ref(self);
                let mut cx = Context::from_waker(&waker);
                if let Poll::Ready(result) = pending.future.as_mut().poll(&mut cx) {
                    delivered = slot.take().map(|pending| (pending.callback, result));
                    break;
                }
            }
            drop(slot);

            if let Some((callback, result)) = delivered {
                callback(result);
                return;
            }
            if !self.notified.load(Ordering::SeqCst) {
                return;
            }
        }
    }
}

impl<T: Send + 'static> ArcWake for Task<T> {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.run();
    }
}
