//! Provides named worker threads with channel senders for the Warden Discord bot.
#![deny(clippy::expect_used, unsafe_code, clippy::unwrap_used)]
#![warn(clippy::nursery, clippy::todo, clippy::pedantic, missing_docs)]
#![allow(clippy::module_name_repetitions)]

use std::ops::{Deref, DerefMut};
use std::thread::{Builder, JoinHandle, Thread};

use crossbeam_channel::{Receiver, SendError, Sender};

/// A named thread's join handle.
#[repr(transparent)]
#[derive(Debug)]
pub struct Handle<T: Send + 'static> {
    /// The inner join handle.
    inner: JoinHandle<T>,
}

impl<T: Send + 'static> Handle<T> {
    /// Spawns a new named thread that runs the given function.
    ///
    /// # Errors
    ///
    /// This function will return an error if the operating system refuses to spawn the thread.
    pub fn spawn<F>(name: impl AsRef<str>, f: F) -> std::io::Result<Self>
    where
        F: (FnOnce() -> T) + Send + 'static,
    {
        // thread names may not contain interior null bytes.
        let name = name.as_ref().replace('\0', r"\0");
        let inner = Builder::new().name(name).spawn(f)?;

        Ok(Self { inner })
    }

    /// Returns the underlying thread.
    #[inline]
    #[must_use]
    pub fn thread(&self) -> &Thread {
        self.inner.thread()
    }

    /// Returns whether the thread has returned.
    #[inline]
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }

    /// Blocks until the thread returns, yielding its value.
    ///
    /// Returns [`None`] if the thread panicked.
    #[inline]
    #[must_use]
    pub fn join(self) -> Option<T> {
        self.inner.join().ok()
    }
}

/// A value that owns a thread's join handle.
pub trait HandledThread<T: Send + 'static> {
    /// Returns the inner thread handle.
    fn as_handle(&self) -> &Handle<T>;

    /// Consumes the value and returns the thread handle.
    fn into_handle(self) -> Handle<T>;

    /// Blocks until the thread returns, yielding its value.
    ///
    /// Returns [`None`] if the thread panicked.
    #[must_use]
    fn join(self) -> Option<T>
    where
        Self: Sized,
    {
        self.into_handle().join()
    }

    /// Wraps the thread so that it is joined when dropped, calling `f` beforehand.
    #[inline]
    fn auto_cleaned(self, f: fn(&mut Self)) -> AutoJoin<Self, T>
    where
        Self: Sized,
    {
        AutoJoin::new(self, Some(f))
    }
}

impl<T: Send + 'static> HandledThread<T> for Handle<T> {
    #[inline]
    fn as_handle(&self) -> &Self {
        self
    }

    #[inline]
    fn into_handle(self) -> Self {
        self
    }
}

/// A thread that owns a sender into its own input channel.
pub trait SenderThread<S: Send + 'static> {
    /// Returns a new sender linked to the thread's input channel.
    fn clone_sender(&self) -> Sender<S>;

    /// Sends a value to the thread.
    ///
    /// # Errors
    ///
    /// This function will return an error if the thread's receiver has been dropped.
    fn send(&self, value: S) -> Result<(), SendError<S>>;
}

/// A thread that consumes every value sent into its channel.
#[derive(Debug)]
pub struct Consumer<S, T>
where
    S: Send + 'static,
    T: Send + 'static,
{
    /// The thread's join handle.
    handle: Handle<T>,
    /// The sending half of the thread's channel.
    sender: Sender<S>,
}

impl<S, T> Consumer<S, T>
where
    S: Send + 'static,
    T: Send + 'static,
{
    /// Spawns a new named thread that receives values from an unbounded channel.
    ///
    /// # Errors
    ///
    /// This function will return an error if the operating system refuses to spawn the thread.
    pub fn spawn<F>(name: impl AsRef<str>, f: F) -> std::io::Result<Self>
    where
        F: (FnOnce(Receiver<S>) -> T) + Send + 'static,
    {
        let (sender, receiver) = crossbeam_channel::unbounded();

        Ok(Self { handle: Handle::spawn(name, move || f(receiver))?, sender })
    }
}

impl<S, T> HandledThread<T> for Consumer<S, T>
where
    S: Send + 'static,
    T: Send + 'static,
{
    #[inline]
    fn as_handle(&self) -> &Handle<T> {
        &self.handle
    }

    #[inline]
    fn into_handle(self) -> Handle<T> {
        self.handle
    }
}

impl<S, T> SenderThread<S> for Consumer<S, T>
where
    S: Send + 'static,
    T: Send + 'static,
{
    #[inline]
    fn clone_sender(&self) -> Sender<S> {
        self.sender.clone()
    }

    #[inline]
    fn send(&self, value: S) -> Result<(), SendError<S>> {
        self.sender.send(value)
    }
}

/// Joins the wrapped thread when dropped.
///
/// An optional cleanup function runs right before joining, which is where a consumer thread is
/// usually told to stop.
#[derive(Debug)]
pub struct AutoJoin<T, R>
where
    T: HandledThread<R>,
    R: Send + 'static,
{
    /// The wrapped thread, taken on drop.
    inner: Option<T>,
    /// Called before the thread is joined.
    before: Option<fn(&mut T)>,
    /// Return value marker.
    _marker: std::marker::PhantomData<fn() -> R>,
}

impl<T, R> AutoJoin<T, R>
where
    T: HandledThread<R>,
    R: Send + 'static,
{
    /// Wraps the given thread.
    #[must_use]
    pub const fn new(inner: T, before: Option<fn(&mut T)>) -> Self {
        Self { inner: Some(inner), before, _marker: std::marker::PhantomData }
    }
}

impl<T, R> Deref for AutoJoin<T, R>
where
    T: HandledThread<R>,
    R: Send + 'static,
{
    type Target = T;

    fn deref(&self) -> &Self::Target {
        // only `None` during `drop`.
        #[allow(clippy::unwrap_used)]
        self.inner.as_ref().unwrap()
    }
}

impl<T, R> DerefMut for AutoJoin<T, R>
where
    T: HandledThread<R>,
    R: Send + 'static,
{
    fn deref_mut(&mut self) -> &mut Self::Target {
        // only `None` during `drop`.
        #[allow(clippy::unwrap_used)]
        self.inner.as_mut().unwrap()
    }
}

impl<T, R> Drop for AutoJoin<T, R>
where
    T: HandledThread<R>,
    R: Send + 'static,
{
    fn drop(&mut self) {
        let Some(mut thread) = self.inner.take() else {
            return;
        };

        if let Some(before) = self.before {
            before(&mut thread);
        }

        drop(thread.join());
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn consumer_receives_every_value() {
        let thread = Consumer::spawn("sum", |receiver| receiver.iter().sum::<u32>()).unwrap();

        for value in 1..=4 {
            thread.send(value).unwrap();
        }

        let Consumer { handle, sender } = thread;

        drop(sender);

        assert_eq!(handle.join(), Some(10));
    }

    #[test]
    fn handle_keeps_thread_name() {
        let handle = Handle::spawn("named\0thread", || std::thread::current().name().map(String::from)).unwrap();

        assert_eq!(handle.thread().name(), Some(r"named\0thread"));
        assert_eq!(handle.join().flatten().as_deref(), Some(r"named\0thread"));
    }

    #[test]
    fn auto_join_runs_cleanup_before_joining() {
        static STOPPED: AtomicUsize = AtomicUsize::new(0);

        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let thread = Consumer::spawn("counter", move |receiver| {
            while let Ok(stop) = receiver.recv() {
                if stop {
                    break;
                }

                counter.fetch_add(1, Ordering::SeqCst);
            }
        })
        .unwrap();

        {
            let wrapped = thread.auto_cleaned(|t: &mut Consumer<bool, ()>| {
                STOPPED.fetch_add(1, Ordering::SeqCst);
                t.send(true).ok();
            });

            wrapped.send(false).unwrap();
            wrapped.send(false).unwrap();
        }

        assert_eq!(STOPPED.load(Ordering::SeqCst), 1);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
