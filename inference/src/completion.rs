//! Write-once completion handles for background work
//!
//! A [`CompletionSource`] is consumed by completing it, so every unit of
//! work delivers exactly one outcome: a value or an error, never both. The
//! matching [`Completion`] is waited on from a plain thread or awaited as a
//! future. If the source is dropped without completing, the handle resolves
//! to [`ClassifierError::Abandoned`] instead of hanging.

use crate::error::{ClassifierError, Result};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Create a linked source/handle pair
pub fn completion<T>() -> (CompletionSource<T>, Completion<T>) {
    let (tx, rx) = oneshot::channel();
    (CompletionSource { tx }, Completion { rx })
}

/// Producer side, held by the worker
#[derive(Debug)]
pub struct CompletionSource<T> {
    tx: oneshot::Sender<Result<T>>,
}

impl<T> CompletionSource<T> {
    /// Deliver the outcome. A caller that already dropped its handle is fine.
    pub fn complete(self, outcome: Result<T>) {
        if self.tx.send(outcome).is_err() {
            log::debug!("Completion handle dropped before the result was delivered");
        }
    }

    pub fn succeed(self, value: T) {
        self.complete(Ok(value));
    }

    pub fn fail(self, error: ClassifierError) {
        self.complete(Err(error));
    }
}

/// Consumer side, returned to the caller
#[derive(Debug)]
pub struct Completion<T> {
    rx: oneshot::Receiver<Result<T>>,
}

impl<T> Completion<T> {
    /// Handle that is already resolved
    pub fn ready(outcome: Result<T>) -> Self {
        let (source, completion) = completion();
        source.complete(outcome);
        completion
    }

    /// Block the current thread until the outcome arrives.
    ///
    /// Must not be called from inside an async runtime; `.await` the
    /// handle there instead.
    pub fn wait(self) -> Result<T> {
        self.rx
            .blocking_recv()
            .unwrap_or(Err(ClassifierError::Abandoned))
    }
}

impl<T> Future for Completion<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(ClassifierError::Abandoned)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_value_crosses_threads() {
        let (source, handle) = completion::<u32>();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            source.succeed(7);
        });
        assert_eq!(handle.wait().unwrap(), 7);
    }

    #[test]
    fn test_failure_delivered() {
        let (source, handle) = completion::<u32>();
        source.fail(ClassifierError::NotInitialized);
        assert!(matches!(handle.wait(), Err(ClassifierError::NotInitialized)));
    }

    #[test]
    fn test_dropped_source_is_abandoned() {
        let (source, handle) = completion::<u32>();
        drop(source);
        assert!(matches!(handle.wait(), Err(ClassifierError::Abandoned)));
    }

    #[test]
    fn test_ready_handle() {
        assert_eq!(Completion::ready(Ok("done")).wait().unwrap(), "done");
    }

    #[test]
    fn test_completing_after_handle_dropped() {
        let (source, handle) = completion::<u32>();
        drop(handle);
        source.succeed(1);
    }

    #[tokio::test]
    async fn test_await_with_deadline() {
        let (source, handle) = completion::<&str>();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            source.succeed("late");
        });
        let outcome = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("deadline elapsed");
        assert_eq!(outcome.unwrap(), "late");
    }
}
