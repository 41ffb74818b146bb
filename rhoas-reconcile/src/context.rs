//! Caller-supplied cancellation and per-call timeouts.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;

use crate::error::{ReconcileError, Result};

/// Context threaded through every remote call.
///
/// Cloning is cheap; all clones observe the same cancellation signal.
#[derive(Debug, Clone)]
pub struct CallContext {
    cancel: watch::Receiver<bool>,
    timeout: Option<Duration>,
}

/// Triggers cancellation of every [`CallContext`] created alongside it.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl CallContext {
    /// A context plus the handle that cancels it.
    pub fn new() -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        (
            Self {
                cancel: rx,
                timeout: None,
            },
            CancelHandle { tx },
        )
    }

    /// A context that is never cancelled.
    pub fn background() -> Self {
        let (ctx, _handle) = Self::new();
        ctx
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Run one remote call, aborting it on cancellation or timeout.
    pub async fn run<F>(&self, what: &str, call: F) -> Result<F::Output>
    where
        F: Future,
    {
        if self.is_cancelled() {
            return Err(ReconcileError::Cancelled(format!("{} was not started", what)));
        }

        let mut cancel = self.cancel.clone();
        let cancelled = async move {
            loop {
                if *cancel.borrow_and_update() {
                    return;
                }
                // Sender gone: nobody can cancel any more.
                if cancel.changed().await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
        };

        let guarded = async {
            match self.timeout {
                Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
                    ReconcileError::Cancelled(format!("{} timed out after {:?}", what, limit))
                }),
                None => Ok(call.await),
            }
        };

        tokio::select! {
            out = guarded => out,
            () = cancelled => Err(ReconcileError::Cancelled(format!("{} was cancelled", what))),
        }
    }

    /// Sleep for `delay` unless cancelled first.
    pub async fn sleep(&self, delay: Duration) -> Result<()> {
        let mut cancel = self.cancel.clone();
        if *cancel.borrow_and_update() {
            return Err(ReconcileError::Cancelled("wait was cancelled".to_string()));
        }
        tokio::select! {
            () = tokio::time::sleep(delay) => Ok(()),
            changed = cancel.changed() => match changed {
                Ok(()) if *cancel.borrow() => Err(ReconcileError::Cancelled("wait was cancelled".to_string())),
                _ => {
                    tokio::time::sleep(delay).await;
                    Ok(())
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_completes() {
        let ctx = CallContext::background();
        let out = ctx.run("noop", async { 42 }).await.unwrap();
        assert_eq!(out, 42);
    }

    #[tokio::test]
    async fn test_cancel_aborts_in_flight_call() {
        let (ctx, handle) = CallContext::new();
        let call = ctx.run("slow call", tokio::time::sleep(Duration::from_secs(30)));
        let cancel = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            handle.cancel();
        };
        let (out, ()) = tokio::join!(call, cancel);
        assert!(matches!(out, Err(ReconcileError::Cancelled(_))));
        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn test_already_cancelled() {
        let (ctx, handle) = CallContext::new();
        handle.cancel();
        let out = ctx.run("call", async { 1 }).await;
        assert!(matches!(out, Err(ReconcileError::Cancelled(_))));
        assert!(ctx.sleep(Duration::from_millis(1)).await.is_err());
    }

    #[tokio::test]
    async fn test_timeout() {
        let ctx = CallContext::background().with_timeout(Duration::from_millis(10));
        let out = ctx
            .run("slow call", tokio::time::sleep(Duration::from_secs(30)))
            .await;
        let err = out.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
