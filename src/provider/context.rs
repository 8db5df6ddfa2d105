//! Per-operation context: deadline, operation id and log span.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{Instrument, Span, info_span};
use uuid::Uuid;

use crate::error::{ApiError, Result};

/// Context threaded through every API call and poll loop of one operation.
///
/// Child contexts never extend a deadline and always log inside a child span
/// of their parent.
#[derive(Debug, Clone)]
pub struct OpContext {
    deadline: Option<Instant>,
    operation_id: Uuid,
    span: Span,
}

impl OpContext {
    /// Creates a root context for one resource operation.
    #[must_use]
    pub fn new(resource: &str, operation: &str) -> Self {
        let operation_id = Uuid::new_v4();
        let span = info_span!(
            "operation",
            resource = %resource,
            operation = %operation,
            operation_id = %operation_id
        );
        Self {
            deadline: None,
            operation_id,
            span,
        }
    }

    /// Creates a context with no deadline and no span.
    #[must_use]
    pub fn background() -> Self {
        Self {
            deadline: None,
            operation_id: Uuid::new_v4(),
            span: Span::none(),
        }
    }

    /// Returns a child context whose deadline is at most `timeout` from now.
    #[must_use]
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Returns a child context whose deadline is at most `deadline`.
    #[must_use]
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = self.deadline.map_or(deadline, |current| current.min(deadline));
        Self {
            deadline: Some(deadline),
            operation_id: self.operation_id,
            span: self.span.clone(),
        }
    }

    /// Returns a context for cleanup once this operation is over: same
    /// operation id and span, with a fresh deadline `timeout` from now even
    /// if this context has already expired.
    #[must_use]
    pub fn teardown(&self, timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
            operation_id: self.operation_id,
            span: self.span.clone(),
        }
    }

    /// Returns a child context logging with an extra entity field.
    #[must_use]
    pub fn with_entity(&self, kind: &'static str, id: i64) -> Self {
        let span = info_span!(parent: &self.span, "entity", kind, id);
        Self {
            deadline: self.deadline,
            operation_id: self.operation_id,
            span,
        }
    }

    /// Operation id shared by the whole context chain.
    #[must_use]
    pub const fn operation_id(&self) -> Uuid {
        self.operation_id
    }

    /// Deadline, if any.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Log span.
    #[must_use]
    pub const fn span(&self) -> &Span {
        &self.span
    }

    /// Time left before the deadline; `None` without a deadline.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Returns true once the deadline has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// Runs `fut` inside the span, failing with a timeout at the deadline.
    ///
    /// # Errors
    ///
    /// Returns the future's error, or [`ApiError::Timeout`] naming `what`.
    pub async fn run<T, F>(&self, what: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let fut = fut.instrument(self.span.clone());
        match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, fut)
                .await
                .map_err(|_| ApiError::timeout(what))?,
            None => fut.await,
        }
    }

    /// Sleeps for `duration`, cut short at the deadline.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Timeout`] naming `what` if the deadline passed.
    pub async fn sleep(&self, what: &str, duration: Duration) -> Result<()> {
        let wake = Instant::now() + duration;
        let wake = self.deadline.map_or(wake, |deadline| deadline.min(wake));
        tokio::time::sleep_until(wake).await;

        if self.is_expired() {
            return Err(ApiError::timeout(what).into());
        }
        Ok(())
    }
}

impl Default for OpContext {
    fn default() -> Self {
        Self::background()
    }
}
