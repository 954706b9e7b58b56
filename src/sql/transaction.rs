// SPDX-FileCopyrightText: 2024 Softbear, Inc.
// SPDX-License-Identifier: LGPL-3.0-or-later

use crate::common::{Error, OobConfig};
use crate::log::StringLogger;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt::{Debug, Display, Formatter};
use std::hash::Hash;
use std::time::Duration;

/// Default delay between attempts.
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(10);

/// An open connection that can run statements inside a transaction.
///
/// Each database engine implements this on its own connection type. The
/// connection must not be shared with other callers while a transaction
/// is executing.
#[async_trait]
pub trait Transactional: Send {
    /// A statement, e.g. a SQL string.
    type Statement: Display + Send + Sync;
    /// Driver error.
    type Error: Debug + Display + Send;
    /// Category of driver errors, used to decide whether to retry.
    type ErrorKind: Debug + Eq + Hash + Send + Sync;

    /// Run one statement in the current transaction.
    async fn execute(&mut self, statement: &Self::Statement) -> Result<(), Self::Error>;

    /// Commit the current transaction.
    async fn commit(&mut self) -> Result<(), Self::Error>;

    /// Undo everything since the last commit.
    async fn rollback(&mut self) -> Result<(), Self::Error>;

    /// Map a driver error to its kind.
    fn classify(&self, error: &Self::Error) -> Self::ErrorKind;
}

/// Statements to execute as one unit, plus the retry policy.
#[derive(Clone, Debug)]
pub struct TransactionPlan<S, K> {
    statements: Vec<S>,
    max_retries: u32,
    retry_delay: Duration,
    retryable: HashSet<K>,
}

impl<S, K: Eq + Hash> TransactionPlan<S, K> {
    /// A plan with no retries and the default delay.
    pub fn new(statements: Vec<S>) -> Self {
        Self {
            statements,
            max_retries: 0,
            retry_delay: DEFAULT_RETRY_DELAY,
            retryable: HashSet::new(),
        }
    }

    /// A plan whose retry policy comes from the `[transaction]` table, e.g.
    ///
    /// ```toml
    /// [transaction]
    /// max_retries = 3
    /// retry_delay_secs = 2.5
    /// ```
    pub fn from_config(statements: Vec<S>, config: &OobConfig) -> Result<Self, Error> {
        #[derive(Deserialize)]
        struct TransactionConfig {
            #[serde(default)]
            max_retries: u32,
            retry_delay_secs: Option<f64>,
        }
        let mut plan = Self::new(statements);
        if let Some(TransactionConfig {
            max_retries,
            retry_delay_secs,
        }) = config.section("transaction")?
        {
            plan.max_retries = max_retries;
            if let Some(secs) = retry_delay_secs {
                plan.retry_delay = Duration::try_from_secs_f64(secs)
                    .map_err(|_| Error::config(format!("retry_delay_secs = {secs}")))?;
            }
        }
        Ok(plan)
    }

    /// Retry up to `max_retries` times (so at most `max_retries + 1` attempts).
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Wait this long after a rolled back attempt.
    pub fn retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Retry when a statement fails with this kind of error.
    pub fn retry_on(mut self, kind: K) -> Self {
        self.retryable.insert(kind);
        self
    }

    /// Retry when a statement fails with any of these kinds of error.
    pub fn retry_on_all(mut self, kinds: impl IntoIterator<Item = K>) -> Self {
        self.retryable.extend(kinds);
        self
    }

    /// Statements in execution order.
    pub fn statements(&self) -> &[S] {
        &self.statements
    }

    /// Configured number of retries.
    pub fn get_max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Configured delay between attempts.
    pub fn get_retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Whether errors of this kind are retried.
    pub fn is_retryable(&self, kind: &K) -> bool {
        self.retryable.contains(kind)
    }
}

/// Progress of `execute_transaction`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransactionState {
    /// Nothing has run yet.
    NotStarted,
    /// Statements of an attempt are executing.
    AttemptRunning,
    /// Committed. Terminal.
    Succeeded,
    /// Rolled back after a retryable error, waiting for the next attempt.
    RolledBackPendingRetry,
    /// Rolled back and gave up. Terminal.
    Failed,
}

impl Display for TransactionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(self, f)
    }
}

/// Why `execute_transaction` gave up. The connection has been rolled back in
/// every case except `Configuration`, where nothing ran.
#[derive(Debug)]
pub enum TransactionError<E> {
    /// The plan is unusable.
    Configuration(String),
    /// A statement (or the commit) failed with an error that is not retried.
    NonRetryable(E),
    /// The last allowed attempt failed with a retryable error.
    RetriesExhausted {
        /// Attempts made, including the first.
        attempts: u32,
        /// Error of the last attempt.
        source: E,
    },
    /// Rolling back a failed attempt failed too.
    RollbackFailed {
        /// Error that triggered the rollback.
        source: E,
        /// Error returned by the rollback.
        rollback: E,
    },
}

impl<E> TransactionError<E> {
    /// The driver error that failed the transaction, if any.
    pub fn source_error(&self) -> Option<&E> {
        match self {
            TransactionError::Configuration(_) => None,
            TransactionError::NonRetryable(source)
            | TransactionError::RetriesExhausted { source, .. }
            | TransactionError::RollbackFailed { source, .. } => Some(source),
        }
    }

    /// Consume and return the driver error that failed the transaction, if any.
    pub fn into_source(self) -> Option<E> {
        match self {
            TransactionError::Configuration(_) => None,
            TransactionError::NonRetryable(source)
            | TransactionError::RetriesExhausted { source, .. }
            | TransactionError::RollbackFailed { source, .. } => Some(source),
        }
    }
}

impl<E: Display> Display for TransactionError<E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionError::Configuration(s) => write!(f, "invalid transaction: {s}"),
            TransactionError::NonRetryable(e) => write!(f, "transaction failed: {e}"),
            TransactionError::RetriesExhausted { attempts, source } => {
                write!(f, "transaction failed after {attempts} attempts: {source}")
            }
            TransactionError::RollbackFailed { source, rollback } => {
                write!(f, "rollback failed ({rollback}) after: {source}")
            }
        }
    }
}

impl<E: Debug + Display> std::error::Error for TransactionError<E> {}

/// Run the plan's statements in order and commit, retrying the whole list on
/// retryable errors.
///
/// Every failed attempt is rolled back before the next attempt or before the
/// error is returned. Non-retryable errors are returned at once without using
/// up a retry.
pub async fn execute_transaction<T: Transactional + ?Sized>(
    conn: &mut T,
    plan: &TransactionPlan<T::Statement, T::ErrorKind>,
    logger: &StringLogger,
) -> Result<(), TransactionError<T::Error>> {
    if plan.statements.is_empty() {
        return Err(TransactionError::Configuration(
            "no statements to execute".to_string(),
        ));
    }

    let attempts = plan.max_retries.saturating_add(1);
    let mut state = TransactionState::NotStarted;
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        transition(logger, &mut state, TransactionState::AttemptRunning);
        logger.info(format!(
            "Start SQL transaction (attempt {attempt}/{attempts})"
        ));

        let error = match run_attempt(conn, &plan.statements, logger).await {
            Ok(()) => {
                transition(logger, &mut state, TransactionState::Succeeded);
                logger.info("End SQL transaction");
                return Ok(());
            }
            Err(error) => error,
        };

        let kind = conn.classify(&error);
        logger.warn(format!("Error raised: {error} ({kind:?}), rollback"));
        if let Err(rollback) = conn.rollback().await {
            transition(logger, &mut state, TransactionState::Failed);
            logger.error(format!("Rollback failed: {rollback}"));
            return Err(TransactionError::RollbackFailed {
                source: error,
                rollback,
            });
        }

        if !plan.is_retryable(&kind) {
            transition(logger, &mut state, TransactionState::Failed);
            logger.error(format!("Not retryable, raise error: {error}"));
            return Err(TransactionError::NonRetryable(error));
        }

        if attempt >= attempts {
            transition(logger, &mut state, TransactionState::Failed);
            logger.error(format!("Retries maxout, raise error: {error}"));
            return Err(TransactionError::RetriesExhausted {
                attempts: attempt,
                source: error,
            });
        }

        transition(logger, &mut state, TransactionState::RolledBackPendingRetry);
        logger.warn(format!(
            "Retry-{attempt} after {:?}",
            plan.retry_delay
        ));
        tokio::time::sleep(plan.retry_delay).await;
    }
}

/// Execute every statement then commit. Stops at the first failure.
async fn run_attempt<T: Transactional + ?Sized>(
    conn: &mut T,
    statements: &[T::Statement],
    logger: &StringLogger,
) -> Result<(), T::Error> {
    for statement in statements {
        logger.debug(statement.to_string());
        conn.execute(statement).await?;
    }
    conn.commit().await
}

fn transition(logger: &StringLogger, state: &mut TransactionState, next: TransactionState) {
    logger.debug(format!("{state} -> {next}"));
    *state = next;
}
