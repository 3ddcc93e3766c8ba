//! Transaction retry policy.
//!
//! Everything here is pure: the server's executor owns the I/O and the sleep,
//! this module only decides *whether* a failure is worth another attempt and
//! *how long* to wait before it.

use std::time::Duration;

/// Error code the executor assigns when the work or commit exceeds `timeout`.
pub const TRANSACTION_TIMEOUT_CODE: &str = "TRANSACTION_TIMEOUT";
/// Error code the executor assigns when beginning a transaction exceeds `max_wait`.
pub const ACQUIRE_TIMEOUT_CODE: &str = "ACQUIRE_TIMEOUT";
/// Error code for a pool that could not hand out a connection in time.
pub const POOL_TIMEOUT_CODE: &str = "POOL_TIMEOUT";
/// Error code for a refused TCP connection to the database.
pub const CONNECTION_REFUSED_CODE: &str = "CONNECTION_REFUSED";

/// Codes that mark a failure as transient.
///
/// - transaction timeout: `25P03` (`idle_in_transaction_session_timeout`), [`TRANSACTION_TIMEOUT_CODE`]
/// - connection refused: `08001`, `08006`, [`CONNECTION_REFUSED_CODE`]
/// - generic timeout: `57014` (`statement_timeout`), [`POOL_TIMEOUT_CODE`], [`ACQUIRE_TIMEOUT_CODE`]
pub const RETRYABLE_CODES: &[&str] = &[
    "25P03",
    TRANSACTION_TIMEOUT_CODE,
    "08001",
    "08006",
    CONNECTION_REFUSED_CODE,
    "57014",
    POOL_TIMEOUT_CODE,
    ACQUIRE_TIMEOUT_CODE,
];

/// Message fragments that mark a failure as transient. Matched case-sensitively.
pub const RETRYABLE_MESSAGE_FRAGMENTS: &[&str] = &["timeout", "connection", "network"];

/// Whether a failed attempt may be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retryability {
    /// Transient; try again if the budget allows.
    Retryable,
    /// Permanent; propagate immediately.
    Fatal,
}

impl Retryability {
    /// `true` for [`Retryability::Retryable`].
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Retryable)
    }
}

/// Classify a failure from its error code and message.
///
/// ```
/// use sellerdesk_core::transaction::{classify, Retryability};
///
/// assert_eq!(classify(Some("57014"), "canceling statement"), Retryability::Retryable);
/// assert_eq!(classify(None, "network unreachable"), Retryability::Retryable);
/// assert_eq!(classify(Some("23505"), "duplicate key"), Retryability::Fatal);
/// ```
#[must_use]
pub fn classify(code: Option<&str>, message: &str) -> Retryability {
    let code_matches = code.is_some_and(|code| RETRYABLE_CODES.contains(&code));
    let message_matches = RETRYABLE_MESSAGE_FRAGMENTS
        .iter()
        .any(|fragment| message.contains(fragment));

    if code_matches || message_matches {
        Retryability::Retryable
    } else {
        Retryability::Fatal
    }
}

/// Delay to wait after failed attempt number `attempt` (1-based).
///
/// `initial * 2^(attempt - 1)`, saturating, and bounded by `cap` when one is
/// given. Attempt 0 is treated as attempt 1.
///
/// ```
/// use std::time::Duration;
/// use sellerdesk_core::transaction::next_delay;
///
/// let d = Duration::from_millis(1000);
/// assert_eq!(next_delay(1, d, None), Duration::from_millis(1000));
/// assert_eq!(next_delay(3, d, None), Duration::from_millis(4000));
/// assert_eq!(next_delay(3, d, Some(Duration::from_millis(2500))), Duration::from_millis(2500));
/// ```
#[must_use]
pub fn next_delay(attempt: u32, initial: Duration, cap: Option<Duration>) -> Duration {
    let exponent = attempt.saturating_sub(1);
    let factor = 1_u32.checked_shl(exponent).unwrap_or(u32::MAX);
    let delay = initial.saturating_mul(factor);
    cap.map_or(delay, |cap| delay.min(cap))
}

/// Options for one `run_in_transaction` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionOptions {
    /// Upper bound on the work plus commit.
    pub timeout: Duration,
    /// Upper bound on acquiring a connection and beginning the transaction.
    pub max_wait: Duration,
    /// Total attempts, including the first.
    pub max_retries: u32,
    /// Delay after the first failed attempt.
    pub initial_retry_delay: Duration,
    /// Optional ceiling on any single delay. `None` means uncapped.
    pub max_retry_delay: Option<Duration>,
}

impl TransactionOptions {
    /// Default work timeout (30s).
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);
    /// Default connection wait (35s).
    pub const DEFAULT_MAX_WAIT: Duration = Duration::from_millis(35_000);
    /// Default attempt budget.
    pub const DEFAULT_MAX_RETRIES: u32 = 3;
    /// Default first retry delay (1s).
    pub const DEFAULT_INITIAL_RETRY_DELAY: Duration = Duration::from_millis(1_000);

    /// Set the attempt budget.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the first retry delay.
    #[must_use]
    pub const fn with_initial_retry_delay(mut self, delay: Duration) -> Self {
        self.initial_retry_delay = delay;
        self
    }

    /// Cap every retry delay.
    #[must_use]
    pub const fn with_max_retry_delay(mut self, cap: Duration) -> Self {
        self.max_retry_delay = Some(cap);
        self
    }

    /// Set the work timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the connection wait.
    #[must_use]
    pub const fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Attempt budget, never less than one attempt.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        if self.max_retries == 0 {
            1
        } else {
            self.max_retries
        }
    }

    /// Delay to wait after failed attempt `attempt`.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        next_delay(attempt, self.initial_retry_delay, self.max_retry_delay)
    }
}

impl Default for TransactionOptions {
    fn default() -> Self {
        Self {
            timeout: Self::DEFAULT_TIMEOUT,
            max_wait: Self::DEFAULT_MAX_WAIT,
            max_retries: Self::DEFAULT_MAX_RETRIES,
            initial_retry_delay: Self::DEFAULT_INITIAL_RETRY_DELAY,
            max_retry_delay: None,
        }
    }
}
