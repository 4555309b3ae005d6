//! Error types for law execution.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use thiserror::Error;

use kosmos_types::StoreKey;

/// Errors raised while evaluating constraints or executing laws.
///
/// A constraint that simply fails is not an error: it is reported as an
/// invalid [`ConstraintEvaluation`](crate::ConstraintEvaluation).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LawError {
    /// A user function returned an error.
    #[error("law {law} failed: {message}")]
    Execution { law: String, message: String },

    /// A user function panicked.
    #[error("{stage} of {name} panicked: {message}")]
    Panicked {
        name: String,
        stage: &'static str,
        message: String,
    },

    /// The state violates a constraint that defines no repair.
    #[error("constraint {0} is violated and has no repair")]
    RepairUnavailable(String),

    /// A repair produced a state that still violates the constraint.
    #[error("repair of {constraint} still violates: {}", .failures.join(", "))]
    RepairIneffective {
        constraint: String,
        failures: Vec<String>,
    },

    #[error("store not found: {0}")]
    StoreNotFound(StoreKey),

    #[error("store error: {0}")]
    Store(String),
}

impl LawError {
    /// An execution failure attributed to `law`.
    pub fn execution(law: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Execution {
            law: law.into(),
            message: message.into(),
        }
    }
}

pub type LawResult<T> = Result<T, LawError>;

/// Run a user function, turning a panic into [`LawError::Panicked`].
pub(crate) fn guarded<R>(name: &str, stage: &'static str, f: impl FnOnce() -> R) -> LawResult<R> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| LawError::Panicked {
        name: name.to_string(),
        stage,
        message: panic_message(payload.as_ref()),
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
