//! Host integration for `ellipsize`: target-width resolution, frame retries,
//! resize subscription lifecycle and result publication.

#![cfg_attr(
    not(test),
    deny(
        clippy::disallowed_methods,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::panic_in_result_fn,
        clippy::todo,
        clippy::unimplemented
    )
)]

mod host;
mod options;
mod reflow;

pub use ellipsize::{Content, FontContext, TextMeasurer, TruncationResult};
pub use host::{ReflowHost, ResizeSubscription};
pub use options::{LineBudget, ReflowOptions, ReflowOptionsError, RetryPolicy};
pub use reflow::{ReflowController, ReflowDiagnostic, ReflowOutcome, ReflowState};
