pub mod retry;

pub use retry::{backoff, decide, RetryDecision};
