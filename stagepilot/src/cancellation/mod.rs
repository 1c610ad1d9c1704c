//! Cooperative cancellation for background polling jobs.

mod token;

pub use token::CancellationToken;
