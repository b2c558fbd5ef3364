//! Test support, compiled with the `test-utils` feature.
//!
//! [`ScriptedDriver`] stands in for a server: replies are scripted per SQL
//! text and everything the adapter submits is recorded for later assertions.

pub mod scripted;

pub use scripted::{Reply, ScriptedDriver, Submission, SubmissionPath, TxCall};
