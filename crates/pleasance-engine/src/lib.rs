//! Pleasance content engine.
//!
//! - [`generator`] — one section in, one result out
//! - [`batch`] — many items concurrently, isolated from each other
//! - [`dispatcher`] — JSON job envelopes for serverless hosts
//! - [`worker`] — drains the content API queue

pub mod batch;
pub mod dispatcher;
pub mod generator;
pub mod prompts;
pub mod worker;

pub use batch::{BatchOrchestrator, Concurrency};
pub use dispatcher::{JobDispatcher, JobError};
pub use generator::ContentGenerator;
pub use prompts::PromptSet;
pub use worker::{BatchReport, QueueWorker};
