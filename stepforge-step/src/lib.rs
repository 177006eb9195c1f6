//! Step composition algebra: a small set of async combinators —
//! sequence, parallel, race, loop, map, gate — plus retry/timeout/
//! try-catch modifiers and observability hooks, all closing over the
//! same [`Step`] trait so a composed pipeline is itself a step.
//!
//! ```
//! use std::time::Duration;
//! use stepforge_step::{Step, StepExt};
//! use async_trait::async_trait;
//! use stepforge_types::StepForgeError;
//!
//! struct Trim;
//!
//! #[async_trait]
//! impl Step for Trim {
//!     type Input = String;
//!     type Output = String;
//!
//!     async fn run(&self, input: String) -> Result<String, StepForgeError> {
//!         Ok(input.trim().to_string())
//!     }
//! }
//!
//! struct Lower;
//!
//! #[async_trait]
//! impl Step for Lower {
//!     type Input = String;
//!     type Output = String;
//!
//!     async fn run(&self, input: String) -> Result<String, StepForgeError> {
//!         Ok(input.to_lowercase())
//!     }
//! }
//!
//! # async fn run() -> Result<(), StepForgeError> {
//! let pipeline = Trim.then(Lower).timeout(Duration::from_secs(1));
//! let out = pipeline.run("  HELLO  ".to_string()).await?;
//! assert_eq!(out, "hello");
//! # Ok(())
//! # }
//! ```

mod combinators;
mod step;

use std::time::Duration;

pub use combinators::{
    Emit, EmitTiming, Gate, GateResult, LoopCondition, LoopStep, MapStep, OnError, OnInput,
    OnOutput, Parallel, Race, Retry, Sequence, Timeout, TryCatch,
};
pub use step::{DynStep, Step};
use stepforge_types::StepForgeError;

/// Convenience constructors layered over every [`Step`].
pub trait StepExt: Step + Sized {
    /// Sequence `self` into `next`.
    fn then<B>(self, next: B) -> Sequence<Self, B>
    where
        B: Step<Input = Self::Output>,
    {
        Sequence::new(self, next)
    }

    /// Erase this step behind a trait object of the same signature.
    fn boxed(self) -> Box<dyn Step<Input = Self::Input, Output = Self::Output>>
    where
        Self: 'static,
    {
        Box::new(self)
    }

    /// Retry this step with exponential backoff, up to `max_attempts`
    /// total attempts.
    fn retry(self, max_attempts: u32, base_delay: Duration) -> Retry<Self>
    where
        Self::Input: Clone,
    {
        Retry::new(self, max_attempts, base_delay)
    }

    /// Fail this step with [`stepforge_types::ExecutionError::Timeout`]
    /// if it outlives `duration`.
    fn timeout(self, duration: Duration) -> Timeout<Self> {
        Timeout::new(self, duration)
    }

    /// Swap a failing `self` for `catch`, which receives the error.
    fn try_catch<C>(self, catch: C) -> TryCatch<Self, C>
    where
        C: Step<Input = StepForgeError, Output = Self::Output>,
    {
        TryCatch::new(self, catch)
    }

    /// Observe this step's input without affecting it.
    fn on_input<F>(self, observe: F) -> OnInput<Self, F>
    where
        F: Fn(&Self::Input) + Send + Sync,
    {
        OnInput::new(self, observe)
    }

    /// Observe this step's successful output without affecting it.
    fn on_output<F>(self, observe: F) -> OnOutput<Self, F>
    where
        F: Fn(&Self::Output) + Send + Sync,
    {
        OnOutput::new(self, observe)
    }

    /// Observe this step's error without swallowing it.
    fn on_error<F>(self, observe: F) -> OnError<Self, F>
    where
        F: Fn(&StepForgeError) + Send + Sync,
    {
        OnError::new(self, observe)
    }

    /// Emit a named event on the ambient event bus at `timing`.
    fn emit(self, event: impl Into<String>, timing: EmitTiming) -> Emit<Self> {
        Emit::new(self, event, timing)
    }
}

impl<S: Step> StepExt for S {}
