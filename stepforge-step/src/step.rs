//! The core [`Step`] trait every combinator in this crate implements,
//! and its type-erased [`DynStep`] counterpart — the same type-erasure
//! pattern tool collections use, applied to steps.

use async_trait::async_trait;
use serde::Serialize;

use stepforge_types::{to_structured, FromStructured, PipelineError, StepForgeError, StructuredValue};

/// An asynchronous, fallible transform from `Input` to `Output`.
///
/// Composite steps (sequence, parallel, race, …) implement this same
/// trait, so a combinator built from steps is itself a step — the
/// algebra closes over composition.
#[async_trait]
pub trait Step: Send + Sync {
    /// The value this step consumes.
    type Input: Send + 'static;
    /// The value this step produces on success.
    type Output: Send + 'static;

    /// Run the step on `input`.
    async fn run(&self, input: Self::Input) -> Result<Self::Output, StepForgeError>;
}

#[async_trait]
impl<I, O> Step for Box<dyn Step<Input = I, Output = O>>
where
    I: Send + 'static,
    O: Send + 'static,
{
    type Input = I;
    type Output = O;

    async fn run(&self, input: I) -> Result<O, StepForgeError> {
        (**self).run(input).await
    }
}

/// Object-safe counterpart of [`Step`], erasing `Input`/`Output` to
/// [`StructuredValue`] so steps of differing typed signatures can live
/// in one heterogeneous collection (a declarative `body` built from a
/// `Vec<Box<dyn DynStep>>` rather than a fixed-arity generic chain).
#[async_trait]
pub trait DynStep: Send + Sync {
    /// Deserialize `input`, run the step, and serialize its output.
    async fn run_dyn(&self, input: StructuredValue) -> Result<StructuredValue, StepForgeError>;
}

#[async_trait]
impl<S> DynStep for S
where
    S: Step,
    S::Input: FromStructured,
    S::Output: Serialize,
{
    async fn run_dyn(&self, input: StructuredValue) -> Result<StructuredValue, StepForgeError> {
        let typed_input = S::Input::from_structured(input.clone()).map_err(|e| {
            StepForgeError::from(PipelineError::ArgumentParseFailed {
                modified_args: input,
                cause: e.to_string(),
            })
        })?;
        let output = self.run(typed_input).await?;
        to_structured(&output).map_err(|e| {
            StepForgeError::from(PipelineError::ArgumentParseFailed {
                modified_args: StructuredValue::Null,
                cause: format!("output failed to serialize: {e}"),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Double;

    #[async_trait]
    impl Step for Double {
        type Input = i64;
        type Output = i64;

        async fn run(&self, input: i64) -> Result<i64, StepForgeError> {
            Ok(input * 2)
        }
    }

    #[tokio::test]
    async fn boxed_step_runs_through_the_trait_object() {
        let boxed: Box<dyn Step<Input = i64, Output = i64>> = Box::new(Double);
        assert_eq!(boxed.run(21).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn dyn_step_round_trips_through_structured_values() {
        let output = Double.run_dyn(serde_json::json!(5)).await.unwrap();
        assert_eq!(output, serde_json::json!(10));
    }

    #[tokio::test]
    async fn dyn_step_surfaces_deserialize_failures_as_pipeline_errors() {
        let err = Double.run_dyn(serde_json::json!("not a number")).await.unwrap_err();
        assert!(matches!(
            err,
            StepForgeError::Pipeline(PipelineError::ArgumentParseFailed { .. })
        ));
    }
}
