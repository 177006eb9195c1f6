//! The combinators themselves: sequence, parallel, race, loop, map,
//! gate, plus the retry/timeout/try-catch and observability modifiers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{FuturesOrdered, FuturesUnordered};
use futures::{StreamExt, TryStreamExt};

use stepforge_context::ContextKey;
use stepforge_events::EventBusKey;
use stepforge_types::{CompositionError, DurationMs, ExecutionError, StepForgeError};

use crate::step::Step;

/// `A` then `B`: `B`'s input is `A`'s output.
pub struct Sequence<A, B> {
    first: A,
    second: B,
}

impl<A, B> Sequence<A, B> {
    /// Chain `first` into `second`.
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

#[async_trait]
impl<A, B> Step for Sequence<A, B>
where
    A: Step,
    B: Step<Input = A::Output>,
{
    type Input = A::Input;
    type Output = B::Output;

    async fn run(&self, input: A::Input) -> Result<B::Output, StepForgeError> {
        let mid = self.first.run(input).await?;
        self.second.run(mid).await
    }
}

/// Runs every child concurrently on a clone of the same input, and
/// returns the successful outputs in **completion order**. Fails only
/// if every child fails.
pub struct Parallel<I, O> {
    children: Vec<Box<dyn Step<Input = I, Output = O>>>,
}

impl<I, O> Parallel<I, O> {
    /// Build a parallel composition from `children`.
    pub fn new(children: Vec<Box<dyn Step<Input = I, Output = O>>>) -> Self {
        Self { children }
    }
}

#[async_trait]
impl<I, O> Step for Parallel<I, O>
where
    I: Clone + Send + Sync + 'static,
    O: Send + 'static,
{
    type Input = I;
    type Output = Vec<O>;

    async fn run(&self, input: I) -> Result<Vec<O>, StepForgeError> {
        let mut futs: FuturesUnordered<_> =
            self.children.iter().map(|child| child.run(input.clone())).collect();

        let mut successes = Vec::new();
        let mut errors = Vec::new();
        while let Some(result) = futs.next().await {
            match result {
                Ok(output) => successes.push(output),
                Err(error) => errors.push(error.to_string()),
            }
        }

        if successes.is_empty() && !self.children.is_empty() {
            return Err(StepForgeError::from(CompositionError::ParallelAllFailed(errors)));
        }
        Ok(successes)
    }
}

/// Runs every child concurrently and returns the first success,
/// cancelling the rest. Fails if every child fails, or if `timeout`
/// elapses before any child succeeds.
pub struct Race<I, O> {
    children: Vec<Box<dyn Step<Input = I, Output = O>>>,
    timeout: Option<Duration>,
}

impl<I, O> Race<I, O> {
    /// Build a race from `children`, with no timeout.
    pub fn new(children: Vec<Box<dyn Step<Input = I, Output = O>>>) -> Self {
        Self {
            children,
            timeout: None,
        }
    }

    /// Fail with [`CompositionError::RaceTimeout`] if no child succeeds
    /// within `duration`.
    pub fn with_timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }
}

#[async_trait]
impl<I, O> Step for Race<I, O>
where
    I: Clone + Send + Sync + 'static,
    O: Send + 'static,
{
    type Input = I;
    type Output = O;

    async fn run(&self, input: I) -> Result<O, StepForgeError> {
        let race = async {
            let mut futs: FuturesUnordered<_> =
                self.children.iter().map(|child| child.run(input.clone())).collect();

            let mut errors = Vec::new();
            while let Some(result) = futs.next().await {
                match result {
                    Ok(output) => return Ok(output),
                    Err(error) => errors.push(error.to_string()),
                }
            }
            Err(StepForgeError::from(CompositionError::RaceAllFailed(errors)))
        };

        match self.timeout {
            Some(duration) => match tokio::time::timeout(duration, race).await {
                Ok(result) => result,
                Err(_elapsed) => Err(StepForgeError::from(CompositionError::RaceTimeout)),
            },
            None => race.await,
        }
    }
}

/// A loop's stopping rule, evaluated against the body's output after
/// each iteration.
pub enum LoopCondition<T> {
    /// Keep looping while the predicate holds; stop once it doesn't.
    ContinueWhile(Arc<dyn Fn(&T) -> bool + Send + Sync>),
    /// Keep looping until the predicate holds.
    StopWhen(Arc<dyn Fn(&T) -> bool + Send + Sync>),
    /// Like `ContinueWhile`, but the predicate is itself a step.
    ContinueWhileStep(Box<dyn Step<Input = T, Output = bool>>),
    /// Like `StopWhen`, but the predicate is itself a step.
    StopWhenStep(Box<dyn Step<Input = T, Output = bool>>),
}

/// Runs a factory-produced body step up to `max_iterations` times,
/// feeding each iteration's output in as the next iteration's input,
/// until `condition` says to stop.
pub struct LoopStep<T> {
    max_iterations: usize,
    factory: Box<dyn Fn(usize) -> Box<dyn Step<Input = T, Output = T>> + Send + Sync>,
    condition: LoopCondition<T>,
}

impl<T> LoopStep<T> {
    /// `factory(iteration_index)` builds each iteration's body step;
    /// `condition` decides when to stop.
    pub fn new(
        max_iterations: usize,
        factory: impl Fn(usize) -> Box<dyn Step<Input = T, Output = T>> + Send + Sync + 'static,
        condition: LoopCondition<T>,
    ) -> Self {
        Self {
            max_iterations,
            factory: Box::new(factory),
            condition,
        }
    }
}

#[async_trait]
impl<T> Step for LoopStep<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Input = T;
    type Output = T;

    async fn run(&self, input: T) -> Result<T, StepForgeError> {
        let mut value = input;
        for iteration in 0..self.max_iterations {
            let body = (self.factory)(iteration);
            value = body.run(value).await?;

            let should_stop = match &self.condition {
                LoopCondition::ContinueWhile(predicate) => !predicate(&value),
                LoopCondition::StopWhen(predicate) => predicate(&value),
                LoopCondition::ContinueWhileStep(step) => !step.run(value.clone()).await?,
                LoopCondition::StopWhenStep(step) => step.run(value.clone()).await?,
            };
            if should_stop {
                return Ok(value);
            }
        }
        Err(StepForgeError::from(CompositionError::LoopConditionNotMet))
    }
}

/// Runs one step over every element of a `Vec`, preserving input order
/// in the output regardless of per-element completion order. The first
/// element failure fails the whole map and cancels the rest.
pub struct MapStep<S> {
    element: S,
}

impl<S> MapStep<S> {
    /// Apply `element` to every item of the input vector.
    pub fn new(element: S) -> Self {
        Self { element }
    }
}

#[async_trait]
impl<S> Step for MapStep<S>
where
    S: Step,
{
    type Input = Vec<S::Input>;
    type Output = Vec<S::Output>;

    async fn run(&self, input: Vec<S::Input>) -> Result<Vec<S::Output>, StepForgeError> {
        let futs: FuturesOrdered<_> = input.into_iter().map(|item| self.element.run(item)).collect();
        futs.try_collect().await
    }
}

/// What a [`Gate`]'s check produces.
pub enum GateResult<I> {
    /// Let `I` (possibly transformed) flow to the next step.
    Pass(I),
    /// Stop the pipeline here with `reason`.
    Block(String),
}

/// A synchronous checkpoint: pass the value through (possibly
/// transformed) or block the pipeline with a reason.
pub struct Gate<F> {
    check: F,
}

impl<F> Gate<F> {
    /// Build a gate from a synchronous `check` function.
    pub fn new(check: F) -> Self {
        Self { check }
    }
}

#[async_trait]
impl<F, I> Step for Gate<F>
where
    F: Fn(I) -> GateResult<I> + Send + Sync,
    I: Send + 'static,
{
    type Input = I;
    type Output = I;

    async fn run(&self, input: I) -> Result<I, StepForgeError> {
        match (self.check)(input) {
            GateResult::Pass(value) => Ok(value),
            GateResult::Block(reason) => Err(StepForgeError::from(CompositionError::GateBlocked(reason))),
        }
    }
}

/// Retries `step` with exponential backoff from `base_delay`, up to
/// `max_attempts` total attempts.
pub struct Retry<S> {
    step: S,
    max_attempts: u32,
    base_delay: Duration,
    should_retry: Arc<dyn Fn(&StepForgeError) -> bool + Send + Sync>,
}

impl<S> Retry<S> {
    /// Retry every error up to `max_attempts` total attempts.
    pub fn new(step: S, max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            step,
            max_attempts: max_attempts.max(1),
            base_delay,
            should_retry: Arc::new(|_| true),
        }
    }

    /// Only retry errors for which `predicate` returns `true`.
    pub fn with_predicate(
        mut self,
        predicate: impl Fn(&StepForgeError) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.should_retry = Arc::new(predicate);
        self
    }
}

#[async_trait]
impl<S> Step for Retry<S>
where
    S: Step,
    S::Input: Clone,
{
    type Input = S::Input;
    type Output = S::Output;

    async fn run(&self, input: S::Input) -> Result<S::Output, StepForgeError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.step.run(input.clone()).await {
                Ok(output) => return Ok(output),
                Err(error) => {
                    if attempt >= self.max_attempts || !(self.should_retry)(&error) {
                        return if attempt >= self.max_attempts && attempt > 1 {
                            Err(StepForgeError::from(ExecutionError::RetryExhausted {
                                attempts: attempt,
                                last_error: error.to_string(),
                            }))
                        } else {
                            Err(error)
                        };
                    }
                    let delay = self.base_delay * 2u32.saturating_pow(attempt - 1);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Races `step` against a sleep of `duration`, cancelling on expiry.
pub struct Timeout<S> {
    step: S,
    duration: Duration,
}

impl<S> Timeout<S> {
    /// Fail with [`ExecutionError::Timeout`] if `step` outlives `duration`.
    pub fn new(step: S, duration: Duration) -> Self {
        Self { step, duration }
    }
}

#[async_trait]
impl<S: Step> Step for Timeout<S> {
    type Input = S::Input;
    type Output = S::Output;

    async fn run(&self, input: S::Input) -> Result<S::Output, StepForgeError> {
        match tokio::time::timeout(self.duration, self.step.run(input)).await {
            Ok(result) => result,
            Err(_elapsed) => Err(StepForgeError::from(ExecutionError::Timeout(DurationMs::from(
                self.duration,
            )))),
        }
    }
}

/// Swaps a failing `primary` for `catch`, which receives the error.
pub struct TryCatch<S, C> {
    primary: S,
    catch: C,
}

impl<S, C> TryCatch<S, C> {
    /// Run `primary`; on failure, run `catch` with the error as input.
    pub fn new(primary: S, catch: C) -> Self {
        Self { primary, catch }
    }
}

#[async_trait]
impl<S, C> Step for TryCatch<S, C>
where
    S: Step,
    C: Step<Input = StepForgeError, Output = S::Output>,
{
    type Input = S::Input;
    type Output = S::Output;

    async fn run(&self, input: S::Input) -> Result<S::Output, StepForgeError> {
        match self.primary.run(input).await {
            Ok(output) => Ok(output),
            Err(error) => self.catch.run(error).await,
        }
    }
}

/// Runs a side-effecting observer over the input before `inner` runs.
/// The observer cannot affect the input or short-circuit the step.
pub struct OnInput<S, F> {
    inner: S,
    observe: F,
}

impl<S, F> OnInput<S, F> {
    /// Observe `inner`'s input with `observe`.
    pub fn new(inner: S, observe: F) -> Self {
        Self { inner, observe }
    }
}

#[async_trait]
impl<S, F> Step for OnInput<S, F>
where
    S: Step,
    F: Fn(&S::Input) + Send + Sync,
{
    type Input = S::Input;
    type Output = S::Output;

    async fn run(&self, input: S::Input) -> Result<S::Output, StepForgeError> {
        (self.observe)(&input);
        self.inner.run(input).await
    }
}

/// Runs a side-effecting observer over a successful output.
pub struct OnOutput<S, F> {
    inner: S,
    observe: F,
}

impl<S, F> OnOutput<S, F> {
    /// Observe `inner`'s output with `observe`.
    pub fn new(inner: S, observe: F) -> Self {
        Self { inner, observe }
    }
}

#[async_trait]
impl<S, F> Step for OnOutput<S, F>
where
    S: Step,
    F: Fn(&S::Output) + Send + Sync,
{
    type Input = S::Input;
    type Output = S::Output;

    async fn run(&self, input: S::Input) -> Result<S::Output, StepForgeError> {
        let output = self.inner.run(input).await?;
        (self.observe)(&output);
        Ok(output)
    }
}

/// Runs a side-effecting observer over a failure, without swallowing it.
pub struct OnError<S, F> {
    inner: S,
    observe: F,
}

impl<S, F> OnError<S, F> {
    /// Observe `inner`'s error with `observe`.
    pub fn new(inner: S, observe: F) -> Self {
        Self { inner, observe }
    }
}

#[async_trait]
impl<S, F> Step for OnError<S, F>
where
    S: Step,
    F: Fn(&StepForgeError) + Send + Sync,
{
    type Input = S::Input;
    type Output = S::Output;

    async fn run(&self, input: S::Input) -> Result<S::Output, StepForgeError> {
        let result = self.inner.run(input).await;
        if let Err(error) = &result {
            (self.observe)(error);
        }
        result
    }
}

/// When an [`Emit`] fires its event relative to the wrapped step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitTiming {
    /// Emit before the inner step runs.
    Before,
    /// Emit after the inner step settles (success or failure).
    After,
}

/// Emits a named event on the ambient event bus (via `EventBusKey`)
/// before or after the wrapped step runs.
pub struct Emit<S> {
    inner: S,
    event: String,
    timing: EmitTiming,
    payload: Option<serde_json::Value>,
}

impl<S> Emit<S> {
    /// Emit `event` at `timing`, with an optional static `payload`.
    pub fn new(inner: S, event: impl Into<String>, timing: EmitTiming) -> Self {
        Self {
            inner,
            event: event.into(),
            timing,
            payload: None,
        }
    }

    /// Attach a payload emitted alongside the event.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

#[async_trait]
impl<S> Step for Emit<S>
where
    S: Step,
{
    type Input = S::Input;
    type Output = S::Output;

    async fn run(&self, input: S::Input) -> Result<S::Output, StepForgeError> {
        let payload = || self.payload.clone().unwrap_or(serde_json::Value::Null);
        if self.timing == EmitTiming::Before {
            EventBusKey::current().emit(self.event.clone(), payload()).await;
        }
        let result = self.inner.run(input).await;
        if self.timing == EmitTiming::After {
            EventBusKey::current().emit(self.event.clone(), payload()).await;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::StepExt;

    struct Trim;

    #[async_trait]
    impl Step for Trim {
        type Input = String;
        type Output = String;

        async fn run(&self, input: String) -> Result<String, StepForgeError> {
            Ok(input.trim().to_string())
        }
    }

    struct Lower;

    #[async_trait]
    impl Step for Lower {
        type Input = String;
        type Output = String;

        async fn run(&self, input: String) -> Result<String, StepForgeError> {
            Ok(input.to_lowercase())
        }
    }

    struct DashSpaces;

    #[async_trait]
    impl Step for DashSpaces {
        type Input = String;
        type Output = String;

        async fn run(&self, input: String) -> Result<String, StepForgeError> {
            Ok(input.replace(' ', "-"))
        }
    }

    #[tokio::test]
    async fn sequence_runs_an_ordered_chain_of_transforms() {
        let pipeline = Trim.then(Lower).then(DashSpaces);
        let out = pipeline.run("  Hello World  ".to_string()).await.unwrap();
        assert_eq!(out, "hello-world");
    }

    struct DelayedValue {
        value: u32,
        delay: Duration,
        fail: bool,
    }

    #[async_trait]
    impl Step for DelayedValue {
        type Input = ();
        type Output = u32;

        async fn run(&self, _input: ()) -> Result<u32, StepForgeError> {
            tokio::time::sleep(self.delay).await;
            if self.fail {
                Err(StepForgeError::from(CompositionError::GateBlocked("boom".into())))
            } else {
                Ok(self.value)
            }
        }
    }

    #[tokio::test]
    async fn parallel_returns_successes_in_completion_order_and_ignores_failures() {
        let children: Vec<Box<dyn Step<Input = (), Output = u32>>> = vec![
            Box::new(DelayedValue {
                value: 1,
                delay: Duration::from_millis(5),
                fail: false,
            }),
            Box::new(DelayedValue {
                value: 2,
                delay: Duration::from_millis(15),
                fail: true,
            }),
            Box::new(DelayedValue {
                value: 3,
                delay: Duration::from_millis(25),
                fail: false,
            }),
        ];
        let parallel = Parallel::new(children);
        let out = parallel.run(()).await.unwrap();
        assert_eq!(out, vec![1, 3]);
    }

    #[tokio::test]
    async fn parallel_fails_when_every_child_fails() {
        let children: Vec<Box<dyn Step<Input = (), Output = u32>>> = vec![
            Box::new(DelayedValue {
                value: 1,
                delay: Duration::from_millis(1),
                fail: true,
            }),
            Box::new(DelayedValue {
                value: 2,
                delay: Duration::from_millis(2),
                fail: true,
            }),
        ];
        let parallel = Parallel::new(children);
        let err = parallel.run(()).await.unwrap_err();
        assert!(matches!(
            err,
            StepForgeError::Composition(CompositionError::ParallelAllFailed(_))
        ));
    }

    #[tokio::test]
    async fn race_returns_the_first_success_and_ignores_the_slower_child() {
        let children: Vec<Box<dyn Step<Input = (), Output = u32>>> = vec![
            Box::new(DelayedValue {
                value: 1,
                delay: Duration::from_millis(5),
                fail: false,
            }),
            Box::new(DelayedValue {
                value: 2,
                delay: Duration::from_millis(50),
                fail: false,
            }),
        ];
        let race = Race::new(children);
        let out = race.run(()).await.unwrap();
        assert_eq!(out, 1);
    }

    #[tokio::test]
    async fn race_times_out_when_every_child_is_too_slow() {
        let children: Vec<Box<dyn Step<Input = (), Output = u32>>> = vec![Box::new(DelayedValue {
            value: 1,
            delay: Duration::from_millis(50),
            fail: false,
        })];
        let race = Race::new(children).with_timeout(Duration::from_millis(5));
        let err = race.run(()).await.unwrap_err();
        assert!(matches!(
            err,
            StepForgeError::Composition(CompositionError::RaceTimeout)
        ));
    }

    struct Increment;

    #[async_trait]
    impl Step for Increment {
        type Input = i32;
        type Output = i32;

        async fn run(&self, input: i32) -> Result<i32, StepForgeError> {
            Ok(input + 1)
        }
    }

    #[tokio::test]
    async fn loop_runs_until_the_condition_is_met() {
        let loop_step = LoopStep::new(
            10,
            |_iteration| Increment.boxed(),
            LoopCondition::StopWhen(Arc::new(|value: &i32| *value >= 3)),
        );
        let out = loop_step.run(0).await.unwrap();
        assert_eq!(out, 3);
    }

    #[tokio::test]
    async fn loop_with_max_zero_fails_immediately_without_running_the_body() {
        let loop_step = LoopStep::new(
            0,
            |_iteration| Increment.boxed(),
            LoopCondition::StopWhen(Arc::new(|_value: &i32| true)),
        );
        let err = loop_step.run(0).await.unwrap_err();
        assert!(matches!(
            err,
            StepForgeError::Composition(CompositionError::LoopConditionNotMet)
        ));
    }

    #[tokio::test]
    async fn map_preserves_input_order_regardless_of_completion_order() {
        let map = MapStep::new(Increment);
        let out = map.run(vec![1, 2, 3]).await.unwrap();
        assert_eq!(out, vec![2, 3, 4]);
    }

    struct FailOnThree;

    #[async_trait]
    impl Step for FailOnThree {
        type Input = i32;
        type Output = i32;

        async fn run(&self, input: i32) -> Result<i32, StepForgeError> {
            if input == 3 {
                Err(StepForgeError::from(CompositionError::GateBlocked("three".into())))
            } else {
                Ok(input)
            }
        }
    }

    #[tokio::test]
    async fn map_fails_the_whole_batch_on_a_single_element_failure() {
        let map = MapStep::new(FailOnThree);
        let err = map.run(vec![1, 2, 3, 4]).await.unwrap_err();
        assert!(matches!(
            err,
            StepForgeError::Composition(CompositionError::GateBlocked(_))
        ));
    }

    #[tokio::test]
    async fn gate_blocks_with_the_given_reason() {
        let gate = Gate::new(|input: i32| {
            if input > 0 {
                GateResult::Pass(input)
            } else {
                GateResult::Block("must be positive".to_string())
            }
        });
        let err = gate.run(-1).await.unwrap_err();
        assert!(matches!(
            err,
            StepForgeError::Composition(CompositionError::GateBlocked(reason)) if reason == "must be positive"
        ));
        assert_eq!(gate.run(5).await.unwrap(), 5);
    }

    struct FlakyStep {
        calls: Arc<AtomicUsize>,
        fail_until: usize,
    }

    #[async_trait]
    impl Step for FlakyStep {
        type Input = i32;
        type Output = i32;

        async fn run(&self, input: i32) -> Result<i32, StepForgeError> {
            let attempt = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt < self.fail_until {
                Err(StepForgeError::from(CompositionError::GateBlocked("not yet".into())))
            } else {
                Ok(input)
            }
        }
    }

    #[tokio::test]
    async fn retry_succeeds_once_the_step_stops_failing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let step = FlakyStep {
            calls: calls.clone(),
            fail_until: 3,
        }
        .retry(5, Duration::from_millis(1));
        let out = step.run(42).await.unwrap();
        assert_eq!(out, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn timeout_fails_a_step_that_outlives_its_budget() {
        let step = DelayedValue {
            value: 1,
            delay: Duration::from_millis(50),
            fail: false,
        }
        .timeout(Duration::from_millis(5));
        let err = step.run(()).await.unwrap_err();
        assert!(matches!(err, StepForgeError::Execution(ExecutionError::Timeout(_))));
    }

    struct Recover;

    #[async_trait]
    impl Step for Recover {
        type Input = StepForgeError;
        type Output = i32;

        async fn run(&self, _input: StepForgeError) -> Result<i32, StepForgeError> {
            Ok(-1)
        }
    }

    #[tokio::test]
    async fn try_catch_recovers_from_a_failing_primary() {
        let step = FailOnThree.try_catch(Recover);
        assert_eq!(step.run(3).await.unwrap(), -1);
        assert_eq!(step.run(7).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn observability_modifiers_pass_values_through_unchanged() {
        let seen_input = Arc::new(AtomicUsize::new(0));
        let seen_output = Arc::new(AtomicUsize::new(0));
        let seen_input_clone = seen_input.clone();
        let seen_output_clone = seen_output.clone();

        let step = Increment
            .on_input(move |input: &i32| {
                seen_input_clone.store(*input as usize, Ordering::SeqCst);
            })
            .on_output(move |output: &i32| {
                seen_output_clone.store(*output as usize, Ordering::SeqCst);
            });

        let out = step.run(4).await.unwrap();
        assert_eq!(out, 5);
        assert_eq!(seen_input.load(Ordering::SeqCst), 4);
        assert_eq!(seen_output.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn emit_does_not_affect_the_wrapped_step_s_result() {
        let step = Increment.emit("step-finished", EmitTiming::After);
        assert_eq!(step.run(1).await.unwrap(), 2);
    }
}
