use std::sync::Arc;

use crate::container::Container;
use crate::step::{Step, StepOptions};

#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    #[error("Step '{name}' is not registered")]
    UnresolvedStep { name: String },
}

/// The step that stopped a transaction, and why.
#[derive(Debug, thiserror::Error)]
#[error("Step '{step}' (#{index}) failed: {source:#}")]
pub struct StepFailure {
    pub step: String,
    pub index: usize,
    pub source: anyhow::Error,
}

/// An ordered sequence of resolved steps.
pub struct Transaction<T> {
    steps: Vec<(String, Arc<dyn Step<T>>)>,
}

impl<T: Send> Transaction<T> {
    /// Resolve every name in `names` against `container`. Fails on the first
    /// name that is not registered, so a misconfigured transaction never runs.
    pub fn build<S: AsRef<str>>(
        names: &[S],
        container: &Container<T>,
    ) -> Result<Self, TransactionError> {
        let steps = names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                container
                    .resolve(name)
                    .map(|step| (name.to_string(), step))
                    .ok_or_else(|| TransactionError::UnresolvedStep {
                        name: name.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { steps })
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Run every step in order. Returns the last step's output, or `input`
    /// unchanged when there are no steps.
    pub async fn call(&self, input: T, options: &StepOptions) -> Result<T, StepFailure> {
        let mut value = input;

        for (index, (name, step)) in self.steps.iter().enumerate() {
            tracing::debug!(step = %name, index, "Running transaction step");
            value = step.call(value, options).await.map_err(|source| {
                tracing::warn!(
                    step = %name,
                    index,
                    error = %format!("{:#}", source),
                    "Transaction step failed"
                );
                StepFailure {
                    step: name.clone(),
                    index,
                    source,
                }
            })?;
        }

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Add(i64);

    #[async_trait]
    impl Step<i64> for Add {
        async fn call(&self, input: i64, _options: &StepOptions) -> anyhow::Result<i64> {
            Ok(input + self.0)
        }
    }

    struct Double;

    #[async_trait]
    impl Step<i64> for Double {
        async fn call(&self, input: i64, _options: &StepOptions) -> anyhow::Result<i64> {
            Ok(input * 2)
        }
    }

    struct Fail;

    #[async_trait]
    impl Step<i64> for Fail {
        async fn call(&self, input: i64, _options: &StepOptions) -> anyhow::Result<i64> {
            anyhow::bail!("refused {}", input)
        }
    }

    #[derive(Default)]
    struct Counting(AtomicUsize);

    #[async_trait]
    impl Step<i64> for Counting {
        async fn call(&self, input: i64, _options: &StepOptions) -> anyhow::Result<i64> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(input)
        }
    }

    fn container(counter: Arc<Counting>) -> Container<i64> {
        let mut container = Container::new();
        container
            .register("math.add_one", Arc::new(Add(1)))
            .register("math.double", Arc::new(Double))
            .register("math.fail", Arc::new(Fail))
            .register("math.count", counter);
        container
    }

    #[tokio::test]
    async fn outputs_chain_into_the_next_step() {
        let c = container(Arc::default());
        let tx = Transaction::build(&["math.add_one", "math.double"], &c).unwrap();

        assert_eq!(tx.call(3, &StepOptions::new()).await.unwrap(), 8);
        assert_eq!(tx.step_names(), vec!["math.add_one", "math.double"]);
    }

    #[tokio::test]
    async fn first_failure_short_circuits() {
        let counter = Arc::new(Counting::default());
        let c = container(counter.clone());
        let tx =
            Transaction::build(&["math.count", "math.add_one", "math.fail", "math.count"], &c)
                .unwrap();

        let failure = tx.call(1, &StepOptions::new()).await.unwrap_err();

        assert_eq!(failure.step, "math.fail");
        assert_eq!(failure.index, 2);
        assert_eq!(failure.source.to_string(), "refused 2");
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_transaction_returns_input() {
        let c = container(Arc::default());
        let tx = Transaction::build::<&str>(&[], &c).unwrap();
        assert_eq!(tx.call(42, &StepOptions::new()).await.unwrap(), 42);
    }

    #[test]
    fn unknown_step_fails_at_build_time() {
        let c = container(Arc::default());
        let err = Transaction::build(&["math.add_one", "math.sqrt"], &c)
            .err()
            .unwrap();

        assert!(matches!(
            err,
            TransactionError::UnresolvedStep { ref name } if name == "math.sqrt"
        ));
    }
}
