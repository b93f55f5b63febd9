//! Pipeline building and fail-fast execution.

use super::error::PipelineError;
use super::step::PipelineStep;
use crate::transforms::{Params, Transform, TransformRegistry};
use polars::prelude::DataFrame;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Report generated after a successful run
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Number of rows before processing
    pub rows_before: usize,

    /// Number of columns before processing
    pub columns_before: usize,

    /// Number of rows after processing
    pub rows_after: usize,

    /// Number of columns after processing
    pub columns_after: usize,

    /// Keys of the steps that ran, in order
    pub steps_applied: Vec<String>,

    /// Time taken for execution
    pub duration: Duration,
}

impl RunReport {
    /// One-line summary for logs and the CLI
    pub fn summary(&self) -> String {
        format!(
            "Pipeline completed: rows {} → {}, columns {} → {}, {} step(s), {:.2}s",
            self.rows_before,
            self.rows_after,
            self.columns_before,
            self.columns_after,
            self.steps_applied.len(),
            self.duration.as_secs_f64()
        )
    }
}

/// Output table plus its report
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub frame: DataFrame,
    pub report: RunReport,
}

/// Emitted around every step by [`PipelineEngine::run_with`]. `index` is zero-based.
#[derive(Debug, Clone, Copy)]
pub enum StepEvent<'a> {
    Started {
        index: usize,
        total: usize,
        step: &'a PipelineStep,
    },
    Finished {
        index: usize,
        total: usize,
        step: &'a PipelineStep,
        elapsed: Duration,
    },
}

/// Builds step lists from a registry and runs them
#[derive(Debug, Clone)]
pub struct PipelineEngine {
    registry: Arc<TransformRegistry>,
}

impl PipelineEngine {
    pub fn new(registry: Arc<TransformRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<TransformRegistry> {
        &self.registry
    }

    /// Build from separate built-in and extension selections.
    ///
    /// `core: None` selects every built-in in registry order while `Some(&[])`
    /// selects none. `extensions: None` selects no extensions. Keys must match
    /// exactly; unknown keys are logged and skipped.
    pub fn build(
        &self,
        core: Option<&[String]>,
        extensions: Option<&[String]>,
        overrides: &HashMap<String, Params>,
    ) -> Vec<PipelineStep> {
        let mut steps = Vec::new();

        match core {
            None => {
                for descriptor in self.registry.builtins() {
                    steps.push(PipelineStep::from_descriptor(
                        &descriptor,
                        overrides.get(&descriptor.key),
                    ));
                }
            }
            Some(keys) => {
                for key in keys {
                    match self.registry.get_builtin(key) {
                        Some(descriptor) => steps.push(PipelineStep::from_descriptor(
                            &descriptor,
                            overrides.get(key),
                        )),
                        None => tracing::warn!("Builtin transform not found: {key}"),
                    }
                }
            }
        }

        for key in extensions.unwrap_or_default() {
            match self.registry.get_extension(key) {
                Some(descriptor) => steps.push(PipelineStep::from_descriptor(
                    &descriptor,
                    overrides.get(key),
                )),
                None => tracing::warn!("Extension transform not found: {key}"),
            }
        }

        tracing::debug!("Built pipeline with {} step(s)", steps.len());
        steps
    }

    /// Build from identifiers (keys or names) in exactly the given order.
    ///
    /// Overrides are looked up by resolved key first, then by the identifier as written.
    pub fn build_ordered(
        &self,
        selection: &[String],
        overrides: &HashMap<String, Params>,
    ) -> Vec<PipelineStep> {
        selection
            .iter()
            .filter_map(|identifier| match self.registry.resolve(identifier) {
                Some(descriptor) => {
                    let params = overrides
                        .get(&descriptor.key)
                        .or_else(|| overrides.get(identifier));
                    Some(PipelineStep::from_descriptor(&descriptor, params))
                }
                None => {
                    tracing::warn!("Transform not found, skipping: {identifier}");
                    None
                }
            })
            .collect()
    }

    /// Wrap a caller-provided transform as an ad-hoc step
    pub fn adhoc_step(
        key: impl Into<String>,
        name: impl Into<String>,
        transform: Arc<dyn Transform>,
        params: Params,
    ) -> PipelineStep {
        PipelineStep::adhoc(key, name, transform, params)
    }

    /// Run `steps` in order on a copy of `df`
    pub fn run(steps: &[PipelineStep], df: &DataFrame) -> Result<RunOutcome, PipelineError> {
        Self::run_with(steps, df, &CancellationToken::new(), &mut |_| {})
    }

    /// Run with a cancellation token and a step observer.
    ///
    /// The token is checked before every step. The first failing step stops the
    /// run and its error is returned; intermediate frames are dropped.
    pub fn run_with(
        steps: &[PipelineStep],
        df: &DataFrame,
        cancel: &CancellationToken,
        observer: &mut dyn FnMut(StepEvent<'_>),
    ) -> Result<RunOutcome, PipelineError> {
        let start = Instant::now();
        let total = steps.len();
        let (rows_before, columns_before) = df.shape();
        tracing::info!("Pipeline starting with {total} step(s)");

        let mut frame = df.clone();
        let mut steps_applied = Vec::with_capacity(total);

        for (index, step) in steps.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::info!("Pipeline cancelled before step '{}'", step.key);
                return Err(PipelineError::cancelled(&step.key, &step.name));
            }

            observer(StepEvent::Started { index, total, step });
            tracing::info!("Step {}/{}: {} ({})", index + 1, total, step.name, step.origin);
            let step_start = Instant::now();

            frame = step.apply(&frame).map_err(|e| {
                tracing::error!("Step '{}' failed: {e:#}", step.key);
                PipelineError::apply(&step.key, &step.name, &e)
            })?;

            steps_applied.push(step.key.clone());
            observer(StepEvent::Finished {
                index,
                total,
                step,
                elapsed: step_start.elapsed(),
            });
        }

        let (rows_after, columns_after) = frame.shape();
        let report = RunReport {
            rows_before,
            columns_before,
            rows_after,
            columns_after,
            steps_applied,
            duration: start.elapsed(),
        };
        tracing::info!("{}", report.summary());

        Ok(RunOutcome { frame, report })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{PipelineStage, StepOrigin};
    use crate::transforms::{FnTransform, TransformMeta};
    use polars::prelude::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn engine() -> PipelineEngine {
        PipelineEngine::new(Arc::new(TransformRegistry::builtins_only()))
    }

    fn keys(steps: &[PipelineStep]) -> Vec<&str> {
        steps.iter().map(|s| s.key.as_str()).collect()
    }

    fn sample() -> PolarsResult<DataFrame> {
        DataFrame::new(vec![
            Column::new(" Name ".into(), [" alice", "bob ", " alice"]),
            Column::new("Score".into(), [1i64, 2, 1]),
        ])
    }

    #[test]
    fn test_build_distinguishes_missing_and_empty() {
        let engine = engine();
        let all = engine.build(None, None, &HashMap::new());
        assert_eq!(all.len(), 6);
        assert_eq!(all[0].key, "standardize_headers");

        let none = engine.build(Some(&[][..]), None, &HashMap::new());
        assert!(none.is_empty());
    }

    #[test]
    fn test_build_skips_unknown_and_merges_overrides() {
        let mut overrides = HashMap::new();
        let mut params = Params::new();
        params.insert("keep".to_owned(), json!("last"));
        overrides.insert("drop_duplicates".to_owned(), params);

        let core = vec!["drop_duplicates".to_owned(), "nope".to_owned(), "trim_spaces".to_owned()];
        let ghost = vec!["ghost".to_owned()];
        let steps = engine().build(Some(core.as_slice()), Some(ghost.as_slice()), &overrides);
        assert_eq!(keys(&steps), vec!["drop_duplicates", "trim_spaces"]);
        assert_eq!(steps[0].params.get("keep"), Some(&json!("last")));
        assert_eq!(steps[0].params.get("subset"), Some(&json!(null)));
        assert_eq!(steps[0].origin, StepOrigin::Builtin);
    }

    #[test]
    fn test_build_ordered_preserves_caller_order() {
        let selection = vec![
            "convert_types".to_owned(),
            "unknown_key".to_owned(),
            "Trim Spaces".to_owned(),
            "STANDARDIZE_HEADERS".to_owned(),
        ];
        let steps = engine().build_ordered(&selection, &HashMap::new());
        assert_eq!(keys(&steps), vec!["convert_types", "trim_spaces", "standardize_headers"]);
    }

    #[test]
    fn test_run_chains_builtin_steps() -> anyhow::Result<()> {
        let df = sample()?;
        let selection = vec![
            "standardize_headers".to_owned(),
            "trim_spaces".to_owned(),
            "drop_duplicates".to_owned(),
        ];
        let steps = engine().build_ordered(&selection, &HashMap::new());
        let outcome = PipelineEngine::run(&steps, &df)?;

        assert_eq!(outcome.frame.shape(), (2, 2));
        assert_eq!(outcome.report.rows_before, 3);
        assert_eq!(outcome.report.steps_applied.len(), 3);
        let names = outcome.frame.column("name")?.as_materialized_series().str()?.clone();
        assert_eq!(names.get(0), Some("alice"));
        // original untouched
        assert_eq!(df.get_column_names()[0].as_str(), " Name ");
        Ok(())
    }

    #[test]
    fn test_fail_fast_stops_later_steps() -> anyhow::Result<()> {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let counting = Arc::new(FnTransform::new(
            TransformMeta::new("count", "Count"),
            move |df: &DataFrame, _: &Params| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(df.clone())
            },
        ));
        let failing = Arc::new(FnTransform::new(
            TransformMeta::new("explode", "Explode"),
            |_: &DataFrame, _: &Params| anyhow::bail!("bad input"),
        ));

        let steps = vec![
            PipelineEngine::adhoc_step("count", "Count", counting.clone(), Params::new()),
            PipelineEngine::adhoc_step("explode", "Explode", failing, Params::new()),
            PipelineEngine::adhoc_step("count", "Count", counting, Params::new()),
        ];

        let err = PipelineEngine::run(&steps, &sample()?).err();
        let err = err.ok_or_else(|| anyhow::anyhow!("expected failure"))?;
        assert_eq!(err.step_key, "explode");
        assert_eq!(err.stage, PipelineStage::Apply);
        assert!(err.to_string().contains("bad input"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[test]
    fn test_cancelled_token_stops_before_first_step() -> anyhow::Result<()> {
        let steps = engine().build(None, None, &HashMap::new());
        let token = CancellationToken::new();
        token.cancel();

        let mut started = 0;
        let result = PipelineEngine::run_with(&steps, &sample()?, &token, &mut |event| {
            if matches!(event, StepEvent::Started { .. }) {
                started += 1;
            }
        });
        assert!(result.is_err_and(|e| e.is_cancelled() && e.step_key == "standardize_headers"));
        assert_eq!(started, 0);
        Ok(())
    }

    #[test]
    fn test_observer_sees_every_step() -> anyhow::Result<()> {
        let trim = vec!["trim_spaces".to_owned()];
        let steps = engine().build(Some(trim.as_slice()), None, &HashMap::new());
        let mut events = Vec::new();
        PipelineEngine::run_with(&steps, &sample()?, &CancellationToken::new(), &mut |event| {
            events.push(match event {
                StepEvent::Started { index, .. } => format!("start {index}"),
                StepEvent::Finished { index, total, .. } => format!("done {index}/{total}"),
            });
        })?;
        assert_eq!(events, vec!["start 0", "done 0/1"]);

        let empty = PipelineEngine::run(&[], &sample()?)?;
        assert_eq!(empty.frame.shape(), (3, 2));
        Ok(())
    }
}
