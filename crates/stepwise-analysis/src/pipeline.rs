use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use stepwise_config::{StepwiseConfig, load_workspace_config};
use stepwise_core::{Step, Tag, TrailingSemantic};
use stepwise_source::{ScalarSeriesSource, available_tags, open_source};

use crate::{
    AlignedTable, AnalysisError, AnalysisWarning, BestSample, ComparisonTable, DerivedIndicators,
    MetricSummary, PolicySummary, WarningCode, Window, WindowSelection, align, assemble, best_of,
    select_all, select_by_step_range, select_by_trailing_fraction, select_trailing_rows,
    summarize, worst_of,
};
use crate::window::validate_fraction;

pub const REPORT_SCHEMA_VERSION: &str = "1.0";
pub const OVERALL_WINDOW: &str = "overall";
pub const FINAL_WINDOW: &str = "final";
pub const LAST_ROWS_WINDOW: &str = "last_rows";

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunReportRequest {
    pub tags: Option<Vec<Tag>>,
    pub final_fraction: Option<f64>,
    pub final_semantic: Option<TrailingSemantic>,
    pub last_rows: Option<usize>,
    pub skip_phases: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowReport {
    pub label: String,
    pub selection: WindowSelection,
    pub row_count: usize,
    pub first_step: Option<Step>,
    pub last_step: Option<Step>,
    pub metrics: BTreeMap<Tag, MetricSummary>,
    pub derived: DerivedIndicators,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub schema_version: String,
    pub run_id: String,
    pub tags: Vec<Tag>,
    pub missing_tags: Vec<Tag>,
    pub row_count: usize,
    pub first_step: Option<Step>,
    pub last_step: Option<Step>,
    pub overall: WindowReport,
    pub final_window: WindowReport,
    pub last_rows: Option<WindowReport>,
    pub phases: Vec<WindowReport>,
    pub best: BTreeMap<Tag, BestSample>,
    pub lowest: BTreeMap<Tag, BestSample>,
    pub warnings: Vec<AnalysisWarning>,
}

impl RunReport {
    pub fn window(&self, label: &str) -> Option<&WindowReport> {
        [&self.overall, &self.final_window]
            .into_iter()
            .chain(self.last_rows.as_ref())
            .chain(self.phases.iter())
            .find(|window| window.label == label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunInput {
    pub run_id: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedRun {
    pub run_id: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed(Box<RunReport>),
    Failed(FailedRun),
}

/// Which window of each run feeds the comparison table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompareWindow {
    #[default]
    Final,
    Overall,
    LastRows(usize),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompareRequest {
    pub report: RunReportRequest,
    pub window: CompareWindow,
    pub include_baselines: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub window: String,
    pub table: ComparisonTable,
    pub failed_runs: Vec<FailedRun>,
}

#[derive(Debug, Clone)]
pub struct RunAnalyzer {
    workspace: PathBuf,
    config: StepwiseConfig,
}

impl RunAnalyzer {
    pub fn new(workspace: impl AsRef<Path>) -> Result<Self, AnalysisError> {
        let workspace = workspace.as_ref().to_path_buf();
        let config = load_workspace_config(&workspace)?;
        Ok(Self { workspace, config })
    }

    pub fn with_config(workspace: impl AsRef<Path>, config: StepwiseConfig) -> Self {
        Self {
            workspace: workspace.as_ref().to_path_buf(),
            config,
        }
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn config(&self) -> &StepwiseConfig {
        &self.config
    }

    pub fn resolve_tags(&self, request: &RunReportRequest) -> Vec<Tag> {
        request
            .tags
            .clone()
            .unwrap_or_else(|| self.config.metrics.requested_tags())
    }

    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace.join(path)
        }
    }

    pub fn align_source(
        &self,
        source: &dyn ScalarSeriesSource,
        request: &RunReportRequest,
    ) -> Result<AlignedTable, AnalysisError> {
        align(&self.resolve_tags(request), source)
    }

    pub fn report(
        &self,
        run_id: &str,
        source: &dyn ScalarSeriesSource,
        request: &RunReportRequest,
    ) -> Result<RunReport, AnalysisError> {
        self.check_request(request)?;
        let tags = self.resolve_tags(request);
        let mut warnings = Vec::new();

        let availability = available_tags(source, &tags)?;
        for tag in &availability.missing {
            warnings.push(AnalysisWarning::emit(
                WarningCode::TagNotFound,
                format!("run '{run_id}' has no data for tag '{tag}'"),
            ));
        }

        let table = align(&tags, source)?;
        tracing::info!(
            run_id,
            rows = table.row_count(),
            tags = availability.present.len(),
            "aligned run metrics"
        );

        let fraction = request
            .final_fraction
            .unwrap_or(self.config.windows.final_fraction);
        let semantic = request
            .final_semantic
            .unwrap_or(self.config.windows.final_semantic);

        let overall = self.window_report(OVERALL_WINDOW, &select_all(&table), &tags);
        let final_window = self.window_report(
            FINAL_WINDOW,
            &select_by_trailing_fraction(&table, fraction, semantic)?,
            &tags,
        );
        let last_rows = match request.last_rows {
            Some(count) => Some(self.window_report(
                LAST_ROWS_WINDOW,
                &select_trailing_rows(&table, count)?,
                &tags,
            )),
            None => None,
        };

        let mut phases = Vec::new();
        if !request.skip_phases {
            for phase in &self.config.windows.phases {
                let window = select_by_step_range(&table, phase.low, phase.high)?;
                phases.push(self.window_report(&phase.name, &window, &tags));
            }
        }

        for window in [&overall, &final_window]
            .into_iter()
            .chain(last_rows.as_ref())
            .chain(phases.iter())
        {
            if window.row_count == 0 {
                warnings.push(AnalysisWarning::emit(
                    WarningCode::EmptyWindow,
                    format!("run '{run_id}' window '{}' selected no rows", window.label),
                ));
            }
        }

        let best = tags
            .iter()
            .filter_map(|tag| best_of(&table, tag).map(|best| (tag.clone(), best)))
            .collect();
        let lowest = tags
            .iter()
            .filter_map(|tag| worst_of(&table, tag).map(|lowest| (tag.clone(), lowest)))
            .collect();

        Ok(RunReport {
            schema_version: REPORT_SCHEMA_VERSION.to_owned(),
            run_id: run_id.to_owned(),
            tags: availability.present,
            missing_tags: availability.missing,
            row_count: table.row_count(),
            first_step: table.first_step(),
            last_step: table.max_step(),
            overall,
            final_window,
            last_rows,
            phases,
            best,
            lowest,
            warnings,
        })
    }

    /// Rejects request values that would fail every run the same way.
    pub fn check_request(&self, request: &RunReportRequest) -> Result<(), AnalysisError> {
        validate_fraction(
            request
                .final_fraction
                .unwrap_or(self.config.windows.final_fraction),
        )?;
        if request.last_rows == Some(0) {
            return Err(AnalysisError::InvalidArgument(
                "trailing row count must be at least 1".to_owned(),
            ));
        }
        let inverted = self
            .config
            .windows
            .phases
            .iter()
            .filter(|_| !request.skip_phases)
            .find(|phase| phase.high.is_some_and(|high| high < phase.low));
        if let Some(phase) = inverted {
            return Err(AnalysisError::InvalidArgument(format!(
                "phase '{}' has high below low",
                phase.name
            )));
        }
        Ok(())
    }

    /// Reports each run independently. A run whose source cannot be read is
    /// returned as `Failed` without affecting the others; any other error
    /// fails the whole call.
    pub fn report_runs(
        &self,
        inputs: &[RunInput],
        request: &RunReportRequest,
    ) -> Result<Vec<RunOutcome>, AnalysisError> {
        self.check_request(request)?;

        let mut outcomes = Vec::with_capacity(inputs.len());
        for input in inputs {
            match self.report_input(input, request) {
                Ok(report) => outcomes.push(RunOutcome::Completed(Box::new(report))),
                Err(AnalysisError::Source(err)) => {
                    tracing::error!(run_id = %input.run_id, error = %err, "run report failed");
                    outcomes.push(RunOutcome::Failed(FailedRun {
                        run_id: input.run_id.clone(),
                        error: AnalysisError::Source(err).to_string(),
                    }));
                }
                Err(err) => return Err(err),
            }
        }
        Ok(outcomes)
    }

    pub fn compare(
        &self,
        inputs: &[RunInput],
        request: &CompareRequest,
    ) -> Result<ComparisonReport, AnalysisError> {
        let mut report_request = request.report.clone();
        let label = match request.window {
            CompareWindow::Final => FINAL_WINDOW,
            CompareWindow::Overall => OVERALL_WINDOW,
            CompareWindow::LastRows(count) => {
                report_request.last_rows = Some(count);
                LAST_ROWS_WINDOW
            }
        };
        report_request.skip_phases = true;

        let mut policies = Vec::new();
        if request.include_baselines {
            for (policy, constants) in &self.config.baselines {
                policies.push(PolicySummary::baseline(
                    policy.clone(),
                    constants,
                    &self.config.derived,
                ));
            }
        }

        let mut failed_runs = Vec::new();
        for outcome in self.report_runs(inputs, &report_request)? {
            match outcome {
                RunOutcome::Completed(report) => {
                    let window = report.window(label).ok_or_else(|| {
                        AnalysisError::InvalidArgument(format!(
                            "run '{}' has no '{label}' window",
                            report.run_id
                        ))
                    })?;
                    policies.push(PolicySummary::computed(
                        report.run_id.clone(),
                        label,
                        window.metrics.clone(),
                        window.derived,
                    ));
                }
                RunOutcome::Failed(failed) => failed_runs.push(failed),
            }
        }

        Ok(ComparisonReport {
            window: label.to_owned(),
            table: assemble(policies)?,
            failed_runs,
        })
    }

    fn report_input(
        &self,
        input: &RunInput,
        request: &RunReportRequest,
    ) -> Result<RunReport, AnalysisError> {
        let source = open_source(self.resolve_path(&input.path))?;
        self.report(&input.run_id, source.as_ref(), request)
    }

    fn window_report(&self, label: &str, window: &Window<'_>, tags: &[Tag]) -> WindowReport {
        let metrics = summarize(window, tags);
        let derived = DerivedIndicators::compute(&metrics, &self.config.derived);
        WindowReport {
            label: label.to_owned(),
            selection: window.selection(),
            row_count: window.row_count(),
            first_step: window.first_step(),
            last_step: window.last_step(),
            metrics,
            derived,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::fs;

    use stepwise_config::{BaselineMetric, PhaseConfig, RESERVED_PHASE_NAMES};
    use stepwise_core::Sample;
    use stepwise_source::InMemorySource;
    use tempfile::tempdir;

    use super::*;
    use crate::ComparisonCell;

    fn config_with_tags(tags: &[&str]) -> StepwiseConfig {
        let mut config = StepwiseConfig::default();
        config.metrics.tags = Some(tags.iter().map(|tag| (*tag).to_owned()).collect());
        config
    }

    fn training_source() -> InMemorySource {
        let mut source = InMemorySource::new();
        source.insert_samples(
            "Reward",
            (0..10).map(|index| Sample::new(index * 500_000, index as f64)),
        );
        source.insert_samples(
            "TargetsFound",
            (0..10)
                .filter(|index| index % 2 == 0)
                .map(|index| Sample::new(index * 500_000, 5.0)),
        );
        source
    }

    #[test]
    fn report_computes_overall_final_phase_and_best_windows() {
        let temp = tempdir().expect("tempdir");
        let analyzer = RunAnalyzer::with_config(
            temp.path(),
            config_with_tags(&["Reward", "TargetsFound", "GroundCollision"]),
        );

        let report = analyzer
            .report("drone4", &training_source(), &RunReportRequest::default())
            .expect("report");

        assert_eq!(report.row_count, 10);
        assert_eq!(report.first_step, Some(0));
        assert_eq!(report.last_step, Some(4_500_000));
        assert_eq!(report.tags, vec!["Reward".to_owned(), "TargetsFound".to_owned()]);
        assert_eq!(report.missing_tags, vec!["GroundCollision".to_owned()]);

        // Last 20% of ten rows by position: rewards 8 and 9.
        let final_reward = report.final_window.metrics["Reward"];
        assert_eq!(report.final_window.row_count, 2);
        assert_eq!(final_reward.mean, Some(8.5));
        assert_eq!(report.final_window.derived.success_rate_percent, Some(100.0));
        assert_eq!(report.final_window.derived.collision_rate_percent, None);
        assert_eq!(report.final_window.metrics["GroundCollision"].count, 0);

        let phase_names: Vec<&str> = report.phases.iter().map(|phase| phase.label.as_str()).collect();
        assert_eq!(phase_names, vec!["early", "mid", "late"]);
        let early = report.window("early").expect("early phase");
        assert_eq!(early.row_count, 3);
        assert_eq!(early.metrics["Reward"].mean, Some(1.0));
        let mid = report.window("mid").expect("mid phase");
        assert_eq!(mid.first_step, Some(1_500_000));
        assert_eq!(mid.last_step, Some(2_500_000));

        assert_eq!(
            report.best["Reward"],
            BestSample {
                step: 4_500_000,
                value: 9.0
            }
        );
        assert_eq!(report.lowest["Reward"].step, 0);
        assert!(!report.best.contains_key("GroundCollision"));

        assert!(
            report
                .warnings
                .iter()
                .any(|warning| warning.code == WarningCode::TagNotFound)
        );
    }

    #[test]
    fn request_overrides_fraction_semantic_and_adds_last_rows() {
        let temp = tempdir().expect("tempdir");
        let analyzer = RunAnalyzer::with_config(temp.path(), config_with_tags(&["Reward"]));

        let report = analyzer
            .report(
                "drone4",
                &training_source(),
                &RunReportRequest {
                    final_fraction: Some(0.1),
                    final_semantic: Some(TrailingSemantic::ByStepValue),
                    last_rows: Some(3),
                    skip_phases: true,
                    ..RunReportRequest::default()
                },
            )
            .expect("report");

        // Steps at or above 90% of 4.5M: 4.05M and later, only the last row.
        assert_eq!(report.final_window.row_count, 1);
        assert_eq!(report.final_window.first_step, Some(4_500_000));
        let last_rows = report.last_rows.as_ref().expect("last rows window");
        assert_eq!(last_rows.row_count, 3);
        assert_eq!(last_rows.metrics["Reward"].mean, Some(8.0));
        assert!(report.phases.is_empty());
    }

    #[test]
    fn empty_phase_windows_are_reported_as_warnings() {
        let temp = tempdir().expect("tempdir");
        let mut config = config_with_tags(&["Reward"]);
        config.windows.phases = vec![PhaseConfig {
            name: "beyond".to_owned(),
            low: 10_000_000,
            high: None,
        }];
        let analyzer = RunAnalyzer::with_config(temp.path(), config);

        let report = analyzer
            .report("drone4", &training_source(), &RunReportRequest::default())
            .expect("report");

        let beyond = report.window("beyond").expect("beyond phase");
        assert_eq!(beyond.row_count, 0);
        assert_eq!(beyond.metrics["Reward"].mean, None);
        assert!(
            report
                .warnings
                .iter()
                .any(|warning| warning.code == WarningCode::EmptyWindow)
        );
    }

    #[test]
    fn invalid_fraction_fails_the_call() {
        let temp = tempdir().expect("tempdir");
        let analyzer = RunAnalyzer::with_config(temp.path(), config_with_tags(&["Reward"]));

        let err = analyzer
            .report(
                "drone4",
                &training_source(),
                &RunReportRequest {
                    final_fraction: Some(0.0),
                    ..RunReportRequest::default()
                },
            )
            .expect_err("zero fraction");
        assert!(matches!(err, AnalysisError::InvalidArgument(_)));
    }

    #[test]
    fn compare_surfaces_invalid_arguments_instead_of_failing_runs() {
        let temp = tempdir().expect("tempdir");
        fs::write(temp.path().join("a.csv"), "step,Reward\n0,1.0\n10,2.0\n").expect("write csv");
        let analyzer = RunAnalyzer::with_config(temp.path(), config_with_tags(&["Reward"]));
        let inputs = [RunInput {
            run_id: "a".to_owned(),
            path: PathBuf::from("a.csv"),
        }];

        let zero_fraction = CompareRequest {
            report: RunReportRequest {
                final_fraction: Some(0.0),
                ..RunReportRequest::default()
            },
            ..CompareRequest::default()
        };
        let err = analyzer
            .compare(&inputs, &zero_fraction)
            .expect_err("zero fraction");
        assert!(matches!(err, AnalysisError::InvalidArgument(_)));

        let zero_rows = CompareRequest {
            window: CompareWindow::LastRows(0),
            ..CompareRequest::default()
        };
        let err = analyzer
            .compare(&inputs, &zero_rows)
            .expect_err("zero trailing rows");
        assert!(matches!(err, AnalysisError::InvalidArgument(_)));
    }

    #[test]
    fn inverted_phase_fails_batch_even_when_every_source_is_missing() {
        let temp = tempdir().expect("tempdir");
        let mut config = config_with_tags(&["Reward"]);
        config.windows.phases = vec![PhaseConfig {
            name: "backwards".to_owned(),
            low: 500,
            high: Some(100),
        }];
        let analyzer = RunAnalyzer::with_config(temp.path(), config);

        let err = analyzer
            .report_runs(
                &[RunInput {
                    run_id: "missing".to_owned(),
                    path: PathBuf::from("missing.csv"),
                }],
                &RunReportRequest::default(),
            )
            .expect_err("inverted phase");
        assert!(matches!(err, AnalysisError::InvalidArgument(_)));

        let outcomes = analyzer
            .report_runs(
                &[RunInput {
                    run_id: "missing".to_owned(),
                    path: PathBuf::from("missing.csv"),
                }],
                &RunReportRequest {
                    skip_phases: true,
                    ..RunReportRequest::default()
                },
            )
            .expect("phases skipped");
        assert!(matches!(&outcomes[0], RunOutcome::Failed(failed) if failed.run_id == "missing"));
    }

    #[test]
    fn window_labels_match_reserved_phase_names() {
        assert_eq!(
            RESERVED_PHASE_NAMES,
            &[OVERALL_WINDOW, FINAL_WINDOW, LAST_ROWS_WINDOW]
        );
    }

    #[test]
    fn compare_keeps_going_when_one_run_is_missing() {
        let temp = tempdir().expect("tempdir");
        fs::write(
            temp.path().join("drone4.csv"),
            "step,Reward,TargetsFound\n0,1.0,1\n10,3.0,2\n20,5.0,3\n30,7.0,4\n",
        )
        .expect("write csv");

        let mut config = config_with_tags(&["Reward", "TargetsFound"]);
        config.windows.final_fraction = 0.5;
        config.baselines.insert(
            "Random".to_owned(),
            BTreeMap::from([(
                "Reward".to_owned(),
                BaselineMetric {
                    mean: -45.0,
                    std: 15.0,
                    count: 100,
                },
            )]),
        );
        let analyzer = RunAnalyzer::with_config(temp.path(), config);

        let inputs = vec![
            RunInput {
                run_id: "drone4".to_owned(),
                path: PathBuf::from("drone4.csv"),
            },
            RunInput {
                run_id: "drone3.4".to_owned(),
                path: PathBuf::from("drone3.4.csv"),
            },
        ];
        let report = analyzer
            .compare(
                &inputs,
                &CompareRequest {
                    include_baselines: true,
                    ..CompareRequest::default()
                },
            )
            .expect("compare");

        assert_eq!(report.window, FINAL_WINDOW);
        assert_eq!(report.failed_runs.len(), 1);
        assert_eq!(report.failed_runs[0].run_id, "drone3.4");
        assert!(report.failed_runs[0].error.contains("does not exist"));

        let table = &report.table;
        assert_eq!(
            table.rows.iter().map(|row| row.policy.as_str()).collect::<Vec<_>>(),
            vec!["Random", "drone4"]
        );
        let reward = table
            .cell("drone4", "Reward")
            .and_then(ComparisonCell::summary)
            .expect("drone4 reward");
        assert_eq!(reward.mean, Some(6.0));
        assert_eq!(reward.count, 2);
        assert_eq!(
            table.cell("Random", "TargetsFound"),
            Some(&ComparisonCell::Unavailable)
        );
        assert_eq!(table.mismatches.len(), 1);
        assert_eq!(
            table.row("drone4").expect("drone4").derived.success_rate_percent,
            Some(70.0)
        );
    }

    #[test]
    fn compare_over_last_rows_window() {
        let temp = tempdir().expect("tempdir");
        fs::write(
            temp.path().join("run.json"),
            r#"{"Reward": [{"step": 1, "value": 2.0}, {"step": 2, "value": 4.0}, {"step": 3, "value": 9.0}]}"#,
        )
        .expect("write json");
        let analyzer = RunAnalyzer::with_config(temp.path(), config_with_tags(&["Reward"]));

        let report = analyzer
            .compare(
                &[RunInput {
                    run_id: "ppo".to_owned(),
                    path: temp.path().join("run.json"),
                }],
                &CompareRequest {
                    window: CompareWindow::LastRows(2),
                    ..CompareRequest::default()
                },
            )
            .expect("compare");

        assert_eq!(report.window, LAST_ROWS_WINDOW);
        let reward = report
            .table
            .cell("ppo", "Reward")
            .and_then(ComparisonCell::summary)
            .expect("reward");
        assert_eq!(reward.mean, Some(6.5));
        assert!(report.table.row("Random").is_none());
    }
}
