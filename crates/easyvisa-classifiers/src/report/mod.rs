//! HTML report of a benchmark run.
//!
//! Sections: dataset summary, train and test comparison tables, tuned
//! parameters, confusion matrices per model and the importance chart of the
//! final model.
pub mod plots;
pub mod report;

use maud::{html, Markup};

use crate::benchmark::{BenchmarkConfig, BenchmarkResults};
use crate::comparison::ComparisonTable;
use crate::evaluation::{ConfusionMatrix, Metric};
use crate::stats::DatasetSummary;

pub use plots::{plot_confusion_matrix, plot_feature_importances};
pub use report::{Report, ReportSection};

fn table_markup(table: &ComparisonTable) -> Markup {
    html! {
        table {
            tr {
                th { "" }
                @for column in table.columns() {
                    th { (column) }
                }
            }
            @for metric in Metric::ALL {
                tr {
                    td { (metric.label()) }
                    @for value in table.row(metric) {
                        td { (format!("{:.4}", value)) }
                    }
                }
            }
        }
    }
}

fn confusion_markup(cm: &ConfusionMatrix) -> Markup {
    html! {
        table {
            tr { th { "true \\ predicted" } th { "0" } th { "1" } }
            @for t in 0..2 {
                tr {
                    td { (t) }
                    @for p in 0..2 {
                        td { (cm.counts[t][p]) br; (format!("{:.2}%", cm.fraction(t, p) * 100.0)) }
                    }
                }
            }
        }
    }
}

fn summary_markup(summary: &DatasetSummary) -> Markup {
    html! {
        p { (summary.rows) " rows, " (summary.duplicated_rows) " duplicated (ignoring case_id)." }
        table {
            tr {
                @for h in ["column", "count", "mean", "std", "min", "25%", "50%", "75%", "max"] {
                    th { (h) }
                }
            }
            @for s in &summary.numeric {
                tr {
                    td { (s.column) }
                    td { (s.count) }
                    @for v in [s.mean, s.std, s.min, s.q25, s.median, s.q75, s.max] {
                        td { (format!("{:.2}", v)) }
                    }
                }
            }
        }
        @for c in &summary.categorical {
            h3 { (c.column) }
            table {
                @for (category, count) in &c.counts {
                    tr { td { (category) } td { (count) } }
                }
            }
        }
    }
}

/// Assemble the benchmark report. `summary` is omitted when not available.
pub fn build_benchmark_report(
    results: &BenchmarkResults,
    config: &BenchmarkConfig,
    summary: Option<&DatasetSummary>,
) -> anyhow::Result<Report> {
    let mut report = Report::new(
        "easyvisa",
        env!("CARGO_PKG_VERSION"),
        "EasyVisa Classifier Benchmark",
    );

    if let Some(summary) = summary {
        let mut section = ReportSection::new("Dataset");
        section.add_content(summary_markup(summary));
        report.add_section(section);
    }

    let mut tables = ReportSection::new("Model Comparison");
    tables.add_content(html! { h3 { "Training performance" } (table_markup(&results.train_table)) });
    tables.add_content(html! { h3 { "Test performance" } (table_markup(&results.test_table)) });
    report.add_section(tables);

    let mut tuned = ReportSection::new("Tuned Parameters");
    tuned.add_content(html! {
        p { "Scoring: " (config.scoring) ", " (config.cv_folds) "-fold stratified cross-validation." }
        table {
            tr { th { "model" } th { "parameters" } th { "mean CV score" } }
            @for o in results.outcomes.iter().filter(|o| o.best_params.is_some()) {
                tr {
                    td { (o.name) }
                    td { (o.best_params.as_ref().map(|p| p.to_string()).unwrap_or_default()) }
                    td { (o.cv_score.map(|s| format!("{:.4}", s)).unwrap_or_default()) }
                }
            }
        }
    });
    report.add_section(tuned);

    let mut matrices = ReportSection::new("Confusion Matrices");
    for outcome in &results.outcomes {
        matrices.add_content(html! {
            h3 { (outcome.name) }
            div style="display: flex; gap: 2em;" {
                div { h4 { "train" } (confusion_markup(&outcome.train_confusion)) }
                div { h4 { "test" } (confusion_markup(&outcome.test_confusion)) }
            }
        });
        matrices.add_plot(plot_confusion_matrix(
            &outcome.test_confusion,
            &format!("{} (test)", outcome.name),
        ));
    }
    report.add_section(matrices);

    if let Some(final_model) = &results.final_model {
        let mut importance = ReportSection::new("Feature Importances");
        importance.add_content(html! { p { "Final model: " strong { (final_model) } } });
        if results.importances.is_empty() {
            importance.add_content(html! { p { "This model does not expose feature importances." } });
        } else {
            importance.add_plot(plot_feature_importances(
                &results.importances,
                &format!("Feature importances: {}", final_model),
            ));
        }
        report.add_section(importance);
    }

    let config_json = serde_json::to_string_pretty(config)?;
    let mut config_section = ReportSection::new("Configuration");
    config_section.add_content(html! {
        pre { code { (config_json) } }
    });
    report.add_section(config_section);

    Ok(report)
}
