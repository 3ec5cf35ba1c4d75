use plotly::common::Orientation;
use plotly::layout::{Axis, Layout};
use plotly::{Bar, HeatMap, Plot};

use crate::evaluation::ConfusionMatrix;
use crate::importance::FeatureImportance;

const CLASS_NAMES: [&str; 2] = ["Denied (0)", "Certified (1)"];

/// Heatmap of a confusion matrix, cell colour by share of the total.
pub fn plot_confusion_matrix(cm: &ConfusionMatrix, title: &str) -> Plot {
    let z: Vec<Vec<f64>> = (0..2)
        .map(|t| (0..2).map(|p| cm.fraction(t, p) * 100.0).collect())
        .collect();
    let trace = HeatMap::new(CLASS_NAMES.to_vec(), CLASS_NAMES.to_vec(), z).name("% of total");

    let layout = Layout::new()
        .title(title)
        .x_axis(Axis::new().title("Predicted label"))
        .y_axis(Axis::new().title("True label"))
        .width(480)
        .height(400);

    let mut plot = Plot::new();
    plot.add_trace(trace);
    plot.set_layout(layout);
    plot
}

/// Horizontal bars, most important feature on top.
pub fn plot_feature_importances(ranked: &[FeatureImportance], title: &str) -> Plot {
    // plotly draws the first category at the bottom
    let names: Vec<String> = ranked.iter().rev().map(|r| r.feature.clone()).collect();
    let values: Vec<f64> = ranked.iter().rev().map(|r| r.importance).collect();
    let trace = Bar::new(values, names)
        .orientation(Orientation::Horizontal)
        .name("Relative importance");

    let layout = Layout::new()
        .title(title)
        .x_axis(Axis::new().title("Relative importance"))
        .height(ranked.len() * 22 + 160)
        .width(900);

    let mut plot = Plot::new();
    plot.add_trace(trace);
    plot.set_layout(layout);
    plot
}
