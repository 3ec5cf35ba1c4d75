//! Integration tests for the comparison table builder and importance ranking.

use easyvisa_classifiers::comparison::{build_table, ComparisonTable};
use easyvisa_classifiers::error::BenchError;
use easyvisa_classifiers::evaluation::{Metric, PerformanceRecord};
use easyvisa_classifiers::importance::{rank_feature_importances, ImportanceListing};
use ndarray::array;

fn record(base: f64) -> PerformanceRecord {
    PerformanceRecord {
        accuracy: base,
        recall: base - 0.1,
        precision: base - 0.2,
        f1: base - 0.3,
    }
}

#[test]
fn columns_keep_insertion_order() {
    let table = build_table([
        ("Random Forest", record(0.9)),
        ("Decision Tree", record(0.8)),
        ("Bagging Classifier", record(0.85)),
    ])
    .unwrap();
    assert_eq!(table.columns(), ["Random Forest", "Decision Tree", "Bagging Classifier"]);
    assert_eq!(table.row(Metric::Accuracy), vec![0.9, 0.8, 0.85]);
    assert_eq!(table.get("Decision Tree", Metric::Recall), Some(0.8 - 0.1));
    assert_eq!(table.get("Missing", Metric::F1), None);
}

#[test]
fn every_column_has_four_cells() {
    let table = build_table([("a", record(0.7)), ("b", record(0.6))]).unwrap();
    for metric in Metric::ALL {
        assert_eq!(table.row(metric).len(), table.columns().len());
    }
}

#[test]
fn partial_record_is_refused() {
    let mut table = ComparisonTable::new();
    table.add_column("full", &record(0.9).metrics()).unwrap();
    let err = table
        .add_column("partial", &[(Metric::Accuracy, 0.5), (Metric::Precision, 0.5)])
        .unwrap_err();
    assert!(matches!(err, BenchError::IncompleteRecord { ref model, .. } if model == "partial"));
    assert_eq!(table.columns(), ["full"]);
}

#[test]
fn metric_order_of_input_does_not_matter() {
    let mut table = ComparisonTable::new();
    table
        .add_column(
            "shuffled",
            &[(Metric::F1, 0.4), (Metric::Accuracy, 0.1), (Metric::Precision, 0.3), (Metric::Recall, 0.2)],
        )
        .unwrap();
    assert_eq!(table.row(Metric::Accuracy), vec![0.1]);
    assert_eq!(table.row(Metric::F1), vec![0.4]);
}

#[test]
fn csv_has_metric_rows_and_model_columns() {
    let table = build_table([("Decision Tree", record(1.0)), ("Random Forest", record(0.9))]).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("table.csv");
    table.write_csv(&path).unwrap();

    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_path(&path).unwrap();
    let headers = reader.headers().unwrap().clone();
    assert_eq!(&headers[1], "Decision Tree");
    assert_eq!(&headers[2], "Random Forest");
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 4);
    assert_eq!(&rows[0][0], "Accuracy");
    assert_eq!(&rows[3][0], "F1");
    assert_eq!(rows[0][1].parse::<f64>().unwrap(), 1.0);
}

#[test]
fn importances_are_ranked_for_display() {
    let names: Vec<String> = ["prevailing_wage", "education_of_employee_Doctorate", "yr_of_estab"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let ranked = rank_feature_importances(&names, array![0.2, 0.7, 0.1].view()).unwrap();
    assert_eq!(ranked[0].feature, "education_of_employee_Doctorate");
    assert_eq!(ranked[2].feature, "yr_of_estab");

    let listing = ImportanceListing(&ranked).to_string();
    assert_eq!(listing.lines().count(), 4);
    assert!(listing.lines().nth(1).unwrap().starts_with("education_of_employee_Doctorate"));
}
