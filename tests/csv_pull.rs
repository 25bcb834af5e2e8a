use std::fs;
use std::path::Path;

use polars::prelude::IdxSize;
use yearend_pull::schema::window::ACTIVE_COUNT;
use yearend_pull::{write_report, PullConfig, PullError, ReportFormat, YearEndPullController};

fn write_extracts(dir: &Path) {
    fs::write(
        dir.join("transactions_2020.csv"),
        "TransactionID,EmployeeID,Amount\nt1,e1,100\nt2,e2,250\n",
    )
    .unwrap();
    fs::write(
        dir.join("work_periods_2020.csv"),
        "EmployeeID,WorksiteID,MonthsSinceAdd,MonthsSinceDel\n\
         e1,w1,0,11\n\
         e2,w1,0,100\n\
         e3,w2,14,\n",
    )
    .unwrap();
    fs::write(
        dir.join("worksite_histories.csv"),
        "WorksiteID,Name\nw1,North\nw2,South\n",
    )
    .unwrap();
}

fn config(base_path: &Path, output_path: &Path) -> PullConfig {
    PullConfig::from_toml(&format!(
        r#"
[pull]
start_year = 2020
end_year = 2022
output_path = '{}'

[source]
base_path = '{}'

[validation]
required_columns = ["TransactionID", "EmployeeID"]
non_null_columns = ["TransactionID"]
unique_key = ["TransactionID"]
"#,
        output_path.display(),
        base_path.display()
    ))
    .unwrap()
}

fn ids(df: &polars::prelude::DataFrame) -> Vec<String> {
    df.column("EmployeeID")
        .unwrap()
        .str()
        .unwrap()
        .into_iter()
        .map(|v| v.unwrap().to_string())
        .collect()
}

#[test]
fn pulls_csv_extracts_and_writes_report() {
    let extracts = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_extracts(extracts.path());
    let config = config(extracts.path(), output.path());

    let controller = YearEndPullController::from_config(&config).unwrap();
    let pull = controller.pull_year_end(config.pull.check_for_errors).unwrap();

    assert_eq!(ids(&pull.windows[&2020]), vec!["e1", "e2"]);
    assert_eq!(ids(&pull.windows[&2021]), vec!["e2"]);
    assert_eq!(ids(&pull.windows[&2022]), vec!["e2", "e3"]);
    assert_eq!(pull.worksite_histories.height(), 2);

    let counts = pull.window_counts().unwrap();
    let counts: Vec<IdxSize> = counts
        .column(ACTIVE_COUNT)
        .unwrap()
        .as_materialized_series()
        .idx()
        .unwrap()
        .into_no_null_iter()
        .collect();
    assert_eq!(counts, vec![2, 1, 2]);

    let written = write_report(&pull, &config.pull.output_path, ReportFormat::Csv).unwrap();
    assert_eq!(written.len(), 5);
    let counts_csv = fs::read_to_string(output.path().join("window_counts.csv")).unwrap();
    assert_eq!(counts_csv, "PullYear,ActiveCount\n2020,2\n2021,1\n2022,2\n");
}

#[test]
fn failed_checks_abort_the_pull() {
    let extracts = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_extracts(extracts.path());
    fs::write(
        extracts.path().join("transactions_2020.csv"),
        "TransactionID,EmployeeID\nt1,e1\nt1,e2\n",
    )
    .unwrap();
    let config = config(extracts.path(), output.path());

    let controller = YearEndPullController::from_config(&config).unwrap();
    match controller.pull_year_end(true).err().unwrap() {
        PullError::Validation(msg) => assert!(msg.contains("TransactionID"), "{msg}"),
        other => panic!("unexpected error: {other}"),
    }

    // same data passes once checking is turned off
    assert!(controller.pull_year_end(false).is_ok());
}

#[test]
fn missing_extract_names_the_failing_query() {
    let extracts = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_extracts(extracts.path());
    fs::remove_file(extracts.path().join("worksite_histories.csv")).unwrap();
    let config = config(extracts.path(), output.path());

    let controller = YearEndPullController::from_config(&config).unwrap();
    match controller.pull_year_end(true).err().unwrap() {
        PullError::DataAccess { query, .. } => assert_eq!(query, "worksite_histories"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn malformed_offsets_fail_the_computation() {
    let extracts = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_extracts(extracts.path());
    fs::write(
        extracts.path().join("work_periods_2020.csv"),
        "EmployeeID,MonthsSinceAdd,MonthsSinceDel\ne1,0,11\ne2,1.5,100\n",
    )
    .unwrap();
    let config = config(extracts.path(), output.path());

    let controller = YearEndPullController::from_config(&config).unwrap();
    match controller.pull_year_end(true).err().unwrap() {
        PullError::InvalidData(msg) => assert!(msg.contains("1.5"), "{msg}"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn config_without_validation_section_refuses_to_check() {
    let extracts = tempfile::tempdir().unwrap();
    write_extracts(extracts.path());
    fs::write(
        extracts.path().join("transactions_2020.csv"),
        "TransactionID,EmployeeID\nt1,e1\nt1,e2\n,e3\n",
    )
    .unwrap();
    let config = PullConfig::from_toml(&format!(
        r#"
[pull]
start_year = 2020
end_year = 2021

[source]
base_path = '{}'
"#,
        extracts.path().display()
    ))
    .unwrap();
    assert!(config.pull.check_for_errors);

    let controller = YearEndPullController::from_config(&config).unwrap();
    match controller.pull_year_end(config.pull.check_for_errors).err().unwrap() {
        PullError::Config(msg) => assert!(msg.contains("no validator"), "{msg}"),
        other => panic!("unexpected error: {other}"),
    }

    // an explicit opt-out still pulls
    let pull = controller.pull_year_end(false).unwrap();
    assert_eq!(pull.windows.len(), 2);
}
