use dgp_core::import::{parse_file, Delimiter, JobId};
use dgp_core::{
    CoreConfig, DataKind, DataSetSpec, FlightSpec, ImportConfig, ImportError, ImportReport,
    JobState, Oid, ProjectSession, Scalar, SeriesStore, StoreKey, ValidationError,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(30);

fn write_gravity_file(dir: &Path, name: &str, rows: usize) -> PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "time,gravity,long,cross").unwrap();
    for row in 0..rows {
        writeln!(
            file,
            "{:.1},{:.3},{:.4},{:.4}",
            1_520_604_000.0 + row as f64 * 0.1,
            9_800.0 + (row % 17) as f64 * 0.25,
            0.01 * (row % 5) as f64,
            -0.02 * (row % 3) as f64
        )
        .unwrap();
    }
    path
}

fn gravity_config() -> ImportConfig {
    ImportConfig::gravity()
        .with_columns(["time", "gravity", "long", "cross"])
        .with_skip_rows(1)
        .with_data_rate(10.0)
}

fn session_with_datasets(dir: &Path, count: usize) -> (ProjectSession, Vec<Oid>) {
    let mut session =
        ProjectSession::create(&dir.join("project"), "Survey", CoreConfig::default()).unwrap();
    let flight = session
        .controller_mut()
        .add_flight(FlightSpec::new("F1"))
        .unwrap();
    let datasets = (0..count)
        .map(|index| {
            session
                .controller_mut()
                .flight(flight)
                .unwrap()
                .add_dataset(DataSetSpec::named(format!("ds{index}")))
                .unwrap()
        })
        .collect();
    (session, datasets)
}

#[test]
fn gravity_import_is_stored_under_fresh_key_and_attached() {
    let dir = tempfile::tempdir().unwrap();
    let raw = write_gravity_file(dir.path(), "AT1A-11_0309.csv", 1000);
    let (mut session, datasets) = session_with_datasets(dir.path(), 1);

    let job = session
        .submit_import(&raw, gravity_config(), datasets[0])
        .unwrap();
    let reports = session.wait_for_imports(WAIT);

    assert_eq!(reports.len(), 1);
    let datafile = reports[0].datafile().unwrap();
    assert_eq!(job.state(), JobState::Completed);
    assert_eq!(
        session.controller_mut().dataset(datasets[0]).unwrap().gravity(),
        Some(datafile)
    );

    let file = session.tree().find(datafile).unwrap().as_datafile().unwrap();
    let key = file.store_key();
    assert_eq!(key, StoreKey::for_datafile(DataKind::Gravity, datafile));
    assert_eq!(file.column_format(), ["time", "gravity", "long", "cross"]);

    let table = session.store().get(&key).unwrap().unwrap();
    assert_eq!(table.len(), 1000);
    assert_eq!(table.column_names(), vec!["time", "gravity", "long", "cross"]);
    assert!(table.index().windows(2).all(|pair| pair[0] < pair[1]));

    let attrs = session.store().get_attrs(&key).unwrap().unwrap();
    assert_eq!(
        attrs["source_path"],
        Scalar::Text(raw.to_string_lossy().into_owned())
    );
    assert_eq!(attrs["row_count"], Scalar::Int(1000));
    assert_eq!(attrs["data_rate_hz"], Scalar::Float(10.0));

    let reopened_dir = session.dir().to_path_buf();
    drop(session);
    let reopened = ProjectSession::open(&reopened_dir, CoreConfig::default()).unwrap();
    assert!(reopened.tree().find(datafile).is_some());
}

#[test]
fn concurrent_imports_attach_to_their_own_datasets_and_occupied_slot_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let first_raw = write_gravity_file(dir.path(), "first.csv", 300);
    let second_raw = write_gravity_file(dir.path(), "second.csv", 400);
    let (mut session, datasets) = session_with_datasets(dir.path(), 2);

    let first = session
        .submit_import(&first_raw, gravity_config(), datasets[0])
        .unwrap();
    let second = session
        .submit_import(&second_raw, gravity_config(), datasets[1])
        .unwrap();
    let reports = session.wait_for_imports(WAIT);
    assert_eq!(reports.len(), 2);

    let attached_to = |job_id: JobId| {
        reports
            .iter()
            .find(|report| report.job().id() == job_id)
            .and_then(ImportReport::datafile)
            .unwrap()
    };
    let first_file = attached_to(first.id());
    let second_file = attached_to(second.id());
    assert_eq!(session.tree().parent_of(first_file), Some(datasets[0]));
    assert_eq!(session.tree().parent_of(second_file), Some(datasets[1]));
    assert_eq!(session.tree().datafiles_of(datasets[0]).len(), 1);
    assert_eq!(session.tree().datafiles_of(datasets[1]).len(), 1);
    assert_eq!(session.store().keys().unwrap().len(), 2);

    let third = session
        .submit_import(&second_raw, gravity_config(), datasets[0])
        .unwrap();
    let reports = session.wait_for_imports(WAIT);
    assert_eq!(reports.len(), 1);
    assert_eq!(third.state(), JobState::Completed);
    match &reports[0] {
        ImportReport::Rejected { error, .. } => assert!(matches!(
            error.as_validation(),
            Some(ValidationError::SlotOccupied {
                kind: DataKind::Gravity,
                ..
            })
        )),
        other => panic!("expected rejection, got {other:?}"),
    }
    assert_eq!(
        session.controller_mut().dataset(datasets[0]).unwrap().gravity(),
        Some(first_file)
    );
    assert_eq!(session.store().keys().unwrap().len(), 2);
}

#[test]
fn failed_and_cancelled_jobs_are_reported_not_raised() {
    let dir = tempfile::tempdir().unwrap();
    let (mut session, datasets) = session_with_datasets(dir.path(), 1);
    let bad = dir.path().join("bad.csv");
    std::fs::write(&bad, "time,gravity\n1.0,2.0\n").unwrap();

    session
        .submit_import(&bad, gravity_config(), datasets[0])
        .unwrap();
    session
        .submit_import(dir.path().join("missing.csv"), gravity_config(), datasets[0])
        .unwrap();
    let reports = session.wait_for_imports(WAIT);

    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|report| matches!(
        report,
        ImportReport::Failed {
            error: ImportError::SchemaMismatch { .. } | ImportError::Io { .. },
            ..
        }
    )));
    assert!(session.tree().datafiles_of(datasets[0]).is_empty());
    assert!(session.store().keys().unwrap().is_empty());
}

#[test]
fn submit_rejects_unknown_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let (mut session, _) = session_with_datasets(dir.path(), 1);
    let flight = session.tree().flights()[0].oid();
    assert!(session
        .submit_import("/raw/x.csv", gravity_config(), flight)
        .is_err());
    assert_eq!(session.pending_imports(), 0);
}

#[test]
fn whitespace_trajectory_file_parses_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("0309.txt");
    std::fs::write(
        &path,
        "mdy hms lat long ortho_ht ell_ht num_sats pdop\n\
         03/09/2018 14:00:00.00 46.7 -92.1 180.2 150.9 11 1.4\n\
         03/09/2018 14:00:00.10 46.7 -92.1 180.3 151.0 11 1.4\n\
         03/09/2018 14:00:00.20 46.7 -92.1 NaN 151.1 11 1.4\n",
    )
    .unwrap();
    let config = ImportConfig::trajectory()
        .with_delimiter(Delimiter::Whitespace)
        .with_skip_rows(1)
        .interpolated();

    let parsed = parse_file(&path, &config).unwrap();
    assert_eq!(parsed.table.len(), 3);
    assert_eq!(parsed.table.columns().len(), 8);
    let ortho = parsed.table.float_column("ortho_ht").unwrap();
    assert_eq!(ortho[2], ortho[1]);
    assert_eq!(parsed.attrs["kind"], Scalar::from("trajectory"));
}

#[test]
fn cancelled_imports_leave_no_store_entries() {
    let dir = tempfile::tempdir().unwrap();
    let config = CoreConfig::default().with_workers(1);
    let mut session =
        ProjectSession::create(&dir.path().join("project"), "Survey", config).unwrap();
    let flight = session
        .controller_mut()
        .add_flight(FlightSpec::new("F1"))
        .unwrap();
    let mut datasets = Vec::new();
    for index in 0..4 {
        let raw = write_gravity_file(dir.path(), &format!("line{index}.csv"), 5_000);
        let dataset = session
            .controller_mut()
            .flight(flight)
            .unwrap()
            .add_dataset(DataSetSpec::named(format!("ds{index}")))
            .unwrap();
        session
            .submit_import(&raw, gravity_config(), dataset)
            .unwrap();
        datasets.push(dataset);
    }

    session.cancel_imports();
    let reports = session.wait_for_imports(WAIT);

    assert_eq!(reports.len(), 4);
    assert_eq!(session.pending_imports(), 0);
    let attached = reports
        .iter()
        .filter(|report| report.datafile().is_some())
        .count();
    for report in &reports {
        match report {
            ImportReport::Attached { .. } => {}
            ImportReport::Failed { job, error } => {
                assert!(error.is_cancelled());
                assert_eq!(job.state(), JobState::Failed);
            }
            other => panic!("unexpected report {other:?}"),
        }
    }
    assert_eq!(session.store().keys().unwrap().len(), attached);
    let files: usize = datasets
        .iter()
        .map(|dataset| session.tree().datafiles_of(*dataset).len())
        .sum();
    assert_eq!(files, attached);
}
