//! End-to-end runs through classify, extract, parse and store.

mod common;

use common::{bzip2, gzip, tar_archive, zip_archive, RecordedEvent, TestHarness};
use serde_json::json;
use tabingest::db::record_repo;
use tabingest::StepStatus;

fn assert_gapless(numbers: impl Iterator<Item = u32>) {
    for (idx, n) in numbers.enumerate() {
        assert_eq!(n, idx as u32 + 1, "step numbers must run 1..=N without gaps");
    }
}

#[test]
fn two_files_in_one_zip_are_tagged_by_source() {
    let harness = TestHarness::new();
    let input = harness.write_input(
        "daily.zip",
        &zip_archive(&[
            ("x.csv", b"id,name\n1,a\n2,b\n"),
            ("y.csv", b"id,name\n3,c\n4,d\n5,e\n"),
        ]),
    );

    let result = harness.pipeline().run(&input);
    assert!(result.overall_success);

    let db = harness.database();
    assert_eq!(record_repo::count(&db).unwrap(), 5);
    assert_eq!(record_repo::count_for_source(&db, "x.csv").unwrap(), 2);
    assert_eq!(record_repo::count_for_source(&db, "y.csv").unwrap(), 3);
    assert_eq!(
        record_repo::payloads_for_source(&db, "y.csv").unwrap()[2],
        json!({"id": "5", "name": "e"})
    );
}

#[test]
fn batch_with_failing_middle_file() {
    let harness = TestHarness::new();
    let first = harness.write_input("first.csv", b"a,b\n1,2\n");
    let second = harness.write_input("second.zip", b"PK\x03\x04this is not a zip archive");
    let third = harness.write_input("third.csv", b"c;d\n3;4\n5;6\n");

    let batch = harness.pipeline().run_batch(&[first, second, third]);

    assert!(!batch.overall_success);
    assert_eq!(batch.runs.len(), 3);
    assert!(batch.runs[0].overall_success);
    assert!(!batch.runs[1].overall_success);
    assert!(batch.runs[2].overall_success);

    let failed_step = &batch.runs[1].step_outcomes[1];
    assert_eq!(failed_step.step_name, "Extraction");
    assert_eq!(failed_step.status, StepStatus::Failure);

    let db = harness.database();
    assert_eq!(record_repo::count_for_source(&db, "first.csv").unwrap(), 1);
    assert_eq!(record_repo::count_for_source(&db, "third.csv").unwrap(), 2);
    assert_eq!(harness.leftover_work_dirs(), 0);
}

#[test]
fn second_run_on_same_database_path() {
    let harness = TestHarness::new();
    let input = harness.write_input("x.csv", b"a,b\n1,2\n");

    assert!(harness.pipeline().run(&input).overall_success);
    assert!(harness.pipeline().run(&input).overall_success);

    assert_eq!(record_repo::count(&harness.database()).unwrap(), 2);
}

#[test]
fn step_numbers_are_gapless_for_every_input_kind() {
    let harness = TestHarness::new();
    let inputs = vec![
        harness.write_input("plain.csv", b"a,b\n1,2\n"),
        harness.write_input("missing-parts.zip", &zip_archive(&[])),
        harness.write_input(
            "mixed.zip",
            &zip_archive(&[
                ("ok.csv", b"a,b\n1,2\n"),
                ("bad.csv", b""),
                ("img.png", b"\x89PNG\r\n\x1a\n\x00"),
            ]),
        ),
        harness.write_input("doc.pdf", b"%PDF-1.4\n"),
        harness.write_input("noise.bin", b"\x00\x01\x02\x03\x04"),
        harness.input_dir.join("does-not-exist.csv"),
    ];

    let batch = harness.pipeline().run_batch(&inputs);
    assert_eq!(batch.runs.len(), inputs.len());
    for run in &batch.runs {
        assert!(!run.step_outcomes.is_empty());
        assert_gapless(run.step_outcomes.iter().map(|s| s.step_number));
    }
}

#[test]
fn traversal_entry_is_dropped_and_noted() {
    let harness = TestHarness::new();
    let input = harness.write_input(
        "evil.tar",
        &tar_archive(&[("../../etc/passed", b"a,b\n1,2\n"), ("fine.csv", b"a,b\n1,2\n")]),
    );

    let result = harness.pipeline().run(&input);
    assert!(result.overall_success);

    let extraction = &result.step_outcomes[1];
    assert_eq!(extraction.status, StepStatus::Partial);
    let dropped = extraction.details["dropped_entries"].as_array().unwrap();
    assert_eq!(dropped.len(), 1);
    assert!(dropped[0].as_str().unwrap().contains("../../etc/passed"));

    assert!(!harness.root_dir.join("etc").exists());
    assert!(!harness.temp_path().join("etc").exists());
    assert_eq!(record_repo::count_for_source(&harness.database(), "fine.csv").unwrap(), 1);
}

#[test]
fn gzip_wrapped_tar_is_unpacked_to_members() {
    let harness = TestHarness::new();
    let tarball = tar_archive(&[("x.csv", b"a,b\n1,2\n"), ("y.csv", b"a,b\n3,4\n5,6\n")]);
    let input = harness.write_input("bundle.tgz", &gzip(&tarball));

    let result = harness.pipeline().run(&input);
    assert!(result.overall_success);
    assert_eq!(result.step_outcomes[1].details["files"], json!(["x.csv", "y.csv"]));
    assert_eq!(record_repo::count(&harness.database()).unwrap(), 3);
}

#[test]
fn plain_gzip_yields_one_file_without_suffix() {
    let harness = TestHarness::new();
    let input = harness.write_input("rates.csv.gz", &gzip(b"ccy,rate\nUSD,1\nEUR,2\n"));

    let result = harness.pipeline().run(&input);
    assert!(result.overall_success);
    assert_eq!(result.step_outcomes[1].details["files"], json!(["rates.csv"]));
    assert_eq!(
        record_repo::count_for_source(&harness.database(), "rates.csv").unwrap(),
        2
    );
}

#[test]
fn bzip2_wrapped_tar_is_unpacked() {
    let harness = TestHarness::new();
    let tarball = tar_archive(&[("z.csv", b"a|b\n1|2\n")]);
    let input = harness.write_input("bundle.tar.bz2", &bzip2(&tarball));

    let result = harness.pipeline().run(&input);
    assert!(result.overall_success);
    assert_eq!(record_repo::count_for_source(&harness.database(), "z.csv").unwrap(), 1);
}

#[test]
fn ragged_rows_are_stored_as_is() {
    let harness = TestHarness::new();
    let input = harness.write_input("ragged.csv", b"a,b,c\n1,2\n3,4,5,6\n");

    let result = harness.pipeline().run(&input);
    assert!(result.overall_success);

    let payloads = record_repo::payloads_for_source(&harness.database(), "ragged.csv").unwrap();
    assert_eq!(payloads[0], json!({"a": "1", "b": "2"}));
    assert_eq!(payloads[1], json!({"a": "3", "b": "4", "c": "5", "_extra": ["6"]}));
}

#[test]
fn zip_detected_regardless_of_extension() {
    let harness = TestHarness::new();
    let input = harness.write_input("report.csv", &zip_archive(&[("inner.csv", b"a,b\n1,2\n")]));

    let result = harness.pipeline().run(&input);
    assert_eq!(result.step_outcomes[0].details["category"], json!("zip"));
    assert_eq!(record_repo::count_for_source(&harness.database(), "inner.csv").unwrap(), 1);
}

#[test]
fn report_stream_is_framed_by_banners() {
    let harness = TestHarness::new();
    let a = harness.write_input("a.csv", b"a,b\n1,2\n");
    let b = harness.write_input("b.bin", b"\x00\x00\x00");

    harness.pipeline().run_batch(&[a, b]);
    let events = harness.sink.events();

    assert!(matches!(
        &events[0],
        RecordedEvent::RunStarted { source_filename, size_bytes: 8 } if source_filename == "a.csv"
    ));
    assert!(matches!(
        events.last().unwrap(),
        RecordedEvent::BatchFinished { run_count: 2, .. }
    ));

    let finished: Vec<(String, bool)> = events
        .iter()
        .filter_map(|e| match e {
            RecordedEvent::RunFinished {
                source_filename,
                overall_success,
            } => Some((source_filename.clone(), *overall_success)),
            _ => None,
        })
        .collect();
    // b.bin is octet-stream: recognized, unsupported, skipped.
    assert_eq!(
        finished,
        vec![("a.csv".to_string(), true), ("b.bin".to_string(), true)]
    );

    let steps = harness.sink.steps();
    assert!(steps.iter().any(|s| s.status == StepStatus::Skipped));
}

#[test]
fn uploads_are_staged_processed_and_removed() {
    let harness = TestHarness::new();
    let pipeline = harness.pipeline();

    let batch = pipeline.ingest_uploads(&[
        ("../outside/x.csv".to_string(), b"a,b\n1,2\n".to_vec()),
        ("x.csv".to_string(), b"a,b\n3,4\n".to_vec()),
    ]);

    assert!(batch.overall_success);
    assert_eq!(batch.runs[0].source_filename, "x.csv");
    // Each staged copy is removed before the next upload is staged.
    assert_eq!(batch.runs[1].source_filename, "x.csv");
    assert_eq!(record_repo::count_for_source(&harness.database(), "x.csv").unwrap(), 2);
    assert_eq!(
        std::fs::read_dir(&pipeline.config().upload_dir).unwrap().count(),
        0
    );
    assert!(!harness.root_dir.join("outside").exists());
}

#[test]
fn unstageable_upload_does_not_stop_the_batch() {
    let harness = TestHarness::new();
    let pipeline = harness.pipeline();

    let batch = pipeline.ingest_uploads(&[
        ("good.csv".to_string(), b"a,b\n1,2\n".to_vec()),
        ("..".to_string(), b"a,b\n1,2\n".to_vec()),
        ("third.csv".to_string(), b"a,b\n3,4\n".to_vec()),
    ]);

    assert_eq!(batch.runs.len(), 3);
    assert!(!batch.overall_success);
    let success: Vec<bool> = batch.runs.iter().map(|r| r.overall_success).collect();
    assert_eq!(success, vec![true, false, true]);
    assert_eq!(batch.runs[1].step_outcomes[0].status, StepStatus::Failure);

    let db = harness.database();
    assert_eq!(record_repo::count_for_source(&db, "good.csv").unwrap(), 1);
    assert_eq!(record_repo::count_for_source(&db, "third.csv").unwrap(), 1);
    assert_eq!(
        std::fs::read_dir(&pipeline.config().upload_dir).unwrap().count(),
        0
    );

    let finished = harness
        .sink
        .events()
        .iter()
        .filter(|e| matches!(e, RecordedEvent::RunFinished { .. }))
        .count();
    assert_eq!(finished, 3);
}
