//! Rename-mode runs: derived names, collisions, dry runs and bookkeeping.

mod common;

use common::fakes::unreachable;
use common::{FakeBackend, TestHarness};
use picscribe::pipeline::{Action, FailureKind, FileOutcome, Mode, RunOptions};

fn rename() -> RunOptions {
    RunOptions {
        mode: Mode::Rename,
        ..Default::default()
    }
}

#[test]
fn test_rename_uses_description() {
    let harness = TestHarness::new(FakeBackend::describing("A red barn, at dusk."));
    let source = harness.write_image("IMG_0001.jpg");
    let size = std::fs::metadata(&source).unwrap().len();

    let summary = harness.run(&rename());
    assert_eq!(summary.succeeded, 1);

    let target = harness.path("a-red-barn-at-dusk.jpg");
    assert!(!source.exists());
    assert_eq!(std::fs::metadata(&target).unwrap().len(), size);
    assert_eq!(harness.file_names(), vec!["a-red-barn-at-dusk.jpg"]);

    // Recorded under the new path, never the old one.
    assert!(harness.store.rename_record(&target).unwrap().is_some());
    assert!(harness.store.rename_record(&source).unwrap().is_none());
}

#[test]
fn test_rename_uses_filename_prompt() {
    let harness = TestHarness::new(FakeBackend::describing("cat"));
    harness.write_image("x.png");
    harness.run(&rename());
    assert_eq!(
        harness.backend.prompts(),
        vec![harness.config.ollama.filename_prompt.clone()]
    );
}

#[test]
fn test_collisions_get_numbered_suffixes() {
    let harness = TestHarness::new(FakeBackend::describing("Cat"));
    for name in ["IMG_1.jpg", "IMG_2.jpg", "IMG_3.jpg"] {
        harness.write_image(name);
    }

    let summary = harness.run(&rename());
    assert_eq!(summary.succeeded, 3);
    assert_eq!(harness.file_names(), vec!["cat-1.jpg", "cat-2.jpg", "cat.jpg"]);

    let targets: Vec<_> = summary
        .outcomes
        .iter()
        .map(|o| match o {
            FileOutcome::Succeeded {
                action: Action::Renamed { target, .. },
                ..
            } => target.file_name().unwrap().to_string_lossy().into_owned(),
            other => panic!("unexpected outcome: {:?}", other),
        })
        .collect();
    assert_eq!(targets, vec!["cat.jpg", "cat-1.jpg", "cat-2.jpg"]);
}

#[test]
fn test_rerun_skips_named_files() {
    let harness = TestHarness::new(FakeBackend::describing("Cat"));
    harness.write_image("IMG_1.jpg");
    harness.write_image("IMG_2.jpg");

    harness.run(&rename());
    let rerun = harness.run(&rename());

    assert_eq!(rerun.skipped, 2);
    assert_eq!(rerun.succeeded, 0);
    assert_eq!(harness.backend.calls(), 2);
    assert_eq!(harness.file_names(), vec!["cat-1.jpg", "cat.jpg"]);
}

#[test]
fn test_dry_run_reports_plan_without_moving() {
    let harness = TestHarness::new(FakeBackend::describing("Sunset over water"));
    let source = harness.write_image("DSC_42.png");

    let summary = harness.run(&RunOptions {
        dry_run: true,
        ..rename()
    });

    match &summary.outcomes[0] {
        FileOutcome::Succeeded {
            action: Action::PlannedRename { target },
            ..
        } => assert_eq!(target, &harness.path("sunset-over-water.png")),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert!(source.exists());
    assert_eq!(harness.file_names(), vec!["DSC_42.png"]);
    assert_eq!(harness.store.rename_count().unwrap(), 0);
}

#[test]
fn test_dry_run_plan_numbers_colliding_names() {
    let harness = TestHarness::new(FakeBackend::describing("Cat"));
    harness.write_image("IMG_1.jpg");
    harness.write_image("IMG_2.jpg");

    let summary = harness.run(&RunOptions {
        dry_run: true,
        ..rename()
    });

    let planned: Vec<_> = summary
        .outcomes
        .iter()
        .map(|o| match o {
            FileOutcome::Succeeded {
                action: Action::PlannedRename { target },
                ..
            } => target.clone(),
            other => panic!("unexpected outcome: {:?}", other),
        })
        .collect();
    assert_eq!(planned, vec![harness.path("cat.jpg"), harness.path("cat-1.jpg")]);
    assert_eq!(harness.file_names(), vec!["IMG_1.jpg", "IMG_2.jpg"]);
}

#[test]
fn test_matching_name_is_left_alone() {
    let harness = TestHarness::new(FakeBackend::describing("A cat"));
    let path = harness.write_image("a-cat.jpg");

    let summary = harness.run(&rename());
    assert!(matches!(
        &summary.outcomes[0],
        FileOutcome::Succeeded {
            action: Action::NameUnchanged,
            ..
        }
    ));
    assert!(path.exists());
    assert_eq!(harness.file_names(), vec!["a-cat.jpg"]);
    assert!(harness.store.rename_record(&path).unwrap().is_some());
}

#[test]
fn test_backup_originals_are_hidden_from_later_runs() {
    let mut harness = TestHarness::new(FakeBackend::describing("Dog"));
    harness.config.file_operations.backup_originals = true;
    harness.write_image("IMG_9.jpg");

    let summary = harness.run(&rename());
    match &summary.outcomes[0] {
        FileOutcome::Succeeded {
            action: Action::Renamed { backup, .. },
            ..
        } => assert_eq!(backup.as_deref(), Some(harness.path(".originals/IMG_9.jpg").as_path())),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert!(harness.path(".originals/IMG_9.jpg").exists());

    let rerun = harness.run(&rename());
    assert_eq!(rerun.attempted, 1);
    assert_eq!(rerun.skipped, 1);
}

#[test]
fn test_record_renames_disabled() {
    let mut harness = TestHarness::new(FakeBackend::describing("Dog"));
    harness.config.processing.record_renames = false;
    harness.write_image("IMG_9.jpg");

    harness.run(&rename());
    assert_eq!(harness.store.rename_count().unwrap(), 0);
    assert_eq!(harness.file_names(), vec!["dog.jpg"]);

    // Without bookkeeping the rerun asks again and keeps the name.
    let rerun = harness.run(&rename());
    assert_eq!(rerun.succeeded, 1);
    assert_eq!(harness.backend.calls(), 2);
}

#[test]
fn test_renamed_files_are_still_described() {
    let harness = TestHarness::new(FakeBackend::describing("A cat"));
    harness.write_image("IMG_1.jpg");

    let renamed = harness.run(&rename());
    assert_eq!(renamed.succeeded, 1);
    let target = harness.path("a-cat.jpg");
    assert!(!harness.store.has_record(&target).unwrap());

    let described = harness.run(&RunOptions::default());
    assert_eq!(described.succeeded, 1);
    assert_eq!(described.skipped, 0);
    assert!(matches!(
        &described.outcomes[0],
        FileOutcome::Succeeded {
            action: Action::Described { .. },
            ..
        }
    ));
    assert_eq!(harness.store.get(&target).unwrap().unwrap().description, "A cat");

    // Describing does not disturb the rename bookkeeping.
    let rerun = harness.run(&rename());
    assert_eq!(rerun.skipped, 1);
}

#[test]
fn test_inference_failure_leaves_file_in_place() {
    let harness = TestHarness::new(FakeBackend::scripted(
        vec![Err(unreachable()), Err(unreachable()), Err(unreachable())],
        None,
    ));
    let source = harness.write_image("IMG_1.jpg");

    let summary = harness.run(&rename());
    assert_eq!(summary.failures[0].kind, FailureKind::Unreachable);
    assert!(source.exists());
}

#[test]
fn test_empty_description_uses_fallback_name() {
    let harness = TestHarness::new(FakeBackend::describing("?!"));
    harness.write_image("IMG_1.png");

    harness.run(&rename());
    assert_eq!(harness.file_names(), vec!["untitled.png"]);
}

#[test]
fn test_pooled_renames_never_collide() {
    let mut harness = TestHarness::new(FakeBackend::describing("Bird"));
    harness.config.processing.workers = 4;
    for i in 0..6 {
        harness.write_image(&format!("IMG_{}.jpg", i));
    }

    let summary = harness.run(&rename());
    assert_eq!(summary.succeeded, 6);
    assert_eq!(
        harness.file_names(),
        vec!["bird-1.jpg", "bird-2.jpg", "bird-3.jpg", "bird-4.jpg", "bird-5.jpg", "bird.jpg"]
    );
}
