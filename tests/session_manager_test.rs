mod common;

use background_upload::platform::TransferError;
use background_upload::session::{BgUpload, SessionAttachment, TaskState};
use background_upload::testing::{DelegateCall, RecordingDelegate};
use common::{counting_handler, invocations, upload_with, Harness};
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::{Arc, Barrier};
use std::thread;

type BgHarness = Harness<BgUpload>;

#[test]
fn test_session_exists_lifecycle() {
    let harness = BgHarness::new();
    assert!(!harness.manager.session_exists());
    assert!(harness.manager.get_delegate().is_none());

    let delegate = Arc::new(RecordingDelegate::default());
    assert_eq!(
        harness.manager.create_session(delegate.clone()),
        SessionAttachment::Created { rediscovered: 0 }
    );
    assert!(harness.manager.session_exists());
    assert_eq!(
        harness.manager.create_session(delegate.clone()),
        SessionAttachment::Reused
    );
    assert_eq!(harness.platform.open_count(&harness.identifier()), 1);

    let configuration = harness
        .platform
        .configuration(&harness.identifier())
        .unwrap();
    assert!(configuration.background);
    assert!(configuration.sends_launch_events);
    assert_eq!(configuration.identifier, "background-upload.BGUpload");
}

#[test]
fn test_create_task_without_session_fails() {
    let harness = BgHarness::new();
    assert!(!harness.upload("u1"));
    assert!(harness.manager.active_task_ids().is_empty());
    assert!(harness.platform.tasks(&harness.identifier()).is_empty());
}

#[test]
fn test_empty_task_id_is_rejected() {
    let (harness, _delegate) = BgHarness::new().with_session();
    assert!(!harness.upload(""));
    assert!(harness.platform.tasks(&harness.identifier()).is_empty());
}

#[test]
fn test_task_is_started_after_creation() {
    let (harness, _delegate) = BgHarness::new().with_session();
    assert!(harness.upload("u1"));

    assert_eq!(harness.manager.task_state("u1"), Some(TaskState::Sending));
    let tasks = harness.platform.tasks(&harness.identifier());
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].description, "u1");
    assert_eq!(tasks[0].method, "PUT");
    assert!(tasks[0].resumed);
}

#[test]
fn test_duplicate_task_id_is_rejected_while_active() {
    let (harness, _delegate) = BgHarness::new().with_session();
    assert!(harness.upload("u1"));
    assert!(!harness.upload("u1"));
    assert_eq!(harness.platform.tasks(&harness.identifier()).len(), 1);

    harness
        .platform
        .complete_task(&harness.identifier(), "u1", Some(200), None);
    assert!(harness.upload("u1"));
}

#[test]
fn test_platform_refusal_releases_task_id() {
    let (harness, _delegate) = BgHarness::new().with_session();
    harness.platform.set_require_existing_files(true);
    assert!(!harness.upload("u1"));
    assert!(harness.manager.task_state("u1").is_none());
}

#[test]
fn test_completion_reaches_delegate_then_drain_runs_handler_once() {
    let (harness, delegate) = BgHarness::new().with_session();
    let (count, handler) = counting_handler();
    harness.manager.set_completion_handler(handler);
    assert!(harness.upload("u1"));

    let identifier = harness.identifier();
    harness.platform.complete_task(&identifier, "u1", Some(200), None);

    assert_eq!(
        delegate.completions(),
        vec![DelegateCall::Completed {
            task_id: "u1".to_string(),
            status: Some(200),
            error: None
        }]
    );
    assert!(harness.manager.active_task_ids().is_empty());
    assert_eq!(invocations(&count), 0);

    harness.platform.finish_background_events(&identifier);
    assert_eq!(invocations(&count), 1);
    assert_eq!(
        delegate.count(|c| *c == DelegateCall::FinishedBackgroundEvents),
        1
    );

    harness.platform.finish_background_events(&identifier);
    assert_eq!(invocations(&count), 1);
    assert!(harness.manager.get_completion_handler().is_none());
}

#[test]
fn test_events_are_forwarded_in_order() {
    let (harness, delegate) = BgHarness::new().with_session();
    assert!(harness.upload("u1"));
    let identifier = harness.identifier();

    harness.platform.emit_progress(&identifier, "u1", 512, 1024);
    harness.platform.emit_progress(&identifier, "u1", 512, 1024);
    harness.platform.emit_response(&identifier, "u1", 201);
    harness.platform.emit_data(&identifier, "u1", b"ok");
    harness.platform.complete_task(&identifier, "u1", Some(201), None);

    let calls = delegate.calls();
    assert_eq!(calls.len(), 5);
    match &calls[1] {
        DelegateCall::Progress { task_id, progress } => {
            assert_eq!(task_id, "u1");
            assert_eq!(progress.total_bytes_sent, 1024);
            assert_eq!(progress.fraction(), Some(1.0));
        }
        other => panic!("unexpected call {other:?}"),
    }
    assert_eq!(
        calls[2],
        DelegateCall::Response {
            task_id: "u1".to_string(),
            status: 201
        }
    );
    assert!(matches!(calls[4], DelegateCall::Completed { .. }));
}

#[test]
fn test_failed_transfer_is_forwarded_and_forgotten() {
    let (harness, delegate) = BgHarness::new().with_session();
    assert!(harness.upload("u1"));
    harness.platform.complete_task(
        &harness.identifier(),
        "u1",
        None,
        Some(TransferError::TimedOut),
    );

    assert_eq!(
        delegate.completions(),
        vec![DelegateCall::Completed {
            task_id: "u1".to_string(),
            status: None,
            error: Some(TransferError::TimedOut)
        }]
    );
    assert!(harness.manager.task_state("u1").is_none());
}

#[test]
fn test_completion_handler_last_writer_wins() {
    let harness = BgHarness::new();
    let (first, first_handler) = counting_handler();
    let (second, second_handler) = counting_handler();
    harness.manager.set_completion_handler(first_handler);
    harness.manager.set_completion_handler(second_handler);

    assert!(harness.manager.get_completion_handler().is_some());
    assert!(harness.manager.finish_background_events());
    assert_eq!(invocations(&first), 0);
    assert_eq!(invocations(&second), 1);
    assert!(!harness.manager.finish_background_events());
}

#[test]
fn test_handle_events_for_other_identifier_is_ignored() {
    let harness = BgHarness::new();
    let (count, handler) = counting_handler();
    assert!(!harness
        .manager
        .handle_events_for_background_session("background-upload.ShadowUpload", handler));
    assert!(harness.manager.get_completion_handler().is_none());
    assert!(!harness.manager.finish_background_events());
    assert_eq!(invocations(&count), 0);
}

#[test]
fn test_concurrent_drains_run_handler_once() {
    let (harness, _delegate) = BgHarness::new().with_session();
    let (count, handler) = counting_handler();
    harness.manager.set_completion_handler(handler);

    let barrier = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let barrier = Arc::clone(&barrier);
            let manager = harness.manager.clone();
            let platform = Arc::clone(&harness.platform);
            let identifier = harness.identifier();
            thread::spawn(move || {
                barrier.wait();
                if i % 2 == 0 {
                    manager.finish_background_events();
                } else {
                    platform.finish_background_events(&identifier);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(invocations(&count), 1);
}

#[test]
fn test_concurrent_create_session_opens_once() {
    let harness = BgHarness::new();
    let delegate = Arc::new(RecordingDelegate::default());
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let barrier = Arc::clone(&barrier);
            let manager = harness.manager.clone();
            let delegate = delegate.clone();
            thread::spawn(move || {
                barrier.wait();
                manager.create_session(delegate)
            })
        })
        .collect();
    let attachments: Vec<SessionAttachment> =
        handles.into_iter().map(|h| h.join().unwrap()).collect();

    let created = attachments
        .iter()
        .filter(|a| matches!(a, SessionAttachment::Created { .. }))
        .count();
    assert_eq!(created, 1);
    assert_eq!(harness.platform.open_count(&harness.identifier()), 1);
}

#[test]
fn test_concurrent_task_creation_with_same_id() {
    let (harness, _delegate) = BgHarness::new().with_session();
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let barrier = Arc::clone(&barrier);
            let manager = harness.manager.clone();
            thread::spawn(move || {
                barrier.wait();
                upload_with(&manager, "shared")
            })
        })
        .collect();
    let accepted = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();

    assert_eq!(accepted, 1);
    assert_eq!(harness.platform.tasks(&harness.identifier()).len(), 1);
}

#[test]
fn test_unavailable_session_reports_error() {
    let harness = BgHarness::new();
    harness.platform.set_fail_open(true);
    let delegate = Arc::new(RecordingDelegate::default());

    let attachment = harness.manager.create_session(delegate);
    assert!(matches!(attachment, SessionAttachment::Unavailable(_)));
    assert!(!harness.manager.session_exists());
    assert!(!harness.upload("u1"));
}

proptest! {
    #[test]
    fn active_ids_track_created_minus_completed(
        ids in prop::collection::btree_set("[a-z]{1,8}", 1..12),
        completed_mask in prop::collection::vec(any::<bool>(), 12),
    ) {
        let (harness, delegate) = BgHarness::new().with_session();
        for id in &ids {
            prop_assert!(harness.upload(id));
        }

        let identifier = harness.identifier();
        let mut remaining = BTreeSet::new();
        for (id, complete) in ids.iter().zip(completed_mask.iter()) {
            if *complete {
                prop_assert!(harness.platform.complete_task(&identifier, id, Some(200), None));
            } else {
                remaining.insert(id.clone());
            }
        }

        let expected: Vec<String> = remaining.into_iter().collect();
        prop_assert_eq!(harness.manager.active_task_ids(), expected);
        prop_assert_eq!(
            delegate.completions().len(),
            completed_mask.iter().take(ids.len()).filter(|c| **c).count()
        );
    }

    #[test]
    fn completion_handler_runs_at_most_once_per_registration(
        ops in prop::collection::vec(any::<bool>(), 1..40),
    ) {
        let harness = BgHarness::new();
        let (count, _) = counting_handler();
        let mut registered = false;
        let mut expected = 0;

        for set in ops {
            if set {
                let count = Arc::clone(&count);
                harness.manager.set_completion_handler(move || {
                    count.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                });
                registered = true;
            } else {
                let ran = harness.manager.finish_background_events();
                prop_assert_eq!(ran, registered);
                if registered {
                    expected += 1;
                }
                registered = false;
            }
        }
        prop_assert_eq!(invocations(&count), expected);
    }
}
