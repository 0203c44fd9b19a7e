mod common;

use background_upload::platform::{SessionEvent, TransferError};
use background_upload::session::{BgUpload, SessionAttachment, TaskState};
use background_upload::testing::{DelegateCall, RecordingDelegate};
use common::{counting_handler, invocations, upload_with, Harness};
use std::sync::Arc;

type BgHarness = Harness<BgUpload>;

#[test]
fn test_relaunch_rediscovers_outstanding_tasks() {
    let (harness, first_delegate) = BgHarness::new().with_session();
    assert!(harness.upload("a"));
    assert!(harness.upload("b"));
    harness
        .platform
        .emit_progress(&harness.identifier(), "a", 300, 1000);
    drop(first_delegate);

    // The OS relaunches the app to deliver events for the session
    let relaunched = harness.relaunch();
    let (count, handler) = counting_handler();
    assert!(relaunched.handle_events_for_background_session(&harness.identifier(), handler));

    let delegate = Arc::new(RecordingDelegate::default());
    assert_eq!(
        relaunched.create_session(delegate.clone()),
        SessionAttachment::Created { rediscovered: 2 }
    );
    assert_eq!(relaunched.active_task_ids(), vec!["a", "b"]);
    assert_eq!(relaunched.task_state("a"), Some(TaskState::Sending));
    assert_eq!(harness.platform.open_count(&harness.identifier()), 2);

    harness
        .platform
        .complete_task(&harness.identifier(), "a", Some(200), None);
    harness.platform.complete_task(
        &harness.identifier(),
        "b",
        None,
        Some(TransferError::Network {
            code: -1005,
            message: "The network connection was lost.".to_string(),
        }),
    );
    assert_eq!(delegate.completions().len(), 2);
    assert_eq!(invocations(&count), 0);

    harness.platform.finish_background_events(&harness.identifier());
    assert_eq!(invocations(&count), 1);
    assert!(relaunched.active_task_ids().is_empty());
}

#[test]
fn test_stale_delegate_is_replaced_without_reopening() {
    let (harness, first_delegate) = BgHarness::new().with_session();
    assert!(harness.upload("u1"));
    drop(first_delegate);
    assert!(harness.manager.get_delegate().is_none());

    // Delivered while no delegate is alive: dropped, nothing panics
    harness
        .platform
        .emit_progress(&harness.identifier(), "u1", 10, 100);

    let replacement = Arc::new(RecordingDelegate::default());
    assert_eq!(
        harness.manager.create_session(replacement.clone()),
        SessionAttachment::Reattached
    );
    assert_eq!(harness.platform.open_count(&harness.identifier()), 1);
    assert!(harness.manager.get_delegate().is_some());

    harness
        .platform
        .complete_task(&harness.identifier(), "u1", Some(204), None);
    assert_eq!(replacement.completions().len(), 1);
}

#[test]
fn test_get_delegate_downcasts_to_concrete_type() {
    let (harness, delegate) = BgHarness::new().with_session();
    let bound = harness.manager.get_delegate().unwrap();
    let concrete = bound.into_any().downcast::<RecordingDelegate>().unwrap();
    assert!(Arc::ptr_eq(&concrete, &delegate));
}

#[test]
fn test_platform_invalidation_clears_session_and_runs_handler() {
    let (harness, delegate) = BgHarness::new().with_session();
    let (count, handler) = counting_handler();
    harness.manager.set_completion_handler(handler);
    assert!(harness.upload("u1"));

    harness.platform.invalidate(
        &harness.identifier(),
        Some(TransferError::Network {
            code: -1,
            message: "session lost".to_string(),
        }),
    );

    assert!(!harness.manager.session_exists());
    assert!(harness.manager.active_task_ids().is_empty());
    assert_eq!(delegate.count(|c| *c == DelegateCall::BecameInvalid), 1);
    assert_eq!(invocations(&count), 1);
    assert!(!harness.upload("u2"));

    // A new session can be created afterwards
    assert!(matches!(
        harness.manager.create_session(delegate.clone()),
        SessionAttachment::Created { .. }
    ));
    assert!(upload_with(&harness.manager, "u2"));
}

#[test]
fn test_teardown_cancels_outstanding_tasks() {
    let (harness, delegate) = BgHarness::new().with_session();
    assert!(harness.upload("u1"));
    assert!(harness.upload("u2"));

    assert!(harness.manager.teardown(true));
    assert!(!harness.manager.session_exists());
    assert!(harness.manager.active_task_ids().is_empty());
    assert!(harness.platform.outstanding(&harness.identifier()).is_empty());
    assert!(harness.platform.is_invalidated(&harness.identifier()));

    let cancelled = |id: &str| DelegateCall::Completed {
        task_id: id.to_string(),
        status: None,
        error: Some(TransferError::Cancelled),
    };
    assert_eq!(delegate.completions(), vec![cancelled("u1"), cancelled("u2")]);
    assert_eq!(delegate.calls().last(), Some(&DelegateCall::BecameInvalid));
    assert_eq!(delegate.count(|c| *c == DelegateCall::BecameInvalid), 1);

    assert!(!harness.manager.teardown(true));
}

#[test]
fn test_graceful_teardown_lets_tasks_finish_on_platform() {
    let (harness, delegate) = BgHarness::new().with_session();
    assert!(harness.upload("u1"));

    assert!(harness.manager.teardown(false));
    assert_eq!(harness.platform.outstanding(&harness.identifier()).len(), 1);
    assert!(delegate.completions().is_empty());

    harness
        .platform
        .emit_progress(&harness.identifier(), "u1", 64, 128);
    assert!(harness
        .platform
        .complete_task(&harness.identifier(), "u1", Some(200), None));
    assert!(harness.platform.outstanding(&harness.identifier()).is_empty());

    assert_eq!(
        delegate.completions(),
        vec![DelegateCall::Completed {
            task_id: "u1".to_string(),
            status: Some(200),
            error: None
        }]
    );
    assert_eq!(delegate.count(|c| matches!(c, DelegateCall::Progress { .. })), 1);
    assert_eq!(delegate.count(|c| *c == DelegateCall::BecameInvalid), 1);
    assert!(harness.manager.active_task_ids().is_empty());
}

#[test]
fn test_teardown_runs_pending_completion_handler() {
    let (harness, _delegate) = BgHarness::new().with_session();
    let (count, handler) = counting_handler();
    harness.manager.set_completion_handler(handler);
    assert!(harness.upload("u1"));

    assert!(harness.manager.teardown(false));
    assert_eq!(invocations(&count), 1);

    harness
        .platform
        .complete_task(&harness.identifier(), "u1", Some(200), None);
    assert_eq!(invocations(&count), 1);
}

#[test]
fn test_late_events_of_replaced_session_leave_new_session_alone() {
    let (harness, first_delegate) = BgHarness::new().with_session();
    let identifier = harness.identifier();
    assert!(harness.upload("u1"));
    let old_task = harness.platform.task_id(&identifier, "u1").unwrap();

    assert!(harness.manager.teardown(false));
    let delegate = Arc::new(RecordingDelegate::default());
    assert_eq!(
        harness.manager.create_session(delegate.clone()),
        SessionAttachment::Created { rediscovered: 1 }
    );
    let (count, handler) = counting_handler();
    harness.manager.set_completion_handler(handler);

    assert!(harness.platform.emit_to_replaced(
        &identifier,
        SessionEvent::TaskCompleted {
            task: old_task,
            description: Some("u1".to_string()),
            status: None,
            error: Some(TransferError::Cancelled),
        },
    ));
    assert_eq!(harness.manager.task_state("u1"), Some(TaskState::Sending));
    assert!(delegate.completions().is_empty());

    assert!(harness
        .platform
        .emit_to_replaced(&identifier, SessionEvent::BecameInvalid { error: None }));
    assert!(harness
        .platform
        .emit_to_replaced(&identifier, SessionEvent::FinishedBackgroundEvents));
    assert!(harness.manager.session_exists());
    assert_eq!(invocations(&count), 0);
    assert!(harness.manager.get_completion_handler().is_some());
    assert_eq!(delegate.count(|c| *c == DelegateCall::BecameInvalid), 0);
    assert_eq!(first_delegate.count(|c| *c == DelegateCall::BecameInvalid), 0);

    harness.platform.complete_task(&identifier, "u1", Some(200), None);
    assert_eq!(delegate.completions().len(), 1);
    assert!(harness.manager.active_task_ids().is_empty());
}

#[test]
fn test_recreated_session_keeps_tasks_created_after_teardown() {
    let (harness, delegate) = BgHarness::new().with_session();
    assert!(harness.upload("u1"));
    assert!(harness.manager.teardown(true));

    assert!(matches!(
        harness.manager.create_session(delegate.clone()),
        SessionAttachment::Created { rediscovered: 0 }
    ));
    assert!(harness.upload("u2"));
    assert_eq!(harness.manager.active_task_ids(), vec!["u2"]);

    harness
        .platform
        .complete_task(&harness.identifier(), "u2", Some(201), None);
    assert_eq!(delegate.completions().len(), 2);
    assert!(harness.manager.active_task_ids().is_empty());
}
