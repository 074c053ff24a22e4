mod common;

use std::sync::Arc;
use std::time::Duration;

use chat_sync::{
    EDIT_WINDOW_MS, EditRejection, LocalStatus, ManualClock, MutationError, PollOutcome,
    SendOutcome, StoreEvent,
};

use common::*;

const HOUR: i64 = 60 * MINUTE;

async fn loaded_as(user: &str, clock: &Arc<ManualClock>) -> chat_sync::ChatSession<FakeApi> {
    let session = session_as(FakeApi::new(history(3, "p1"), Vec::new()), clock, user);
    session.load().await.expect("load");
    session
}

#[tokio::test]
async fn confirmed_send_replaces_pending_copy() {
    let clock = Arc::new(ManualClock::new(NOW));
    let session = loaded_as("me", &clock).await;
    let mut events = session.subscribe();
    clock.advance(1_000);

    let outcome = session.send_message("hello").await;

    assert_eq!(outcome, SendOutcome::Confirmed("srv-1".into()));
    let ids = ids(&session);
    assert_eq!(ids.last().map(String::as_str), Some("srv-1"));
    assert!(ids.iter().all(|id| !id.starts_with("temp-")));
    session.read(|store| {
        let sent = store.timeline.get("srv-1").expect("confirmed message");
        assert_eq!(sent.author_uuid, "me");
        assert_eq!(sent.local_status, None);
        assert!(store.timeline.is_consistent());
    });
    assert_eq!(session.api().with_state(|s| s.posted.clone()), vec!["hello"]);

    let StoreEvent::TimelineChanged { uuids } = events.recv().await.expect("pending event") else {
        panic!("expected a timeline event");
    };
    let temp = uuids[0].clone();
    assert!(temp.starts_with("temp-"));
    assert_eq!(
        events.recv().await.expect("confirmed event"),
        StoreEvent::TimelineChanged {
            uuids: vec![temp, "srv-1".into()]
        }
    );
}

#[tokio::test]
async fn first_confirmed_send_adopts_local_user() {
    let clock = Arc::new(ManualClock::new(NOW + 2 * HOUR));
    let session = session(FakeApi::new(history(3, "p1"), Vec::new()), &clock);
    session.load().await.expect("load");
    assert_eq!(session.read(|store| store.current_user_uuid.clone()), None);
    let mut events = session.subscribe();

    session.send_message("first").await;

    assert_eq!(
        session.read(|store| store.current_user_uuid.clone()),
        Some("server-author".into())
    );
    events.recv().await.expect("pending event");
    assert_eq!(
        events.recv().await.expect("user event"),
        StoreEvent::CurrentUserChanged(Some("server-author".into()))
    );
}

#[tokio::test]
async fn failed_send_leaves_placeholder_and_retry_is_separate() {
    let clock = Arc::new(ManualClock::new(NOW));
    let session = loaded_as("me", &clock).await;
    session.api().with_state(|s| s.fail_post = true);

    let outcome = session.send_message("lost").await;

    let SendOutcome::Placeholder(temp) = outcome else {
        panic!("expected a placeholder, got {outcome:?}");
    };
    session.read(|store| {
        let placeholder = store.timeline.get(&temp).expect("placeholder kept");
        assert!(placeholder.is_placeholder());
        assert_eq!(placeholder.author_uuid, "me");
        assert_eq!(placeholder.text, "lost");
    });

    session.api().with_state(|s| s.fail_post = false);
    clock.advance(1_000);
    assert_eq!(
        session.send_message("lost").await,
        SendOutcome::Confirmed("srv-2".into())
    );

    let ids = ids(&session);
    assert!(ids.contains(&temp));
    assert!(ids.contains(&"srv-2".to_string()));
    assert_eq!(
        session.read(|store| store.timeline.get(&temp).and_then(|m| m.local_status)),
        Some(LocalStatus::Failed)
    );
}

#[tokio::test(start_paused = true)]
async fn failed_send_survives_reload_during_post() {
    let clock = Arc::new(ManualClock::new(NOW));
    let session = loaded_as("me", &clock).await;
    session.api().with_state(|s| {
        s.fail_post = true;
        s.post_delay = Some(Duration::from_millis(20));
    });

    let (outcome, reload) = tokio::join!(session.send_message("lost"), async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        session.load().await
    });
    reload.expect("reload");

    let SendOutcome::Placeholder(temp) = outcome else {
        panic!("expected a placeholder, got {outcome:?}");
    };
    session.read(|store| {
        let placeholder = store.timeline.get(&temp).expect("placeholder restored");
        assert_eq!(placeholder.local_status, Some(LocalStatus::Failed));
        assert_eq!(placeholder.text, "lost");
        assert!(store.timeline.is_consistent());
    });
}

#[tokio::test]
async fn reply_links_target_and_clears_composer() {
    let clock = Arc::new(ManualClock::new(NOW));
    let session = loaded_as("me", &clock).await;
    session.set_replying_to(Some("m001".into()));
    assert_eq!(
        session.read(|store| store.replying_to.clone()),
        Some("m001".into())
    );

    let outcome = session.send_reply("agreed", "m001").await;

    session.read(|store| {
        let reply = store.timeline.get(outcome.uuid()).expect("reply");
        assert_eq!(reply.reply_to_message_uuid.as_deref(), Some("m001"));
        assert_eq!(store.replying_to, None);
    });
}

#[tokio::test]
async fn send_racing_a_poll_keeps_one_copy() {
    let clock = Arc::new(ManualClock::new(NOW));
    let session = loaded_as("me", &clock).await;
    session.api().with_state(|s| {
        s.post_sent_at = NOW + 1_000;
        s.history.push(msg("srv-1", "me", NOW + 1_000));
    });
    clock.advance(2_000);
    assert!(matches!(
        session.poll_updates().await,
        PollOutcome::Merged { inserted: 1, .. }
    ));

    assert_eq!(
        session.send_message("hello").await,
        SendOutcome::Confirmed("srv-1".into())
    );

    let ids = ids(&session);
    assert_eq!(ids.iter().filter(|id| *id == "srv-1").count(), 1);
    assert!(ids.iter().all(|id| !id.starts_with("temp-")));
    assert!(session.read(|store| store.timeline.is_consistent()));
}

#[tokio::test]
async fn reaction_toggles_and_registers_self() {
    let clock = Arc::new(ManualClock::new(NOW));
    let session = loaded_as("me", &clock).await;
    let mut events = session.subscribe();

    assert_eq!(session.toggle_reaction("m001", "👍"), Ok(true));

    session.read(|store| {
        let message = store.timeline.get("m001").expect("m001");
        assert_eq!(message.reactions.len(), 1);
        assert_eq!(message.reactions[0].participant_uuid, "me");
        assert_eq!(message.reactions[0].value, "👍");
        assert_eq!(store.directory.get("me").map(|p| p.name.as_str()), Some("You"));
    });
    assert_eq!(
        events.recv().await.expect("directory event"),
        StoreEvent::ParticipantsChanged
    );

    assert_eq!(session.toggle_reaction("m001", "👍"), Ok(false));
    session.read(|store| {
        assert!(store.timeline.get("m001").expect("m001").reactions.is_empty());
    });
}

#[tokio::test]
async fn reaction_needs_local_user_and_known_message() {
    let clock = Arc::new(ManualClock::new(NOW + 2 * HOUR));
    let session = session(FakeApi::new(history(3, "p1"), Vec::new()), &clock);
    session.load().await.expect("load");

    assert_eq!(
        session.toggle_reaction("m001", "👍"),
        Err(MutationError::NoLocalUser)
    );

    session.set_current_user(Some("me".into()));
    assert_eq!(
        session.toggle_reaction("nope", "👍"),
        Err(MutationError::NotFound("nope".into()))
    );
}

#[tokio::test]
async fn own_recent_message_can_be_edited_once() {
    let clock = Arc::new(ManualClock::new(NOW));
    let session = loaded_as("me", &clock).await;
    session.send_message("helo").await;
    clock.advance(MINUTE);

    session.edit_message("srv-1", "hello").expect("edit");

    session.read(|store| {
        let message = store.timeline.get("srv-1").expect("srv-1");
        assert_eq!(message.text, "hello");
        assert!(message.is_edited());
    });
    assert_eq!(session.api().with_state(|s| s.posted.len()), 1);

    assert_eq!(
        session.edit_message("srv-1", "hello!"),
        Err(MutationError::EditRejected(EditRejection::AlreadyEdited))
    );
}

#[tokio::test]
async fn edit_is_refused_after_window() {
    let clock = Arc::new(ManualClock::new(NOW));
    let session = loaded_as("me", &clock).await;
    session.send_message("late").await;
    clock.advance(EDIT_WINDOW_MS);

    assert_eq!(
        session.edit_message("srv-1", "too late"),
        Err(MutationError::EditRejected(EditRejection::WindowElapsed))
    );
    assert_eq!(
        session.read(|store| store.timeline.get("srv-1").map(|m| m.text.clone())),
        Some("late".into())
    );
}

#[tokio::test]
async fn edit_rejects_foreign_and_unknown_messages() {
    let clock = Arc::new(ManualClock::new(NOW));
    let session = loaded_as("me", &clock).await;

    assert_eq!(
        session.edit_message("m000", "mine now"),
        Err(MutationError::EditRejected(EditRejection::NotAuthor))
    );
    assert_eq!(
        session.edit_message("nope", "x"),
        Err(MutationError::NotFound("nope".into()))
    );
}
