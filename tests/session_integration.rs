//! End-to-end exercise of the session manager against the echo
//! backing fixture: FIFO ordering, steering, snapshot/restore.

use std::sync::Arc;

use stepforge::prelude::*;
use stepforge_testkit::EchoSession;

#[tokio::test]
async fn steered_turn_echoes_the_combined_content_and_snapshots_it() {
    let backing = Arc::new(EchoSession::new());
    let session = SessionManager::new(backing);

    session.steer("be terse");
    let handle = session.send("summarize the file");
    let response = handle.wait().await.unwrap();

    assert_eq!(response.content, "be terse\nsummarize the file");

    let snapshot = session.snapshot().await;
    assert_eq!(snapshot.transcript.len(), 1);
    assert_eq!(snapshot.transcript[0].response, "be terse\nsummarize the file");
}

#[tokio::test]
async fn restored_session_keeps_history_without_replaying_the_backing() {
    let backing = Arc::new(EchoSession::new());
    let session = SessionManager::new(backing.clone());
    session.send("first").wait().await.unwrap();
    let snapshot = session.snapshot().await;

    let restored = SessionManager::restore(snapshot, backing.clone());
    assert_eq!(backing.prompts().await, vec!["first".to_string()]);

    let second = restored.send("second").wait().await.unwrap();
    assert_eq!(second.content, "second");
    assert_eq!(
        backing.prompts().await,
        vec!["first".to_string(), "second".to_string()]
    );
}
