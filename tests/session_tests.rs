// Integration tests for the transport session, remote tracks and rendering

mod common;

use anyhow::Result;
use common::{harness, wait_for};
use loqa_room::error::RoomError;
use loqa_room::loopback::LoopbackClient;
use loqa_room::rtc::{MediaKind, RenderTarget, SessionGateway, SessionState};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_join_and_leave_are_idempotent() -> Result<()> {
    let client = Arc::new(LoopbackClient::new());
    let gateway = SessionGateway::new(client.clone());

    let handle = gateway.join("room-token").await?;
    assert_eq!(gateway.state(), SessionState::Joined);
    assert_eq!(handle.room.room_name, "loopback-room-tok");
    assert!(gateway.handle().is_some());

    let err = gateway.join("room-token").await.unwrap_err();
    assert!(matches!(err, RoomError::Misuse(_)));

    gateway.leave().await?;
    gateway.leave().await?;
    assert_eq!(gateway.state(), SessionState::Left);
    assert!(gateway.handle().is_none());
    assert_eq!(client.leave_count(), 1);

    Ok(())
}

#[tokio::test]
async fn test_leave_before_join_does_not_touch_transport() -> Result<()> {
    let client = Arc::new(LoopbackClient::new());
    let gateway = SessionGateway::new(client.clone());

    gateway.leave().await?;
    assert_eq!(client.leave_count(), 0);
    assert!(matches!(
        gateway.join("room-token").await,
        Err(RoomError::Misuse(_))
    ));

    Ok(())
}

#[tokio::test]
async fn test_failed_join_can_be_retried() -> Result<()> {
    let client = Arc::new(LoopbackClient::new());
    let gateway = SessionGateway::new(client.clone());

    assert!(matches!(gateway.join("  ").await, Err(RoomError::Join(_))));

    client.set_fail_join(true);
    let err = gateway.join("room-token").await.unwrap_err();
    assert!(matches!(err, RoomError::Join(_)));
    assert_eq!(gateway.state(), SessionState::Unjoined);

    client.set_fail_join(false);
    gateway.join("room-token").await?;
    assert!(gateway.is_joined());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_leave_while_joining_discards_late_join() -> Result<()> {
    let client = Arc::new(LoopbackClient::new());
    client.set_join_delay(Some(Duration::from_secs(1)));
    let gateway = Arc::new(SessionGateway::new(client.clone()));

    let joining = tokio::spawn({
        let gateway = Arc::clone(&gateway);
        async move { gateway.join("room-token").await }
    });

    assert!(wait_for(|| gateway.state() == SessionState::Joining).await);
    gateway.leave().await?;

    let result = joining.await?;
    assert!(matches!(result, Err(RoomError::Join(_))));
    assert_eq!(gateway.state(), SessionState::Left);
    assert_eq!(client.leave_count(), 1);
    assert!(!client.is_joined());

    Ok(())
}

#[tokio::test]
async fn test_publish_requires_joined_session() -> Result<()> {
    let client = Arc::new(LoopbackClient::new());
    let gateway = SessionGateway::new(client.clone());

    assert!(gateway.publish(&[]).await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_local_tracks_published_and_previewed_on_join() -> Result<()> {
    let h = harness()?;
    h.start().await?;

    let camera = h
        .room
        .devices()
        .tracks()
        .current()
        .camera()
        .cloned()
        .expect("camera acquired");

    assert!(wait_for(|| h.client.published().contains(&camera.id().to_string())).await);
    let playback = h.devices.playback();
    assert!(wait_for(|| playback.count_for(camera.id(), RenderTarget::LocalPreview) >= 1).await);

    Ok(())
}

#[tokio::test]
async fn test_camera_toggle_republishes_new_tracks() -> Result<()> {
    let h = harness()?;
    h.start().await?;

    let before = h.room.devices().tracks().current();
    h.room.toggle_camera().await;

    let tracks = h.room.devices().tracks();
    assert!(
        wait_for(|| tracks
            .current()
            .camera()
            .map(|c| c.is_active() && before.camera().map(|b| b.id()) != Some(c.id()))
            .unwrap_or(false))
        .await
    );

    let camera = tracks.current().camera().cloned().expect("camera reacquired");
    assert!(wait_for(|| h.client.published().contains(&camera.id().to_string())).await);
    assert!(before.tracks().iter().all(|t| t.is_released()));

    Ok(())
}

#[tokio::test]
async fn test_remote_tracks_follow_session_events() -> Result<()> {
    let h = harness()?;
    h.start().await?;

    let remote = h.room.remote();
    let video = h.client.add_remote_track("alice", MediaKind::Video);
    let audio = h.client.add_remote_track("alice", MediaKind::Audio);
    let other = h.client.add_remote_track("bob", MediaKind::Video);

    assert!(wait_for(|| remote.current().len() == 3).await);

    let playback = h.client.playback();
    assert!(wait_for(|| playback.count_for(&video.id, RenderTarget::RemoteView) == 1).await);
    assert!(wait_for(|| playback.count_for(&audio.id, RenderTarget::RemoteView) == 1).await);

    h.client.remove_remote_track(&other.id);
    assert!(wait_for(|| remote.current().len() == 2).await);

    h.client.participant_left("alice");
    assert!(wait_for(|| remote.current().is_empty()).await);

    // Earlier tracks are played once only
    assert_eq!(playback.count_for(&video.id, RenderTarget::RemoteView), 1);

    Ok(())
}

#[tokio::test]
async fn test_remote_track_announced_at_join_is_kept() -> Result<()> {
    let h = harness()?;
    h.room.start("test-token").await?;
    let video = h.client.add_remote_track("alice", MediaKind::Video);

    let remote = h.room.remote();
    assert!(wait_for(|| remote.current().len() == 1).await);
    assert_eq!(remote.current()[0].id, video.id);

    let playback = h.client.playback();
    assert!(wait_for(|| playback.count_for(&video.id, RenderTarget::RemoteView) == 1).await);

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_remote_tracks_seen_while_joining_apply_once_joined() -> Result<()> {
    let h = harness()?;
    h.client.set_join_delay(Some(Duration::from_secs(1)));

    let starting = tokio::spawn({
        let room = Arc::clone(&h.room);
        async move { room.start("test-token").await }
    });

    let gateway = h.room.gateway();
    assert!(wait_for(|| gateway.state() == SessionState::Joining).await);
    h.client.add_remote_track("alice", MediaKind::Audio);
    assert!(h.room.remote().current().is_empty());

    starting.await??;
    let remote = h.room.remote();
    assert!(wait_for(|| remote.current().len() == 1).await);
    assert_eq!(remote.current()[0].participant_id, "alice");

    Ok(())
}

#[tokio::test]
async fn test_registry_cleared_on_leave() -> Result<()> {
    let h = harness()?;
    h.start().await?;

    h.client.add_remote_track("alice", MediaKind::Video);
    let remote = h.room.remote();
    assert!(wait_for(|| remote.current().len() == 1).await);

    h.room.leave().await?;
    assert!(wait_for(|| remote.current().is_empty()).await);
    assert_eq!(h.room.status().session, SessionState::Left);

    Ok(())
}

#[tokio::test]
async fn test_status_reflects_room() -> Result<()> {
    let h = harness()?;
    h.start().await?;
    h.client.add_remote_track("alice", MediaKind::Video);
    let remote = h.room.remote();
    assert!(wait_for(|| remote.current().len() == 1).await);

    let status = h.room.status();
    assert_eq!(status.session, SessionState::Joined);
    assert!(status.handle.is_some());
    assert_eq!(status.local_tracks.len(), 2);
    assert_eq!(status.remote_tracks.len(), 1);
    assert!(status.countdown.is_none());
    assert!(status.caption.is_none());

    let json = serde_json::to_value(&status)?;
    assert_eq!(json["session"], "joined");
    assert_eq!(json["action_phase"]["state"], "idle");
    assert_eq!(json["flash_phase"], "closed");
    assert_eq!(json["recording"], "idle");
    assert_eq!(json["remote_tracks"][0]["participant_id"], "alice");

    Ok(())
}

#[tokio::test]
async fn test_shutdown_leaves_and_releases() -> Result<()> {
    let h = harness()?;
    h.start().await?;

    h.room.shutdown().await;
    h.room.shutdown().await;

    assert_eq!(h.client.leave_count(), 1);
    assert!(h.devices.opened().iter().all(|t| t.is_released()));
    assert!(matches!(
        h.room.start("test-token").await,
        Err(RoomError::Misuse(_))
    ));

    Ok(())
}
