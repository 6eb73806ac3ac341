// Integration tests for local track ownership and facing-mode toggling

mod common;

use anyhow::Result;
use common::wait_for;
use loqa_room::device::{DeviceTrackManager, FacingMode};
use loqa_room::error::RoomError;
use loqa_room::loopback::VirtualDevices;
use loqa_room::notify::NotificationCenter;
use loqa_room::rtc::TrackRole;
use std::sync::Arc;
use std::time::Duration;

fn manager(devices: &Arc<VirtualDevices>) -> Arc<DeviceTrackManager> {
    Arc::new(DeviceTrackManager::new(
        devices.clone(),
        FacingMode::User,
        NotificationCenter::new(),
    ))
}

#[tokio::test(start_paused = true)]
async fn test_toggle_sequence_keeps_single_active_set() -> Result<()> {
    let devices = Arc::new(VirtualDevices::new());
    let manager = manager(&devices);
    let tracks = manager.tracks();
    let _watcher = manager.spawn();

    assert!(wait_for(|| tracks.find(TrackRole::Camera).is_some()).await);

    let mut expected = FacingMode::User;
    for n in 1..=5 {
        expected = manager.toggle_facing().await;
        assert_eq!(expected, if n % 2 == 1 { FacingMode::Environment } else { FacingMode::User });

        assert!(
            wait_for(|| tracks
                .find(TrackRole::Camera)
                .map(|camera| camera.facing() == Some(expected))
                .unwrap_or(false))
            .await
        );
        tokio::time::sleep(Duration::from_millis(50)).await;

        let opened = devices.opened();
        let active: Vec<_> = opened.iter().filter(|t| t.is_active()).collect();
        let cameras = active.iter().filter(|t| t.role() == TrackRole::Camera).count();
        let microphones = active
            .iter()
            .filter(|t| t.role() == TrackRole::Microphone)
            .count();
        assert_eq!(cameras, 1, "after toggle {}", n);
        assert!(microphones <= 1, "after toggle {}", n);

        // Everything not in the current set has been released
        let current = tracks.current();
        for track in &opened {
            let held = current.tracks().iter().any(|t| t.id() == track.id());
            assert_eq!(track.is_released(), !held, "track {}", track.id());
        }
    }

    assert_eq!(manager.facing_mode(), expected);
    Ok(())
}

#[tokio::test]
async fn test_toggle_releases_before_reacquire() -> Result<()> {
    let devices = Arc::new(VirtualDevices::new());
    let manager = manager(&devices);
    manager.refresh().await?;

    let before = manager.tracks().current();
    assert_eq!(before.len(), 2);

    manager.toggle_facing().await;

    assert!(before.tracks().iter().all(|t| t.is_released()));
    assert!(manager.tracks().current().is_empty());
    assert!(matches!(
        manager.tracks().require(TrackRole::Camera),
        Err(RoomError::DeviceUnavailable(TrackRole::Camera))
    ));

    Ok(())
}

#[tokio::test]
async fn test_missing_microphone_yields_camera_only_set() -> Result<()> {
    let devices = Arc::new(VirtualDevices::new());
    devices.deny_microphone(true);

    let notifier = NotificationCenter::new();
    let manager = DeviceTrackManager::new(devices.clone(), FacingMode::Environment, notifier.clone());
    manager.refresh().await?;

    let set = manager.tracks().current();
    assert_eq!(set.len(), 1);
    assert_eq!(set.camera().and_then(|c| c.facing()), Some(FacingMode::Environment));
    assert!(set.microphone().is_none());
    assert_eq!(notifier.last().map(|n| n.title), Some("Microphone unavailable".to_string()));

    Ok(())
}

#[tokio::test]
async fn test_denied_camera_yields_no_tracks() -> Result<()> {
    let devices = Arc::new(VirtualDevices::new());
    devices.deny_camera(true);

    let manager = manager(&devices);
    let err = manager.refresh().await.unwrap_err();

    assert!(matches!(err, RoomError::DeviceUnavailable(TrackRole::Camera)));
    assert!(manager.tracks().current().is_empty());
    assert!(devices.opened().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_release_all_releases_everything() -> Result<()> {
    let devices = Arc::new(VirtualDevices::new());
    let manager = manager(&devices);
    manager.refresh().await?;
    manager.refresh().await?;

    manager.release_all().await;

    assert_eq!(devices.opened().len(), 4);
    assert!(devices.opened().iter().all(|t| t.is_released()));
    assert!(manager.tracks().current().is_empty());

    Ok(())
}
