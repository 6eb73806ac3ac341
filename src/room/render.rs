use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::RenderSettings;
use crate::device::LocalTracks;
use crate::rtc::{RemoteTrack, RenderTarget, SessionGateway, SessionState};

/// Keep render targets and the published set in step with the tracks
///
/// While joined: every new local set is previewed and published, and every
/// newly subscribed remote track is played into the remote view.
pub(crate) fn spawn(
    gateway: Arc<SessionGateway>,
    mut local: LocalTracks,
    mut remote: watch::Receiver<Vec<RemoteTrack>>,
    render: RenderSettings,
) -> JoinHandle<()> {
    let mut state_rx = gateway.subscribe();

    tokio::spawn(async move {
        let mut played: HashSet<String> = HashSet::new();

        loop {
            tokio::select! {
                changed = state_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = *state_rx.borrow_and_update();
                    match state {
                        SessionState::Joined => {
                            sync_local(&gateway, &local, &render).await;
                            let tracks = remote.borrow_and_update().clone();
                            sync_remote(&tracks, &mut played, &render);
                        }
                        SessionState::Left => break,
                        _ => {}
                    }
                }
                alive = local.changed() => {
                    if !alive {
                        break;
                    }
                    if gateway.is_joined() {
                        sync_local(&gateway, &local, &render).await;
                    }
                }
                changed = remote.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let tracks = remote.borrow_and_update().clone();
                    if gateway.is_joined() {
                        sync_remote(&tracks, &mut played, &render);
                    }
                }
            }
        }

        info!("Render loop stopped");
    })
}

async fn sync_local(gateway: &SessionGateway, local: &LocalTracks, render: &RenderSettings) {
    let set = local.current();
    if set.is_empty() {
        return;
    }

    if render.local_preview {
        if let Some(camera) = set.camera().filter(|c| c.is_active()) {
            if let Err(e) = camera.play(RenderTarget::LocalPreview) {
                warn!("Failed to preview camera {}: {:#}", camera.id(), e);
            }
        }
    }

    if let Err(e) = gateway.publish(set.tracks()).await {
        warn!("Failed to publish local tracks: {:#}", e);
    }
}

fn sync_remote(tracks: &[RemoteTrack], played: &mut HashSet<String>, render: &RenderSettings) {
    played.retain(|id| tracks.iter().any(|t| &t.id == id));

    if !render.remote_view {
        return;
    }

    for track in tracks {
        if played.contains(&track.id) {
            continue;
        }
        match track.play(RenderTarget::RemoteView) {
            Ok(()) => {
                debug!("Playing remote track {} from {}", track.id, track.participant_id);
                played.insert(track.id.clone());
            }
            Err(e) => warn!("Failed to play remote track {}: {:#}", track.id, e),
        }
    }
}
