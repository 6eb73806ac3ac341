pub mod config;
pub mod device;
pub mod error;
pub mod http;
pub mod inference;
pub mod liveness;
pub mod loopback;
pub mod media;
pub mod nats;
pub mod notify;
pub mod room;
pub mod rtc;

pub use config::Config;
pub use device::{DeviceCapture, DeviceTrackManager, FacingMode, LocalTracks, TrackSet};
pub use error::{ErrorResponse, RoomError, RoomResult};
pub use http::{create_router, AppState};
pub use inference::{ActionType, InferenceService, LivenessDetector};
pub use liveness::{ActionPhase, FlashPhase, LivenessOrchestrator};
pub use nats::{NatsInference, NatsSettings};
pub use notify::{Notification, NotificationCenter};
pub use room::{RoomComponents, RoomController, RoomSettings, RoomStatus};
pub use rtc::{LocalTrack, RemoteTrack, RtcClient, SessionGateway, SessionState};
