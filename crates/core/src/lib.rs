//! Core library for the avatar lip-sync application.
//!
//! The crate turns a spoken audio track plus a precomputed mouth-cue timeline
//! into smoothly animated morph-target weights. Each module owns one stage of
//! the per-frame pipeline: the playback clock samples the audio transport,
//! the scheduler resolves the active cue for that position, the blend
//! controller smooths the resulting shape, and the render driver writes the
//! weight vector into a mesh. The engine module sequences whole utterances
//! through that pipeline.

pub mod blend;
pub mod clock;
pub mod config;
pub mod cue;
pub mod driver;
pub mod engine;
pub mod error;
pub mod loader;
pub mod sched;

pub use blend::{BlendConfig, BlendController, WeightVector};
pub use clock::{
    AudioTransport, ClockEvent, ClockSnapshot, Generation, ManualTransport, PlaybackClock,
    TransportEvent,
};
pub use config::{EngineConfig, FrameConfig};
pub use cue::{CueTrack, MouthCue, VisemeId};
pub use driver::{MorphBinding, MorphTargetMesh, RenderDriver};
pub use engine::{LipSyncEngine, TransportFactory, UtteranceRequest, UtteranceTicket};
pub use error::{LipSyncError, Result};
pub use loader::{parse_cue_track, CueLoader};
pub use sched::{SchedulerState, VisemeScheduler};
