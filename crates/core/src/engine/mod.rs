use serde::{Deserialize, Serialize};

use crate::blend::{BlendController, WeightVector};
use crate::clock::{AudioTransport, Generation, PlaybackClock};
use crate::config::EngineConfig;
use crate::cue::CueTrack;
use crate::driver::{MorphBinding, MorphTargetMesh, RenderDriver};
use crate::error::Result;
use crate::loader::CueLoader;
use crate::sched::{SchedulerState, VisemeScheduler};

/// Locations handed back by the upstream speech backend for one utterance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtteranceRequest {
    #[serde(rename = "audioUrl")]
    pub audio_url: String,
    #[serde(rename = "mouthCuesUrl")]
    pub cues_url: String,
}

/// Opens audio transports for utterance playback. The demo application backs
/// this with a device output stream; tests use [`crate::ManualTransport`].
pub trait TransportFactory {
    fn open(&self, audio_url: &str) -> Result<Box<dyn AudioTransport>>;
}

/// Claim on the next utterance slot. A ticket goes stale the moment a newer
/// utterance is requested or playback is stopped; committing a stale ticket
/// is a silent no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtteranceTicket {
    seq: u64,
}

/// Owns the full lip-sync pipeline for one avatar and sequences utterances
/// through it.
///
/// Starting an utterance is a deterministic two-phase protocol: load the cue
/// track first, then attach the audio and arm the scheduler against the new
/// clock generation. Requests are totally ordered by a ticket sequence, so a
/// cue load that finishes after a newer request has taken the slot is
/// discarded without touching current state.
pub struct LipSyncEngine<F> {
    loader: CueLoader,
    transports: F,
    clock: PlaybackClock,
    scheduler: VisemeScheduler,
    blend: BlendController,
    driver: RenderDriver,
    request_seq: u64,
}

impl<F: TransportFactory> LipSyncEngine<F> {
    /// Builds an engine bound to the given mesh's channel set. Binding
    /// resolves every viseme channel up front; a mesh missing one is rejected
    /// here rather than mid-playback.
    pub fn new<M: MorphTargetMesh>(
        config: EngineConfig,
        transports: F,
        mesh: &M,
    ) -> Result<Self> {
        let binding = MorphBinding::bind(mesh)?;
        Ok(Self {
            loader: CueLoader::new(),
            transports,
            clock: PlaybackClock::new(),
            scheduler: VisemeScheduler::new(),
            blend: BlendController::new(config.blend),
            driver: RenderDriver::new(binding),
            request_seq: 0,
        })
    }

    /// Claims the utterance slot, invalidating every outstanding ticket.
    pub fn begin(&mut self) -> UtteranceTicket {
        self.request_seq += 1;
        UtteranceTicket {
            seq: self.request_seq,
        }
    }

    /// Applies a finished cue load, provided the ticket is still the newest.
    ///
    /// Returns `Ok(None)` for a stale ticket, leaving scheduler and clock
    /// untouched. Otherwise opens the audio transport, attaches it, and arms
    /// the scheduler against the new generation. A transport failure tears
    /// the current utterance down and the mouth decays to neutral.
    pub fn commit(
        &mut self,
        ticket: UtteranceTicket,
        track: CueTrack,
        audio_url: &str,
    ) -> Result<Option<Generation>> {
        if ticket.seq != self.request_seq {
            tracing::debug!(
                ticket = ticket.seq,
                latest = self.request_seq,
                "discarding superseded utterance"
            );
            return Ok(None);
        }

        let transport = match self.transports.open(audio_url) {
            Ok(transport) => transport,
            Err(err) => {
                self.degrade();
                return Err(err);
            }
        };

        let generation = self.clock.attach(transport);
        tracing::info!(generation, cues = track.len(), "utterance armed");
        self.scheduler.reset(track, generation);
        Ok(Some(generation))
    }

    /// Starts a new utterance end to end: claims a ticket, awaits the cue
    /// load, and commits it.
    ///
    /// Returns `Ok(None)` when a newer request or a `stop` superseded this
    /// one while the cues were loading. On a load failure the failed request
    /// is only allowed to tear playback down if it is still the newest.
    pub async fn speak(&mut self, request: &UtteranceRequest) -> Result<Option<Generation>> {
        let ticket = self.begin();
        tracing::info!(
            seq = ticket.seq,
            cues = %request.cues_url,
            audio = %request.audio_url,
            "starting utterance"
        );

        let loader = self.loader.clone();
        let loaded = loader.load(&request.cues_url).await;
        if ticket.seq != self.request_seq {
            tracing::debug!(seq = ticket.seq, "cue load superseded while in flight");
            return Ok(None);
        }

        match loaded {
            Ok(track) => self.commit(ticket, track, &request.audio_url),
            Err(err) => {
                self.degrade();
                Err(err)
            }
        }
    }

    /// Advances one rendered frame.
    pub fn tick<M: MorphTargetMesh>(&mut self, dt: f32, mesh: &mut M) {
        self.driver.tick(
            dt,
            &mut self.clock,
            &mut self.scheduler,
            &mut self.blend,
            mesh,
        );
    }

    /// Cuts the current utterance short. Outstanding tickets go stale, the
    /// audio is detached, and the mouth decays to neutral.
    pub fn stop(&mut self) {
        self.request_seq += 1;
        self.clock.detach();
        self.scheduler.cancel();
        self.blend.reset();
    }

    /// Tears playback down after a failure, degrading to a closed mouth.
    fn degrade(&mut self) {
        self.clock.detach();
        self.scheduler.clear();
        self.blend.reset();
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    pub fn generation(&self) -> Generation {
        self.clock.generation()
    }

    pub fn weights(&self) -> &WeightVector {
        self.blend.weights()
    }

    /// Whether the blend has effectively reached its target shape. Together
    /// with [`SchedulerState::Finished`] this tells a host loop the utterance
    /// is visually over.
    pub fn blend_settled(&self) -> bool {
        self.blend.is_settled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualTransport;
    use crate::cue::{MouthCue, VisemeId};
    use crate::error::LipSyncError;

    const DT: f32 = 1.0 / 60.0;

    struct TestMesh {
        names: Vec<&'static str>,
        weights: Vec<f32>,
    }

    impl TestMesh {
        fn new() -> Self {
            let names: Vec<&'static str> =
                VisemeId::ALL.iter().map(|v| v.morph_channel()).collect();
            let weights = vec![0.0; names.len()];
            Self { names, weights }
        }
    }

    impl MorphTargetMesh for TestMesh {
        fn channel_index(&self, name: &str) -> Option<usize> {
            self.names.iter().position(|candidate| *candidate == name)
        }

        fn set_morph_weight(&mut self, index: usize, weight: f32) {
            self.weights[index] = weight;
        }
    }

    /// Opens a fresh manual transport per utterance and keeps a control
    /// handle to each one, so tests can drive the transport the engine holds.
    #[derive(Clone, Default)]
    struct ManualFactory {
        opened: std::sync::Arc<std::sync::Mutex<Vec<ManualTransport>>>,
    }

    impl ManualFactory {
        fn last(&self) -> ManualTransport {
            self.opened.lock().unwrap().last().unwrap().clone()
        }
    }

    impl TransportFactory for ManualFactory {
        fn open(&self, _audio_url: &str) -> Result<Box<dyn AudioTransport>> {
            let transport = ManualTransport::new();
            self.opened.lock().unwrap().push(transport.clone());
            Ok(Box::new(transport))
        }
    }

    struct FailingFactory;

    impl TransportFactory for FailingFactory {
        fn open(&self, audio_url: &str) -> Result<Box<dyn AudioTransport>> {
            Err(LipSyncError::playback(format!("cannot open `{audio_url}`")))
        }
    }

    fn sample_track() -> CueTrack {
        CueTrack::new(vec![
            MouthCue::new(0.0, 0.2, VisemeId::Pp),
            MouthCue::new(0.2, 0.5, VisemeId::Kk),
        ])
        .unwrap()
    }

    fn engine_with_factory() -> (LipSyncEngine<ManualFactory>, ManualFactory, TestMesh) {
        let mesh = TestMesh::new();
        let factory = ManualFactory::default();
        let engine =
            LipSyncEngine::new(EngineConfig::default(), factory.clone(), &mesh).unwrap();
        (engine, factory, mesh)
    }

    fn cue_file(dir: &tempfile::TempDir) -> String {
        let path = dir.path().join("cues.json");
        std::fs::write(
            &path,
            r#"{ "mouthCues": [
                { "start": 0.0, "end": 0.2, "value": "A" },
                { "start": 0.2, "end": 0.5, "value": "B" }
            ] }"#,
        )
        .unwrap();
        path.display().to_string()
    }

    #[tokio::test]
    async fn speak_arms_then_plays_then_finishes() {
        let (mut engine, factory, mut mesh) = engine_with_factory();
        let dir = tempfile::tempdir().unwrap();
        let request = UtteranceRequest {
            audio_url: "utterance.wav".into(),
            cues_url: cue_file(&dir),
        };

        let generation = engine.speak(&request).await.unwrap();
        assert_eq!(generation, Some(1));
        assert_eq!(engine.scheduler_state(), SchedulerState::Armed);

        let handle = factory.last();
        handle.play();
        handle.set_position(0.1);
        for _ in 0..60 {
            engine.tick(DT, &mut mesh);
        }
        assert_eq!(engine.scheduler_state(), SchedulerState::Active);
        assert!(engine.weights().get(VisemeId::Pp) > 0.9);

        handle.finish();
        for _ in 0..300 {
            engine.tick(DT, &mut mesh);
        }
        assert_eq!(engine.scheduler_state(), SchedulerState::Finished);
        assert!(engine.blend_settled());
        assert!(engine.weights().get(VisemeId::Neutral) > 0.99);
    }

    #[test]
    fn committing_a_stale_ticket_changes_nothing() {
        let (mut engine, _factory, _mesh) = engine_with_factory();

        let stale = engine.begin();
        let fresh = engine.begin();

        let result = engine.commit(stale, sample_track(), "old.wav").unwrap();
        assert_eq!(result, None);
        assert_eq!(engine.scheduler_state(), SchedulerState::Idle);
        assert_eq!(engine.generation(), 0);

        let result = engine.commit(fresh, sample_track(), "new.wav").unwrap();
        assert_eq!(result, Some(1));
        assert_eq!(engine.scheduler_state(), SchedulerState::Armed);
    }

    #[test]
    fn stop_invalidates_outstanding_tickets() {
        let (mut engine, _factory, _mesh) = engine_with_factory();

        let ticket = engine.begin();
        engine.stop();

        let result = engine.commit(ticket, sample_track(), "late.wav").unwrap();
        assert_eq!(result, None);
        assert_eq!(engine.scheduler_state(), SchedulerState::Cancelled);
    }

    #[tokio::test]
    async fn failed_load_degrades_to_neutral() {
        let (mut engine, _factory, mut mesh) = engine_with_factory();
        let request = UtteranceRequest {
            audio_url: "utterance.wav".into(),
            cues_url: "missing-cues.json".into(),
        };

        let err = engine.speak(&request).await.unwrap_err();
        assert!(matches!(err, LipSyncError::Io(_)));
        assert_eq!(engine.scheduler_state(), SchedulerState::Idle);

        for _ in 0..120 {
            engine.tick(DT, &mut mesh);
        }
        assert!(engine.weights().get(VisemeId::Neutral) > 0.99);
    }

    #[test]
    fn failed_transport_degrades_to_neutral() {
        let mesh = TestMesh::new();
        let mut engine =
            LipSyncEngine::new(EngineConfig::default(), FailingFactory, &mesh).unwrap();

        let ticket = engine.begin();
        let err = engine.commit(ticket, sample_track(), "utterance.wav").unwrap_err();
        assert!(matches!(err, LipSyncError::Playback(_)));
        assert_eq!(engine.scheduler_state(), SchedulerState::Idle);
    }

    #[tokio::test]
    async fn replacing_an_utterance_reuses_nothing_stale() {
        let (mut engine, factory, mut mesh) = engine_with_factory();
        let dir = tempfile::tempdir().unwrap();
        let request = UtteranceRequest {
            audio_url: "first.wav".into(),
            cues_url: cue_file(&dir),
        };

        let first = engine.speak(&request).await.unwrap().unwrap();
        let first_handle = factory.last();
        first_handle.play();
        first_handle.set_position(0.1);
        engine.tick(DT, &mut mesh);
        assert_eq!(engine.scheduler_state(), SchedulerState::Active);

        let second = engine.speak(&request).await.unwrap().unwrap();
        assert!(second > first);
        assert_eq!(engine.scheduler_state(), SchedulerState::Armed);

        // The first transport ending late cannot reach the new utterance:
        // the clock dropped it at attach time.
        first_handle.finish();
        engine.tick(DT, &mut mesh);
        assert_ne!(engine.scheduler_state(), SchedulerState::Finished);
    }
}
