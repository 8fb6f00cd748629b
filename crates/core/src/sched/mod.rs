use crate::clock::{ClockEvent, ClockSnapshot, Generation, TransportEvent};
use crate::cue::{CueTrack, VisemeId};

/// Lifecycle of one utterance as seen by the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerState {
    /// No track armed.
    #[default]
    Idle,
    /// Track loaded, the clock has not yet been observed playing.
    Armed,
    /// Resolving cues against a live clock.
    Active,
    /// The clock reported the end of the utterance.
    Finished,
    /// Superseded or stopped before finishing.
    Cancelled,
}

/// Resolves the active mouth cue for the current playback position and owns
/// the per-utterance lifecycle.
///
/// The scheduler is keyed to one clock generation at a time: snapshots and
/// events from any other generation are expected race leftovers and are
/// dropped without touching the state machine.
#[derive(Debug, Default)]
pub struct VisemeScheduler {
    state: SchedulerState,
    track: Option<CueTrack>,
    generation: Generation,
    target: VisemeId,
}

impl VisemeScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms a freshly loaded track against the given clock generation,
    /// discarding whatever utterance came before.
    pub fn reset(&mut self, track: CueTrack, generation: Generation) {
        if matches!(self.state, SchedulerState::Armed | SchedulerState::Active) {
            tracing::debug!(
                superseded = self.generation,
                replacement = generation,
                "cancelling in-flight utterance"
            );
            self.state = SchedulerState::Cancelled;
        }
        self.track = Some(track);
        self.generation = generation;
        self.target = VisemeId::Neutral;
        self.state = SchedulerState::Armed;
    }

    /// Drops the armed utterance without replacing it.
    pub fn cancel(&mut self) {
        self.track = None;
        self.target = VisemeId::Neutral;
        self.state = SchedulerState::Cancelled;
    }

    /// Returns to `Idle`, the no-utterance rest state. Used after load or
    /// playback failures so the mouth degrades to neutral.
    pub fn clear(&mut self) {
        self.track = None;
        self.target = VisemeId::Neutral;
        self.state = SchedulerState::Idle;
    }

    /// Resolves the target viseme for the sampled clock state.
    ///
    /// The first resolve that observes the matching clock playing promotes
    /// `Armed` to `Active`. Outside `Active`, and for stale-generation
    /// snapshots, the held target is returned unchanged.
    pub fn resolve(&mut self, snapshot: &ClockSnapshot) -> VisemeId {
        if snapshot.generation != self.generation {
            tracing::debug!(
                snapshot = snapshot.generation,
                armed = self.generation,
                "ignoring stale clock snapshot"
            );
            return self.target;
        }

        if self.state == SchedulerState::Armed && snapshot.is_playing {
            tracing::debug!(generation = self.generation, "utterance active");
            self.state = SchedulerState::Active;
        }
        if self.state != SchedulerState::Active {
            return self.target;
        }

        let cue = self
            .track
            .as_ref()
            .and_then(|track| track.cue_at(snapshot.position));
        self.target = cue.map_or(VisemeId::Neutral, |cue| cue.viseme);
        self.target
    }

    /// Feeds a clock lifecycle event into the state machine. Events from a
    /// superseded generation are dropped silently, that race is expected.
    pub fn handle_event(&mut self, event: &ClockEvent) {
        if event.generation != self.generation {
            tracing::debug!(
                event = event.generation,
                armed = self.generation,
                "ignoring stale transport event"
            );
            return;
        }

        match &event.event {
            TransportEvent::Ready => {}
            TransportEvent::Ended => {
                if matches!(self.state, SchedulerState::Armed | SchedulerState::Active) {
                    tracing::debug!(generation = self.generation, "utterance finished");
                    self.target = VisemeId::Neutral;
                    self.state = SchedulerState::Finished;
                }
            }
            TransportEvent::Failed(reason) => {
                tracing::warn!(generation = self.generation, %reason, "audio transport failed");
                self.clear();
            }
        }
    }

    /// Last resolved target. Held across paused or stale frames so the mouth
    /// does not drift while the clock is not advancing.
    pub fn target(&self) -> VisemeId {
        self.target
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }
}
