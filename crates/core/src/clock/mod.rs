use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// Monotonically increasing token identifying one attached audio resource.
/// Async results tagged with an older generation are stale and must be
/// discarded by whoever receives them.
pub type Generation = u64;

/// Lifecycle notification surfaced by an [`AudioTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The resource is buffered and playback has started.
    Ready,
    /// The resource played through to its end.
    Ended,
    /// The backend gave up on the resource.
    Failed(String),
}

/// One playing audio resource as seen by the engine.
///
/// Implementations own whatever machinery their backend needs (decoder state,
/// device callbacks) and surface its lifecycle through the polled event queue.
/// Dropping the transport tears all of that down.
pub trait AudioTransport {
    /// Current playback position in seconds from the start of the resource.
    fn position(&self) -> f32;

    /// Whether the resource is currently advancing.
    fn is_playing(&self) -> bool;

    /// Drains the next pending lifecycle event, if any.
    fn poll_event(&mut self) -> Option<TransportEvent>;
}

/// Transport state sampled once per frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockSnapshot {
    pub position: f32,
    pub is_playing: bool,
    pub generation: Generation,
}

/// A transport lifecycle event tagged with the generation it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockEvent {
    pub generation: Generation,
    pub event: TransportEvent,
}

/// Normalized view over at most one audio resource at a time.
///
/// `attach` tears the previous transport down synchronously before the new
/// one becomes visible, so no two resources are ever live concurrently and a
/// replaced transport can no longer deliver events. Every event and snapshot
/// carries the generation of the transport it came from.
#[derive(Default)]
pub struct PlaybackClock {
    transport: Option<Box<dyn AudioTransport>>,
    generation: Generation,
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the attached resource and returns the new generation.
    pub fn attach(&mut self, transport: Box<dyn AudioTransport>) -> Generation {
        self.detach();
        self.transport = Some(transport);
        self.generation += 1;
        tracing::debug!(generation = self.generation, "audio transport attached");
        self.generation
    }

    /// Drops the attached resource, if any. The generation is not reused.
    pub fn detach(&mut self) {
        if self.transport.take().is_some() {
            tracing::debug!(generation = self.generation, "audio transport detached");
        }
    }

    /// Generation of the most recently attached transport.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Playback position of the attached transport, or zero when detached.
    pub fn position(&self) -> f32 {
        self.transport.as_ref().map_or(0.0, |t| t.position())
    }

    pub fn is_playing(&self) -> bool {
        self.transport.as_ref().is_some_and(|t| t.is_playing())
    }

    /// Samples position, playing state, and generation in one read.
    pub fn snapshot(&self) -> ClockSnapshot {
        ClockSnapshot {
            position: self.position(),
            is_playing: self.is_playing(),
            generation: self.generation,
        }
    }

    /// Drains the next transport event, tagged with the current generation.
    pub fn poll_event(&mut self) -> Option<ClockEvent> {
        let generation = self.generation;
        let event = self.transport.as_mut()?.poll_event()?;
        Some(ClockEvent { generation, event })
    }
}

impl fmt::Debug for PlaybackClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackClock")
            .field("generation", &self.generation)
            .field("attached", &self.transport.is_some())
            .finish()
    }
}

/// Hand-driven transport for tests and offline runs.
///
/// Cloning yields a control handle over the same underlying state, mirroring
/// how a real backend's callback side keeps control after the clock takes
/// ownership of the transport.
#[derive(Debug, Clone, Default)]
pub struct ManualTransport {
    shared: Arc<Mutex<ManualState>>,
}

#[derive(Debug, Default)]
struct ManualState {
    position: f32,
    playing: bool,
    pending: VecDeque<TransportEvent>,
}

impl ManualTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the resource playable and playing, queueing a `Ready` event.
    pub fn play(&self) {
        let mut state = self.lock();
        state.playing = true;
        state.pending.push_back(TransportEvent::Ready);
    }

    pub fn pause(&self) {
        self.lock().playing = false;
    }

    /// Moves the playhead without affecting the playing state.
    pub fn set_position(&self, seconds: f32) {
        self.lock().position = seconds.max(0.0);
    }

    /// Stops playback and queues an `Ended` event.
    pub fn finish(&self) {
        let mut state = self.lock();
        state.playing = false;
        state.pending.push_back(TransportEvent::Ended);
    }

    /// Stops playback and queues a `Failed` event.
    pub fn fail<T: Into<String>>(&self, reason: T) {
        let mut state = self.lock();
        state.playing = false;
        state.pending.push_back(TransportEvent::Failed(reason.into()));
    }

    fn lock(&self) -> MutexGuard<'_, ManualState> {
        self.shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl AudioTransport for ManualTransport {
    fn position(&self) -> f32 {
        self.lock().position
    }

    fn is_playing(&self) -> bool {
        self.lock().playing
    }

    fn poll_event(&mut self) -> Option<TransportEvent> {
        self.lock().pending.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detached_clock_is_silent() {
        let mut clock = PlaybackClock::new();
        assert_eq!(clock.position(), 0.0);
        assert!(!clock.is_playing());
        assert!(clock.poll_event().is_none());
        assert_eq!(clock.generation(), 0);
    }

    #[test]
    fn attach_bumps_the_generation() {
        let mut clock = PlaybackClock::new();
        let first = clock.attach(Box::new(ManualTransport::new()));
        let second = clock.attach(Box::new(ManualTransport::new()));
        assert!(second > first);
        assert_eq!(clock.generation(), second);
    }

    #[test]
    fn snapshot_tracks_the_control_handle() {
        let transport = ManualTransport::new();
        let handle = transport.clone();

        let mut clock = PlaybackClock::new();
        let generation = clock.attach(Box::new(transport));

        handle.play();
        handle.set_position(0.42);

        let snapshot = clock.snapshot();
        assert!(snapshot.is_playing);
        assert_eq!(snapshot.generation, generation);
        assert!((snapshot.position - 0.42).abs() < f32::EPSILON);
    }

    #[test]
    fn events_carry_the_current_generation() {
        let transport = ManualTransport::new();
        let handle = transport.clone();

        let mut clock = PlaybackClock::new();
        let generation = clock.attach(Box::new(transport));
        handle.play();
        handle.finish();

        let ready = clock.poll_event().unwrap();
        assert_eq!(ready.generation, generation);
        assert_eq!(ready.event, TransportEvent::Ready);

        let ended = clock.poll_event().unwrap();
        assert_eq!(ended.event, TransportEvent::Ended);
        assert!(clock.poll_event().is_none());
    }

    #[test]
    fn replaced_transport_cannot_deliver_events() {
        let old = ManualTransport::new();
        let old_handle = old.clone();

        let mut clock = PlaybackClock::new();
        clock.attach(Box::new(old));
        // Queued after replacement; the clock must never see it.
        clock.attach(Box::new(ManualTransport::new()));
        old_handle.finish();

        assert!(clock.poll_event().is_none());
    }
}
