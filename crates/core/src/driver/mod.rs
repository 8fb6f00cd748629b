use crate::blend::{BlendController, WeightVector};
use crate::clock::PlaybackClock;
use crate::cue::VisemeId;
use crate::error::{LipSyncError, Result};
use crate::sched::VisemeScheduler;

/// Mesh surface the engine writes morph weights into.
///
/// The mesh exposes named blend-shape channels; the channel set must be a
/// superset of the viseme channel names. Names are resolved to indices once
/// at bind time and only indices are used from then on.
pub trait MorphTargetMesh {
    /// Index of the named channel, or `None` when the mesh does not have it.
    fn channel_index(&self, name: &str) -> Option<usize>;

    /// Writes one channel's scalar weight.
    fn set_morph_weight(&mut self, index: usize, weight: f32);
}

/// Viseme-to-channel mapping resolved against one mesh.
#[derive(Debug, Clone)]
pub struct MorphBinding {
    channels: [usize; VisemeId::COUNT],
}

impl MorphBinding {
    /// Resolves every viseme channel by name. A mesh missing a channel fails
    /// here, never during the frame loop.
    pub fn bind<M: MorphTargetMesh>(mesh: &M) -> Result<Self> {
        let mut channels = [0_usize; VisemeId::COUNT];
        for viseme in VisemeId::ALL {
            let name = viseme.morph_channel();
            channels[viseme.index()] = mesh.channel_index(name).ok_or_else(|| {
                LipSyncError::validation(format!("mesh has no morph channel `{name}`"))
            })?;
        }
        Ok(Self { channels })
    }

    /// Writes the weight vector into the bound channels. Channels outside the
    /// binding are left untouched.
    pub fn apply<M: MorphTargetMesh>(&self, mesh: &mut M, weights: &WeightVector) {
        for (viseme, weight) in weights.iter() {
            mesh.set_morph_weight(self.channels[viseme.index()], weight);
        }
    }
}

/// Per-frame coordinator: clock → scheduler → blend → mesh.
///
/// The driver owns only the channel binding; clock, scheduler, and blend
/// state are borrowed for the duration of a tick. Each tick resolves at most
/// one target and performs no allocation.
#[derive(Debug, Clone)]
pub struct RenderDriver {
    binding: MorphBinding,
}

impl RenderDriver {
    pub fn new(binding: MorphBinding) -> Self {
        Self { binding }
    }

    /// Advances one rendered frame by `dt` seconds.
    ///
    /// Pending transport events are drained into the scheduler first. A fresh
    /// target is resolved only while the clock is playing; while paused,
    /// stopped, or detached the previously resolved target is held so wall
    /// time passing cannot drift the mouth.
    pub fn tick<M: MorphTargetMesh>(
        &self,
        dt: f32,
        clock: &mut PlaybackClock,
        scheduler: &mut VisemeScheduler,
        blend: &mut BlendController,
        mesh: &mut M,
    ) {
        while let Some(event) = clock.poll_event() {
            scheduler.handle_event(&event);
        }

        let target = if clock.is_playing() {
            scheduler.resolve(&clock.snapshot())
        } else {
            scheduler.target()
        };

        let weights = blend.advance(target, dt);
        self.binding.apply(mesh, weights);
    }
}
