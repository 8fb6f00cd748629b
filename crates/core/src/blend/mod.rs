use serde::{Deserialize, Serialize};

use crate::cue::VisemeId;

/// Mixing weights across every viseme channel, each in `[0, 1]`.
///
/// In steady state a single channel dominates; while a transition is in
/// flight the outgoing and incoming channels are both non-zero. No
/// normalization is applied, the mesh does not need the weights to sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WeightVector {
    weights: [f32; VisemeId::COUNT],
}

impl WeightVector {
    /// All channels at zero.
    pub fn zero() -> Self {
        Self::default()
    }

    /// One channel fully on, everything else at zero.
    pub fn one_hot(viseme: VisemeId) -> Self {
        let mut vector = Self::default();
        vector.weights[viseme.index()] = 1.0;
        vector
    }

    pub fn get(&self, viseme: VisemeId) -> f32 {
        self.weights[viseme.index()]
    }

    pub fn set(&mut self, viseme: VisemeId, weight: f32) {
        self.weights[viseme.index()] = weight;
    }

    /// Channel values in viseme index order.
    pub fn iter(&self) -> impl Iterator<Item = (VisemeId, f32)> + '_ {
        VisemeId::ALL
            .into_iter()
            .map(move |viseme| (viseme, self.weights[viseme.index()]))
    }

    /// The heaviest channel and its weight.
    pub fn dominant(&self) -> (VisemeId, f32) {
        let mut best = (VisemeId::Neutral, self.get(VisemeId::Neutral));
        for (viseme, weight) in self.iter() {
            if weight > best.1 {
                best = (viseme, weight);
            }
        }
        best
    }
}

/// Smoothing parameters for the blend controller.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BlendConfig {
    /// Time constant in seconds of the exponential approach toward the target
    /// shape. Smaller is snappier; the default sits under the typical cue
    /// length so consecutive shapes still land distinctly.
    pub time_constant: f32,
}

impl Default for BlendConfig {
    fn default() -> Self {
        Self {
            time_constant: 0.07,
        }
    }
}

/// Converts the instantaneous target viseme into a smoothly varying weight
/// vector, so cue boundaries never pop the mesh between shapes.
///
/// Every channel approaches its one-hot goal exponentially. The approach is
/// continuous and monotonic per channel, and a zero time step leaves the
/// vector untouched.
#[derive(Debug, Clone)]
pub struct BlendController {
    config: BlendConfig,
    weights: WeightVector,
    target: VisemeId,
}

impl Default for BlendController {
    fn default() -> Self {
        Self::new(BlendConfig::default())
    }
}

impl BlendController {
    pub fn new(config: BlendConfig) -> Self {
        Self {
            config,
            weights: WeightVector::one_hot(VisemeId::Neutral),
            target: VisemeId::Neutral,
        }
    }

    /// Moves every channel toward the one-hot `target` shape over `dt`
    /// seconds and returns the updated vector.
    pub fn advance(&mut self, target: VisemeId, dt: f32) -> &WeightVector {
        self.target = target;
        if dt > 0.0 {
            let tau = self.config.time_constant.max(f32::EPSILON);
            let alpha = 1.0 - (-dt / tau).exp();
            for viseme in VisemeId::ALL {
                let goal = if viseme == target { 1.0 } else { 0.0 };
                let current = self.weights.get(viseme);
                let next = current + (goal - current) * alpha;
                self.weights.set(viseme, next.clamp(0.0, 1.0));
            }
        }
        &self.weights
    }

    /// Retargets toward the rest shape. The mouth closes over the following
    /// `advance` calls instead of snapping shut, so a cut-short utterance
    /// does not produce a visible jump.
    pub fn reset(&mut self) {
        self.target = VisemeId::Neutral;
    }

    pub fn weights(&self) -> &WeightVector {
        &self.weights
    }

    pub fn target(&self) -> VisemeId {
        self.target
    }

    /// Whether the vector has effectively reached the one-hot target.
    pub fn is_settled(&self) -> bool {
        const EPSILON: f32 = 1e-3;
        self.weights.iter().all(|(viseme, weight)| {
            let goal = if viseme == self.target { 1.0 } else { 0.0 };
            (weight - goal).abs() < EPSILON
        })
    }
}
