use serde::{Deserialize, Serialize};

use crate::{LipSyncError, Result};

/// Closed set of mouth shapes understood by the engine.
///
/// The codes follow the cue alphabet emitted by the upstream lip-sync
/// generator (`A`..`H` plus the rest shape `X`); [`VisemeId::morph_channel`]
/// names the avatar blend shape each one drives. Anything outside this set is
/// rejected while the cue track loads, never during rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VisemeId {
    /// Relaxed rest pose, mouth closed. Code `X`.
    #[default]
    Neutral,
    /// Lips pressed together, as in P/B/M. Code `A`.
    Pp,
    /// Teeth slightly parted, as in K/S/T. Code `B`.
    Kk,
    /// Slightly open mouth, as in the vowel of "bit". Code `C`.
    Ih,
    /// Wide open mouth, as in "father". Code `D`.
    Aa,
    /// Rounded open mouth, as in "off". Code `E`.
    Oh,
    /// Puckered lips, as in "you". Code `F`.
    Ou,
    /// Upper teeth on the lower lip, as in F/V. Code `G`.
    Ff,
    /// Tongue behind the teeth, as in L. Code `H`.
    Th,
}

impl VisemeId {
    /// Number of viseme channels, including the rest shape.
    pub const COUNT: usize = 9;

    /// Every viseme in index order.
    pub const ALL: [VisemeId; Self::COUNT] = [
        VisemeId::Neutral,
        VisemeId::Pp,
        VisemeId::Kk,
        VisemeId::Ih,
        VisemeId::Aa,
        VisemeId::Oh,
        VisemeId::Ou,
        VisemeId::Ff,
        VisemeId::Th,
    ];

    /// Parses a cue code as emitted by the generator. Returns `None` for
    /// anything outside the closed set.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "X" => Some(VisemeId::Neutral),
            "A" => Some(VisemeId::Pp),
            "B" => Some(VisemeId::Kk),
            "C" => Some(VisemeId::Ih),
            "D" => Some(VisemeId::Aa),
            "E" => Some(VisemeId::Oh),
            "F" => Some(VisemeId::Ou),
            "G" => Some(VisemeId::Ff),
            "H" => Some(VisemeId::Th),
            _ => None,
        }
    }

    /// The single-letter cue code for this shape.
    pub fn code(self) -> &'static str {
        match self {
            VisemeId::Neutral => "X",
            VisemeId::Pp => "A",
            VisemeId::Kk => "B",
            VisemeId::Ih => "C",
            VisemeId::Aa => "D",
            VisemeId::Oh => "E",
            VisemeId::Ou => "F",
            VisemeId::Ff => "G",
            VisemeId::Th => "H",
        }
    }

    /// Name of the morph-target channel this shape drives on the avatar mesh.
    pub fn morph_channel(self) -> &'static str {
        match self {
            VisemeId::Neutral => "viseme_sil",
            VisemeId::Pp => "viseme_PP",
            VisemeId::Kk => "viseme_kk",
            VisemeId::Ih => "viseme_I",
            VisemeId::Aa => "viseme_AA",
            VisemeId::Oh => "viseme_O",
            VisemeId::Ou => "viseme_U",
            VisemeId::Ff => "viseme_FF",
            VisemeId::Th => "viseme_TH",
        }
    }

    /// Stable index of this shape inside weight vectors and bindings.
    pub fn index(self) -> usize {
        self as usize
    }
}

/// One timed mouth shape: `viseme` is the intended shape over the half-open
/// span `[start, end)`, in seconds from the start of the audio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MouthCue {
    pub start: f32,
    pub end: f32,
    pub viseme: VisemeId,
}

impl MouthCue {
    pub fn new(start: f32, end: f32, viseme: VisemeId) -> Self {
        Self { start, end, viseme }
    }

    /// True when `position` falls inside the half-open `[start, end)` span.
    pub fn contains(&self, position: f32) -> bool {
        position >= self.start && position < self.end
    }
}

/// Immutable, time-ordered sequence of mouth cues for one utterance.
///
/// Construction validates the ordering invariants; gaps between cues are
/// allowed and mean the neutral shape. A new utterance always gets a new
/// track, the old one is never edited in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CueTrack {
    cues: Vec<MouthCue>,
}

impl CueTrack {
    /// Wraps a cue sequence after checking it is sorted, non-overlapping, and
    /// made of well-formed intervals. A sequence that fails any check is
    /// rejected rather than repaired: mis-ordered output points at a bug in
    /// the upstream generator and has to surface. An empty sequence is a
    /// valid, all-neutral track.
    pub fn new(cues: Vec<MouthCue>) -> Result<Self> {
        for (index, cue) in cues.iter().enumerate() {
            if !(cue.start >= 0.0) {
                return Err(LipSyncError::validation(format!(
                    "cue {index} starts at {}, before the audio origin",
                    cue.start
                )));
            }
            if !(cue.start < cue.end) {
                return Err(LipSyncError::validation(format!(
                    "cue {index} has an empty or inverted interval ({}..{})",
                    cue.start, cue.end
                )));
            }
            if index > 0 && cue.start < cues[index - 1].end {
                return Err(LipSyncError::validation(format!(
                    "cue {index} starts at {} before cue {} ends at {}",
                    cue.start,
                    index - 1,
                    cues[index - 1].end
                )));
            }
        }
        Ok(Self { cues })
    }

    /// All cues in time order.
    pub fn cues(&self) -> &[MouthCue] {
        &self.cues
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    /// End of the last cue, or zero for an empty track.
    pub fn duration(&self) -> f32 {
        self.cues.last().map_or(0.0, |cue| cue.end)
    }

    /// Finds the cue whose `[start, end)` span contains `position` by binary
    /// search over the sorted sequence. Positions before the first cue, inside
    /// a gap, or past the last cue resolve to `None` (the neutral shape).
    ///
    /// The half-open rule means a position landing exactly on a shared
    /// boundary of two adjacent cues belongs to the later cue only.
    pub fn cue_at(&self, position: f32) -> Option<&MouthCue> {
        let upper = self.cues.partition_point(|cue| cue.start <= position);
        let cue = &self.cues[upper.checked_sub(1)?];
        cue.contains(position).then_some(cue)
    }
}
