//! Terminal stand-in for the avatar mesh.

use std::io::Write;

use lipsync_core::{MorphTargetMesh, VisemeId};

/// Renders morph weights as a one-line bar display.
///
/// The channel names mirror the avatar's blend shapes, so the engine's
/// name-to-index binding is exercised exactly as it would be against a real
/// mesh.
pub struct TerminalMesh {
    names: Vec<&'static str>,
    weights: Vec<f32>,
}

impl TerminalMesh {
    pub fn new() -> Self {
        let names: Vec<&'static str> = VisemeId::ALL.iter().map(|v| v.morph_channel()).collect();
        let weights = vec![0.0; names.len()];
        Self { names, weights }
    }

    /// Redraws the current weights in place on one status line.
    pub fn draw(&self) {
        let mut dominant = 0;
        for (index, weight) in self.weights.iter().enumerate() {
            if *weight > self.weights[dominant] {
                dominant = index;
            }
        }

        let bars: String = self.weights.iter().map(|w| bar_glyph(*w)).collect();
        print!("\r[{bars}] {:<12}", self.names[dominant]);
        let _ = std::io::stdout().flush();
    }
}

impl MorphTargetMesh for TerminalMesh {
    fn channel_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|candidate| *candidate == name)
    }

    fn set_morph_weight(&mut self, index: usize, weight: f32) {
        if let Some(slot) = self.weights.get_mut(index) {
            *slot = weight;
        }
    }
}

fn bar_glyph(weight: f32) -> char {
    match weight {
        w if w < 0.05 => ' ',
        w if w < 0.25 => '.',
        w if w < 0.5 => ':',
        w if w < 0.75 => '+',
        _ => '#',
    }
}
