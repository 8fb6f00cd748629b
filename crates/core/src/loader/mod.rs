use std::path::Path;

use serde::Deserialize;

use crate::{CueTrack, LipSyncError, MouthCue, Result, VisemeId};

/// Wire shape of a cue document as emitted by the upstream generator
/// (Rhubarb's `-f json` output). The metadata block and any other extra
/// fields are ignored.
#[derive(Debug, Deserialize)]
struct CueDocument {
    #[serde(rename = "mouthCues")]
    mouth_cues: Vec<RawCue>,
}

#[derive(Debug, Deserialize)]
struct RawCue {
    start: f32,
    end: f32,
    value: String,
}

/// Decodes and validates a cue document.
///
/// A payload that is not the expected JSON shape fails with
/// [`LipSyncError::Parse`]. A well-formed document with an unknown viseme
/// code, an inverted interval, or unsorted/overlapping cues fails with
/// [`LipSyncError::Validation`]; the input is never re-sorted.
pub fn parse_cue_track(bytes: &[u8]) -> Result<CueTrack> {
    let document: CueDocument = serde_json::from_slice(bytes)?;

    let mut cues = Vec::with_capacity(document.mouth_cues.len());
    for raw in &document.mouth_cues {
        let viseme = VisemeId::from_code(&raw.value).ok_or_else(|| {
            LipSyncError::validation(format!("unknown viseme code `{}`", raw.value))
        })?;
        cues.push(MouthCue::new(raw.start, raw.end, viseme));
    }

    CueTrack::new(cues)
}

/// Fetches and parses cue documents for the engine.
///
/// The loader performs a single attempt per call; a failed fetch surfaces
/// immediately and retry policy stays with the caller.
#[derive(Debug, Clone, Default)]
pub struct CueLoader {
    client: reqwest::Client,
}

impl CueLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a cue document from an HTTP(S) URL or, for anything without a
    /// scheme, from the local filesystem.
    pub async fn load(&self, location: &str) -> Result<CueTrack> {
        if location.starts_with("http://") || location.starts_with("https://") {
            self.fetch(location).await
        } else {
            self.load_file(location)
        }
    }

    /// Fetches a cue document over HTTP and parses it.
    pub async fn fetch(&self, url: &str) -> Result<CueTrack> {
        tracing::debug!(url, "fetching cue track");
        let response = self.client.get(url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        parse_cue_track(&bytes)
    }

    /// Reads and parses a cue document from disk.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<CueTrack> {
        let bytes = std::fs::read(path.as_ref())?;
        parse_cue_track(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RHUBARB_DOCUMENT: &str = r#"{
        "metadata": { "soundFile": "utterance.ogg", "duration": 1.0 },
        "mouthCues": [
            { "start": 0.0, "end": 0.2, "value": "A" },
            { "start": 0.2, "end": 0.5, "value": "B" },
            { "start": 0.7, "end": 1.0, "value": "C" }
        ]
    }"#;

    #[test]
    fn parses_generator_output() {
        let track = parse_cue_track(RHUBARB_DOCUMENT.as_bytes()).unwrap();
        assert_eq!(track.len(), 3);
        assert_eq!(track.duration(), 1.0);
        assert_eq!(track.cues()[1].viseme, VisemeId::Kk);
    }

    #[test]
    fn malformed_payload_is_a_parse_error() {
        let err = parse_cue_track(b"{ \"mouthCues\": 12 }").unwrap_err();
        assert!(matches!(err, LipSyncError::Parse(_)));
    }

    #[test]
    fn unknown_viseme_is_a_validation_error() {
        let doc = r#"{ "mouthCues": [ { "start": 0.0, "end": 0.2, "value": "Q" } ] }"#;
        let err = parse_cue_track(doc.as_bytes()).unwrap_err();
        assert!(matches!(err, LipSyncError::Validation(_)));
    }

    #[test]
    fn unordered_document_is_a_validation_error() {
        let doc = r#"{ "mouthCues": [
            { "start": 0.5, "end": 0.7, "value": "A" },
            { "start": 0.0, "end": 0.2, "value": "B" }
        ] }"#;
        let err = parse_cue_track(doc.as_bytes()).unwrap_err();
        assert!(matches!(err, LipSyncError::Validation(_)));
    }

    #[test]
    fn empty_cue_list_is_valid() {
        let track = parse_cue_track(br#"{ "mouthCues": [] }"#).unwrap();
        assert!(track.is_empty());
    }

    #[tokio::test]
    async fn loads_documents_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cues.json");
        std::fs::write(&path, RHUBARB_DOCUMENT).unwrap();

        let loader = CueLoader::new();
        let track = loader.load(path.to_str().unwrap()).await.unwrap();
        assert_eq!(track.len(), 3);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let loader = CueLoader::new();
        let err = loader.load_file("does-not-exist.json").unwrap_err();
        assert!(matches!(err, LipSyncError::Io(_)));
    }
}
