use crate::sequence::Sequence;
use crate::types::DEFAULT_ROWS;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("playlist i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("playlist parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Wire form of one playlist entry. Keys are camelCase to stay compatible
/// with the browser frontend's saved playlists.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SequenceRecord {
    pub levels: Vec<u32>,
    pub step_duration_ms: u64,
}

impl From<&Sequence> for SequenceRecord {
    fn from(seq: &Sequence) -> Self {
        Self {
            levels: seq.levels().to_vec(),
            step_duration_ms: seq.step_duration_ms(),
        }
    }
}

impl SequenceRecord {
    /// Rebuild a sequence on the default grid. Out-of-range levels and
    /// durations are clamped rather than rejected.
    pub fn into_sequence(self) -> Sequence {
        Sequence::from_levels(DEFAULT_ROWS, self.levels, self.step_duration_ms)
    }
}

/// Write the playlist as a JSON array of records.
pub fn save_playlist(path: &Path, playlist: &[Sequence]) -> Result<(), StoreError> {
    let records: Vec<SequenceRecord> = playlist.iter().map(SequenceRecord::from).collect();
    fs::write(path, serde_json::to_string_pretty(&records)?)?;
    info!("saved {} sequences → {:?}", records.len(), path);
    Ok(())
}

/// Read a playlist back. The file must hold a JSON array of
/// `{"levels": [...], "stepDurationMs": n}` objects.
pub fn load_playlist(path: &Path) -> Result<Vec<Sequence>, StoreError> {
    let text = fs::read_to_string(path)?;
    let records: Vec<SequenceRecord> = serde_json::from_str(&text)?;
    info!("loaded {} sequences ← {:?}", records.len(), path);
    Ok(records.into_iter().map(SequenceRecord::into_sequence).collect())
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::PatternMode;

    #[test]
    fn test_record_uses_camel_case_keys() {
        let seq = Sequence::new(4);
        let json = serde_json::to_string(&SequenceRecord::from(&seq)).unwrap();
        assert!(json.contains("\"stepDurationMs\":500"));
        assert!(json.contains("\"levels\":[0,0,0,0]"));
    }

    #[test]
    fn test_round_trip_preserves_playlist() {
        let dir = std::env::temp_dir().join("pulseweave_store_test");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("playlist.json");

        let mut a = Sequence::new(8);
        a.regenerate(PatternMode::Sine, 8, None);
        a.set_step_duration(300);
        let mut b = Sequence::new(12);
        b.regenerate(PatternMode::Brownian, 12, Some(0.5));

        save_playlist(&path, &[a.clone(), b.clone()]).unwrap();
        let loaded = load_playlist(&path).unwrap();

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].levels(), a.levels());
        assert_eq!(loaded[0].step_duration_ms(), 300);
        assert_eq!(loaded[1].levels(), b.levels());

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_load_clamps_hostile_values() {
        let dir = std::env::temp_dir().join("pulseweave_store_test");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("hostile.json");
        fs::write(
            &path,
            r#"[{"levels": [0, 42, 9], "stepDurationMs": 10}]"#,
        )
        .unwrap();

        let loaded = load_playlist(&path).unwrap();
        assert_eq!(loaded[0].levels(), &[0, 9, 9]);
        assert_eq!(loaded[0].step_duration_ms(), 250);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_load_rejects_malformed_json() {
        let dir = std::env::temp_dir().join("pulseweave_store_test");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("broken.json");
        fs::write(&path, "{not json").unwrap();

        assert!(matches!(load_playlist(&path), Err(StoreError::Json(_))));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let path = Path::new("/nonexistent/pulseweave/playlist.json");
        assert!(matches!(load_playlist(path), Err(StoreError::Io(_))));
    }
}
