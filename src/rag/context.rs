//! Chronological context assembly for the analyze pipeline.

use super::CitedFrame;
use crate::vector_store::QueryMatch;

/// Reorder similarity matches into timeline order.
///
/// The generation step wants a temporal narrative, not a relevance
/// ranking, so the store's descending-score order is deliberately
/// discarded here. Records without a timestamp sort as 0. The sort is
/// stable: equal timestamps keep the store's order.
pub fn chronological(mut matches: Vec<QueryMatch>) -> Vec<QueryMatch> {
    matches.sort_by(|a, b| {
        let ta = a.timestamp().unwrap_or(0.0);
        let tb = b.timestamp().unwrap_or(0.0);
        ta.partial_cmp(&tb).unwrap_or(std::cmp::Ordering::Equal)
    });
    matches
}

/// Format one frame's prompt label: `#i [t=<ts>s] id=<frame_id> (<path>)`.
pub fn frame_label(position: usize, frame: &CitedFrame) -> String {
    format!(
        "#{} [t={}s] id={} ({})",
        position, frame.timestamp, frame.frame_id, frame.path
    )
}

/// Format frames as numbered text blocks for a text-only prompt.
pub fn format_frames_for_prompt(frames: &[CitedFrame]) -> String {
    frames
        .iter()
        .enumerate()
        .map(|(i, frame)| format!("{} {}", frame_label(i + 1, frame), frame.description))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn match_at(id: &str, timestamp: Option<f64>, score: f32) -> QueryMatch {
        let mut metadata = serde_json::Map::new();
        metadata.insert("frame_id".to_string(), json!(id));
        metadata.insert("description".to_string(), json!(format!("frame {}", id)));
        metadata.insert("path".to_string(), json!(format!("data/{}.jpg", id)));
        if let Some(ts) = timestamp {
            metadata.insert("timestamp".to_string(), json!(ts));
        }
        QueryMatch {
            id: format!("video-1::{}", id),
            score,
            metadata,
        }
    }

    #[test]
    fn test_chronological_reordering() {
        // Similarity order 5.0, 1.0, 3.0 becomes timeline order 1.0, 3.0, 5.0.
        let matches = vec![
            match_at("a", Some(5.0), 0.9),
            match_at("b", Some(1.0), 0.8),
            match_at("c", Some(3.0), 0.7),
        ];

        let ordered = chronological(matches);
        let timestamps: Vec<f64> = ordered.iter().map(|m| m.timestamp().unwrap()).collect();
        assert_eq!(timestamps, vec![1.0, 3.0, 5.0]);
    }

    #[test]
    fn test_missing_timestamp_sorts_first() {
        let matches = vec![match_at("a", Some(2.0), 0.9), match_at("s", None, 0.8)];
        let ordered = chronological(matches);
        assert_eq!(ordered[0].id, "video-1::s");
        assert_eq!(ordered[1].id, "video-1::a");
    }

    #[test]
    fn test_format_frames_for_prompt() {
        let frames: Vec<CitedFrame> = [match_at("7", Some(4.5), 0.9)]
            .iter()
            .map(CitedFrame::from)
            .collect();

        let text = format_frames_for_prompt(&frames);
        assert_eq!(text, "#1 [t=4.5s] id=7 (data/7.jpg) frame 7");
    }

    #[test]
    fn test_labels_are_one_indexed() {
        let frames: Vec<CitedFrame> = [
            match_at("a", Some(0.0), 0.9),
            match_at("b", Some(1.0), 0.8),
        ]
        .iter()
        .map(CitedFrame::from)
        .collect();

        let text = format_frames_for_prompt(&frames);
        assert!(text.starts_with("#1 "));
        assert!(text.contains("\n#2 "));
    }
}
