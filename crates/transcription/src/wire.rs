//! Translation of provider wire frames into the internal event taxonomy.
//!
//! The provider speaks JSON text frames tagged with a `type` field. Anything
//! we cannot parse becomes a `BridgeEvent::Error` carrying the raw payload;
//! a bad frame never tears the connection down.

use serde::Deserialize;

use crate::{BridgeEvent, TranscriptSegment, WordInfo};

#[derive(Debug, Deserialize)]
struct ResultsFrame {
    #[serde(default)]
    is_final: bool,
    channel: ResultsChannel,
    #[serde(default)]
    confidence: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ResultsChannel {
    alternatives: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    transcript: String,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    words: Vec<WireWord>,
}

#[derive(Debug, Deserialize)]
struct WireWord {
    word: String,
    start: f64,
    end: f64,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    speaker: Option<u32>,
    #[serde(default)]
    punctuated_word: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UtteranceEndFrame {
    #[serde(default)]
    last_word_end: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct MetadataFrame {
    #[serde(default)]
    request_id: Option<String>,
}

/// Translates one provider text frame.
///
/// Returns `None` for frames that produce no event: empty-after-trim
/// transcripts and uninteresting frame types (`SpeechStarted`).
/// `arrival_ms` is the wall-clock fallback when word timing is absent.
pub fn translate_frame(text: &str, arrival_ms: u64) -> Option<BridgeEvent> {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            return Some(BridgeEvent::Error {
                message: format!("unparseable provider frame: {}", e),
                raw: Some(text.to_string()),
            });
        }
    };

    let frame_type = match value.get("type").and_then(|t| t.as_str()) {
        Some(t) => t.to_string(),
        None => {
            return Some(BridgeEvent::Error {
                message: "provider frame missing type field".to_string(),
                raw: Some(text.to_string()),
            });
        }
    };

    match frame_type.as_str() {
        "Results" => match serde_json::from_value::<ResultsFrame>(value) {
            Ok(frame) => translate_results(frame, arrival_ms).map(BridgeEvent::Result),
            Err(e) => Some(BridgeEvent::Error {
                message: format!("malformed Results frame: {}", e),
                raw: Some(text.to_string()),
            }),
        },
        "UtteranceEnd" => match serde_json::from_value::<UtteranceEndFrame>(value) {
            Ok(frame) => Some(BridgeEvent::UtteranceEnd {
                last_word_end_ms: frame.last_word_end.map(secs_to_ms),
            }),
            Err(e) => Some(BridgeEvent::Error {
                message: format!("malformed UtteranceEnd frame: {}", e),
                raw: Some(text.to_string()),
            }),
        },
        "Metadata" => match serde_json::from_value::<MetadataFrame>(value) {
            Ok(frame) => Some(BridgeEvent::Metadata {
                request_id: frame.request_id,
            }),
            Err(e) => Some(BridgeEvent::Error {
                message: format!("malformed Metadata frame: {}", e),
                raw: Some(text.to_string()),
            }),
        },
        // Boundary notices with no transcript content.
        "SpeechStarted" => None,
        other => Some(BridgeEvent::Warning {
            message: format!("unhandled provider frame type: {}", other),
        }),
    }
}

fn translate_results(frame: ResultsFrame, arrival_ms: u64) -> Option<TranscriptSegment> {
    let alternative = frame.channel.alternatives.into_iter().next()?;

    let text = alternative.transcript.trim().to_string();
    if text.is_empty() {
        return None;
    }

    let words: Vec<WordInfo> = alternative
        .words
        .into_iter()
        .map(|w| WordInfo {
            word: w.punctuated_word.unwrap_or(w.word),
            start_ms: secs_to_ms(w.start),
            end_ms: secs_to_ms(w.end),
            confidence: w.confidence,
            speaker: w.speaker,
        })
        .collect();

    let start_ms = words.first().map(|w| w.start_ms).unwrap_or(arrival_ms);
    let end_ms = words.last().map(|w| w.end_ms).unwrap_or(arrival_ms);
    let speaker_label = dominant_speaker(&words);

    Some(TranscriptSegment {
        start_ms,
        end_ms,
        speaker_label,
        text,
        is_final: frame.is_final,
        confidence: alternative.confidence.or(frame.confidence),
        words: if words.is_empty() { None } else { Some(words) },
    })
}

/// The majority diarization label across a result's words, formatted as
/// `speaker_{n}`. Ties break toward the lowest label index.
pub fn dominant_speaker(words: &[WordInfo]) -> Option<String> {
    let mut counts: std::collections::BTreeMap<u32, usize> = std::collections::BTreeMap::new();
    for word in words {
        if let Some(speaker) = word.speaker {
            *counts.entry(speaker).or_default() += 1;
        }
    }

    let mut best: Option<(u32, usize)> = None;
    for (speaker, count) in counts {
        match best {
            // Strict comparison: a later (higher) label never displaces an
            // equal count, so ties resolve to the lowest label.
            Some((_, best_count)) if count <= best_count => {}
            _ => best = Some((speaker, count)),
        }
    }

    best.map(|(speaker, _)| format!("speaker_{}", speaker))
}

fn secs_to_ms(secs: f64) -> u64 {
    (secs * 1000.0).round().max(0.0) as u64
}
