use super::note::Note;
use crate::api::transcription::Transcript;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PlaybackError {
    #[error("Transcript not found for this note")]
    NoTranscript,
    #[error("Transcript {0} has no audio")]
    NoAudio(String),
}

impl Serialize for PlaybackError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Seconds between transcript start and note creation, never negative and
/// never past the end of the audio once its duration is known.
pub fn playback_offset(
    note_created: Option<DateTime<Utc>>,
    transcript_created: Option<DateTime<Utc>>,
    duration: Option<f64>,
) -> f64 {
    let offset = match (note_created, transcript_created) {
        (Some(note), Some(start)) => {
            let millis = note.signed_duration_since(start).num_milliseconds();
            (millis as f64 / 1000.0).max(0.0)
        }
        _ => 0.0,
    };
    clamp_to_duration(offset, duration)
}

fn clamp_to_duration(seconds: f64, duration: Option<f64>) -> f64 {
    let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
    match duration {
        Some(d) if d.is_finite() && d >= 0.0 => seconds.min(d),
        _ => seconds,
    }
}

/// What the audio deck should do to play a note.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackTarget {
    pub transcript_id: String,
    pub audio_url: String,
    pub offset: f64,
}

pub fn resolve_note_playback(
    note: &Note,
    transcripts: &[Transcript],
) -> Result<PlaybackTarget, PlaybackError> {
    let transcript_id = note
        .transcript_id
        .as_deref()
        .ok_or(PlaybackError::NoTranscript)?;
    let transcript = transcripts
        .iter()
        .find(|t| t.id == transcript_id)
        .ok_or(PlaybackError::NoTranscript)?;
    let audio_url = transcript
        .audio_url
        .clone()
        .ok_or_else(|| PlaybackError::NoAudio(transcript.id.clone()))?;
    Ok(PlaybackTarget {
        transcript_id: transcript.id.clone(),
        audio_url,
        offset: playback_offset(note.created_at, transcript.created_at, None),
    })
}

/// Model of the page's audio element.
///
/// Seeks requested before metadata is loaded are parked in `pending_seek`
/// and applied, clamped to the duration, by [`AudioDeck::on_metadata`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AudioDeck {
    pub url: Option<String>,
    pub duration: Option<f64>,
    pub position: f64,
    pub playing: bool,
    pub pending_seek: Option<f64>,
    pub selected: Option<String>,
}

impl AudioDeck {
    pub fn select(&mut self, transcript: &Transcript) {
        self.selected = Some(transcript.id.clone());
        self.load(transcript.audio_url.clone());
    }

    /// Swap the source. Loading the current url again keeps position and metadata.
    pub fn load(&mut self, url: Option<String>) {
        if self.url == url {
            return;
        }
        self.url = url;
        self.duration = None;
        self.position = 0.0;
        self.playing = false;
        self.pending_seek = None;
    }

    pub fn on_metadata(&mut self, duration: f64) {
        self.duration = Some(duration);
        if let Some(target) = self.pending_seek.take() {
            self.position = clamp_to_duration(target, self.duration);
        }
    }

    pub fn seek_and_play(&mut self, seconds: f64) {
        if self.url.is_none() {
            return;
        }
        match self.duration {
            Some(_) => self.position = clamp_to_duration(seconds, self.duration),
            None => self.pending_seek = Some(clamp_to_duration(seconds, None)),
        }
        self.playing = true;
    }

    pub fn on_time_update(&mut self, position: f64) {
        self.position = clamp_to_duration(position, self.duration);
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    pub fn play_target(&mut self, target: &PlaybackTarget) {
        self.selected = Some(target.transcript_id.clone());
        self.load(Some(target.audio_url.clone()));
        self.seek_and_play(target.offset);
    }
}
