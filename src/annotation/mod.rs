pub mod note;
pub mod overlay;
pub mod playback;

pub use note::{LocalToken, NormalizedPoint, Note, NoteId, PixelPosition};
pub use overlay::{AnnotationOverlay, OverlayEvent, Surface};
pub use playback::{playback_offset, resolve_note_playback, AudioDeck, PlaybackError, PlaybackTarget};
