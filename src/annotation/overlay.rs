use super::note::{clamp_unit, LocalToken, NormalizedPoint, Note, NoteId, PixelPosition};
use crate::api::notes::ServerNote;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Client-space rectangle of the rendered page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Surface {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Surface {
    /// Size of a page rendered at `max_width / page_width`.
    pub fn fit_page(page_width: f64, page_height: f64, max_width: f64) -> Self {
        let scale = crate::slides::fit_scale(page_width, max_width);
        Self {
            left: 0.0,
            top: 0.0,
            width: page_width * scale,
            height: page_height * scale,
        }
    }

    pub fn at(mut self, left: f64, top: f64) -> Self {
        self.left = left;
        self.top = top;
        self
    }

    pub fn normalize(&self, client_x: f64, client_y: f64) -> NormalizedPoint {
        NormalizedPoint::clamped(
            (client_x - self.left) / self.width,
            (client_y - self.top) / self.height,
        )
    }

    pub fn pixel_offset(&self, client_x: f64, client_y: f64) -> PixelPosition {
        PixelPosition {
            x: (client_x - self.left).round() as i64,
            y: (client_y - self.top).round() as i64,
        }
    }

    /// Stored coordinates above 1 are pixel offsets from older records.
    pub fn normalize_stored(&self, x: f64, y: f64) -> NormalizedPoint {
        let x = if x > 1.0 { x / self.width } else { x };
        let y = if y > 1.0 { y / self.height } else { y };
        NormalizedPoint::clamped(x, y)
    }
}

/// What the overlay asks its persistence collaborator to do.
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayEvent {
    Created { note: Note, pixel: PixelPosition },
    Updated(Note),
    Deleted(NoteId),
}

/// Note pins on top of one rendered slide.
///
/// Pointer handlers mirror the DOM events of the page: double-click creates,
/// pointer-down on a pin starts a drag, moves update the dragged pin, and a
/// pointer-up without movement is a click that opens the edit popup.
#[derive(Debug, Default)]
pub struct AnnotationOverlay {
    page: u32,
    surface: Option<Surface>,
    notes: Vec<Note>,
    active: Option<NoteId>,
    dragging: Option<NoteId>,
    has_dragged: bool,
    applied: HashSet<LocalToken>,
}

impl AnnotationOverlay {
    pub fn new(page: u32) -> Self {
        Self {
            page: page.max(1),
            ..Self::default()
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn set_page(&mut self, page: u32) {
        let page = page.max(1);
        if page != self.page {
            self.page = page;
            self.dragging = None;
            self.has_dragged = false;
        }
    }

    pub fn surface(&self) -> Option<Surface> {
        self.surface
    }

    pub fn set_surface(&mut self, surface: Surface) {
        self.surface = Some(surface);
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn note(&self, id: &NoteId) -> Option<&Note> {
        self.notes.iter().find(|n| &n.id == id)
    }

    /// Pins to draw on the displayed page.
    pub fn visible_pins(&self) -> impl Iterator<Item = &Note> {
        let page = self.page;
        self.notes.iter().filter(move |n| n.page == page)
    }

    pub fn active_note(&self) -> Option<&Note> {
        self.active.as_ref().and_then(|id| self.note(id))
    }

    pub fn dragging(&self) -> Option<&NoteId> {
        self.dragging.as_ref()
    }

    /// Seed from the backend. Ignored once local notes exist or before the
    /// surface is known, so user edits are never overwritten.
    pub fn load_initial(&mut self, server_notes: &[ServerNote], now: DateTime<Utc>) -> bool {
        let Some(surface) = self.surface else {
            return false;
        };
        if server_notes.is_empty() || !self.notes.is_empty() {
            return false;
        }
        self.notes = server_notes
            .iter()
            .map(|raw| {
                let pos = raw.position();
                let point = surface.normalize_stored(pos.x, pos.y);
                Note {
                    id: match raw.id() {
                        Some(id) => NoteId::Persisted(id),
                        None => NoteId::Pending(LocalToken::next(now)),
                    },
                    page: raw.page(),
                    x: point.x,
                    y: point.y,
                    content: raw.content(),
                    audio_time: raw.audio_time(),
                    created_at: raw.created_at(),
                    transcript_id: raw.transcript_id(),
                }
            })
            .collect();
        log::debug!("Loaded {} notes onto the overlay", self.notes.len());
        true
    }

    pub fn double_click(
        &mut self,
        client_x: f64,
        client_y: f64,
        now: DateTime<Utc>,
        transcript_id: Option<String>,
    ) -> Option<OverlayEvent> {
        if self.dragging.is_some() {
            return None;
        }
        let surface = self.surface?;
        let point = surface.normalize(client_x, client_y);
        let note = Note {
            id: NoteId::Pending(LocalToken::next(now)),
            page: self.page,
            x: point.x,
            y: point.y,
            content: String::new(),
            audio_time: None,
            created_at: Some(now),
            transcript_id,
        };
        self.notes.push(note.clone());
        self.active = Some(note.id.clone());
        Some(OverlayEvent::Created {
            note,
            pixel: surface.pixel_offset(client_x, client_y),
        })
    }

    /// Pointer-down on a pin. Never creates a note.
    pub fn pointer_down_on_pin(&mut self, id: &NoteId) -> bool {
        if self.note(id).is_none() {
            return false;
        }
        self.dragging = Some(id.clone());
        self.has_dragged = false;
        true
    }

    pub fn pointer_move(&mut self, client_x: f64, client_y: f64) -> bool {
        let (Some(id), Some(surface)) = (self.dragging.clone(), self.surface) else {
            return false;
        };
        self.has_dragged = true;
        let point = surface.normalize(client_x, client_y);
        match self.notes.iter_mut().find(|n| n.id == id) {
            Some(note) => {
                note.move_to(point);
                true
            }
            None => false,
        }
    }

    /// Ends a drag. Returns the note whose popup opened when it was a click.
    pub fn pointer_up(&mut self) -> Option<NoteId> {
        let id = self.dragging.take()?;
        let clicked = !self.has_dragged;
        self.has_dragged = false;
        if clicked {
            self.active = Some(id.clone());
            Some(id)
        } else {
            None
        }
    }

    pub fn open_popup(&mut self, id: &NoteId) -> bool {
        if self.note(id).is_none() {
            return false;
        }
        self.active = Some(id.clone());
        true
    }

    pub fn close_popup(&mut self) {
        self.active = None;
    }

    /// Content edits save immediately.
    pub fn edit_content(&mut self, id: &NoteId, content: &str) -> Option<OverlayEvent> {
        let note = self.notes.iter_mut().find(|n| &n.id == id)?;
        if note.content == content {
            return None;
        }
        note.content = content.to_string();
        Some(OverlayEvent::Updated(note.clone()))
    }

    pub fn delete(&mut self, id: &NoteId) -> Option<OverlayEvent> {
        let idx = self.notes.iter().position(|n| &n.id == id)?;
        let removed = self.notes.remove(idx);
        self.active = None;
        if self.dragging.as_ref() == Some(id) {
            self.dragging = None;
            self.has_dragged = false;
        }
        Some(OverlayEvent::Deleted(removed.id))
    }

    /// Swap pending ids for server ids. Each local token is applied at most once.
    pub fn apply_assignments(&mut self, assignments: &HashMap<LocalToken, String>) -> usize {
        let mut changed = 0;
        for note in &mut self.notes {
            let Some(token) = note.id.local_token() else {
                continue;
            };
            let Some(server_id) = assignments.get(&token) else {
                continue;
            };
            if !self.applied.insert(token) {
                continue;
            }
            let old = std::mem::replace(&mut note.id, NoteId::Persisted(server_id.clone()));
            for slot in [&mut self.active, &mut self.dragging] {
                if slot.as_ref() == Some(&old) {
                    *slot = Some(note.id.clone());
                }
            }
            changed += 1;
        }
        changed
    }

    /// Sidebar jump: show the note's page and open its popup. Returns the
    /// vertical scroll target for a container of `scroll_height` pixels.
    pub fn jump_to(&mut self, id: &NoteId, scroll_height: f64) -> Option<f64> {
        let note = self.note(id)?;
        let (page, y) = (note.page, note.y);
        self.set_page(page);
        self.active = Some(id.clone());
        Some((clamp_unit(y) * scroll_height - 200.0).max(0.0))
    }
}
