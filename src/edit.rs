// model = "claude-opus-4-5"
// created = "2026-02-02"
// modified = "2026-02-04"
// driver = "Isaac Clayton"

//! The records that flow between the buffer and its collaborators.
//!
//! An `EditNotification` is the authoritative snapshot the buffer fans
//! out; an `EditResponse` is the batch of commands a collaborator hands
//! back. Every stream in the notification is an immutable CRDT, so the
//! snapshot is a handful of pointer copies, and folding a response into
//! a notification is a pure function.

use crate::crdt::attr::AttrCommand;
use crate::crdt::attr::AttrMap;
use crate::crdt::attr::Cursor;
use crate::crdt::attr::Diagnostic;
use crate::crdt::attr::DiagnosticRange;
use crate::crdt::attr::Fixit;
use crate::crdt::attr::GutterNote;
use crate::crdt::attr::ReferencedFile;
use crate::crdt::attr::SideBuffer;
use crate::crdt::attr::SideBufferRef;
use crate::crdt::attr::TokenTypes;
use crate::crdt::integrate_all;
use crate::crdt::woot;
use crate::crdt::woot::Token;
use crate::crdt::woot::Woot;
use crate::crdt::CommandBuf;

/// The authoritative document snapshot delivered to collaborators.
#[derive(Clone)]
pub struct EditNotification {
    /// The character content.
    pub content: Woot,
    /// Token-class annotations from the highlighter.
    pub token_types: TokenTypes,
    /// Diagnostics, keyed by their own minted IDs.
    pub diagnostics: AttrMap<Diagnostic>,
    /// Character spans the diagnostics cover.
    pub diagnostic_ranges: AttrMap<DiagnosticRange>,
    /// Auxiliary read-only documents.
    pub side_buffers: AttrMap<SideBuffer>,
    /// Links from characters into side buffers.
    pub side_buffer_refs: AttrMap<SideBufferRef>,
    /// Suggested edits.
    pub fixits: AttrMap<Fixit>,
    /// Files this document depends on.
    pub referenced_files: AttrMap<ReferencedFile>,
    /// Margin annotations.
    pub gutter_notes: AttrMap<GutterNote>,
    /// Collaborator carets.
    pub cursors: AttrMap<Cursor>,
    /// True once the initial load has finished.
    pub fully_loaded: bool,
    /// True once the buffer has begun quiescing.
    pub shutdown: bool,
    /// Bumped whenever a referenced file changes on disk.
    pub referenced_file_version: u64,
}

impl EditNotification {
    /// An empty, not-yet-loaded document.
    pub fn new() -> EditNotification {
        return EditNotification {
            content: Woot::new(),
            token_types: TokenTypes::new(),
            diagnostics: AttrMap::new(),
            diagnostic_ranges: AttrMap::new(),
            side_buffers: AttrMap::new(),
            side_buffer_refs: AttrMap::new(),
            fixits: AttrMap::new(),
            referenced_files: AttrMap::new(),
            gutter_notes: AttrMap::new(),
            cursors: AttrMap::new(),
            fully_loaded: false,
            shutdown: false,
            referenced_file_version: 0,
        };
    }
}

impl Default for EditNotification {
    fn default() -> Self {
        return Self::new();
    }
}

/// One collaborator's output for one notification cycle.
#[derive(Clone, Debug, Default)]
pub struct EditResponse {
    /// Content commands.
    pub content: CommandBuf<woot::Command>,
    /// Token-class writes.
    pub token_types: CommandBuf<AttrCommand<Token>>,
    /// Diagnostic writes.
    pub diagnostics: CommandBuf<AttrCommand<Diagnostic>>,
    /// Diagnostic-span writes.
    pub diagnostic_ranges: CommandBuf<AttrCommand<DiagnosticRange>>,
    /// Side-buffer writes.
    pub side_buffers: CommandBuf<AttrCommand<SideBuffer>>,
    /// Side-buffer-link writes.
    pub side_buffer_refs: CommandBuf<AttrCommand<SideBufferRef>>,
    /// Fixit writes.
    pub fixits: CommandBuf<AttrCommand<Fixit>>,
    /// Referenced-file writes.
    pub referenced_files: CommandBuf<AttrCommand<ReferencedFile>>,
    /// Gutter-note writes.
    pub gutter_notes: CommandBuf<AttrCommand<GutterNote>>,
    /// Caret writes.
    pub cursors: CommandBuf<AttrCommand<Cursor>>,
    /// The collaborator is finished and its worker should exit.
    pub done: bool,
    /// This response reflects direct user activity.
    pub become_used: bool,
    /// The initial load has finished.
    pub become_loaded: bool,
    /// A referenced file changed on disk.
    pub referenced_file_changed: bool,
}

impl EditResponse {
    /// An empty response carrying no commands and no signals.
    pub fn new() -> EditResponse {
        return EditResponse::default();
    }

    /// True if integrating this response would change the state. Only
    /// update-bearing responses advance the buffer's version; `done`
    /// and `become_used` on their own do not.
    pub fn has_updates(&self) -> bool {
        return self.become_loaded
            || self.referenced_file_changed
            || !self.content.is_empty()
            || !self.token_types.is_empty()
            || !self.diagnostics.is_empty()
            || !self.diagnostic_ranges.is_empty()
            || !self.side_buffers.is_empty()
            || !self.side_buffer_refs.is_empty()
            || !self.fixits.is_empty()
            || !self.referenced_files.is_empty()
            || !self.gutter_notes.is_empty()
            || !self.cursors.is_empty();
    }
}

/// Fold a response into a notification, stream by stream.
pub fn integrate_response(response: &EditResponse, state: &mut EditNotification) {
    integrate_all(&mut state.content, &response.content);
    integrate_all(&mut state.token_types, &response.token_types);
    integrate_all(&mut state.diagnostics, &response.diagnostics);
    integrate_all(&mut state.diagnostic_ranges, &response.diagnostic_ranges);
    integrate_all(&mut state.side_buffers, &response.side_buffers);
    integrate_all(&mut state.side_buffer_refs, &response.side_buffer_refs);
    integrate_all(&mut state.fixits, &response.fixits);
    integrate_all(&mut state.referenced_files, &response.referenced_files);
    integrate_all(&mut state.gutter_notes, &response.gutter_notes);
    integrate_all(&mut state.cursors, &response.cursors);
    if response.become_loaded {
        state.fully_loaded = true;
    }
    if response.referenced_file_changed {
        state.referenced_file_version += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::Id;
    use crate::site::Site;

    #[test]
    fn fresh_response_is_empty() {
        let response = EditResponse::new();
        assert!(!response.has_updates());
    }

    #[test]
    fn flags_alone_do_not_count_as_updates() {
        let mut response = EditResponse::new();
        response.done = true;
        response.become_used = true;
        assert!(!response.has_updates());
    }

    #[test]
    fn loaded_and_file_changes_count_as_updates() {
        let mut response = EditResponse::new();
        response.become_loaded = true;
        assert!(response.has_updates());

        let mut response = EditResponse::new();
        response.referenced_file_changed = true;
        assert!(response.has_updates());
    }

    #[test]
    fn commands_count_as_updates() {
        let site = Site::new();
        let state = EditNotification::new();
        let mut response = EditResponse::new();
        response.content.push(state.content.make_insert(&site, b'x', Id::BEGIN));
        assert!(response.has_updates());
    }

    #[test]
    fn integrate_folds_every_stream() {
        let site = Site::new();
        let mut state = EditNotification::new();

        let mut response = EditResponse::new();
        let insert = state.content.make_insert(&site, b'x', Id::BEGIN);
        let chr = insert.id();
        response.content.push(insert);
        response.token_types.push(TokenTypes::make_set(&site, chr, Token::Keyword));
        response.cursors.push(AttrMap::make_set(&site, chr, Cursor { at: chr }));
        response.become_loaded = true;
        response.referenced_file_changed = true;

        integrate_response(&response, &mut state);

        assert_eq!(state.content.render(), "x");
        assert_eq!(state.token_types.get(chr), Some(&Token::Keyword));
        assert_eq!(state.cursors.get(chr), Some(&Cursor { at: chr }));
        assert!(state.fully_loaded);
        assert_eq!(state.referenced_file_version, 1);
    }

    #[test]
    fn notification_clone_is_a_snapshot() {
        let site = Site::new();
        let mut state = EditNotification::new();
        let mut response = EditResponse::new();
        response.content.push(state.content.make_insert(&site, b'a', Id::BEGIN));
        integrate_response(&response, &mut state);

        let snapshot = state.clone();
        let mut cursor = state.content.visible(Id::BEGIN);
        cursor.move_next();
        let mut response = EditResponse::new();
        response.content.push(state.content.make_remove(cursor.id()));
        integrate_response(&response, &mut state);

        assert_eq!(snapshot.content.render(), "a");
        assert_eq!(state.content.render(), "");
    }
}
