// model = "claude-opus-4-5"
// created = "2026-02-02"
// modified = "2026-02-04"
// driver = "Isaac Clayton"

//! A character-level convergent string (WOOT family).
//!
//! This is the content CRDT under the buffer. Key design decisions:
//!
//! 1. **Character granularity**: every glyph is its own record with a
//!    stable `Id`. Concurrent edits never shift each other's targets.
//!
//! 2. **Tombstones**: removal flips `visible` and keeps the record, so
//!    concurrent operations that reference the character still resolve.
//!    Tombstoning is monotonic; nothing ever becomes visible again.
//!
//! 3. **Creator-stated neighbors**: each insert remembers which two
//!    characters it was minted between. When two sites insert into the
//!    same gap concurrently, integration narrows the gap by filtering to
//!    characters whose own stated neighbors are still inside it, then
//!    tie-breaks on `Id` order. Every replica narrows identically, so
//!    every replica renders identically.
//!
//! 4. **Persistent substrate**: the record map is an immutable AVL, so
//!    integration is a pure `Woot -> Woot` function and snapshots cost
//!    one pointer copy.

use std::collections::HashSet;

use crate::crdt::avl::Avl;
use crate::crdt::Integrate;
use crate::site::Id;
use crate::site::Site;

/// Token class of a character, written by highlighters. Last writer wins.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Token {
    /// No classification yet.
    #[default]
    Unset,
    /// An identifier.
    Ident,
    /// A language keyword.
    Keyword,
    /// Punctuation or an operator.
    Symbol,
    /// A numeric or string literal.
    Literal,
    /// A comment.
    Comment,
}

/// Everything known about one character.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CharInfo {
    /// False marks a tombstone: removed, but kept for identity.
    pub visible: bool,
    /// The glyph. The document is a byte stream at this layer.
    pub chr: u8,
    /// Last-writer-wins token class.
    pub token_type: Token,
    /// Next record in document order.
    pub next: Id,
    /// Previous record in document order.
    pub prev: Id,
    /// The neighbor this character was stated to follow.
    pub after: Id,
    /// The neighbor this character was stated to precede.
    pub before: Id,
}

/// A reified integration step for the content stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Place a fresh character between two existing ones.
    Insert {
        /// The minted identity of the new character.
        id: Id,
        /// The glyph.
        chr: u8,
        /// Stated left neighbor.
        after: Id,
        /// Stated right neighbor.
        before: Id,
    },
    /// Tombstone a character.
    Remove {
        /// The character to remove.
        id: Id,
    },
    /// Overwrite a visible character's token class.
    SetTokenType {
        /// The character to annotate.
        id: Id,
        /// The new class.
        token: Token,
    },
}

impl Command {
    /// The ID this command mints or targets.
    pub fn id(&self) -> Id {
        return match self {
            Command::Insert { id, .. } => *id,
            Command::Remove { id } => *id,
            Command::SetTokenType { id, .. } => *id,
        };
    }
}

/// Links threading one visible line break into the line list.
#[derive(Clone, Debug, PartialEq, Eq)]
struct LineLink {
    prev: Id,
    next: Id,
}

/// A convergent string of characters.
///
/// Values are immutable: integration returns a new `Woot` sharing
/// structure with its parent. Two replicas that integrate the same set
/// of commands render byte-identically, whatever the delivery order.
#[derive(Clone)]
pub struct Woot {
    chars: Avl<Id, CharInfo>,
    lines: Avl<Id, LineLink>,
}

impl Woot {
    /// Create an empty document holding only the two sentinels.
    pub fn new() -> Woot {
        let chars = Avl::new()
            .add(
                Id::BEGIN,
                CharInfo {
                    visible: false,
                    chr: 0,
                    token_type: Token::Unset,
                    next: Id::END,
                    prev: Id::END,
                    after: Id::END,
                    before: Id::END,
                },
            )
            .add(
                Id::END,
                CharInfo {
                    visible: false,
                    chr: 0,
                    token_type: Token::Unset,
                    next: Id::BEGIN,
                    prev: Id::BEGIN,
                    after: Id::BEGIN,
                    before: Id::BEGIN,
                },
            );
        let lines = Avl::new()
            .add(Id::BEGIN, LineLink { prev: Id::BEGIN, next: Id::END })
            .add(Id::END, LineLink { prev: Id::BEGIN, next: Id::END });
        return Woot { chars, lines };
    }

    /// True if this document has a record for the ID.
    pub fn has(&self, id: Id) -> bool {
        return self.chars.lookup(&id).is_some();
    }

    /// Look up a character record.
    pub fn lookup(&self, id: Id) -> Option<&CharInfo> {
        return self.chars.lookup(&id);
    }

    /// True if both handles share the same underlying state.
    pub fn same_identity(&self, other: &Woot) -> bool {
        return self.chars.same_identity(&other.chars);
    }

    fn must(&self, id: Id) -> &CharInfo {
        return self
            .chars
            .lookup(&id)
            .unwrap_or_else(|| panic!("integration references unknown id {:?}", id));
    }

    /// Mint an insert of `chr` directly after `after`, using the
    /// document's current successor as the right neighbor.
    pub fn make_insert(&self, site: &Site, chr: u8, after: Id) -> Command {
        return Self::make_raw_insert(site, chr, after, self.must(after).next);
    }

    /// Mint an insert of `chr` between two stated neighbors.
    pub fn make_raw_insert(site: &Site, chr: u8, after: Id, before: Id) -> Command {
        return Command::Insert { id: site.generate_id(), chr, after, before };
    }

    /// Mint a removal of `id`.
    pub fn make_remove(&self, id: Id) -> Command {
        return Command::Remove { id };
    }

    /// Mint a token-class update for `id`.
    pub fn make_set_token_type(&self, id: Id, token: Token) -> Command {
        return Command::SetTokenType { id, token };
    }

    /// Emit the visible characters, BEGIN to END.
    pub fn render(&self) -> String {
        let mut out = Vec::new();
        let mut cur = self.must(Id::BEGIN).next;
        while cur != Id::END {
            let info = self.must(cur);
            if info.visible {
                out.push(info.chr);
            }
            cur = info.next;
        }
        return String::from_utf8(out).unwrap_or_default();
    }

    fn integrate_insert(&self, id: Id, chr: u8, after: Id, before: Id) -> Woot {
        // Redelivered commands must not re-insert.
        if self.has(id) {
            return self.clone();
        }

        // Narrow the bracket until it is pristine, then splice. Each
        // pass strictly shrinks the contested region, so this
        // terminates; the narrowing depends only on ids and stated
        // neighbors, so every replica narrows the same way.
        let mut after = after;
        let mut before = before;
        loop {
            let caft = self.must(after);
            self.must(before);
            if caft.next == before {
                return self.splice(id, chr, after, before);
            }

            // Walk the current records between the two neighbors.
            let mut walk: Vec<Id> = vec![after];
            let mut cur = caft.next;
            while cur != before {
                walk.push(cur);
                cur = self.must(cur).next;
            }
            walk.push(before);

            // Keep only characters whose stated neighbors both lie in
            // the contested region; endpoints always survive.
            let region: HashSet<Id> = walk.iter().copied().collect();
            let mut filtered: Vec<Id> = vec![after];
            for &cand in &walk[1..walk.len() - 1] {
                let info = self.must(cand);
                if region.contains(&info.after) && region.contains(&info.before) {
                    filtered.push(cand);
                }
            }
            filtered.push(before);

            // Our character goes before the first survivor with a
            // larger id.
            let mut i = 1;
            while i < filtered.len() - 1 && filtered[i] < id {
                i += 1;
            }
            after = filtered[i - 1];
            before = filtered[i];
        }
    }

    /// Splice a fresh character into a pristine bracket.
    fn splice(&self, id: Id, chr: u8, after: Id, before: Id) -> Woot {
        let mut caft = self.must(after).clone();
        let mut cbef = self.must(before).clone();
        caft.next = id;
        cbef.prev = id;
        let info = CharInfo {
            visible: true,
            chr,
            token_type: Token::Unset,
            next: before,
            prev: after,
            after,
            before,
        };
        let chars = self.chars.add(after, caft).add(id, info).add(before, cbef);
        let lines = if chr == b'\n' {
            self.link_line(id, after)
        } else {
            self.lines.clone()
        };
        return Woot { chars, lines };
    }

    fn integrate_remove(&self, id: Id) -> Woot {
        let info = self.must(id);
        if !info.visible {
            return self.clone();
        }
        let mut tombstone = info.clone();
        tombstone.visible = false;
        let lines = if info.chr == b'\n' {
            self.unlink_line(id)
        } else {
            self.lines.clone()
        };
        return Woot { chars: self.chars.add(id, tombstone), lines };
    }

    fn integrate_set_token_type(&self, id: Id, token: Token) -> Woot {
        let info = self.must(id);
        if !info.visible {
            return self.clone();
        }
        let mut updated = info.clone();
        updated.token_type = token;
        return Woot { chars: self.chars.add(id, updated), lines: self.lines.clone() };
    }

    /// The nearest line break at or before `at` in document order.
    fn preceding_break(&self, mut at: Id) -> Id {
        loop {
            if at == Id::BEGIN || self.lines.lookup(&at).is_some() {
                return at;
            }
            at = self.must(at).prev;
        }
    }

    /// Thread a fresh newline (spliced right after `after`) into the
    /// line list.
    fn link_line(&self, id: Id, after: Id) -> Avl<Id, LineLink> {
        let prev = self.preceding_break(after);
        let next = self.line_link(prev).next;
        let prev_link = self.line_link(prev).clone();
        let next_link = self.line_link(next).clone();
        return self
            .lines
            .add(id, LineLink { prev, next })
            .add(prev, LineLink { prev: prev_link.prev, next: id })
            .add(next, LineLink { prev: id, next: next_link.next });
    }

    /// Drop a tombstoned newline from the line list.
    fn unlink_line(&self, id: Id) -> Avl<Id, LineLink> {
        let link = self.line_link(id).clone();
        let prev_link = self.line_link(link.prev).clone();
        let next_link = self.line_link(link.next).clone();
        return self
            .lines
            .add(link.prev, LineLink { prev: prev_link.prev, next: link.next })
            .add(link.next, LineLink { prev: link.prev, next: next_link.next })
            .remove(&id);
    }

    fn line_link(&self, id: Id) -> &LineLink {
        return self
            .lines
            .lookup(&id)
            .unwrap_or_else(|| panic!("line index is missing {:?}", id));
    }

    /// Cursor over visible characters, starting at `at` (clamped back
    /// to the nearest visible character, or BEGIN).
    pub fn visible(&self, at: Id) -> VisibleCursor<'_> {
        return VisibleCursor::new(self, at);
    }

    /// Iterator over every record in document order, tombstones
    /// included, sentinels excluded.
    pub fn all(&self) -> AllIter<'_> {
        return AllIter { woot: self, pos: self.must(Id::BEGIN).next };
    }

    /// Iterator over the IDs of visible line breaks, in document order.
    pub fn line_breaks(&self) -> LineIter<'_> {
        return LineIter { woot: self, pos: self.line_link(Id::BEGIN).next };
    }
}

impl Default for Woot {
    fn default() -> Self {
        return Self::new();
    }
}

impl Integrate for Woot {
    type Command = Command;

    fn integrate(&self, command: &Command) -> Woot {
        return match command {
            Command::Insert { id, chr, after, before } => {
                self.integrate_insert(*id, *chr, *after, *before)
            }
            Command::Remove { id } => self.integrate_remove(*id),
            Command::SetTokenType { id, token } => self.integrate_set_token_type(*id, *token),
        };
    }
}

/// A bidirectional cursor over visible characters, pinned to the
/// snapshot it was created from.
pub struct VisibleCursor<'a> {
    woot: &'a Woot,
    pos: Id,
}

impl<'a> VisibleCursor<'a> {
    fn new(woot: &'a Woot, at: Id) -> VisibleCursor<'a> {
        let mut cursor = VisibleCursor { woot, pos: at };
        while !cursor.is_begin() && !cursor.is_visible() {
            cursor.step_back();
        }
        return cursor;
    }

    /// True at the front sentinel.
    pub fn is_begin(&self) -> bool {
        return self.pos == Id::BEGIN;
    }

    /// True at the back sentinel.
    pub fn is_end(&self) -> bool {
        return self.pos == Id::END;
    }

    /// The ID under the cursor.
    pub fn id(&self) -> Id {
        return self.pos;
    }

    /// The glyph under the cursor.
    pub fn chr(&self) -> u8 {
        return self.woot.must(self.pos).chr;
    }

    /// The token class under the cursor.
    pub fn token_type(&self) -> Token {
        return self.woot.must(self.pos).token_type;
    }

    /// Advance to the next visible character (or END).
    pub fn move_next(&mut self) {
        if !self.is_end() {
            self.step_forward();
        }
        while !self.is_end() && !self.is_visible() {
            self.step_forward();
        }
    }

    /// Retreat to the previous visible character (or BEGIN).
    pub fn move_prev(&mut self) {
        if !self.is_begin() {
            self.step_back();
        }
        while !self.is_begin() && !self.is_visible() {
            self.step_back();
        }
    }

    fn is_visible(&self) -> bool {
        return self.woot.must(self.pos).visible;
    }

    fn step_forward(&mut self) {
        self.pos = self.woot.must(self.pos).next;
    }

    fn step_back(&mut self) {
        self.pos = self.woot.must(self.pos).prev;
    }
}

/// Iterator over every non-sentinel record, tombstones included.
pub struct AllIter<'a> {
    woot: &'a Woot,
    pos: Id,
}

impl<'a> Iterator for AllIter<'a> {
    type Item = (Id, &'a CharInfo);

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos == Id::END {
            return None;
        }
        let id = self.pos;
        let info = self.woot.must(id);
        self.pos = info.next;
        return Some((id, info));
    }
}

/// Iterator over visible line-break IDs in document order.
pub struct LineIter<'a> {
    woot: &'a Woot,
    pos: Id,
}

impl<'a> Iterator for LineIter<'a> {
    type Item = Id;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos == Id::END {
            return None;
        }
        let id = self.pos;
        self.pos = self.woot.line_link(id).next;
        return Some(id);
    }
}
