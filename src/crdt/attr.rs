// model = "claude-opus-4-5"
// created = "2026-02-02"
// modified = "2026-02-04"
// driver = "Isaac Clayton"

//! Per-ID attribute streams layered over the content string.
//!
//! Diagnostics, cursors, gutter notes, side buffers and the rest all
//! follow one shape: a map from ID to a small value, written by
//! whichever collaborator owns that concern. `AttrMap` implements the
//! shape once; each stream is an instantiation with its own value type.
//!
//! Convergence comes from tagging every write with a freshly minted ID
//! and letting the largest writer win. That makes integration
//! commutative (order of arrival is irrelevant), idempotent (a
//! redelivered write is never newer than itself), and associative, so
//! the buffer can fold response batches in any arrival order.

use crate::crdt::avl::Avl;
use crate::crdt::woot::Token;
use crate::crdt::Integrate;
use crate::site::Id;
use crate::site::Site;

/// One binding: the winning write and its value. A cleared binding
/// keeps its entry so later (older) writes cannot resurrect it.
#[derive(Clone, Debug, PartialEq, Eq)]
struct AttrEntry<V> {
    write: Id,
    value: Option<V>,
}

/// A reified write to one attribute stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttrCommand<V> {
    /// Bind `target` to `value`.
    Set {
        /// Minted identity of this write, used for last-writer-wins.
        write: Id,
        /// The ID being annotated.
        target: Id,
        /// The new value.
        value: V,
    },
    /// Drop the binding for `target`.
    Clear {
        /// Minted identity of this write.
        write: Id,
        /// The ID being cleared.
        target: Id,
    },
}

impl<V> AttrCommand<V> {
    /// The ID this command annotates.
    pub fn target(&self) -> Id {
        return match self {
            AttrCommand::Set { target, .. } => *target,
            AttrCommand::Clear { target, .. } => *target,
        };
    }

    /// The minted identity of the write itself.
    pub fn write(&self) -> Id {
        return match self {
            AttrCommand::Set { write, .. } => *write,
            AttrCommand::Clear { write, .. } => *write,
        };
    }
}

/// A convergent map from ID to attribute value.
#[derive(Clone)]
pub struct AttrMap<V> {
    entries: Avl<Id, AttrEntry<V>>,
}

impl<V: Clone> AttrMap<V> {
    /// Create an empty stream.
    pub fn new() -> AttrMap<V> {
        return AttrMap { entries: Avl::new() };
    }

    /// Mint a write binding `target` to `value`.
    pub fn make_set(site: &Site, target: Id, value: V) -> AttrCommand<V> {
        return AttrCommand::Set { write: site.generate_id(), target, value };
    }

    /// Mint a write clearing `target`.
    pub fn make_clear(site: &Site, target: Id) -> AttrCommand<V> {
        return AttrCommand::Clear { write: site.generate_id(), target };
    }

    /// The live value bound to `target`, if any.
    pub fn get(&self, target: Id) -> Option<&V> {
        return self.entries.lookup(&target).and_then(|entry| entry.value.as_ref());
    }

    /// Iterate live bindings in ID order.
    pub fn iter(&self) -> impl Iterator<Item = (Id, &V)> {
        return self
            .entries
            .iter()
            .filter_map(|(id, entry)| entry.value.as_ref().map(|value| (*id, value)));
    }

    /// True if no live bindings exist.
    pub fn is_empty(&self) -> bool {
        return self.iter().next().is_none();
    }

    /// True if both handles share the same underlying state.
    pub fn same_identity(&self, other: &AttrMap<V>) -> bool {
        return self.entries.same_identity(&other.entries);
    }
}

impl<V: Clone> Default for AttrMap<V> {
    fn default() -> Self {
        return Self::new();
    }
}

impl<V: Clone> Integrate for AttrMap<V> {
    type Command = AttrCommand<V>;

    fn integrate(&self, command: &AttrCommand<V>) -> AttrMap<V> {
        let target = command.target();
        let write = command.write();
        if let Some(existing) = self.entries.lookup(&target) {
            // Largest writer wins; ties are redeliveries.
            if existing.write >= write {
                return self.clone();
            }
        }
        let value = match command {
            AttrCommand::Set { value, .. } => Some(value.clone()),
            AttrCommand::Clear { .. } => None,
        };
        return AttrMap { entries: self.entries.add(target, AttrEntry { write, value }) };
    }
}

// --- Stream value types ---
//
// The minimum shape each collaborator needs; anything richer belongs to
// the collaborator, not the buffer.

/// How loud a diagnostic is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Stylistic or informational.
    Info,
    /// Suspicious but not fatal.
    Warning,
    /// The build is broken.
    Error,
}

/// A compiler or linter message, keyed by its own minted ID.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    /// How loud.
    pub severity: Severity,
    /// Human-readable text.
    pub message: String,
}

/// The span of characters a diagnostic refers to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiagnosticRange {
    /// First character of the span.
    pub begin: Id,
    /// Last character of the span.
    pub end: Id,
    /// The diagnostic this span belongs to.
    pub diagnostic: Id,
}

/// An auxiliary read-only document (assembly view, preprocessed
/// output, and the like).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SideBuffer {
    /// Display name.
    pub name: String,
    /// Raw contents.
    pub content: Vec<u8>,
}

/// A link from a character to a side buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SideBufferRef {
    /// The side buffer being referenced.
    pub buffer: Id,
}

/// A suggested edit attached to a diagnostic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fixit {
    /// First character to replace.
    pub begin: Id,
    /// Last character to replace.
    pub end: Id,
    /// Replacement text.
    pub replacement: String,
}

/// A file the document depends on (includes, imports).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReferencedFile {
    /// Path as the referencing tool reported it.
    pub path: String,
}

/// A margin annotation for one character's line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GutterNote {
    /// Short marker text.
    pub note: String,
}

/// A collaborator's caret.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cursor {
    /// The character the caret sits after.
    pub at: Id,
}

/// Token-class annotations layered over the content (the highlighter's
/// output stream).
pub type TokenTypes = AttrMap<Token>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get() {
        let site = Site::new();
        let target = site.generate_id();
        let map: AttrMap<GutterNote> = AttrMap::new();
        let cmd = AttrMap::make_set(&site, target, GutterNote { note: "●".into() });
        let map = map.integrate(&cmd);

        assert_eq!(map.get(target).unwrap().note, "●");
        assert!(map.get(site.generate_id()).is_none());
    }

    #[test]
    fn last_writer_wins_in_any_order() {
        let site = Site::new();
        let target = site.generate_id();
        let first = AttrMap::make_set(&site, target, GutterNote { note: "a".into() });
        let second = AttrMap::make_set(&site, target, GutterNote { note: "b".into() });

        let base: AttrMap<GutterNote> = AttrMap::new();
        let one = base.integrate(&first).integrate(&second);
        let two = base.integrate(&second).integrate(&first);

        assert_eq!(one.get(target).unwrap().note, "b");
        assert_eq!(two.get(target).unwrap().note, "b");
    }

    #[test]
    fn redelivery_is_a_noop() {
        let site = Site::new();
        let target = site.generate_id();
        let cmd = AttrMap::make_set(&site, target, GutterNote { note: "x".into() });

        let base: AttrMap<GutterNote> = AttrMap::new();
        let once = base.integrate(&cmd);
        let twice = once.integrate(&cmd);
        assert!(twice.same_identity(&once));
    }

    #[test]
    fn clear_beats_older_set() {
        let site = Site::new();
        let target = site.generate_id();
        let set = AttrMap::make_set(&site, target, GutterNote { note: "x".into() });
        let clear = AttrMap::<GutterNote>::make_clear(&site, target);

        let base: AttrMap<GutterNote> = AttrMap::new();
        let one = base.integrate(&set).integrate(&clear);
        let two = base.integrate(&clear).integrate(&set);

        assert!(one.get(target).is_none());
        assert!(two.get(target).is_none());
    }

    #[test]
    fn iter_skips_cleared_bindings() {
        let site = Site::new();
        let a = site.generate_id();
        let b = site.generate_id();
        let base: AttrMap<GutterNote> = AttrMap::new();
        let map = base
            .integrate(&AttrMap::make_set(&site, a, GutterNote { note: "a".into() }))
            .integrate(&AttrMap::make_set(&site, b, GutterNote { note: "b".into() }))
            .integrate(&AttrMap::<GutterNote>::make_clear(&site, a));

        let live: Vec<Id> = map.iter().map(|(id, _)| id).collect();
        assert_eq!(live, vec![b]);
        assert!(!map.is_empty());
    }

    #[test]
    fn concurrent_sites_converge() {
        let a = Site::new();
        let b = Site::new();
        let target = a.generate_id();

        let from_a = AttrMap::make_set(&a, target, Cursor { at: target });
        let from_b = AttrMap::make_set(&b, target, Cursor { at: Id::BEGIN });

        let base: AttrMap<Cursor> = AttrMap::new();
        let one = base.integrate(&from_a).integrate(&from_b);
        let two = base.integrate(&from_b).integrate(&from_a);

        // b's site id is larger, so b's write wins on both replicas
        assert_eq!(one.get(target), two.get(target));
        assert_eq!(one.get(target).unwrap().at, Id::BEGIN);
    }
}
