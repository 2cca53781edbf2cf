// model = "claude-opus-4-5"
// created = "2026-02-02"
// modified = "2026-02-05"
// driver = "Isaac Clayton"

//! Chorus - the shared-buffer core of a collaborative text editor.
//!
//! A buffer is a live document that many independent *collaborators*
//! (file I/O, highlighters, linters, UIs) edit and observe at once.
//! Chorus provides the two hard parts: a character CRDT that keeps
//! every replica convergent, and an async coordinator that fans
//! versioned snapshots out to collaborators and folds their command
//! batches back in.
//!
//! # Quick Start
//!
//! ```
//! use chorus::crdt::woot::Woot;
//! use chorus::crdt::Integrate;
//! use chorus::site::{Id, Site};
//!
//! // Each replica mints IDs from its own site
//! let site = Site::new();
//!
//! // Type "hi" into an empty document
//! let doc = Woot::new();
//! let h = doc.make_insert(&site, b'h', Id::BEGIN);
//! let doc = doc.integrate(&h);
//! let i = doc.make_insert(&site, b'i', h.id());
//! let doc = doc.integrate(&i);
//!
//! assert_eq!(doc.render(), "hi");
//! ```
//!
//! Documents are immutable values: `integrate` returns a new document
//! sharing structure with the old one, so snapshots are free and two
//! replicas that see the same commands render identically, whatever
//! the delivery order.

pub mod buffer;
pub mod collaborator;
pub mod crdt;
pub mod edit;
pub mod site;
