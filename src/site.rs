// model = "claude-opus-4-5"
// created = "2026-02-02"
// modified = "2026-02-03"
// driver = "Isaac Clayton"

//! Replica identity and ID generation.
//!
//! # Identifier Design
//!
//! Every CRDT operation is minted an `Id` by the `Site` that created it.
//! An `Id` is a `(site, clock)` pair:
//!
//! - Globally unique: site numbers are allocated from a process-wide
//!   counter, and each site's clock only moves forward
//! - Totally ordered: compared lexicographically, site first
//! - Compact: two u64s, `Copy`, usable as a map key
//!
//! The ordering is used *only* for identity and tie-breaking during
//! integration. It says nothing about document position.
//!
//! # Sentinels
//!
//! Site number 0 is reserved. Its first two clock values are the shared
//! `BEGIN` and `END` sentinels that bookend every document, so they are
//! identical on every replica. Real sites start at 1.

use std::cmp::Ordering;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering::Relaxed;

/// Process-wide allocator for site numbers. 0 is reserved for sentinels.
static SITE_ID_GEN: AtomicU64 = AtomicU64::new(1);

/// An operation identifier: the minting site and its clock at mint time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Id {
    /// The site that minted this ID.
    pub site: u64,
    /// The site's clock value at mint time.
    pub clock: u64,
}

impl Id {
    /// Sentinel bookending the front of every document.
    pub const BEGIN: Id = Id { site: 0, clock: 0 };

    /// Sentinel bookending the back of every document.
    pub const END: Id = Id { site: 0, clock: 1 };

    /// Create an ID from raw parts.
    pub fn new(site: u64, clock: u64) -> Id {
        return Id { site, clock };
    }
}

impl PartialOrd for Id {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        return Some(self.cmp(other));
    }
}

impl Ord for Id {
    fn cmp(&self, other: &Self) -> Ordering {
        // Compare by site first, then by clock
        match self.site.cmp(&other.site) {
            Ordering::Equal => self.clock.cmp(&other.clock),
            other => other,
        }
    }
}

/// A replica's identity and clock source.
///
/// Created once per replica; never cloned. Generating an ID is an atomic
/// fetch-and-increment, so any number of worker tasks can mint IDs from
/// the same site concurrently.
#[derive(Debug)]
pub struct Site {
    id: u64,
    clock: AtomicU64,
}

impl Site {
    /// Create a site with a fresh process-unique site number.
    pub fn new() -> Site {
        return Site {
            id: SITE_ID_GEN.fetch_add(1, Relaxed),
            clock: AtomicU64::new(0),
        };
    }

    /// The site number.
    pub fn site_id(&self) -> u64 {
        return self.id;
    }

    /// Mint a fresh ID. Distinct across all calls on all sites.
    pub fn generate_id(&self) -> Id {
        return Id {
            site: self.id,
            clock: self.clock.fetch_add(1, Relaxed),
        };
    }
}

impl Default for Site {
    fn default() -> Self {
        return Self::new();
    }
}
