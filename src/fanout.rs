//! Assignment fan-out: branch selector -> concrete branch codes.
//!
//! Resolution is best-effort: unresolved identifiers are dropped and
//! counted, never silently ignored. Materializing the resulting records is
//! the engine's job (see [`crate::engine::Tracker::create_assignment`]).

use tracing::debug;

use crate::directory::BranchDirectory;
use crate::model::{BranchCode, BranchSelector};

/// Result of expanding a selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    /// Canonical directory codes, one per targeted branch, in order.
    pub codes: Vec<BranchCode>,
    /// Identifiers that matched no directory entry.
    pub discarded: Vec<BranchCode>,
}

impl Expansion {
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// Expand a selector against the directory.
///
/// `All` yields every directory code in directory order. An explicit list
/// yields the canonical code of each resolved identifier in selection
/// order; identifiers that resolve to an already-selected branch collapse
/// into the first occurrence.
pub fn expand(selector: &BranchSelector, directory: &BranchDirectory) -> Expansion {
    match selector {
        BranchSelector::All => Expansion {
            codes: directory.codes().cloned().collect(),
            discarded: Vec::new(),
        },
        BranchSelector::Codes(requested) => {
            let mut codes: Vec<BranchCode> = Vec::with_capacity(requested.len());
            let mut discarded = Vec::new();
            for code in requested {
                match directory.require(code) {
                    Ok(branch) => {
                        if !codes.contains(&branch.code) {
                            codes.push(branch.code.clone());
                        }
                    }
                    Err(e) => {
                        debug!(error = %e, "dropped from fan-out");
                        discarded.push(code.clone());
                    }
                }
            }
            Expansion { codes, discarded }
        }
    }
}

/// The selector to store for a new assignment.
///
/// An explicit selection that resolves to every directory branch is stored
/// as `All`; anything else is stored as its resolved codes.
pub fn normalize_selection(expansion: &Expansion, directory: &BranchDirectory) -> BranchSelector {
    if !directory.is_empty() && expansion.codes.len() == directory.len() {
        BranchSelector::All
    } else {
        BranchSelector::Codes(expansion.codes.clone())
    }
}

/// Union of the matched branches' contact addresses, in branch order,
/// first occurrence wins.
pub fn recipients(codes: &[BranchCode], directory: &BranchDirectory) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for branch in codes.iter().filter_map(|c| directory.resolve(c)) {
        for email in &branch.emails {
            if !out.contains(email) {
                out.push(email.clone());
            }
        }
    }
    out
}
