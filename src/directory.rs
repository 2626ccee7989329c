//! Branch directory and resolver.
//!
//! The directory is an immutable, ordered list of branches loaded once at
//! startup (from a TOML file in deployments) and shared read-only.

use crate::error::{Error, Result};
use crate::model::{Branch, BranchCode};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

/// Top-level TOML wrapper: a list of `[[branch]]` tables.
#[derive(Debug, Deserialize)]
struct DirectoryFile {
    #[serde(rename = "branch", default)]
    branches: Vec<Branch>,
}

/// Ordered, read-only lookup table of branches.
#[derive(Debug, Clone, Default)]
pub struct BranchDirectory {
    branches: Vec<Branch>,
}

impl BranchDirectory {
    /// Build a directory, rejecting duplicate codes.
    ///
    /// Two entries whose codes match under [`BranchCode::matches`] count as
    /// duplicates, since resolution could not tell them apart.
    pub fn new(branches: Vec<Branch>) -> Result<Self> {
        let mut seen_exact = HashSet::new();
        let mut seen_numeric = HashSet::new();
        for branch in &branches {
            let dup_exact = !seen_exact.insert(branch.code.clone());
            let dup_numeric = branch
                .code
                .as_numeric()
                .is_some_and(|n| !seen_numeric.insert(n));
            if dup_exact || dup_numeric {
                return Err(Error::Config(format!(
                    "duplicate branch code in directory: {}",
                    branch.code
                )));
            }
        }
        Ok(Self { branches })
    }

    /// Parse a directory from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let file: DirectoryFile = toml::from_str(content)
            .map_err(|e| Error::Config(format!("bad branch directory: {e}")))?;
        Self::new(file.branches)
    }

    /// Load a directory from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read branch directory {}: {e}", path.display()))
        })?;
        let directory = Self::from_toml(&content)?;
        tracing::info!(
            path = %path.display(),
            branches = directory.len(),
            "branch directory loaded"
        );
        Ok(directory)
    }

    /// Resolve a loosely-typed identifier to its branch.
    ///
    /// Tries exact equality across the whole directory first, then numeric
    /// coercion of both sides. `None` means NotFound.
    pub fn resolve(&self, code: &BranchCode) -> Option<&Branch> {
        if let Some(branch) = self.branches.iter().find(|b| &b.code == code) {
            return Some(branch);
        }
        let wanted = code.as_numeric()?;
        self.branches
            .iter()
            .find(|b| b.code.as_numeric() == Some(wanted))
    }

    /// Like [`resolve`](Self::resolve), lifting NotFound into an error for
    /// callers where an unresolved code is fatal.
    pub fn require(&self, code: &BranchCode) -> Result<&Branch> {
        self.resolve(code)
            .ok_or_else(|| Error::Resolution(code.clone()))
    }

    /// Display label: the branch name, or the identifier verbatim when it
    /// does not resolve.
    pub fn display_label(&self, code: &BranchCode) -> String {
        match self.resolve(code) {
            Some(branch) => branch.name.clone(),
            None => code.to_string(),
        }
    }

    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    /// Every code, in directory order.
    pub fn codes(&self) -> impl Iterator<Item = &BranchCode> {
        self.branches.iter().map(|b| &b.code)
    }

    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn branch(code: impl Into<BranchCode>, name: &str) -> Branch {
        Branch {
            code: code.into(),
            name: name.to_string(),
            emails: vec![],
            region: None,
        }
    }

    fn directory() -> BranchDirectory {
        BranchDirectory::new(vec![
            branch("RO", "Regional Office"),
            branch(12, "Branch 12"),
            branch("7", "Branch 7"),
        ])
        .unwrap()
    }

    #[test]
    fn string_and_numeric_identifiers_resolve_to_same_branch() {
        let dir = directory();
        let a = dir.resolve(&BranchCode::from("12")).unwrap();
        let b = dir.resolve(&BranchCode::from(12)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.name, "Branch 12");

        let c = dir.resolve(&BranchCode::from(7)).unwrap();
        assert_eq!(c.code, BranchCode::from("7"));
    }

    #[test]
    fn unknown_identifier_is_not_found() {
        let dir = directory();
        assert!(dir.resolve(&BranchCode::from("99")).is_none());
        assert!(dir.resolve(&BranchCode::from(99)).is_none());
        assert!(matches!(
            dir.require(&BranchCode::from("XX")),
            Err(Error::Resolution(_))
        ));
    }

    #[test]
    fn out_of_range_identifier_does_not_hit_largest_code() {
        let dir = BranchDirectory::new(vec![branch(i64::MAX, "max")]).unwrap();
        assert!(dir.resolve(&BranchCode::from("1e19")).is_none());
        assert!(dir.resolve(&BranchCode::from("99999999999999999999")).is_none());
        assert_eq!(dir.resolve(&BranchCode::from(i64::MAX)).unwrap().name, "max");
    }

    #[test]
    fn unresolved_display_label_falls_back_to_identifier() {
        let dir = directory();
        assert_eq!(dir.display_label(&BranchCode::from("RO")), "Regional Office");
        assert_eq!(dir.display_label(&BranchCode::from("GONE")), "GONE");
        assert_eq!(dir.display_label(&BranchCode::from(404)), "404");
    }

    #[test]
    fn duplicate_codes_are_rejected() {
        let result = BranchDirectory::new(vec![branch(5, "five"), branch("5", "also five")]);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn loads_from_toml() {
        let dir = BranchDirectory::from_toml(
            r#"
            [[branch]]
            code = "RO"
            name = "Regional Office"
            emails = ["ro.admin@company.com", "ro.head@company.com"]
            region = "HQ"

            [[branch]]
            code = 1
            name = "Branch 001 - Downtown"
            "#,
        )
        .unwrap();

        assert_eq!(dir.len(), 2);
        assert_eq!(dir.branches()[0].emails.len(), 2);
        assert_eq!(dir.branches()[0].region.as_deref(), Some("HQ"));
        assert_eq!(dir.branches()[1].code, BranchCode::Numeric(1));
        assert!(dir.branches()[1].emails.is_empty());
    }
}
