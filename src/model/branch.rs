//! Branch reference data.
//!
//! Branch identifiers arrive with inconsistent typing: the directory may
//! hold `7` while a client sends `"7"`. [`BranchCode`] keeps the encoding
//! explicit and exposes a canonical numeric view for matching.

use serde::{Deserialize, Serialize};

/// 2^63: the first magnitude an i64 cannot hold.
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// A loosely-typed branch identifier.
///
/// Serializes untagged: an integer becomes `Numeric`, anything else `Text`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BranchCode {
    Numeric(i64),
    Text(String),
}

impl BranchCode {
    /// Canonical numeric value, if this identifier denotes an integer.
    ///
    /// `"12"`, `" 12 "`, `"012"` and `"12.0"` all canonicalize to `12`.
    pub fn as_numeric(&self) -> Option<i64> {
        match self {
            BranchCode::Numeric(n) => Some(*n),
            BranchCode::Text(s) => {
                let s = s.trim();
                if s.is_empty() {
                    return None;
                }
                if let Ok(n) = s.parse::<i64>() {
                    return Some(n);
                }
                // `as` saturates, so anything outside the i64 range must
                // be rejected before the cast.
                match s.parse::<f64>() {
                    Ok(f) if f.fract() == 0.0 && f.abs() < I64_BOUND => Some(f as i64),
                    _ => None,
                }
            }
        }
    }

    /// Exact match first, then numeric-coerced match of both sides.
    pub fn matches(&self, other: &BranchCode) -> bool {
        if self == other {
            return true;
        }
        match (self.as_numeric(), other.as_numeric()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Storage encoding: the textual form plus whether it was numeric.
    pub(crate) fn to_parts(&self) -> (String, bool) {
        match self {
            BranchCode::Numeric(n) => (n.to_string(), true),
            BranchCode::Text(s) => (s.clone(), false),
        }
    }

    pub(crate) fn from_parts(code: String, numeric: bool) -> Self {
        if numeric {
            if let Ok(n) = code.parse() {
                return BranchCode::Numeric(n);
            }
        }
        BranchCode::Text(code)
    }
}

impl std::fmt::Display for BranchCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BranchCode::Numeric(n) => write!(f, "{n}"),
            BranchCode::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for BranchCode {
    fn from(n: i64) -> Self {
        BranchCode::Numeric(n)
    }
}

impl From<&str> for BranchCode {
    fn from(s: &str) -> Self {
        BranchCode::Text(s.to_string())
    }
}

impl From<String> for BranchCode {
    fn from(s: String) -> Self {
        BranchCode::Text(s)
    }
}

/// An organizational unit that assignments fan out to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub code: BranchCode,
    pub name: String,
    /// Contact addresses notified when an assignment targets this branch.
    #[serde(default)]
    pub emails: Vec<String>,
    #[serde(default)]
    pub region: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_and_integer_codes_match_numerically() {
        assert!(BranchCode::from("12").matches(&BranchCode::from(12)));
        assert!(BranchCode::from(12).matches(&BranchCode::from("012")));
        assert!(BranchCode::from("12.0").matches(&BranchCode::from(12)));
        assert!(!BranchCode::from("12").matches(&BranchCode::from(13)));
    }

    #[test]
    fn out_of_range_numbers_do_not_canonicalize() {
        assert_eq!(BranchCode::from("1e19").as_numeric(), None);
        assert_eq!(BranchCode::from("99999999999999999999").as_numeric(), None);
        assert_eq!(BranchCode::from("-1e19").as_numeric(), None);
        assert!(!BranchCode::from("1e19").matches(&BranchCode::Numeric(i64::MAX)));
        assert_eq!(
            BranchCode::from(i64::MAX.to_string()).as_numeric(),
            Some(i64::MAX)
        );
        assert_eq!(BranchCode::from("1e3").as_numeric(), Some(1000));
    }

    #[test]
    fn text_codes_match_exactly_only() {
        assert!(BranchCode::from("BR001").matches(&BranchCode::from("BR001")));
        assert!(!BranchCode::from("BR001").matches(&BranchCode::from("br001")));
        assert!(!BranchCode::from("").matches(&BranchCode::from(0)));
    }

    #[test]
    fn untagged_serde_keeps_encoding() {
        let codes: Vec<BranchCode> = serde_json::from_str(r#"[7, "7", "RO"]"#).unwrap();
        assert_eq!(
            codes,
            vec![
                BranchCode::Numeric(7),
                BranchCode::Text("7".into()),
                BranchCode::Text("RO".into())
            ]
        );
    }

    #[test]
    fn storage_parts_round_trip() {
        for code in [BranchCode::from(42), BranchCode::from("42"), BranchCode::from("RO")] {
            let (text, numeric) = code.to_parts();
            assert_eq!(BranchCode::from_parts(text, numeric), code);
        }
    }
}
