// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Identity (email) normalization.
//!
//! Every identity that reaches storage, a token claim, or a comparison goes
//! through [`normalize`] first, so `Bob@X` and `bob@x` name the same party.

use unicode_normalization::UnicodeNormalization;

/// NFKC-normalize, trim and lowercase an identity.
pub fn normalize(identity: &str) -> String {
    identity.trim().nfkc().collect::<String>().to_lowercase()
}

/// Minimal shape check for an identity: `local@domain`, no path separators.
pub fn is_valid(identity: &str) -> bool {
    let Some((local, domain)) = identity.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && !identity.contains(['/', '\\'])
        && !identity.chars().any(char::is_whitespace)
        && identity != "."
        && !identity.contains("..")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_folds_case_and_whitespace() {
        assert_eq!(normalize("  Bob@Example.COM "), "bob@example.com");
    }

    #[test]
    fn normalize_applies_nfkc() {
        // Fullwidth letters fold to ASCII under NFKC.
        assert_eq!(normalize("ｂｏｂ@x"), "bob@x");
    }

    #[test]
    fn validity_rejects_path_tricks() {
        assert!(is_valid("alice@x"));
        assert!(!is_valid("alice"));
        assert!(!is_valid("@x"));
        assert!(!is_valid("alice@"));
        assert!(!is_valid("../alice@x"));
        assert!(!is_valid("alice@x/y"));
        assert!(!is_valid("a b@x"));
    }
}
