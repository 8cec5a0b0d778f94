//! Catalog text normalization
//!
//! Strips garment-category noise tokens from descriptions before they are
//! embedded, so that items cluster by style rather than by garment type.
//!
//! Tokens are removed by plain substring elimination: the match is
//! case-sensitive and not word-boundary aware, so `tee` is also removed from
//! inside `steel`. Existing catalogs were embedded with this behavior and
//! it is kept as-is.

use crate::{Error, Result};

/// Noise tokens removed from catalog text, applied in this order
pub const DEFAULT_NOISE_TOKENS: &[&str] = &[
    "dress", "top", "trousers", "anarkali", "shirt", "tee", "pant",
];

/// Deterministic, side-effect free text cleanup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextNormalizer {
    tokens: Vec<String>,
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self {
            tokens: DEFAULT_NOISE_TOKENS.iter().map(|t| t.to_string()).collect(),
        }
    }
}

impl TextNormalizer {
    /// Create a normalizer with a custom token list.
    ///
    /// Empty tokens are rejected since removing them is meaningless.
    pub fn new<I, S>(tokens: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        if let Some(pos) = tokens.iter().position(|t| t.is_empty()) {
            return Err(Error::InvalidConfig(format!(
                "noise token #{} is empty",
                pos
            )));
        }
        Ok(Self { tokens })
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Remove noise tokens, collapse whitespace runs and trim.
    ///
    /// Runs to a fixpoint: a removal can splice two fragments into a new
    /// token (`shteeirt` becomes `shirt`), which the next round removes.
    /// Every round that changes the text makes it strictly shorter.
    pub fn normalize(&self, text: &str) -> String {
        let mut current = self.pass(text);
        loop {
            let next = self.pass(&current);
            if next == current {
                return current;
            }
            current = next;
        }
    }

    fn pass(&self, text: &str) -> String {
        let mut out = text.to_string();
        for token in &self.tokens {
            if out.contains(token.as_str()) {
                out = out.replace(token.as_str(), "");
            }
        }
        out.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removes_garment_words() {
        let n = TextNormalizer::default();
        assert_eq!(n.normalize("red floral dress"), "red floral");
        assert_eq!(n.normalize("blue striped shirt"), "blue striped");
        assert_eq!(n.normalize("  linen   trousers  wide leg "), "linen wide leg");
    }

    #[test]
    fn test_substring_quirk_is_preserved() {
        // `tee` is eliminated inside unrelated words too
        let n = TextNormalizer::default();
        assert_eq!(n.normalize("steel grey"), "sl grey");
        assert_eq!(n.normalize("stopwatch print"), "swatch print");
        assert_eq!(n.normalize("tshirts"), "ts");
    }

    #[test]
    fn test_case_sensitive() {
        let n = TextNormalizer::default();
        assert_eq!(n.normalize("Dress with TOP stitching"), "Dress with TOP stitching");
    }

    #[test]
    fn test_spliced_token_removed() {
        let n = TextNormalizer::default();
        // removing `tee` leaves `shirt`, which is removed on the next round
        assert_eq!(n.normalize("shteeirt"), "");
    }

    #[test]
    fn test_idempotent() {
        let n = TextNormalizer::default();
        let samples = [
            "",
            "   ",
            "red floral dress",
            "coffee tee-shirt",
            "shteeirt pantpant",
            "toppantsdresses with   tabs\tand\nnewlines",
            "anarkalidress",
            "ddressress",
        ];
        for s in samples {
            let once = n.normalize(s);
            assert_eq!(n.normalize(&once), once, "not idempotent for {:?}", s);
        }
    }

    #[test]
    fn test_idempotent_with_spaced_token() {
        let n = TextNormalizer::new(["crop top"]).unwrap();
        let once = n.normalize("crop   top denim");
        assert_eq!(n.normalize(&once), once);
        assert_eq!(once, "denim");
    }

    #[test]
    fn test_rejects_empty_token() {
        assert!(TextNormalizer::new(["dress", ""]).is_err());
    }
}
