//! Corrections for characters the recognizer commonly confuses.
//!
//! A recognized plate such as `S0LII` may really be `SOLII`, `S0L11` and so
//! on. For each confusable pair the plate is first equalized, so that every
//! member of the pair becomes the pair's target character, and then every
//! combination of target/replacement over those positions is enumerated.

use crate::error::{ConfigError, CorrectionError};
use std::collections::BTreeSet;

/// Enumeration uses a `u64` mask, so no configuration may go past this.
pub const MAX_AMBIGUOUS_CEILING: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfusablePair {
    pub target: char,
    pub replacement: char,
}

impl ConfusablePair {
    pub fn new(target: char, replacement: char) -> Self {
        ConfusablePair {
            target,
            replacement,
        }
    }

    /// `0`/`O` and `1`/`I`.
    pub fn defaults() -> Vec<Self> {
        vec![ConfusablePair::new('0', 'O'), ConfusablePair::new('1', 'I')]
    }

    /// Parses a comma separated list of two-character pairs, e.g. `0O,1I`.
    /// Letters are uppercased to match recognizer output.
    pub fn parse_list(list: &str) -> Result<Vec<Self>, ConfigError> {
        list.split(',')
            .map(str::trim)
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let chars: Vec<char> = pair.chars().map(|c| c.to_ascii_uppercase()).collect();
                match chars.as_slice() {
                    [target, replacement] if target != replacement => {
                        Ok(ConfusablePair::new(*target, *replacement))
                    }
                    _ => Err(ConfigError::Pair(pair.to_string())),
                }
            })
            .collect()
    }

    pub fn occurs_in(&self, plate: &str) -> bool {
        plate
            .chars()
            .any(|c| c == self.target || c == self.replacement)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorrectionOptions {
    /// Keep the all-target (equalized) string among the variants.
    pub include_equalized: bool,
    /// Plates with more ambiguous characters than this are not corrected.
    pub max_ambiguous: usize,
}

impl Default for CorrectionOptions {
    fn default() -> Self {
        CorrectionOptions {
            include_equalized: true,
            max_ambiguous: 6,
        }
    }
}

/// Rewrites every `target` or `replacement` in `plate` to `target`.
pub fn equalize(plate: &str, target: char, replacement: char) -> String {
    plate
        .chars()
        .map(|c| if c == replacement { target } else { c })
        .collect()
}

/// Produces every target/replacement combination over the ambiguous
/// positions of `plate`.
pub fn correct(
    plate: &str,
    target: char,
    replacement: char,
    options: CorrectionOptions,
) -> Result<BTreeSet<String>, CorrectionError> {
    let canonical: Vec<char> = equalize(plate, target, replacement).chars().collect();
    let positions: Vec<usize> = canonical
        .iter()
        .enumerate()
        .filter(|&(_, &c)| c == target)
        .map(|(i, _)| i)
        .collect();

    let limit = options.max_ambiguous.min(MAX_AMBIGUOUS_CEILING);
    if positions.len() > limit {
        return Err(CorrectionError::TooManyAmbiguous {
            plate: plate.to_string(),
            positions: positions.len(),
            limit,
        });
    }

    // Mask 0 leaves every position as `target`, i.e. the equalized string.
    let first_mask = if options.include_equalized { 0 } else { 1 };
    let mut variants = BTreeSet::new();
    for mask in first_mask..(1u64 << positions.len()) {
        let mut chars = canonical.clone();
        for (bit, &position) in positions.iter().enumerate() {
            if mask & (1 << bit) != 0 {
                chars[position] = replacement;
            }
        }
        variants.insert(chars.into_iter().collect());
    }
    Ok(variants)
}

/// Runs [`correct`] for each configured pair present in a plate.
#[derive(Debug, Clone)]
pub struct Corrector {
    pairs: Vec<ConfusablePair>,
    options: CorrectionOptions,
}

impl Corrector {
    pub fn new(pairs: Vec<ConfusablePair>, options: CorrectionOptions) -> Self {
        Corrector { pairs, options }
    }

    pub fn applies_to(&self, plate: &str) -> bool {
        self.pairs.iter().any(|pair| pair.occurs_in(plate))
    }

    /// Union of the per-pair variant sets. Pairs are independent passes over
    /// the original plate; their outputs are not fed into each other.
    pub fn variants(&self, plate: &str) -> Result<BTreeSet<String>, CorrectionError> {
        let mut variants = BTreeSet::new();
        for pair in self.pairs.iter().filter(|pair| pair.occurs_in(plate)) {
            variants.extend(correct(plate, pair.target, pair.replacement, self.options)?);
        }
        Ok(variants)
    }
}
