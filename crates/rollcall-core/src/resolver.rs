//! Identity resolution policy.
//!
//! Turns a raw classifier output (numeric label + distance-style confidence)
//! into a canonical enrolled identity, or Unknown. The policy is a fixed
//! sequence of named strategies, first match wins, and is a pure function of
//! its inputs; the same arguments always produce the same answer.

use crate::identity::{LabelMap, Roster};

/// Outcome of resolving one detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Identified { enrollment: String, name: String },
    Unknown,
}

impl Resolution {
    pub fn is_identified(&self) -> bool {
        matches!(self, Resolution::Identified { .. })
    }
}

/// One step of the fallback chain, applied in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// The label's mapped enrollment is itself a roster key.
    ExactLabel,
    /// The label rendered as a string is a roster key.
    LiteralKey,
    /// The label rendered as a string is a substring of a roster key.
    SubstringOnKey,
    /// The label mapped to something that is not a roster key; treat it as a
    /// display name and match by case-insensitive equality.
    ExactName,
    /// As `ExactName`, but by case-insensitive containment.
    SubstringOnName,
}

const STRATEGY_ORDER: [Strategy; 5] = [
    Strategy::ExactLabel,
    Strategy::LiteralKey,
    Strategy::SubstringOnKey,
    Strategy::ExactName,
    Strategy::SubstringOnName,
];

impl Strategy {
    /// Try to produce a roster enrollment for `label`. `mapped` is the
    /// label-map entry for the label, if any.
    ///
    /// Substring strategies scan the roster in its lexicographic iteration
    /// order, so a multi-candidate match deterministically picks the first
    /// enrollment in that order.
    fn apply(self, label: u32, mapped: Option<&str>, roster: &Roster) -> Option<String> {
        match self {
            Strategy::ExactLabel => mapped
                .filter(|m| roster.contains(m))
                .map(str::to_string),
            Strategy::LiteralKey => {
                let literal = label.to_string();
                roster.contains(&literal).then_some(literal)
            }
            Strategy::SubstringOnKey => {
                let needle = label.to_string();
                roster
                    .iter()
                    .find(|(enrollment, _)| enrollment.contains(&needle))
                    .map(|(enrollment, _)| enrollment.to_string())
            }
            Strategy::ExactName => {
                let candidate = mapped.filter(|m| !roster.contains(m))?;
                let wanted = candidate.trim().to_lowercase();
                roster
                    .iter()
                    .find(|(_, name)| name.trim().to_lowercase() == wanted)
                    .map(|(enrollment, _)| enrollment.to_string())
            }
            Strategy::SubstringOnName => {
                let candidate = mapped.filter(|m| !roster.contains(m))?;
                let needle = candidate.trim().to_lowercase();
                if needle.is_empty() {
                    return None;
                }
                roster
                    .iter()
                    .find(|(_, name)| name.trim().to_lowercase().contains(&needle))
                    .map(|(enrollment, _)| enrollment.to_string())
            }
        }
    }
}

/// Resolve a raw detection to an enrolled identity.
///
/// Returns Unknown when the label is absent, the confidence is at or above
/// `threshold` (lower = closer match), or no strategy yields a roster member.
pub fn resolve(
    label: Option<u32>,
    confidence: f32,
    labels: &LabelMap,
    roster: &Roster,
    threshold: f32,
) -> Resolution {
    let Some(label) = label else {
        return Resolution::Unknown;
    };
    if confidence >= threshold {
        return Resolution::Unknown;
    }

    let mapped = labels.get(label);
    for strategy in STRATEGY_ORDER {
        if let Some(enrollment) = strategy.apply(label, mapped, roster) {
            let name = roster.name_of(&enrollment).unwrap_or_default().to_string();
            tracing::trace!(label, ?strategy, enrollment = %enrollment, "resolved");
            return Resolution::Identified { enrollment, name };
        }
    }

    tracing::trace!(label, confidence, "no strategy matched");
    Resolution::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roster() -> Roster {
        let mut r = Roster::new();
        r.insert("E001", "Alice Adams");
        r.insert("E002", "Bob Brown");
        r.insert("E1040", "Carol Clark");
        r.insert("E1041", "Dave Drake");
        r
    }

    fn labels() -> LabelMap {
        let mut m = LabelMap::new();
        m.insert(0, "E001");
        m
    }

    #[test]
    fn mapped_label_below_threshold_resolves() {
        let result = resolve(Some(0), 40.0, &labels(), &roster(), 70.0);
        assert_eq!(
            result,
            Resolution::Identified {
                enrollment: "E001".into(),
                name: "Alice Adams".into()
            }
        );
    }

    #[test]
    fn confidence_at_or_above_threshold_is_unknown() {
        assert_eq!(resolve(Some(0), 85.0, &labels(), &roster(), 70.0), Resolution::Unknown);
        // Boundary: exactly at threshold is rejected too.
        assert_eq!(resolve(Some(0), 70.0, &labels(), &roster(), 70.0), Resolution::Unknown);
    }

    #[test]
    fn absent_label_is_unknown() {
        assert_eq!(resolve(None, 1.0, &labels(), &roster(), 70.0), Resolution::Unknown);
    }

    #[test]
    fn literal_key_fallback() {
        let mut r = roster();
        r.insert("17", "Numeric Key Person");
        // Label 17 is not in the label map; its string form is a roster key.
        let result = resolve(Some(17), 30.0, &labels(), &r, 70.0);
        assert_eq!(
            result,
            Resolution::Identified {
                enrollment: "17".into(),
                name: "Numeric Key Person".into()
            }
        );
    }

    #[test]
    fn substring_on_key_picks_lexicographic_first() {
        // "104" is a substring of both E1040 and E1041; the roster iterates
        // lexicographically, so E1040 wins deterministically.
        let result = resolve(Some(104), 30.0, &LabelMap::new(), &roster(), 70.0);
        assert_eq!(
            result,
            Resolution::Identified {
                enrollment: "E1040".into(),
                name: "Carol Clark".into()
            }
        );
    }

    #[test]
    fn mapped_name_reverse_matches_exactly() {
        // Trainer mistake: the label map points at a display name, not a key.
        let mut m = LabelMap::new();
        m.insert(5, "bob brown");
        let result = resolve(Some(5), 30.0, &m, &roster(), 70.0);
        assert_eq!(
            result,
            Resolution::Identified {
                enrollment: "E002".into(),
                name: "Bob Brown".into()
            }
        );
    }

    #[test]
    fn mapped_name_reverse_matches_by_containment() {
        let mut m = LabelMap::new();
        m.insert(5, "Clark");
        let result = resolve(Some(5), 30.0, &m, &roster(), 70.0);
        assert_eq!(
            result,
            Resolution::Identified {
                enrollment: "E1040".into(),
                name: "Carol Clark".into()
            }
        );
    }

    #[test]
    fn no_strategy_match_is_unknown() {
        let result = resolve(Some(999), 30.0, &LabelMap::new(), &roster(), 70.0);
        assert_eq!(result, Resolution::Unknown);
    }

    #[test]
    fn resolution_is_pure() {
        let m = labels();
        let r = roster();
        let a = resolve(Some(0), 40.0, &m, &r, 70.0);
        let b = resolve(Some(0), 40.0, &m, &r, 70.0);
        assert_eq!(a, b);
    }

    #[test]
    fn exact_name_beats_substring_on_name() {
        let mut r = Roster::new();
        r.insert("E010", "Ann");
        r.insert("E020", "Anna Lee");
        let mut m = LabelMap::new();
        m.insert(3, "ann");
        // Exact (case-insensitive) equality with "Ann" wins over containment
        // in "Anna Lee".
        let result = resolve(Some(3), 10.0, &m, &r, 70.0);
        assert_eq!(
            result,
            Resolution::Identified {
                enrollment: "E010".into(),
                name: "Ann".into()
            }
        );
    }
}
