//! Deterministic detection of required slots in user text.

use {lexlinker_agents::Slot, regex::Regex};

use crate::Result;

const PARTIES_PATTERN: &str = r"(?i)\b(parties|party|between|landlord|tenant|lessor|lessee|buyer|seller|employer|employee|contractor|client|partes|entre|arrendador|arrendatario|comprador|vendedor)\b";

const TERM_PATTERN: &str = r"(?i)(\b\d+\s*-?\s*(days?|weeks?|months?|years?|d[ií]as?|semanas?|mes|meses|años?)\b|\b(duration|indefinite|indefinitely|until|plazo|vigencia|duraci[oó]n)\b|\bterm\s+of\b)";

const KEY_CONDITIONS_PATTERN: &str = r"(?i)(\$\s*\d|\b\d+\s*(rooms?|units?|pesos|mxn|usd|habitaciones?)\b|\b(rent|price|payment|pay|deposit|salary|fee|fees|conditions?|scope|deliverables?|premises|property|services?|renta|pago|precio|dep[oó]sito|condiciones|cl[aá]usulas?|servicios?)\b)";

/// One compiled detector per slot.
#[derive(Debug, Clone)]
pub struct SlotDetector {
    patterns: Vec<(Slot, Regex)>,
}

impl SlotDetector {
    /// Detectors for parties, term and key conditions (English and Spanish).
    pub fn builtin() -> Result<Self> {
        Self::with_patterns([
            (Slot::Parties, PARTIES_PATTERN),
            (Slot::Term, TERM_PATTERN),
            (Slot::KeyConditions, KEY_CONDITIONS_PATTERN),
        ])
    }

    pub fn with_patterns<'a>(patterns: impl IntoIterator<Item = (Slot, &'a str)>) -> Result<Self> {
        let patterns = patterns
            .into_iter()
            .map(|(slot, pattern)| Ok((slot, Regex::new(pattern)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Whether any of `texts` mentions `slot`. Slots without a detector are
    /// never satisfied.
    #[must_use]
    pub fn is_satisfied<'a>(&self, slot: Slot, texts: impl IntoIterator<Item = &'a str>) -> bool {
        let Some((_, regex)) = self.patterns.iter().find(|(s, _)| *s == slot) else {
            return false;
        };
        texts.into_iter().any(|text| regex.is_match(text))
    }

    /// The required slots none of `texts` satisfies, in declaration order.
    #[must_use]
    pub fn missing(&self, required: &[Slot], texts: &[&str]) -> Vec<Slot> {
        required
            .iter()
            .copied()
            .filter(|slot| !self.is_satisfied(*slot, texts.iter().copied()))
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, rstest::rstest};

    fn detector() -> SlotDetector {
        SlotDetector::builtin().unwrap()
    }

    #[test]
    fn complete_rental_request_satisfies_every_slot() {
        let text = "I need a rental contract for 2 rooms, 12 months, parties X and Y";
        assert!(detector().missing(&Slot::ALL, &[text]).is_empty());
    }

    #[test]
    fn bare_contract_request_misses_everything() {
        let missing = detector().missing(&Slot::ALL, &["I need a contract"]);
        assert_eq!(missing, vec![Slot::Parties, Slot::Term, Slot::KeyConditions]);
    }

    #[test]
    fn slots_accumulate_across_messages() {
        let texts = [
            "I need a lease agreement",
            "between Ana and Luis",
            "for 1 year, rent of $5000 per month",
        ];
        assert!(detector().missing(&Slot::ALL, &texts).is_empty());
    }

    #[rstest]
    #[case(Slot::Parties, "el contrato es entre Ana y Luis")]
    #[case(Slot::Parties, "the tenant is my cousin")]
    #[case(Slot::Term, "for 6 months")]
    #[case(Slot::Term, "por 12 meses")]
    #[case(Slot::Term, "valid until December")]
    #[case(Slot::KeyConditions, "the payment is due monthly")]
    #[case(Slot::KeyConditions, "renta de 8000 pesos")]
    fn detects_individual_slots(#[case] slot: Slot, #[case] text: &str) {
        assert!(detector().is_satisfied(slot, [text]));
    }

    #[rstest]
    #[case(Slot::Term, "I have 2 questions")]
    #[case(Slot::Parties, "please help me")]
    #[case(Slot::KeyConditions, "I need a rental contract")]
    fn ignores_unrelated_text(#[case] slot: Slot, #[case] text: &str) {
        assert!(!detector().is_satisfied(slot, [text]));
    }

    #[test]
    fn slot_without_detector_is_never_satisfied() {
        let only_term = SlotDetector::with_patterns([(Slot::Term, TERM_PATTERN)]).unwrap();
        assert!(!only_term.is_satisfied(Slot::Parties, ["parties X and Y"]));
    }
}
