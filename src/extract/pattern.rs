//! Pattern stage: field-specific regular expressions
//!
//! Used for fields whose markup is unreliable but whose textual shape is
//! predictable. Each hint owns an ordered list of patterns; the first
//! pattern producing a usable value wins. When a pattern has a capture
//! group, group 1 is the value, otherwise the whole match.

use crate::record::FieldValue;
use crate::source::FieldHint;
use crate::text::{parse_date_loose, to_iso};
use regex::Regex;
use std::collections::HashMap;
use tracing::warn;

/// Built-in pattern table
const DEFAULT_PATTERNS: &[(FieldHint, &[&str])] = &[
    (
        FieldHint::Email,
        &[r"(?i)\b[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}\b"],
    ),
    (
        FieldHint::Phone,
        &[
            r"(\+228[\s.-]*\d{2}(?:[\s.-]*\d{2}){3})",
            r"(?i)(?:t[ée]l(?:[ée]phone)?|phone|whatsapp|contact)\s*\.?\s*:?\s*((?:\+|00)?\d[\d\s.-]{6,18}\d)",
        ],
    ),
    (
        FieldHint::Salary,
        &[
            r"(?i)(\d[\d\s.,]*(?:k)?\s*(?:(?:à|a|-)\s*\d[\d\s.,]*(?:k)?\s*)?(?:f\s?cfa|xof))",
            r"(?i)(?:salaire|r[ée]mun[ée]ration|traitement)\s*:?\s*([^\n\r;]{3,60})",
        ],
    ),
    (
        FieldHint::Count,
        &[
            r"(?i)(?:nombre de postes|postes? [àa] pourvoir)\s*:?\s*(\d{1,3})",
            r"(?i)\b(\d{1,3})\s*(?:postes?|places?|profils?)\b",
        ],
    ),
    (
        FieldHint::Date,
        &[r"(?i)(?:publi[ée]e?s?\s+le|date de publication|posted on)\s*:?\s*([^\n\r]{6,40})"],
    ),
    (
        FieldHint::Deadline,
        &[
            r"(?i)(?:date limite|deadline|au plus tard le|avant le|jusqu'au)[^\n\r:]{0,30}?:?\s*([^\n\r]{6,40})",
            r"(?i)(?:candidature|dossier)s?\s*(?:avant|jusqu'au)\s*:?\s*([^\n\r]{5,40})",
        ],
    ),
    (
        FieldHint::ContractType,
        &[
            r"(?i)(?:contrat|type de contrat)\s*:?\s*(CDI|CDD|Stage|Freelance|Consultance|Consultant|Int[ée]rim)\b",
            r"\b(CDI|CDD)\b",
        ],
    ),
    (
        FieldHint::Experience,
        &[
            r"(?i)(\d+\s*(?:à\s*\d+\s*)?ans?\s+(?:d['’]\s*)?exp[ée]rience)",
            r"(?i)exp[ée]rience\s*(?:professionnelle)?\s*(?:minimum|requise)?\s*:?\s*(?:de\s+)?(\d+\s*ans?)",
        ],
    ),
    (
        FieldHint::Education,
        &[
            r"(?i)\b(bac\s*\+\s*\d|master|licence|doctorat|bts|dut|ing[ée]nieur)\b",
            r"(?i)(?:dipl[oô]me|niveau d['’]\s*[ée]tudes?)\s*:?\s*([^\n\r]{5,50})",
        ],
    ),
];

/// Compiled patterns per field hint
#[derive(Debug, Clone)]
pub struct PatternSet {
    patterns: HashMap<FieldHint, Vec<Regex>>,
}

impl PatternSet {
    /// Compiles the built-in pattern table
    pub fn new() -> Self {
        Self::from_table(DEFAULT_PATTERNS)
    }

    /// Compiles a custom table
    ///
    /// Patterns that fail to compile are logged and skipped, so one bad
    /// entry only removes itself from the stage.
    pub fn from_table(table: &[(FieldHint, &[&str])]) -> Self {
        let mut patterns: HashMap<FieldHint, Vec<Regex>> = HashMap::new();
        for (hint, sources) in table {
            for source in *sources {
                match Regex::new(source) {
                    Ok(re) => patterns.entry(*hint).or_default().push(re),
                    Err(e) => warn!("Skipping invalid {} pattern: {}", hint.as_str(), e),
                }
            }
        }
        Self { patterns }
    }

    /// Returns true if the hint has at least one usable pattern
    pub fn covers(&self, hint: FieldHint) -> bool {
        self.patterns.get(&hint).is_some_and(|p| !p.is_empty())
    }

    /// Runs the hint's patterns over `text`
    ///
    /// # Returns
    ///
    /// * `Some(FieldValue)` - First usable, post-processed match
    /// * `None` - No pattern produced a usable value
    pub fn find(&self, hint: FieldHint, text: &str) -> Option<FieldValue> {
        let patterns = self.patterns.get(&hint)?;
        patterns.iter().find_map(|re| {
            re.captures_iter(text).find_map(|caps| {
                let raw = caps.get(1).or_else(|| caps.get(0))?.as_str();
                post_process(hint, raw)
            })
        })
    }
}

impl Default for PatternSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Cleans a raw match into the field's canonical form
fn post_process(hint: FieldHint, raw: &str) -> Option<FieldValue> {
    let raw = raw.trim().trim_end_matches(['.', ',', ';', ':']).trim();
    if raw.is_empty() {
        return None;
    }

    let value = match hint {
        FieldHint::Phone => {
            let phone: String = raw
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '+')
                .collect();
            let digits = phone.chars().filter(char::is_ascii_digit).count();
            if digits < 8 {
                return None;
            }
            phone
        }
        FieldHint::Count => raw.parse::<u32>().ok().filter(|n| *n > 0)?.to_string(),
        FieldHint::Date | FieldHint::Deadline => to_iso(parse_date_loose(raw)?),
        FieldHint::ContractType => canonical_contract(raw)?.to_string(),
        FieldHint::Salary if raw.chars().count() <= 3 => return None,
        FieldHint::Email => raw.to_lowercase(),
        _ => raw.split_whitespace().collect::<Vec<_>>().join(" "),
    };

    Some(FieldValue::Text(value))
}

/// Maps contract type spellings onto one label
pub(crate) fn canonical_contract(raw: &str) -> Option<&'static str> {
    let label = match crate::text::fold_accents(raw).as_str() {
        "cdi" => "CDI",
        "cdd" => "CDD",
        "stage" | "stagiaire" => "STAGE",
        "freelance" => "FREELANCE",
        "consultance" | "consultant" => "CONSULTANT",
        "interim" => "INTERIM",
        _ => return None,
    };
    Some(label)
}
