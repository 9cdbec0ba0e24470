//! Heuristic stage: keyword inference over the offer's free text

use super::pattern::canonical_contract;
use crate::record::FieldValue;
use crate::source::FieldHint;
use crate::text::{contains_word, find_date_token, fold_accents, to_iso};

const REMOTE_KEYWORDS: &[&str] = &[
    "teletravail",
    "tele-travail",
    "tele travail",
    "travail a distance",
    "a distance",
    "remote",
    "home office",
    "bureau a domicile",
    "distanciel",
];

const EXPERIENCE_LEVELS: &[(&str, &str)] = &[
    ("debutant", "Débutant"),
    ("junior", "Junior"),
    ("confirme", "Confirmé"),
    ("senior", "Senior"),
    ("expert", "Expert"),
];

const LANGUAGES: &[(&str, &str)] = &[
    ("francais", "Français"),
    ("anglais", "Anglais"),
    ("allemand", "Allemand"),
    ("espagnol", "Espagnol"),
    ("portugais", "Portugais"),
    ("chinois", "Chinois"),
    ("arabe", "Arabe"),
];

const SECTORS: &[(&str, &str)] = &[
    ("informatique", "Informatique"),
    ("banque", "Banque"),
    ("finance", "Finance"),
    ("assurance", "Assurance"),
    ("sante", "Santé"),
    ("education", "Éducation"),
    ("commerce", "Commerce"),
    ("marketing", "Marketing"),
    ("communication", "Communication"),
    ("industrie", "Industrie"),
    ("agriculture", "Agriculture"),
    ("tourisme", "Tourisme"),
    ("transport", "Transport"),
    ("construction", "Construction"),
    ("energie", "Énergie"),
    ("telecommunications", "Télécommunications"),
];

const SKILLS: &[(&str, &str)] = &[
    ("python", "Python"),
    ("java", "Java"),
    ("javascript", "JavaScript"),
    ("php", "PHP"),
    ("c++", "C++"),
    ("html", "HTML"),
    ("css", "CSS"),
    ("sql", "SQL"),
    ("excel", "Excel"),
    ("word", "Word"),
    ("powerpoint", "PowerPoint"),
    ("photoshop", "Photoshop"),
    ("autocad", "AutoCAD"),
    ("sap", "SAP"),
    ("odoo", "Odoo"),
    ("sage", "Sage"),
    ("comptabilite", "Comptabilité"),
    ("marketing", "Marketing"),
    ("communication", "Communication"),
];

/// Most skills kept for one offer
const MAX_SKILLS: usize = 10;

/// Infers a value for `hint` from free text
///
/// Only hints with a meaningful keyword rule produce a value:
///
/// | Hint | Rule |
/// |------|------|
/// | remote | flag: any remote-work keyword (false when the text has none) |
/// | deadline | first date-shaped token |
/// | contract-type | stage / freelance / CDI / CDD keywords |
/// | experience | seniority keyword |
/// | languages | known languages, in table order |
/// | sector | first known sector |
/// | skills | known skills, in table order |
///
/// Empty text never produces a value.
pub fn infer(hint: FieldHint, text: &str) -> Option<FieldValue> {
    if text.trim().is_empty() {
        return None;
    }
    let folded = fold_accents(text);

    let value = match hint {
        FieldHint::Remote => FieldValue::Flag(
            REMOTE_KEYWORDS
                .iter()
                .any(|kw| contains_word(&folded, kw)),
        ),
        FieldHint::Deadline => FieldValue::Text(to_iso(find_date_token(text)?)),
        FieldHint::ContractType => FieldValue::Text(infer_contract(&folded)?.to_string()),
        FieldHint::Experience => {
            let (_, label) = EXPERIENCE_LEVELS
                .iter()
                .find(|(kw, _)| contains_word(&folded, kw))?;
            FieldValue::Text(label.to_string())
        }
        FieldHint::Languages => FieldValue::List(matching_labels(&folded, LANGUAGES, usize::MAX)),
        FieldHint::Sector => {
            let (_, label) = SECTORS.iter().find(|(kw, _)| contains_word(&folded, kw))?;
            FieldValue::Text(label.to_string())
        }
        FieldHint::Skills => FieldValue::List(matching_labels(&folded, SKILLS, MAX_SKILLS)),
        _ => return None,
    };

    value.non_empty()
}

fn infer_contract(folded: &str) -> Option<&'static str> {
    if contains_word(folded, "stage") || contains_word(folded, "stagiaire") {
        canonical_contract("stage")
    } else if contains_word(folded, "freelance") || contains_word(folded, "consultant") {
        canonical_contract("freelance")
    } else if contains_word(folded, "cdi") {
        canonical_contract("cdi")
    } else if contains_word(folded, "cdd") {
        canonical_contract("cdd")
    } else {
        None
    }
}

fn matching_labels(folded: &str, table: &[(&str, &str)], limit: usize) -> Vec<String> {
    table
        .iter()
        .filter(|(kw, _)| contains_word(folded, kw))
        .map(|(_, label)| label.to_string())
        .take(limit)
        .collect()
}
