//! Keyword classifier assigning each offer a category

use crate::text::{contains_word, count_word, fold_accents};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use tracing::warn;

/// Category label attached to every exported record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Job,
    Internship,
    Scholarship,
    Training,
    Volunteer,
}

impl Category {
    /// Tie-break order, highest priority first
    pub const PRIORITY: [Category; 5] = [
        Category::Scholarship,
        Category::Internship,
        Category::Volunteer,
        Category::Training,
        Category::Job,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Job => "job",
            Self::Internship => "internship",
            Self::Scholarship => "scholarship",
            Self::Training => "training",
            Self::Volunteer => "volunteer",
        }
    }

    /// Weight applied to each keyword hit
    fn weight(&self) -> i32 {
        match self {
            Self::Scholarship => 10,
            Self::Internship => 8,
            Self::Volunteer => 7,
            Self::Training => 6,
            Self::Job => 5,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability to label an offer
pub trait Classifier: Send + Sync {
    fn classify(&self, title: &str, description: &str, company: &str) -> Category;
}

/// Bonus for each matching special pattern
const PATTERN_BONUS: i32 = 20;

const KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::Scholarship,
        &[
            "bourse",
            "bourses",
            "scholarship",
            "fondation",
            "etudiant",
            "etudiants",
            "universite",
            "master",
            "doctorat",
            "licence",
        ],
    ),
    (
        Category::Internship,
        &[
            "stage",
            "stages",
            "stagiaire",
            "stagiaires",
            "internship",
            "apprenti",
            "apprentissage",
        ],
    ),
    (
        Category::Volunteer,
        &[
            "volontaire",
            "volontaires",
            "volontariat",
            "benevole",
            "benevoles",
            "volunteer",
        ],
    ),
    (
        Category::Training,
        &[
            "formation",
            "formations",
            "atelier",
            "certification",
            "seminaire",
            "cours",
        ],
    ),
    (
        Category::Job,
        &[
            "emploi",
            "poste",
            "postes",
            "recrutement",
            "recrute",
            "candidat",
            "cdi",
            "cdd",
            "salaire",
            "embauche",
            "carriere",
        ],
    ),
];

const SPECIAL_PATTERNS: &[(Category, &str)] = &[
    (Category::Scholarship, r"bourses?.{0,40}\b\d{4}\b"),
    (Category::Scholarship, r"programme\s+de\s+bourses?"),
    (Category::Internship, r"offre\s+de\s+stage"),
    (Category::Internship, r"fin\s+d'etudes"),
    (Category::Volunteer, r"appel\s+a\s+volontaires?"),
    (Category::Volunteer, r"mission\s+humanitaire"),
    (Category::Training, r"formation\s+(?:gratuite|certifiante|diplomante)"),
    (Category::Training, r"inscriptions?\s+ouvertes?"),
    (Category::Job, r"avis\s+de\s+recrutement"),
    (Category::Job, r"\b\d+\s+postes?\b"),
];

static FCFA_AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d[\d\s.]*\s*(?:f\s?cfa|xof)\b").expect("valid regex")
});

static INTERNSHIP_LENGTH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bstage\b.{0,40}\b\d+\s*mois\b").expect("valid regex"));

/// Weighted keyword classifier
///
/// Scores every category by keyword hits times its weight, adds a bonus for
/// each matching special pattern, then applies a few cross-category rules.
/// The highest score wins; ties go to [`Category::PRIORITY`] order and an
/// offer nothing matches is a job.
pub struct KeywordClassifier {
    patterns: Vec<(Category, Regex)>,
}

impl KeywordClassifier {
    pub fn new() -> Self {
        let mut patterns = Vec::with_capacity(SPECIAL_PATTERNS.len());
        for (category, raw) in SPECIAL_PATTERNS {
            match Regex::new(raw) {
                Ok(re) => patterns.push((*category, re)),
                Err(e) => warn!("Skipping invalid {} pattern '{}': {}", category, raw, e),
            }
        }
        Self { patterns }
    }

    fn score(&self, category: Category, text: &str) -> i32 {
        let hits: usize = KEYWORDS
            .iter()
            .filter(|(c, _)| *c == category)
            .flat_map(|(_, words)| words.iter())
            .map(|word| count_word(text, word))
            .sum();
        let bonus = self
            .patterns
            .iter()
            .filter(|(c, re)| *c == category && re.is_match(text))
            .count();

        hits as i32 * category.weight() + bonus as i32 * PATTERN_BONUS
    }
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier for KeywordClassifier {
    fn classify(&self, title: &str, description: &str, company: &str) -> Category {
        let text = fold_accents(&format!("{} {} {}", title, description, company));

        let mut scores: Vec<(Category, i32)> = Category::PRIORITY
            .iter()
            .map(|c| (*c, self.score(*c, &text)))
            .collect();

        for (category, score) in scores.iter_mut() {
            *score += match category {
                Category::Job => {
                    let mut delta = 0;
                    // Aggregator self-references inflate the job score
                    if text.contains("emploitogo.info") {
                        delta -= 10;
                    }
                    if FCFA_AMOUNT_RE.is_match(&text) {
                        delta += 15;
                    }
                    delta
                }
                Category::Scholarship
                    if contains_word(&text, "fondation") && text.contains("bourse") =>
                {
                    25
                }
                Category::Internship if INTERNSHIP_LENGTH_RE.is_match(&text) => 20,
                _ => 0,
            };
        }

        // PRIORITY order plus a strict comparison keeps the first of equals
        let mut best = (Category::Job, 0);
        for (category, score) in scores {
            if score > best.1 {
                best = (category, score);
            }
        }
        best.0
    }
}
