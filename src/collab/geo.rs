//! Location extraction over Togolese cities

use crate::record::GeoInfo;
use crate::text::{contains_word, fold_accents};
use regex::Regex;
use std::sync::LazyLock;

/// Capability to derive location details from free text
pub trait GeoLocator: Send + Sync {
    fn locate(&self, text: &str) -> GeoInfo;
}

/// A known city
#[derive(Debug, Clone, Copy)]
struct City {
    name: &'static str,
    region: &'static str,
    latitude: f64,
    longitude: f64,
    /// Accent-folded spellings, the canonical one first
    spellings: &'static [&'static str],
}

const CITIES: &[City] = &[
    City { name: "Lomé", region: "Maritime", latitude: 6.1319, longitude: 1.2228, spellings: &["lome"] },
    City { name: "Kara", region: "Kara", latitude: 9.5511, longitude: 1.1875, spellings: &["kara"] },
    City { name: "Sokodé", region: "Centrale", latitude: 8.9833, longitude: 1.1333, spellings: &["sokode"] },
    City { name: "Kpalimé", region: "Plateaux", latitude: 6.9, longitude: 0.6333, spellings: &["kpalime"] },
    City { name: "Atakpamé", region: "Plateaux", latitude: 7.5333, longitude: 1.1333, spellings: &["atakpame"] },
    City { name: "Bassar", region: "Kara", latitude: 9.25, longitude: 0.7833, spellings: &["bassar", "bassari"] },
    City { name: "Tsévié", region: "Maritime", latitude: 6.4267, longitude: 1.2133, spellings: &["tsevie"] },
    City { name: "Aného", region: "Maritime", latitude: 6.2333, longitude: 1.6, spellings: &["aneho", "anecho"] },
    City { name: "Mango", region: "Savanes", latitude: 10.3553, longitude: 0.4719, spellings: &["mango", "sansanne-mango"] },
    City { name: "Dapaong", region: "Savanes", latitude: 10.8633, longitude: 0.2072, spellings: &["dapaong", "dapango"] },
    City { name: "Niamtougou", region: "Kara", latitude: 9.7681, longitude: 1.1053, spellings: &["niamtougou"] },
    City { name: "Vogan", region: "Maritime", latitude: 6.3333, longitude: 1.5333, spellings: &["vogan"] },
    City { name: "Tabligbo", region: "Maritime", latitude: 6.5833, longitude: 1.5, spellings: &["tabligbo"] },
];

static REMOTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:tele[- ]?travail|travail\s+a\s+distance|full[- ]remote|remote|home[- ]office|distanciel|en\s+ligne)\b",
    )
    .expect("valid regex")
});

/// Gazetteer lookup over a fixed table of Togolese cities
///
/// The first city of the table mentioned in the text wins; the table starts
/// with the capital so that "Lomé" beats a passing mention of a smaller
/// town.
#[derive(Debug, Default, Clone, Copy)]
pub struct GeoExtractor;

impl GeoExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl GeoLocator for GeoExtractor {
    fn locate(&self, text: &str) -> GeoInfo {
        let folded = fold_accents(text);
        let is_remote = REMOTE_RE.is_match(&folded);

        let city = CITIES.iter().find(|city| {
            city.spellings
                .iter()
                .any(|spelling| contains_word(&folded, spelling))
        });

        match city {
            Some(city) => GeoInfo {
                city: Some(city.name.to_string()),
                region: Some(city.region.to_string()),
                latitude: Some(city.latitude),
                longitude: Some(city.longitude),
                is_remote,
            },
            None => GeoInfo {
                is_remote,
                ..GeoInfo::default()
            },
        }
    }
}
