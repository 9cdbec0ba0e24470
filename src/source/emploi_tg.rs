//! emploi.tg job board

use super::{ExtractionKind, FieldSpec, Schema, SourceDescriptor};
use crate::record::ListingItem;
use crate::text::{parse_french_long_date, to_iso};

const OFFER_LINK: &str = "a[href*='/offre-emploi-togo/']";

/// Listing and detail layout of <https://www.emploi.tg>
///
/// The board exposes a single search page without a usable "next" link, so
/// pagination is left at its default.
#[derive(Debug, Clone)]
pub struct EmploiTg {
    listing_urls: Vec<String>,
    listing: Schema,
    detail: Schema,
}

impl EmploiTg {
    pub const NAME: &'static str = "emploi_tg";

    pub fn new() -> Self {
        let listing = Schema::new("JobOffersTG", "div.card.card-job")
            .field(FieldSpec::attribute("url", OFFER_LINK, "href"))
            .field(FieldSpec::text("title", OFFER_LINK))
            .field(FieldSpec::text("location", ".job-location, .location"))
            .field(FieldSpec::text("company_name", ".company-name, .employer"))
            .field(FieldSpec::text("date_posted", ".date-posted, .job-date"))
            .with_url_field("url")
            .with_date_field("date_posted");

        let detail = Schema::new("JobDetailTG", "body")
            .field(FieldSpec::new("url", None, ExtractionKind::CopyFromListing))
            .field(FieldSpec::text("title", "h1.text-center, h1.job-title, h1"))
            .field(FieldSpec::text(
                "company_name",
                ".company-name, .employer-name, .card-block-company h3, .job-info .company",
            ))
            .field(FieldSpec::text("location", ".job-location, .location, .address"))
            .field(FieldSpec::text(
                "date_posted",
                ".date-posted, .job-date, .publication-date",
            ))
            .field(FieldSpec::html(
                "job_description",
                "div.job-description, .job-content, .description-content",
            ))
            .field(FieldSpec::text(
                "contract_type",
                ".contract-type, .job-type, .employment-type",
            ))
            .field(FieldSpec::text("salary", ".salary, .remuneration, .pay"))
            .field(FieldSpec::text(
                "experience_level",
                ".experience, .experience-required, .exp-level",
            ))
            .field(FieldSpec::text(
                "education_level",
                ".education, .qualification, .diploma",
            ))
            .field(
                FieldSpec::html(
                    "skills",
                    ".skills, .competences, .job-qualifications ul, .requirements ul",
                )
                .with_clean_html(true),
            )
            .field(
                FieldSpec::html(
                    "job_qualifications",
                    "div.job-qualifications, .qualifications, .requirements",
                )
                .with_clean_html(true),
            )
            .field(
                FieldSpec::html(
                    "company_description",
                    ".company-description, .about-company, .employer-info",
                )
                .with_clean_html(true),
            )
            .field(FieldSpec::attribute(
                "company_logo_url",
                ".company-logo img, .employer-logo img",
                "src",
            ))
            .field(FieldSpec::attribute(
                "company_website",
                ".company-website a, .employer-website a",
                "href",
            ))
            .field(FieldSpec::text("contact_email", ".contact-email, .email"))
            .field(FieldSpec::attribute(
                "application_url",
                ".apply-button a, .apply-link",
                "href",
            ))
            .field(FieldSpec::text(
                "contact_phone",
                ".phone, .telephone, .contact-phone",
            ))
            .field(FieldSpec::text(
                "valid_through",
                ".deadline, .expiry-date, .valid-until",
            ))
            .field(FieldSpec::text(
                "number_of_positions",
                ".positions, .postes, .vacancies",
            ))
            .field(FieldSpec::text("sector", ".sector, .industry, .domain"))
            .field(FieldSpec::text("languages", ".languages, .langues"))
            .field(FieldSpec::new(
                "remote_work_possible",
                Some(".job-content, .main-content"),
                ExtractionKind::KeywordFlag {
                    keywords: vec!["télétravail".to_string(), "remote".to_string()],
                },
            ))
            .field(
                FieldSpec::html("other_benefits", ".benefits, .avantages, .perks")
                    .with_clean_html(true),
            )
            .with_date_field("date_posted");

        Self {
            listing_urls: vec!["https://www.emploi.tg/recherche-jobs-togo".to_string()],
            listing,
            detail,
        }
    }
}

impl Default for EmploiTg {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceDescriptor for EmploiTg {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn listing_urls(&self) -> &[String] {
        &self.listing_urls
    }

    fn listing_schema(&self) -> &Schema {
        &self.listing
    }

    fn detail_schema(&self) -> &Schema {
        &self.detail
    }

    fn unique_id(&self, item: &ListingItem) -> Option<String> {
        item.detail_url.clone()
    }

    fn normalize_date(&self, raw: &str) -> Option<String> {
        parse_french_long_date(raw).map(to_iso)
    }
}
