//! emploitogo.info job board

use super::{next_link_by_selector, ExtractionKind, FieldSpec, Schema, SourceDescriptor};
use crate::record::ListingItem;
use crate::text::{parse_date_loose, parse_french_long_date, to_iso};

const NEXT_PAGE: &str = "a.pagi-item.pagi-icon.pagi-item-next";

/// Listing and detail layout of <https://emploitogo.info>
#[derive(Debug, Clone)]
pub struct EmploitogoInfo {
    listing_urls: Vec<String>,
    listing: Schema,
    detail: Schema,
}

impl EmploitogoInfo {
    pub const NAME: &'static str = "emploitogo_info";

    pub fn new() -> Self {
        let listing = Schema::new("JobOffers", "div.post-item")
            .field(FieldSpec::attribute("url", "h3.entry-title a", "href"))
            .field(FieldSpec::text("title", "h3.entry-title a"))
            .field(FieldSpec::text("date_posted", "ul.entry-meta li.meta-date"))
            .field(FieldSpec::text("description", "div.entry-excerpt"))
            .with_url_field("url")
            .with_date_field("date_posted");

        let detail = Schema::new("JobDetail", "body")
            .field(FieldSpec::new("url", None, ExtractionKind::CopyFromListing))
            .field(FieldSpec::text("title", "h1.entry-title"))
            .field(FieldSpec::text("company_name", ".meta-author .author-name"))
            .field(FieldSpec::text("date_posted", ".meta-date"))
            .field(FieldSpec::html(
                "job_description",
                "div.entry-content.article-content",
            ))
            .field(FieldSpec::attribute(
                "company_logo_url",
                ".entry-featured img",
                "src",
            ))
            .field(FieldSpec::new(
                "contact_email",
                Some("div.entry-content a[href^='mailto:']"),
                ExtractionKind::Text,
            ))
            .field(FieldSpec::new(
                "valid_through",
                Some("div.entry-content .deadline"),
                ExtractionKind::Text,
            ))
            .field(FieldSpec::new(
                "contract_type",
                Some("div.entry-content .contract-type"),
                ExtractionKind::Text,
            ))
            .field(FieldSpec::new(
                "remote_work_possible",
                Some("div.entry-content.article-content"),
                ExtractionKind::KeywordFlag {
                    keywords: vec!["télétravail".to_string(), "remote".to_string()],
                },
            ))
            .with_date_field("date_posted");

        Self {
            listing_urls: vec!["https://emploitogo.info/emploitogo/".to_string()],
            listing,
            detail,
        }
    }
}

impl Default for EmploitogoInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceDescriptor for EmploitogoInfo {
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

    fn next_page_url(&self, page_body: &str, current_url: &str) -> Option<String> {
        next_link_by_selector(page_body, NEXT_PAGE, current_url)
    }

    fn normalize_date(&self, raw: &str) -> Option<String> {
        parse_french_long_date(raw)
            .or_else(|| parse_date_loose(raw))
            .map(to_iso)
    }
}
