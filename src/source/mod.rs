//! Source descriptors
//!
//! A source is one job board. Everything the crawl engine knows about a
//! board is expressed through the [`SourceDescriptor`] trait: where its
//! listings live, how to read listing and detail pages, how to identify an
//! item and how to reach the next page. The engine never branches on a
//! source's name.

mod configured;
mod emploi_tg;
mod emploitogo_info;
mod registry;

pub use configured::ConfiguredSource;
pub use emploi_tg::EmploiTg;
pub use emploitogo_info::EmploitogoInfo;
pub use registry::{SourceFactory, SourceRegistry};

use crate::record::ListingItem;
use crate::text::resolve_link;
use scraper::{Html, Selector};
use std::str::FromStr;
use url::Url;

/// Capability set implemented by every source plugin
///
/// Only `name`, `listing_urls`, the two schemas and `unique_id` are
/// mandatory. The optional capabilities default to "not supported".
pub trait SourceDescriptor: Send + Sync {
    /// Unique name of the source, used as the state and registry key
    fn name(&self) -> &str;

    /// Entry points of the listing walk, crawled in order
    fn listing_urls(&self) -> &[String];

    /// Schema applied to each listing page
    fn listing_schema(&self) -> &Schema;

    /// Schema applied to each detail page
    fn detail_schema(&self) -> &Schema;

    /// Stable identifier for a listing item, `None` if it cannot be derived
    fn unique_id(&self, item: &ListingItem) -> Option<String>;

    /// URL of the listing page following `current_url`
    fn next_page_url(&self, _page_body: &str, _current_url: &str) -> Option<String> {
        None
    }

    /// Converts a raw date string into `YYYY-MM-DD`
    fn normalize_date(&self, _raw: &str) -> Option<String> {
        None
    }

    /// Maps a raw experience requirement onto the source's vocabulary
    fn normalize_experience(&self, _raw: &str) -> Option<String> {
        None
    }
}

/// A declarative page schema: a base selector plus ordered field specs
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    /// Human-readable schema name, used in logs
    pub name: String,

    /// Selector of the element(s) each item is read from
    pub base_selector: String,

    /// Ordered field specifications
    pub fields: Vec<FieldSpec>,

    /// Field holding the posting date used by the time filter
    pub date_field: Option<String>,

    /// Field holding the detail-page URL (listing schemas only)
    pub url_field: Option<String>,
}

impl Schema {
    pub fn new(name: &str, base_selector: &str) -> Self {
        Self {
            name: name.to_string(),
            base_selector: base_selector.to_string(),
            fields: Vec::new(),
            date_field: None,
            url_field: None,
        }
    }

    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    pub fn with_date_field(mut self, name: &str) -> Self {
        self.date_field = Some(name.to_string());
        self
    }

    pub fn with_url_field(mut self, name: &str) -> Self {
        self.url_field = Some(name.to_string());
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields carrying the given hint
    pub fn fields_with_hint(&self, hint: FieldHint) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(move |f| f.hint == Some(hint))
    }
}

/// How a field's value is read from the document
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionKind {
    /// Normalized text of the first match
    Text,

    /// An attribute of the first match
    Attribute { attribute: String },

    /// Outer HTML of the first match
    HtmlBlock,

    /// Text of every match
    TextList,

    /// True if any keyword occurs in the text of the first match
    KeywordFlag { keywords: Vec<String> },

    /// Label/value pairs read from every match
    KeyValueMap {
        label_selector: String,
        value_selector: String,
    },

    /// Value copied from the listing item (the detail URL for the `url` field)
    CopyFromListing,
}

impl ExtractionKind {
    /// Wire name used in configuration files
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Attribute { .. } => "attribute",
            Self::HtmlBlock => "html",
            Self::TextList => "text-list",
            Self::KeywordFlag { .. } => "keyword",
            Self::KeyValueMap { .. } => "key-value-list",
            Self::CopyFromListing => "url-from-listing",
        }
    }
}

/// Semantic hint selecting the pattern and heuristic stages for a field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldHint {
    Date,
    Deadline,
    Email,
    Phone,
    Salary,
    Count,
    ContractType,
    Experience,
    Education,
    Languages,
    Sector,
    Skills,
    Remote,
    FreeText,
}

impl FieldHint {
    /// Infers a hint from a conventional field name
    ///
    /// # Example
    ///
    /// ```
    /// use offer_harvester::source::FieldHint;
    ///
    /// assert_eq!(FieldHint::from_field_name("contact_email"), Some(FieldHint::Email));
    /// assert_eq!(FieldHint::from_field_name("company_logo_url"), None);
    /// ```
    pub fn from_field_name(name: &str) -> Option<Self> {
        let hint = match name {
            "date_posted" | "published_at" | "date" => Self::Date,
            "valid_through" | "application_deadline" | "deadline" => Self::Deadline,
            "contact_email" | "email" => Self::Email,
            "contact_phone" | "phone" => Self::Phone,
            "salary" => Self::Salary,
            "number_of_positions" | "positions" => Self::Count,
            "contract_type" | "job_type" => Self::ContractType,
            "experience_level" | "experience" => Self::Experience,
            "education_level" | "education" => Self::Education,
            "languages" => Self::Languages,
            "sector" => Self::Sector,
            "skills" => Self::Skills,
            "remote_possible" | "remote_work_possible" | "remote" => Self::Remote,
            "job_description" | "description" | "profile_required" | "job_qualifications"
            | "all_text_content" => Self::FreeText,
            _ => return None,
        };
        Some(hint)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Deadline => "deadline",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Salary => "salary",
            Self::Count => "count",
            Self::ContractType => "contract-type",
            Self::Experience => "experience",
            Self::Education => "education",
            Self::Languages => "languages",
            Self::Sector => "sector",
            Self::Skills => "skills",
            Self::Remote => "remote",
            Self::FreeText => "free-text",
        }
    }
}

impl FromStr for FieldHint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hint = match s {
            "date" => Self::Date,
            "deadline" => Self::Deadline,
            "email" => Self::Email,
            "phone" => Self::Phone,
            "salary" => Self::Salary,
            "count" => Self::Count,
            "contract-type" => Self::ContractType,
            "experience" => Self::Experience,
            "education" => Self::Education,
            "languages" => Self::Languages,
            "sector" => Self::Sector,
            "skills" => Self::Skills,
            "remote" => Self::Remote,
            "free-text" => Self::FreeText,
            other => return Err(format!("unknown field hint '{}'", other)),
        };
        Ok(hint)
    }
}

/// Declaration of one field of a schema
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,

    /// CSS selector; `None`, `""`, `:scope` and `:self` mean the base element
    pub selector: Option<String>,

    pub kind: ExtractionKind,

    /// Selects the pattern/heuristic stages; inferred from the name by default
    pub hint: Option<FieldHint>,

    /// Convert extracted HTML to plain text before export
    pub clean_html: bool,
}

impl FieldSpec {
    pub fn new(name: &str, selector: Option<&str>, kind: ExtractionKind) -> Self {
        let clean_html = matches!(kind, ExtractionKind::HtmlBlock)
            && FieldHint::from_field_name(name) == Some(FieldHint::FreeText);
        Self {
            name: name.to_string(),
            selector: selector.map(str::to_string),
            kind,
            hint: FieldHint::from_field_name(name),
            clean_html,
        }
    }

    pub fn text(name: &str, selector: &str) -> Self {
        Self::new(name, Some(selector), ExtractionKind::Text)
    }

    pub fn attribute(name: &str, selector: &str, attribute: &str) -> Self {
        Self::new(
            name,
            Some(selector),
            ExtractionKind::Attribute {
                attribute: attribute.to_string(),
            },
        )
    }

    pub fn html(name: &str, selector: &str) -> Self {
        Self::new(name, Some(selector), ExtractionKind::HtmlBlock)
    }

    pub fn with_hint(mut self, hint: Option<FieldHint>) -> Self {
        self.hint = hint;
        self
    }

    pub fn with_clean_html(mut self, clean: bool) -> Self {
        self.clean_html = clean;
        self
    }

    /// Returns the selector, or `None` when the field targets the base element
    pub fn scoped_selector(&self) -> Option<&str> {
        match self.selector.as_deref().map(str::trim) {
            None | Some("") | Some(":scope") | Some(":self") => None,
            Some(sel) => Some(sel),
        }
    }
}

/// Finds the first element matching `selector` and resolves its `href`
///
/// Shared by sources whose pagination is a "next" link.
pub fn next_link_by_selector(page_body: &str, selector: &str, current_url: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    let base = Url::parse(current_url).ok()?;
    let document = Html::parse_document(page_body);
    let href = document
        .select(&selector)
        .find_map(|el| el.value().attr("href"))?;
    resolve_link(href, &base)
}
