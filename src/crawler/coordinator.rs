//! Crawl coordinator - one crawl cycle of one source
//!
//! A cycle loads the source's state, derives the cutoff, walks the listing
//! pages, resolves and exports every new in-window item, and finally merges
//! the handled identifiers back into the state store.
//!
//! Within a cycle everything is sequential: whether to fetch the next
//! listing page depends on what the current page contained.

use crate::collab::{clean_html, Classifier, Enricher, GeoExtractor, GeoLocator, KeywordClassifier};
use crate::config::Config;
use crate::crawler::fetcher::{DocumentFetcher, FetchResult};
use crate::extract::{
    apply_enrichment, parse_listing, EnrichmentOutcome, FieldResolver, ResolvedDetail,
};
use crate::record::{DetailRecord, FieldValue, ListingItem, Provenance};
use crate::source::{FieldHint, SourceDescriptor};
use crate::state::{CrawlState, CutoffPolicy};
use crate::storage::{RecordSink, StateStore};
use crate::text::{parse_date_loose, to_iso};
use crate::Result;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Tunables of a crawl cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlSettings {
    /// Oldest posting age still exported
    pub max_age_days: u32,

    /// Upper bound on one listing or detail fetch
    pub request_timeout: Duration,

    /// Upper bound on one enrichment call
    pub enrichment_timeout: Duration,
}

impl CrawlSettings {
    pub fn from_config(config: &Config) -> Self {
        let defaults = Self::default();
        Self {
            max_age_days: config.crawler.max_age_days,
            request_timeout: Duration::from_secs(config.crawler.request_timeout_secs),
            enrichment_timeout: config
                .enrichment
                .as_ref()
                .map(|e| Duration::from_secs(e.timeout_secs))
                .unwrap_or(defaults.enrichment_timeout),
        }
    }
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            max_age_days: 7,
            request_timeout: Duration::from_secs(60),
            enrichment_timeout: Duration::from_secs(30),
        }
    }
}

/// Collaborators shared by every cycle of a run
///
/// Cloning is cheap; every handle is reference counted.
#[derive(Clone)]
pub struct CrawlContext {
    pub fetcher: Arc<dyn DocumentFetcher>,
    pub state_store: Arc<dyn StateStore>,
    pub sink: Arc<dyn RecordSink>,
    pub classifier: Arc<dyn Classifier>,
    pub geo: Arc<dyn GeoLocator>,
    pub enricher: Option<Arc<dyn Enricher>>,
    pub resolver: Arc<FieldResolver>,
    pub settings: CrawlSettings,
}

impl CrawlContext {
    /// Creates a context with the built-in classifier and geo extractor and
    /// no enrichment
    pub fn new(
        fetcher: Arc<dyn DocumentFetcher>,
        state_store: Arc<dyn StateStore>,
        sink: Arc<dyn RecordSink>,
    ) -> Self {
        Self {
            fetcher,
            state_store,
            sink,
            classifier: Arc::new(KeywordClassifier::new()),
            geo: Arc::new(GeoExtractor::new()),
            enricher: None,
            resolver: Arc::new(FieldResolver::new()),
            settings: CrawlSettings::default(),
        }
    }

    pub fn with_enricher(mut self, enricher: Arc<dyn Enricher>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    pub fn with_settings(mut self, settings: CrawlSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_geo(mut self, geo: Arc<dyn GeoLocator>) -> Self {
        self.geo = geo;
        self
    }
}

/// What happened to one new listing item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Resolved and accepted by the sink
    Exported,

    /// Posted on or before the cutoff; dropped silently
    Expired,

    /// The detail page could not be fetched
    FetchFailed,

    /// Resolved, but the sink rejected the record
    ExportFailed,

    /// The listing item has no detail-page URL
    MissingDetailUrl,
}

impl ItemOutcome {
    /// Whether the item's id joins the seen set at the end of the cycle
    ///
    /// Failed items stay out so that the next cycle retries them.
    pub fn marks_seen(&self) -> bool {
        matches!(self, Self::Exported | Self::Expired)
    }
}

/// Counters of one finished cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub source: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Listing pages fetched (or attempted)
    pub pages_visited: u32,

    /// In-window items handed to the sink
    pub new_items: u32,

    /// Items the sink accepted
    pub exported: u32,

    /// Items dropped by the cutoff
    pub expired: u32,

    /// Fetch, export and missing-URL failures
    pub errors: u32,

    /// Identifiers merged into the seen set
    pub seen_added: u32,
}

impl CycleReport {
    fn new(source: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            source: source.to_string(),
            started_at,
            finished_at: started_at,
            pages_visited: 0,
            new_items: 0,
            exported: 0,
            expired: 0,
            errors: 0,
            seen_added: 0,
        }
    }

    fn count(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Exported => {
                self.new_items += 1;
                self.exported += 1;
            }
            ItemOutcome::ExportFailed => {
                self.new_items += 1;
                self.errors += 1;
            }
            ItemOutcome::Expired => self.expired += 1,
            ItemOutcome::FetchFailed | ItemOutcome::MissingDetailUrl => self.errors += 1,
        }
    }
}

/// Runs crawl cycles for one source
pub struct Coordinator {
    source: Arc<dyn SourceDescriptor>,
    context: CrawlContext,
}

impl Coordinator {
    pub fn new(source: Arc<dyn SourceDescriptor>, context: CrawlContext) -> Self {
        Self { source, context }
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Runs one complete crawl cycle
    ///
    /// Per-page and per-item failures are counted in the report. The only
    /// error returned is a failure to persist the merged state, which fails
    /// this source's cycle and nothing else.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let name = self.source.name().to_string();
        let started_at = Utc::now();
        let mut report = CycleReport::new(&name, started_at);

        let state = match self.context.state_store.load_state(&name) {
            Ok(state) => state,
            Err(e) => {
                warn!("Unreadable crawl state for {}, starting empty: {}", name, e);
                CrawlState::new()
            }
        };
        let cutoff = CutoffPolicy::derive(started_at, self.context.settings.max_age_days, state.last_run);
        info!(
            "Starting cycle for {} ({} seen, cutoff {})",
            name,
            state.seen_ids.len(),
            cutoff.cutoff().to_rfc3339()
        );

        let mut collected: HashSet<String> = HashSet::new();
        let mut handled: HashSet<String> = HashSet::new();
        let mut visited_pages: HashSet<String> = HashSet::new();

        for entry_url in self.source.listing_urls() {
            let mut next_page = Some(entry_url.clone());

            while let Some(page_url) = next_page.take() {
                if !visited_pages.insert(page_url.clone()) {
                    warn!("{}: listing page {} already visited, stopping", name, page_url);
                    break;
                }
                report.pages_visited += 1;

                let body = match self
                    .context
                    .fetcher
                    .fetch(&page_url, self.context.settings.request_timeout)
                    .await
                {
                    FetchResult::Success { body, .. } => body,
                    failure => {
                        warn!(
                            "{}: listing page {} failed: {}",
                            name,
                            page_url,
                            failure.failure_reason().unwrap_or_default()
                        );
                        report.errors += 1;
                        break;
                    }
                };

                let items = parse_listing(self.source.listing_schema(), &body, &page_url);
                let mut found_new = false;
                let mut has_recent = false;

                for item in &items {
                    let Some(unique_id) = self
                        .source
                        .unique_id(item)
                        .filter(|id| !id.trim().is_empty())
                    else {
                        debug!("{}: skipping listing item without id", name);
                        continue;
                    };
                    if state.has_seen(&unique_id) || !collected.insert(unique_id.clone()) {
                        continue;
                    }
                    found_new = true;

                    let outcome = self.process_item(&unique_id, item, &cutoff).await;
                    debug!("{}: {} -> {:?}", name, unique_id, outcome);

                    // Only items that got past the detail fetch and the time
                    // filter prove the page still holds recent offers
                    if matches!(outcome, ItemOutcome::Exported | ItemOutcome::ExportFailed) {
                        has_recent = true;
                    }
                    if outcome.marks_seen() {
                        handled.insert(unique_id);
                    }
                    report.count(outcome);
                }

                info!(
                    "{}: page {} had {} items (new: {}, recent: {})",
                    name,
                    page_url,
                    items.len(),
                    found_new,
                    has_recent
                );

                if found_new && has_recent {
                    next_page = self.source.next_page_url(&body, &page_url);
                } else {
                    debug!("{}: no new recent items on {}, pagination stops", name, page_url);
                }
            }
        }

        self.context
            .state_store
            .merge_state(&name, &handled, started_at)?;

        report.seen_added = handled.len() as u32;
        report.finished_at = Utc::now();
        info!(
            "Cycle for {} done: {} pages, {} exported, {} expired, {} errors",
            name, report.pages_visited, report.exported, report.expired, report.errors
        );
        Ok(report)
    }

    /// Takes one new listing item through detail fetch, resolution,
    /// collaborators and export
    async fn process_item(
        &self,
        unique_id: &str,
        item: &ListingItem,
        cutoff: &CutoffPolicy,
    ) -> ItemOutcome {
        let listing_schema = self.source.listing_schema();
        let listing_date = listing_schema
            .date_field
            .as_deref()
            .and_then(|field| item.get(field))
            .and_then(|value| self.posting_date(&value.to_plain_text()));
        if listing_date.is_some_and(|date| cutoff.excludes(date)) {
            return ItemOutcome::Expired;
        }

        let Some(detail_url) = item.detail_url.as_deref() else {
            warn!("{}: item {} has no detail URL", self.source.name(), unique_id);
            return ItemOutcome::MissingDetailUrl;
        };

        let body = match self
            .context
            .fetcher
            .fetch(detail_url, self.context.settings.request_timeout)
            .await
        {
            FetchResult::Success { body, .. } => body,
            failure => {
                warn!(
                    "{}: detail page {} failed: {}",
                    self.source.name(),
                    detail_url,
                    failure.failure_reason().unwrap_or_default()
                );
                return ItemOutcome::FetchFailed;
            }
        };

        let ResolvedDetail { mut record, text } =
            self.context
                .resolver
                .resolve_detail(self.source.as_ref(), unique_id, item, &body);

        let posted = self.normalize_fields(&mut record);
        if posted.is_some_and(|date| cutoff.excludes(date)) {
            return ItemOutcome::Expired;
        }

        self.apply_collaborators(&mut record, &text);

        if let Some(enricher) = &self.context.enricher {
            let outcome = apply_enrichment(
                &mut record,
                enricher.as_ref(),
                self.context.settings.enrichment_timeout,
                &text,
            )
            .await;
            if let EnrichmentOutcome::Filled(filled) = outcome {
                debug!("{}: enrichment filled {} field(s) of {}", self.source.name(), filled, unique_id);
                self.normalize_dates(&mut record, Some(Provenance::Enrichment));
            }
        }

        match self.context.sink.upsert(&record) {
            Ok(()) => ItemOutcome::Exported,
            Err(e) => {
                warn!("{}: export of {} failed: {}", self.source.name(), unique_id, e);
                ItemOutcome::ExportFailed
            }
        }
    }

    /// Parses a raw posting date, preferring the source's own normalization
    fn posting_date(&self, raw: &str) -> Option<NaiveDate> {
        self.source
            .normalize_date(raw)
            .and_then(|iso| parse_date_loose(&iso))
            .or_else(|| parse_date_loose(raw))
    }

    /// Normalizes date and experience fields in place
    ///
    /// Returns the posting date used by the time filter, if the record has
    /// a parseable one.
    fn normalize_fields(&self, record: &mut DetailRecord) -> Option<NaiveDate> {
        self.normalize_dates(record, None);

        let detail_schema = self.source.detail_schema();

        for spec in detail_schema.fields_with_hint(FieldHint::Experience) {
            let Some(raw) = record.text(&spec.name).map(str::to_string) else {
                continue;
            };
            if let Some(normalized) = self.source.normalize_experience(&raw) {
                let provenance = record.provenance_of(&spec.name).unwrap_or(Provenance::Structural);
                record.set(&spec.name, Some(FieldValue::Text(normalized)), provenance);
            }
        }

        self.date_field()
            .as_deref()
            .and_then(|field| record.text(field))
            .and_then(parse_date_loose)
    }

    /// Field holding the posting date, from the detail schema or the listing one
    fn date_field(&self) -> Option<String> {
        self.source
            .detail_schema()
            .date_field
            .clone()
            .or_else(|| self.source.listing_schema().date_field.clone())
    }

    /// Rewrites every date-like field to ISO form
    ///
    /// With `only` set, fields tagged with another provenance are left alone.
    fn normalize_dates(&self, record: &mut DetailRecord, only: Option<Provenance>) {
        let mut date_fields: Vec<String> = self
            .source
            .detail_schema()
            .fields
            .iter()
            .filter(|spec| matches!(spec.hint, Some(FieldHint::Date | FieldHint::Deadline)))
            .map(|spec| spec.name.clone())
            .collect();
        if let Some(field) = self.date_field() {
            if !date_fields.contains(&field) {
                date_fields.push(field);
            }
        }

        for field in &date_fields {
            let provenance = record.provenance_of(field).unwrap_or(Provenance::Structural);
            if only.is_some_and(|wanted| wanted != provenance) {
                continue;
            }
            let Some(raw) = record.text(field).map(str::to_string) else {
                continue;
            };
            if let Some(date) = self.posting_date(&raw) {
                record.set(field, Some(FieldValue::Text(to_iso(date))), provenance);
            }
        }
    }

    /// Cleans HTML fields, then attaches the category and location
    fn apply_collaborators(&self, record: &mut DetailRecord, text: &str) {
        for spec in self.source.detail_schema().fields.iter().filter(|s| s.clean_html) {
            let Some(raw) = record.text(&spec.name).map(str::to_string) else {
                continue;
            };
            let provenance = record.provenance_of(&spec.name).unwrap_or(Provenance::Structural);
            record.set(&spec.name, Some(FieldValue::Text(clean_html(&raw))), provenance);
        }

        let title = record.text("title").unwrap_or_default().to_string();
        let company = record.text("company_name").unwrap_or_default().to_string();
        let category = self.context.classifier.classify(&title, text, &company);
        record.category = Some(category.as_str().to_string());

        // The location field wins for the city; remote hints count from anywhere
        let from_text = self.context.geo.locate(&format!("{}\n{}", title, text));
        let mut geo = record
            .get("location")
            .map(|location| self.context.geo.locate(&location.to_plain_text()))
            .filter(|geo| geo.city.is_some())
            .unwrap_or_else(|| from_text.clone());
        geo.is_remote |= from_text.is_remote;
        record.geo = geo;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collab::{Category, EnrichmentError, EnrichmentRequest};
    use crate::record::GeoInfo;
    use crate::source::{next_link_by_selector, FieldSpec, Schema};
    use crate::storage::{HarvestQuery, MemoryStore, StorageError, StorageResult};
    use async_trait::async_trait;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Mutex;

    const BASE: &str = "https://jobs.test";

    struct TestSource {
        urls: Vec<String>,
        listing: Schema,
        detail: Schema,
    }

    impl TestSource {
        fn new(listing_dates: bool) -> Self {
            let mut listing = Schema::new("test-listing", "li.offer")
                .field(FieldSpec::attribute("url", "a", "href"))
                .field(FieldSpec::text("title", "a"))
                .with_url_field("url");
            if listing_dates {
                listing = listing
                    .field(FieldSpec::text("date_posted", "span.date"))
                    .with_date_field("date_posted");
            }
            let detail = Schema::new("test-detail", "article")
                .field(FieldSpec::text("title", "h1"))
                .field(FieldSpec::text("date_posted", ".date"))
                .field(FieldSpec::html("job_description", ".description"))
                .field(FieldSpec::text("salary", ".salary"))
                .with_date_field("date_posted");
            Self {
                urls: vec![format!("{}/offres?page=1", BASE)],
                listing,
                detail,
            }
        }

        fn with_deadline(mut self) -> Self {
            self.detail = self.detail.field(FieldSpec::text("valid_through", ".deadline"));
            self
        }
    }

    impl SourceDescriptor for TestSource {
        fn name(&self) -> &str {
            "test_board"
        }

        fn listing_urls(&self) -> &[String] {
            &self.urls
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
            next_link_by_selector(page_body, "a.next", current_url)
        }
    }

    #[derive(Default)]
    struct FakeFetcher {
        pages: HashMap<String, String>,
        requests: Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        fn page(mut self, path: &str, body: String) -> Self {
            self.pages.insert(format!("{}{}", BASE, path), body);
            self
        }

        fn requested(&self, path: &str) -> bool {
            let url = format!("{}{}", BASE, path);
            self.requests.lock().unwrap().contains(&url)
        }
    }

    #[async_trait]
    impl DocumentFetcher for FakeFetcher {
        async fn fetch(&self, url: &str, _timeout: Duration) -> FetchResult {
            self.requests.lock().unwrap().push(url.to_string());
            match self.pages.get(url) {
                Some(body) => FetchResult::Success {
                    final_url: url.to_string(),
                    status_code: 200,
                    body: body.clone(),
                },
                None => FetchResult::HttpError { status_code: 404 },
            }
        }
    }

    fn listing_page(offers: &[(&str, &str)], next: Option<&str>) -> String {
        let items: String = offers
            .iter()
            .map(|(id, date)| {
                format!(
                    r#"<li class="offer"><a href="/offre/{id}">Offre {id}</a><span class="date">{date}</span></li>"#
                )
            })
            .collect();
        let next = next
            .map(|href| format!(r#"<a class="next" href="{}">Suivant</a>"#, href))
            .unwrap_or_default();
        format!("<html><body><ul>{}</ul>{}</body></html>", items, next)
    }

    fn detail_page(title: &str, date: &str) -> String {
        format!(
            r#"<html><body><article>
                <h1>{title}</h1>
                <span class="date">{date}</span>
                <div class="description"><p>Poste basé à Lomé. Gestion de la comptabilité.</p></div>
            </article></body></html>"#
        )
    }

    fn today() -> String {
        Utc::now().date_naive().format("%Y-%m-%d").to_string()
    }

    /// Page 1 lists three new offers (the third one old) and links to page
    /// 2, which only repeats offer 1 and links to page 3.
    fn two_page_fetcher() -> FakeFetcher {
        let today = today();
        FakeFetcher::default()
            .page(
                "/offres?page=1",
                listing_page(&[("1", ""), ("2", ""), ("3", "")], Some("/offres?page=2")),
            )
            .page("/offres?page=2", listing_page(&[("1", "")], Some("/offres?page=3")))
            .page("/offres?page=3", listing_page(&[("4", "")], None))
            .page("/offre/1", detail_page("Comptable", &today))
            .page("/offre/2", detail_page("Caissier", &today))
            .page("/offre/3", detail_page("Archiviste", "2020-01-15"))
    }

    fn coordinator(
        source: TestSource,
        fetcher: Arc<FakeFetcher>,
        store: Arc<MemoryStore>,
    ) -> Coordinator {
        let context = CrawlContext::new(fetcher, store.clone(), store);
        Coordinator::new(Arc::new(source), context)
    }

    fn seen(store: &MemoryStore) -> CrawlState {
        store.load_state("test_board").unwrap()
    }

    #[tokio::test]
    async fn test_old_item_is_seen_but_not_exported() {
        let fetcher = Arc::new(two_page_fetcher());
        let store = Arc::new(MemoryStore::new());

        let report = coordinator(TestSource::new(false), fetcher.clone(), store.clone())
            .run_cycle()
            .await
            .unwrap();

        assert_eq!(report.exported, 2);
        assert_eq!(report.expired, 1);
        assert_eq!(report.errors, 0);
        assert_eq!(store.count_offers().unwrap(), 2);
        assert_eq!(seen(&store).seen_ids.len(), 3);
        assert!(seen(&store).has_seen(&format!("{}/offre/3", BASE)));

        // Page 2 had nothing new, so page 3 is never requested
        assert_eq!(report.pages_visited, 2);
        assert!(fetcher.requested("/offres?page=2"));
        assert!(!fetcher.requested("/offres?page=3"));
    }

    #[tokio::test]
    async fn test_rerun_emits_nothing_new() {
        let fetcher = Arc::new(two_page_fetcher());
        let store = Arc::new(MemoryStore::new());
        let coordinator = coordinator(TestSource::new(false), fetcher.clone(), store.clone());

        coordinator.run_cycle().await.unwrap();
        let upserts = store.upsert_count();
        let second = coordinator.run_cycle().await.unwrap();

        assert_eq!(second.new_items, 0);
        assert_eq!(second.exported, 0);
        assert_eq!(store.upsert_count(), upserts);
        // Page 1 is entirely seen: no further page in the second cycle
        assert_eq!(second.pages_visited, 1);
    }

    #[tokio::test]
    async fn test_page_of_failed_fetches_stops_pagination() {
        let fetcher = Arc::new(
            FakeFetcher::default()
                .page(
                    "/offres?page=1",
                    listing_page(&[("1", ""), ("2", "")], Some("/offres?page=2")),
                )
                .page("/offres?page=2", listing_page(&[("3", "")], None))
                .page("/offre/3", detail_page("Comptable", &today())),
        );
        let store = Arc::new(MemoryStore::new());

        let report = coordinator(TestSource::new(false), fetcher.clone(), store.clone())
            .run_cycle()
            .await
            .unwrap();

        assert_eq!(report.errors, 2);
        assert_eq!(report.exported, 0);
        assert_eq!(report.pages_visited, 1);
        assert!(!fetcher.requested("/offres?page=2"));
        assert!(seen(&store).seen_ids.is_empty());
    }

    #[tokio::test]
    async fn test_failed_detail_fetch_is_retried_next_cycle() {
        let today = today();
        let fetcher = Arc::new(
            FakeFetcher::default()
                .page(
                    "/offres?page=1",
                    listing_page(&[("1", ""), ("2", ""), ("3", "")], None),
                )
                .page("/offre/1", detail_page("Comptable", &today))
                .page("/offre/3", detail_page("Archiviste", &today)),
        );
        let store = Arc::new(MemoryStore::new());

        let report = coordinator(TestSource::new(false), fetcher, store.clone())
            .run_cycle()
            .await
            .unwrap();

        assert_eq!(report.exported, 2);
        assert_eq!(report.errors, 1);
        let state = seen(&store);
        assert_eq!(state.seen_ids.len(), 2);
        assert!(!state.has_seen(&format!("{}/offre/2", BASE)));
    }

    #[tokio::test]
    async fn test_listing_date_skips_detail_fetch() {
        let today = today();
        let fetcher = Arc::new(
            FakeFetcher::default()
                .page(
                    "/offres?page=1",
                    listing_page(&[("1", &today), ("2", "2019-03-01")], None),
                )
                .page("/offre/1", detail_page("Comptable", &today)),
        );
        let store = Arc::new(MemoryStore::new());

        let report = coordinator(TestSource::new(true), fetcher.clone(), store.clone())
            .run_cycle()
            .await
            .unwrap();

        assert_eq!(report.exported, 1);
        assert_eq!(report.expired, 1);
        assert!(!fetcher.requested("/offre/2"));
        assert!(seen(&store).has_seen(&format!("{}/offre/2", BASE)));
    }

    #[tokio::test]
    async fn test_sink_failure_is_counted_and_not_seen() {
        let fetcher = Arc::new(two_page_fetcher());
        let store = Arc::new(MemoryStore::new());
        store.reject(&format!("{}/offre/1", BASE));

        let report = coordinator(TestSource::new(false), fetcher, store.clone())
            .run_cycle()
            .await
            .unwrap();

        assert_eq!(report.exported, 1);
        assert_eq!(report.errors, 1);
        assert!(!seen(&store).has_seen(&format!("{}/offre/1", BASE)));
    }

    #[tokio::test]
    async fn test_exported_record_shape() {
        let fetcher = Arc::new(two_page_fetcher());
        let store = Arc::new(MemoryStore::new());

        coordinator(TestSource::new(false), fetcher, store.clone())
            .run_cycle()
            .await
            .unwrap();

        let record = store
            .get_offer("test_board", &format!("{}/offre/1", BASE))
            .unwrap()
            .unwrap();
        assert_eq!(record.text("title"), Some("Comptable"));
        assert_eq!(record.text("date_posted"), Some(today().as_str()));
        assert_eq!(
            record.text("job_description"),
            Some("Poste basé à Lomé. Gestion de la comptabilité.")
        );
        assert_eq!(record.text("url"), Some(format!("{}/offre/1", BASE).as_str()));
        assert_eq!(record.provenance_of("salary"), Some(Provenance::Unresolved));
        assert_eq!(record.geo.city.as_deref(), Some("Lomé"));
        assert_eq!(record.category.as_deref(), Some("job"));

        // Every declared field carries exactly one tag
        for name in ["title", "date_posted", "job_description", "salary", "url"] {
            assert!(record.provenance_of(name).is_some(), "{} has no tag", name);
        }
    }

    struct SlowEnricher;

    #[async_trait]
    impl Enricher for SlowEnricher {
        async fn enrich(
            &self,
            _request: &EnrichmentRequest,
        ) -> std::result::Result<BTreeMap<String, FieldValue>, EnrichmentError> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(BTreeMap::new())
        }
    }

    #[tokio::test]
    async fn test_enrichment_timeout_still_exports() {
        let fetcher = Arc::new(two_page_fetcher());
        let store = Arc::new(MemoryStore::new());
        let context = CrawlContext::new(fetcher, store.clone(), store.clone())
            .with_enricher(Arc::new(SlowEnricher))
            .with_settings(CrawlSettings {
                enrichment_timeout: Duration::from_millis(50),
                ..CrawlSettings::default()
            });

        let report = Coordinator::new(Arc::new(TestSource::new(false)), context)
            .run_cycle()
            .await
            .unwrap();

        assert_eq!(report.exported, 2);
        let record = store
            .get_offer("test_board", &format!("{}/offre/1", BASE))
            .unwrap()
            .unwrap();
        assert_eq!(record.get("salary"), None);
        assert_eq!(record.provenance_of("salary"), Some(Provenance::Unresolved));
        assert_eq!(record.provenance_of("title"), Some(Provenance::Structural));
    }

    struct DeadlineEnricher;

    #[async_trait]
    impl Enricher for DeadlineEnricher {
        async fn enrich(
            &self,
            _request: &EnrichmentRequest,
        ) -> std::result::Result<BTreeMap<String, FieldValue>, EnrichmentError> {
            let mut answers = BTreeMap::new();
            answers.insert("valid_through".to_string(), FieldValue::from("30 juin 2025"));
            Ok(answers)
        }
    }

    #[tokio::test]
    async fn test_enriched_deadline_is_stored_as_iso_date() {
        let fetcher = Arc::new(
            FakeFetcher::default()
                .page("/offres?page=1", listing_page(&[("1", "")], None))
                .page("/offre/1", detail_page("Comptable", "")),
        );
        let store = Arc::new(MemoryStore::new());
        let context = CrawlContext::new(fetcher, store.clone(), store.clone())
            .with_enricher(Arc::new(DeadlineEnricher));

        let report = Coordinator::new(Arc::new(TestSource::new(false).with_deadline()), context)
            .run_cycle()
            .await
            .unwrap();

        assert_eq!(report.exported, 1);
        let record = store
            .get_offer("test_board", &format!("{}/offre/1", BASE))
            .unwrap()
            .unwrap();
        assert_eq!(record.text("valid_through"), Some("2025-06-30"));
        assert_eq!(record.provenance_of("valid_through"), Some(Provenance::Enrichment));
    }

    struct FixedCategory;

    impl Classifier for FixedCategory {
        fn classify(&self, _title: &str, _description: &str, _company: &str) -> Category {
            Category::Training
        }
    }

    struct FixedPlace;

    impl GeoLocator for FixedPlace {
        fn locate(&self, _text: &str) -> GeoInfo {
            GeoInfo {
                city: Some("Kara".to_string()),
                region: Some("Kara".to_string()),
                ..GeoInfo::default()
            }
        }
    }

    #[tokio::test]
    async fn test_custom_classifier_and_geo_are_used() {
        let fetcher = Arc::new(two_page_fetcher());
        let store = Arc::new(MemoryStore::new());
        let context = CrawlContext::new(fetcher, store.clone(), store.clone())
            .with_classifier(Arc::new(FixedCategory))
            .with_geo(Arc::new(FixedPlace));

        Coordinator::new(Arc::new(TestSource::new(false)), context)
            .run_cycle()
            .await
            .unwrap();

        let record = store
            .get_offer("test_board", &format!("{}/offre/1", BASE))
            .unwrap()
            .unwrap();
        assert_eq!(record.category.as_deref(), Some(Category::Training.as_str()));
        assert_eq!(record.geo.city.as_deref(), Some("Kara"));
    }

    struct BrokenStateStore;

    impl StateStore for BrokenStateStore {
        fn load_state(&self, _source: &str) -> StorageResult<CrawlState> {
            Err(StorageError::Database("corrupt".to_string()))
        }

        fn merge_state(
            &self,
            _source: &str,
            _new_ids: &HashSet<String>,
            _cycle_started: DateTime<Utc>,
        ) -> StorageResult<()> {
            Ok(())
        }

        fn reset_state(&self, _source: &str) -> StorageResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_unreadable_state_starts_empty() {
        let fetcher = Arc::new(two_page_fetcher());
        let store = Arc::new(MemoryStore::new());
        let context = CrawlContext::new(fetcher, Arc::new(BrokenStateStore), store.clone());

        let report = Coordinator::new(Arc::new(TestSource::new(false)), context)
            .run_cycle()
            .await
            .unwrap();

        assert_eq!(report.exported, 2);
    }

    #[test]
    fn test_outcomes_marking_seen() {
        assert!(ItemOutcome::Exported.marks_seen());
        assert!(ItemOutcome::Expired.marks_seen());
        assert!(!ItemOutcome::FetchFailed.marks_seen());
        assert!(!ItemOutcome::ExportFailed.marks_seen());
        assert!(!ItemOutcome::MissingDetailUrl.marks_seen());
    }
}
