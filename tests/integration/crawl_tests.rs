//! Integration tests for the harvester
//!
//! These tests use wiremock to serve a small job board and run complete
//! harvests against it, from a TOML configuration file to the SQLite
//! database.

use chrono::Utc;
use offer_harvester::config::{load_config_with_hash, Config};
use offer_harvester::crawler::{run_harvest, HarvestOptions};
use offer_harvester::record::Provenance;
use offer_harvester::storage::{CycleStatus, HarvestQuery, SqliteStorage, StateStore};
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Writes a configuration declaring one board served by `base_url`
fn create_test_config(dir: &TempDir, base_url: &str) -> (Config, String) {
    let db_path = dir.path().join("harvest.db");
    let content = format!(
        r#"
[crawler]
max-age-days = 7
request-timeout-secs = 5

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[output]
database-path = "{db}"

[[source]]
name = "mock_board"
listing-urls = ["{base}/offres"]
next-page-selector = "a.next"

[source.listing]
base-selector = "li.offer"
url-field = "url"

[[source.listing.fields]]
name = "url"
selector = "a"
type = "attribute"
attribute = "href"

[[source.listing.fields]]
name = "company_name"
selector = ".company"

[source.detail]
base-selector = "article"
date-field = "date_posted"

[[source.detail.fields]]
name = "title"
selector = "h1"

[[source.detail.fields]]
name = "date_posted"
selector = "time"

[[source.detail.fields]]
name = "job_description"
selector = ".description"
type = "html"

[[source.detail.fields]]
name = "contact_email"
selector = ".contact-email"

[[source.detail.fields]]
name = "contract_type"
selector = ".contract"
"#,
        db = db_path.display(),
        base = base_url
    );

    let config_path = dir.path().join("harvester.toml");
    std::fs::write(&config_path, content).expect("Failed to write config");
    load_config_with_hash(&config_path).expect("Failed to load config")
}

fn listing_page(offers: &[&str], next: Option<&str>) -> String {
    let items: String = offers
        .iter()
        .map(|id| {
            format!(
                r#"<li class="offer"><a href="/offre/{id}">Offre {id}</a><span class="company">Société {id}</span></li>"#
            )
        })
        .collect();
    let next = next
        .map(|href| format!(r#"<a class="next" href="{}">Suivant</a>"#, href))
        .unwrap_or_default();
    format!("<html><body><ul>{}</ul>{}</body></html>", items, next)
}

fn detail_page(title: &str, date: &str, body: &str) -> String {
    format!(
        r#"<html><body><article>
            <h1>{title}</h1>
            <time>{date}</time>
            <div class="description"><p>{body}</p></div>
        </article></body></html>"#
    )
}

fn today() -> String {
    Utc::now().date_naive().format("%Y-%m-%d").to_string()
}

async fn mount_html(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// A board with two listing pages: page 1 has three offers (one old),
/// page 2 only repeats an offer from page 1
async fn start_board() -> MockServer {
    let server = MockServer::start().await;
    let today = today();

    Mock::given(method("GET"))
        .and(path("/offres"))
        .and(query_param("page", "2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(listing_page(&["1"], Some("/offres?page=3"))),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/offres"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(listing_page(&["1", "2", "3"], Some("/offres?page=2"))),
        )
        .mount(&server)
        .await;

    mount_html(
        &server,
        "/offre/1",
        detail_page(
            "Comptable confirmé",
            &today,
            "CDI basé à Kara. Envoyez votre CV à RH@Entreprise.tg avant vendredi.",
        ),
    )
    .await;
    mount_html(
        &server,
        "/offre/2",
        detail_page(
            "Stage en marketing digital",
            &today,
            "Stage de 6 mois à Lomé, télétravail partiel possible.",
        ),
    )
    .await;
    mount_html(
        &server,
        "/offre/3",
        detail_page("Archiviste", "2020-01-15", "Poste à Sokodé."),
    )
    .await;

    server
}

fn open_db(config: &Config) -> SqliteStorage {
    SqliteStorage::new(Path::new(&config.output.database_path)).expect("Failed to open database")
}

fn only_mock_board() -> HarvestOptions {
    HarvestOptions {
        fresh: false,
        sources: vec!["mock_board".to_string()],
    }
}

#[tokio::test]
async fn test_full_harvest_single_source() {
    let server = start_board().await;
    let dir = TempDir::new().unwrap();
    let (config, hash) = create_test_config(&dir, &server.uri());

    let report = run_harvest(&config, &hash, &only_mock_board())
        .await
        .expect("Harvest failed");

    assert!(report.failed_sources().is_empty());
    assert_eq!(report.total_exported(), 2);

    let storage = open_db(&config);
    assert_eq!(storage.count_offers().unwrap(), 2);

    let state = storage.load_state("mock_board").unwrap();
    assert_eq!(state.seen_ids.len(), 3);
    assert!(state.last_run.is_some());

    let first_id = format!("{}/offre/1", server.uri());
    let offer = storage.get_offer("mock_board", &first_id).unwrap().expect("offer 1 stored");
    assert_eq!(offer.text("title"), Some("Comptable confirmé"));
    assert_eq!(offer.text("date_posted"), Some(today().as_str()));
    assert_eq!(offer.text("company_name"), Some("Société 1"));
    assert_eq!(offer.text("contact_email"), Some("rh@entreprise.tg"));
    assert_eq!(offer.provenance_of("contact_email"), Some(Provenance::Pattern));
    assert_eq!(offer.provenance_of("contract_type"), Some(Provenance::Pattern));
    assert_eq!(offer.geo.city.as_deref(), Some("Kara"));
    assert_eq!(offer.category.as_deref(), Some("job"));

    let second = storage
        .get_offer("mock_board", &format!("{}/offre/2", server.uri()))
        .unwrap()
        .expect("offer 2 stored");
    assert_eq!(second.category.as_deref(), Some("internship"));
    assert_eq!(second.provenance_of("contract_type"), Some(Provenance::Heuristic));
    assert_eq!(second.provenance_of("contact_email"), Some(Provenance::Unresolved));
    assert!(second.geo.is_remote);

    // Page 2 brought nothing new, so page 3 was never requested
    let requests = server.received_requests().await.unwrap();
    assert!(!requests
        .iter()
        .any(|r| r.url.query() == Some("page=3")));

    let cycles = storage.latest_cycles().unwrap();
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].status, CycleStatus::Completed);
    assert_eq!(cycles[0].exported, 2);
    assert_eq!(cycles[0].expired, 1);
    assert_eq!(cycles[0].config_hash, hash);
}

#[tokio::test]
async fn test_second_run_exports_nothing_new() {
    let server = start_board().await;
    let dir = TempDir::new().unwrap();
    let (config, hash) = create_test_config(&dir, &server.uri());

    run_harvest(&config, &hash, &only_mock_board()).await.unwrap();
    let second = run_harvest(&config, &hash, &only_mock_board()).await.unwrap();

    assert_eq!(second.total_exported(), 0);
    assert!(second.failed_sources().is_empty());

    let storage = open_db(&config);
    assert_eq!(storage.count_offers().unwrap(), 2);
    assert_eq!(storage.load_state("mock_board").unwrap().seen_ids.len(), 3);
}

#[tokio::test]
async fn test_fresh_run_forgets_seen_offers() {
    let server = start_board().await;
    let dir = TempDir::new().unwrap();
    let (config, hash) = create_test_config(&dir, &server.uri());

    run_harvest(&config, &hash, &only_mock_board()).await.unwrap();

    let fresh = HarvestOptions {
        fresh: true,
        ..only_mock_board()
    };
    let report = run_harvest(&config, &hash, &fresh).await.unwrap();

    assert_eq!(report.total_exported(), 2);
    // Upserts replace the earlier rows
    assert_eq!(open_db(&config).count_offers().unwrap(), 2);
}

#[tokio::test]
async fn test_unknown_source_is_rejected() {
    let dir = TempDir::new().unwrap();
    let (config, hash) = create_test_config(&dir, "http://127.0.0.1:9");

    let options = HarvestOptions {
        fresh: false,
        sources: vec!["no_such_board".to_string()],
    };

    assert!(run_harvest(&config, &hash, &options).await.is_err());
}

#[tokio::test]
async fn test_unreachable_board_is_not_fatal() {
    let dir = TempDir::new().unwrap();
    // Nothing listens on the discard port
    let (config, hash) = create_test_config(&dir, "http://127.0.0.1:9");

    let report = run_harvest(&config, &hash, &only_mock_board())
        .await
        .expect("Harvest failed");

    assert!(report.failed_sources().is_empty());
    assert_eq!(report.total_exported(), 0);
    assert_eq!(report.total_errors(), 1);
    assert!(open_db(&config)
        .load_state("mock_board")
        .unwrap()
        .seen_ids
        .is_empty());
}
