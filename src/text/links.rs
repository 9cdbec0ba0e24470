//! Link resolution and normalization
//!
//! Listing pages mostly carry relative `href`s. Every detail URL and
//! next-page URL goes through [`resolve_link`] so that sources never need
//! to know their own base URL, and through [`normalize_link`] so that the
//! same offer reached with different tracking parameters keeps one identity.

use url::Url;

/// Query parameters that only carry tracking information
const TRACKING_PARAMS: &[&str] = &[
    "fbclid", "gclid", "mc_eid", "mc_cid", "ref", "share", "amp",
];

/// Resolves an `href` found on a page against that page's URL
///
/// # Arguments
///
/// * `href` - The raw attribute value
/// * `base_url` - URL of the page the attribute was found on
///
/// # Returns
///
/// * `Some(String)` - Absolute http(s) URL
/// * `None` - Empty, fragment-only, non-http or unparsable link
///
/// # Example
///
/// ```
/// use offer_harvester::text::resolve_link;
/// use url::Url;
///
/// let base = Url::parse("https://www.emploi.tg/recherche-jobs-togo").unwrap();
/// assert_eq!(
///     resolve_link("/offre-emploi-togo/comptable-123", &base).as_deref(),
///     Some("https://www.emploi.tg/offre-emploi-togo/comptable-123")
/// );
/// assert_eq!(resolve_link("mailto:rh@example.tg", &base), None);
/// ```
pub fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    match absolute.scheme() {
        "http" | "https" => Some(absolute.to_string()),
        _ => None,
    }
}

/// Normalizes an absolute URL so it can serve as a stable item identifier
///
/// The fragment is dropped, tracking parameters (`utm_*` and a few
/// well-known click ids) are removed and the remaining query pairs are
/// sorted. Scheme, host and path are kept as served, since the result is
/// also the URL that gets fetched.
///
/// Returns `None` when the input is not an absolute URL.
pub fn normalize_link(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw.trim()).ok()?;
    url.set_fragment(None);

    if url.query().is_some() {
        let mut params: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| !is_tracking_param(key))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        params.sort();

        if params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(params);
        }
    }

    Some(url.to_string())
}

fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_url() -> Url {
        Url::parse("https://emploitogo.info/emploitogo/").unwrap()
    }

    #[test]
    fn test_resolve_relative_link() {
        let link = resolve_link("page/2/", &base_url()).unwrap();
        assert_eq!(link, "https://emploitogo.info/emploitogo/page/2/");
    }

    #[test]
    fn test_resolve_absolute_link() {
        let link = resolve_link("https://other.tg/offre", &base_url()).unwrap();
        assert_eq!(link, "https://other.tg/offre");
    }

    #[test]
    fn test_skip_special_links() {
        assert_eq!(resolve_link("javascript:void(0)", &base_url()), None);
        assert_eq!(resolve_link("tel:+22890000000", &base_url()), None);
        assert_eq!(resolve_link("#top", &base_url()), None);
        assert_eq!(resolve_link("   ", &base_url()), None);
    }

    #[test]
    fn test_normalize_drops_fragment_and_tracking() {
        let link =
            normalize_link("https://emploi.tg/offre/42?utm_source=fb&b=2&a=1#apply").unwrap();
        assert_eq!(link, "https://emploi.tg/offre/42?a=1&b=2");
    }

    #[test]
    fn test_normalize_keeps_trailing_slash_and_www() {
        let link = normalize_link("https://www.emploi.tg/offre/42/").unwrap();
        assert_eq!(link, "https://www.emploi.tg/offre/42/");
    }

    #[test]
    fn test_normalize_removes_empty_query() {
        let link = normalize_link("https://emploi.tg/offre/42?fbclid=xyz").unwrap();
        assert_eq!(link, "https://emploi.tg/offre/42");
    }

    #[test]
    fn test_normalize_rejects_relative() {
        assert_eq!(normalize_link("/offre/42"), None);
    }
}
