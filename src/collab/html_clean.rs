//! HTML-to-plain-text cleaning for free-text fields

use crate::extract::element_text;
use crate::text::collapse_whitespace;
use scraper::Html;

/// Converts an HTML fragment into plain text
///
/// Markup is dropped together with the contents of script, style, noscript
/// and template elements; entities are decoded and whitespace collapsed.
/// Input without markup passes through with only whitespace collapsed.
///
/// # Example
///
/// ```
/// use offer_harvester::collab::clean_html;
///
/// let html = "<div><p>Missions :</p><script>track()</script><ul><li>Saisie &amp; suivi</li></ul></div>";
/// assert_eq!(clean_html(html), "Missions : Saisie & suivi");
/// ```
pub fn clean_html(html: &str) -> String {
    if !html.contains('<') && !html.contains('&') {
        return collapse_whitespace(html);
    }
    let fragment = Html::parse_fragment(html);
    element_text(fragment.root_element())
}
