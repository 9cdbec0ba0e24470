//! Selector-driven extraction

use crate::record::{FieldValue, ListingItem};
use crate::source::{ExtractionKind, FieldSpec, Schema};
use crate::text::{fold_accents, normalize_link, resolve_link};
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use tracing::{debug, warn};
use url::Url;

/// Parses a CSS selector, logging instead of failing on bad input
pub fn parse_selector(raw: &str) -> Option<Selector> {
    match Selector::parse(raw) {
        Ok(selector) => Some(selector),
        Err(e) => {
            debug!("Ignoring malformed selector '{}': {:?}", raw, e);
            None
        }
    }
}

/// Text nodes under `element` that a reader would see
///
/// Skips the contents of script, style, noscript and template elements.
pub(crate) fn visible_text_nodes<'a>(element: ElementRef<'a>) -> impl Iterator<Item = &'a str> {
    element.descendants().filter_map(|node| {
        let text = node.value().as_text()?;
        let hidden = node
            .parent()
            .and_then(|parent| parent.value().as_element())
            .is_some_and(|el| matches!(el.name(), "script" | "style" | "noscript" | "template"));
        (!hidden).then_some(&**text)
    })
}

/// Text content of an element with whitespace normalized
///
/// Text nodes are trimmed individually and joined with single spaces.
pub fn element_text(element: ElementRef<'_>) -> String {
    visible_text_nodes(element)
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text content of an element, one line per non-empty text node
///
/// Keeps line structure so that line-bounded patterns stay anchored.
pub fn block_text(element: ElementRef<'_>) -> String {
    visible_text_nodes(element)
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// First element matching the field's selector inside `root`
///
/// Fields without a selector target `root` itself.
fn first_match<'a>(spec: &FieldSpec, root: ElementRef<'a>) -> Option<ElementRef<'a>> {
    match spec.scoped_selector() {
        None => Some(root),
        Some(raw) => {
            let selector = parse_selector(raw)?;
            root.select(&selector).next()
        }
    }
}

fn all_matches<'a>(spec: &FieldSpec, root: ElementRef<'a>) -> Vec<ElementRef<'a>> {
    match spec.scoped_selector() {
        None => vec![root],
        Some(raw) => match parse_selector(raw) {
            Some(selector) => root.select(&selector).collect(),
            None => Vec::new(),
        },
    }
}

/// Runs the structural stage for one field
///
/// Returns `None` when nothing non-empty was found, including when the
/// selector is malformed. `CopyFromListing` fields are resolved by the
/// cascade, not here.
pub fn extract_field(spec: &FieldSpec, root: ElementRef<'_>) -> Option<FieldValue> {
    let value = match &spec.kind {
        ExtractionKind::Text => {
            let element = first_match(spec, root)?;
            FieldValue::Text(element_text(element))
        }
        ExtractionKind::Attribute { attribute } => {
            let value = all_matches(spec, root)
                .into_iter()
                .find_map(|el| el.value().attr(attribute))?;
            FieldValue::Text(value.trim().to_string())
        }
        ExtractionKind::HtmlBlock => {
            let element = first_match(spec, root)?;
            FieldValue::Text(element.html())
        }
        ExtractionKind::TextList => {
            let items: Vec<String> = all_matches(spec, root)
                .into_iter()
                .map(element_text)
                .filter(|t| !t.is_empty())
                .collect();
            FieldValue::List(items)
        }
        ExtractionKind::KeywordFlag { keywords } => {
            let element = first_match(spec, root)?;
            let text = fold_accents(&element_text(element));
            let found = keywords
                .iter()
                .map(|kw| fold_accents(kw))
                .any(|kw| !kw.is_empty() && text.contains(&kw));
            FieldValue::Flag(found)
        }
        ExtractionKind::KeyValueMap {
            label_selector,
            value_selector,
        } => {
            let label_sel = parse_selector(label_selector)?;
            let value_sel = parse_selector(value_selector)?;
            let mut map = BTreeMap::new();
            for item in all_matches(spec, root) {
                let label = item.select(&label_sel).next().map(element_text);
                let value = item.select(&value_sel).next().map(element_text);
                if let (Some(label), Some(value)) = (label, value) {
                    if !label.is_empty() {
                        map.insert(label, value);
                    }
                }
            }
            FieldValue::Map(map)
        }
        ExtractionKind::CopyFromListing => return None,
    };

    value.non_empty()
}

/// Parses a listing page into listing items
///
/// Every element matching the schema's base selector yields one item, even
/// when none of its fields resolve. When the schema names a URL field, its
/// value is resolved against `page_url`, normalized, and stored both in the
/// field and as the item's detail URL.
///
/// # Arguments
///
/// * `schema` - The listing schema
/// * `body` - Raw HTML of the listing page
/// * `page_url` - URL the page was fetched from
pub fn parse_listing(schema: &Schema, body: &str, page_url: &str) -> Vec<ListingItem> {
    let Some(base) = parse_selector(&schema.base_selector) else {
        warn!(
            "Listing schema '{}' has an unusable base selector '{}'",
            schema.name, schema.base_selector
        );
        return Vec::new();
    };

    let base_url = Url::parse(page_url).ok();
    let document = Html::parse_document(body);

    document
        .select(&base)
        .map(|element| {
            let mut item = ListingItem::default();
            for spec in &schema.fields {
                if let Some(value) = extract_field(spec, element) {
                    item.fields.insert(spec.name.clone(), value);
                }
            }

            if let Some(url_field) = &schema.url_field {
                let detail_url = item
                    .text(url_field)
                    .zip(base_url.as_ref())
                    .and_then(|(href, base)| resolve_link(href, base))
                    .and_then(|absolute| normalize_link(&absolute));

                match &detail_url {
                    Some(url) => {
                        item.fields
                            .insert(url_field.clone(), FieldValue::Text(url.clone()));
                    }
                    None => {
                        item.fields.remove(url_field);
                    }
                }
                item.detail_url = detail_url;
            }

            item
        })
        .collect()
}

/// Ancestor selectors of a field selector, nearest first
///
/// Each comma-separated alternative is split into its compound steps, and
/// every proper prefix is returned from longest to shortest, e.g.
/// `.job-info .salary` yields `.job-info`. Combinators inside brackets,
/// parentheses and quotes are left alone.
///
/// # Example
///
/// ```
/// use offer_harvester::extract::ancestor_prefixes;
///
/// assert_eq!(
///     ancestor_prefixes("main > .meta li.salary, .pay"),
///     vec!["main > .meta", "main"]
/// );
/// ```
pub fn ancestor_prefixes(selector: &str) -> Vec<String> {
    let mut prefixes = Vec::new();
    for alternative in split_top_level(selector, |c| c == ',') {
        let steps = compound_steps(&alternative);
        for len in (1..steps.len()).rev() {
            let mut prefix = String::new();
            for (i, (combinator, step)) in steps[..len].iter().enumerate() {
                if i > 0 {
                    match combinator {
                        ' ' => prefix.push(' '),
                        c => {
                            prefix.push(' ');
                            prefix.push(*c);
                            prefix.push(' ');
                        }
                    }
                }
                prefix.push_str(step);
            }
            if !prefixes.contains(&prefix) {
                prefixes.push(prefix);
            }
        }
    }
    prefixes
}

/// Splits on `is_sep` outside of brackets, parentheses and quotes
fn split_top_level(input: &str, is_sep: impl Fn(char) -> bool) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for c in input.chars() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            current.push(c);
            continue;
        }
        match c {
            '\'' | '"' => {
                quote = Some(c);
                current.push(c);
            }
            '[' | '(' => {
                depth += 1;
                current.push(c);
            }
            ']' | ')' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            c if depth == 0 && is_sep(c) => {
                parts.push(std::mem::take(&mut current));
            }
            c => current.push(c),
        }
    }
    parts.push(current);

    parts
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

/// Splits one selector alternative into `(combinator, compound)` steps
///
/// The first step's combinator is always `' '`.
fn compound_steps(alternative: &str) -> Vec<(char, String)> {
    let mut steps = Vec::new();
    let mut pending = ' ';
    for token in split_top_level(alternative, |c| c.is_whitespace()) {
        match token.as_str() {
            ">" | "+" | "~" => {
                pending = token.chars().next().unwrap_or(' ');
            }
            _ => {
                // Combinators written without spaces ("ul>li") stay in one token
                let mut rest = token.as_str();
                loop {
                    match top_level_combinator(rest) {
                        Some((idx, comb)) => {
                            let (head, tail) = rest.split_at(idx);
                            if !head.is_empty() {
                                steps.push((pending, head.to_string()));
                            }
                            pending = comb;
                            rest = &tail[comb.len_utf8()..];
                        }
                        None => {
                            if !rest.is_empty() {
                                steps.push((pending, rest.to_string()));
                            }
                            pending = ' ';
                            break;
                        }
                    }
                }
            }
        }
    }
    steps
}

fn top_level_combinator(token: &str) -> Option<(usize, char)> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (idx, c) in token.char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '[' | '(' => depth += 1,
            ']' | ')' => depth = depth.saturating_sub(1),
            '>' | '+' | '~' if depth == 0 => return Some((idx, c)),
            _ => {}
        }
    }
    None
}
