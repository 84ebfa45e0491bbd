// src/services/sanitizer.rs

//! Annotation page sanitizer.
//!
//! Turns a raw annotation wiki page into the explanation fragment stored on
//! a comic record:
//!
//! 1. the explanation section is cut out of the page with `scraper`;
//! 2. the fragment is cleaned with a streaming `lol_html` pass that drops
//!    notice blocks, wraps data tables for horizontal scrolling, strips
//!    presentation attributes and rewrites root-relative references.
//!
//! Cleaning is idempotent: running it over its own output changes nothing.

use lol_html::html_content::ContentType;
use lol_html::{HtmlRewriter, Settings, element};
use scraper::{ElementRef, Html, Node, Selector};

use crate::error::{AppError, Result};
use crate::models::SanitizerConfig;
use crate::utils::url::{rewrite_reference, rewrite_srcset};

/// Attributes that only carry presentation.
const PRESENTATION_ATTRS: [&str; 3] = ["id", "class", "style"];

/// Attributes holding a single URL.
const URL_ATTRS: [&str; 2] = ["href", "src"];

/// Opening tag of the scroll container placed around data tables.
const SCROLL_OPEN: &str = "<div data-scroll-x>";
const SCROLL_CLOSE: &str = "</div>";

const HEADINGS: [&str; 6] = ["h1", "h2", "h3", "h4", "h5", "h6"];

/// Extracts and cleans the explanation section of annotation pages.
pub struct Sanitizer {
    explanation_marker: Selector,
    discussion_marker: Selector,
    config: SanitizerConfig,
}

impl Sanitizer {
    /// Build a sanitizer, validating every configured selector.
    pub fn new(config: SanitizerConfig) -> Result<Self> {
        let explanation_marker = parse_selector(&config.explanation_marker)?;
        let discussion_marker = parse_selector(&config.discussion_marker)?;

        for selector in config
            .notice_selectors
            .iter()
            .chain(&config.data_table_selectors)
        {
            selector
                .parse::<lol_html::Selector>()
                .map_err(|e| AppError::selector(selector, e))?;
        }

        Ok(Self {
            explanation_marker,
            discussion_marker,
            config,
        })
    }

    /// Explanation fragment of a raw annotation page.
    ///
    /// A page without an explanation section yields an empty fragment.
    pub fn sanitize(&self, page: &str) -> Result<String> {
        match self.extract_fragment(page) {
            Some(fragment) => self.clean_fragment(&fragment),
            None => {
                log::warn!(
                    "No '{}' section found in annotation page",
                    self.config.explanation_marker
                );
                Ok(String::new())
            }
        }
    }

    /// Raw markup between the explanation and discussion markers.
    pub fn extract_fragment(&self, page: &str) -> Option<String> {
        let document = Html::parse_document(page);
        let marker = document.select(&self.explanation_marker).next()?;
        let start = section_anchor(enclosing_heading(marker));

        let mut fragment = String::new();
        for node in start.next_siblings() {
            match node.value() {
                Node::Element(_) => {
                    let Some(element) = ElementRef::wrap(node) else {
                        continue;
                    };
                    if self.opens_discussion(element) {
                        break;
                    }
                    fragment.push_str(&element.html());
                }
                Node::Text(text) => {
                    let raw: &str = text;
                    fragment.push_str(&html_escape::encode_text(raw));
                }
                _ => {}
            }
        }

        Some(fragment.trim().to_string())
    }

    /// Remove notices, wrap data tables, strip presentation attributes and
    /// rewrite root-relative references in a fragment.
    pub fn clean_fragment(&self, fragment: &str) -> Result<String> {
        let origin = self.config.annotation_origin.as_str();
        let article_prefix = self.config.article_path_prefix.as_str();

        let mut handlers = Vec::new();
        for selector in &self.config.notice_selectors {
            handlers.push(element!(selector.as_str(), |el| {
                el.remove();
                Ok(())
            }));
        }
        for selector in &self.config.data_table_selectors {
            handlers.push(element!(selector.as_str(), |el| {
                // Removed by a notice selector
                if el.removed() {
                    return Ok(());
                }
                el.before(SCROLL_OPEN, ContentType::Html);
                el.after(SCROLL_CLOSE, ContentType::Html);
                Ok(())
            }));
        }
        handlers.push(element!("*", move |el| {
            for name in PRESENTATION_ATTRS {
                el.remove_attribute(name);
            }

            for name in URL_ATTRS {
                if let Some(value) = el.get_attribute(name) {
                    if let Some(rewritten) = rewrite_reference(&value, origin, article_prefix) {
                        el.set_attribute(name, &rewritten)?;
                    }
                }
            }

            if let Some(value) = el.get_attribute("srcset") {
                let rewritten = rewrite_srcset(&value, origin, article_prefix);
                if rewritten != value {
                    el.set_attribute("srcset", &rewritten)?;
                }
            }
            Ok(())
        }));

        let mut output = Vec::with_capacity(fragment.len());
        let mut rewriter = HtmlRewriter::new(
            Settings {
                element_content_handlers: handlers,
                ..Settings::default()
            },
            |c: &[u8]| output.extend_from_slice(c),
        );

        rewriter
            .write(fragment.as_bytes())
            .map_err(|e| AppError::markup(format!("HTML rewrite error: {e}")))?;
        rewriter
            .end()
            .map_err(|e| AppError::markup(format!("HTML rewrite finalization error: {e}")))?;

        String::from_utf8(output)
            .map_err(|e| AppError::markup(format!("Invalid UTF-8 in rewritten HTML: {e}")))
    }

    fn opens_discussion(&self, element: ElementRef<'_>) -> bool {
        self.discussion_marker.matches(&element)
            || element.select(&self.discussion_marker).next().is_some()
    }
}

/// The heading that contains a marker, or the marker itself.
fn enclosing_heading(marker: ElementRef<'_>) -> ElementRef<'_> {
    std::iter::once(marker)
        .chain(marker.ancestors().filter_map(ElementRef::wrap))
        .find(|el| HEADINGS.contains(&el.value().name()))
        .unwrap_or(marker)
}

/// Climb out of wrappers that hold nothing but the heading, so the
/// following siblings are the section content.
fn section_anchor(heading: ElementRef<'_>) -> ElementRef<'_> {
    let mut anchor = heading;
    while !has_following_element(anchor) {
        match anchor.parent().and_then(ElementRef::wrap) {
            Some(parent) if parent.value().name() != "body" => anchor = parent,
            _ => break,
        }
    }
    anchor
}

fn has_following_element(element: ElementRef<'_>) -> bool {
    element.next_siblings().any(|node| node.value().is_element())
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}
