//! Reply post-processing: keyword hyperlinks and bare-URL linkification.
//!
//! Output is HTML-flavoured markup (`<a href="...">...</a>`) for rich-text
//! transports. Formatting never produces broken markup: if validation of the
//! result fails, the original text is returned untouched.

use std::ops::Range;
use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Phrase to URL substitutions, applied in order. Earlier phrases win where
/// phrases overlap.
pub const LINK_KEYWORDS: &[(&str, &str)] = &[
    ("ООО \"ТехноСервис\"", "https://technoservice.ru"),
    ("ТехноСервис", "https://technoservice.ru"),
    ("наш сайт", "https://technoservice.ru"),
    ("веб-приложений", "https://technoservice.ru/web"),
    ("мобильных приложений", "https://technoservice.ru/mobile"),
    ("автоматизация бизнес-процессов", "https://technoservice.ru/automation"),
    ("IT-консалтинг", "https://technoservice.ru/consulting"),
    ("менеджер", "https://t.me/manager_technoservice"),
    ("контакты", "https://technoservice.ru/contacts"),
    ("+7 (999) 123-45-67", "tel:+79991234567"),
    ("info@technoservice.ru", "mailto:info@technoservice.ru"),
];

/// How many characters before a bare URL are checked for an opening anchor.
const LOOKBACK_CHARS: usize = 20;

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?'];

static ANCHOR_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<a\s[^>]*>.*?</a\s*>").expect("Invalid anchor regex"));

static BARE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)https?://[^\s<>"]+|www\.[^\s<>"]+"#).expect("Invalid URL regex")
});

static ANCHOR_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<a(?:\s[^>]*)?>|</a\s*>").expect("Invalid tag regex"));

static HREF_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\bhref\s*=\s*"([^"]*)""#).expect("Invalid href regex"));

static DEFAULT_FORMATTER: LazyLock<ResponseFormatter> = LazyLock::new(|| {
    ResponseFormatter::with_links(LINK_KEYWORDS.iter().copied())
        .expect("Invalid built-in link table")
});

/// Insert hyperlinks into `text` using the built-in link table.
pub fn add_clickable_links(text: &str) -> String {
    DEFAULT_FORMATTER.add_clickable_links(text)
}

#[derive(Clone)]
struct LinkRule {
    pattern: Regex,
    url: String,
}

/// Keyword and URL linkifier over an ordered phrase table.
#[derive(Clone)]
pub struct ResponseFormatter {
    rules: Vec<LinkRule>,
}

impl ResponseFormatter {
    /// Formatter using the built-in company link table.
    pub fn new() -> Self {
        DEFAULT_FORMATTER.clone()
    }

    /// Formatter over a custom `(phrase, url)` table, matched
    /// case-insensitively in the given order.
    pub fn with_links<'a>(
        links: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, regex::Error> {
        let rules = links
            .into_iter()
            .map(|(phrase, url)| {
                Ok(LinkRule {
                    pattern: Regex::new(&format!("(?i){}", regex::escape(phrase)))?,
                    url: url.to_string(),
                })
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self { rules })
    }

    /// Wrap configured phrases and bare URLs in hyperlinks.
    ///
    /// Text already inside an anchor is left alone, so formatting its own
    /// output is a no-op. Phrases inside a bare URL are not linked; the URL
    /// is linked whole. Returns `text` unchanged if the result would contain
    /// malformed anchor markup.
    pub fn add_clickable_links(&self, text: &str) -> String {
        let mut formatted = text.to_string();
        for rule in &self.rules {
            formatted = map_outside_links(&formatted, |segment| {
                rule.pattern
                    .replace_all(segment, |caps: &Captures| anchor(&rule.url, &caps[0]))
                    .into_owned()
            });
        }
        let formatted = linkify_bare_urls(&formatted);

        if let Err(problem) = validate_anchors(&formatted) {
            tracing::warn!(problem, "Link formatting produced malformed markup, sending plain text");
            return text.to_string();
        }
        formatted
    }
}

impl Default for ResponseFormatter {
    fn default() -> Self {
        Self::new()
    }
}

fn anchor(href: &str, content: &str) -> String {
    format!("<a href=\"{}\">{}</a>", href, content)
}

/// Byte ranges of existing anchor elements and of bare URLs outside them,
/// in text order.
fn link_spans(text: &str) -> Vec<Range<usize>> {
    let anchors: Vec<Range<usize>> = ANCHOR_SPAN.find_iter(text).map(|m| m.range()).collect();
    let mut spans: Vec<Range<usize>> = BARE_URL
        .find_iter(text)
        .map(|m| m.range())
        .filter(|url| !anchors.iter().any(|span| span.contains(&url.start)))
        .collect();
    spans.extend(anchors);
    spans.sort_by_key(|span| span.start);
    spans
}

/// Rewrite only the text between existing anchors and bare URLs.
fn map_outside_links(text: &str, mut rewrite: impl FnMut(&str) -> String) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for span in link_spans(text) {
        out.push_str(&rewrite(&text[last..span.start]));
        out.push_str(&text[span.clone()]);
        last = span.end;
    }
    out.push_str(&rewrite(&text[last..]));
    out
}

fn linkify_bare_urls(text: &str) -> String {
    let anchors: Vec<Range<usize>> = ANCHOR_SPAN.find_iter(text).map(|m| m.range()).collect();

    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for found in BARE_URL.find_iter(text) {
        let start = found.start();
        if anchors.iter().any(|span| span.contains(&start)) || preceded_by_anchor(text, start) {
            continue;
        }
        let url = found.as_str().trim_end_matches(TRAILING_PUNCTUATION);
        if url.is_empty() {
            continue;
        }
        let href = if url.to_ascii_lowercase().starts_with("www.") {
            format!("http://{}", url)
        } else {
            url.to_string()
        };
        out.push_str(&text[last..start]);
        out.push_str(&anchor(&href, url));
        last = start + url.len();
    }
    out.push_str(&text[last..]);
    out
}

/// Whether an opening anchor sits within the few characters before `pos`.
fn preceded_by_anchor(text: &str, pos: usize) -> bool {
    let before = &text[..pos];
    let window_start = before
        .char_indices()
        .rev()
        .nth(LOOKBACK_CHARS - 1)
        .map_or(0, |(i, _)| i);
    before[window_start..].contains("<a href=")
}

/// Check that every anchor has a non-empty href and content and that anchors
/// are neither nested nor left open.
fn validate_anchors(text: &str) -> Result<(), &'static str> {
    let mut open_content_start: Option<usize> = None;
    for tag in ANCHOR_TAG.find_iter(text) {
        if tag.as_str().starts_with("</") {
            let content_start = open_content_start.take().ok_or("closing tag without opening tag")?;
            if text[content_start..tag.start()].trim().is_empty() {
                return Err("anchor without content");
            }
        } else {
            if open_content_start.is_some() {
                return Err("nested anchor");
            }
            let href = HREF_ATTR
                .captures(tag.as_str())
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().trim())
                .unwrap_or_default();
            if href.is_empty() {
                return Err("anchor with empty href");
            }
            open_content_start = Some(tag.end());
        }
    }
    match open_content_start {
        Some(_) => Err("unclosed anchor"),
        None => Ok(()),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // ---- Keyword links ----

    #[test]
    fn test_email_becomes_single_mailto_link() {
        let out = add_clickable_links("contact info@technoservice.ru");
        assert_eq!(
            out,
            "contact <a href=\"mailto:info@technoservice.ru\">info@technoservice.ru</a>"
        );
        assert_eq!(out.matches("mailto:").count(), 1);
    }

    #[test]
    fn test_keyword_preserves_original_casing() {
        let out = add_clickable_links("Напишите МЕНЕДЖЕРУ сегодня");
        assert_eq!(
            out,
            "Напишите <a href=\"https://t.me/manager_technoservice\">МЕНЕДЖЕР</a>У сегодня"
        );
    }

    #[test]
    fn test_company_name_linked_once() {
        let out = add_clickable_links("Компания ООО \"ТехноСервис\" работает с 2010 года.");
        assert_eq!(out.matches("<a href=").count(), 1);
        assert!(out.contains("<a href=\"https://technoservice.ru\">ООО \"ТехноСервис\"</a>"));
    }

    #[test]
    fn test_phone_becomes_tel_link() {
        let out = add_clickable_links("Звоните: +7 (999) 123-45-67.");
        assert_eq!(
            out,
            "Звоните: <a href=\"tel:+79991234567\">+7 (999) 123-45-67</a>."
        );
    }

    #[test]
    fn test_text_without_keywords_unchanged() {
        let text = "Обычный ответ без ссылок.";
        assert_eq!(add_clickable_links(text), text);
        assert_eq!(add_clickable_links(""), "");
    }

    // ---- Bare URLs ----

    #[test]
    fn test_https_url_linked() {
        let out = add_clickable_links("Docs: https://example.com/path?x=1.");
        assert_eq!(
            out,
            "Docs: <a href=\"https://example.com/path?x=1\">https://example.com/path?x=1</a>."
        );
    }

    #[test]
    fn test_www_url_gets_scheme_in_href_only() {
        let out = add_clickable_links("see www.example.org");
        assert_eq!(
            out,
            "see <a href=\"http://www.example.org\">www.example.org</a>"
        );
    }

    #[test]
    fn test_keyword_inside_url_path_keeps_url_whole() {
        let out = add_clickable_links("Страница: https://technoservice.ru/контакты");
        assert_eq!(
            out,
            "Страница: <a href=\"https://technoservice.ru/контакты\">https://technoservice.ru/контакты</a>"
        );
    }

    #[test]
    fn test_keyword_inside_url_host_keeps_url_whole() {
        let out = add_clickable_links("Сайт: https://ТехноСервис.рф/services");
        assert_eq!(
            out,
            "Сайт: <a href=\"https://ТехноСервис.рф/services\">https://ТехноСервис.рф/services</a>"
        );
        assert_eq!(out.matches("<a href=").count(), 1);
    }

    #[test]
    fn test_keyword_next_to_url_still_linked() {
        let out = add_clickable_links("Контакты: www.technoservice.ru/контакты");
        assert_eq!(
            out,
            "<a href=\"https://technoservice.ru/contacts\">Контакты</a>: \
             <a href=\"http://www.technoservice.ru/контакты\">www.technoservice.ru/контакты</a>"
        );
    }

    #[test]
    fn test_link_spans_cover_anchors_and_urls() {
        let text = "a <a href=\"https://x.io\">x</a> b https://y.io c";
        let spans = link_spans(text);
        assert_eq!(spans.len(), 2);
        assert_eq!(&text[spans[0].clone()], "<a href=\"https://x.io\">x</a>");
        assert_eq!(&text[spans[1].clone()], "https://y.io");
    }

    #[test]
    fn test_existing_anchor_not_rewrapped() {
        let text = "Read <a href=\"https://example.com\">https://example.com</a> now";
        assert_eq!(add_clickable_links(text), text);
    }

    #[test]
    fn test_lookback_detects_opening_anchor() {
        let text = "<a href=\"/w\">";
        assert!(preceded_by_anchor(text, text.len()));
        assert!(!preceded_by_anchor("plain text before ", 18));
    }

    #[test]
    fn test_lookback_respects_char_boundaries() {
        let text = "очень длинный русский текст перед ссылкой ";
        assert!(!preceded_by_anchor(text, text.len()));
    }

    // ---- Idempotence ----

    #[test]
    fn test_idempotent_on_own_output() {
        let inputs = [
            "ООО \"ТехноСервис\" делает IT-консалтинг, пишите на info@technoservice.ru",
            "Посетите наш сайт или www.technoservice.ru, контакты там же.",
            "Разработка веб-приложений и мобильных приложений: https://example.com/a",
            "Звоните +7 (999) 123-45-67 или спросите менеджера.",
        ];
        for input in inputs {
            let once = add_clickable_links(input);
            let twice = add_clickable_links(&once);
            assert_eq!(once, twice, "not idempotent for {:?}", input);
        }
    }

    // ---- Validation fallback ----

    #[test]
    fn test_malformed_input_returned_unchanged() {
        let text = "Broken <a href=\"\">link</a> and менеджер";
        assert_eq!(add_clickable_links(text), text);
    }

    #[test]
    fn test_unclosed_anchor_returned_unchanged() {
        let text = "<a href=\"https://x.io\">open forever, контакты";
        assert_eq!(add_clickable_links(text), text);
    }

    #[test]
    fn test_validate_anchors() {
        assert!(validate_anchors("<a href=\"x\">y</a>").is_ok());
        assert!(validate_anchors("no markup").is_ok());
        assert_eq!(validate_anchors("<a href=\"x\"></a>"), Err("anchor without content"));
        assert_eq!(validate_anchors("<a href=\"\">y</a>"), Err("anchor with empty href"));
        assert_eq!(validate_anchors("<a>y</a>"), Err("anchor with empty href"));
        assert_eq!(validate_anchors("y</a>"), Err("closing tag without opening tag"));
        assert_eq!(
            validate_anchors("<a href=\"x\"><a href=\"y\">z</a></a>"),
            Err("nested anchor")
        );
        assert_eq!(validate_anchors("<a href=\"x\">y"), Err("unclosed anchor"));
    }

    // ---- Custom tables ----

    #[test]
    fn test_custom_link_table_order() {
        let formatter =
            ResponseFormatter::with_links([("rust lang", "https://rust-lang.org"), ("rust", "https://crates.io")])
                .unwrap();
        let out = formatter.add_clickable_links("I like Rust Lang and rust");
        assert_eq!(
            out,
            "I like <a href=\"https://rust-lang.org\">Rust Lang</a> and <a href=\"https://crates.io\">rust</a>"
        );
    }

    #[test]
    fn test_new_matches_free_function() {
        let formatter = ResponseFormatter::new();
        let text = "Пишите на info@technoservice.ru";
        assert_eq!(formatter.add_clickable_links(text), add_clickable_links(text));
    }
}
