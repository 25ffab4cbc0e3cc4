use anyhow::{Result, anyhow};
use ego_tree::{NodeId, NodeRef};
use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

/// One best-guess table-of-contents entry. `level` is the nesting depth of
/// the link within its list container (0 for top-level entries).
#[derive(Debug, Clone, PartialEq)]
pub struct TocEntry {
    pub title: String,
    pub url: String,
    pub level: i64,
}

/// A heading found on a single-page work, with the tree handle needed to
/// extract the body text it owns.
#[derive(Debug, Clone)]
pub struct Heading {
    pub title: String,
    pub level: i64,
    node_id: NodeId,
}

/// Minimum list score before a list candidate is accepted as the TOC.
const ACCEPT_SCORE: f64 = 30.0;

/// Link texts that look like site navigation rather than chapter titles.
/// Matched exactly or as "phrase + space" prefix, lowercased.
const NAV_PHRASES: &[&str] = &[
    "home",
    "about",
    "contact",
    "search",
    "help",
    "login",
    "sign in",
    "copyright",
    "next",
    "previous",
    "back",
    "forward",
    "menu",
    "read online",
    "download",
    "listen",
    "formats",
    "summary",
    "popularity",
    "available formats",
    "print",
    "share",
    "cite",
    "subscribe",
    "newsletter",
    "donate",
    "support",
    "privacy",
    "terms of use",
    "feedback",
    "report",
    "settings",
    "profile",
    "log in",
    "log out",
    "sign up",
    "register",
    "cart",
    "shop",
    "buy",
    "purchase",
    "order",
    "browse",
    "catalog",
    "library",
    "all works",
    "all authors",
    "site map",
    "sitemap",
    "faq",
    "mobile",
    "desktop",
    "pdf",
    "epub",
    "kindle",
    "mobi",
    // File format labels common on sites offering multiple download formats.
    "html",
    "xml",
    "read on mobile",
    "microsoft word",
    "unicode text",
    "theological markup",
    "word document",
    "plain text",
    "rich text",
    "open document",
    "postscript",
];

/// URL path extensions that indicate a download rather than a chapter page.
const DOWNLOAD_EXTENSIONS: &[&str] = &[
    ".epub", ".mobi", ".azw", ".azw3", ".pdf", ".doc", ".docx", ".rtf", ".odt", ".txt", ".xml",
    ".thml", ".zip", ".gz", ".tar", ".bz2", ".mp3", ".ogg", ".wav", ".m4a",
];

pub struct StructureDetector {
    lists: Selector,
    anchors: Selector,
    headings: Selector,
    body: Selector,
    title_tag: Selector,
    first_h1: Selector,
}

impl StructureDetector {
    pub fn new() -> Result<Self> {
        Ok(Self {
            lists: parse_selector("ol, ul")?,
            anchors: parse_selector("a[href]")?,
            headings: parse_selector("h1, h2, h3, h4, h5")?,
            body: parse_selector("body")?,
            title_tag: parse_selector("title")?,
            first_h1: parse_selector("h1")?,
        })
    }

    /// Best-guess title of the page: the first `<h1>` when present, otherwise
    /// the `<title>` element.
    pub fn page_title(&self, document: &Html) -> Option<String> {
        let mut title = document
            .select(&self.title_tag)
            .next()
            .map(|element| element_text(element));
        if let Some(h1) = document.select(&self.first_h1).next() {
            title = Some(element_text(h1));
        }
        title.filter(|text| !text.is_empty())
    }

    /// Find the most plausible table of contents on the page.
    ///
    /// Staged: score every list container and accept the best list when its
    /// score clears the threshold; otherwise fall back to all related links;
    /// otherwise to all non-navigation links. An empty result means no usable
    /// structure was found and the caller should try heading detection.
    pub fn detect_toc_links(&self, document: &Html, base_url: &Url) -> Vec<TocEntry> {
        let mut best_entries = Vec::<TocEntry>::new();
        let mut best_score = -1.0_f64;

        for list_element in document.select(&self.lists) {
            let entries = self.extract_entries_from_list(list_element, base_url);
            if entries.len() < 3 {
                continue;
            }
            let score = score_toc_candidate(&entries, base_url);
            if score > best_score {
                best_score = score;
                best_entries = entries;
            }
        }

        if !best_entries.is_empty() && best_score >= ACCEPT_SCORE {
            return best_entries;
        }

        let anchors = self.body_anchors(document);

        // Fallback: every related link on the page, flat.
        let mut related = Vec::<TocEntry>::new();
        for anchor in &anchors {
            let Some(entry) = candidate_entry(anchor, base_url, 3) else {
                continue;
            };
            if let Ok(entry_url) = Url::parse(&entry.url) {
                if url_is_related(&entry_url, base_url) {
                    related.push(entry);
                }
            }
        }
        if related.len() >= 3 {
            return related;
        }

        // Last resort: any non-navigation link, with a longer minimum text
        // length to cut noise.
        let mut fallback = Vec::<TocEntry>::new();
        for anchor in &anchors {
            if let Some(entry) = candidate_entry(anchor, base_url, 5) {
                fallback.push(entry);
            }
        }
        if fallback.len() >= 3 {
            return fallback;
        }

        Vec::new()
    }

    fn extract_entries_from_list(&self, list_element: ElementRef, base_url: &Url) -> Vec<TocEntry> {
        let mut entries = Vec::new();
        for anchor in list_element.select(&self.anchors) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            if href.is_empty() || href.starts_with('#') || href.starts_with("javascript") {
                continue;
            }

            let text = element_text(anchor);
            if text.chars().count() < 3 || is_navigation_text(&text) {
                continue;
            }

            let Ok(full_url) = base_url.join(href) else {
                continue;
            };
            if is_download_url(&full_url) {
                continue;
            }

            // Nesting depth: list containers between this link and the
            // enclosing list.
            let mut depth = 0_i64;
            for ancestor in anchor.ancestors() {
                if ancestor.id() == list_element.id() {
                    break;
                }
                if let Some(element) = ancestor.value().as_element() {
                    if element.name() == "ol" || element.name() == "ul" {
                        depth += 1;
                    }
                }
            }

            entries.push(TocEntry {
                title: text,
                url: full_url.to_string(),
                level: depth,
            });
        }
        entries
    }

    fn body_anchors<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        match document.select(&self.body).next() {
            Some(body) => body.select(&self.anchors).collect(),
            None => document.select(&self.anchors).collect(),
        }
    }

    /// Extract every h1–h5 heading with usable text, in document order.
    pub fn detect_headings(&self, document: &Html) -> Vec<Heading> {
        let mut headings = Vec::new();
        for element in document.select(&self.headings) {
            let name = element.value().name();
            let Ok(level) = name[1..].parse::<i64>() else {
                continue;
            };
            let title = element_text(element);
            if title.chars().count() > 2 {
                headings.push(Heading {
                    title,
                    level,
                    node_id: element.id(),
                });
            }
        }
        headings
    }

    /// The body text a heading owns: everything between it and the next
    /// heading of any level, concatenated with single spaces.
    pub fn section_text(
        &self,
        document: &Html,
        heading: &Heading,
        next_heading: Option<&Heading>,
    ) -> String {
        let Some(start) = document.tree.get(heading.node_id) else {
            return String::new();
        };
        let stop_id = next_heading.map(|next| next.node_id);

        let mut parts = Vec::<String>::new();
        for sibling in start.next_siblings() {
            if Some(sibling.id()) == stop_id {
                break;
            }
            match sibling.value() {
                Node::Element(element) => {
                    if is_heading_name(element.name()) {
                        break;
                    }
                    if let Some(element_ref) = ElementRef::wrap(sibling) {
                        let text = element_text(element_ref);
                        if !text.is_empty() {
                            parts.push(text);
                        }
                    }
                }
                Node::Text(text) => {
                    let trimmed = text.text.trim();
                    if !trimmed.is_empty() {
                        parts.push(trimmed.to_string());
                    }
                }
                _ => {}
            }
        }
        parts.join(" ")
    }

    /// Readable text of the whole page, skipping script, style and chrome
    /// subtrees.
    pub fn page_text(&self, document: &Html) -> String {
        let mut parts = Vec::<String>::new();
        match document.select(&self.body).next() {
            Some(body) => collect_readable_text(*body, &mut parts),
            None => collect_readable_text(document.tree.root(), &mut parts),
        }
        parts.join(" ")
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|err| anyhow!("failed to parse selector {selector:?}: {err}"))
}

fn candidate_entry(anchor: &ElementRef, base_url: &Url, min_text_chars: usize) -> Option<TocEntry> {
    let href = anchor.value().attr("href")?;
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript") {
        return None;
    }

    let text = element_text(*anchor);
    if text.chars().count() <= min_text_chars || is_navigation_text(&text) {
        return None;
    }

    let full_url = base_url.join(href).ok()?;
    if is_download_url(&full_url) {
        return None;
    }

    Some(TocEntry {
        title: text,
        url: full_url.to_string(),
        level: 0,
    })
}

/// Score a candidate list of entries on how likely it is to be the real TOC.
/// The dominant signal is the fraction of entries whose URL belongs to the
/// same work as the page being parsed.
pub fn score_toc_candidate(entries: &[TocEntry], base_url: &Url) -> f64 {
    if entries.len() < 3 {
        return -1.0;
    }

    let mut score = 0.0_f64;

    let related_count = entries
        .iter()
        .filter(|entry| {
            Url::parse(&entry.url)
                .map(|entry_url| url_is_related(&entry_url, base_url))
                .unwrap_or(false)
        })
        .count();
    score += related_count as f64 / entries.len() as f64 * 100.0;

    let mut levels = entries.iter().map(|entry| entry.level).collect::<Vec<i64>>();
    levels.sort_unstable();
    levels.dedup();
    if levels.len() > 1 {
        score += 20.0;
    }

    if (3..=200).contains(&entries.len()) {
        score += 10.0;
    }

    let total_title_chars: usize = entries
        .iter()
        .map(|entry| entry.title.chars().count())
        .sum();
    let avg_title_len = total_title_chars as f64 / entries.len() as f64;
    if avg_title_len < 10.0 {
        score -= 20.0;
    } else if avg_title_len > 15.0 {
        score += 10.0;
    }

    score
}

pub fn is_navigation_text(text: &str) -> bool {
    let text_lower = text.to_lowercase();
    let text_lower = text_lower.trim();

    for phrase in NAV_PHRASES {
        if text_lower == *phrase || text_lower.starts_with(&format!("{phrase} ")) {
            return true;
        }
    }

    text_lower.chars().count() <= 3
}

pub fn is_download_url(url: &Url) -> bool {
    let path = url.path().to_lowercase();
    if DOWNLOAD_EXTENSIONS
        .iter()
        .any(|extension| path.ends_with(extension))
    {
        return true;
    }
    // Download mirrors commonly live under /cache/ directories.
    path.contains("/cache/")
}

/// Whether a link looks like a sub-page of the work at `base_url`: same host,
/// and either sharing the base URL's parent directory or extending its final
/// path segment (e.g. `bondage` -> `bondage.iii.html`).
pub fn url_is_related(link_url: &Url, base_url: &Url) -> bool {
    if link_url.host_str() != base_url.host_str() {
        return false;
    }

    let base_path = base_url.path().trim_end_matches('/');
    let link_path = link_url.path().trim_end_matches('/');

    let base_dir = match base_path.rsplit_once('/') {
        Some((dir, _)) => dir,
        None => "",
    };
    if link_path.starts_with(&format!("{base_dir}/")) {
        return true;
    }

    let base_stem = base_path.rsplit('/').next().unwrap_or("");
    let link_stem = link_path.rsplit('/').next().unwrap_or("");
    !base_stem.is_empty() && link_stem.starts_with(base_stem)
}

fn is_heading_name(name: &str) -> bool {
    let Some(rest) = name.strip_prefix('h') else {
        return false;
    };
    !rest.is_empty() && rest.chars().all(|ch| ch.is_ascii_digit())
}

fn element_text(element: ElementRef) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .collect::<Vec<&str>>()
        .join(" ")
}

fn collect_readable_text(node: NodeRef<'_, Node>, parts: &mut Vec<String>) {
    for child in node.children() {
        match child.value() {
            Node::Element(element) => {
                if matches!(
                    element.name(),
                    "script" | "style" | "nav" | "header" | "footer"
                ) {
                    continue;
                }
                collect_readable_text(child, parts);
            }
            Node::Text(text) => {
                let trimmed = text.text.trim();
                if !trimmed.is_empty() {
                    parts.push(trimmed.to_string());
                }
            }
            _ => {}
        }
    }
}
