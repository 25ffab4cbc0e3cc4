use scraper::Html;
use url::Url;

use crate::model::Section;
use crate::topics::{TopicDefinition, TopicIndex};

use super::detect::{
    StructureDetector, is_download_url, is_navigation_text, score_toc_candidate, url_is_related,
};
use super::emit;
use super::hierarchy::organize_hierarchy;

fn base_url() -> Url {
    Url::parse("https://texts.example.org/works/institutes/toc.html").unwrap()
}

fn detector() -> StructureDetector {
    StructureDetector::new().unwrap()
}

#[test]
fn toc_detection_picks_the_related_chapter_list_over_site_navigation() {
    let html = Html::parse_document(
        r#"<html><body>
        <nav><ul>
            <li><a href="/">Home</a></li>
            <li><a href="/about">About</a></li>
            <li><a href="/search">Search</a></li>
        </ul></nav>
        <ul>
            <li><a href="toc.i.html">Of the Knowledge of God the Creator</a></li>
            <li><a href="toc.ii.html">Of the Knowledge of God the Redeemer</a></li>
            <li><a href="toc.iii.html">Of the Mode of Obtaining the Grace of Christ</a></li>
            <li><a href="toc.iv.html">Of the External Means by Which God Invites Us</a></li>
        </ul>
        </body></html>"#,
    );

    let entries = detector().detect_toc_links(&html, &base_url());
    assert_eq!(entries.len(), 4);
    assert_eq!(entries[0].title, "Of the Knowledge of God the Creator");
    assert_eq!(
        entries[0].url,
        "https://texts.example.org/works/institutes/toc.i.html"
    );
    assert!(entries.iter().all(|entry| entry.level == 0));
}

#[test]
fn nested_lists_carry_their_nesting_depth() {
    let html = Html::parse_document(
        r#"<html><body><ul>
            <li><a href="toc.book1.html">Book First of the Institutes</a>
                <ul>
                    <li><a href="toc.ch1.html">Chapter One on True Wisdom</a></li>
                    <li><a href="toc.ch2.html">Chapter Two on Knowing God</a></li>
                </ul>
            </li>
            <li><a href="toc.book2.html">Book Second of the Institutes</a></li>
        </ul></body></html>"#,
    );

    let entries = detector().detect_toc_links(&html, &base_url());
    assert_eq!(entries.len(), 4);
    assert_eq!(entries[0].level, 0);
    assert_eq!(entries[1].level, 1);
    assert_eq!(entries[2].level, 1);
    assert_eq!(entries[3].level, 0);
}

#[test]
fn download_links_and_short_lists_fall_through_to_related_links() {
    // The only list is all downloads, so stage one fails; the related links
    // scattered in the body are picked up by the fallback.
    let html = Html::parse_document(
        r#"<html><body>
        <ul>
            <li><a href="institutes.pdf">Portable Document Format</a></li>
            <li><a href="institutes.epub">Electronic Publication Download</a></li>
            <li><a href="/cache/institutes.txt">Cached Unicode Edition</a></li>
        </ul>
        <p><a href="toc.i.html">The First Book of the Institutes</a></p>
        <p><a href="toc.ii.html">The Second Book of the Institutes</a></p>
        <p><a href="toc.iii.html">The Third Book of the Institutes</a></p>
        </body></html>"#,
    );

    let entries = detector().detect_toc_links(&html, &base_url());
    assert_eq!(entries.len(), 3);
    assert!(entries.iter().all(|entry| entry.url.contains("toc.")));
}

#[test]
fn a_page_with_no_usable_links_yields_no_entries() {
    let html = Html::parse_document(
        r##"<html><body>
        <p><a href="#top">Top</a></p>
        <p><a href="javascript:void(0)">Expand All Sections Here</a></p>
        </body></html>"##,
    );

    assert!(detector().detect_toc_links(&html, &base_url()).is_empty());
}

#[test]
fn heading_detection_extracts_levels_and_owned_text() {
    let html = Html::parse_document(
        r#"<html><body>
        <h1>On the Bondage of the Will</h1>
        <p>Preface text before the first chapter.</p>
        <h2>Chapter One</h2>
        <p>Free will is an empty term.</p>
        <p>Second paragraph of the chapter.</p>
        <h2>Chapter Two</h2>
        <p>On foreknowledge and necessity.</p>
        </body></html>"#,
    );

    let detector = detector();
    let headings = detector.detect_headings(&html);
    assert_eq!(headings.len(), 3);
    assert_eq!(headings[0].level, 1);
    assert_eq!(headings[1].level, 2);
    assert_eq!(headings[1].title, "Chapter One");

    let body = detector.section_text(&html, &headings[1], headings.get(2));
    assert_eq!(
        body,
        "Free will is an empty term. Second paragraph of the chapter."
    );

    // The last heading runs to the end of the document.
    let tail = detector.section_text(&html, &headings[2], None);
    assert_eq!(tail, "On foreknowledge and necessity.");
}

#[test]
fn page_text_skips_script_and_chrome_subtrees() {
    let html = Html::parse_document(
        r#"<html><body>
        <header>Site Header</header>
        <nav>Navigation</nav>
        <script>var x = 1;</script>
        <p>Grace and peace to the reader.</p>
        <footer>Footer</footer>
        </body></html>"#,
    );

    assert_eq!(detector().page_text(&html), "Grace and peace to the reader.");
}

#[test]
fn page_title_prefers_the_first_h1_over_the_title_tag() {
    let html = Html::parse_document(
        "<html><head><title>Site - Institutes</title></head>\
         <body><h1>Institutes of the Christian Religion</h1></body></html>",
    );
    assert_eq!(
        detector().page_title(&html).as_deref(),
        Some("Institutes of the Christian Religion")
    );

    let no_h1 = Html::parse_document(
        "<html><head><title>Site - Institutes</title></head><body></body></html>",
    );
    assert_eq!(
        detector().page_title(&no_h1).as_deref(),
        Some("Site - Institutes")
    );
}

#[test]
fn navigation_text_matches_exact_phrases_and_prefixes() {
    assert!(is_navigation_text("Home"));
    assert!(is_navigation_text("download the full text"));
    assert!(is_navigation_text("ad"));
    assert!(!is_navigation_text("Of the Knowledge of God"));
}

#[test]
fn download_urls_match_extensions_and_cache_paths() {
    let pdf = Url::parse("https://texts.example.org/works/institutes.PDF").unwrap();
    let cache = Url::parse("https://texts.example.org/cache/institutes/toc.html").unwrap();
    let page = Url::parse("https://texts.example.org/works/institutes/toc.i.html").unwrap();

    assert!(is_download_url(&pdf));
    assert!(is_download_url(&cache));
    assert!(!is_download_url(&page));
}

#[test]
fn relatedness_requires_the_same_host_and_a_shared_path() {
    let base = Url::parse("https://texts.example.org/works/bondage").unwrap();

    let sibling = Url::parse("https://texts.example.org/works/bondage.iii.html").unwrap();
    let same_dir = Url::parse("https://texts.example.org/works/other-work.html").unwrap();
    let other_host = Url::parse("https://other.example.org/works/bondage.iii.html").unwrap();

    assert!(url_is_related(&sibling, &base));
    assert!(url_is_related(&same_dir, &base));
    assert!(!url_is_related(&other_host, &base));
}

#[test]
fn scoring_rewards_related_multi_level_lists_of_sane_size() {
    use super::detect::TocEntry;

    let base = base_url();
    let entry = |title: &str, url: &str, level: i64| TocEntry {
        title: title.to_string(),
        url: url.to_string(),
        level,
    };

    let related = vec![
        entry(
            "Of the Knowledge of God the Creator",
            "https://texts.example.org/works/institutes/toc.i.html",
            0,
        ),
        entry(
            "Of the Knowledge of God the Redeemer",
            "https://texts.example.org/works/institutes/toc.ii.html",
            1,
        ),
        entry(
            "Of the Mode of Obtaining Grace",
            "https://texts.example.org/works/institutes/toc.iii.html",
            1,
        ),
    ];
    // 100 related + 20 multi-level + 10 size + 10 long titles.
    assert_eq!(score_toc_candidate(&related, &base), 140.0);

    let unrelated = vec![
        entry("Authors Catalog Page", "https://other.example.org/a", 0),
        entry("Subjects Catalog Page", "https://other.example.org/b", 0),
        entry("Formats Catalog Page", "https://other.example.org/c", 0),
    ];
    // 0 related + 10 size + 10 long titles.
    assert_eq!(score_toc_candidate(&unrelated, &base), 20.0);

    assert_eq!(score_toc_candidate(&related[..2], &base), -1.0);
}

fn section(title: &str, level: i64, content: &str) -> Section {
    Section {
        title: title.to_string(),
        url: format!(
            "https://texts.example.org/works/institutes/{}.html",
            title.to_lowercase().replace(' ', "-")
        ),
        level,
        content: content.to_string(),
    }
}

#[test]
fn structure_generation_assigns_stable_two_level_ids() {
    let sections = vec![
        section("Book First", 0, ""),
        section("Chapter One", 1, "text"),
        section("Chapter Two", 1, "text"),
        section("Book Second", 0, ""),
        section("Chapter Three", 1, "text"),
    ];
    let (level_values, mut tree) = organize_hierarchy(sections);
    let levels = emit::resolve_levels(Some("book,chapter"), level_values.len()).unwrap();
    let structure = emit::generate_structure("institutes-1559", &levels, &mut tree);

    let ids = structure
        .structure
        .nodes
        .iter()
        .map(|node| node.id.as_str())
        .collect::<Vec<&str>>();
    assert_eq!(
        ids,
        vec![
            "institutes1559_1",
            "institutes1559_1_1",
            "institutes1559_1_2",
            "institutes1559_2",
            "institutes1559_2_1",
        ]
    );

    let chapter = &structure.structure.nodes[1];
    assert_eq!(chapter.level, "chapter");
    assert_eq!(chapter.parent.as_deref(), Some("institutes1559_1"));
    assert_eq!(chapter.ordinal, 1);

    // Ids are recorded back on the tree for the other emitters.
    assert_eq!(tree[0].node_id, "institutes1559_1");
    assert_eq!(tree[1].children[0].node_id, "institutes1559_2_1");
}

#[test]
fn titles_document_skips_synthesized_placeholder_parents() {
    let sections = vec![
        section("Orphan Chapter", 1, ""),
        section("Book First", 0, ""),
        section("Chapter One", 1, ""),
    ];
    let (level_values, mut tree) = organize_hierarchy(sections);
    let levels = emit::resolve_levels(None, level_values.len()).unwrap();
    emit::generate_structure("w", &levels, &mut tree);

    let titles = emit::generate_titles("w", &levels, &tree);
    let rendered = serde_yaml::to_string(&titles).unwrap();

    assert!(rendered.contains("Orphan Chapter"));
    assert!(rendered.contains("Book First"));
    assert!(!rendered.contains("(Untitled Section)"));
}

#[test]
fn default_level_names_follow_depth_conventions() {
    let levels = emit::resolve_levels(None, 2).unwrap();
    assert_eq!(levels[0].id, "part");
    assert_eq!(levels[0].ordinal, 1);
    assert_eq!(levels[1].id, "chapter");
    assert_eq!(levels[1].ordinal, 2);

    let named = emit::resolve_levels(Some("Question, Article"), 2).unwrap();
    assert_eq!(named[0].id, "question");
    assert_eq!(named[0].label.get("en").map(String::as_str), Some("Question"));
    assert_eq!(named[1].id, "article");

    // Extra names are trimmed, missing ones padded.
    let trimmed = emit::resolve_levels(Some("book,chapter,article"), 1).unwrap();
    assert_eq!(trimmed.len(), 1);
    let padded = emit::resolve_levels(Some("book"), 2).unwrap();
    assert_eq!(padded[1].id, "chapter");
}

#[test]
fn topic_assignments_skip_roots_without_their_own_content() {
    let definitions = vec![TopicDefinition {
        id: "trinity".to_string(),
        name: "Trinity".to_string(),
        description: "The three persons of the Godhead".to_string(),
        children: Vec::new(),
    }];
    let index = TopicIndex::from_definitions(&definitions).unwrap();

    let sections = vec![
        section("Book on the Trinity", 0, ""),
        section("Chapter One", 1, "The trinity is one godhead in three persons, the trinity."),
    ];
    let (level_values, mut tree) = organize_hierarchy(sections);
    let levels = emit::resolve_levels(None, level_values.len()).unwrap();
    emit::generate_structure("w", &levels, &mut tree);

    let topics = emit::generate_topics("w", &tree, &index);
    assert_eq!(topics.assignments.len(), 1);
    assert_eq!(topics.assignments[0].section_id, "w_1_1");
    assert_eq!(topics.assignments[0].topics, vec!["trinity"]);
}
