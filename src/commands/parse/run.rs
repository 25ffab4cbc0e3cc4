use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::{info, warn};
use url::Url;

use crate::cli::{DetectMode, ParseArgs};
use crate::model::{
    AuthorRecord, AuthorsDocument, EditionConfig, ParseCounts, ParseRunManifest, Section,
    WorkConfig,
};
use crate::topics::{TopicIndex, TopicsDocument as TopicDefinitionsDocument};
use crate::util::{
    now_utc_string, slugify, truncate_words, utc_compact_string, write_json_pretty, write_text_file,
    write_yaml_file,
};

use super::detect::StructureDetector;
use super::emit;
use super::fetch::PageFetcher;
use super::hierarchy::organize_hierarchy;

const MAX_SECTION_WORDS: usize = 5000;

pub fn run(args: ParseArgs) -> Result<()> {
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(Utc::now()));
    let mut counts = ParseCounts::default();
    let mut warnings = Vec::<String>::new();

    let source_url =
        Url::parse(&args.url).with_context(|| format!("invalid source url: {}", args.url))?;

    let topic_index = load_topic_index(&args, &mut warnings)?;
    info!(
        topics = topic_index.topic_count(),
        keywords = topic_index.keyword_count(),
        "topic index ready"
    );

    let detector = StructureDetector::new()?;
    let fetcher = PageFetcher::new(args.fetch_delay_ms)?;

    info!(url = %source_url, "fetching work page");
    let page = fetcher.fetch(source_url.as_str())?;
    let base_url = page.final_url.clone();

    let page_title = detector
        .page_title(&page.document)
        .unwrap_or_else(|| args.title.clone());
    info!(title = %page_title, "page fetched");

    let toc_entries = detector.detect_toc_links(&page.document, &base_url);
    let headings = detector.detect_headings(&page.document);
    counts.toc_entries = toc_entries.len();
    counts.headings = headings.len();
    info!(
        toc_entries = toc_entries.len(),
        headings = headings.len(),
        "structure detection finished"
    );

    let mode = match args.mode {
        Some(mode) => mode,
        None if toc_entries.len() >= 3 => DetectMode::Toc,
        None if headings.len() >= 3 => DetectMode::Headings,
        None => bail!(
            "no usable structure found at {source_url}: {} table-of-contents links and {} headings",
            toc_entries.len(),
            headings.len()
        ),
    };
    info!(mode = mode.as_str(), "using detection mode");

    let sections = match mode {
        DetectMode::Toc => {
            if toc_entries.is_empty() {
                bail!("table-of-contents mode selected but no entries were detected");
            }
            let mut sections = Vec::<Section>::with_capacity(toc_entries.len());
            for (index, entry) in toc_entries.iter().enumerate() {
                let mut content = String::new();
                if !args.no_fetch_content {
                    if index > 0 {
                        fetcher.polite_pause();
                    }
                    match fetcher.fetch(&entry.url) {
                        Ok(section_page) => {
                            let text = detector.page_text(&section_page.document);
                            let (truncated, total) = truncate_words(&text, MAX_SECTION_WORDS);
                            if total > MAX_SECTION_WORDS {
                                info!(url = %entry.url, words = total, "truncated section body");
                            }
                            content = truncated;
                            counts.sections_fetched += 1;
                        }
                        Err(err) => {
                            counts.fetch_failures += 1;
                            warn!(url = %entry.url, error = %err, "section fetch failed");
                            warnings.push(format!("fetch failed for {}: {err}", entry.url));
                        }
                    }
                }
                sections.push(Section {
                    title: entry.title.clone(),
                    url: entry.url.clone(),
                    level: entry.level,
                    content,
                });
            }
            sections
        }
        DetectMode::Headings => {
            if headings.is_empty() {
                bail!("heading mode selected but no headings were detected");
            }
            let mut sections = Vec::<Section>::with_capacity(headings.len());
            for (index, heading) in headings.iter().enumerate() {
                let text = detector.section_text(&page.document, heading, headings.get(index + 1));
                let (content, _) = truncate_words(&text, MAX_SECTION_WORDS);
                sections.push(Section {
                    title: heading.title.clone(),
                    url: String::new(),
                    level: heading.level,
                    content,
                });
            }
            sections
        }
    };
    counts.sections_total = sections.len();

    let (level_values, mut tree) = organize_hierarchy(sections);
    counts.level_count = level_values.len();
    counts.top_level_sections = tree.len();
    counts.sub_sections = tree.iter().map(|item| item.children.len()).sum();
    info!(
        levels = level_values.len(),
        roots = tree.len(),
        children = counts.sub_sections,
        "hierarchy organized"
    );

    let levels = emit::resolve_levels(args.levels.as_deref(), level_values.len().max(1))?;
    let work = resolve_work(&args)?;
    let edition = resolve_edition(&args, &base_url)?;

    let structure = emit::generate_structure(&work.id, &levels, &mut tree);
    let titles = emit::generate_titles(&work.id, &levels, &tree);
    let links = emit::generate_links(&work.id, &edition, &tree);
    let topics = emit::generate_topics(&work.id, &tree, &topic_index);
    counts.topic_assignments = topics.assignments.len();

    let author_id = resolve_author(&args, &args.data_dir.join("authors.yaml"))?;
    let work_doc = emit::generate_work(&work, &author_id, &edition);

    write_yaml_file(
        &args.data_dir.join("structures").join(yaml_name(&work.id)),
        &structure,
    )?;
    counts.files_written += 1;

    write_yaml_file(
        &args.data_dir.join("titles").join(yaml_name(&work.id)),
        &titles,
    )?;
    counts.files_written += 1;

    write_yaml_file(
        &args.data_dir.join("links").join(yaml_name(&work.id)),
        &links,
    )?;
    counts.files_written += 1;

    if topics.assignments.is_empty() {
        warn!(work = %work.id, "no topic assignments produced");
        warnings.push("no topic assignments produced".to_string());
    } else {
        write_yaml_file(
            &args.data_dir.join("topics").join(yaml_name(&work.id)),
            &topics,
        )?;
        counts.files_written += 1;
    }

    write_yaml_file(
        &args.data_dir.join("works").join(yaml_name(&work.id)),
        &work_doc,
    )?;
    counts.files_written += 1;

    let stub_path = args.works_collection_dir.join(format!("{}.md", work.id));
    write_text_file(
        &stub_path,
        &format!("---\nlayout: work\nwork_id: {}\n---\n", work.id),
    )?;
    counts.files_written += 1;

    let manifest = ParseRunManifest {
        manifest_version: 1,
        run_id: run_id.clone(),
        work_id: work.id.clone(),
        source_url: source_url.to_string(),
        mode: mode.as_str().to_string(),
        status: "completed".to_string(),
        started_at,
        updated_at: now_utc_string(),
        counts: counts.clone(),
        warnings,
    };
    let manifest_path = args
        .manifest_path
        .clone()
        .unwrap_or_else(|| args.data_dir.join("runs").join(format!("{run_id}.json")));
    write_json_pretty(&manifest_path, &manifest)?;

    info!(
        work = %work.id,
        sections = counts.sections_total,
        assignments = counts.topic_assignments,
        files = counts.files_written,
        manifest = %manifest_path.display(),
        "parse completed"
    );

    Ok(())
}

fn yaml_name(work_id: &str) -> String {
    format!("{work_id}.yaml")
}

fn default_definitions_path(data_dir: &Path) -> PathBuf {
    data_dir.join("topics_definitions.yaml")
}

fn load_topic_index(args: &ParseArgs, warnings: &mut Vec<String>) -> Result<TopicIndex> {
    let path = args
        .topics_definitions_path
        .clone()
        .unwrap_or_else(|| default_definitions_path(&args.data_dir));

    if !path.exists() {
        warn!(path = %path.display(), "topic definitions not found; skipping classification");
        warnings.push(format!("topic definitions not found: {}", path.display()));
        return TopicIndex::from_definitions(&[]);
    }

    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read topic definitions: {}", path.display()))?;
    let document: TopicDefinitionsDocument = serde_yaml::from_str(&raw)
        .with_context(|| format!("failed to parse topic definitions: {}", path.display()))?;

    TopicIndex::from_definitions(&document.topics)
}

fn resolve_work(args: &ParseArgs) -> Result<WorkConfig> {
    let id = slugify(&args.work_id)?;
    if id.is_empty() {
        bail!("work id {:?} reduces to an empty slug", args.work_id);
    }

    Ok(WorkConfig {
        id,
        title: args.title.clone(),
        short_title: args
            .short_title
            .clone()
            .unwrap_or_else(|| args.title.clone()),
        year: args.year,
        original_lang: args.original_lang.clone(),
    })
}

fn resolve_edition(args: &ParseArgs, base_url: &Url) -> Result<EditionConfig> {
    let host = base_url.host_str().unwrap_or("source").to_string();
    let site_name = args.site_name.clone().unwrap_or(host);
    let edition_id = match &args.edition_id {
        Some(id) => slugify(id)?,
        None => slugify(&format!("{site_name}-{}", args.edition_lang))?,
    };

    let mut url_base = base_url.clone();
    url_base.set_path("/");
    url_base.set_query(None);
    url_base.set_fragment(None);

    Ok(EditionConfig {
        site_name: slugify(&site_name)?,
        edition_id,
        edition_lang: args.edition_lang.clone(),
        translator: args.translator.clone().unwrap_or_default(),
        edition_year: args.edition_year,
        url_base: url_base.to_string(),
    })
}

/// Resolve the author against the shared registry, appending a new record
/// when the id is unknown. Returns the registry id the work should reference.
fn resolve_author(args: &ParseArgs, authors_path: &Path) -> Result<String> {
    let author_id = slugify(&args.author_id)?;
    if author_id.is_empty() {
        bail!("author id {:?} reduces to an empty slug", args.author_id);
    }

    let mut registry = load_authors(authors_path)?;
    if registry
        .authors
        .iter()
        .any(|record| record.id == author_id)
    {
        info!(author = %author_id, "author already registered");
        return Ok(author_id);
    }

    let name = args
        .author_name
        .clone()
        .unwrap_or_else(|| args.author_id.clone());
    let record = AuthorRecord {
        id: author_id.clone(),
        name: std::iter::once(("en".to_string(), name.clone())).collect(),
        short_name: args.author_short_name.clone().unwrap_or(name),
        tradition: args.author_tradition.clone().unwrap_or_default(),
    };
    registry.authors.push(record);
    write_yaml_file(authors_path, &registry)?;
    info!(author = %author_id, path = %authors_path.display(), "registered new author");

    Ok(author_id)
}

fn load_authors(path: &Path) -> Result<AuthorsDocument> {
    if !path.exists() {
        return Ok(AuthorsDocument::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read author registry: {}", path.display()))?;
    serde_yaml::from_str(&raw)
        .with_context(|| format!("failed to parse author registry: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> ParseArgs {
        ParseArgs {
            url: "https://texts.example.org/works/institutes/toc.html".to_string(),
            data_dir: PathBuf::from("_data"),
            works_collection_dir: PathBuf::from("_works"),
            topics_definitions_path: None,
            manifest_path: None,
            work_id: "Institutes (1559)".to_string(),
            title: "Institutes of the Christian Religion".to_string(),
            short_title: None,
            year: Some(1559),
            original_lang: "la".to_string(),
            author_id: "John Calvin".to_string(),
            author_name: None,
            author_short_name: None,
            author_tradition: None,
            site_name: None,
            edition_id: None,
            edition_lang: "en".to_string(),
            translator: None,
            edition_year: None,
            levels: None,
            mode: None,
            no_fetch_content: true,
            fetch_delay_ms: 0,
        }
    }

    #[test]
    fn topic_definitions_default_to_the_data_dir_file() {
        assert_eq!(
            default_definitions_path(Path::new("_data")),
            PathBuf::from("_data/topics_definitions.yaml")
        );
    }

    #[test]
    fn work_config_slugs_the_id_and_defaults_the_short_title() {
        let work = resolve_work(&base_args()).unwrap();
        assert_eq!(work.id, "institutes-1559");
        assert_eq!(work.short_title, "Institutes of the Christian Religion");
        assert_eq!(work.year, Some(1559));
    }

    #[test]
    fn edition_defaults_derive_from_the_source_host() {
        let args = base_args();
        let base_url = Url::parse(&args.url).unwrap();
        let edition = resolve_edition(&args, &base_url).unwrap();

        assert_eq!(edition.site_name, "texts-example-org");
        assert_eq!(edition.edition_id, "texts-example-org-en");
        assert_eq!(edition.url_base, "https://texts.example.org/");
    }

    #[test]
    fn explicit_edition_id_wins_over_the_derived_one() {
        let mut args = base_args();
        args.edition_id = Some("Beveridge 1845".to_string());
        let base_url = Url::parse(&args.url).unwrap();
        let edition = resolve_edition(&args, &base_url).unwrap();

        assert_eq!(edition.edition_id, "beveridge-1845");
    }
}
