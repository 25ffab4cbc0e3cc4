use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "syntopticon",
    version,
    about = "Parse hosted theological texts into Syntopticon structure, title, link and topic data"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch a work's page, detect its structure and emit the YAML data files
    Parse(ParseArgs),
    /// Import a pre-leveled structure CSV and emit per-work YAML files
    Import(ImportArgs),
    /// Convert a numeric-hierarchy sections CSV into per-work YAML snippets
    Sections(SectionsArgs),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum DetectMode {
    Toc,
    Headings,
}

impl DetectMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Toc => "toc",
            Self::Headings => "headings",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ParseArgs {
    /// URL of the work's table-of-contents or full-text page
    pub url: String,

    #[arg(long, default_value = "_data")]
    pub data_dir: PathBuf,

    #[arg(long, default_value = "_works")]
    pub works_collection_dir: PathBuf,

    #[arg(long)]
    pub topics_definitions_path: Option<PathBuf>,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    // Work metadata
    #[arg(long)]
    pub work_id: String,

    #[arg(long)]
    pub title: String,

    #[arg(long)]
    pub short_title: Option<String>,

    #[arg(long)]
    pub year: Option<i64>,

    #[arg(long, default_value = "la")]
    pub original_lang: String,

    // Author
    #[arg(long)]
    pub author_id: String,

    #[arg(long)]
    pub author_name: Option<String>,

    #[arg(long)]
    pub author_short_name: Option<String>,

    #[arg(long)]
    pub author_tradition: Option<String>,

    // Edition
    #[arg(long)]
    pub site_name: Option<String>,

    #[arg(long)]
    pub edition_id: Option<String>,

    #[arg(long, default_value = "en")]
    pub edition_lang: String,

    #[arg(long)]
    pub translator: Option<String>,

    #[arg(long)]
    pub edition_year: Option<i64>,

    // Structure
    /// Comma-separated hierarchy level names, outermost first (e.g. "book,chapter")
    #[arg(long)]
    pub levels: Option<String>,

    #[arg(long, value_enum)]
    pub mode: Option<DetectMode>,

    /// Skip fetching section pages (faster, but no topic evidence from bodies)
    #[arg(long, default_value_t = false)]
    pub no_fetch_content: bool,

    /// Politeness delay between successive section fetches
    #[arg(long, default_value_t = 1000)]
    pub fetch_delay_ms: u64,
}

#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    /// Structure CSV with work_id, node_id, parent_id, level_id, ordinal,
    /// lang, title, site and url columns
    pub csv_path: PathBuf,

    #[arg(long, default_value = "data")]
    pub out_dir: PathBuf,

    /// Print the validated tree of each work to stdout
    #[arg(long, default_value_t = false)]
    pub print_tree: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SectionsArgs {
    /// Sections CSV with work-id, section_num, page_url, section_title and
    /// section_url columns
    pub csv_path: PathBuf,

    #[arg(long, default_value = "works")]
    pub works_dir: PathBuf,

    /// Output filename suffix appended to each work id
    #[arg(long, default_value = ".sections.yaml")]
    pub suffix: String,
}
