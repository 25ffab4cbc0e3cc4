use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use serde::Serialize;

pub fn now_utc_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn utc_compact_string(ts: DateTime<Utc>) -> String {
    ts.format("%Y%m%dT%H%M%SZ").to_string()
}

pub fn ensure_directory(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("failed to create directory: {}", path.display()))
}

pub fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }

    let data = serde_json::to_vec_pretty(value)
        .with_context(|| format!("failed to serialize json: {}", path.display()))?;

    let mut file = File::create(path)
        .with_context(|| format!("failed to create json file: {}", path.display()))?;
    file.write_all(&data)
        .with_context(|| format!("failed to write json file: {}", path.display()))?;
    file.write_all(b"\n")
        .with_context(|| format!("failed to finalize json file: {}", path.display()))?;

    Ok(())
}

pub fn write_yaml_file<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }

    let data = serde_yaml::to_string(value)
        .with_context(|| format!("failed to serialize yaml: {}", path.display()))?;

    fs::write(path, data).with_context(|| format!("failed to write yaml file: {}", path.display()))
}

pub fn write_text_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_directory(parent)?;
    }

    fs::write(path, contents)
        .with_context(|| format!("failed to write file: {}", path.display()))
}

/// Kebab-case slug for ids derived from human input: `Summa Theologiae`
/// becomes `summa-theologiae`.
pub fn slugify(input: &str) -> Result<String> {
    let pattern = Regex::new(r"[^a-z0-9]+").context("failed to compile slug regex")?;
    let lowered = input.to_lowercase();
    let replaced = pattern.replace_all(&lowered, "-");
    Ok(replaced.trim_matches('-').to_string())
}

/// Capitalize the first letter of each whitespace-delimited word.
pub fn title_case(input: &str) -> String {
    input
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Truncate to the first `limit` whitespace-delimited words, joined by single
/// spaces. Returns the word count actually seen.
pub fn truncate_words(text: &str, limit: usize) -> (String, usize) {
    let words = text.split_whitespace().collect::<Vec<&str>>();
    let total = words.len();
    if total <= limit {
        return (words.join(" "), total);
    }
    (words[..limit].join(" "), total)
}
