//! Lint for configuration snippets in markdown documentation.
//!
//! Every fenced block tagged `toml` must parse as TOML and deserialize as a
//! configuration document.

use crate::config::ConfigFile;
use crate::error::{Error, Result};
use fancy_regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

// A fence line: up to any indent, ``` or ~~~ (3+), then the info string.
// Deeper indents are accepted so fences nested in list items are found.
static FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^( *)(`{3,}|~{3,})[ \t]*(.*?)[ \t]*$").expect("fence regex is valid")
});

#[derive(Debug, Clone, Serialize)]
pub struct TomlBlock {
    pub path: PathBuf,
    /// 1-based line of the opening fence.
    pub line: usize,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LintFailure {
    pub path: PathBuf,
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for LintFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}: {}", self.path.display(), self.line, self.message)
    }
}

#[derive(Debug, Default, Serialize)]
pub struct LintReport {
    pub files: usize,
    pub blocks: usize,
    pub failures: Vec<LintFailure>,
}

impl LintReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

struct Fence<'a> {
    indent: usize,
    marker: char,
    len: usize,
    lang: &'a str,
}

impl<'a> Fence<'a> {
    fn open(path: &Path, line: &'a str) -> Result<Option<Self>> {
        let caps = FENCE
            .captures(line)
            .map_err(|e| Error::parse(format!("{}: {e}", path.display())))?;
        let Some(caps) = caps else {
            return Ok(None);
        };
        let (Some(indent), Some(run), Some(info)) = (caps.get(1), caps.get(2), caps.get(3)) else {
            return Ok(None);
        };
        let marker = if run.as_str().starts_with('`') { '`' } else { '~' };
        // Backtick fences cannot carry backticks in the info string.
        if marker == '`' && info.as_str().contains('`') {
            return Ok(None);
        }
        let info = &line[info.start()..info.end()];
        let lang = info
            .split(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_'))
            .next()
            .unwrap_or_default();
        Ok(Some(Self {
            indent: indent.as_str().len(),
            marker,
            len: run.as_str().len(),
            lang,
        }))
    }

    /// Same marker, at least as long, nothing but whitespace after it.
    fn closes(&self, line: &str) -> bool {
        let rest = line.trim_start_matches(' ');
        let run = rest.chars().take_while(|&c| c == self.marker).count();
        run >= self.len && rest[run..].trim().is_empty()
    }

    fn strip_indent<'l>(&self, line: &'l str) -> &'l str {
        let leading = line.len() - line.trim_start_matches(' ').len();
        &line[leading.min(self.indent)..]
    }
}

/// Fenced blocks tagged `toml`. Lines may end in `\n` or `\r\n`; a fence
/// left open runs to the end of the document.
pub fn extract_toml_blocks(path: &Path, markdown: &str) -> Result<Vec<TomlBlock>> {
    let mut blocks = Vec::new();
    let mut lines = markdown.lines().enumerate();
    while let Some((idx, line)) = lines.next() {
        let Some(fence) = Fence::open(path, line)? else {
            continue;
        };
        let mut content = String::new();
        let mut closed = false;
        for (_, body) in lines.by_ref() {
            if fence.closes(body) {
                closed = true;
                break;
            }
            content.push_str(fence.strip_indent(body));
            content.push('\n');
        }
        if !closed {
            warn!(path = %path.display(), line = idx + 1, "code fence is never closed");
        }
        if fence.lang == "toml" {
            blocks.push(TomlBlock {
                path: path.to_path_buf(),
                line: idx + 1,
                content,
            });
        }
    }
    Ok(blocks)
}

pub fn check_block(block: &TomlBlock) -> Option<LintFailure> {
    let failure = |message: String| LintFailure {
        path: block.path.clone(),
        line: block.line,
        message,
    };
    let table = match block.content.parse::<toml::Table>() {
        Ok(t) => t,
        Err(e) => return Some(failure(format!("invalid TOML: {}", e.message()))),
    };
    match ConfigFile::from_table(table, &[]) {
        Ok(_) => None,
        Err(e) => Some(failure(e.to_string())),
    }
}

/// Lint a markdown file, or every `*.md` file under a directory.
pub fn lint_docs(root: &Path) -> Result<LintReport> {
    let mut report = LintReport::default();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != "md") {
            continue;
        }
        let markdown = std::fs::read_to_string(path)?;
        report.files += 1;
        let blocks = match extract_toml_blocks(path, &markdown) {
            Ok(blocks) => blocks,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not scan markdown");
                report.failures.push(LintFailure {
                    path: path.to_path_buf(),
                    line: 1,
                    message: e.to_string(),
                });
                continue;
            }
        };
        debug!(path = %path.display(), blocks = blocks.len(), "scanned markdown");
        report.blocks += blocks.len();
        report.failures.extend(blocks.iter().filter_map(check_block));
    }
    info!(
        files = report.files,
        blocks = report.blocks,
        failures = report.failures.len(),
        "docs lint complete"
    );
    Ok(report)
}
