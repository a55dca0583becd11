//! Test case discovery from a model corpus directory.
//!
//! Models are named `<title>_src.mdl` / `<title>_tgt.mdl` where the title is
//! a class letter (`L` lightning, `F` full), a kind letter (`A`, `D`, `R`)
//! and a number, e.g. `FR042`.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::domain::{ProblemKind, TestCase};
use crate::error::CorpusError;

fn model_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?P<title>(?P<class>[LF])(?P<kind>[ADR])\d+)_(?P<role>src|tgt)$")
            .expect("static model name pattern")
    })
}

/// Kinds selected for a run, parsed from a letter string such as `"ADR"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindFilter {
    letters: BTreeSet<char>,
}

impl KindFilter {
    /// Every kind.
    pub fn all() -> Self {
        Self {
            letters: ['A', 'D', 'R'].into_iter().collect(),
        }
    }

    pub fn parse(spec: &str) -> Result<Self, CorpusError> {
        let mut letters = BTreeSet::new();
        for c in spec.chars().filter(|c| !c.is_whitespace()) {
            let c = c.to_ascii_uppercase();
            if !matches!(c, 'A' | 'D' | 'R') {
                return Err(CorpusError::UnknownKind(c));
            }
            letters.insert(c);
        }
        Ok(Self { letters })
    }

    pub fn accepts(&self, kind: ProblemKind) -> bool {
        self.letters.contains(&kind.letter())
    }
}

impl Default for KindFilter {
    fn default() -> Self {
        Self::all()
    }
}

fn is_model_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().eq_ignore_ascii_case("mdl"))
        .unwrap_or(false)
}

fn model_stems(corpus_dir: &Path) -> Result<Vec<String>, CorpusError> {
    if !corpus_dir.is_dir() {
        return Err(CorpusError::NotADirectory(corpus_dir.to_path_buf()));
    }
    let mut stems = Vec::new();
    for entry in fs::read_dir(corpus_dir)? {
        let path = entry?.path();
        if !path.is_file() || !is_model_file(&path) {
            continue;
        }
        if let Some(stem) = path.file_stem() {
            stems.push(stem.to_string_lossy().to_string());
        }
    }
    stems.sort();
    Ok(stems)
}

/// Discover the test cases in `corpus_dir`, sorted by title.
///
/// Every kind-required model must exist; a reassembly problem with only a
/// target model is an error rather than a silently skipped case.
pub fn discover(corpus_dir: &Path, filter: &KindFilter) -> Result<Vec<TestCase>, CorpusError> {
    let mut kinds: BTreeMap<String, ProblemKind> = BTreeMap::new();
    for stem in model_stems(corpus_dir)? {
        let Some(caps) = model_name_pattern().captures(&stem) else {
            debug!(file = %stem, "ignoring model with unrecognised name");
            continue;
        };
        let class = caps["class"].chars().next().unwrap_or('F');
        let letter = caps["kind"].chars().next().unwrap_or('A');
        let kind = ProblemKind::from_letters(class, letter).ok_or(CorpusError::UnknownKind(letter))?;
        if filter.accepts(kind) {
            kinds.insert(caps["title"].to_string(), kind);
        }
    }

    let mut cases = Vec::with_capacity(kinds.len());
    for (title, kind) in kinds {
        let src = corpus_dir.join(format!("{title}_src.mdl"));
        let tgt = corpus_dir.join(format!("{title}_tgt.mdl"));

        let source_model = if kind.needs_source() {
            require(&title, kind, "source", &src)?;
            Some(src)
        } else {
            None
        };
        let target_model = if kind.needs_target() {
            require(&title, kind, "target", &tgt)?;
            Some(tgt)
        } else {
            None
        };

        cases.push(TestCase {
            title,
            kind,
            source_model,
            target_model,
        });
    }
    Ok(cases)
}

fn require(title: &str, kind: ProblemKind, role: &'static str, path: &Path) -> Result<(), CorpusError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(CorpusError::MissingModel {
            title: title.to_string(),
            kind: kind.to_string(),
            role,
            path: path.to_path_buf(),
        })
    }
}

/// Distinct titles of every model in `corpus_dir`: the file name up to the
/// first `_`. Used to build ranking rows.
pub fn titles(corpus_dir: &Path) -> Result<Vec<String>, CorpusError> {
    let set: BTreeSet<String> = model_stems(corpus_dir)?
        .into_iter()
        .map(|stem| match stem.split_once('_') {
            Some((title, _)) => title.to_string(),
            None => stem,
        })
        .collect();
    Ok(set.into_iter().collect())
}
