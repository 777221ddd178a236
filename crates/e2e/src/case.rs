//! Declarative YAML verification cases

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{E2eError, E2eResult};

/// A group of cases parsed from one YAML file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseFile {
    /// Group name shown in reports
    pub name: String,

    #[serde(default)]
    pub description: String,

    pub cases: Vec<VerificationCase>,
}

/// One input/output check against the translator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationCase {
    /// Unique per run, e.g. `Pos_Fun_0001`
    pub id: String,

    #[serde(default)]
    pub title: String,

    /// Singlish text submitted to the input control
    pub input: String,

    /// Substring the rendered output must contain; unused for clear cases
    #[serde(default)]
    pub expected: String,

    #[serde(default)]
    pub interaction: Interaction,

    /// Fixed settle override in milliseconds
    #[serde(default)]
    pub settle_ms: Option<u64>,

    /// Focus: when any case sets this, only focused cases run
    #[serde(default)]
    pub only: bool,

    #[serde(default)]
    pub skip: bool,
}

/// How the input reaches the text area
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Interaction {
    /// Replace the contents in one atomic fill
    #[default]
    Fill,

    /// Type one character at a time, exercising the live-update path
    Type {
        #[serde(default)]
        delay_ms: Option<u64>,
    },

    /// Fill, then clear the control; the output must end up empty
    Clear,
}

impl Interaction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interaction::Fill => "fill",
            Interaction::Type { .. } => "type",
            Interaction::Clear => "clear",
        }
    }
}

/// Pass condition for the output container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum Expectation {
    Contains(String),
    Empty,
}

impl Expectation {
    /// Whitespace runs are collapsed on both sides before comparing, the
    /// same normalisation browser text assertions apply.
    pub fn is_met(&self, actual: &str) -> bool {
        match self {
            Expectation::Contains(snippet) => {
                normalize_whitespace(actual).contains(&normalize_whitespace(snippet))
            }
            Expectation::Empty => normalize_whitespace(actual).is_empty(),
        }
    }
}

impl std::fmt::Display for Expectation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expectation::Contains(snippet) => write!(f, "to contain {:?}", snippet),
            Expectation::Empty => f.write_str("to be empty"),
        }
    }
}

/// Drop zero-width spaces and soft hyphens, collapse every whitespace run
/// to one space and trim the ends. Joiners used by Sinhala conjuncts stay.
pub fn normalize_whitespace(text: &str) -> String {
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    let re = WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));
    let visible = text.replace(|c: char| c == '\u{200b}' || c == '\u{ad}', "");
    re.replace_all(visible.trim(), " ").into_owned()
}

/// Case category derived from the id prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub polarity: Polarity,
    pub surface: Surface,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Positive,
    /// Golden snapshot of output the translator is known to get wrong
    Negative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Surface {
    Functional,
    Ui,
}

impl Category {
    /// Parse `Pos_Fun_0001` style ids
    pub fn from_id(id: &str) -> Option<Self> {
        let mut parts = id.split('_');
        let polarity = match parts.next()?.to_ascii_lowercase().as_str() {
            "pos" => Polarity::Positive,
            "neg" => Polarity::Negative,
            _ => return None,
        };
        let surface = match parts.next()?.to_ascii_lowercase().as_str() {
            "fun" => Surface::Functional,
            "ui" => Surface::Ui,
            _ => return None,
        };
        Some(Self { polarity, surface })
    }

    /// Match filter words (positive, negative, functional, ui); words joined
    /// with `_` or `,` must all match, so `neg_fun` selects negative functional
    pub fn matches(&self, filter: &str) -> bool {
        let mut words = filter.split(|c| c == '_' || c == ',').map(str::trim).peekable();
        words.peek().is_some() && words.all(|word| self.matches_word(word))
    }

    fn matches_word(&self, word: &str) -> bool {
        match word.to_ascii_lowercase().as_str() {
            "positive" | "pos" => self.polarity == Polarity::Positive,
            "negative" | "neg" => self.polarity == Polarity::Negative,
            "functional" | "fun" => self.surface == Surface::Functional,
            "ui" => self.surface == Surface::Ui,
            _ => false,
        }
    }

    pub fn label(&self) -> &'static str {
        match (self.polarity, self.surface) {
            (Polarity::Positive, Surface::Functional) => "positive functional",
            (Polarity::Negative, Surface::Functional) => "negative functional",
            (Polarity::Positive, Surface::Ui) => "positive ui",
            (Polarity::Negative, Surface::Ui) => "negative ui",
        }
    }
}

impl VerificationCase {
    pub fn expectation(&self) -> Expectation {
        match self.interaction {
            Interaction::Clear => Expectation::Empty,
            _ => Expectation::Contains(self.expected.clone()),
        }
    }

    pub fn category(&self) -> Option<Category> {
        Category::from_id(&self.id)
    }

    fn validate(&self, source: &Path) -> E2eResult<()> {
        if self.id.trim().is_empty() {
            return Err(E2eError::CaseParse(format!("{}: case with empty id", source.display())));
        }
        if self.input.is_empty() {
            return Err(E2eError::CaseParse(format!(
                "{}: case {} has empty input",
                source.display(),
                self.id
            )));
        }
        if self.interaction != Interaction::Clear && self.expected.trim().is_empty() {
            return Err(E2eError::CaseParse(format!(
                "{}: case {} needs a non-empty expected snippet",
                source.display(),
                self.id
            )));
        }
        Ok(())
    }
}

impl CaseFile {
    /// Parse a case file from YAML string
    pub fn from_yaml(yaml: &str) -> E2eResult<Self> {
        serde_yaml::from_str(yaml).map_err(E2eError::from)
    }

    /// Parse a case file from a YAML file
    pub fn from_file(path: &Path) -> E2eResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content).map_err(|e| E2eError::CaseParse(format!("{}: {}", path.display(), e)))
    }
}

/// A case picked for execution, with its position in declaration order
#[derive(Debug, Clone)]
pub struct ScheduledCase {
    pub index: usize,
    pub group: String,
    pub case: VerificationCase,
}

/// Narrowing applied on top of focus and skip flags
#[derive(Debug, Clone, Default)]
pub struct CaseFilter {
    /// Substring of id or title
    pub grep: Option<String>,

    /// Category word, see [`Category::matches`]
    pub category: Option<String>,
}

impl CaseFilter {
    pub fn accepts(&self, case: &VerificationCase) -> bool {
        if let Some(grep) = &self.grep {
            if !case.id.contains(grep.as_str()) && !case.title.contains(grep.as_str()) {
                return false;
            }
        }
        if let Some(category) = &self.category {
            match case.category() {
                Some(c) if c.matches(category) => {}
                _ => return false,
            }
        }
        true
    }
}

/// Every case file in a directory, in path order
#[derive(Debug, Clone, Default)]
pub struct CaseSuite {
    pub files: Vec<(PathBuf, CaseFile)>,
}

impl CaseSuite {
    /// Load all case files from a directory
    pub fn load(dir: &Path) -> E2eResult<Self> {
        if !dir.is_dir() {
            return Err(E2eError::CaseParse(format!("case directory not found: {}", dir.display())));
        }

        let mut files = Vec::new();

        for entry in walkdir::WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
        {
            let file = CaseFile::from_file(entry.path())?;
            debug!("Loaded {} case(s) from {}", file.cases.len(), entry.path().display());
            files.push((entry.path().to_path_buf(), file));
        }

        let suite = Self { files };
        suite.validate()?;
        Ok(suite)
    }

    /// Check per-case fields and id uniqueness across files
    pub fn validate(&self) -> E2eResult<()> {
        let mut seen: HashMap<&str, &Path> = HashMap::new();
        for (path, file) in &self.files {
            for case in &file.cases {
                case.validate(path)?;
                if let Some(first) = seen.insert(case.id.as_str(), path.as_path()) {
                    return Err(E2eError::DuplicateCaseId {
                        id: case.id.clone(),
                        first: first.display().to_string(),
                        second: path.display().to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// All cases in declaration order
    pub fn cases(&self) -> impl Iterator<Item = (&str, &VerificationCase)> {
        self.files
            .iter()
            .flat_map(|(_, file)| file.cases.iter().map(move |c| (file.name.as_str(), c)))
    }

    pub fn len(&self) -> usize {
        self.files.iter().map(|(_, f)| f.cases.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve focus, filters and forbid-only into the execution list.
    ///
    /// Skipped cases stay in the list so reports can show them.
    pub fn schedule(&self, filter: &CaseFilter, forbid_only: bool) -> E2eResult<Vec<ScheduledCase>> {
        let focused: Vec<&VerificationCase> = self.cases().map(|(_, c)| c).filter(|c| c.only).collect();
        if forbid_only {
            if let Some(case) = focused.first() {
                return Err(E2eError::ForbiddenOnly(case.id.clone()));
            }
        }
        let focus = !focused.is_empty();

        Ok(self
            .cases()
            .filter(|(_, c)| !focus || c.only)
            .filter(|(_, c)| filter.accepts(c))
            .enumerate()
            .map(|(index, (group, case))| ScheduledCase {
                index,
                group: group.to_string(),
                case: case.clone(),
            })
            .collect())
    }
}
