pub mod loader;

use std::sync::OnceLock;

use regex::bytes::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanError};

/// A declarative test case: one request template plus the rules that decide
/// whether the response indicates a vulnerability.
///
/// Modules are validated once on load and shared read-only between workers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    /// Source identifier, usually the path of the file the module came from.
    #[serde(skip)]
    pub file: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub request: RequestTemplate,
    #[serde(default)]
    pub response: ResponseSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestTemplate {
    pub method: String,
    pub path: String,
    pub paths: Vec<String>,
    pub body: String,
    /// Raw `"Key: Value"` lines, parsed when the request is built.
    pub headers: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResponseSpec {
    pub matches: Vec<MatchRule>,
    pub must_not_match: Vec<MatchRule>,
    pub matches_required: usize,
}

/// One response check. `required` only has meaning on positive rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRule {
    #[serde(flatten)]
    pub kind: MatchKind,
    #[serde(default)]
    pub required: bool,
    /// Pattern compiled on first evaluation, or the compile error.
    #[serde(skip)]
    pub(crate) compiled: OnceLock<std::result::Result<Regex, String>>,
}

impl PartialEq for MatchRule {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.required == other.required
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MatchKind {
    /// Literal substring of the body.
    Static {
        #[serde(default)]
        pattern: String,
    },
    /// Regular expression over the body.
    Regex {
        #[serde(default)]
        pattern: String,
    },
    /// Exact status code.
    Status {
        #[serde(default)]
        code: u16,
    },
    /// Regular expression over the value of the named response header.
    Header {
        #[serde(default)]
        name: String,
        #[serde(default)]
        pattern: String,
    },
}

impl MatchRule {
    pub fn new(kind: MatchKind) -> Self {
        Self {
            kind,
            required: false,
            compiled: OnceLock::new(),
        }
    }

    pub fn required(kind: MatchKind) -> Self {
        Self {
            required: true,
            ..Self::new(kind)
        }
    }
}

impl Module {
    /// Parses a module from its JSON text and validates it.
    pub fn from_json(file: &str, data: &str) -> Result<Self> {
        let module: Module = serde_json::from_str(data)
            .map_err(|e| ScanError::validation(file, e.to_string()))?;
        module.validate(file)
    }

    /// Checks the structural invariants and fills in defaults.
    ///
    /// A module needs at least one path and at least one positive match;
    /// an empty name falls back to `file` and a zero `matchesRequired`
    /// becomes 1.
    pub fn validate(mut self, file: &str) -> Result<Self> {
        self.file = file.to_string();
        if self.name.is_empty() {
            self.name = self.file.clone();
        }

        if self.request.path.is_empty() && self.request.paths.is_empty() {
            return Err(ScanError::validation(
                file,
                "module must specify request.path, or request.paths",
            ));
        }

        if self.response.matches.is_empty() {
            return Err(ScanError::validation(file, "module must have at least one match"));
        }

        if self.response.matches_required == 0 {
            self.response.matches_required = 1;
        }

        Ok(self)
    }

    /// Paths to request, in order. `paths` wins over `path` when non-empty.
    pub fn paths(&self) -> Vec<&str> {
        if self.request.paths.is_empty() {
            vec![self.request.path.as_str()]
        } else {
            self.request.paths.iter().map(String::as_str).collect()
        }
    }
}
