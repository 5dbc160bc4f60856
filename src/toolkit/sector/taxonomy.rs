

use std::fmt;

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

pub const AGNOSTIC: &str = "AGNOSTIC";

lazy_static! {
    
    static ref SECTOR_LETTER: Regex = Regex::new(r"\b([a-u])(\d|\b)").expect("valid regex");
    static ref DOT_SPACE: Regex = Regex::new(r"\.\s+").expect("valid regex");
    static ref CODE: Regex = Regex::new(r"[A-U]\d{1,2}(?:\.\d{1,2}){0,2}").expect("valid regex");
    static ref CODE_EXACT: Regex = Regex::new(r"^[A-U]\d{1,2}(?:\.\d{1,2}){0,2}$").expect("valid regex");
}

/// NACE-style sector code, or the agnostic sentinel when none could be read.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum TaxonomyCode {
    Code(String),
    Agnostic,
}

impl TaxonomyCode {
    /// Accepts a complete code (`B06.1`) or the sentinel; anything else is `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case(AGNOSTIC) {
            Some(Self::Agnostic)
        } else if CODE_EXACT.is_match(raw) {
            Some(Self::Code(raw.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Code(code) => code,
            Self::Agnostic => AGNOSTIC,
        }
    }

    pub fn is_agnostic(&self) -> bool {
        matches!(self, Self::Agnostic)
    }

    /// Section letter, e.g. `B` for `B06.1`.
    pub fn section(&self) -> Option<char> {
        match self {
            Self::Code(code) => code.chars().next(),
            Self::Agnostic => None,
        }
    }
}

impl fmt::Display for TaxonomyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<TaxonomyCode> for String {
    fn from(code: TaxonomyCode) -> Self {
        code.as_str().to_string()
    }
}

impl TryFrom<String> for TaxonomyCode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("not a taxonomy code: {value}"))
    }
}

/// Repairs common formatting drift in model replies: lowercase sector letters
/// standing alone or prefixing the digits are uppercased, and `". "` collapses to `"."`.
pub fn normalize_reply(reply: &str) -> String {
    let uppercased = SECTOR_LETTER.replace_all(reply, |caps: &Captures| {
        format!("{}{}", caps[1].to_ascii_uppercase(), &caps[2])
    });
    DOT_SPACE.replace_all(&uppercased, ".").into_owned()
}

/// First code-shaped substring of an already normalized reply.
pub fn extract_code(normalized: &str) -> Option<TaxonomyCode> {
    CODE.find(normalized)
        .map(|m| TaxonomyCode::Code(m.as_str().to_string()))
}

/// Normalizes then extracts; no match yields the agnostic sentinel.
pub fn code_from_reply(reply: &str) -> TaxonomyCode {
    extract_code(&normalize_reply(reply)).unwrap_or(TaxonomyCode::Agnostic)
}
