use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::HarvestError;

/// Which external source last wrote the catalog; doubles as the sheet name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTag {
    Kaggle,
    Openml,
}

impl SourceTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTag::Kaggle => "kaggle",
            SourceTag::Openml => "openml",
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kaggle dataset reference in `owner/slug` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct KaggleRef {
    owner: String,
    slug: String,
}

impl KaggleRef {
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    /// `owner_slug`, unique per dataset and safe as a file or folder name.
    pub fn file_stem(&self) -> String {
        format!("{}_{}", self.owner, self.slug)
    }
}

impl fmt::Display for KaggleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.slug)
    }
}

impl FromStr for KaggleRef {
    type Err = HarvestError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let (owner, slug) = trimmed
            .split_once('/')
            .ok_or_else(|| HarvestError::InvalidKaggleRef(value.to_string()))?;
        let valid_part = |part: &str| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'))
        };
        if !valid_part(owner) || !valid_part(slug) {
            return Err(HarvestError::InvalidKaggleRef(value.to_string()));
        }
        Ok(Self {
            owner: owner.to_string(),
            slug: slug.to_string(),
        })
    }
}

/// Half-open range of listing pages, `1..5` scans pages 1 through 4.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRange(Range<u32>);

impl PageRange {
    pub fn new(start: u32, end: u32) -> Result<Self, HarvestError> {
        if start == 0 {
            return Err(HarvestError::InvalidRange(format!(
                "{start}..{end}: Kaggle pages start at 1"
            )));
        }
        checked_range(start, end).map(Self)
    }

    /// Only the first listing page.
    pub fn first() -> Self {
        Self(1..2)
    }

    pub fn iter(&self) -> Range<u32> {
        self.0.clone()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for PageRange {
    type Err = HarvestError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let range = parse_range(value)?;
        Self::new(range.start, range.end)
    }
}

/// Half-open range of OpenML dataset ids, visited in ascending order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdRange(Range<u32>);

impl IdRange {
    pub fn new(start: u32, end: u32) -> Result<Self, HarvestError> {
        checked_range(start, end).map(Self)
    }

    pub fn iter(&self) -> Range<u32> {
        self.0.clone()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromStr for IdRange {
    type Err = HarvestError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        parse_range(value).map(Self)
    }
}

fn checked_range(start: u32, end: u32) -> Result<Range<u32>, HarvestError> {
    if start > end {
        return Err(HarvestError::InvalidRange(format!("{start}..{end}")));
    }
    Ok(start..end)
}

/// Accepts `a..b`, `a..=b` and a bare `n` (same as `n..=n`).
pub fn parse_range(value: &str) -> Result<Range<u32>, HarvestError> {
    let invalid = || HarvestError::InvalidRange(value.to_string());
    let trimmed = value.trim();
    let number = |text: &str| text.trim().parse::<u32>().map_err(|_| invalid());

    if let Some((start, end)) = trimmed.split_once("..=") {
        let end = number(end)?.checked_add(1).ok_or_else(invalid)?;
        return checked_range(number(start)?, end);
    }
    if let Some((start, end)) = trimmed.split_once("..") {
        return checked_range(number(start)?, number(end)?);
    }
    let single = number(trimmed)?;
    checked_range(single, single.checked_add(1).ok_or_else(invalid)?)
}
