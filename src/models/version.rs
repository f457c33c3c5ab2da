// Copyright 2024-2026 Vesta Contributors
// SPDX-License-Identifier: Apache-2.0

//! Semantic versions and version range constraints.
//!
//! Versions follow `MAJOR.MINOR.PATCH[-PRERELEASE][+BUILD]`. Ranges are a
//! comma-separated conjunction of comparator clauses such as
//! `>=0.1.0,<0.2.0,!=0.1.3`.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("Malformed version '{input}': {reason}")]
    MalformedVersion { input: String, reason: String },

    #[error("Malformed version range '{input}': {reason}")]
    MalformedRange { input: String, reason: String },
}

impl VersionError {
    fn version(input: &str, reason: impl Into<String>) -> Self {
        Self::MalformedVersion { input: input.to_string(), reason: reason.into() }
    }

    fn range(input: &str, reason: impl Into<String>) -> Self {
        Self::MalformedRange { input: input.to_string(), reason: reason.into() }
    }
}

/// A single dot-separated pre-release identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Identifier {
    Numeric(u64),
    Alpha(String),
}

impl Ord for Identifier {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Numeric(a), Self::Numeric(b)) => a.cmp(b),
            (Self::Numeric(_), Self::Alpha(_)) => Ordering::Less,
            (Self::Alpha(_), Self::Numeric(_)) => Ordering::Greater,
            (Self::Alpha(a), Self::Alpha(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Identifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(n) => write!(f, "{}", n),
            Self::Alpha(s) => f.write_str(s),
        }
    }
}

/// Semantic version.
///
/// Build metadata is preserved for display but does not take part in
/// equality, hashing, or ordering.
#[derive(Debug, Clone)]
pub struct SemVer {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pre: Vec<Identifier>,
    build: Option<String>,
}

impl SemVer {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self { major, minor, patch, pre: Vec::new(), build: None }
    }

    /// Parse a strict `MAJOR.MINOR.PATCH[-PRE][+BUILD]` string.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(VersionError::version(input, "empty version"));
        }

        let (rest, build) = match trimmed.split_once('+') {
            Some((rest, build)) => {
                parse_identifiers(input, build, false)?;
                (rest, Some(build.to_string()))
            }
            None => (trimmed, None),
        };
        let (core, pre) = match rest.split_once('-') {
            Some((core, pre)) => (core, parse_identifiers(input, pre, true)?),
            None => (rest, Vec::new()),
        };

        let parts: Vec<&str> = core.split('.').collect();
        if parts.len() != 3 {
            return Err(VersionError::version(input, "expected MAJOR.MINOR.PATCH"));
        }

        Ok(Self {
            major: parse_numeric(input, parts[0])?,
            minor: parse_numeric(input, parts[1])?,
            patch: parse_numeric(input, parts[2])?,
            pre,
            build,
        })
    }

    /// Parse a possibly partial version (`1`, `1.2`) as used inside ranges.
    /// Missing components are zero-filled.
    fn parse_partial(input: &str) -> Result<Self, VersionError> {
        let dots = input.split(['-', '+']).next().unwrap_or("").matches('.').count();
        match dots {
            0 => Self::parse(&pad_partial(input, ".0.0")),
            1 => Self::parse(&pad_partial(input, ".0")),
            _ => Self::parse(input),
        }
    }

    pub fn is_prerelease(&self) -> bool {
        !self.pre.is_empty()
    }

    /// Pre-release tag as written, e.g. `alpha.1`.
    pub fn prerelease(&self) -> Option<String> {
        if self.pre.is_empty() {
            return None;
        }
        Some(self.pre.iter().map(ToString::to_string).collect::<Vec<_>>().join("."))
    }

    pub fn build(&self) -> Option<&str> {
        self.build.as_deref()
    }
}

/// Insert `suffix` after the numeric core, ahead of any pre-release or
/// build suffix.
fn pad_partial(input: &str, suffix: &str) -> String {
    match input.find(['-', '+']) {
        Some(idx) => format!("{}{}{}", &input[..idx], suffix, &input[idx..]),
        None => format!("{}{}", input, suffix),
    }
}

fn parse_numeric(input: &str, part: &str) -> Result<u64, VersionError> {
    if part.is_empty() {
        return Err(VersionError::version(input, "empty numeric component"));
    }
    if !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(VersionError::version(input, format!("'{}' is not a number", part)));
    }
    if part.len() > 1 && part.starts_with('0') {
        return Err(VersionError::version(input, format!("leading zero in '{}'", part)));
    }
    part.parse::<u64>()
        .map_err(|_| VersionError::version(input, format!("'{}' is out of range", part)))
}

fn parse_identifiers(
    input: &str,
    section: &str,
    numeric_rules: bool,
) -> Result<Vec<Identifier>, VersionError> {
    let mut out = Vec::new();
    for ident in section.split('.') {
        if ident.is_empty() {
            return Err(VersionError::version(input, "empty identifier"));
        }
        if !ident.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
            return Err(VersionError::version(input, format!("invalid identifier '{}'", ident)));
        }
        if numeric_rules && ident.bytes().all(|b| b.is_ascii_digit()) {
            out.push(Identifier::Numeric(parse_numeric(input, ident)?));
        } else {
            out.push(Identifier::Alpha(ident.to_string()));
        }
    }
    Ok(out)
}

impl PartialEq for SemVer {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SemVer {}

impl Hash for SemVer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.major.hash(state);
        self.minor.hash(state);
        self.patch.hash(state);
        self.pre.hash(state);
    }
}

impl Ord for SemVer {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
            .then_with(|| match (self.pre.is_empty(), other.pre.is_empty()) {
                (true, true) => Ordering::Equal,
                // A pre-release sorts below its release.
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => self.pre.cmp(&other.pre),
            })
    }
}

impl PartialOrd for SemVer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = self.prerelease() {
            write!(f, "-{}", pre)?;
        }
        if let Some(build) = &self.build {
            write!(f, "+{}", build)?;
        }
        Ok(())
    }
}

impl FromStr for SemVer {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Comparison operator of a range clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

impl Comparator {
    fn symbol(self) -> &'static str {
        match self {
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Eq => "==",
            Self::Ne => "!=",
        }
    }

    fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
        }
    }
}

/// One `<op><version>` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub op: Comparator,
    pub version: SemVer,
}

impl Clause {
    pub fn matches(&self, version: &SemVer) -> bool {
        self.op.holds(version.cmp(&self.version))
    }
}

/// Conjunction of comparator clauses. An empty clause list matches every
/// version and is written `*`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VersionRange {
    clauses: Vec<Clause>,
}

impl VersionRange {
    /// Range matching every version.
    pub fn any() -> Self {
        Self { clauses: Vec::new() }
    }

    /// Range matching exactly `version`.
    pub fn exact(version: &SemVer) -> Self {
        Self { clauses: vec![Clause { op: Comparator::Eq, version: version.clone() }] }
    }

    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(VersionError::range(input, "empty range"));
        }
        if trimmed == "*" {
            return Ok(Self::any());
        }

        let mut clauses = Vec::new();
        for raw in trimmed.split(',') {
            let clause = raw.trim();
            if clause.is_empty() {
                return Err(VersionError::range(input, "empty clause"));
            }
            clauses.push(parse_clause(input, clause)?);
        }
        Ok(Self { clauses })
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_any(&self) -> bool {
        self.clauses.is_empty()
    }

    /// All clauses must hold.
    pub fn matches(&self, version: &SemVer) -> bool {
        self.clauses.iter().all(|c| c.matches(version))
    }

    /// Highest version from `candidates` satisfying this range.
    pub fn select<'a, I>(&self, candidates: I) -> Option<&'a SemVer>
    where
        I: IntoIterator<Item = &'a SemVer>,
    {
        candidates.into_iter().filter(|v| self.matches(v)).max()
    }
}

fn parse_clause(input: &str, clause: &str) -> Result<Clause, VersionError> {
    const OPERATORS: &[(&str, Comparator)] = &[
        (">=", Comparator::Ge),
        ("<=", Comparator::Le),
        ("==", Comparator::Eq),
        ("!=", Comparator::Ne),
        (">", Comparator::Gt),
        ("<", Comparator::Lt),
        ("=", Comparator::Eq),
    ];

    let (op, rest) = OPERATORS
        .iter()
        .find_map(|(sym, op)| clause.strip_prefix(sym).map(|rest| (*op, rest)))
        .unwrap_or((Comparator::Eq, clause));

    let rest = rest.trim();
    if rest.is_empty() {
        return Err(VersionError::range(input, format!("clause '{}' has no version", clause)));
    }
    let version = SemVer::parse_partial(rest)
        .map_err(|e| VersionError::range(input, e.to_string()))?;
    Ok(Clause { op, version })
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.clauses.is_empty() {
            return f.write_str("*");
        }
        let rendered: Vec<String> = self
            .clauses
            .iter()
            .map(|c| format!("{}{}", c.op.symbol(), c.version))
            .collect();
        f.write_str(&rendered.join(","))
    }
}

impl FromStr for VersionRange {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Whether `version` satisfies every clause of `range`.
pub fn satisfies(version: &SemVer, range: &VersionRange) -> bool {
    range.matches(version)
}
