use std::collections::HashSet;
use std::fmt;

/// A package reference extracted from a script's comment directives.
///
/// The version is optional; versionless references are bound to the latest
/// published version before resolution starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRef {
    pub id: String,
    pub version: Option<String>,
}

impl PackageRef {
    pub fn new(id: impl Into<String>, version: Option<String>) -> Self {
        Self { id: id.into(), version }
    }
}

impl fmt::Display for PackageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}@{}", self.id, version),
            None => write!(f, "{}", self.id),
        }
    }
}

const DIRECTIVE_KEYWORDS: [&str; 2] = ["#nuget:", "#package:"];

/// Scans C# source text for `// #nuget: Id[@Version]` and
/// `// #package: Id[@Version]` comment directives.
///
/// Keywords are matched case-insensitively. References are returned in
/// first-seen order with duplicates (case-insensitive on both id and
/// version) removed. Id and version syntax is not validated here.
pub fn parse_directives(source: &str) -> Vec<PackageRef> {
    let mut seen = HashSet::new();
    let mut refs = Vec::new();

    for line in source.lines() {
        let Some(comment_start) = line.find("//") else {
            continue;
        };
        let comment = line[comment_start + 2..].trim();

        let Some(rest) = DIRECTIVE_KEYWORDS
            .iter()
            .find_map(|keyword| strip_prefix_ignore_case(comment, keyword))
        else {
            continue;
        };

        let Some(token) = rest.split_whitespace().next() else {
            continue;
        };

        let (id, version) = match token.split_once('@') {
            Some((id, version)) if !version.is_empty() => (id, Some(version.to_string())),
            Some((id, _)) => (id, None),
            None => (token, None),
        };
        if id.is_empty() {
            continue;
        }

        let key = format!(
            "{}@{}",
            id.to_lowercase(),
            version.as_deref().unwrap_or("").to_lowercase()
        );
        if seen.insert(key) {
            refs.push(PackageRef::new(id, version));
        }
    }

    refs
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        text.get(prefix.len()..)
    } else {
        None
    }
}
