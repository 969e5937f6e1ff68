use std::cmp::Ordering;
use std::sync::OnceLock;

use regex::Regex;
use semver::Version;

pub const MASTER_BRANCH: &str = "master";

/// A branch name that follows the `MAJOR[.MINOR[.PATCH]]` convention.
#[derive(Clone, Debug, PartialEq, Eq)]
struct VersionBranch<'a> {
    name: &'a str,
    major: u64,
    minor: Option<u64>,
    patch: Option<u64>,
}

impl<'a> VersionBranch<'a> {
    fn parse(name: &'a str) -> Option<Self> {
        static BRANCH_REGEX: OnceLock<Regex> = OnceLock::new();
        let re = BRANCH_REGEX.get_or_init(|| {
            Regex::new(r"^(\d+)(?:\.(\d+))?(?:\.(\d+))?$").expect("Invalid regex")
        });
        let caps = re.captures(name)?;
        let component = |idx: usize| caps.get(idx).and_then(|m| m.as_str().parse::<u64>().ok());
        Some(Self {
            name,
            major: component(1)?,
            minor: component(2),
            patch: component(3),
        })
    }

    fn specificity(&self) -> u8 {
        1 + u8::from(self.minor.is_some()) + u8::from(self.patch.is_some())
    }

    /// A branch is compatible when it shares the major and does not exceed the target.
    /// Missing components act as wildcards.
    fn accepts(&self, target: &Version) -> bool {
        if self.major != target.major {
            return false;
        }
        match self.minor {
            None => true,
            Some(minor) if minor < target.minor => true,
            Some(minor) if minor == target.minor => self.patch.is_none_or(|p| p <= target.patch),
            Some(_) => false,
        }
    }

    fn cmp_precedence(&self, other: &Self) -> Ordering {
        (self.major, self.minor.unwrap_or(0), self.patch.unwrap_or(0))
            .cmp(&(other.major, other.minor.unwrap_or(0), other.patch.unwrap_or(0)))
            .then(self.specificity().cmp(&other.specificity()))
    }
}

/// Parses distribution versions leniently: `5`, `5.4`, `5.4.1` and `5.4.1-alpha1` are accepted.
pub fn parse_version(raw: &str) -> Option<Version> {
    let trimmed = raw.trim();
    if let Ok(version) = Version::parse(trimmed) {
        return Some(version);
    }
    let (numbers, suffix) = match trimmed.split_once('-') {
        Some((numbers, suffix)) => (numbers, Some(suffix)),
        None => (trimmed, None),
    };
    let mut parts: Vec<&str> = numbers.split('.').collect();
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }
    while parts.len() < 3 {
        parts.push("0");
    }
    let padded = match suffix {
        Some(suffix) => format!("{}-{suffix}", parts.join(".")),
        None => parts.join("."),
    };
    Version::parse(&padded).ok()
}

/// Picks the branch that best serves `distribution_version`.
///
/// Exact names win. Otherwise the greatest version branch with the same major that does
/// not exceed the target is chosen. A target newer than every known major (or no target
/// at all) maps to `master` when it exists.
pub fn best_match<S: AsRef<str>>(branches: &[S], distribution_version: Option<&str>) -> Option<String> {
    let has = |name: &str| branches.iter().any(|b| b.as_ref() == name);
    let requested = distribution_version.map(str::trim).filter(|v| !v.is_empty());

    let Some(requested) = requested else {
        return has(MASTER_BRANCH).then(|| MASTER_BRANCH.to_string());
    };
    if has(requested) {
        return Some(requested.to_string());
    }
    let target = parse_version(requested)?;

    let version_branches: Vec<VersionBranch<'_>> = branches
        .iter()
        .filter_map(|b| VersionBranch::parse(b.as_ref()))
        .collect();

    if let Some(best) = version_branches
        .iter()
        .filter(|b| b.accepts(&target))
        .max_by(|a, b| a.cmp_precedence(b))
    {
        return Some(best.name.to_string());
    }

    let latest_major = version_branches.iter().map(|b| b.major).max();
    if latest_major.is_none_or(|major| target.major > major) && has(MASTER_BRANCH) {
        return Some(MASTER_BRANCH.to_string());
    }
    None
}
