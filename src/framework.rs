//! Target framework moniker (TFM) handling: normalization, family
//! classification, and the compatibility relation used to pick dependency
//! groups and binary directories.

/// Target framework assumed when the caller does not specify one.
pub const DEFAULT_TARGET: &str = "net8.0";

/// How much an exact moniker match outranks every versioned alternative.
const EXACT_MATCH_BONUS: i32 = 10_000;

/// The runtime family a moniker belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameworkFamily {
    /// The portable `netstandard*` API surface.
    Standard,
    /// `netcoreapp*` and the unified `net5.0`+ monikers.
    Core,
    /// Classic `net4x` framework monikers.
    Framework,
}

/// Canonical form of a moniker: lowercased, with single-digit unified
/// shorthands (`net5` through `net9`) expanded to `netN.0`. Classic
/// framework monikers such as `net48` and `net461` pass through unchanged.
pub fn normalize(tfm: &str) -> String {
    let tfm = tfm.trim().to_ascii_lowercase();
    if let Some(rest) = tfm.strip_prefix("net")
        && rest.len() == 1
        && let Ok(major) = rest.parse::<u32>()
        && major >= 5
    {
        return format!("net{major}.0");
    }
    tfm
}

/// Fixed ordering over the monikers the resolver understands. Newer
/// runtimes score higher; unknown monikers have no score and are never
/// considered compatible.
pub fn priority(tfm: &str) -> Option<i32> {
    let score = match tfm {
        "netstandard1.0" => 1,
        "netstandard1.1" => 2,
        "netstandard1.2" => 3,
        "netstandard1.3" => 4,
        "netstandard1.4" => 5,
        "netstandard1.5" => 6,
        "netstandard1.6" => 7,
        "netstandard2.0" => 8,
        "netstandard2.1" => 9,
        "net461" => 10,
        "net462" => 11,
        "net47" => 12,
        "net471" => 13,
        "net472" => 14,
        "net48" => 15,
        "net481" => 16,
        "netcoreapp2.0" => 17,
        "netcoreapp2.1" => 18,
        "netcoreapp2.2" => 19,
        "netcoreapp3.0" => 20,
        "netcoreapp3.1" => 21,
        "net5.0" => 22,
        "net6.0" => 23,
        "net7.0" => 24,
        "net8.0" => 25,
        "net9.0" => 26,
        _ => return None,
    };
    Some(score)
}

fn family(normalized: &str) -> FrameworkFamily {
    if normalized.starts_with("netstandard") {
        FrameworkFamily::Standard
    } else if normalized.starts_with("netcoreapp")
        || normalized.contains('.')
        || normalized.len() > 5
    {
        FrameworkFamily::Core
    } else {
        FrameworkFamily::Framework
    }
}

/// Whether binaries (or a dependency group) declared for `package_tfm` can
/// be consumed by a program targeting `target_tfm`.
pub fn is_compatible(package_tfm: &str, target_tfm: &str) -> bool {
    if package_tfm.trim().is_empty() || target_tfm.trim().is_empty() {
        return false;
    }

    let package = normalize(package_tfm);
    let target = normalize(target_tfm);
    if package == target {
        return true;
    }

    let (Some(package_priority), Some(target_priority)) =
        (priority(&package), priority(&target))
    else {
        return false;
    };

    let package_family = family(&package);
    let target_family = family(&target);

    // netstandard assemblies load on any runtime that implements the
    // standard: 2.0 needs netcoreapp2.0+ or net461+, 2.1 needs
    // netcoreapp3.0+ and has no classic-framework implementation.
    if package_family == FrameworkFamily::Standard
        && target_family != FrameworkFamily::Standard
    {
        match package.as_str() {
            "netstandard2.0" => {
                return target_priority >= priority("netcoreapp2.0").unwrap_or(0)
                    || target_priority >= priority("net461").unwrap_or(0);
            }
            "netstandard2.1" => {
                return target_priority >= priority("netcoreapp3.0").unwrap_or(0);
            }
            _ => {}
        }
    }

    package_priority <= target_priority && package_family == target_family
}

/// Score used to rank compatible binary directories against each other.
/// An exact moniker match always beats a merely compatible one.
pub fn selection_priority(package_tfm: &str, target_tfm: &str) -> i32 {
    let mut score = priority(&normalize(package_tfm)).unwrap_or(0);
    if package_tfm.trim().eq_ignore_ascii_case(target_tfm.trim()) {
        score += EXACT_MATCH_BONUS;
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_expands_unified_shorthands() {
        assert_eq!(normalize("NET8"), "net8.0");
        assert_eq!(normalize(" net5 "), "net5.0");
        assert_eq!(normalize("Net8.0"), "net8.0");
        // classic monikers keep their digit runs
        assert_eq!(normalize("net48"), "net48");
        assert_eq!(normalize("net461"), "net461");
        assert_eq!(normalize("netstandard2.0"), "netstandard2.0");
    }

    #[test]
    fn empty_operands_are_never_compatible() {
        assert!(!is_compatible("", "net8.0"));
        assert!(!is_compatible("netstandard2.0", ""));
        assert!(!is_compatible("", ""));
    }

    #[test]
    fn identical_monikers_are_compatible() {
        assert!(is_compatible("net8.0", "net8.0"));
        assert!(is_compatible("NET8.0", "net8.0"));
        assert!(is_compatible("net8", "net8.0"));
    }

    #[test]
    fn unknown_monikers_are_rejected() {
        assert!(!is_compatible("monoandroid10", "net8.0"));
        assert!(!is_compatible("netstandard2.0", "portable-net45"));
    }

    #[test]
    fn netstandard20_works_on_modern_and_classic_runtimes() {
        assert!(is_compatible("netstandard2.0", "net8.0"));
        assert!(is_compatible("netstandard2.0", "netcoreapp3.1"));
        assert!(is_compatible("netstandard2.0", "net48"));
        assert!(is_compatible("netstandard2.0", "net461"));
    }

    #[test]
    fn netstandard21_needs_netcoreapp30_or_later() {
        assert!(is_compatible("netstandard2.1", "net8.0"));
        assert!(is_compatible("netstandard2.1", "netcoreapp3.0"));
        assert!(!is_compatible("netstandard2.1", "net48"));
        assert!(!is_compatible("netstandard2.1", "netcoreapp2.2"));
    }

    #[test]
    fn older_standards_only_match_within_their_family() {
        assert!(is_compatible("netstandard1.6", "netstandard2.0"));
        assert!(!is_compatible("netstandard1.6", "net8.0"));
    }

    #[test]
    fn core_monikers_are_forward_compatible() {
        assert!(is_compatible("netcoreapp3.1", "net8.0"));
        assert!(is_compatible("net6.0", "net8.0"));
        assert!(!is_compatible("net8.0", "net6.0"));
        assert!(!is_compatible("net6.0", "netcoreapp3.1"));
    }

    #[test]
    fn classic_framework_does_not_cross_into_core() {
        assert!(!is_compatible("net48", "net8.0"));
        assert!(!is_compatible("netcoreapp3.1", "net48"));
    }

    #[test]
    fn exact_match_outranks_compatible_alternatives() {
        let exact = selection_priority("netcoreapp3.1", "netcoreapp3.1");
        let compatible = selection_priority("netstandard2.0", "netcoreapp3.1");
        assert!(exact > compatible);
        assert!(exact >= EXACT_MATCH_BONUS);
    }

    #[test]
    fn priorities_rise_with_runtime_age() {
        let ordered = [
            "netstandard1.0",
            "netstandard2.1",
            "net48",
            "netcoreapp3.1",
            "net8.0",
        ];
        let scores: Vec<i32> = ordered.iter().map(|t| priority(t).unwrap()).collect();
        assert!(scores.windows(2).all(|w| w[0] < w[1]));
    }
}
