use std::str::FromStr;
use serde::Deserialize;

/// How strictly dependency sets are checked when a task is submitted.
///
/// - `Off`: nothing is rejected. Unknown, self-referential or cyclic
///   dependencies simply leave the task Pending forever (default).
/// - `Cycles`: reject a submission whose dependencies would close a cycle
///   (including a task depending on itself).
/// - `Strict`: like `Cycles`, and additionally reject references to task IDs
///   that have not been submitted yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyCheck {
    Off,
    Cycles,
    Strict,
}

impl Default for DependencyCheck {
    fn default() -> Self {
        DependencyCheck::Off
    }
}

impl FromStr for DependencyCheck {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "off" => Ok(DependencyCheck::Off),
            "cycles" => Ok(DependencyCheck::Cycles),
            "strict" => Ok(DependencyCheck::Strict),
            other => Err(format!(
                "invalid dependency_check: {other} (expected \"off\", \"cycles\" or \"strict\")"
            )),
        }
    }
}

/// Retry delay strategy as written in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    /// Re-queue a failed task immediately.
    None,
    /// Re-queue after `base * 2^(retry - 1)`, capped at a maximum.
    Exponential,
}

impl Default for BackoffKind {
    fn default() -> Self {
        BackoffKind::None
    }
}

impl FromStr for BackoffKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(BackoffKind::None),
            "exponential" => Ok(BackoffKind::Exponential),
            other => Err(format!(
                "invalid backoff: {other} (expected \"none\" or \"exponential\")"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependency_check_parses_case_insensitively() {
        assert_eq!("Strict".parse::<DependencyCheck>(), Ok(DependencyCheck::Strict));
        assert_eq!(" off ".parse::<DependencyCheck>(), Ok(DependencyCheck::Off));
        assert!("sometimes".parse::<DependencyCheck>().is_err());
    }

    #[test]
    fn backoff_kind_defaults_to_none() {
        assert_eq!(BackoffKind::default(), BackoffKind::None);
        assert_eq!("exponential".parse::<BackoffKind>(), Ok(BackoffKind::Exponential));
    }
}
