//! Kubernetes version upgrade validation.
//!
//! An upgrade must move strictly forward, stay on the same major version
//! and advance at most one minor version at a time.

use semver::Version;

use crate::error::{ProviderError, ProviderResult};

pub fn validate_upgrade(current: &str, target: &str) -> ProviderResult<()> {
    let invalid = |reason: String| ProviderError::InvalidUpgrade {
        from: current.to_string(),
        to: target.to_string(),
        reason,
    };

    let from = parse_version(current).map_err(|e| invalid(format!("current version: {e}")))?;
    let to = parse_version(target).map_err(|e| invalid(format!("target version: {e}")))?;

    if to <= from {
        return Err(invalid("target version is not newer".to_string()));
    }
    if to.major != from.major {
        return Err(invalid("major version changes are not supported".to_string()));
    }
    if to.minor > from.minor + 1 {
        return Err(invalid(format!(
            "upgrade must go through {}.{}",
            from.major,
            from.minor + 1
        )));
    }
    Ok(())
}

fn parse_version(version: &str) -> Result<Version, semver::Error> {
    Version::parse(version.trim().trim_start_matches('v'))
}
