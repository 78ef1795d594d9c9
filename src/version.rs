//! Build metadata for `--version` output and startup logs.

/// Package version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Short git commit at build time, or "unknown" outside a checkout.
pub const GIT_SHA: &str = match option_env!("VERGEN_GIT_SHA") {
    Some(sha) => sha,
    None => "unknown",
};

/// Build date (`YYYY-MM-DD`), or "unknown".
pub const BUILD_DATE: &str = match option_env!("VERGEN_BUILD_DATE") {
    Some(date) => date,
    None => "unknown",
};

fn git_dirty() -> bool {
    option_env!("VERGEN_GIT_DIRTY") == Some("true")
}

/// `{version} ({sha}[-dirty] {date})`, e.g. `0.3.0 (abc1234 2026-10-19)`.
pub fn version_string() -> String {
    let sha = &GIT_SHA[..7.min(GIT_SHA.len())];
    let dirty = if git_dirty() { "-dirty" } else { "" };
    format!("{PKG_VERSION} ({sha}{dirty} {BUILD_DATE})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_leads_with_package_version() {
        assert!(version_string().starts_with(PKG_VERSION));
    }

    #[test]
    fn version_string_carries_build_date() {
        assert!(version_string().contains(BUILD_DATE));
    }
}
