//! Build identification, embedded by `build.rs`.

/// Package version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Short git commit the crate was built from, or "unknown" outside a checkout.
pub const GIT_SHA: &str = match option_env!("VERGEN_GIT_SHA") {
    Some(sha) => sha,
    None => "unknown",
};

fn git_dirty() -> bool {
    option_env!("VERGEN_GIT_DIRTY") == Some("true")
}

/// `{version}+{sha}`, with a `.dirty` suffix for uncommitted builds.
pub fn version_string() -> String {
    let sha = &GIT_SHA[..7.min(GIT_SHA.len())];
    if git_dirty() {
        format!("{PKG_VERSION}+{sha}.dirty")
    } else {
        format!("{PKG_VERSION}+{sha}")
    }
}

/// Default `User-Agent` sent to the identity and rendering services.
pub fn user_agent() -> String {
    format!("portray/{}", version_string())
}
