use std::sync::LazyLock;

/// Defines the application version.
pub static VERSION: LazyLock<String> = LazyLock::new(|| {
    format!(
        "{}-{}{}",
        env!("IMAGE_VERSION"),
        option_env!("VERGEN_GIT_SHA").unwrap_or("unknown"),
        if is_dirty(option_env!("VERGEN_GIT_DIRTY")) {
            "-dirty"
        } else {
            ""
        }
    )
});

fn is_dirty(flag: Option<&str>) -> bool {
    flag == Some("true")
}
