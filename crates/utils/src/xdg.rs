use std::env;
use std::path::PathBuf;

/// Default root directory for on-disk stashes
///
/// `$XDG_CACHE_HOME/stash`, falling back to `~/.cache/stash`.
#[must_use]
pub fn default_root() -> PathBuf {
    env::var_os("XDG_CACHE_HOME")
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            dirs::home_dir()
                .map(|home| home.join(".cache"))
                .unwrap_or_else(|| PathBuf::from(".cache"))
        })
        .join("stash")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_default_root_follows_xdg_cache_home() {
        let original = env::var_os("XDG_CACHE_HOME");

        env::set_var("XDG_CACHE_HOME", "/tmp/cache");
        assert_eq!(default_root(), PathBuf::from("/tmp/cache/stash"));

        env::set_var("XDG_CACHE_HOME", "");
        assert!(default_root().ends_with(".cache/stash"));

        match original {
            Some(value) => env::set_var("XDG_CACHE_HOME", value),
            None => env::remove_var("XDG_CACHE_HOME"),
        }
    }
}
