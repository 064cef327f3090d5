//! Install-time seed resources.

use reqwest::Url;

use super::FetchError;

/// Paths fetched and stored when a new version installs, relative to the base path.
pub const DEFAULT_SEED_PATHS: &[&str] = &["", "menu", "index.html", "manifest.json"];

/// Collapse every run of `/` into a single separator.
pub fn collapse_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut prev_slash = false;
    for c in path.chars() {
        if c == '/' {
            if prev_slash {
                continue;
            }
            prev_slash = true;
        } else {
            prev_slash = false;
        }
        out.push(c);
    }
    out
}

/// Base path for a worker served from `script_path`: the directory holding
/// the script, always with a trailing slash.
///
/// `/shopping-list/sw.js` gives `/shopping-list/`; `/sw.js` gives `/`.
pub fn base_path(script_path: &str) -> String {
    let dir = match script_path.rfind('/') {
        Some(idx) => &script_path[..=idx],
        None => "/",
    };
    collapse_slashes(&format!("/{}", dir))
}

/// Seed paths prefixed with the base path, duplicate separators collapsed.
pub fn seed_paths<S: AsRef<str>>(base: &str, paths: &[S]) -> Vec<String> {
    paths
        .iter()
        .map(|p| collapse_slashes(&format!("{}{}", base, p.as_ref())))
        .collect()
}

/// Resolve seed paths against the application origin.
pub fn seed_urls<S: AsRef<str>>(
    origin: &Url,
    base: &str,
    paths: &[S],
) -> Result<Vec<Url>, FetchError> {
    seed_paths(base, paths)
        .into_iter()
        .map(|path| {
            origin
                .join(&path)
                .map_err(|e| FetchError::InvalidRequest(format!("{}: {}", path, e)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_slashes() {
        assert_eq!(collapse_slashes("//menu"), "/menu");
        assert_eq!(collapse_slashes("/a///b//c"), "/a/b/c");
        assert_eq!(collapse_slashes("/"), "/");
        assert_eq!(collapse_slashes(""), "");
    }

    #[test]
    fn test_base_path_root() {
        assert_eq!(base_path("/sw.js"), "/");
    }

    #[test]
    fn test_base_path_subdirectory() {
        assert_eq!(base_path("/shopping-list/sw.js"), "/shopping-list/");
        assert_eq!(base_path("shopping-list/sw.js"), "/shopping-list/");
    }

    #[test]
    fn test_base_path_without_directory() {
        assert_eq!(base_path("sw.js"), "/");
    }

    #[test]
    fn test_default_seed_paths_at_root() {
        let paths = seed_paths("/", DEFAULT_SEED_PATHS);
        assert_eq!(paths, vec!["/", "/menu", "/index.html", "/manifest.json"]);
    }

    #[test]
    fn test_default_seed_paths_under_base() {
        let paths = seed_paths("/shopping-list/", DEFAULT_SEED_PATHS);
        assert_eq!(
            paths,
            vec![
                "/shopping-list/",
                "/shopping-list/menu",
                "/shopping-list/index.html",
                "/shopping-list/manifest.json",
            ]
        );
    }

    #[test]
    fn test_seed_paths_collapse_leading_slash() {
        let paths = seed_paths("/", &["/menu"]);
        assert_eq!(paths, vec!["/menu"]);
    }

    #[test]
    fn test_seed_urls_resolve_against_origin() {
        let origin = Url::parse("https://shop.example").unwrap();
        let urls = seed_urls(&origin, "/list/", &["menu"]).unwrap();
        assert_eq!(urls[0].as_str(), "https://shop.example/list/menu");
    }
}
