//! Search-path assembly.
//!
//! Derives the ordered list of filesystem directories scanned for property
//! files from a checked-out working tree plus the (application, profile,
//! label) triple. Search-path templates may use `{application}`,
//! `{profile}` and `{label}` placeholders; profile lists are expanded per
//! profile. Only existing directories are returned, most specific first:
//! templates naming both application and profile rank above
//! application-only, which ranks above profile-only, which ranks above the
//! working-tree root.

use std::path::{Path, PathBuf};

const APPLICATION_PLACEHOLDER: &str = "{application}";
const PROFILE_PLACEHOLDER: &str = "{profile}";
const LABEL_PLACEHOLDER: &str = "{label}";

/// Compute the search locations for `(application, profile, label)`.
///
/// `profile` may be a comma-separated list; each entry is substituted
/// separately. The working-tree root is always a candidate (lowest
/// priority).
pub fn search_locations(
    working_directory: &Path,
    application: &str,
    profile: &str,
    label: &str,
    patterns: &[String],
) -> Vec<PathBuf> {
    let profiles: Vec<&str> = profile
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    let mut ranked: Vec<(u8, PathBuf)> = Vec::new();
    for pattern in patterns {
        let rank = rank(pattern);
        if pattern.contains(PROFILE_PLACEHOLDER) {
            for p in &profiles {
                ranked.push((rank, working_directory.join(render(pattern, application, p, label))));
            }
        } else {
            ranked.push((rank, working_directory.join(render(pattern, application, "", label))));
        }
    }
    ranked.push((0, working_directory.to_path_buf()));

    // Stable sort keeps the configured order within a rank.
    ranked.sort_by(|a, b| b.0.cmp(&a.0));

    let mut seen = Vec::new();
    for (_, path) in ranked {
        if path.is_dir() && !seen.contains(&path) {
            seen.push(path);
        }
    }
    seen
}

fn render(pattern: &str, application: &str, profile: &str, label: &str) -> String {
    pattern
        .replace(APPLICATION_PLACEHOLDER, application)
        .replace(PROFILE_PLACEHOLDER, profile)
        .replace(LABEL_PLACEHOLDER, label)
}

fn rank(pattern: &str) -> u8 {
    let has_application = pattern.contains(APPLICATION_PLACEHOLDER);
    let has_profile = pattern.contains(PROFILE_PLACEHOLDER);
    match (has_application, has_profile) {
        (true, true) => 3,
        (true, false) => 2,
        (false, true) => 1,
        (false, false) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn workdir_with(dirs: &[&str]) -> TempDir {
        let temp = TempDir::new().unwrap();
        for dir in dirs {
            fs::create_dir_all(temp.path().join(dir)).unwrap();
        }
        temp
    }

    #[test]
    fn root_is_always_a_candidate() {
        let temp = workdir_with(&[]);
        let paths = search_locations(temp.path(), "app", "default", "main", &[]);
        assert_eq!(paths, vec![temp.path().to_path_buf()]);
    }

    #[test]
    fn missing_directories_are_skipped() {
        let temp = workdir_with(&[]);
        let patterns = vec!["{application}".to_string()];
        let paths = search_locations(temp.path(), "app", "default", "main", &patterns);
        assert_eq!(paths, vec![temp.path().to_path_buf()]);
    }

    #[test]
    fn most_specific_directories_come_first() {
        let temp = workdir_with(&["app", "app-dev", "profiles/dev"]);
        let patterns = vec![
            "profiles/{profile}".to_string(),
            "{application}".to_string(),
            "{application}-{profile}".to_string(),
        ];
        let paths = search_locations(temp.path(), "app", "dev", "main", &patterns);
        assert_eq!(
            paths,
            vec![
                temp.path().join("app-dev"),
                temp.path().join("app"),
                temp.path().join("profiles/dev"),
                temp.path().to_path_buf(),
            ]
        );
    }

    #[test]
    fn profile_lists_expand_per_profile() {
        let temp = workdir_with(&["profiles/dev", "profiles/prod"]);
        let patterns = vec!["profiles/{profile}".to_string()];
        let paths = search_locations(temp.path(), "app", "dev,prod", "main", &patterns);
        assert_eq!(
            paths,
            vec![
                temp.path().join("profiles/dev"),
                temp.path().join("profiles/prod"),
                temp.path().to_path_buf(),
            ]
        );
    }

    #[test]
    fn label_placeholder_is_substituted() {
        let temp = workdir_with(&["branches/main"]);
        let patterns = vec!["branches/{label}".to_string()];
        let paths = search_locations(temp.path(), "app", "default", "main", &patterns);
        assert_eq!(
            paths,
            vec![temp.path().join("branches/main"), temp.path().to_path_buf()]
        );
    }
}
