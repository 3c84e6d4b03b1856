use camino::Utf8Path;

/// Forward slashes, no `./` segments, no empty segments.
pub fn normalize_path(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let absolute = unified.starts_with('/');
    let parts: Vec<&str> = unified
        .split('/')
        .filter(|p| !p.is_empty() && *p != ".")
        .collect();
    let joined = parts.join("/");
    if absolute { format!("/{joined}") } else { joined }
}

/// Whether a finding's `file_path` names the target artifact.
///
/// Equal after normalization, or the relative one of the two is a component-wise suffix of the
/// other (a repo-relative finding path against an absolute artifact path).
pub fn paths_match(finding_path: &Utf8Path, target: &Utf8Path) -> bool {
    let a = normalize_path(finding_path.as_str());
    let b = normalize_path(target.as_str());
    if a == b {
        return true;
    }
    let (short, long) = if a.len() < b.len() { (&a, &b) } else { (&b, &a) };
    if short.is_empty() || short.starts_with('/') {
        return false;
    }
    long.ends_with(short.as_str()) && long[..long.len() - short.len()].ends_with('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_separators_and_dot_segments() {
        assert_eq!(normalize_path("./src//main\\App.java"), "src/main/App.java");
        assert_eq!(normalize_path("/repo/./src/a.rs"), "/repo/src/a.rs");
    }

    #[test]
    fn relative_matches_absolute_suffix_on_component_boundary() {
        assert!(paths_match(
            Utf8Path::new("src/a.rs"),
            Utf8Path::new("/work/repo/src/a.rs")
        ));
        assert!(!paths_match(
            Utf8Path::new("a.rs"),
            Utf8Path::new("/work/repo/src/data.rs")
        ));
    }

    #[test]
    fn different_absolute_paths_do_not_match() {
        assert!(!paths_match(
            Utf8Path::new("/a/src/x.rs"),
            Utf8Path::new("/b/src/x.rs")
        ));
    }

    #[test]
    fn dot_prefix_is_ignored() {
        assert!(paths_match(Utf8Path::new("./src/x.rs"), Utf8Path::new("src/x.rs")));
    }
}
