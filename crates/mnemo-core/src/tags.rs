//! Infer topic tags from file paths.
//!
//! Extensions map to a layer (`.tsx` → `frontend`, `.sql` → `database`) and
//! well-known directory names map to an area (`auth/` → `security`).

use std::collections::BTreeSet;

fn tag_for_extension(ext: &str) -> Option<&'static str> {
    match ext {
        "py" | "rs" | "go" => Some("backend"),
        "js" | "jsx" | "ts" | "tsx" => Some("frontend"),
        "sql" => Some("database"),
        "css" | "scss" | "sass" => Some("styling"),
        "md" | "txt" => Some("documentation"),
        _ => None,
    }
}

fn tag_for_segment(segment: &str) -> Option<&'static str> {
    match segment {
        "api" | "routes" | "endpoints" => Some("api"),
        "db" | "database" | "models" => Some("database"),
        "auth" | "security" => Some("security"),
        "test" | "tests" | "spec" => Some("testing"),
        "ui" | "components" | "frontend" => Some("frontend"),
        "server" | "backend" | "service" => Some("backend"),
        _ => None,
    }
}

/// Tags implied by a set of file paths.
pub fn infer_tags<'a, I>(files: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut tags = BTreeSet::new();
    for file in files {
        let lower = file.to_lowercase();
        let mut segments: Vec<&str> = lower.split(['/', '\\']).collect();
        let name = segments.pop().unwrap_or_default();

        if let Some((_, ext)) = name.rsplit_once('.') {
            if let Some(tag) = tag_for_extension(ext) {
                let _ = tags.insert(tag.to_string());
            }
        }
        for segment in segments {
            if let Some(tag) = tag_for_segment(segment) {
                let _ = tags.insert(tag.to_string());
            }
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    fn infer(files: &[&str]) -> Vec<String> {
        let owned: Vec<String> = files.iter().map(|s| (*s).to_string()).collect();
        infer_tags(&owned).into_iter().collect()
    }

    #[test]
    fn extensions_and_directories() {
        assert_eq!(infer(&["api/schema.py"]), vec!["api", "backend"]);
        assert_eq!(
            infer(&["frontend/auth/tokenManager.js"]),
            vec!["frontend", "security"]
        );
        assert_eq!(infer(&["migrations/v1.sql"]), vec!["database"]);
    }

    #[test]
    fn file_name_is_not_a_directory() {
        // a file literally named "api" has no extension and is not a segment
        assert!(infer(&["src/api"]).is_empty());
    }

    #[test]
    fn unknown_paths_yield_nothing() {
        assert!(infer(&["Makefile", "vendor/blob.bin"]).is_empty());
    }
}
