//! Storage filename generation

use uuid::Uuid;

/// Field name used when the incoming part carries none
pub const DEFAULT_FIELD_NAME: &str = "file";

/// Generate a storage filename of the form `<uuid>-<field><ext>`.
///
/// The extension is copied verbatim from the original name (case kept) and is
/// omitted when the original has none. Backslashes are normalized to forward
/// slashes in both the input and the result.
pub fn generate_filename(original_name: &str, field_name: Option<&str>) -> String {
    let original = original_name.replace('\\', "/");
    let field = field_name
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_FIELD_NAME);

    let name = format!("{}-{}{}", Uuid::new_v4(), field, extension(&original));
    name.replace('\\', "/")
}

/// Extension of the last path segment, including the leading dot.
///
/// A dot that starts the segment (`.env`) does not begin an extension.
pub fn extension(name: &str) -> &str {
    let base = name.rsplit('/').next().unwrap_or(name);
    match base.rfind('.') {
        Some(idx) if idx > 0 => &base[idx..],
        _ => "",
    }
}

/// Last path segment of a client-supplied filename, splitting on either separator
pub fn base_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_filename_shape() {
        let name = generate_filename("report.pdf", Some("documents"));
        assert!(name.ends_with("-documents.pdf"));

        let id = name.trim_end_matches("-documents.pdf");
        assert!(Uuid::parse_str(id).is_ok());
    }

    #[test]
    fn test_extension_case_preserved() {
        let name = generate_filename("photo.PNG", Some("avatar"));
        assert!(name.ends_with(".PNG"));
    }

    #[test]
    fn test_no_extension() {
        let name = generate_filename("README", Some("file"));
        assert!(name.ends_with("-file"));
        assert!(!name.contains('.'));
    }

    #[test]
    fn test_default_field_name() {
        assert!(generate_filename("a.txt", None).ends_with("-file.txt"));
        assert!(generate_filename("a.txt", Some("")).ends_with("-file.txt"));
    }

    #[test]
    fn test_backslashes_normalized() {
        let name = generate_filename("C:\\Users\\me\\scan.jpeg", Some("doc"));
        assert!(name.ends_with("-doc.jpeg"));
        assert!(!name.contains('\\'));

        let name = generate_filename("x.png", Some("a\\b"));
        assert!(name.ends_with("-a/b.png"));
    }

    #[test]
    fn test_extension_rules() {
        assert_eq!(extension("archive.tar.gz"), ".gz");
        assert_eq!(extension(".bashrc"), "");
        assert_eq!(extension("dir.d/file"), "");
        assert_eq!(extension("trailing."), ".");
        assert_eq!(extension(""), "");
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("photos/2024/cat.jpg"), "cat.jpg");
        assert_eq!(base_name("C:\\tmp\\cat.jpg"), "cat.jpg");
        assert_eq!(base_name("cat.jpg"), "cat.jpg");
    }

    #[test]
    fn test_names_are_unique() {
        let names: HashSet<String> = (0..10_000)
            .map(|_| generate_filename("photo.png", Some("file")))
            .collect();
        assert_eq!(names.len(), 10_000);
    }
}
