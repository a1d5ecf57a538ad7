//! Collecting and reading document files for ingestion.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Check if a file is likely a text document.
pub fn is_text_file(path: &Path) -> bool {
    if let Some(ext) = path.extension() {
        let ext = ext.to_string_lossy().to_lowercase();
        if is_binary_extension(&ext) {
            return false;
        }
        if is_text_extension(&ext) {
            return true;
        }
    }

    // Unknown extension: sniff for NUL bytes
    if let Ok(file) = fs::File::open(path) {
        let mut buffer = [0u8; 512];
        let mut reader = std::io::BufReader::new(file);
        if let Ok(n) = reader.read(&mut buffer) {
            return !buffer[..n].contains(&0);
        }
    }

    false
}

/// Read file content, refusing files above `max_size` bytes.
pub fn read_file_content(path: &Path, max_size: u64) -> std::io::Result<String> {
    let metadata = fs::metadata(path)?;

    if metadata.len() > max_size {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!(
                "file exceeds maximum size: {} > {}",
                metadata.len(),
                max_size
            ),
        ));
    }

    fs::read_to_string(path)
}

/// Text files under `root` (or `root` itself), minus glob exclusions.
///
/// Results are sorted so ingestion order is reproducible.
pub fn collect_documents(root: &Path, exclude_patterns: &[String]) -> std::io::Result<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }

    let patterns: Vec<glob::Pattern> = exclude_patterns
        .iter()
        .filter_map(|p| glob::Pattern::new(p).ok())
        .collect();

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(std::io::Error::other)?;
        let path = entry.path();

        if !entry.file_type().is_file() {
            continue;
        }

        let path_str = path.to_string_lossy();
        if patterns.iter().any(|p| p.matches(&path_str)) {
            continue;
        }

        if is_text_file(path) {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

fn is_binary_extension(ext: &str) -> bool {
    matches!(
        ext,
        "exe" | "dll" | "so" | "dylib" | "a" | "o" | "obj"
            | "png" | "jpg" | "jpeg" | "gif" | "bmp" | "ico" | "webp"
            | "mp3" | "mp4" | "avi" | "mkv" | "mov" | "wav" | "flac"
            | "zip" | "tar" | "gz" | "bz2" | "xz" | "7z" | "rar"
            | "pdf" | "doc" | "docx" | "xls" | "xlsx" | "ppt" | "pptx"
            | "woff" | "woff2" | "ttf" | "otf"
            | "db" | "sqlite" | "sqlite3" | "bin" | "dat"
    )
}

fn is_text_extension(ext: &str) -> bool {
    matches!(
        ext,
        "md" | "markdown" | "txt" | "rst" | "adoc" | "org"
            | "html" | "htm" | "csv" | "tsv"
            | "json" | "yaml" | "yml" | "toml" | "xml"
            | "sql" | "log"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_text_file_by_extension() {
        assert!(is_text_file(Path::new("playbook.md")));
        assert!(is_text_file(Path::new("notes.TXT")));
        assert!(!is_text_file(Path::new("scan.pdf")));
        assert!(!is_text_file(Path::new("logo.png")));
    }

    #[test]
    fn test_is_text_file_sniffs_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let text = dir.path().join("notes.custom");
        let binary = dir.path().join("blob.custom");
        fs::write(&text, "plain words").unwrap();
        fs::write(&binary, [0u8, 1, 2, 3]).unwrap();

        assert!(is_text_file(&text));
        assert!(!is_text_file(&binary));
    }

    #[test]
    fn test_read_file_content_size_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.md");
        fs::write(&path, "x".repeat(100)).unwrap();

        assert!(read_file_content(&path, 1000).is_ok());
        let err = read_file_content(&path, 10).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_collect_documents_honors_exclusions() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("drafts")).unwrap();
        fs::write(root.join("b.md"), "b").unwrap();
        fs::write(root.join("a.txt"), "a").unwrap();
        fs::write(root.join("drafts").join("c.md"), "c").unwrap();
        fs::write(root.join("image.png"), [0u8; 4]).unwrap();

        let files = collect_documents(root, &["**/drafts/**".to_string()]).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.txt", "b.md"]);
    }

    #[test]
    fn test_collect_documents_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("one.md");
        fs::write(&path, "one").unwrap();

        assert_eq!(collect_documents(&path, &[]).unwrap(), vec![path]);
    }
}
