use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

// @module: File and directory utilities

/// Extensions treated as HTML documents
pub const HTML_EXTENSIONS: &[&str] = &["html", "htm"];

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().is_file()
    }

    // @checks: Directory existence
    pub fn dir_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().is_dir()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path)
                .with_context(|| format!("Failed to create directory: {:?}", path))?;
        }
        Ok(())
    }

    // @checks: Extension is .html or .htm
    pub fn is_html_file<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref()
            .extension()
            .map(|ext| {
                let ext = ext.to_string_lossy();
                HTML_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known))
            })
            .unwrap_or(false)
    }

    /// Find HTML documents under a directory, sorted for a stable order
    pub fn find_html_files<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>> {
        let mut result = Vec::new();
        for entry in WalkDir::new(dir.as_ref()).follow_links(true) {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();
            if path.is_file() && Self::is_html_file(path) {
                result.push(path.to_path_buf());
            }
        }
        result.sort();
        Ok(result)
    }

    // @generates: Output path for a translated document
    // @params: input_file, input_root, output_dir, target_language
    // @returns: <output_dir>/<target_language>/<path relative to input_root>
    pub fn generate_output_path<P1: AsRef<Path>, P2: AsRef<Path>, P3: AsRef<Path>>(
        input_file: P1,
        input_root: P2,
        output_dir: P3,
        target_language: &str,
    ) -> PathBuf {
        output_dir
            .as_ref()
            .join(target_language)
            .join(Self::relative_key(input_file, input_root))
    }

    // @returns: Report path next to an output document
    pub fn report_path<P: AsRef<Path>>(output_file: P) -> PathBuf {
        let mut name = output_file
            .as_ref()
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".report.json");
        output_file.as_ref().with_file_name(name)
    }

    /// Path of a document relative to its input root, with `/` separators.
    ///
    /// Used as the stable document key in the ledger. A file given on its own
    /// is keyed by its file name.
    pub fn relative_key<P1: AsRef<Path>, P2: AsRef<Path>>(input_file: P1, input_root: P2) -> String {
        let input_file = input_file.as_ref();
        let relative = match input_file.strip_prefix(input_root.as_ref()) {
            Ok(rel) if !rel.as_os_str().is_empty() => rel.to_path_buf(),
            _ => input_file
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| input_file.to_path_buf()),
        };
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Read a file to a string
    pub fn read_to_string<P: AsRef<Path>>(path: P) -> Result<String> {
        fs::read_to_string(&path).with_context(|| format!("Failed to read file: {:?}", path.as_ref()))
    }

    /// Write a string to a file atomically.
    ///
    /// The content goes to a temporary file in the target directory which is
    /// then renamed over the destination.
    pub fn write_atomic<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
        let path = path.as_ref();
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self::ensure_dir(&parent)?;

        let mut temp = NamedTempFile::new_in(&parent)
            .with_context(|| format!("Failed to create temporary file in {:?}", parent))?;
        temp.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write temporary file for {:?}", path))?;
        temp.flush()?;
        temp.persist(path)
            .map_err(|e| e.error)
            .with_context(|| format!("Failed to write to file: {:?}", path))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_findHtmlFiles_shouldMatchBothExtensionsSorted() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("b.html"), "x").unwrap();
        fs::write(dir.path().join("sub/a.HTM"), "x").unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let files = FileManager::find_html_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("b.html"));
        assert!(files[1].ends_with("sub/a.HTM"));
    }

    #[test]
    fn test_generateOutputPath_shouldMirrorRelativeLayout() {
        let out = FileManager::generate_output_path("/in/docs/ch1/p.html", "/in/docs", "/out", "fr");
        assert_eq!(out, PathBuf::from("/out/fr/ch1/p.html"));
        assert_eq!(
            FileManager::report_path(&out),
            PathBuf::from("/out/fr/ch1/p.html.report.json")
        );
    }

    #[test]
    fn test_relativeKey_withSingleFile_shouldUseFileName() {
        assert_eq!(FileManager::relative_key("/in/page.html", "/in/page.html"), "page.html");
        assert_eq!(FileManager::relative_key("/in/a/b.html", "/in"), "a/b.html");
    }

    #[test]
    fn test_writeAtomic_shouldCreateParentsAndReplace() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("x/y/out.html");
        FileManager::write_atomic(&target, "first").unwrap();
        FileManager::write_atomic(&target, "second").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "second");
    }
}
