use anyhow::Result;
use log::warn;
use std::path::PathBuf;
use walkdir::WalkDir;

/// Extensions recognized as handler declaration files
const DECLARATION_EXTENSIONS: &[&str] = &["yml", "yaml", "json"];

/// Scanner for handler declaration directories.
///
/// The `DeclarationScanner` recursively walks a directory to find every YAML or JSON declaration
/// file. It skips the `target` directory and hidden directories (those starting with `.`), and
/// visits entries in file-name order so handlers are always declared in the same order.
///
/// # Example
///
/// ```no_run
/// use openapi_from_metadata::scanner::DeclarationScanner;
/// use std::path::PathBuf;
///
/// let scanner = DeclarationScanner::new(PathBuf::from("./handlers"));
/// let result = scanner.scan().unwrap();
/// println!("Found {} declaration files", result.declaration_files.len());
/// ```
pub struct DeclarationScanner {
    root_path: PathBuf,
}

/// Result of directory scanning operation.
pub struct ScanResult {
    /// Paths of all discovered declaration files, in traversal order
    pub declaration_files: Vec<PathBuf>,
    /// Warning messages for any issues encountered (e.g., inaccessible directories)
    pub warnings: Vec<String>,
}

impl DeclarationScanner {
    pub fn new(root_path: PathBuf) -> Self {
        Self { root_path }
    }

    /// Scans the directory tree and collects all declaration files.
    ///
    /// If any directories or files cannot be accessed, warnings are logged and added to
    /// the result, but scanning continues.
    pub fn scan(&self) -> Result<ScanResult> {
        let mut declaration_files = Vec::new();
        let mut warnings = Vec::new();

        for entry in WalkDir::new(&self.root_path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                // Don't filter the root directory itself
                if e.path() == self.root_path {
                    return true;
                }

                let file_name = e.file_name().to_string_lossy();
                let is_hidden = file_name.starts_with('.');
                let is_target = file_name == "target";

                !is_hidden && !is_target
            })
        {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    let is_declaration = path
                        .extension()
                        .and_then(|s| s.to_str())
                        .is_some_and(|ext| DECLARATION_EXTENSIONS.contains(&ext.to_lowercase().as_str()));
                    if path.is_file() && is_declaration {
                        declaration_files.push(path.to_path_buf());
                    }
                }
                Err(e) => {
                    let warning = format!("Failed to access path: {}", e);
                    warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }

        Ok(ScanResult {
            declaration_files,
            warnings,
        })
    }
}
