use crate::core::api::ApiClient;
use anyhow::{Context, Result};
use colored::*;
use ignore::WalkBuilder;
use log::{debug, info, warn};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Entries sent per upload request
pub const UPLOAD_BATCH: usize = 500;

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ScanSummary {
    pub files: usize,
    pub inserted: u64,
    pub failed: usize,
}

pub struct Scanner {
    client: ApiClient,
}

impl Scanner {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn scan(&self, path: &Path) -> ScanSummary {
        // Canonicalize root for consistent relative paths
        let root = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        info!("Scanning for catalog files under: {:?}", root);

        let mut summary = ScanSummary::default();
        for file in catalog_files(&root) {
            summary.files += 1;
            self.process_file(&file, &root, &mut summary).await;
        }

        info!("Scan complete: {:?}", summary);
        summary
    }

    async fn process_file(&self, path: &Path, root: &Path, summary: &mut ScanSummary) {
        let relative = path.strip_prefix(root).unwrap_or(path);
        let name = relative.to_string_lossy().replace('\\', "/");
        debug!("Processing: {}", name);

        let entries = match read_catalog_file(path) {
            Ok(entries) => entries,
            Err(e) => {
                println!("{} {} ({})", "[SKIP]".yellow(), name, e);
                return;
            }
        };

        println!("{} {} ({} entries)", "[UPLOADING]".blue(), name, entries.len());

        for batch in entries.chunks(UPLOAD_BATCH) {
            match self.client.upload(batch).await {
                Ok(report) => {
                    let inserted = report["inserted"].as_u64().unwrap_or(0);
                    let failed = report["failed_items"].as_array().map_or(0, |f| f.len());
                    summary.inserted += inserted;
                    summary.failed += failed;
                    if failed > 0 {
                        warn!("{}: {} entries rejected", name, failed);
                    }
                    println!("{} {} +{}", "[OK]".green(), name, inserted);
                }
                Err(e) => {
                    summary.failed += batch.len();
                    println!("{} {} ({})", "[ERROR]".red(), name, e);
                }
            }
        }
    }
}

/// Catalog files under `root`, honouring ignore files, in path order
pub fn catalog_files(root: &Path) -> Vec<PathBuf> {
    let walker = WalkBuilder::new(root)
        .hidden(false)
        .ignore(true)
        .git_ignore(true)
        .add_custom_ignore_filename(".pillignore")
        .filter_entry(|entry| entry.file_name() != ".git")
        .build();

    let mut files = Vec::new();
    for result in walker {
        match result {
            Ok(entry) => {
                let entry_path = entry.path();
                let is_catalog = matches!(
                    entry_path.extension().and_then(|e| e.to_str()),
                    Some("json") | Some("jsonl")
                );
                if entry_path.is_file() && is_catalog {
                    files.push(entry_path.to_path_buf());
                }
            }
            Err(err) => warn!("Error walking path: {}", err),
        }
    }
    files.sort();
    files
}

/// Read a catalog file: a JSON array, a single object, or JSON lines
pub fn read_catalog_file(path: &Path) -> Result<Vec<Value>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    if path.extension().and_then(|e| e.to_str()) == Some("jsonl") {
        return text
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).context("Invalid JSON line"))
            .collect();
    }

    match serde_json::from_str::<Value>(&text).context("Invalid JSON")? {
        Value::Array(entries) => Ok(entries),
        entry @ Value::Object(_) => Ok(vec![entry]),
        _ => anyhow::bail!("Expected a JSON array or object"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_catalog_files_respects_ignore() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.json"), "[]").unwrap();
        fs::write(dir.path().join("a.jsonl"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        fs::write(dir.path().join("skip.json"), "[]").unwrap();
        fs::write(dir.path().join(".pillignore"), "skip.json\n").unwrap();

        let names: Vec<String> = catalog_files(dir.path())
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.jsonl", "b.json"]);
    }

    #[test]
    fn test_read_catalog_formats() {
        let dir = TempDir::new().unwrap();

        let array = dir.path().join("array.json");
        fs::write(&array, r#"[{"item_seq": "1"}, {"item_seq": "2"}]"#).unwrap();
        assert_eq!(read_catalog_file(&array).unwrap().len(), 2);

        let object = dir.path().join("one.json");
        fs::write(&object, r#"{"item_seq": "1"}"#).unwrap();
        assert_eq!(read_catalog_file(&object).unwrap().len(), 1);

        let lines = dir.path().join("lines.jsonl");
        fs::write(&lines, "{\"item_seq\": \"1\"}\n\n{\"item_seq\": \"2\"}\n").unwrap();
        assert_eq!(read_catalog_file(&lines).unwrap().len(), 2);

        let scalar = dir.path().join("bad.json");
        fs::write(&scalar, "42").unwrap();
        assert!(read_catalog_file(&scalar).is_err());
    }

    #[tokio::test]
    async fn test_scan_uploads_catalog() {
        use pill_search::backend::Backend;
        use pill_search::config::ServiceConfig;
        use pill_search::index::CatalogIndex;
        use pill_search::server::{create_router, AppState};
        use std::sync::Arc;

        let state = Arc::new(AppState {
            backend: Backend::local(CatalogIndex::in_memory().unwrap()),
            config: ServiceConfig::default(),
        });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, create_router(state)).await.unwrap();
        });

        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("pills.json"),
            r#"[{"item_seq": "1", "drug_shape": "원형", "color_classes": "하양"},
                {"item_seq": "2", "drug_shape": "원형", "color_classes": "하양"},
                {"drug_shape": "원형"}]"#,
        )
        .unwrap();
        fs::write(dir.path().join("broken.json"), "{").unwrap();

        let scanner = Scanner::new(ApiClient::new(&format!("http://{}", addr)));
        let summary = scanner.scan(dir.path()).await;
        assert_eq!(
            summary,
            ScanSummary {
                files: 2,
                inserted: 2,
                failed: 1
            }
        );
    }
}
