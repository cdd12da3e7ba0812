//! Result types returned by the acquisition entry points.

use crate::error::PageError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Everything a finished run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquireOutput {
    /// Summary message; empty when the manifest produced a usable page list.
    pub message: String,
    /// The resolved resource identifier.
    pub identifier: String,
    /// Directory the pages were written to.
    pub save_path: PathBuf,
    /// One entry per selected page, in manifest order.
    pub pages: Vec<PageResult>,
    pub stats: AcquireStats,
}

/// What happened to one selected page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-indexed position in the flattened manifest.
    pub page_num: usize,
    /// The descriptor endpoint (`<service>/info.json`).
    pub endpoint: String,
    /// Final image path.
    pub output_path: PathBuf,
    pub status: PageStatus,
    pub duration_ms: u64,
}

impl PageResult {
    pub fn is_failed(&self) -> bool {
        matches!(self.status, PageStatus::Failed(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PageStatus {
    /// The reconstruction tool produced the image.
    Reconstructed,
    /// A non-empty image was already on disk.
    AlreadyPresent,
    /// The page failed; see the error.
    Failed(PageError),
}

/// Aggregate counters for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquireStats {
    /// Pages in the flattened manifest.
    pub total_pages: usize,
    /// Pages that passed the page selection and had an endpoint.
    pub selected_pages: usize,
    pub reconstructed_pages: usize,
    pub already_present_pages: usize,
    pub failed_pages: usize,
    pub duration_ms: u64,
}

impl AcquireStats {
    /// Tally the per-page results of a run.
    pub fn from_pages(total_pages: usize, pages: &[PageResult], duration_ms: u64) -> Self {
        let mut stats = AcquireStats {
            total_pages,
            selected_pages: pages.len(),
            duration_ms,
            ..Default::default()
        };
        for page in pages {
            match page.status {
                PageStatus::Reconstructed => stats.reconstructed_pages += 1,
                PageStatus::AlreadyPresent => stats.already_present_pages += 1,
                PageStatus::Failed(_) => stats.failed_pages += 1,
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(page_num: usize, status: PageStatus) -> PageResult {
        PageResult {
            page_num,
            endpoint: format!("svc{page_num}/info.json"),
            output_path: PathBuf::from(format!("{page_num:04}.jpg")),
            status,
            duration_ms: 1,
        }
    }

    #[test]
    fn stats_tally_each_status() {
        let pages = vec![
            page(1, PageStatus::Reconstructed),
            page(2, PageStatus::AlreadyPresent),
            page(
                3,
                PageStatus::Failed(PageError::Reconstruction {
                    page: 3,
                    detail: "exit 1".into(),
                }),
            ),
            page(4, PageStatus::Reconstructed),
        ];
        let stats = AcquireStats::from_pages(10, &pages, 42);
        assert_eq!(stats.total_pages, 10);
        assert_eq!(stats.selected_pages, 4);
        assert_eq!(stats.reconstructed_pages, 2);
        assert_eq!(stats.already_present_pages, 1);
        assert_eq!(stats.failed_pages, 1);
        assert!(pages[2].is_failed());
    }

    #[test]
    fn output_serialises_to_json() {
        let output = AcquireOutput {
            message: String::new(),
            identifier: "FS-F1904.61_006".into(),
            save_path: PathBuf::from("downloads"),
            pages: vec![page(1, PageStatus::Reconstructed)],
            stats: AcquireStats::default(),
        };
        let json = serde_json::to_string(&output).unwrap();
        assert!(json.contains("FS-F1904.61_006"));
        assert!(json.contains("Reconstructed"));
    }
}
