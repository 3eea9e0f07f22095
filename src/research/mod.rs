//! 文献获取：多后端检索、去重、确认与可续传下载

pub mod confirm;
pub mod download;
mod engine;
pub mod providers;
pub mod types;

pub use engine::{CATALOG_FILE, ResearchEngine, dedup_first_seen, load_catalog, write_catalog};
pub use types::{
    AcquisitionReport, AcquisitionRequest, DateRange, DownloadOutcome, FetchMode, ResearchPaper,
    SourceKind,
};
