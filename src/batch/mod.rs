//! Folder-level batch alignment.
//!
//! A batch pairs every target image (or generic OCR file) with `<stem>.json`
//! in the generic and domain OCR folders, aligns the template onto each pair
//! and writes one output document per image. A failing image never stops
//! the run; it is recorded in the [`BatchReport`].

pub mod job;
pub mod report;
pub mod runner;

pub use job::{BatchItem, BatchJob};
pub use report::{BatchEntry, BatchReport, EntryStatus};
pub use runner::BatchRunner;
