//! Batch job description and input pairing.

use std::fs;
use std::path::{Path, PathBuf};

use crate::core::errors::{KvMapError, KvMapResult, ProcessingStage};

/// Extensions recognized as target images when an image folder is given.
const IMAGE_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "tif", "tiff", "bmp", "webp"];

/// Folders and options of one batch run.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchJob {
    /// Template annotation document.
    pub template: PathBuf,
    /// Folder of generic OCR payloads, one `<stem>.json` per image.
    pub generic_dir: PathBuf,
    /// Folder of domain OCR payloads, one `<stem>.json` per image.
    pub domain_dir: PathBuf,
    /// Folder receiving one aligned `<stem>.json` per image.
    pub output_dir: PathBuf,
    /// Folder of target images. When absent, the generic OCR folder drives the run.
    pub image_dir: Option<PathBuf>,
    /// Write the compact export instead of the full document.
    pub compact: bool,
}

impl BatchJob {
    pub fn new(
        template: impl Into<PathBuf>,
        generic_dir: impl Into<PathBuf>,
        domain_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            template: template.into(),
            generic_dir: generic_dir.into(),
            domain_dir: domain_dir.into(),
            output_dir: output_dir.into(),
            image_dir: None,
            compact: false,
        }
    }

    pub fn with_image_dir(mut self, image_dir: impl Into<PathBuf>) -> Self {
        self.image_dir = Some(image_dir.into());
        self
    }

    pub fn with_compact(mut self, compact: bool) -> Self {
        self.compact = compact;
        self
    }

    /// Lists the items of the run, sorted by file name.
    pub fn items(&self) -> KvMapResult<Vec<BatchItem>> {
        let (dir, wanted): (&Path, &[&str]) = match &self.image_dir {
            Some(dir) => (dir.as_path(), &IMAGE_EXTENSIONS[..]),
            None => (self.generic_dir.as_path(), &["json"][..]),
        };

        let entries = fs::read_dir(dir).map_err(|e| {
            KvMapError::processing(
                ProcessingStage::BatchProcessing,
                format!("listing {}", dir.display()),
                e,
            )
        })?;

        let mut items = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() || !has_extension(&path, wanted) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let image = match &self.image_dir {
                Some(_) => path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or(stem)
                    .to_string(),
                None => stem.to_string(),
            };
            items.push(BatchItem {
                stem: stem.to_string(),
                image,
                generic: self.generic_dir.join(format!("{stem}.json")),
                domain: self.domain_dir.join(format!("{stem}.json")),
                output: self.output_dir.join(format!("{stem}.json")),
            });
        }
        items.sort_by(|a, b| a.image.cmp(&b.image));
        Ok(items)
    }
}

fn has_extension(path: &Path, wanted: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| wanted.iter().any(|w| ext.eq_ignore_ascii_case(w)))
}

/// One target image and the files that belong to it.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem {
    pub stem: String,
    /// Name written into the output document's `image` field.
    pub image: String,
    pub generic: PathBuf,
    pub domain: PathBuf,
    pub output: PathBuf,
}

impl BatchItem {
    /// Fails when either OCR payload is missing.
    pub fn check_counterparts(&self) -> KvMapResult<()> {
        if !self.generic.is_file() {
            return Err(KvMapError::missing_counterpart(&self.image, "generic OCR"));
        }
        if !self.domain.is_file() {
            return Err(KvMapError::missing_counterpart(&self.image, "domain OCR"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_items_follow_image_folder() {
        let root = tempfile::tempdir().unwrap();
        let images = root.path().join("images");
        fs::create_dir_all(&images).unwrap();
        fs::write(images.join("b.PNG"), b"").unwrap();
        fs::write(images.join("a.jpg"), b"").unwrap();
        fs::write(images.join("notes.txt"), b"").unwrap();

        let job = BatchJob::new("t.json", "g", "d", "out").with_image_dir(&images);
        let items = job.items().unwrap();
        let names: Vec<&str> = items.iter().map(|i| i.image.as_str()).collect();
        assert_eq!(names, vec!["a.jpg", "b.PNG"]);
        assert_eq!(items[1].generic, PathBuf::from("g").join("b.json"));
        assert_eq!(items[1].output, PathBuf::from("out").join("b.json"));
    }

    #[test]
    fn test_items_follow_generic_folder_without_images() {
        let root = tempfile::tempdir().unwrap();
        let generic = root.path().join("generic");
        fs::create_dir_all(&generic).unwrap();
        fs::write(generic.join("0001.json"), b"[]").unwrap();

        let job = BatchJob::new("t.json", &generic, root.path().join("domain"), "out");
        let items = job.items().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].image, "0001");
        assert!(matches!(
            items[0].check_counterparts(),
            Err(KvMapError::MissingCounterpart { .. })
        ));
    }

    #[test]
    fn test_unreadable_folder_is_an_error() {
        let job = BatchJob::new("t.json", "/nonexistent/generic", "d", "out");
        assert!(job.items().is_err());
    }
}
