//! Loading and converting many files at once.
//!
//! Files are independent, so each one is handled on the rayon pool and gets
//! its own result; one bad file never fails the batch.

use super::{load_file_with_notifications, save_with_config, IoConfiguration};
use crate::error::Result;
use crate::notification::NotificationCollection;
use crate::pattern::Pattern;
use rayon::prelude::*;
use std::path::{Path, PathBuf};

/// Outcome of loading one file of a batch
#[derive(Debug)]
pub struct BatchItem {
    pub path: PathBuf,
    pub result: Result<(Pattern, NotificationCollection)>,
}

impl BatchItem {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Load every path in parallel; results keep the input order
pub fn load_many<P: AsRef<Path> + Sync>(paths: &[P]) -> Vec<BatchItem> {
    let items: Vec<BatchItem> = paths
        .par_iter()
        .map(|path| BatchItem {
            path: path.as_ref().to_path_buf(),
            result: load_file_with_notifications(path, None),
        })
        .collect();
    tracing::debug!(
        files = items.len(),
        failed = items.iter().filter(|i| !i.is_ok()).count(),
        "loaded batch"
    );
    items
}

/// Encode many patterns into one format in parallel
pub fn save_many(
    patterns: &[Pattern],
    format: &str,
    config: &IoConfiguration,
) -> Vec<Result<(Vec<u8>, NotificationCollection)>> {
    patterns
        .par_iter()
        .map(|pattern| save_with_config(pattern, format, config))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EmbroideryError;
    use crate::io::save_file;
    use crate::pattern::StitchType;
    use crate::types::Vector2;
    use std::fs;

    fn square() -> Pattern {
        let mut p = Pattern::new();
        let layer = p.add_layer("0");
        p.add_thread(crate::io::stitch_stream::default_thread(0));
        for (x, y) in [(0.0, 0.0), (40.0, 0.0), (40.0, 40.0), (0.0, 40.0)] {
            p.add_stitch(layer, Vector2::new(x, y), StitchType::Normal).unwrap();
        }
        p
    }

    #[test]
    fn test_load_many_keeps_order_and_failures() {
        let dir = std::env::temp_dir().join(format!("embroidery-batch-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let good = dir.join("square.jef");
        let missing = dir.join("missing.dst");
        save_file(&good, &square(), "jef").unwrap();

        let items = load_many(&[good.clone(), missing.clone()]);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].path, good);
        assert!(items[0].is_ok());
        assert!(matches!(items[1].result, Err(EmbroideryError::Io(_))));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_save_many() {
        let results = save_many(&[square(), Pattern::new()], "hus", &IoConfiguration::default());
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(EmbroideryError::UnsupportedFeature(_))));
    }
}
