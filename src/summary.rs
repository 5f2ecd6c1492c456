use crate::metadata::{round_to, ImageRecord};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// Aggregate over a finished run, computed once after all records are gathered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    pub total_images: usize,
    pub total_size_bytes: u64,
    pub formats: BTreeMap<String, usize>,
    pub orientations: BTreeMap<String, usize>,
    pub color_modes: BTreeMap<String, usize>,
    /// Mean over decoded images only; 0 when nothing decoded.
    pub average_quality_score: f64,
    /// Hashes seen more than once. Which paths share a hash is not tracked.
    pub duplicate_hashes: BTreeSet<String>,
    pub files_with_warnings: usize,
}

impl Summary {
    pub fn from_records(records: &[ImageRecord]) -> Self {
        let mut summary = Summary {
            total_images: records.len(),
            ..Summary::default()
        };
        let mut first_seen: HashMap<&str, &str> = HashMap::new();
        let mut quality_total = 0.0;
        let mut quality_count = 0usize;

        for record in records {
            summary.total_size_bytes += record.file_size_bytes;
            if !record.warnings.is_empty() {
                summary.files_with_warnings += 1;
            }

            if let Some(hash) = record.file_hash.as_deref() {
                if first_seen.contains_key(hash) {
                    summary.duplicate_hashes.insert(hash.to_string());
                } else {
                    first_seen.insert(hash, &record.file_path);
                }
            }

            if let Some(image) = &record.image {
                *summary.formats.entry(image.format.clone()).or_default() += 1;
                *summary
                    .orientations
                    .entry(image.orientation.to_string())
                    .or_default() += 1;
                if let Some(mode) = &image.color_mode {
                    *summary.color_modes.entry(mode.clone()).or_default() += 1;
                }
                quality_total += image.quality_score;
                quality_count += 1;
            }
        }

        if quality_count > 0 {
            summary.average_quality_score = round_to(quality_total / quality_count as f64, 2);
        }
        summary
    }

    pub fn total_size_mb(&self) -> f64 {
        round_to(self.total_size_bytes as f64 / (1024.0 * 1024.0), 2)
    }

    pub fn duplicate_count(&self) -> usize {
        self.duplicate_hashes.len()
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Summary:")?;
        writeln!(f, "Total images: {}", self.total_images)?;
        writeln!(f, "Total size: {:.2} MB", self.total_size_mb())?;
        writeln!(f, "Average quality score: {:.2}", self.average_quality_score)?;
        writeln!(f, "Duplicate images: {}", self.duplicate_count())?;
        if self.files_with_warnings > 0 {
            writeln!(f, "Files with warnings: {}", self.files_with_warnings)?;
        }
        write_histogram(f, "Formats", &self.formats)?;
        write_histogram(f, "Orientations", &self.orientations)?;
        write_histogram(f, "Color modes", &self.color_modes)
    }
}

fn write_histogram(
    f: &mut fmt::Formatter<'_>,
    title: &str,
    counts: &BTreeMap<String, usize>,
) -> fmt::Result {
    if counts.is_empty() {
        return Ok(());
    }
    writeln!(f, "{}:", title)?;
    for (name, count) in counts {
        writeln!(f, "  {}: {}", name, count)?;
    }
    Ok(())
}
