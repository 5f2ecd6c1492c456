use crate::error::AppError;
use crate::metadata::{FieldValue, ImageRecord};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::ffi::OsString;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// Writes records as CSV. The header is the sorted union of every record's columns,
/// so all records must be in hand before the first row goes out.
pub fn write_records(records: &[ImageRecord], output: &Path) -> Result<(), AppError> {
    let rows: Vec<Vec<(String, FieldValue)>> = records.iter().map(ImageRecord::columns).collect();
    let header = collect_columns(&rows);
    log::debug!("Writing {} rows with {} columns", rows.len(), header.len());

    write_atomically(output, |wtr| {
        wtr.write_record(&header)?;
        for row in &rows {
            let values: HashMap<&str, &FieldValue> =
                row.iter().map(|(k, v)| (k.as_str(), v)).collect();
            wtr.write_record(header.iter().map(|column| {
                values
                    .get(column.as_str())
                    .map(|v| v.to_string())
                    .unwrap_or_default()
            }))?;
        }
        Ok(())
    })
}

/// Writes serializable rows with a header taken from the row type's field names.
pub fn write_rows<T: Serialize>(rows: &[T], output: &Path) -> Result<(), AppError> {
    write_atomically(output, |wtr| {
        for row in rows {
            wtr.serialize(row)?;
        }
        Ok(())
    })
}

pub fn collect_columns(rows: &[Vec<(String, FieldValue)>]) -> Vec<String> {
    rows.iter()
        .flat_map(|row| row.iter().map(|(k, _)| k.clone()))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Fills a sibling temp file and renames it over `output` only once it is complete.
fn write_atomically<F>(output: &Path, fill: F) -> Result<(), AppError>
where
    F: FnOnce(&mut csv::Writer<File>) -> Result<(), AppError>,
{
    let partial = partial_path(output);
    let result = File::create(&partial)
        .map_err(AppError::from)
        .and_then(|file| {
            let mut wtr = csv::Writer::from_writer(file);
            fill(&mut wtr)?;
            wtr.flush()?;
            Ok(())
        })
        .and_then(|()| fs::rename(&partial, output).map_err(AppError::from));

    if result.is_err() {
        let _ = fs::remove_file(&partial);
    }
    result
}

fn partial_path(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("output.csv"));
    name.push(".partial");
    output.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ImageProperties;

    fn read_back(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
        let mut reader = csv::Reader::from_path(path).unwrap();
        let header = reader.headers().unwrap().iter().map(String::from).collect();
        let rows = reader
            .records()
            .map(|r| r.unwrap().iter().map(String::from).collect())
            .collect();
        (header, rows)
    }

    #[test]
    fn header_is_sorted_union_and_rows_are_complete() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.csv");

        let mut with_exif = ImageRecord::new(Path::new("/scan/a.jpg"), 1);
        with_exif.image = Some(ImageProperties::new(4, 3, "JPEG".into(), Some("RGB".into()), Some(24), 1));
        with_exif
            .exif
            .insert("exif_make".into(), FieldValue::Text("Nikon".into()));
        let mut other_exif = ImageRecord::new(Path::new("/scan/b.jpg"), 2);
        other_exif
            .exif
            .insert("exif_artist".into(), FieldValue::Text("Ann, B.".into()));
        let records = vec![with_exif, other_exif];

        write_records(&records, &output).unwrap();
        let (header, rows) = read_back(&output);

        let expected_columns: BTreeSet<String> = records
            .iter()
            .flat_map(|r| r.columns().into_iter().map(|(k, _)| k))
            .collect();
        assert_eq!(header.len(), expected_columns.len());
        let mut sorted = header.clone();
        sorted.sort();
        assert_eq!(header, sorted);

        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| row.len() == header.len()));

        let idx = |name: &str| header.iter().position(|h| h == name).unwrap();
        assert_eq!(rows[0][idx("filename")], "a.jpg");
        assert_eq!(rows[1][idx("filename")], "b.jpg");
        assert_eq!(rows[0][idx("exif_make")], "Nikon");
        assert_eq!(rows[0][idx("exif_artist")], "");
        assert_eq!(rows[1][idx("exif_artist")], "Ann, B.");
        assert_eq!(rows[1][idx("width")], "");
        // creation/modification times were never set on these records
        assert_eq!(rows[0][idx("last_modified")], "");
    }

    #[test]
    fn existing_output_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.csv");
        fs::write(&output, "stale,content\n1,2\n3,4\n").unwrap();

        write_records(&[ImageRecord::new(Path::new("x.png"), 0)], &output).unwrap();

        let (header, rows) = read_back(&output);
        assert!(header.contains(&"filename".to_string()));
        assert_eq!(rows.len(), 1);
        assert!(!partial_path(&output).exists());
    }

    #[test]
    fn unwritable_destination_fails_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("missing-dir").join("out.csv");

        let result = write_records(&[ImageRecord::new(Path::new("x.png"), 0)], &output);
        assert!(matches!(result, Err(AppError::Io(_))));
        assert!(!output.exists());
        assert!(!partial_path(&output).exists());
    }

    #[test]
    fn serialized_rows_keep_field_order() {
        #[derive(Serialize)]
        struct Row {
            name: &'static str,
            value: Option<f64>,
        }

        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("rows.csv");
        write_rows(
            &[Row { name: "a", value: Some(1.5) }, Row { name: "b", value: None }],
            &output,
        )
        .unwrap();

        assert_eq!(fs::read_to_string(&output).unwrap(), "name,value\na,1.5\nb,\n");
    }
}
