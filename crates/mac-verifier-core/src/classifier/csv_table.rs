use std::{
    fs::File,
    io::{self, Write},
    path::Path,
};

use csv::{ReaderBuilder, StringRecord, Terminator, WriterBuilder};
use tempfile::NamedTempFile;

use super::{
    AnnotatedRecord, RecordSink, RecordSource, ScanRecord, SourceLoadError, BSSID_COLUMN,
    CHECKED_COLUMN, KNOWN_COLUMN, SSID_COLUMN,
};

/// Reads scan exports from and writes checked tables to comma-separated files.
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvTable;

impl CsvTable {
    pub fn new() -> Self {
        Self
    }

    fn column_index(headers: &StringRecord, column: &'static str) -> Result<usize, SourceLoadError> {
        headers
            .iter()
            .position(|header| header.trim_start_matches('\u{feff}') == column)
            .ok_or(SourceLoadError::MissingColumn { column })
    }

    fn read_records<R: io::Read>(reader: R) -> Result<Vec<ScanRecord>, SourceLoadError> {
        let mut reader = ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers = reader.headers()?.clone();
        if headers.is_empty() {
            return Err(SourceLoadError::MissingHeader);
        }
        let ssid = Self::column_index(&headers, SSID_COLUMN)?;
        let bssid = Self::column_index(&headers, BSSID_COLUMN)?;

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row?;
            if row.len() > headers.len() {
                return Err(SourceLoadError::RaggedRow {
                    line: row.position().map(|pos| pos.line()).unwrap_or_default(),
                    expected: headers.len(),
                    found: row.len(),
                });
            }
            records.push(ScanRecord {
                network_name: cell(&row, ssid),
                device_id: cell(&row, bssid),
            });
        }
        Ok(records)
    }

    fn render(records: &[AnnotatedRecord]) -> io::Result<Vec<u8>> {
        let mut writer = WriterBuilder::new()
            .terminator(Terminator::Any(b'\n'))
            .from_writer(Vec::new());
        writer.write_record([SSID_COLUMN, BSSID_COLUMN, KNOWN_COLUMN, CHECKED_COLUMN])?;
        for record in records {
            writer.write_record([
                record.network_name.as_str(),
                record.device_id.as_deref().unwrap_or_default(),
                record.known_identifier.as_deref().unwrap_or_default(),
                record.label.as_str(),
            ])?;
        }
        writer.into_inner().map_err(|err| err.into_error())
    }
}

/// Stage the contents produced by `fill` beside `path` and move them into
/// place only once `fill` succeeds. A failure leaves `path` as it was.
fn replace_file<F>(path: &Path, fill: F) -> io::Result<()>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut staged = NamedTempFile::new_in(dir)?;
    fill(staged.as_file_mut())?;
    staged.as_file().sync_all()?;
    staged.persist(path).map_err(|err| err.error)?;
    Ok(())
}

fn cell(row: &StringRecord, idx: usize) -> Option<String> {
    row.get(idx)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

impl RecordSource for CsvTable {
    fn load_records(&self, path: &Path) -> Result<Vec<ScanRecord>, SourceLoadError> {
        let file = File::open(path).map_err(SourceLoadError::Open)?;
        Self::read_records(io::BufReader::new(file))
    }
}

impl RecordSink for CsvTable {
    fn store_records(&self, path: &Path, records: &[AnnotatedRecord]) -> io::Result<()> {
        let bytes = Self::render(records)?;
        replace_file(path, |file| file.write_all(&bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Label;
    use std::fs;

    fn load(contents: &str) -> Result<Vec<ScanRecord>, SourceLoadError> {
        CsvTable::read_records(contents.as_bytes())
    }

    #[test]
    fn projects_named_columns_in_any_order() {
        let records = load("Channel,BSSID,RSSI,SSID\n6,AA:BB:CC:DD:EE:FF,-40,Expedient\n").unwrap();
        assert_eq!(
            records,
            vec![ScanRecord::new("Expedient", "AA:BB:CC:DD:EE:FF")]
        );
    }

    #[test]
    fn empty_cells_and_short_rows_are_missing_values() {
        let records = load("SSID,BSSID,Channel\n,aa:aa:aa:aa:aa:aa,1\nExpedient\n").unwrap();
        assert_eq!(records[0].network_name, None);
        assert_eq!(records[1].device_id, None);
    }

    #[test]
    fn quoted_fields_and_bom_are_handled() {
        let records = load("\u{feff}SSID,BSSID\n\"Expedient, Lobby\",aa:aa:aa:aa:aa:aa\n").unwrap();
        assert_eq!(
            records[0].network_name.as_deref(),
            Some("Expedient, Lobby")
        );
    }

    #[test]
    fn missing_bssid_column_is_reported() {
        let err = load("SSID,Channel\nExpedient,6\n").unwrap_err();
        assert!(matches!(
            err,
            SourceLoadError::MissingColumn { column } if column == BSSID_COLUMN
        ));
    }

    #[test]
    fn empty_file_has_no_header() {
        assert!(matches!(load(""), Err(SourceLoadError::MissingHeader)));
    }

    #[test]
    fn overlong_row_is_rejected() {
        let err = load("SSID,BSSID\nExpedient,aa:aa:aa:aa:aa:aa,extra\n").unwrap_err();
        assert!(matches!(
            err,
            SourceLoadError::RaggedRow {
                line: 2,
                expected: 2,
                found: 3
            }
        ));
    }

    #[test]
    fn missing_file_is_an_open_error() {
        let temp = tempfile::tempdir().unwrap();
        let err = CsvTable::new()
            .load_records(&temp.path().join("absent.csv"))
            .unwrap_err();
        assert!(matches!(err, SourceLoadError::Open(_)));
    }

    #[test]
    fn store_writes_four_columns_without_index() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("out.csv");
        let records = vec![
            AnnotatedRecord {
                network_name: "Expedient, Lobby".into(),
                device_id: Some("aa:aa:aa:aa:aa:aa".into()),
                known_identifier: Some("aa:aa:aa:aa:aa:aa".into()),
                label: Label::Match,
            },
            AnnotatedRecord {
                network_name: "ExpedientGuest".into(),
                device_id: None,
                known_identifier: None,
                label: Label::Mismatch,
            },
        ];
        CsvTable::new().store_records(&path, &records).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert_eq!(
            written,
            "SSID,BSSID,Known MACs,Checked\n\
             \"Expedient, Lobby\",aa:aa:aa:aa:aa:aa,aa:aa:aa:aa:aa:aa,Good MAC\n\
             ExpedientGuest,,,Bad MAC\n"
        );
    }

    #[test]
    fn store_into_missing_directory_leaves_nothing_behind() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("missing").join("out.csv");
        let err = CsvTable::new().store_records(&path, &[]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(!path.exists());
    }

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn interrupted_write_keeps_previous_output() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("scan_CHECKED.csv");
        fs::write(&path, "SSID,BSSID,Known MACs,Checked\n").unwrap();

        let err = replace_file(&path, |file| {
            file.write_all(b"SSID,BSS")?;
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        })
        .unwrap_err();

        assert_eq!(err.to_string(), "disk full");
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "SSID,BSSID,Known MACs,Checked\n"
        );
        assert_eq!(dir_entries(temp.path()), vec!["scan_CHECKED.csv"]);
    }

    #[test]
    fn interrupted_first_write_leaves_no_output() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("scan_CHECKED.csv");

        replace_file(&path, |file| {
            file.write_all(b"SSID,BSSID,Kn")?;
            Err(io::Error::new(io::ErrorKind::Other, "file too large"))
        })
        .unwrap_err();

        assert!(!path.exists());
        assert!(dir_entries(temp.path()).is_empty());
    }

    #[test]
    fn store_replaces_existing_output() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("out.csv");
        fs::write(&path, "stale").unwrap();

        CsvTable::new().store_records(&path, &[]).unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "SSID,BSSID,Known MACs,Checked\n"
        );
        assert_eq!(dir_entries(temp.path()), vec!["out.csv"]);
    }
}
