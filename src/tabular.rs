//! CSV input and output
//!
//! Thin adapters between files and the pipeline types: a raw record reader,
//! the hashed dataset format (written by the hashing pass, read back by the
//! matcher), the bad-phone side file and the match report.
//!
//! Input bytes are decoded as UTF-8 where valid and as Latin-1 otherwise,
//! so exports from legacy systems read without loss. Output is UTF-8.

use crate::algorithms::fingerprint::Fingerprint;
use crate::hashing::{BadPhoneRecord, HashSink, HashedRecord};
use crate::indexing::Category;
use crate::matching::MatchOutcome;
use crate::schema::RawRecord;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

pub const HASHED_HEADER: [&str; 6] = [
    "Pseudonym",
    "Phone Hash 1",
    "Phone Hash 2",
    "Phone Hash 3",
    "Personal Info Hash",
    "Email Hash",
];

pub const BAD_PHONE_HEADER: [&str; 4] = [
    "Pseudonym",
    "OriginalPhoneInput",
    "PhoneFieldLabel",
    "ReasonForFailure",
];

pub const MATCH_REPORT_HEADER: [&str; 8] = [
    "Pseudonym1",
    "Pseudonym2",
    "Phone Match",
    "Email Match",
    "Personal Info Match",
    "Matched Phone Hashes",
    "Matched Personal Info Hash",
    "Matched Email Hash",
];

/// I/O failures, always naming the file involved
#[derive(Error, Debug)]
pub enum TabularError {
    #[error("cannot open {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot create {}", path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed CSV in {}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("cannot write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl TabularError {
    fn csv(path: &Path, source: csv::Error) -> Self {
        TabularError::Csv {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Decode one CSV field, falling back to Latin-1 for non-UTF-8 bytes
pub fn decode_field(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Cow::Borrowed(s),
        Err(_) => Cow::Owned(bytes.iter().map(|&b| char::from(b)).collect()),
    }
}

fn decode_record(record: &csv::ByteRecord) -> csv::StringRecord {
    record.iter().map(decode_field).collect()
}

fn open(path: &Path) -> Result<BufReader<File>, TabularError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| TabularError::Open {
            path: path.to_path_buf(),
            source,
        })
}

fn create(path: &Path) -> Result<BufWriter<File>, TabularError> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|source| TabularError::Create {
            path: path.to_path_buf(),
            source,
        })
}

fn csv_writer<W: Write>(writer: W) -> csv::Writer<W> {
    csv::WriterBuilder::new().has_headers(false).from_writer(writer)
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader)
}

// ============================================================================
// Raw records
// ============================================================================

/// Streams raw records from a CSV source in file order
pub struct RawRecordReader<R: Read> {
    reader: csv::Reader<R>,
    headers: Vec<String>,
    path: PathBuf,
    row: csv::ByteRecord,
}

impl RawRecordReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TabularError> {
        let path = path.as_ref();
        Self::from_reader(open(path)?, path)
    }
}

impl<R: Read> RawRecordReader<R> {
    /// Wrap any reader; `path` is only used in error messages
    pub fn from_reader(reader: R, path: impl Into<PathBuf>) -> Result<Self, TabularError> {
        let path = path.into();
        let mut reader = csv_reader(reader);
        let headers = reader
            .byte_headers()
            .map_err(|e| TabularError::csv(&path, e))?
            .iter()
            .map(|h| decode_field(h).into_owned())
            .collect();
        Ok(Self {
            reader,
            headers,
            path,
            row: csv::ByteRecord::new(),
        })
    }

    /// Column names in file order
    pub fn headers(&self) -> &[String] {
        &self.headers
    }
}

impl<R: Read> Iterator for RawRecordReader<R> {
    type Item = Result<RawRecord, TabularError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.read_byte_record(&mut self.row) {
            Ok(true) => Some(Ok(RawRecord::from_row(
                self.headers.iter().map(String::as_str),
                self.row.iter().map(|field| decode_field(field).into_owned()),
            ))),
            Ok(false) => None,
            Err(e) => Some(Err(TabularError::csv(&self.path, e))),
        }
    }
}

// ============================================================================
// Hashed datasets
// ============================================================================

/// On-disk row of a hashed dataset
#[derive(Debug, Serialize, Deserialize)]
struct HashedRow {
    #[serde(rename = "Pseudonym")]
    pseudonym: String,
    #[serde(rename = "Phone Hash 1", default)]
    phone_hash_1: Option<String>,
    #[serde(rename = "Phone Hash 2", default)]
    phone_hash_2: Option<String>,
    #[serde(rename = "Phone Hash 3", default)]
    phone_hash_3: Option<String>,
    #[serde(rename = "Personal Info Hash", default)]
    personal_info_hash: Option<String>,
    #[serde(rename = "Email Hash", default)]
    email_hash: Option<String>,
}

impl From<&HashedRecord> for HashedRow {
    fn from(record: &HashedRecord) -> Self {
        let hex = |fp: &Option<Fingerprint>| fp.as_ref().map(|f| f.as_str().to_string());
        Self {
            pseudonym: record.pseudonym.clone(),
            phone_hash_1: hex(&record.phone_hashes[0]),
            phone_hash_2: hex(&record.phone_hashes[1]),
            phone_hash_3: hex(&record.phone_hashes[2]),
            personal_info_hash: hex(&record.personal_info_hash),
            email_hash: hex(&record.email_hash),
        }
    }
}

impl From<HashedRow> for HashedRecord {
    fn from(row: HashedRow) -> Self {
        let fp = |value: Option<String>| value.and_then(Fingerprint::from_hex);
        Self {
            pseudonym: row.pseudonym.trim().to_string(),
            phone_hashes: [
                fp(row.phone_hash_1),
                fp(row.phone_hash_2),
                fp(row.phone_hash_3),
            ],
            personal_info_hash: fp(row.personal_info_hash),
            email_hash: fp(row.email_hash),
        }
    }
}

/// Read a whole hashed dataset into memory.
///
/// The `Phone Hash 3` column is optional. Rows with a blank pseudonym
/// cannot be joined on and are skipped with a warning.
pub fn read_hashed_dataset(path: impl AsRef<Path>) -> Result<Vec<HashedRecord>, TabularError> {
    let path = path.as_ref();
    read_hashed(open(path)?, path)
}

/// [`read_hashed_dataset`] over any reader; `path` labels errors
pub fn read_hashed<R: Read>(reader: R, path: &Path) -> Result<Vec<HashedRecord>, TabularError> {
    let mut reader = csv_reader(reader);
    let headers = decode_record(reader.byte_headers().map_err(|e| TabularError::csv(path, e))?);

    let mut records = Vec::new();
    let mut skipped = 0usize;
    let mut row = csv::ByteRecord::new();
    while reader
        .read_byte_record(&mut row)
        .map_err(|e| TabularError::csv(path, e))?
    {
        let decoded = decode_record(&row);
        let parsed: HashedRow = decoded
            .deserialize(Some(&headers))
            .map_err(|e| TabularError::csv(path, e))?;
        let record = HashedRecord::from(parsed);
        if record.pseudonym.is_empty() {
            skipped += 1;
            continue;
        }
        records.push(record);
    }

    if skipped > 0 {
        warn!(path = %path.display(), skipped, "skipped hashed rows with blank pseudonym");
    }
    Ok(records)
}

/// Writes the hashed dataset and, optionally, the bad-phone side file
pub struct CsvHashSink<W: Write> {
    hashed: csv::Writer<W>,
    hashed_path: PathBuf,
    bad_phones: Option<BadPhoneWriter<W>>,
}

struct BadPhoneWriter<W: Write> {
    writer: csv::Writer<W>,
    path: PathBuf,
    columns: Vec<String>,
}

impl CsvHashSink<BufWriter<File>> {
    /// Create the output files and write their headers.
    ///
    /// `input_columns` are appended to the bad-phone header so every
    /// original value can be reviewed next to the failure.
    pub fn create(
        hashed_path: impl AsRef<Path>,
        bad_phone_path: Option<&Path>,
        input_columns: &[String],
    ) -> Result<Self, TabularError> {
        let hashed_path = hashed_path.as_ref();
        let hashed = create(hashed_path)?;
        let bad = match bad_phone_path {
            Some(path) => Some((create(path)?, path.to_path_buf())),
            None => None,
        };
        Self::new((hashed, hashed_path.to_path_buf()), bad, input_columns)
    }
}

impl<W: Write> CsvHashSink<W> {
    /// Wrap writers paired with the paths used in error messages
    pub fn new(
        hashed: (W, PathBuf),
        bad_phones: Option<(W, PathBuf)>,
        input_columns: &[String],
    ) -> Result<Self, TabularError> {
        let (hashed, hashed_path) = hashed;
        let mut hashed = csv_writer(hashed);
        hashed
            .write_record(HASHED_HEADER)
            .map_err(|e| TabularError::csv(&hashed_path, e))?;

        let bad_phones = match bad_phones {
            Some((writer, path)) => {
                let mut writer = csv_writer(writer);
                writer
                    .write_record(
                        BAD_PHONE_HEADER
                            .iter()
                            .copied()
                            .chain(input_columns.iter().map(String::as_str)),
                    )
                    .map_err(|e| TabularError::csv(&path, e))?;
                Some(BadPhoneWriter {
                    writer,
                    path,
                    columns: input_columns.to_vec(),
                })
            }
            None => None,
        };

        Ok(Self {
            hashed,
            hashed_path,
            bad_phones,
        })
    }

    /// Flush both files through to their writers and hand the writers back
    pub fn finish(self) -> Result<(W, Option<W>), TabularError> {
        let hashed = into_flushed(self.hashed, self.hashed_path)?;
        let bad = match self.bad_phones {
            Some(bad) => Some(into_flushed(bad.writer, bad.path)?),
            None => None,
        };
        Ok((hashed, bad))
    }
}

fn into_flushed<W: Write>(writer: csv::Writer<W>, path: PathBuf) -> Result<W, TabularError> {
    let mut inner = match writer.into_inner() {
        Ok(inner) => inner,
        Err(e) => {
            return Err(TabularError::Write {
                path,
                source: e.into_error(),
            })
        }
    };
    inner
        .flush()
        .map_err(|source| TabularError::Write { path, source })?;
    Ok(inner)
}

impl<W: Write> HashSink for CsvHashSink<W> {
    type Error = TabularError;

    fn write_hashed(&mut self, record: &HashedRecord) -> Result<(), TabularError> {
        self.hashed
            .serialize(HashedRow::from(record))
            .map_err(|e| TabularError::csv(&self.hashed_path, e))
    }

    fn write_bad_phone(&mut self, bad: &BadPhoneRecord) -> Result<(), TabularError> {
        let Some(out) = self.bad_phones.as_mut() else {
            return Ok(());
        };
        let reason = bad.reason();
        let fixed = [
            bad.pseudonym.as_str(),
            bad.original_input.as_str(),
            bad.slot.label(),
            reason.as_str(),
        ];
        let original = out
            .columns
            .iter()
            .map(|column| bad.raw.get_field(column).unwrap_or_default());
        out.writer
            .write_record(fixed.into_iter().chain(original))
            .map_err(|e| TabularError::csv(&out.path, e))
    }
}

// ============================================================================
// Match report
// ============================================================================

fn flag(matched: bool) -> &'static str {
    if matched {
        "Yes"
    } else {
        "No"
    }
}

/// Write one row per matched pseudonym pair, in first-match order
pub fn write_match_report<W: Write>(
    writer: W,
    path: &Path,
    outcome: &MatchOutcome<'_>,
    list_delimiter: &str,
) -> Result<W, TabularError> {
    let mut writer = csv_writer(writer);
    writer
        .write_record(MATCH_REPORT_HEADER)
        .map_err(|e| TabularError::csv(path, e))?;

    for ((pseudonym_1, pseudonym_2), evidence) in outcome.iter() {
        let joined = |category: Category| evidence.matched(category).join(list_delimiter);
        let phones = joined(Category::Phone);
        let personal_info = joined(Category::PersonalInfo);
        let emails = joined(Category::Email);
        writer
            .write_record([
                pseudonym_1,
                pseudonym_2,
                flag(evidence.is_match(Category::Phone)),
                flag(evidence.is_match(Category::Email)),
                flag(evidence.is_match(Category::PersonalInfo)),
                phones.as_str(),
                personal_info.as_str(),
                emails.as_str(),
            ])
            .map_err(|e| TabularError::csv(path, e))?;
    }

    into_flushed(writer, path.to_path_buf())
}

/// [`write_match_report`] to a newly created file
pub fn write_match_report_file(
    path: impl AsRef<Path>,
    outcome: &MatchOutcome<'_>,
    list_delimiter: &str,
) -> Result<(), TabularError> {
    let path = path.as_ref();
    write_match_report(create(path)?, path, outcome, list_delimiter)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchConfig;
    use crate::matching::match_datasets;

    fn label() -> PathBuf {
        PathBuf::from("memory.csv")
    }

    #[test]
    fn test_decode_field_latin1_fallback() {
        assert_eq!(decode_field("Zoë".as_bytes()), "Zoë");
        assert_eq!(decode_field(&[b'Z', b'o', 0xEB]), "Zoë");
    }

    #[test]
    fn test_raw_reader_preserves_order_and_decodes() {
        let input: &[u8] = b"pseudonym,City,Phone 1\nabc,Montr\xe9al,555\nshort\n";
        let reader = RawRecordReader::from_reader(input, label()).unwrap();
        assert_eq!(reader.headers(), &["pseudonym", "City", "Phone 1"]);

        let records: Vec<RawRecord> = reader.collect::<Result<_, _>>().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get_field("City"), Some("Montréal"));
        assert_eq!(records[1].get_field("pseudonym"), Some("short"));
        assert!(!records[1].has_field("City"));
    }

    #[test]
    fn test_hashed_round_trip_through_csv() {
        let record = HashedRecord {
            pseudonym: "alice".into(),
            phone_hashes: [Fingerprint::of("+15551234567"), None, None],
            personal_info_hash: Fingerprint::of("springfieldILsmitha"),
            email_hash: None,
        };
        let mut sink = CsvHashSink::new((Vec::new(), label()), None, &[]).unwrap();
        sink.write_hashed(&record).unwrap();
        let (bytes, bad) = sink.finish().unwrap();
        assert!(bad.is_none());

        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.starts_with(
            "Pseudonym,Phone Hash 1,Phone Hash 2,Phone Hash 3,Personal Info Hash,Email Hash\n"
        ));

        let back = read_hashed(bytes.as_slice(), &label()).unwrap();
        assert_eq!(back, vec![record]);
    }

    #[test]
    fn test_read_hashed_without_third_phone_column() {
        let input: &[u8] = b"Pseudonym,Phone Hash 1,Phone Hash 2,Personal Info Hash,Email Hash\n\
            p1,aa,,bb,\n\
            ,cc,,,\n";
        let records = read_hashed(input, &label()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].pseudonym, "p1");
        assert_eq!(records[0].phone_hashes[0].as_ref().map(|f| f.as_str()), Some("aa"));
        assert_eq!(records[0].phone_hashes[1], None);
        assert_eq!(records[0].phone_hashes[2], None);
        assert_eq!(records[0].email_hash, None);
    }

    #[test]
    fn test_read_hashed_missing_pseudonym_column() {
        let input: &[u8] = b"Name,Email Hash\np1,aa\n";
        let err = read_hashed(input, &label()).unwrap_err();
        assert!(matches!(err, TabularError::Csv { .. }));
        assert!(err.to_string().contains("memory.csv"));
    }

    #[test]
    fn test_bad_phone_rows_carry_original_columns() {
        use crate::hashing::{DatasetHasher, RecordOutcome};
        use crate::schema::FieldSchema;

        let columns = vec!["pseudonym".to_string(), "Phone 1".to_string(), "Note".to_string()];
        let raw = RawRecord::from_row(columns.iter().cloned(), ["p1", "12", "vip"]);
        let hasher = DatasetHasher::new(FieldSchema::standard(), Default::default());
        let RecordOutcome::Hashed(entry) = hasher.hash_record(&raw) else {
            panic!("record was skipped");
        };

        let mut sink =
            CsvHashSink::new((Vec::new(), label()), Some((Vec::new(), label())), &columns).unwrap();
        for bad in &entry.bad_phones {
            sink.write_bad_phone(bad).unwrap();
        }
        let (_, bad) = sink.finish().unwrap();
        let text = String::from_utf8(bad.unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Pseudonym,OriginalPhoneInput,PhoneFieldLabel,ReasonForFailure,pseudonym,Phone 1,Note",
                "p1,12,md_us_phone_1,Not a possible number,p1,12,vip",
            ]
        );
    }

    #[test]
    fn test_match_report_rows() {
        let left = vec![HashedRecord {
            pseudonym: "alice123".into(),
            email_hash: Fingerprint::of("alice@x.com"),
            ..Default::default()
        }];
        let right = vec![HashedRecord {
            pseudonym: "a_9".into(),
            email_hash: Fingerprint::of("alice@x.com"),
            ..Default::default()
        }];
        let outcome = match_datasets(&left, &right, &MatchConfig::default()).unwrap();
        let bytes = write_match_report(Vec::new(), &label(), &outcome, "|").unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], MATCH_REPORT_HEADER.join(","));
        let email = Fingerprint::of("alice@x.com").unwrap();
        assert_eq!(lines[1], format!("alice123,a_9,No,Yes,No,,,{email}"));
        assert_eq!(lines.len(), 2);
    }
}
