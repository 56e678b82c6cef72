//! Uploaded-file inspection.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use async_trait::async_trait;
use calamine::{Reader, Sheets, XlsError, XlsxError, open_workbook};
use serde_json::{Map, Number, Value};
use tracing::{info, warn};

use crate::error::{AgentError, Result};
use crate::tool::FileAnalyzer;
use crate::types::{FileMetadata, FileMetadataMap};

/// Rows included in [`FileMetadata::sample_data`].
pub const SAMPLE_ROWS: usize = 10;

/// Column type labels, named the way pandas reports them so generated code
/// and metadata agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dtype {
    Int,
    Float,
    Bool,
    Object,
}

impl Dtype {
    fn label(self) -> &'static str {
        match self {
            Dtype::Int => "int64",
            Dtype::Float => "float64",
            Dtype::Bool => "bool",
            Dtype::Object => "object",
        }
    }

    fn is_numeric(self) -> bool {
        matches!(self, Dtype::Int | Dtype::Float)
    }

    /// Infer from the non-empty values of a column.
    #[cfg(test)]
    fn infer<'a>(values: impl Iterator<Item = &'a str>, has_empty: bool) -> Self {
        let mut tally = ColumnTally::default();
        values.for_each(|v| tally.observe(v));
        tally.has_empty = has_empty;
        tally.dtype()
    }

    fn to_value(self, raw: &str) -> Value {
        if raw.is_empty() {
            return Value::Null;
        }
        match self {
            Dtype::Int => raw.parse::<i64>().map(Value::from).unwrap_or(Value::Null),
            Dtype::Float => raw
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Dtype::Bool => parse_bool(raw).map(Value::Bool).unwrap_or(Value::Null),
            Dtype::Object => Value::String(raw.to_string()),
        }
    }
}

/// Running dtype evidence for one column, updated a cell at a time.
#[derive(Debug, Clone, Copy)]
struct ColumnTally {
    int: bool,
    float: bool,
    boolean: bool,
    any: bool,
    has_empty: bool,
}

impl Default for ColumnTally {
    fn default() -> Self {
        Self {
            int: true,
            float: true,
            boolean: true,
            any: false,
            has_empty: false,
        }
    }
}

impl ColumnTally {
    fn observe(&mut self, value: &str) {
        if value.is_empty() {
            self.has_empty = true;
            return;
        }
        self.any = true;
        self.int &= value.parse::<i64>().is_ok();
        self.float &= value.parse::<f64>().is_ok();
        self.boolean &= parse_bool(value).is_some();
    }

    fn dtype(&self) -> Dtype {
        match (self.any, self.int, self.float, self.boolean) {
            // An all-empty column reads as missing numbers.
            (false, ..) => Dtype::Float,
            (true, true, _, _) if self.has_empty => Dtype::Float,
            (true, true, _, _) => Dtype::Int,
            (true, _, true, _) => Dtype::Float,
            (true, _, _, true) if !self.has_empty => Dtype::Bool,
            _ => Dtype::Object,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Builds [`FileMetadata`] for uploaded CSV and Excel files.
///
/// Excel workbooks are read from their first worksheet. Files with other
/// extensions are logged and skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct TabularFileAnalyzer;

/// Upload formats the analyzer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Csv,
    Xlsx,
    Xls,
}

impl Format {
    fn of(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(Format::Csv),
            "xlsx" => Some(Format::Xlsx),
            "xls" => Some(Format::Xls),
            _ => None,
        }
    }
}

impl TabularFileAnalyzer {
    /// Analyze one CSV file synchronously.
    pub fn analyze_csv(path: &Path) -> Result<FileMetadata> {
        let fail = |e: csv::Error| AgentError::collaborator(format!("{}: {e}", path.display()));
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(fail)?;

        let columns: Vec<String> = reader
            .headers()
            .map_err(fail)?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let rows = reader.into_records().map(|record| {
            record
                .map(|r| r.iter().map(|v| v.trim().to_string()).collect::<Vec<String>>())
                .map_err(fail)
        });
        summarize(path, columns, rows)
    }

    /// Analyze the first worksheet of an Excel workbook synchronously.
    ///
    /// The first row is the header. `.xls` selects the legacy reader, anything
    /// else is read as `.xlsx`.
    pub fn analyze_excel(path: &Path) -> Result<FileMetadata> {
        let fail = |e: calamine::Error| AgentError::collaborator(format!("{}: {e}", path.display()));
        let legacy = Format::of(path) == Some(Format::Xls);
        let mut workbook: Sheets<BufReader<File>> = if legacy {
            Sheets::Xls(open_workbook(path).map_err(|e: XlsError| fail(e.into()))?)
        } else {
            Sheets::Xlsx(open_workbook(path).map_err(|e: XlsxError| fail(e.into()))?)
        };
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| AgentError::collaborator(format!("{}: workbook has no sheets", path.display())))?
            .map_err(fail)?;

        let mut rows = range
            .rows()
            .map(|row| row.iter().map(cell_text).collect::<Vec<String>>());
        let columns = rows.next().unwrap_or_default();
        summarize(path, columns, rows.map(Ok))
    }

    fn analyze_path(path: &Path, format: Format) -> Result<FileMetadata> {
        match format {
            Format::Csv => Self::analyze_csv(path),
            Format::Xlsx | Format::Xls => Self::analyze_excel(path),
        }
    }
}

fn cell_text(cell: &calamine::Data) -> String {
    match cell {
        calamine::Data::Empty => String::new(),
        calamine::Data::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

/// Fold rows into metadata in one pass, keeping only the sample rows.
fn summarize<I>(path: &Path, columns: Vec<String>, rows: I) -> Result<FileMetadata>
where
    I: Iterator<Item = Result<Vec<String>>>,
{
    let mut tallies = vec![ColumnTally::default(); columns.len()];
    let mut sample: Vec<Vec<String>> = Vec::with_capacity(SAMPLE_ROWS);
    let mut row_count = 0;

    for row in rows {
        let mut row = row?;
        row.resize(columns.len(), String::new());
        for (tally, value) in tallies.iter_mut().zip(&row) {
            tally.observe(value);
        }
        if sample.len() < SAMPLE_ROWS {
            sample.push(row);
        }
        row_count += 1;
    }

    let dtypes: Vec<Dtype> = tallies.iter().map(ColumnTally::dtype).collect();
    let sample_data = sample
        .iter()
        .map(|row| {
            columns
                .iter()
                .zip(&dtypes)
                .zip(row)
                .map(|((col, dtype), raw)| (col.clone(), dtype.to_value(raw)))
                .collect::<Map<String, Value>>()
        })
        .collect();

    let pick = |keep: fn(Dtype) -> bool| -> Vec<String> {
        columns
            .iter()
            .zip(&dtypes)
            .filter(|(_, d)| keep(**d))
            .map(|(c, _)| c.clone())
            .collect()
    };

    let metadata = FileMetadata {
        filename: path.display().to_string(),
        rows: row_count,
        numeric_columns: pick(Dtype::is_numeric),
        categorical_columns: pick(|d| d == Dtype::Object),
        dtypes: columns
            .iter()
            .zip(&dtypes)
            .map(|(c, d)| (c.clone(), d.label().to_string()))
            .collect::<BTreeMap<_, _>>(),
        has_nulls: tallies.iter().any(|t| t.has_empty),
        columns,
        sample_data,
    };
    info!(
        file = %metadata.filename,
        rows = metadata.rows,
        columns = metadata.columns.len(),
        "Analyzed file"
    );
    Ok(metadata)
}

#[async_trait]
impl FileAnalyzer for TabularFileAnalyzer {
    async fn analyze(&self, paths: &[String]) -> Result<FileMetadataMap> {
        let paths = paths.to_vec();
        tokio::task::spawn_blocking(move || {
            let mut results = FileMetadataMap::new();
            for raw in paths {
                let path = Path::new(&raw);
                let Some(format) = Format::of(path) else {
                    warn!(file = %raw, "Unsupported file type, skipping analysis");
                    continue;
                };
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| raw.clone());
                results.insert(name, Self::analyze_path(path, format)?);
            }
            Ok(results)
        })
        .await
        .map_err(|e| AgentError::internal(format!("File analysis task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> String {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path.display().to_string()
    }

    #[test]
    fn test_dtype_inference() {
        assert_eq!(Dtype::infer(["1", "2"].into_iter(), false), Dtype::Int);
        assert_eq!(Dtype::infer(["1", "2"].into_iter(), true), Dtype::Float);
        assert_eq!(Dtype::infer(["1.5", "2"].into_iter(), false), Dtype::Float);
        assert_eq!(Dtype::infer(["True", "false"].into_iter(), false), Dtype::Bool);
        assert_eq!(Dtype::infer(["true", "x"].into_iter(), false), Dtype::Object);
        assert_eq!(Dtype::infer(std::iter::empty(), true), Dtype::Float);
    }

    #[tokio::test]
    async fn test_analyze_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "sales.csv",
            "Region,Amount,Units,Active\nnorth,10.5,3,true\nsouth,7,,false\neast,1e2,4,true\n",
        );

        let result = TabularFileAnalyzer.analyze(&[path]).await.unwrap();
        let meta = &result["sales.csv"];

        assert_eq!(meta.shape(), (3, 4));
        assert_eq!(meta.columns, vec!["Region", "Amount", "Units", "Active"]);
        assert_eq!(meta.dtypes["Region"], "object");
        assert_eq!(meta.dtypes["Amount"], "float64");
        assert_eq!(meta.dtypes["Units"], "float64");
        assert_eq!(meta.dtypes["Active"], "bool");
        assert_eq!(meta.numeric_columns, vec!["Amount", "Units"]);
        assert_eq!(meta.categorical_columns, vec!["Region"]);
        assert!(meta.has_nulls);
        assert_eq!(meta.sample_data.len(), 3);
        assert_eq!(meta.sample_data[1]["Units"], Value::Null);
        assert_eq!(meta.sample_data[0]["Region"], json!("north"));
        assert_eq!(meta.sample_data[0]["Active"], json!(true));
    }

    #[tokio::test]
    async fn test_sample_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let mut contents = String::from("n\n");
        for i in 0..25 {
            contents.push_str(&format!("{i}\n"));
        }
        let path = write_file(&dir, "numbers.CSV", &contents);

        let result = TabularFileAnalyzer.analyze(&[path]).await.unwrap();
        let meta = &result["numbers.CSV"];
        assert_eq!(meta.rows, 25);
        assert_eq!(meta.dtypes["n"], "int64");
        assert!(!meta.has_nulls);
        assert_eq!(meta.sample_data.len(), SAMPLE_ROWS);
    }

    #[tokio::test]
    async fn test_unsupported_skipped_and_missing_fails() {
        let dir = tempfile::tempdir().unwrap();
        let json = write_file(&dir, "data.json", "{}");
        assert!(TabularFileAnalyzer.analyze(&[json]).await.unwrap().is_empty());

        let missing = dir.path().join("missing.csv").display().to_string();
        assert!(matches!(
            TabularFileAnalyzer.analyze(&[missing]).await,
            Err(AgentError::Collaborator(_))
        ));
    }

    #[test]
    fn test_tally_matches_batch_inference() {
        let mut tally = ColumnTally::default();
        for value in ["1", "", "3"] {
            tally.observe(value);
        }
        assert!(tally.has_empty);
        assert_eq!(tally.dtype(), Dtype::Float);
        assert_eq!(ColumnTally::default().dtype(), Dtype::Float);
    }

    #[tokio::test]
    async fn test_late_rows_still_shape_dtypes() {
        let dir = tempfile::tempdir().unwrap();
        let mut contents = String::from("code,score\n");
        for i in 0..(SAMPLE_ROWS * 3) {
            contents.push_str(&format!("{i},{i}\n"));
        }
        // Past the sample: a non-numeric code and a missing score.
        contents.push_str("X9,\n");
        let path = write_file(&dir, "late.csv", &contents);

        let result = TabularFileAnalyzer.analyze(&[path]).await.unwrap();
        let meta = &result["late.csv"];
        assert_eq!(meta.rows, SAMPLE_ROWS * 3 + 1);
        assert_eq!(meta.sample_data.len(), SAMPLE_ROWS);
        assert_eq!(meta.dtypes["code"], "object");
        assert_eq!(meta.dtypes["score"], "float64");
        assert!(meta.has_nulls);
        assert_eq!(meta.sample_data[0]["code"], json!("0"));
    }

    /// Write a one-sheet `.xlsx` using inline strings.
    fn write_xlsx(dir: &tempfile::TempDir, name: &str, rows: &[&[&str]]) -> String {
        fn cell(reference: String, value: &str) -> String {
            if value.is_empty() {
                String::new()
            } else if value.parse::<f64>().is_ok() {
                format!(r#"<c r="{reference}"><v>{value}</v></c>"#)
            } else {
                format!(r#"<c r="{reference}" t="inlineStr"><is><t>{value}</t></is></c>"#)
            }
        }

        let mut sheet_rows = String::new();
        for (r, row) in rows.iter().enumerate() {
            let cells: String = row
                .iter()
                .enumerate()
                .map(|(c, value)| cell(format!("{}{}", (b'A' + c as u8) as char, r + 1), value))
                .collect();
            sheet_rows.push_str(&format!(r#"<row r="{}">{cells}</row>"#, r + 1));
        }

        let parts = [
            (
                "[Content_Types].xml",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/></Types>"#.to_string(),
            ),
            (
                "_rels/.rels",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#.to_string(),
            ),
            (
                "xl/workbook.xml",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Sales" sheetId="1" r:id="rId1"/></sheets></workbook>"#.to_string(),
            ),
            (
                "xl/_rels/workbook.xml.rels",
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#.to_string(),
            ),
            (
                "xl/worksheets/sheet1.xml",
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{sheet_rows}</sheetData></worksheet>"#
                ),
            ),
        ];

        let path = dir.path().join(name);
        let mut zip = zip::ZipWriter::new(std::fs::File::create(&path).unwrap());
        for (part, contents) in parts {
            let options =
                SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
            zip.start_file(part, options).unwrap();
            zip.write_all(contents.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
        path.display().to_string()
    }

    #[tokio::test]
    async fn test_analyze_excel_first_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_xlsx(
            &dir,
            "Q1.XLSX",
            &[
                &["Region", "Amount", "Units"],
                &["north", "10.5", "3"],
                &["south", "7", ""],
                &["east", "2.25", "4"],
            ],
        );

        let result = TabularFileAnalyzer.analyze(&[path]).await.unwrap();
        let meta = &result["Q1.XLSX"];

        assert_eq!(meta.shape(), (3, 3));
        assert_eq!(meta.columns, vec!["Region", "Amount", "Units"]);
        assert_eq!(meta.dtypes["Region"], "object");
        assert_eq!(meta.dtypes["Amount"], "float64");
        assert_eq!(meta.numeric_columns, vec!["Amount", "Units"]);
        assert_eq!(meta.categorical_columns, vec!["Region"]);
        assert!(meta.has_nulls);
        assert_eq!(meta.sample_data[0]["Region"], json!("north"));
        assert_eq!(meta.sample_data[1]["Units"], Value::Null);
    }

    #[tokio::test]
    async fn test_corrupt_workbook_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "broken.xlsx", "not a zip archive");
        assert!(matches!(
            TabularFileAnalyzer.analyze(&[path]).await,
            Err(AgentError::Collaborator(_))
        ));
    }
}
