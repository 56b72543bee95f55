use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use calamine::{Reader, open_workbook_auto};
use polars::prelude::*;
use rayon::prelude::*;
use tracing::{debug, info, instrument, trace};

use crate::domain::TVError;

/// One record of the source, cells rendered as strings.
pub type Row = Vec<String>;

#[derive(Debug, Clone, Copy, PartialEq)]
enum FileType {
    CSV,
    PARQUET,
    ARROW,
    SPREADSHEET,
}

#[derive(Debug)]
struct FileInfo {
    path: PathBuf,
    file_size: u64,
    file_type: FileType,
}

/// The immutable table loaded at startup.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

impl Dataset {
    pub fn new(name: impl Into<String>, headers: Vec<String>, rows: Vec<Row>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows,
        }
    }

    pub fn ncolumns(&self) -> usize {
        self.rows
            .iter()
            .map(|r| r.len())
            .chain(std::iter::once(self.headers.len()))
            .max()
            .unwrap_or(0)
    }

    /// Load the first sheet / table of a file. The first row is the header.
    #[instrument(level = "debug")]
    pub fn load(path: &Path) -> Result<Self, TVError> {
        let file_info = get_file_info(path.to_path_buf())?;
        let start_time = Instant::now();
        debug!(
            "Loading {:?} ({:?}, {} bytes)",
            file_info.path, file_info.file_type, file_info.file_size
        );

        let (headers, rows) = match file_info.file_type {
            FileType::CSV => load_frame(load_csv(&file_info.path)?)?,
            FileType::PARQUET => load_frame(load_parquet(&file_info.path)?)?,
            FileType::ARROW => load_frame(load_arrow(&file_info.path)?)?,
            FileType::SPREADSHEET => load_spreadsheet(&file_info.path)?,
        };

        if headers.is_empty() {
            return Err(TVError::EmptyData);
        }

        let name = file_info
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("???")
            .to_string();
        info!(
            "Loaded {} rows x {} columns from {name} in {}ms",
            rows.len(),
            headers.len(),
            start_time.elapsed().as_millis()
        );
        Ok(Dataset::new(name, headers, rows))
    }
}

fn detect_file_type(path: &Path) -> Result<FileType, TVError> {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_uppercase())
        .as_deref()
    {
        Some("CSV") => Ok(FileType::CSV),
        Some("PARQUET") | Some("PQ") => Ok(FileType::PARQUET),
        Some("XLSX") | Some("XLSM") | Some("XLSB") | Some("XLS") | Some("ODS") => {
            Ok(FileType::SPREADSHEET)
        }
        Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::ARROW),
        _ => Err(TVError::UnknownFileType),
    }
}

fn get_file_info(path: PathBuf) -> Result<FileInfo, TVError> {
    let metadata = fs::metadata(&path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => TVError::FileNotFound,
        ErrorKind::PermissionDenied => TVError::PermissionDenied,
        _ => TVError::IoError(e),
    })?;
    if !metadata.is_file() {
        return Err(TVError::LoadingFailed("Not a file!".into()));
    }
    if metadata.len() == 0 {
        return Err(TVError::EmptyData);
    }

    let file_type = detect_file_type(&path)?;

    Ok(FileInfo {
        path,
        file_size: metadata.len(),
        file_type,
    })
}

// No schema inference: every column is read as text so cells keep their
// raw spelling (`007`, `1.50`) and late non-numeric values cannot fail
fn load_csv(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyCsvReader::new(PlPath::Local(path.into()))
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .finish()
}

fn load_parquet(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyFrame::scan_parquet(PlPath::Local(path.into()), ScanArgsParquet::default())
}

fn load_arrow(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyFrame::scan_ipc(
        PlPath::Local(path.into()),
        polars::io::ipc::IpcScanOptions,
        UnifiedScanArgs::default(),
    )
}

// Columns are converted to strings in parallel, one rayon task per column,
// and then transposed into rows.
fn load_frame(frame: LazyFrame) -> Result<(Vec<String>, Vec<Row>), TVError> {
    let df = Arc::new(frame.collect()?);
    let columns: Result<Vec<Vec<String>>, PolarsError> = df
        .get_column_names()
        .par_iter()
        .map(|name| column_as_strings(&df, name))
        .collect();
    let columns = columns?;

    let headers: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    let nrows = df.height();
    let rows = (0..nrows)
        .into_par_iter()
        .map(|ridx| columns.iter().map(|c| c[ridx].clone()).collect::<Row>())
        .collect();
    Ok((headers, rows))
}

fn column_as_strings(df: &DataFrame, col_name: &str) -> Result<Vec<String>, PolarsError> {
    let col = df.column(col_name)?.cast(&DataType::String)?;
    let series = col.str()?;
    let data = series
        .into_iter()
        .map(|value| value.map(|s| s.to_string()).unwrap_or_default())
        .collect::<Vec<String>>();
    trace!("Column {col_name:?}: {} values", data.len());
    Ok(data)
}

fn load_spreadsheet(path: &Path) -> Result<(Vec<String>, Vec<Row>), TVError> {
    let mut workbook = open_workbook_auto(path)?;
    let sheet_names = workbook.sheet_names();
    debug!("Sheets: {:?}, using the first one", sheet_names);

    let range = workbook.worksheet_range_at(0).ok_or(TVError::EmptyData)??;
    let mut rows = range
        .rows()
        .map(|cells| cells.iter().map(|c| c.to_string()).collect::<Row>());

    let headers = rows.next().ok_or(TVError::EmptyData)?;
    // Fully blank rows carry no record
    let rows = rows
        .filter(|r| r.iter().any(|c| !c.is_empty()))
        .collect::<Vec<Row>>();
    Ok((headers, rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn csv_header_becomes_column_titles() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "links.csv",
            "Name,Url,Notes\nExample,https://www.example.com/x,first\nOther,not a url,\n",
        );

        let data = Dataset::load(&path).unwrap();
        assert_eq!(data.name, "links.csv");
        assert_eq!(data.headers, vec!["Name", "Url", "Notes"]);
        assert_eq!(data.rows.len(), 2);
        assert_eq!(data.rows[0], vec!["Example", "https://www.example.com/x", "first"]);
        // Nulls read as empty cells
        assert_eq!(data.rows[1][2], "");
        assert_eq!(data.ncolumns(), 3);
    }

    #[test]
    fn csv_cells_keep_raw_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "codes.csv",
            "Name,Url,Code,Price\nA,https://a.com,007,1.50\n",
        );

        let data = Dataset::load(&path).unwrap();
        assert_eq!(data.rows[0], vec!["A", "https://a.com", "007", "1.50"]);
    }

    #[test]
    fn csv_with_late_text_in_numeric_column_loads() {
        let dir = tempfile::tempdir().unwrap();
        let mut content = String::from("Name,Url,Code\n");
        for idx in 0..150 {
            content.push_str(&format!("row{idx},x,{idx}\n"));
        }
        content.push_str("last,x,N/A\n");
        let path = write_file(&dir, "late.csv", &content);

        let data = Dataset::load(&path).unwrap();
        assert_eq!(data.rows.len(), 151);
        assert_eq!(data.rows[42][2], "42");
        assert_eq!(data.rows[150], vec!["last", "x", "N/A"]);
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let result = Dataset::load(&dir.path().join("datos.xlsx"));
        assert!(matches!(result, Err(TVError::FileNotFound)));
    }

    #[test]
    fn empty_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "empty.csv", "");
        assert!(matches!(Dataset::load(&path), Err(TVError::EmptyData)));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "notes.txt", "hello");
        assert!(matches!(Dataset::load(&path), Err(TVError::UnknownFileType)));
    }

    #[test]
    fn directory_is_not_a_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Dataset::load(dir.path()),
            Err(TVError::LoadingFailed(_))
        ));
    }

    #[test]
    fn corrupt_spreadsheet_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "broken.xlsx", "this is not a zip archive");
        assert!(Dataset::load(&path).is_err());
    }

    #[test]
    fn detects_spreadsheet_extensions() {
        assert_eq!(
            detect_file_type(Path::new("datos.XLSX")).unwrap(),
            FileType::SPREADSHEET
        );
        assert_eq!(detect_file_type(Path::new("a.ods")).unwrap(), FileType::SPREADSHEET);
        assert_eq!(detect_file_type(Path::new("a.pq")).unwrap(), FileType::PARQUET);
        assert_eq!(detect_file_type(Path::new("a.feather")).unwrap(), FileType::ARROW);
        assert!(detect_file_type(Path::new("a")).is_err());
    }
}
