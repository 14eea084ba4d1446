//! Taxonomy loading: browse-tree mappings in, filtered node ids out.
//!
//! Workbooks (`.xls`, `.xlsx`, `.xlsm`, `.ods`) are read through `calamine`;
//! `.csv` and `.tsv` through `csv`. Only three columns are consumed:
//! `Node root`, `Node ID` and `Node Path`.

use calamine::{open_workbook_auto, Data, Reader};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::model::{CategoryIdentifier, SearchTerm};

pub const ROOT_COLUMN: &str = "Node root";
pub const ID_COLUMN: &str = "Node ID";
pub const PATH_COLUMN: &str = "Node Path";

/// Index of the browse-tree mapping sheet in the provider's workbook.
pub const DEFAULT_SHEET: usize = 1;

/// Category roots left out of a harvest unless overridden.
pub const DEFAULT_EXCLUDED_ROOTS: [&str; 9] = [
    "it-automotive",
    "it-computers",
    "it-electronics",
    "it-grocery",
    "it-industrial",
    "it-lighting",
    "it-musical-instruments",
    "it-tools",
    "it-toys",
];

pub fn default_excluded_roots() -> HashSet<String> {
    DEFAULT_EXCLUDED_ROOTS.iter().map(|r| r.to_string()).collect()
}

#[derive(Error, Debug)]
pub enum TaxonomyError {
    #[error("I/O error reading taxonomy: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unsupported taxonomy file type: '{0}'")]
    UnsupportedFormat(String),
    #[error("Workbook error: {0}")]
    Workbook(#[from] calamine::Error),
    #[error("Sheet {index} not found ({available} sheets available)")]
    SheetNotFound { index: usize, available: usize },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Required column '{0}' not found in header")]
    MissingColumn(&'static str),
}

/// A taxonomy file plus the sheet to read when it is a workbook.
#[derive(Debug, Clone)]
pub struct TaxonomySource {
    pub path: PathBuf,
    pub sheet: usize,
}

impl TaxonomySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sheet: DEFAULT_SHEET,
        }
    }

    pub fn with_sheet(mut self, sheet: usize) -> Self {
        self.sheet = sheet;
        self
    }
}

/// One taxonomy row reduced to the consumed columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaxonomyRow {
    pub root: Option<String>,
    pub node_id: Option<String>,
    pub node_path: Option<String>,
}

impl TaxonomyRow {
    fn is_excluded(&self, excluded_roots: &HashSet<String>) -> bool {
        self.root
            .as_deref()
            .is_some_and(|root| excluded_roots.contains(root))
    }
}

/// Loads category identifiers whose root is not excluded, in source order.
///
/// When the file has no `Node ID` column the last `Node Path` segment is
/// used instead. Rows without an identifier are skipped.
pub fn load(
    source: &TaxonomySource,
    excluded_roots: &HashSet<String>,
) -> Result<Vec<CategoryIdentifier>, TaxonomyError> {
    let rows = read_rows(source)?;
    let ids = filter_node_ids(&rows, excluded_roots);
    info!(
        path = %source.path.display(),
        rows = rows.len(),
        kept = ids.len(),
        "Loaded category identifiers"
    );
    Ok(ids)
}

/// Loads search terms (last `Node Path` segment) for non-excluded rows.
pub fn load_search_terms(
    source: &TaxonomySource,
    excluded_roots: &HashSet<String>,
) -> Result<Vec<SearchTerm>, TaxonomyError> {
    let rows = read_rows(source)?;
    let terms = filter_search_terms(&rows, excluded_roots);
    info!(
        path = %source.path.display(),
        rows = rows.len(),
        kept = terms.len(),
        "Loaded search terms"
    );
    Ok(terms)
}

pub fn filter_node_ids(rows: &[TaxonomyRow], excluded_roots: &HashSet<String>) -> Vec<CategoryIdentifier> {
    rows.iter()
        .filter(|row| !row.is_excluded(excluded_roots))
        .filter_map(|row| row.node_id.clone())
        .collect()
}

pub fn filter_search_terms(rows: &[TaxonomyRow], excluded_roots: &HashSet<String>) -> Vec<SearchTerm> {
    rows.iter()
        .filter(|row| !row.is_excluded(excluded_roots))
        .filter_map(|row| row.node_path.as_deref().and_then(last_segment))
        .collect()
}

fn last_segment(path: &str) -> Option<String> {
    path.rsplit('/')
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Reads the consumed columns of every data row.
pub fn read_rows(source: &TaxonomySource) -> Result<Vec<TaxonomyRow>, TaxonomyError> {
    let extension = source
        .path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "xls" | "xlsx" | "xlsm" | "xlsb" | "ods" => read_workbook(&source.path, source.sheet),
        "csv" => read_delimited(&source.path, b','),
        "tsv" => read_delimited(&source.path, b'\t'),
        other => Err(TaxonomyError::UnsupportedFormat(other.to_string())),
    }
}

/// Column positions resolved from a header row.
struct Columns {
    root: usize,
    node_id: Option<usize>,
    node_path: Option<usize>,
}

impl Columns {
    fn resolve<'a>(header: impl IntoIterator<Item = &'a str>) -> Result<Self, TaxonomyError> {
        let names: Vec<String> = header
            .into_iter()
            .map(|h| h.trim().to_ascii_lowercase())
            .collect();
        let find = |wanted: &str| names.iter().position(|n| n == &wanted.to_ascii_lowercase());

        let root = find(ROOT_COLUMN).ok_or(TaxonomyError::MissingColumn(ROOT_COLUMN))?;
        let node_id = find(ID_COLUMN);
        let node_path = find(PATH_COLUMN);
        if node_id.is_none() && node_path.is_none() {
            return Err(TaxonomyError::MissingColumn(ID_COLUMN));
        }
        Ok(Self {
            root,
            node_id,
            node_path,
        })
    }

    fn row(&self, cell: impl Fn(usize) -> Option<String>) -> TaxonomyRow {
        let node_path = self.node_path.and_then(&cell);
        let node_id = match self.node_id {
            Some(i) => cell(i),
            None => node_path.as_deref().and_then(last_segment),
        };
        TaxonomyRow {
            root: cell(self.root),
            node_id,
            node_path,
        }
    }
}

fn read_workbook(path: &Path, sheet: usize) -> Result<Vec<TaxonomyRow>, TaxonomyError> {
    let mut workbook = open_workbook_auto(path)?;
    let available = workbook.sheet_names().len();
    let range = workbook
        .worksheet_range_at(sheet)
        .ok_or(TaxonomyError::SheetNotFound {
            index: sheet,
            available,
        })??;

    let mut rows = range.rows();
    let header: Vec<String> = match rows.next() {
        Some(cells) => cells.iter().map(|c| cell_text(c).unwrap_or_default()).collect(),
        None => return Ok(Vec::new()),
    };
    let columns = Columns::resolve(header.iter().map(String::as_str))?;

    let parsed: Vec<TaxonomyRow> = rows
        .map(|cells| columns.row(|i| cells.get(i).and_then(cell_text)))
        .collect();
    debug!(sheet, rows = parsed.len(), "Read workbook sheet");
    Ok(parsed)
}

fn read_delimited(path: &Path, delimiter: u8) -> Result<Vec<TaxonomyRow>, TaxonomyError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_path(path)?;
    let columns = Columns::resolve(reader.headers()?.iter())?;

    let mut parsed = Vec::new();
    for record in reader.records() {
        let record = record?;
        parsed.push(columns.row(|i| record.get(i).and_then(field_text)));
    }
    debug!(rows = parsed.len(), "Read delimited taxonomy");
    Ok(parsed)
}

/// Trims a delimited field; integral decimals such as `6198083031.0`
/// (spreadsheet exports) lose the fraction like workbook cells do.
fn field_text(raw: &str) -> Option<String> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }
    let integral = text.split_once('.').filter(|(whole, fraction)| {
        !whole.is_empty()
            && whole.bytes().all(|b| b.is_ascii_digit())
            && !fraction.is_empty()
            && fraction.bytes().all(|b| b == b'0')
    });
    Some(integral.map_or(text, |(whole, _)| whole).to_string())
}

/// Renders a cell as text; blanks and error cells are absent.
fn cell_text(cell: &Data) -> Option<String> {
    let text = match cell {
        Data::Empty | Data::Error(_) => return None,
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}
