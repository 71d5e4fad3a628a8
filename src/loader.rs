//! CSV loading for network exports
//!
//! Reads one row per (building, segment) pair, maps the many column spellings
//! found in exports onto the planner's fields, and normalizes free-text
//! building types and segment kinds (case, accents, separators).

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use regex::Regex;
use tracing::{debug, info};
use unicode_normalization::UnicodeNormalization;
use walkdir::WalkDir;

use crate::config::LoaderOptions;
use crate::models::{BuildingType, InputRow, SegmentKind};

/// Collect input files: a file is taken as is, a directory is searched
/// recursively for `*.csv` files, sorted by path.
pub fn find_input_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        bail!("input not found: {}", path.display());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(path).follow_links(true).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if entry.file_type().is_file()
            && path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

/// Text normalization shared by headers and cell values
pub struct Normalizer {
    separators: Regex,
    invalid: Regex,
}

impl Normalizer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            separators: Regex::new(r"[\s_]+")?,
            invalid: Regex::new(r"[^a-z0-9\-]")?,
        })
    }

    /// Lowercase ascii, accents stripped, words joined by `-`.
    /// `"Semi Aérien"` becomes `"semi-aerien"`.
    pub fn text(&self, raw: &str) -> String {
        let folded: String = raw
            .nfkd()
            .filter(char::is_ascii)
            .collect::<String>()
            .to_lowercase();
        let dashed = self.separators.replace_all(folded.trim(), "-");
        let cleaned = self.invalid.replace_all(&dashed, "");
        cleaned.trim_matches('-').to_string()
    }

    pub fn header(&self, raw: &str) -> String {
        self.text(raw).replace('-', "_")
    }

    pub fn building_type(&self, raw: &str) -> BuildingType {
        BuildingType::from_normalized(&self.text(raw))
    }

    pub fn segment_kind(&self, raw: &str) -> SegmentKind {
        SegmentKind::from_normalized(&self.text(raw))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    BuildingId,
    BuildingType,
    InfraId,
    /// Impact flag: intact or not
    State,
    /// Physical kind of the segment
    Kind,
    Length,
    Houses,
}

fn column_for(header: &str) -> Option<Column> {
    match header {
        "id_batiment" | "building_id" | "building" | "batiment" => Some(Column::BuildingId),
        "type_batiment" | "building_type" => Some(Column::BuildingType),
        "infra_id" | "id_infra" | "segment_id" | "segment" => Some(Column::InfraId),
        "infra_type" | "state" | "etat" => Some(Column::State),
        "type_infra" | "kind" | "segment_kind" | "infra_kind" => Some(Column::Kind),
        "longueur" | "length" => Some(Column::Length),
        "nb_maisons" | "house_count" | "houses" | "nb_houses" => Some(Column::Houses),
        _ => None,
    }
}

#[derive(Debug, Default)]
struct ColumnMap {
    building_id: Option<usize>,
    building_type: Option<usize>,
    infra_id: Option<usize>,
    state: Option<usize>,
    kind: Option<usize>,
    length: Option<usize>,
    houses: Option<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &csv::StringRecord, normalizer: &Normalizer, source: &str) -> Result<Self> {
        let mut map = ColumnMap::default();
        for (idx, raw) in headers.iter().enumerate() {
            let slot = match column_for(&normalizer.header(raw)) {
                Some(Column::BuildingId) => &mut map.building_id,
                Some(Column::BuildingType) => &mut map.building_type,
                Some(Column::InfraId) => &mut map.infra_id,
                Some(Column::State) => &mut map.state,
                Some(Column::Kind) => &mut map.kind,
                Some(Column::Length) => &mut map.length,
                Some(Column::Houses) => &mut map.houses,
                None => continue,
            };
            // first matching column wins
            slot.get_or_insert(idx);
        }

        let mut missing = Vec::new();
        if map.building_id.is_none() {
            missing.push("building id");
        }
        if map.infra_id.is_none() {
            missing.push("infra id");
        }
        if map.state.is_none() && map.kind.is_none() {
            missing.push("infra type");
        }
        if !missing.is_empty() {
            bail!("missing columns in {}: {:?}", source, missing);
        }
        Ok(map)
    }
}

fn field<'r>(row: &'r csv::StringRecord, idx: Option<usize>) -> Option<&'r str> {
    idx.and_then(|i| row.get(i))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn number(row: &csv::StringRecord, idx: Option<usize>, name: &str, line: usize) -> f64 {
    match field(row, idx).map(|s| s.parse::<f64>()) {
        Some(Ok(value)) if value.is_finite() => value,
        Some(_) => {
            debug!(line, column = name, "unparseable number, using 0");
            0.0
        }
        None => 0.0,
    }
}

/// Parse rows from any CSV source. `source` only labels error messages.
pub fn read_rows<R: Read>(reader: R, source: &str, options: &LoaderOptions) -> Result<Vec<InputRow>> {
    let normalizer = Normalizer::new()?;
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = reader
        .headers()
        .with_context(|| format!("Failed to read headers of {}", source))?
        .clone();
    let columns = ColumnMap::from_headers(&headers, &normalizer, source)?;

    let mut rows = Vec::new();
    let mut skipped = 0;
    for (idx, record) in reader.records().enumerate() {
        let line = idx + 2;
        let record = record.with_context(|| format!("Failed to read {} line {}", source, line))?;

        let Some(building_id) = field(&record, columns.building_id) else {
            debug!(line, "row without building id skipped");
            skipped += 1;
            continue;
        };

        let state = field(&record, columns.state).map(|s| normalizer.segment_kind(s));
        let kind = field(&record, columns.kind).map(|s| normalizer.segment_kind(s));
        let infra_kind = match (state, kind) {
            (Some(SegmentKind::Intact), _) => SegmentKind::Intact,
            (_, Some(kind)) => kind,
            (Some(state), None) => state,
            (None, None) => SegmentKind::Other(String::new()),
        };

        if !options.keep_intact && infra_kind.is_intact() {
            skipped += 1;
            continue;
        }

        rows.push(InputRow {
            building_id: building_id.to_string(),
            building_type: field(&record, columns.building_type)
                .map(|s| normalizer.building_type(s))
                .unwrap_or(BuildingType::Residential),
            infra_id: field(&record, columns.infra_id).unwrap_or_default().to_string(),
            infra_kind,
            length: number(&record, columns.length, "length", line),
            house_count: number(&record, columns.houses, "house count", line) as i64,
        });
    }

    info!(source, rows = rows.len(), skipped, "input loaded");
    Ok(rows)
}

pub fn read_csv(path: &Path, options: &LoaderOptions) -> Result<Vec<InputRow>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    read_rows(file, &path.display().to_string(), options)
}

/// Load every CSV file reachable from the given paths, in order.
pub fn load_inputs(paths: &[PathBuf], options: &LoaderOptions) -> Result<Vec<InputRow>> {
    let mut rows = Vec::new();
    for path in paths {
        for file in find_input_files(path)? {
            rows.extend(read_csv(&file, options)?);
        }
    }
    Ok(rows)
}
