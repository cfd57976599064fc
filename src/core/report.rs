use crate::core::ranking::ClassificationRow;
use crate::domain::model::{StageId, StageType};
use crate::utils::error::{PortalError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Table,
    Csv,
    Tsv,
    Json,
}

impl FromStr for OutputFormat {
    type Err = PortalError;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "csv" => Ok(OutputFormat::Csv),
            "tsv" => Ok(OutputFormat::Tsv),
            "json" => Ok(OutputFormat::Json),
            other => Err(PortalError::InvalidArgument {
                message: format!(
                    "Unsupported format '{}'. Valid formats: table, csv, tsv, json",
                    other
                ),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    pub rider_name: String,
    #[serde(flatten)]
    pub row: ClassificationRow,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub stage_id: StageId,
    pub stage_name: String,
    pub stage_type: StageType,
    pub rows: Vec<ReportRow>,
}

#[derive(Serialize)]
struct FlatRow<'a> {
    rank: usize,
    rider_id: u32,
    rider_name: &'a str,
    elapsed: String,
    adjusted_elapsed: String,
    points: u32,
    mountain_points: u32,
}

impl StageReport {
    pub fn render(&self, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Table => Ok(self.to_table()),
            OutputFormat::Csv => self.to_delimited(b','),
            OutputFormat::Tsv => self.to_delimited(b'\t'),
            OutputFormat::Json => Ok(serde_json::to_string_pretty(self)?),
        }
    }

    fn flat_rows(&self) -> impl Iterator<Item = FlatRow<'_>> {
        self.rows.iter().map(|line| FlatRow {
            rank: line.row.rank,
            rider_id: line.row.rider_id.0,
            rider_name: &line.rider_name,
            elapsed: line.row.elapsed.to_string(),
            adjusted_elapsed: line.row.adjusted_elapsed.to_string(),
            points: line.row.points,
            mountain_points: line.row.mountain_points,
        })
    }

    fn to_delimited(&self, delimiter: u8) -> Result<String> {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(Vec::new());
        for row in self.flat_rows() {
            writer.serialize(row)?;
        }
        if self.rows.is_empty() {
            writer.write_record([
                "rank",
                "rider_id",
                "rider_name",
                "elapsed",
                "adjusted_elapsed",
                "points",
                "mountain_points",
            ])?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| PortalError::IoError(e.into_error()))?;
        String::from_utf8(bytes).map_err(|e| PortalError::InvalidArgument {
            message: format!("report is not valid UTF-8: {}", e),
        })
    }

    fn to_table(&self) -> String {
        let mut out = format!(
            "Stage {} '{}' ({})\n",
            self.stage_id, self.stage_name, self.stage_type
        );
        if self.rows.is_empty() {
            out.push_str("No results registered.\n");
            return out;
        }

        let name_width = self
            .rows
            .iter()
            .map(|line| line.rider_name.chars().count())
            .max()
            .unwrap_or(0)
            .max("Rider".len());
        out.push_str(&format!(
            "{:>4}  {:<name_width$}  {:>12}  {:>12}  {:>6}  {:>8}\n",
            "Rank", "Rider", "Elapsed", "Adjusted", "Points", "Mountain"
        ));
        for row in self.flat_rows() {
            out.push_str(&format!(
                "{:>4}  {:<name_width$}  {:>12}  {:>12}  {:>6}  {:>8}\n",
                row.rank,
                row.rider_name,
                row.elapsed,
                row.adjusted_elapsed,
                row.points,
                row.mountain_points
            ));
        }
        out
    }
}
