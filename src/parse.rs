use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::db::BankRecord;

/// Source columns, looked up by header name rather than position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    BankName,
    City,
    State,
    Cert,
    AcquiringInstitution,
    ClosingDate,
    Fund,
}

impl Column {
    pub const ALL: [Column; 7] = [
        Column::BankName,
        Column::City,
        Column::State,
        Column::Cert,
        Column::AcquiringInstitution,
        Column::ClosingDate,
        Column::Fund,
    ];

    pub fn header(self) -> &'static str {
        match self {
            Column::BankName => "Bank Name",
            Column::City => "City",
            Column::State => "State",
            Column::Cert => "Cert",
            Column::AcquiringInstitution => "Acquiring Institution",
            Column::ClosingDate => "Closing Date",
            Column::Fund => "Fund",
        }
    }
}

/// Header position for each column; `None` means the column resolves to "".
#[derive(Debug)]
pub struct ColumnMap {
    positions: [Option<usize>; 7],
}

impl ColumnMap {
    pub fn from_headers(headers: &csv::StringRecord) -> Self {
        let mut positions = [None; 7];
        for (slot, col) in positions.iter_mut().zip(Column::ALL) {
            *slot = headers.iter().position(|h| h.trim() == col.header());
            if slot.is_none() {
                warn!("CSV header has no '{}' column, defaulting to empty", col.header());
            }
        }
        ColumnMap { positions }
    }

    fn get<'r>(&self, record: &'r csv::StringRecord, col: Column) -> &'r str {
        self.positions[col as usize]
            .and_then(|i| record.get(i))
            .unwrap_or("")
            .trim()
    }

    pub fn to_record(&self, row: &csv::StringRecord) -> BankRecord {
        BankRecord {
            name: self.get(row, Column::BankName).to_string(),
            city: self.get(row, Column::City).to_string(),
            state: self.get(row, Column::State).to_string(),
            cert: self.get(row, Column::Cert).to_string(),
            acquiring_institution: self.get(row, Column::AcquiringInstitution).to_string(),
            closing_date: self.get(row, Column::ClosingDate).to_string(),
            fund: self.get(row, Column::Fund).to_string(),
        }
    }
}

/// Parse the decoded feed. The first data row after the header is a
/// footnote and is dropped. Short rows are padded with "".
pub fn parse_records(text: &str) -> Result<Vec<BankRecord>> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = reader.headers().context("Failed to read CSV header")?.clone();
    let columns = ColumnMap::from_headers(&headers);

    let mut records = Vec::new();
    for (i, row) in reader.records().enumerate() {
        let row = match row {
            Ok(r) => r,
            Err(e) => {
                warn!("Skipping unreadable CSV row {}: {}", i + 1, e);
                continue;
            }
        };
        if i == 0 {
            debug!("Skipping footnote row: {:?}", row);
            continue;
        }
        records.push(columns.to_record(&row));
    }
    Ok(records)
}
