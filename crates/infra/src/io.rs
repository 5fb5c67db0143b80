//! CSV and JSON table IO.
//!
//! Demand rows are grouped per product while reading; a bad row costs its
//! product (recorded as an input contract violation), a bad header costs the
//! whole load.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

use stockcast_core::{
    DemandPoint, DemandSeries, PlanError, PlanningConfig, ProductAttributes, ProductKey,
};
use stockcast_forecast::ActualRow;

use crate::summary::RunSummary;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Error)]
pub enum IoError {
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot create directory for {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("csv error in {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },

    #[error("{path}: missing required column `{column}`")]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error("{path}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("json error in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// One product's validated history and latest attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductHistory {
    pub series: DemandSeries,
    pub attributes: ProductAttributes,
}

/// The demand table, grouped per product in first-appearance order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DemandTable {
    pub products: Vec<ProductHistory>,
    /// Products dropped while loading.
    pub rejected: Vec<PlanError>,
}

impl DemandTable {
    /// Products seen in the table, valid or not.
    pub fn products_seen(&self) -> usize {
        self.products.len() + self.rejected.len()
    }
}

#[derive(Default)]
struct ProductAccumulator {
    daily: BTreeMap<NaiveDate, f64>,
    latest: Option<(NaiveDate, ProductAttributes)>,
    error: Option<String>,
}

impl ProductAccumulator {
    fn reject(&mut self, reason: String) {
        self.error.get_or_insert(reason);
    }
}

struct DemandColumns {
    date: usize,
    product: usize,
    quantity: usize,
    product_id: Option<usize>,
    product_name: Option<usize>,
    stock_quantity: Option<usize>,
    reorder_level: Option<usize>,
    reorder_quantity: Option<usize>,
    unit_price: Option<usize>,
    lead_time_days: Option<usize>,
}

fn column(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.trim() == name)
}

fn required(
    path: &Path,
    headers: &csv::StringRecord,
    name: &'static str,
) -> Result<usize, IoError> {
    column(headers, name).ok_or_else(|| IoError::MissingColumn {
        path: path.to_path_buf(),
        column: name,
    })
}

fn open_csv(path: &Path) -> Result<csv::Reader<BufReader<File>>, IoError> {
    let file = File::open(path).map_err(|source| IoError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(file)))
}

fn field<'r>(record: &'r csv::StringRecord, idx: Option<usize>) -> Option<&'r str> {
    idx.and_then(|i| record.get(i)).filter(|s| !s.is_empty())
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|e| format!("bad date `{raw}`: {e}"))
}

fn parse_number(name: &str, raw: &str) -> Result<f64, String> {
    raw.parse::<f64>().map_err(|_| format!("bad {name} `{raw}`"))
}

fn optional_number(
    record: &csv::StringRecord,
    idx: Option<usize>,
    name: &str,
) -> Result<Option<f64>, String> {
    field(record, idx).map(|raw| parse_number(name, raw)).transpose()
}

fn read_attributes(
    record: &csv::StringRecord,
    cols: &DemandColumns,
) -> Result<ProductAttributes, String> {
    Ok(ProductAttributes {
        product_id: field(record, cols.product_id).map(str::to_string),
        product_name: field(record, cols.product_name).map(str::to_string),
        stock_quantity: optional_number(record, cols.stock_quantity, "stock_quantity")?,
        reorder_level: optional_number(record, cols.reorder_level, "reorder_level")?,
        reorder_quantity: optional_number(record, cols.reorder_quantity, "reorder_quantity")?,
        unit_price: optional_number(record, cols.unit_price, "unit_price")?,
        lead_time_days: optional_number(record, cols.lead_time_days, "lead_time_days")?,
    })
}

/// Read the demand table and group it per product.
pub fn load_demand(path: &Path) -> Result<DemandTable, IoError> {
    let mut reader = open_csv(path)?;
    let headers = reader
        .headers()
        .map_err(|source| IoError::Csv {
            path: path.to_path_buf(),
            source,
        })?
        .clone();

    let cols = DemandColumns {
        date: required(path, &headers, "date")?,
        product: required(path, &headers, "product_item")?,
        quantity: required(path, &headers, "demand_qty")?,
        product_id: column(&headers, "product_id"),
        product_name: column(&headers, "product_name"),
        stock_quantity: column(&headers, "stock_quantity"),
        reorder_level: column(&headers, "reorder_level"),
        reorder_quantity: column(&headers, "reorder_quantity"),
        unit_price: column(&headers, "unit_price"),
        lead_time_days: column(&headers, "lead_time_days"),
    };

    let mut order: Vec<ProductKey> = Vec::new();
    let mut acc: BTreeMap<ProductKey, ProductAccumulator> = BTreeMap::new();

    for (line, result) in reader.records().enumerate() {
        let record = result.map_err(|source| IoError::Csv {
            path: path.to_path_buf(),
            source,
        })?;

        let Some(key) =
            field(&record, Some(cols.product)).and_then(|s| s.parse::<ProductKey>().ok())
        else {
            return Err(IoError::Malformed {
                path: path.to_path_buf(),
                reason: format!("row {}: empty product_item", line + 2),
            });
        };

        let entry = acc.entry(key.clone()).or_insert_with(|| {
            order.push(key.clone());
            ProductAccumulator::default()
        });

        let date = match field(&record, Some(cols.date)).map(parse_date) {
            Some(Ok(d)) => d,
            Some(Err(e)) => {
                entry.reject(format!("row {}: {e}", line + 2));
                continue;
            }
            None => {
                entry.reject(format!("row {}: missing date", line + 2));
                continue;
            }
        };
        let parsed = field(&record, Some(cols.quantity)).map(|q| parse_number("demand_qty", q));
        let quantity = match parsed {
            Some(Ok(q)) => q,
            Some(Err(e)) => {
                entry.reject(format!("row {}: {e}", line + 2));
                continue;
            }
            None => {
                entry.reject(format!("row {}: missing demand_qty", line + 2));
                continue;
            }
        };
        let attributes = match read_attributes(&record, &cols) {
            Ok(a) => a,
            Err(e) => {
                entry.reject(format!("row {}: {e}", line + 2));
                continue;
            }
        };

        *entry.daily.entry(date).or_insert(0.0) += quantity;
        // Latest date wins; the last row wins ties.
        if entry.latest.as_ref().is_none_or(|(d, _)| date >= *d) {
            entry.latest = Some((date, attributes));
        }
    }

    let mut table = DemandTable::default();
    for key in order {
        let Some(product) = acc.remove(&key) else {
            continue;
        };
        match build_history(&key, product) {
            Ok(history) => table.products.push(history),
            Err(err) => table.rejected.push(err),
        }
    }
    Ok(table)
}

fn build_history(key: &ProductKey, acc: ProductAccumulator) -> Result<ProductHistory, PlanError> {
    if let Some(reason) = acc.error {
        return Err(PlanError::input_contract(key, reason));
    }
    let attributes = acc.latest.map(|(_, a)| a).unwrap_or_default();
    attributes.validate(key)?;

    let points = acc
        .daily
        .into_iter()
        .map(|(date, quantity)| DemandPoint { date, quantity })
        .collect();
    let series = DemandSeries::new(key.clone(), points)?;
    Ok(ProductHistory { series, attributes })
}

/// Read the actuals table.
pub fn load_actuals(path: &Path) -> Result<Vec<ActualRow>, IoError> {
    let mut reader = open_csv(path)?;
    let headers = reader
        .headers()
        .map_err(|source| IoError::Csv {
            path: path.to_path_buf(),
            source,
        })?
        .clone();
    let date_col = required(path, &headers, "date")?;
    let product_col = required(path, &headers, "product_item")?;
    let actual_col = required(path, &headers, "actual_demand")?;

    let mut rows = Vec::new();
    for (line, result) in reader.records().enumerate() {
        let record = result.map_err(|source| IoError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        let malformed = |reason: String| IoError::Malformed {
            path: path.to_path_buf(),
            reason: format!("row {}: {reason}", line + 2),
        };

        let date = parse_date(record.get(date_col).unwrap_or("")).map_err(malformed)?;
        let product = record
            .get(product_col)
            .unwrap_or("")
            .parse::<ProductKey>()
            .map_err(|e| malformed(e.to_string()))?;
        let actual = parse_number("actual_demand", record.get(actual_col).unwrap_or(""))
            .map_err(malformed)?;
        if !(actual.is_finite() && actual >= 0.0) {
            return Err(malformed(format!(
                "actual_demand must be a finite non-negative number (got {actual})"
            )));
        }
        rows.push(ActualRow {
            date,
            product,
            actual,
        });
    }
    Ok(rows)
}

/// Read a JSON configuration file; missing fields keep their defaults.
pub fn load_config(path: &Path) -> Result<PlanningConfig, IoError> {
    let file = File::open(path).map_err(|source| IoError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| IoError::Json {
        path: path.to_path_buf(),
        source,
    })
}

fn ensure_parent(path: &Path) -> Result<(), IoError> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            fs::create_dir_all(dir).map_err(|source| IoError::CreateDir {
                path: path.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}

/// Write rows as CSV with a header, creating parent directories.
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), IoError> {
    ensure_parent(path)?;
    let csv_err = |source| IoError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    for row in rows {
        writer.serialize(row).map_err(csv_err)?;
    }
    writer.flush().map_err(|source| IoError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Write the run summary as pretty-printed JSON.
pub fn write_summary(path: &Path, summary: &RunSummary) -> Result<(), IoError> {
    ensure_parent(path)?;
    let file = File::create(path).map_err(|source| IoError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::to_writer_pretty(file, summary).map_err(|source| IoError::Json {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    fn csv_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{contents}").unwrap();
        file
    }

    #[test]
    fn duplicate_days_are_summed_and_latest_attributes_win() {
        let file = csv_file(
            "product_item,date,demand_qty,stock_quantity,product_name\n\
             A,2024-01-02,3,10,Old\n\
             A,2024-01-01,1,99,Older\n\
             A,2024-01-02,4,12,New\n\
             B,2024-01-01,5,,\n",
        );
        let table = load_demand(file.path()).unwrap();

        assert_eq!(table.products.len(), 2);
        let a = &table.products[0];
        assert_eq!(a.series.product().as_str(), "A");
        assert_eq!(a.series.values(), &[1.0, 7.0]);
        assert_eq!(a.attributes.stock_quantity, Some(12.0));
        assert_eq!(a.attributes.product_name.as_deref(), Some("New"));

        let b = &table.products[1];
        assert_eq!(b.attributes.stock_quantity, None);
        assert!(table.rejected.is_empty());
    }

    #[test]
    fn bad_rows_reject_only_their_product() {
        let file = csv_file(
            "date,product_item,demand_qty\n\
             2024-01-01,A,1\n\
             not-a-date,A,2\n\
             2024-01-01,B,-4\n\
             2024-01-01,C,x\n\
             2024-01-01,D,2\n",
        );
        let table = load_demand(file.path()).unwrap();
        let kept: Vec<&str> = table
            .products
            .iter()
            .map(|p| p.series.product().as_str())
            .collect();
        assert_eq!(kept, vec!["D"]);
        assert_eq!(table.rejected.len(), 3);
        assert_eq!(table.products_seen(), 4);
        assert!(table.rejected.iter().all(|e| !e.is_run_fatal()));
    }

    #[test]
    fn invalid_lead_time_rejects_the_product() {
        let file = csv_file("date,product_item,demand_qty,lead_time_days\n2024-01-01,A,1,0\n");
        let table = load_demand(file.path()).unwrap();
        assert!(table.products.is_empty());
        assert_eq!(table.rejected[0].product().map(|k| k.as_str()), Some("A"));
    }

    #[test]
    fn missing_required_column_is_fatal() {
        let file = csv_file("date,item,demand_qty\n2024-01-01,A,1\n");
        let err = load_demand(file.path()).unwrap_err();
        assert!(matches!(err, IoError::MissingColumn { column: "product_item", .. }));
    }

    #[test]
    fn actuals_are_parsed_with_trimmed_keys() {
        let file = csv_file("date,product_item,actual_demand\n2024-02-01, A ,3.5\n");
        let rows = load_actuals(file.path()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].product.as_str(), "A");
        assert_eq!(rows[0].actual, 3.5);
    }

    #[test]
    fn non_finite_or_negative_actuals_are_malformed() {
        for bad in ["NaN", "inf", "-2"] {
            let file = csv_file(&format!(
                "date,product_item,actual_demand\n2024-02-01,A,1\n2024-02-02,A,{bad}\n"
            ));
            let err = load_actuals(file.path()).unwrap_err();
            match err {
                IoError::Malformed { reason, .. } => {
                    assert!(reason.starts_with("row 3:"), "{reason}");
                    assert!(reason.contains("finite non-negative"), "{reason}");
                }
                other => panic!("expected malformed actuals for {bad}, got {other:?}"),
            }
        }
    }

    #[test]
    fn partial_config_file_keeps_defaults() {
        let file = csv_file(r#"{"service_level": 0.9}"#);
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.service_level, 0.9);
        assert_eq!(cfg.horizon, PlanningConfig::default().horizon);
    }

    #[test]
    fn writers_create_parent_directories() {
        #[derive(Serialize)]
        struct Row {
            a: u32,
            b: Option<f64>,
        }

        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/out/table.csv");
        write_csv(&path, &[Row { a: 1, b: None }, Row { a: 2, b: Some(0.5) }]).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "a,b\n1,\n2,0.5\n");
    }
}
