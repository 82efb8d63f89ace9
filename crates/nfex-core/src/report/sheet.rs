//! Tabular artifacts: the xlsx workbook and a CSV export of the same rows.

use std::path::Path;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_xlsxwriter::{Format, Workbook, XlsxError};

use super::ReportTable;
use crate::error::ReportIoError;

/// Worksheet name.
pub const SHEET_NAME: &str = "Relatorio";

/// Number format of the amount columns.
pub const AMOUNT_FORMAT: &str = "#,##0.00";

/// Header row, in column order.
pub const COLUMNS: [&str; 5] = [
    "source_name",
    "issuer_id",
    "issuer_name",
    "invoice_total",
    "tax_total",
];

const COLUMN_WIDTHS: [f64; 5] = [34.0, 18.0, 40.0, 16.0, 14.0];

fn spreadsheet_error(err: XlsxError) -> ReportIoError {
    ReportIoError::Spreadsheet(err.to_string())
}

fn as_number(amount: Decimal) -> Result<f64, ReportIoError> {
    amount
        .to_f64()
        .ok_or_else(|| ReportIoError::Spreadsheet(format!("amount {amount} does not fit a cell")))
}

/// Render the table as an xlsx workbook.
///
/// One sheet, header row first, amounts as numeric cells with
/// [`AMOUNT_FORMAT`], and the aggregate row in bold.
pub fn to_xlsx(table: &ReportTable) -> Result<Vec<u8>, ReportIoError> {
    let mut workbook = Workbook::new();

    let header = Format::new().set_bold();
    let plain = Format::new();
    let amount = Format::new().set_num_format(AMOUNT_FORMAT);
    let bold = Format::new().set_bold();
    let bold_amount = Format::new().set_bold().set_num_format(AMOUNT_FORMAT);

    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME).map_err(spreadsheet_error)?;

    for (col, (title, width)) in COLUMNS.iter().zip(COLUMN_WIDTHS).enumerate() {
        let col = col as u16;
        sheet
            .write_string_with_format(0, col, *title, &header)
            .map_err(spreadsheet_error)?;
        sheet.set_column_width(col, width).map_err(spreadsheet_error)?;
    }

    for (i, record) in table.rows().iter().enumerate() {
        let row = (i + 1) as u32;
        let (text_format, amount_format) = if record.is_aggregate() {
            (&bold, &bold_amount)
        } else {
            (&plain, &amount)
        };

        let texts = [&record.source_name, &record.issuer_id, &record.issuer_name];
        for (col, text) in texts.into_iter().enumerate() {
            sheet
                .write_string_with_format(row, col as u16, text.as_str(), text_format)
                .map_err(spreadsheet_error)?;
        }

        sheet
            .write_number_with_format(row, 3, as_number(record.invoice_total)?, amount_format)
            .map_err(spreadsheet_error)?;
        sheet
            .write_number_with_format(row, 4, as_number(record.tax_total)?, amount_format)
            .map_err(spreadsheet_error)?;
    }

    workbook.save_to_buffer().map_err(spreadsheet_error)
}

/// Write the xlsx workbook to `path`.
pub fn write_xlsx(table: &ReportTable, path: &Path) -> Result<(), ReportIoError> {
    let bytes = to_xlsx(table)?;
    std::fs::write(path, bytes).map_err(|source| ReportIoError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Render the table as CSV, amounts with two decimals.
pub fn to_csv(table: &ReportTable) -> Result<Vec<u8>, ReportIoError> {
    let serialize_error = |e: csv::Error| ReportIoError::Serialize(e.to_string());
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record(COLUMNS).map_err(serialize_error)?;
    for record in table.rows() {
        wtr.write_record([
            record.source_name.as_str(),
            record.issuer_id.as_str(),
            record.issuer_name.as_str(),
            &format!("{:.2}", record.invoice_total),
            &format!("{:.2}", record.tax_total),
        ])
        .map_err(serialize_error)?;
    }

    wtr.into_inner()
        .map_err(|e| ReportIoError::Serialize(e.to_string()))
}

/// Write the CSV export to `path`.
pub fn write_csv(table: &ReportTable, path: &Path) -> Result<(), ReportIoError> {
    let bytes = to_csv(table)?;
    std::fs::write(path, bytes).map_err(|source| ReportIoError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InvoiceRecord;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    fn table() -> ReportTable {
        let records = vec![
            InvoiceRecord {
                source_name: "beta.xml".to_string(),
                issuer_id: "11222333000181".to_string(),
                issuer_name: "Beta, Servicos".to_string(),
                invoice_total: Decimal::from_str("50").unwrap(),
                tax_total: Decimal::from_str("9.5").unwrap(),
            },
            InvoiceRecord {
                source_name: "acme.xml".to_string(),
                issuer_id: "11222333000181".to_string(),
                issuer_name: "Acme".to_string(),
                invoice_total: Decimal::from_str("1234.56").unwrap(),
                tax_total: Decimal::from_str("222.22").unwrap(),
            },
        ];
        ReportTable::build(
            records,
            Decimal::from_str("1284.56").unwrap(),
            Decimal::from_str("231.72").unwrap(),
        )
    }

    #[test]
    fn test_xlsx_is_a_zip_container() {
        let bytes = to_xlsx(&table()).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }

    #[test]
    fn test_write_xlsx() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relatorio.xlsx");
        write_xlsx(&table(), &path).unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn test_write_xlsx_into_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("relatorio.xlsx");
        let err = write_xlsx(&table(), &path).unwrap_err();
        assert!(matches!(err, ReportIoError::Io { .. }));
    }

    #[test]
    fn test_csv_rows() {
        let csv = String::from_utf8(to_csv(&table()).unwrap()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(
            lines,
            vec![
                "source_name,issuer_id,issuer_name,invoice_total,tax_total",
                "acme.xml,11222333000181,Acme,1234.56,222.22",
                "beta.xml,11222333000181,\"Beta, Servicos\",50.00,9.50",
                "TOTAL,,,1284.56,231.72",
            ]
        );
    }
}
