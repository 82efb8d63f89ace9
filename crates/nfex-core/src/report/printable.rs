//! Printable report: a paginated A4 text layout and its PDF rendering.
//!
//! Layout and rendering are split so the pagination rules can be checked
//! without parsing PDF content streams.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};
use tracing::debug;

use crate::invoice::rules::format_brl_amount;
use crate::models::InvoiceRecord;

use super::ReportTable;
use crate::error::ReportIoError;

/// A4 width in points.
pub const PAGE_WIDTH: f32 = 595.28;

/// A4 height in points.
pub const PAGE_HEIGHT: f32 = 841.89;

/// Default number of records printed before truncation.
pub const DEFAULT_PRINT_CAP: usize = 30;

/// Issuer names are cut to this many characters.
pub const NAME_WIDTH: usize = 25;

/// Default report title.
pub const DEFAULT_TITLE: &str = "Relatório de NF-e";

const LEFT: f32 = 50.0;
const TOTAL_COLUMN: f32 = 250.0;
const TAX_COLUMN: f32 = 350.0;
const TITLE_Y: f32 = PAGE_HEIGHT - 50.0;
const SOURCE_Y: f32 = PAGE_HEIGHT - 70.0;
const HEADER_Y: f32 = PAGE_HEIGHT - 100.0;
const HEADER_GAP: f32 = 18.0;
const ROW_STEP: f32 = 14.0;
const BOTTOM_MARGIN: f32 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontStyle {
    Regular,
    Bold,
}

impl FontStyle {
    fn resource_name(self) -> &'static str {
        match self {
            FontStyle::Regular => "F1",
            FontStyle::Bold => "F2",
        }
    }
}

/// One positioned line of text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub x: f32,
    pub y: f32,
    pub size: f32,
    pub style: FontStyle,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub lines: Vec<TextLine>,
}

/// Paginated text of the printable report.
#[derive(Debug, Clone, PartialEq)]
pub struct PrintLayout {
    pub pages: Vec<Page>,

    /// Records that made it onto the pages.
    pub printed: usize,

    /// Records left out because of the print cap.
    pub omitted: usize,
}

/// Printable report settings.
#[derive(Debug, Clone)]
pub struct PrintOptions {
    /// Title line.
    pub title: String,
    /// Shown after "Fonte:" under the title, usually the spreadsheet name.
    pub source: String,
    /// Maximum number of records printed.
    pub cap: usize,
}

impl PrintOptions {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            source: source.into(),
            cap: DEFAULT_PRINT_CAP,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_cap(mut self, cap: usize) -> Self {
        self.cap = cap;
        self
    }
}

/// Cut a name to at most `width` characters.
fn truncate_name(name: &str, width: usize) -> String {
    name.chars().take(width).collect()
}

struct Cursor {
    pages: Vec<Page>,
    y: f32,
}

impl Cursor {
    fn line(&mut self, x: f32, size: f32, style: FontStyle, text: impl Into<String>) {
        let y = self.y;
        if let Some(page) = self.pages.last_mut() {
            page.lines.push(TextLine {
                x,
                y,
                size,
                style,
                text: text.into(),
            });
        }
    }

    fn row(&mut self, style: FontStyle, name: &str, total: String, tax: String) {
        self.line(LEFT, 10.0, style, name);
        self.line(TOTAL_COLUMN, 10.0, style, total);
        self.line(TAX_COLUMN, 10.0, style, tax);
    }

    /// Move one step down, breaking the page below the bottom margin.
    fn advance(&mut self, step: f32) {
        self.y -= step;
        if self.y < BOTTOM_MARGIN {
            self.pages.push(Page::default());
            self.y = TITLE_Y;
        }
    }
}

/// Lay out `records` (at most `options.cap` of them, in the given order),
/// followed by a truncation notice when records were left out and the
/// aggregate row when one is given.
pub fn layout(
    records: &[InvoiceRecord],
    aggregate: Option<&InvoiceRecord>,
    options: &PrintOptions,
) -> PrintLayout {
    let printed = records.len().min(options.cap);
    let omitted = records.len() - printed;

    let mut cursor = Cursor {
        pages: vec![Page::default()],
        y: TITLE_Y,
    };

    cursor.line(LEFT, 16.0, FontStyle::Bold, options.title.as_str());
    cursor.y = SOURCE_Y;
    cursor.line(LEFT, 10.0, FontStyle::Regular, format!("Fonte: {}", options.source));

    cursor.y = HEADER_Y;
    cursor.line(LEFT, 11.0, FontStyle::Bold, "Emitente");
    cursor.line(TOTAL_COLUMN, 11.0, FontStyle::Bold, "Total NF");
    cursor.line(TAX_COLUMN, 11.0, FontStyle::Bold, "ICMS");
    cursor.advance(HEADER_GAP);

    for record in &records[..printed] {
        cursor.row(
            FontStyle::Regular,
            &truncate_name(&record.issuer_name, NAME_WIDTH),
            format_brl_amount(record.invoice_total),
            format_brl_amount(record.tax_total),
        );
        cursor.advance(ROW_STEP);
    }

    if omitted > 0 {
        cursor.line(
            LEFT,
            10.0,
            FontStyle::Regular,
            format!("... {omitted} registro(s) omitido(s)"),
        );
        cursor.advance(ROW_STEP);
    }

    if let Some(aggregate) = aggregate {
        cursor.row(
            FontStyle::Bold,
            &aggregate.source_name,
            format_brl_amount(aggregate.invoice_total),
            format_brl_amount(aggregate.tax_total),
        );
        cursor.advance(ROW_STEP);
    }

    // A page break right after the last line leaves an empty page behind.
    if cursor.pages.len() > 1 && cursor.pages.last().is_some_and(|p| p.lines.is_empty()) {
        cursor.pages.pop();
    }

    PrintLayout {
        pages: cursor.pages,
        printed,
        omitted,
    }
}

/// Lay out a report table in its sorted order, aggregate row last.
pub fn layout_table(table: &ReportTable, options: &PrintOptions) -> PrintLayout {
    layout(table.records(), Some(table.aggregate()), options)
}

/// PDF text strings use WinAnsiEncoding; characters outside Latin-1 become `?`.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

fn pdf_error(err: impl std::fmt::Display) -> ReportIoError {
    ReportIoError::Pdf(err.to_string())
}

/// Render a layout as a PDF document using the standard Helvetica fonts.
pub fn render_pdf(layout: &PrintLayout) -> Result<Vec<u8>, ReportIoError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            FontStyle::Regular.resource_name() => regular_id,
            FontStyle::Bold.resource_name() => bold_id,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(layout.pages.len());
    for page in &layout.pages {
        let mut operations = Vec::with_capacity(page.lines.len() * 5);
        for line in &page.lines {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new(
                "Tf",
                vec![line.style.resource_name().into(), line.size.into()],
            ));
            operations.push(Operation::new("Td", vec![line.x.into(), line.y.into()]));
            operations.push(Operation::new(
                "Tj",
                vec![Object::String(win_ansi(&line.text), StringFormat::Literal)],
            ));
            operations.push(Operation::new("ET", vec![]));
        }

        let content = Content { operations }.encode().map_err(pdf_error)?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![Object::Integer(0), Object::Integer(0), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).map_err(pdf_error)?;

    debug!(pages = layout.pages.len(), bytes = buffer.len(), "rendered printable report");
    Ok(buffer)
}
