//! Minimal flowing-layout PDF writer on top of lopdf: text, tables and
//! images are placed top to bottom, starting a new A4 page when the current
//! one is full.

use std::path::Path;

use image::RgbImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use crate::error::AppError;

pub const PAGE_WIDTH: f32 = 595.0;
pub const PAGE_HEIGHT: f32 = 842.0;
const MARGIN_X: f32 = 56.0;
const MARGIN_TOP: f32 = 72.0;
const MARGIN_BOTTOM: f32 = 56.0;
const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN_X;
// Average Helvetica glyph width as a fraction of the font size.
const GLYPH_WIDTH: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Regular,
    Bold,
    Italic,
}

impl Font {
    fn resource_name(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
            Font::Italic => "F3",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Rgb(pub f32, pub f32, pub f32);

pub const DARK_BLUE: Rgb = Rgb(0.0, 0.0, 0.545);
pub const BEIGE: Rgb = Rgb(0.961, 0.961, 0.863);
pub const BLACK: Rgb = Rgb(0.0, 0.0, 0.0);
pub const WHITE: Rgb = Rgb(1.0, 1.0, 1.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
}

#[derive(Default)]
struct Page {
    operations: Vec<Operation>,
    images: Vec<(String, ObjectId)>,
}

impl Page {
    fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

pub struct PdfWriter {
    doc: Document,
    pages_id: ObjectId,
    fonts: [(Font, ObjectId); 3],
    finished: Vec<ObjectId>,
    page: Page,
    cursor: f32,
    image_count: usize,
}

impl PdfWriter {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut font = |base: &str| {
            doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => base,
                "Encoding" => "WinAnsiEncoding",
            })
        };
        let fonts = [
            (Font::Regular, font("Helvetica")),
            (Font::Bold, font("Helvetica-Bold")),
            (Font::Italic, font("Helvetica-Oblique")),
        ];

        Self {
            doc,
            pages_id,
            fonts,
            finished: Vec::new(),
            page: Page::default(),
            cursor: PAGE_HEIGHT - MARGIN_TOP,
            image_count: 0,
        }
    }

    /// Pages finished so far plus the current one if it has content.
    pub fn page_count(&self) -> usize {
        self.finished.len() + usize::from(!self.page.is_empty())
    }

    /// Starts a new page. Does nothing on a page that is still blank.
    pub fn page_break(&mut self) -> Result<(), AppError> {
        if self.page.is_empty() {
            return Ok(());
        }
        let page = std::mem::take(&mut self.page);
        self.cursor = PAGE_HEIGHT - MARGIN_TOP;

        let content = Content {
            operations: page.operations,
        };
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, content.encode()?));

        let mut font_dict = Dictionary::new();
        for (font, id) in &self.fonts {
            font_dict.set(font.resource_name(), *id);
        }
        let mut xobjects = Dictionary::new();
        for (name, id) in page.images {
            xobjects.set(name, id);
        }

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => font_dict,
                "XObject" => xobjects,
            },
        });
        self.finished.push(page_id);
        Ok(())
    }

    fn ensure_space(&mut self, height: f32) -> Result<(), AppError> {
        if self.cursor - height < MARGIN_BOTTOM {
            self.page_break()?;
        }
        Ok(())
    }

    pub fn spacer(&mut self, height: f32) {
        self.cursor = (self.cursor - height).max(MARGIN_BOTTOM);
    }

    fn push_text(&mut self, text: &str, font: Font, size: f32, x: f32, y: f32, color: Rgb) {
        self.page.operations.extend([
            Operation::new("BT", vec![]),
            Operation::new("rg", vec![color.0.into(), color.1.into(), color.2.into()]),
            Operation::new("Tf", vec![font.resource_name().into(), size.into()]),
            Operation::new("Td", vec![x.into(), y.into()]),
            Operation::new("Tj", vec![Object::String(encode_text(text), StringFormat::Literal)]),
            Operation::new("ET", vec![]),
        ]);
    }

    fn push_rect(&mut self, x: f32, y: f32, w: f32, h: f32, fill: Option<Rgb>, stroke: Option<Rgb>) {
        if let Some(color) = fill {
            self.page.operations.extend([
                Operation::new("rg", vec![color.0.into(), color.1.into(), color.2.into()]),
                Operation::new("re", vec![x.into(), y.into(), w.into(), h.into()]),
                Operation::new("f", vec![]),
            ]);
        }
        if let Some(color) = stroke {
            self.page.operations.extend([
                Operation::new("RG", vec![color.0.into(), color.1.into(), color.2.into()]),
                Operation::new("w", vec![0.75f32.into()]),
                Operation::new("re", vec![x.into(), y.into(), w.into(), h.into()]),
                Operation::new("S", vec![]),
            ]);
        }
    }

    /// One line of text; longer text is cut to the content width.
    pub fn line(&mut self, text: &str, font: Font, size: f32, align: Align) -> Result<(), AppError> {
        self.colored_line(text, font, size, align, BLACK)
    }

    fn colored_line(&mut self, text: &str, font: Font, size: f32, align: Align, color: Rgb) -> Result<(), AppError> {
        let leading = size * 1.3;
        self.ensure_space(leading)?;
        self.cursor -= leading;

        let text = truncate_to_width(text, size, CONTENT_WIDTH);
        let x = match align {
            Align::Left => MARGIN_X,
            Align::Center => MARGIN_X + (CONTENT_WIDTH - text_width(&text, size)).max(0.0) / 2.0,
        };
        let y = self.cursor;
        self.push_text(&text, font, size, x, y, color);
        Ok(())
    }

    /// Word-wrapped text across the content width.
    pub fn paragraph(&mut self, text: &str, font: Font, size: f32) -> Result<(), AppError> {
        for line in wrap(text, size, CONTENT_WIDTH) {
            self.line(&line, font, size, Align::Left)?;
        }
        Ok(())
    }

    pub fn title(&mut self, text: &str) -> Result<(), AppError> {
        self.colored_line(text, Font::Bold, 24.0, Align::Center, DARK_BLUE)?;
        self.spacer(20.0);
        Ok(())
    }

    pub fn heading(&mut self, text: &str) -> Result<(), AppError> {
        self.ensure_space(60.0)?;
        self.spacer(14.0);
        self.colored_line(text, Font::Bold, 16.0, Align::Left, DARK_BLUE)?;
        self.spacer(8.0);
        Ok(())
    }

    /// Grid table with a dark header row; columns share the content width.
    pub fn table(&mut self, rows: &[Vec<String>], font_size: f32) -> Result<(), AppError> {
        let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
        if columns == 0 {
            return Ok(());
        }
        let col_width = CONTENT_WIDTH / columns as f32;
        let row_height = font_size * 2.0;

        for (index, row) in rows.iter().enumerate() {
            let header = index == 0;
            self.ensure_space(row_height)?;
            self.cursor -= row_height;
            let y = self.cursor;

            let (fill, font, color) = if header {
                (DARK_BLUE, Font::Bold, WHITE)
            } else {
                (BEIGE, Font::Regular, BLACK)
            };

            for col in 0..columns {
                let x = MARGIN_X + col as f32 * col_width;
                self.push_rect(x, y, col_width, row_height, Some(fill), Some(BLACK));

                let cell = row.get(col).map(String::as_str).unwrap_or("");
                let text = truncate_to_width(cell, font_size, col_width - 6.0);
                let text_x = x + (col_width - text_width(&text, font_size)).max(0.0) / 2.0;
                let text_y = y + (row_height - font_size) / 2.0 + font_size * 0.2;
                self.push_text(&text, font, font_size, text_x, text_y, color);
            }
        }
        Ok(())
    }

    /// Places an RGB image scaled to `width` points, keeping its aspect
    /// ratio and never exceeding one page of height.
    pub fn image(&mut self, image: &RgbImage, width: f32) -> Result<(), AppError> {
        let (px_w, px_h) = image.dimensions();
        if px_w == 0 || px_h == 0 {
            return Ok(());
        }
        let max_height = PAGE_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
        let mut draw_w = width.min(CONTENT_WIDTH);
        let mut draw_h = draw_w * px_h as f32 / px_w as f32;
        if draw_h > max_height {
            draw_w *= max_height / draw_h;
            draw_h = max_height;
        }

        self.ensure_space(draw_h)?;
        self.cursor -= draw_h;

        self.image_count += 1;
        let name = format!("Im{}", self.image_count);
        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => px_w as i64,
                "Height" => px_h as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            image.as_raw().clone(),
        );
        let image_id = self.doc.add_object(stream);

        let x = MARGIN_X + (CONTENT_WIDTH - draw_w) / 2.0;
        let y = self.cursor;
        self.page.operations.extend([
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![draw_w.into(), 0.into(), 0.into(), draw_h.into(), x.into(), y.into()],
            ),
            Operation::new("Do", vec![Object::Name(name.clone().into_bytes())]),
            Operation::new("Q", vec![]),
        ]);
        self.page.images.push((name, image_id));
        Ok(())
    }

    /// Closes the last page and writes the document to `path`. Returns the
    /// number of pages written.
    pub fn save(mut self, path: &Path) -> Result<usize, AppError> {
        self.page_break()?;

        let kids: Vec<Object> = self.finished.iter().map(|id| Object::Reference(*id)).collect();
        let count = kids.len();
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count as i64,
            "MediaBox" => vec![0.into(), 0.into(), (PAGE_WIDTH as i64).into(), (PAGE_HEIGHT as i64).into()],
        };
        self.doc.objects.insert(self.pages_id, Object::Dictionary(pages));

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.compress();
        self.doc.save(path)?;
        Ok(count)
    }
}

impl Default for PdfWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Latin-1 bytes for the WinAnsi-encoded standard fonts; other characters
/// become `?`.
fn encode_text(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            0x20..=0x7e | 0xa0..=0xff => c as u32 as u8,
            _ => b'?',
        })
        .collect()
}

fn text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * GLYPH_WIDTH
}

fn truncate_to_width(text: &str, size: f32, width: f32) -> String {
    let max_chars = (width / (size * GLYPH_WIDTH)).floor().max(1.0) as usize;
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept)
}

fn wrap(text: &str, size: f32, width: f32) -> Vec<String> {
    let max_chars = (width / (size * GLYPH_WIDTH)).floor().max(1.0) as usize;
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let needed = current.chars().count() + word.chars().count() + usize::from(!current.is_empty());
        if needed > max_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_on_word_boundaries() {
        // 10pt text over 50pt fits 10 characters per line.
        let lines = wrap("alpha beta gamma delta", 10.0, 50.0);
        assert_eq!(lines, vec!["alpha beta", "gamma", "delta"]);
    }

    #[test]
    fn truncates_long_cells() {
        assert_eq!(truncate_to_width("short", 10.0, 100.0), "short");
        assert_eq!(truncate_to_width("a very long column name", 10.0, 50.0), "a very ...");
    }

    #[test]
    fn non_latin_characters_are_replaced() {
        assert_eq!(encode_text("caf\u{e9} \u{1F4CA}"), vec![b'c', b'a', b'f', 0xe9, b' ', b'?']);
    }

    fn text_colors(writer: &PdfWriter) -> Vec<(f64, f64, f64)> {
        writer
            .page
            .operations
            .iter()
            .filter(|op| op.operator == "rg")
            .filter_map(|op| match op.operands.as_slice() {
                [Object::Real(r), Object::Real(g), Object::Real(b)] => Some((*r as f64, *g as f64, *b as f64)),
                _ => None,
            })
            .collect()
    }

    fn is_dark_blue((r, g, b): (f64, f64, f64)) -> bool {
        r.abs() < 1e-3 && g.abs() < 1e-3 && (b - 0.545).abs() < 1e-3
    }

    #[test]
    fn title_and_headings_are_dark_blue() {
        let mut writer = PdfWriter::new();
        writer.title("Report").unwrap();
        writer.heading("Section").unwrap();
        let colors = text_colors(&writer);
        assert_eq!(colors.len(), 2);
        assert!(colors.into_iter().all(is_dark_blue));

        let mut body = PdfWriter::new();
        body.line("plain", Font::Regular, 11.0, Align::Left).unwrap();
        assert!(!text_colors(&body).into_iter().any(is_dark_blue));
    }

    #[test]
    fn blank_pages_are_not_emitted() {
        let mut writer = PdfWriter::new();
        writer.page_break().unwrap();
        assert_eq!(writer.page_count(), 0);

        writer.line("hello", Font::Regular, 12.0, Align::Left).unwrap();
        writer.page_break().unwrap();
        writer.page_break().unwrap();
        assert_eq!(writer.page_count(), 1);
    }

    #[test]
    fn overflowing_content_starts_a_new_page() {
        let mut writer = PdfWriter::new();
        for i in 0..80 {
            writer.line(&format!("line {}", i), Font::Regular, 12.0, Align::Left).unwrap();
        }
        assert!(writer.page_count() >= 2);
    }

    #[test]
    fn saved_document_can_be_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pdf");

        let mut writer = PdfWriter::new();
        writer.line("Title", Font::Bold, 24.0, Align::Center).unwrap();
        writer
            .table(&[vec!["Metric".into(), "Value".into()], vec!["Rows".into(), "3".into()]], 10.0)
            .unwrap();
        writer.image(&RgbImage::new(20, 10), 200.0).unwrap();
        writer.page_break().unwrap();
        writer.line("Footer", Font::Italic, 10.0, Align::Left).unwrap();
        let pages = writer.save(&path).unwrap();

        assert_eq!(pages, 2);
        let loaded = Document::load(&path).unwrap();
        assert_eq!(loaded.get_pages().len(), 2);
    }
}
