//! Minimal PDF 1.4 text writer.
//!
//! Produces US Letter pages using the built-in Helvetica fonts, so no font
//! data is embedded. Text is encoded as `WinAnsiEncoding`; characters
//! outside Latin-1 are replaced with `?`.

use std::fmt::Write as _;

const PAGE_WIDTH: f32 = 612.0;
const PAGE_HEIGHT: f32 = 792.0;
const MARGIN: f32 = 54.0;
/// Horizontal offset of field values from the left margin.
const VALUE_COLUMN: f32 = 170.0;
/// Average Helvetica glyph width as a fraction of the font size.
const AVG_GLYPH_WIDTH: f32 = 0.52;

const TITLE_SIZE: f32 = 16.0;
const HEADING_SIZE: f32 = 12.0;
const BODY_SIZE: f32 = 10.0;
const LINE_SPACING: f32 = 1.4;

#[derive(Debug, Clone)]
struct Run {
    x: f32,
    bold: bool,
    text: String,
}

#[derive(Debug, Clone)]
struct Line {
    size: f32,
    /// Extra space above the line.
    gap: f32,
    runs: Vec<Run>,
}

impl Line {
    fn height(&self) -> f32 {
        self.size * LINE_SPACING + self.gap
    }
}

/// Builds a text-only PDF document line by line.
#[derive(Debug, Default)]
pub struct PdfBuilder {
    lines: Vec<Line>,
}

impl PdfBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Large bold line.
    pub fn title(&mut self, text: &str) -> &mut Self {
        self.push_wrapped(text, TITLE_SIZE, true, 0.0, MARGIN);
        self
    }

    /// Bold section heading with space above it.
    pub fn heading(&mut self, text: &str) -> &mut Self {
        self.push_wrapped(text, HEADING_SIZE, true, HEADING_SIZE, MARGIN);
        self
    }

    /// Bold label with its value in a second column, wrapping the value.
    pub fn field(&mut self, label: &str, value: &str) -> &mut Self {
        let value_x = MARGIN + VALUE_COLUMN;
        let width = wrap_width(value_x, BODY_SIZE);
        let mut chunks = wrap(value, width).into_iter();

        let first = chunks.next().unwrap_or_default();
        self.lines.push(Line {
            size: BODY_SIZE,
            gap: 0.0,
            runs: vec![
                Run {
                    x: MARGIN,
                    bold: true,
                    text: truncate(label, wrap_width_between(MARGIN, value_x, BODY_SIZE)),
                },
                Run {
                    x: value_x,
                    bold: false,
                    text: first,
                },
            ],
        });
        for chunk in chunks {
            self.lines.push(Line {
                size: BODY_SIZE,
                gap: 0.0,
                runs: vec![Run {
                    x: value_x,
                    bold: false,
                    text: chunk,
                }],
            });
        }
        self
    }

    /// Plain wrapped paragraph.
    pub fn paragraph(&mut self, text: &str) -> &mut Self {
        self.push_wrapped(text, BODY_SIZE, false, BODY_SIZE * 0.5, MARGIN);
        self
    }

    fn push_wrapped(&mut self, text: &str, size: f32, bold: bool, gap: f32, x: f32) {
        for (i, chunk) in wrap(text, wrap_width(x, size)).into_iter().enumerate() {
            self.lines.push(Line {
                size,
                gap: if i == 0 { gap } else { 0.0 },
                runs: vec![Run {
                    x,
                    bold,
                    text: chunk,
                }],
            });
        }
    }

    /// Lay the lines out onto pages and serialise the document.
    #[must_use]
    pub fn finish(&self) -> Vec<u8> {
        let pages = self.paginate();
        let mut out = ObjectWriter::default();

        // Object numbering: 1 catalog, 2 page tree, 3-4 fonts, then a
        // (page, content) pair per page.
        let page_ids: Vec<usize> = (0..pages.len()).map(|i| 5 + i * 2).collect();

        out.object(1, "<< /Type /Catalog /Pages 2 0 R >>");
        let kids = page_ids
            .iter()
            .map(|id| format!("{id} 0 R"))
            .collect::<Vec<_>>()
            .join(" ");
        out.object(
            2,
            &format!("<< /Type /Pages /Kids [{kids}] /Count {} >>", pages.len()),
        );
        out.object(
            3,
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>",
        );
        out.object(
            4,
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>",
        );

        for (page, &page_id) in pages.iter().zip(&page_ids) {
            let content_id = page_id + 1;
            out.object(
                page_id,
                &format!(
                    "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH} {PAGE_HEIGHT}] \
                     /Resources << /Font << /F1 3 0 R /F2 4 0 R >> >> /Contents {content_id} 0 R >>"
                ),
            );
            out.stream(content_id, &content_stream(page));
        }

        out.finish(1)
    }

    fn paginate(&self) -> Vec<Vec<(f32, &Line)>> {
        let mut pages = vec![Vec::new()];
        let mut y = PAGE_HEIGHT - MARGIN;

        for line in &self.lines {
            let height = line.height();
            if y - height < MARGIN && pages.last().is_some_and(|p| !p.is_empty()) {
                pages.push(Vec::new());
                y = PAGE_HEIGHT - MARGIN;
            }
            y -= height;
            if let Some(page) = pages.last_mut() {
                page.push((y, line));
            }
        }
        pages
    }
}

fn content_stream(lines: &[(f32, &Line)]) -> Vec<u8> {
    let mut content = Vec::new();
    for (y, line) in lines {
        for run in &line.runs {
            if run.text.is_empty() {
                continue;
            }
            let font = if run.bold { "F2" } else { "F1" };
            content.extend_from_slice(
                format!("BT /{font} {} Tf {:.2} {:.2} Td (", line.size, run.x, y).as_bytes(),
            );
            content.extend_from_slice(&escape_text(&run.text));
            content.extend_from_slice(b") Tj ET\n");
        }
    }
    content
}

/// Encode text as a PDF literal string body (without the parentheses).
fn escape_text(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' | '(' | ')' => {
                out.push(b'\\');
                out.push(c as u8);
            }
            c if c.is_control() => out.push(b' '),
            c if c.is_ascii() => out.push(c as u8),
            c => match u8::try_from(u32::from(c)) {
                // Latin-1 supplement maps directly onto WinAnsi.
                Ok(byte) if byte >= 0xA0 => {
                    let mut escaped = String::new();
                    let _ = write!(escaped, "\\{byte:03o}");
                    out.extend_from_slice(escaped.as_bytes());
                }
                _ => out.push(b'?'),
            },
        }
    }
    out
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn wrap_width_between(from: f32, to: f32, size: f32) -> usize {
    (((to - from) / (size * AVG_GLYPH_WIDTH)).floor() as usize).max(1)
}

fn wrap_width(x: f32, size: f32) -> usize {
    wrap_width_between(x, PAGE_WIDTH - MARGIN, size)
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_owned();
    }
    let mut out: String = text.chars().take(width.saturating_sub(1)).collect();
    out.push('.');
    out
}

/// Greedy word wrap to `width` characters; over-long words are split.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > width {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                let rest = word.split_off(width);
                lines.push(word.into_iter().collect());
                word = rest;
            }
            let word: String = word.into_iter().collect();
            let needed = if current.is_empty() {
                word.chars().count()
            } else {
                current.chars().count() + 1 + word.chars().count()
            };
            if needed > width && !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&word);
        }
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// Appends numbered objects and records their byte offsets for the xref table.
#[derive(Default)]
struct ObjectWriter {
    buf: Vec<u8>,
    offsets: Vec<(usize, usize)>,
}

impl ObjectWriter {
    fn header(&mut self) {
        if self.buf.is_empty() {
            // Binary comment marks the file as containing 8-bit data.
            self.buf.extend_from_slice(b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n");
        }
    }

    fn object(&mut self, id: usize, body: &str) {
        self.header();
        self.offsets.push((id, self.buf.len()));
        self.buf
            .extend_from_slice(format!("{id} 0 obj\n{body}\nendobj\n").as_bytes());
    }

    fn stream(&mut self, id: usize, data: &[u8]) {
        self.header();
        self.offsets.push((id, self.buf.len()));
        self.buf.extend_from_slice(
            format!("{id} 0 obj\n<< /Length {} >>\nstream\n", data.len()).as_bytes(),
        );
        self.buf.extend_from_slice(data);
        self.buf.extend_from_slice(b"\nendstream\nendobj\n");
    }

    fn finish(mut self, root: usize) -> Vec<u8> {
        self.offsets.sort_unstable();
        let size = self.offsets.last().map_or(0, |(id, _)| *id) + 1;
        let xref_at = self.buf.len();

        let mut xref = format!("xref\n0 {size}\n0000000000 65535 f \n");
        let mut known = self.offsets.iter().peekable();
        for id in 1..size {
            match known.next_if(|(known_id, _)| *known_id == id) {
                Some((_, offset)) => {
                    let _ = writeln!(xref, "{offset:010} 00000 n ");
                }
                None => xref.push_str("0000000000 65535 f \n"),
            }
        }
        let _ = write!(
            xref,
            "trailer\n<< /Size {size} /Root {root} 0 R >>\nstartxref\n{xref_at}\n%%EOF\n"
        );
        self.buf.extend_from_slice(xref.as_bytes());
        self.buf
    }
}
