//! Placeholder PDF export.
//!
//! Produces a one-page document with a fixed title and no diagram content.
//! The page is 12 x 6 inches.

use crate::Download;

pub const PDF_FILE_NAME: &str = "bowtie_diagram.pdf";
pub const PDF_MIME_TYPE: &str = "application/pdf";

pub const TITLE_LINES: [&str; 2] = ["Bowtie Diagram Export", "(from Excel or Agent Input)"];

const PAGE_WIDTH: f32 = 864.0;
const PAGE_HEIGHT: f32 = 432.0;
const FONT_SIZE: f32 = 18.0;
const LINE_GAP: f32 = 24.0;

/// Escape `\`, `(` and `)` for a PDF literal string.
fn pdf_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('(');
    for c in text.chars() {
        if matches!(c, '\\' | '(' | ')') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push(')');
    out
}

fn content_stream() -> String {
    let mut out = String::new();
    let top = PAGE_HEIGHT / 2.0 + LINE_GAP / 2.0;
    for (i, line) in TITLE_LINES.iter().enumerate() {
        // Helvetica averages roughly half an em per character
        let width = line.chars().count() as f32 * FONT_SIZE * 0.5;
        let x = (PAGE_WIDTH - width) / 2.0;
        let y = top - i as f32 * LINE_GAP;
        out.push_str(&format!(
            "BT /F1 {FONT_SIZE:.0} Tf {x:.2} {y:.2} Td {} Tj ET\n",
            pdf_string(line)
        ));
    }
    out
}

/// Bytes of the placeholder document.
pub fn placeholder_pdf() -> Vec<u8> {
    let content = content_stream();
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH:.0} {PAGE_HEIGHT:.0}] \
             /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>"
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
        format!(
            "<< /Length {} >>\nstream\n{}endstream",
            content.len(),
            content
        ),
        format!(
            "<< /Title {} /Producer (bowtie-core) >>",
            pdf_string(TITLE_LINES[0])
        ),
    ];

    let mut out = String::from("%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.push_str(&format!("{} 0 obj\n{}\nendobj\n", i + 1, body));
    }

    let xref_at = out.len();
    out.push_str(&format!("xref\n0 {}\n", objects.len() + 1));
    out.push_str("0000000000 65535 f \n");
    for offset in &offsets {
        out.push_str(&format!("{offset:010} 00000 n \n"));
    }
    out.push_str(&format!(
        "trailer\n<< /Size {} /Root 1 0 R /Info 6 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_at
    ));
    out.into_bytes()
}

pub fn pdf_download() -> Download {
    Download {
        file_name: PDF_FILE_NAME,
        mime_type: PDF_MIME_TYPE,
        bytes: placeholder_pdf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn as_text(bytes: &[u8]) -> &str {
        std::str::from_utf8(bytes).unwrap()
    }

    #[test]
    fn document_has_header_title_and_trailer() {
        let pdf = placeholder_pdf();
        let text = as_text(&pdf);
        assert!(text.starts_with("%PDF-1.4\n"));
        assert!(text.ends_with("%%EOF\n"));
        assert!(text.contains("(Bowtie Diagram Export) Tj"));
        assert!(text.contains("(\\(from Excel or Agent Input\\)) Tj"));
        assert!(text.contains("/MediaBox [0 0 864 432]"));
    }

    #[test]
    fn xref_offsets_point_at_objects() {
        let pdf = placeholder_pdf();
        let text = as_text(&pdf);
        let startxref: usize = text
            .rsplit("startxref\n")
            .next()
            .and_then(|tail| tail.lines().next())
            .and_then(|n| n.parse().ok())
            .unwrap();
        assert!(text[startxref..].starts_with("xref\n0 7\n"));

        let entries: Vec<usize> = text[startxref..]
            .lines()
            .skip(3)
            .take(6)
            .map(|l| l[..10].parse().unwrap())
            .collect();
        for (i, offset) in entries.iter().enumerate() {
            assert!(text[*offset..].starts_with(&format!("{} 0 obj", i + 1)));
        }
    }

    #[test]
    fn stream_length_matches_content() {
        let pdf = placeholder_pdf();
        let text = as_text(&pdf);
        let content = content_stream();
        assert!(text.contains(&format!("<< /Length {} >>\nstream\n{}endstream", content.len(), content)));
    }

    #[test]
    fn output_is_static() {
        assert_eq!(placeholder_pdf(), placeholder_pdf());
        let download = pdf_download();
        assert_eq!(download.file_name, "bowtie_diagram.pdf");
        assert_eq!(download.mime_type, "application/pdf");
    }
}
