use std::fmt::Write as _;

use crate::error::EngineError;

/// Columns beyond this are never drawn.
pub const MAX_RENDERED_COLUMNS: usize = 12;

pub trait TableRenderer: Send + Sync {
    fn render(&self, headers: &[String], rows: &[Vec<String>]) -> Result<Vec<u8>, EngineError>;

    /// Attachment name for the rendered bytes.
    fn file_name(&self) -> &str;
}

/// Plain SVG grid: shaded header, zebra rows, column widths sized to text.
#[derive(Debug, Clone)]
pub struct SvgRenderer {
    pub char_width: u32,
    pub row_height: u32,
    pub padding: u32,
    pub margin: u32,
}

impl Default for SvgRenderer {
    fn default() -> Self {
        Self { char_width: 8, row_height: 32, padding: 8, margin: 20 }
    }
}

impl SvgRenderer {
    fn column_widths(&self, headers: &[String], rows: &[Vec<String>]) -> Vec<u32> {
        (0..headers.len())
            .map(|i| {
                let longest = std::iter::once(headers[i].chars().count())
                    .chain(rows.iter().map(|r| r.get(i).map_or(0, |c| c.chars().count())))
                    .max()
                    .unwrap_or(0);
                longest as u32 * self.char_width + 2 * self.padding
            })
            .collect()
    }
}

impl TableRenderer for SvgRenderer {
    fn render(&self, headers: &[String], rows: &[Vec<String>]) -> Result<Vec<u8>, EngineError> {
        let headers = &headers[..headers.len().min(MAX_RENDERED_COLUMNS)];
        if headers.is_empty() {
            return Err(EngineError::Render("table has no columns".into()));
        }
        let widths = self.column_widths(headers, rows);
        let table_width: u32 = widths.iter().sum();
        let width = table_width + 2 * self.margin;
        let height = (rows.len() as u32 + 1) * self.row_height + 2 * self.margin;

        let mut svg = String::new();
        let _ = writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}" font-family="Arial, sans-serif" font-size="14">"#
        );
        let _ = writeln!(svg, r##"<rect width="{width}" height="{height}" fill="#ffffff"/>"##);

        let all_rows = std::iter::once(headers).chain(rows.iter().map(Vec::as_slice));
        for (r, cells) in all_rows.enumerate() {
            let y = self.margin + r as u32 * self.row_height;
            let fill = match r {
                0 => "#f2f2f2",
                n if n % 2 == 0 => "#f9f9f9",
                _ => "#ffffff",
            };
            let mut x = self.margin;
            for (c, &w) in widths.iter().enumerate() {
                let text = cells.get(c).map(String::as_str).unwrap_or("");
                let weight = if r == 0 { r#" font-weight="bold""# } else { "" };
                let _ = writeln!(
                    svg,
                    r##"<rect x="{x}" y="{y}" width="{w}" height="{h}" fill="{fill}" stroke="#dddddd"/><text x="{tx}" y="{ty}"{weight}>{text}</text>"##,
                    h = self.row_height,
                    tx = x + self.padding,
                    ty = y + self.row_height / 2 + 5,
                    text = escape(text),
                );
                x += w;
            }
        }
        svg.push_str("</svg>\n");
        Ok(svg.into_bytes())
    }

    fn file_name(&self) -> &str {
        "filtered_table.svg"
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn renders_escaped_cells() {
        let svg = SvgRenderer::default()
            .render(&strings(&["name", "profession_1"]), &[strings(&["<Bob & Co>", "Smith"])])
            .unwrap();
        let svg = String::from_utf8(svg).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("&lt;Bob &amp; Co&gt;"));
        assert!(!svg.contains("<Bob"));
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn only_first_twelve_columns_are_drawn() {
        let headers: Vec<String> = (0..14).map(|i| format!("col_{i}")).collect();
        let row: Vec<String> = (0..14).map(|i| format!("v{i}")).collect();
        let svg = String::from_utf8(SvgRenderer::default().render(&headers, &[row]).unwrap()).unwrap();
        assert!(svg.contains(">col_11<"));
        assert!(!svg.contains(">col_12<"));
        assert!(!svg.contains(">v13<"));
    }

    #[test]
    fn short_rows_render_blank_cells() {
        let svg = SvgRenderer::default()
            .render(&strings(&["a", "b", "c"]), &[strings(&["x"])])
            .unwrap();
        assert_eq!(String::from_utf8(svg).unwrap().matches("<text").count(), 6);
    }

    #[test]
    fn no_columns_is_a_render_error() {
        assert!(matches!(
            SvgRenderer::default().render(&[], &[]),
            Err(EngineError::Render(_))
        ));
    }
}
