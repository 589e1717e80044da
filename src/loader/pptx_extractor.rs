use anyhow::{Context, Result, bail};
use quick_xml::events::Event;
use std::io::{Cursor, Read};
use std::path::Path;

/// Maximum decompressed bytes read from a single slide entry (zip-bomb protection)
const MAX_SLIDE_XML_BYTES: u64 = 50 * 1024 * 1024;

const SLIDE_PREFIX: &str = "ppt/slides/slide";

/// Extract the text of every slide of a .pptx deck, ordered by slide number
///
/// Returns `(slide_number, text)` pairs; slide numbers are the 1-based numbers
/// from the archive entry names (`ppt/slides/slide3.xml` is slide 3).
pub fn extract_pptx_slides(path: &Path) -> Result<Vec<(u32, String)>> {
    let bytes = std::fs::read(path).context("Failed to read slide deck")?;
    extract_slides_from_bytes(&bytes)
}

fn extract_slides_from_bytes(bytes: &[u8]) -> Result<Vec<(u32, String)>> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).context("Slide deck is not a valid zip archive")?;

    let mut slides: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| slide_number(name).map(|n| (n, name.to_string())))
        .collect();
    slides.sort_by_key(|(n, _)| *n);

    let mut out = Vec::with_capacity(slides.len());
    for (number, name) in slides {
        let entry = archive
            .by_name(&name)
            .with_context(|| format!("Failed to open {}", name))?;
        let mut xml = Vec::new();
        entry
            .take(MAX_SLIDE_XML_BYTES)
            .read_to_end(&mut xml)
            .with_context(|| format!("Failed to read {}", name))?;
        if xml.len() as u64 >= MAX_SLIDE_XML_BYTES {
            bail!("{} exceeds size limit ({} bytes)", name, MAX_SLIDE_XML_BYTES);
        }
        out.push((number, slide_text(&xml)?));
    }

    Ok(out)
}

fn slide_number(entry_name: &str) -> Option<u32> {
    entry_name
        .strip_prefix(SLIDE_PREFIX)?
        .strip_suffix(".xml")?
        .parse()
        .ok()
}

/// Collect `<a:t>` runs; each `<a:p>` paragraph becomes one line
fn slide_text(xml: &[u8]) -> Result<String> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let line = current.trim();
                    if !line.is_empty() {
                        lines.push(line.to_string());
                    }
                    current.clear();
                }
                _ => {}
            },
            Ok(Event::Text(te)) if in_text => {
                let text = te.unescape().context("Invalid text in slide XML")?;
                if !current.is_empty() && !current.ends_with(' ') {
                    current.push(' ');
                }
                current.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => bail!("Malformed slide XML: {}", e),
            _ => {}
        }
        buf.clear();
    }

    let tail = current.trim();
    if !tail.is_empty() {
        lines.push(tail.to_string());
    }

    Ok(lines.join("\n"))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    /// Build a minimal deck containing the given slide XML bodies keyed by slide number
    pub(crate) fn build_pptx(slides: &[(u32, &str)]) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            let options = zip::write::SimpleFileOptions::default();
            zip.start_file("[Content_Types].xml", options).unwrap();
            zip.write_all(b"<Types/>").unwrap();
            for (n, body) in slides {
                zip.start_file(format!("ppt/slides/slide{}.xml", n), options)
                    .unwrap();
                zip.write_all(body.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buf.into_inner()
    }

    pub(crate) fn slide_xml(paragraphs: &[&str]) -> String {
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<a:p><a:r><a:t>{}</a:t></a:r></a:p>", p))
            .collect();
        format!(
            r#"<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:cSld><p:spTree><p:sp><p:txBody>{}</p:txBody></p:sp></p:spTree></p:cSld></p:sld>"#,
            body
        )
    }

    #[test]
    fn test_slide_number_parsing() {
        assert_eq!(slide_number("ppt/slides/slide1.xml"), Some(1));
        assert_eq!(slide_number("ppt/slides/slide12.xml"), Some(12));
        assert_eq!(slide_number("ppt/slides/_rels/slide1.xml.rels"), None);
        assert_eq!(slide_number("ppt/slideLayouts/slideLayout1.xml"), None);
    }

    #[test]
    fn test_slides_ordered_numerically() {
        let s1 = slide_xml(&["First"]);
        let s2 = slide_xml(&["Second"]);
        let s10 = slide_xml(&["Tenth"]);
        let deck = build_pptx(&[(10, &s10), (2, &s2), (1, &s1)]);

        let slides = extract_slides_from_bytes(&deck).unwrap();
        let numbers: Vec<u32> = slides.iter().map(|(n, _)| *n).collect();
        assert_eq!(numbers, vec![1, 2, 10]);
        assert_eq!(slides[2].1, "Tenth");
    }

    #[test]
    fn test_paragraphs_become_lines() {
        let xml = slide_xml(&["TCP handshake", "SYN, SYN-ACK, ACK", "  "]);
        let text = slide_text(xml.as_bytes()).unwrap();
        assert_eq!(text, "TCP handshake\nSYN, SYN-ACK, ACK");
    }

    #[test]
    fn test_entities_are_unescaped() {
        let xml = slide_xml(&["A &amp; B &lt; C"]);
        assert_eq!(slide_text(xml.as_bytes()).unwrap(), "A & B < C");
    }

    #[test]
    fn test_not_a_zip() {
        assert!(extract_slides_from_bytes(b"plain text").is_err());
    }
}
