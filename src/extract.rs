//! Text extraction for uploaded contracts (PDF, DOCX, TXT).
//!
//! This is the text-source boundary of the pipeline: given a file it returns
//! cleaned UTF-8 text plus page count. OCR of embedded images is not
//! performed, so `ocr_used` is always `false`.

use regex::Regex;
use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;

use crate::models::FileType;

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex is valid"));
static PAGE_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"--- PÁGINA \d+ ---").expect("page marker regex is valid"));

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),
    #[error("file too large: {size} bytes (limit {limit} bytes)")]
    TooLarge { size: u64, limit: u64 },
    #[error("failed to read {path}: {message}")]
    Io { path: String, message: String },
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("DOCX extraction failed: {0}")]
    Docx(String),
    #[error("text file could not be decoded")]
    Encoding,
}

/// Cleaned text plus basic metadata about its source.
#[derive(Debug, Clone)]
pub struct ExtractedText {
    pub text: String,
    pub page_count: usize,
    pub ocr_used: bool,
}

/// Reject files that are not pdf/docx/txt or exceed the size limit.
pub fn validate_file(path: &Path, size: u64, max_bytes: u64) -> Result<FileType, ExtractError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| ExtractError::UnsupportedFileType(path.display().to_string()))?;
    let file_type = FileType::from_extension(ext)?;
    if size > max_bytes {
        return Err(ExtractError::TooLarge {
            size,
            limit: max_bytes,
        });
    }
    Ok(file_type)
}

/// Read a file and extract its cleaned text.
pub fn extract_file(path: &Path, file_type: FileType) -> Result<ExtractedText, ExtractError> {
    let bytes = std::fs::read(path).map_err(|e| ExtractError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    extract_bytes(&bytes, file_type)
}

/// Extract cleaned text from in-memory file contents.
pub fn extract_bytes(bytes: &[u8], file_type: FileType) -> Result<ExtractedText, ExtractError> {
    let (raw, page_count) = match file_type {
        FileType::Pdf => extract_pdf(bytes)?,
        FileType::Docx => (extract_docx(bytes)?, 1),
        FileType::Txt => (decode_txt(bytes)?, 1),
    };
    Ok(ExtractedText {
        text: clean_text(&raw),
        page_count,
        ocr_used: false,
    })
}

/// Drop page markers, collapse whitespace, and trim.
pub fn clean_text(text: &str) -> String {
    let unmarked = PAGE_MARKER_RE.replace_all(text, " ");
    let collapsed = WHITESPACE_RE.replace_all(&unmarked, " ");
    collapsed.trim().to_string()
}

fn extract_pdf(bytes: &[u8]) -> Result<(String, usize), ExtractError> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| ExtractError::Pdf(e.to_string()))?;
    Ok((mark_pages(&pages), pages.len()))
}

/// Prefix each non-blank page with a `--- PÁGINA n ---` marker, numbering
/// from 1 in document order.
fn mark_pages(pages: &[String]) -> String {
    let mut out = String::new();
    for (i, page) in pages.iter().enumerate() {
        if page.trim().is_empty() {
            continue;
        }
        out.push_str(&format!("\n--- PÁGINA {} ---\n", i + 1));
        out.push_str(page);
        out.push('\n');
    }
    out
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|_| ExtractError::Docx("word/document.xml not found".to_string()))?;
    let mut doc_xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut doc_xml)
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Docx(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }
    extract_paragraph_text(&doc_xml)
}

/// Concatenate `w:t` runs, one line per `w:p` paragraph.
fn extract_paragraph_text(xml: &[u8]) -> Result<String, ExtractError> {
    use quick_xml::events::Event;

    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::Text(te)) if in_text => {
                out.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

/// UTF-8 first, then Latin-1 (every byte sequence decodes).
fn decode_txt(bytes: &[u8]) -> Result<String, ExtractError> {
    if bytes.is_empty() {
        return Err(ExtractError::Encoding);
    }
    match std::str::from_utf8(bytes) {
        Ok(s) => Ok(s.trim_start_matches('\u{feff}').to_string()),
        Err(_) => Ok(bytes.iter().map(|&b| b as char).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_collapses_and_strips_markers() {
        let raw = "\n--- PÁGINA 1 ---\nCLÁUSULA   PRIMEIRA\n\n\tdo objeto\n--- PÁGINA 2 ---\nfim ";
        assert_eq!(clean_text(raw), "CLÁUSULA PRIMEIRA do objeto fim");
    }

    #[test]
    fn pages_keep_their_position_in_markers() {
        let pages = vec![
            "objeto".to_string(),
            "  \n".to_string(),
            "multa".to_string(),
        ];
        let marked = mark_pages(&pages);
        assert!(marked.contains("--- PÁGINA 1 ---\nobjeto"));
        assert!(!marked.contains("PÁGINA 2"));
        assert!(marked.contains("--- PÁGINA 3 ---\nmulta"));
        assert_eq!(clean_text(&marked), "objeto multa");
    }

    #[test]
    fn txt_utf8_and_latin1() {
        let utf8 = extract_bytes("vigência de 24 meses".as_bytes(), FileType::Txt).unwrap();
        assert_eq!(utf8.text, "vigência de 24 meses");
        assert!(!utf8.ocr_used);

        let latin1 = [b'v', b'i', b'g', 0xEA, b'n', b'c', b'i', b'a'];
        let decoded = extract_bytes(&latin1, FileType::Txt).unwrap();
        assert_eq!(decoded.text, "vigência");
    }

    #[test]
    fn empty_txt_is_an_error() {
        assert!(matches!(
            extract_bytes(b"", FileType::Txt),
            Err(ExtractError::Encoding)
        ));
    }

    #[test]
    fn invalid_pdf_returns_error() {
        let err = extract_bytes(b"not a pdf", FileType::Pdf).unwrap_err();
        assert!(matches!(err, ExtractError::Pdf(_)));
    }

    #[test]
    fn invalid_zip_returns_error_for_docx() {
        let err = extract_bytes(b"not a zip", FileType::Docx).unwrap_err();
        assert!(matches!(err, ExtractError::Docx(_)));
    }

    #[test]
    fn paragraphs_are_separated() {
        let xml = br#"<w:document xmlns:w="x"><w:body><w:p><w:r><w:t>Contrato</w:t></w:r><w:r><w:t> n 1</w:t></w:r></w:p><w:p><w:r><w:t>Anexo</w:t></w:r></w:p></w:body></w:document>"#;
        let text = extract_paragraph_text(xml).unwrap();
        assert_eq!(text, "Contrato n 1\nAnexo\n");
    }

    #[test]
    fn validate_rejects_unknown_and_oversized() {
        assert!(matches!(
            validate_file(Path::new("a.xlsx"), 10, 100),
            Err(ExtractError::UnsupportedFileType(_))
        ));
        assert!(matches!(
            validate_file(Path::new("a.pdf"), 1000, 100),
            Err(ExtractError::TooLarge { .. })
        ));
        assert_eq!(
            validate_file(Path::new("A.DOCX"), 10, 100).unwrap(),
            FileType::Docx
        );
    }
}
