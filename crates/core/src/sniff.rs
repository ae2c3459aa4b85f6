//! Content-type sniffing for uploaded payloads.
//!
//! Follows the WHATWG MIME sniffing rules for the families a pastebin sees in
//! practice (markup, documents, images, fonts, archives, audio/video containers),
//! and returns the same MIME strings browsers expect. Only the first
//! [`SNIFF_LEN`] bytes are consulted.

/// Maximum number of leading bytes inspected.
pub const SNIFF_LEN: usize = 512;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const OCTET_STREAM: &str = "application/octet-stream";

/// Tags that mark a document as HTML when they open it (case-insensitive,
/// followed by a space or `>`).
const HTML_TAGS: &[&[u8]] = &[
    b"<!DOCTYPE HTML",
    b"<HTML",
    b"<HEAD",
    b"<SCRIPT",
    b"<IFRAME",
    b"<H1",
    b"<DIV",
    b"<FONT",
    b"<TABLE",
    b"<A",
    b"<STYLE",
    b"<TITLE",
    b"<B",
    b"<BODY",
    b"<BR",
    b"<P",
    b"<!--",
];

/// One entry of the signature table.
enum Signature {
    /// Byte-for-byte prefix.
    Exact(&'static [u8]),
    /// `data[i] & mask[i] == pat[i]` for every byte of the mask; shorter
    /// input never matches.
    Masked {
        mask: &'static [u8],
        pat: &'static [u8],
    },
    /// ISO base media file with an `mp4` brand.
    Mp4,
}

impl Signature {
    fn matches(&self, data: &[u8]) -> bool {
        match self {
            Self::Exact(prefix) => data.starts_with(prefix),
            Self::Masked { mask, pat } => {
                data.len() >= mask.len()
                    && data.iter().zip(mask.iter()).zip(pat.iter()).all(|((d, m), p)| d & m == *p)
            }
            Self::Mp4 => is_mp4(data),
        }
    }
}

const BOM_MASK: &[u8] = b"\xFF\xFF\x00\x00";
const RIFF_MASK: &[u8] = b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF";
const WEBP_MASK: &[u8] = b"\xFF\xFF\xFF\xFF\x00\x00\x00\x00\xFF\xFF\xFF\xFF\xFF\xFF";

/// Embedded OpenType: 34 bytes of header, then `LP`.
const EOT_MASK: [u8; 36] = {
    let mut mask = [0; 36];
    mask[34] = 0xFF;
    mask[35] = 0xFF;
    mask
};
const EOT_PAT: [u8; 36] = {
    let mut pat = [0; 36];
    pat[34] = b'L';
    pat[35] = b'P';
    pat
};

/// Binary signatures in precedence order; the first match wins.
const SIGNATURES: &[(Signature, &str)] = &[
    (Signature::Exact(b"%PDF-"), "application/pdf"),
    (Signature::Exact(b"%!PS-Adobe-"), "application/postscript"),
    (
        Signature::Masked { mask: BOM_MASK, pat: b"\xFE\xFF\x00\x00" },
        "text/plain; charset=utf-16be",
    ),
    (
        Signature::Masked { mask: BOM_MASK, pat: b"\xFF\xFE\x00\x00" },
        "text/plain; charset=utf-16le",
    ),
    (
        Signature::Masked { mask: b"\xFF\xFF\xFF\x00", pat: b"\xEF\xBB\xBF\x00" },
        TEXT_PLAIN,
    ),
    (Signature::Exact(b"\x00\x00\x01\x00"), "image/x-icon"),
    (Signature::Exact(b"\x00\x00\x02\x00"), "image/x-icon"),
    (Signature::Exact(b"BM"), "image/bmp"),
    (Signature::Exact(b"GIF87a"), "image/gif"),
    (Signature::Exact(b"GIF89a"), "image/gif"),
    (
        Signature::Masked { mask: WEBP_MASK, pat: b"RIFF\x00\x00\x00\x00WEBPVP" },
        "image/webp",
    ),
    (Signature::Exact(b"\x89PNG\x0D\x0A\x1A\x0A"), "image/png"),
    (Signature::Exact(b"\xFF\xD8\xFF"), "image/jpeg"),
    (
        Signature::Masked { mask: RIFF_MASK, pat: b"FORM\x00\x00\x00\x00AIFF" },
        "audio/aiff",
    ),
    (Signature::Exact(b"ID3"), "audio/mpeg"),
    (Signature::Exact(b"OggS\x00"), "application/ogg"),
    (Signature::Exact(b"MThd\x00\x00\x00\x06"), "audio/midi"),
    (
        Signature::Masked { mask: RIFF_MASK, pat: b"RIFF\x00\x00\x00\x00AVI " },
        "video/avi",
    ),
    (
        Signature::Masked { mask: RIFF_MASK, pat: b"RIFF\x00\x00\x00\x00WAVE" },
        "audio/wave",
    ),
    (Signature::Mp4, "video/mp4"),
    (Signature::Exact(b"\x1A\x45\xDF\xA3"), "video/webm"),
    (
        Signature::Masked { mask: &EOT_MASK, pat: &EOT_PAT },
        "application/vnd.ms-fontobject",
    ),
    (Signature::Exact(b"\x00\x01\x00\x00"), "font/ttf"),
    (Signature::Exact(b"OTTO"), "font/otf"),
    (Signature::Exact(b"ttcf"), "font/collection"),
    (Signature::Exact(b"wOFF"), "font/woff"),
    (Signature::Exact(b"wOF2"), "font/woff2"),
    (Signature::Exact(b"\x1F\x8B\x08"), "application/x-gzip"),
    (Signature::Exact(b"PK\x03\x04"), "application/zip"),
    (Signature::Exact(b"Rar!\x1A\x07\x00"), "application/x-rar-compressed"),
    (Signature::Exact(b"Rar!\x1A\x07\x01\x00"), "application/x-rar-compressed"),
    (Signature::Exact(b"\x00\x61\x73\x6D"), "application/wasm"),
];

/// Classify `data` and return its MIME type.
///
/// Empty input is treated as text, and anything that matches no signature is
/// text when it contains no binary control bytes and
/// `application/octet-stream` otherwise.
pub fn detect_content_type(data: &[u8]) -> &'static str {
    let data = &data[..data.len().min(SNIFF_LEN)];
    let first_non_ws = data
        .iter()
        .position(|b| !is_whitespace(*b))
        .unwrap_or(data.len());
    let trimmed = &data[first_non_ws..];

    if HTML_TAGS.iter().any(|tag| matches_html_tag(trimmed, tag)) {
        return "text/html; charset=utf-8";
    }
    if trimmed.starts_with(b"<?xml") {
        return "text/xml; charset=utf-8";
    }
    if let Some((_, ct)) = SIGNATURES.iter().find(|(sig, _)| sig.matches(data)) {
        return *ct;
    }
    if trimmed.iter().any(|b| is_binary(*b)) {
        OCTET_STREAM
    } else {
        TEXT_PLAIN
    }
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b'\t' | b'\n' | 0x0C | b'\r' | b' ')
}

fn is_binary(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}

fn matches_html_tag(data: &[u8], tag: &[u8]) -> bool {
    if data.len() < tag.len() + 1 {
        return false;
    }
    let head_matches = data
        .iter()
        .zip(tag)
        .all(|(d, t)| d.to_ascii_uppercase() == *t);
    head_matches && matches!(data[tag.len()], b' ' | b'>')
}

/// ISO base media files: a big-endian box size, then `ftyp` and a brand list
/// containing `mp4`.
fn is_mp4(data: &[u8]) -> bool {
    if data.len() < 12 {
        return false;
    }
    let box_size = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if data.len() < box_size || box_size % 4 != 0 || &data[4..8] != b"ftyp" {
        return false;
    }
    (8..box_size)
        .step_by(4)
        .filter(|&st| st != 12)
        .any(|st| data.get(st..st + 3) == Some(&b"mp4"[..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_is_text() {
        assert_eq!(detect_content_type(b""), TEXT_PLAIN);
    }

    #[test]
    fn plain_text() {
        assert_eq!(detect_content_type(b"fn main() {}\n"), TEXT_PLAIN);
    }

    #[test]
    fn html_after_leading_whitespace() {
        assert_eq!(
            detect_content_type(b"\n\n  <html><body>hi</body></html>"),
            "text/html; charset=utf-8"
        );
        assert_eq!(
            detect_content_type(b"<!doctype html>"),
            "text/html; charset=utf-8"
        );
    }

    #[test]
    fn html_tag_needs_terminator() {
        // `<Ab` is not the `<A` tag.
        assert_eq!(detect_content_type(b"<Abc"), TEXT_PLAIN);
    }

    #[test]
    fn xml_declaration() {
        assert_eq!(
            detect_content_type(b"<?xml version=\"1.0\"?><a/>"),
            "text/xml; charset=utf-8"
        );
    }

    #[test]
    fn binary_signatures() {
        assert_eq!(
            detect_content_type(b"\x89PNG\x0D\x0A\x1A\x0A\x00\x00"),
            "image/png"
        );
        assert_eq!(detect_content_type(b"GIF89a...."), "image/gif");
        assert_eq!(detect_content_type(b"\x1F\x8B\x08\x00"), "application/x-gzip");
        assert_eq!(detect_content_type(b"PK\x03\x04rest"), "application/zip");
        assert_eq!(detect_content_type(b"%PDF-1.4"), "application/pdf");
    }

    #[test]
    fn riff_containers() {
        assert_eq!(
            detect_content_type(b"RIFF\x00\x00\x00\x00WAVEfmt "),
            "audio/wave"
        );
        assert_eq!(
            detect_content_type(b"RIFF\x00\x00\x00\x00WEBPVP8 "),
            "image/webp"
        );
    }

    #[test]
    fn mp4_brand() {
        let mut data = vec![0, 0, 0, 0x18];
        data.extend_from_slice(b"ftypisom\x00\x00\x02\x00isomiso2mp41");
        assert_eq!(detect_content_type(&data), "video/mp4");
    }

    #[test]
    fn font_signatures() {
        assert_eq!(detect_content_type(b"wOFF\x00\x01\x00\x00"), "font/woff");
        assert_eq!(detect_content_type(b"wOF2\x00\x01\x00\x00"), "font/woff2");
        assert_eq!(detect_content_type(b"\x00\x01\x00\x00\x00\x0E"), "font/ttf");
        assert_eq!(detect_content_type(b"OTTO\x00\x0B"), "font/otf");
        assert_eq!(detect_content_type(b"ttcf\x00\x01"), "font/collection");
    }

    #[test]
    fn embedded_opentype_checks_offset_34() {
        let mut data = vec![0x01; 34];
        data.extend_from_slice(b"LP\x00\x00");
        assert_eq!(detect_content_type(&data), "application/vnd.ms-fontobject");

        // One byte short of the magic.
        assert_eq!(detect_content_type(&data[..35]), OCTET_STREAM);
    }

    #[test]
    fn byte_order_marks_need_four_bytes() {
        assert_eq!(
            detect_content_type(b"\xFE\xFF\x00h"),
            "text/plain; charset=utf-16be"
        );
        assert_eq!(
            detect_content_type(b"\xFF\xFEh\x00"),
            "text/plain; charset=utf-16le"
        );
        assert_eq!(detect_content_type(b"\xFE\xFF"), TEXT_PLAIN);
        assert_eq!(detect_content_type(b"\xFF\xFE"), TEXT_PLAIN);
        assert_eq!(detect_content_type(b"\xEF\xBB\xBFhi"), TEXT_PLAIN);
    }

    #[test]
    fn riff_form_type_is_masked() {
        assert_eq!(
            detect_content_type(b"RIFF\xAA\xBB\xCC\xDDAVI LIST"),
            "video/avi"
        );
        assert_eq!(detect_content_type(b"FORM\x00\x00\x00\x00AIFF"), "audio/aiff");
    }

    #[test]
    fn unknown_binary_is_octet_stream() {
        assert_eq!(detect_content_type(b"\x01\x02\x03\x04"), OCTET_STREAM);
    }

    #[test]
    fn only_first_512_bytes_count() {
        let mut data = vec![b'a'; SNIFF_LEN];
        data.push(0x00);
        assert_eq!(detect_content_type(&data), TEXT_PLAIN);
    }
}
