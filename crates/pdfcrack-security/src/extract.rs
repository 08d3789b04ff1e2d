//! Text-level extraction of Standard security handler parameters.
//!
//! This is not a general PDF parser. The `/Encrypt` dictionary and the trailer `/ID` are located
//! with byte regexes, and only enough object syntax is read (names, numbers, strings, nested
//! dictionaries and arrays) to pull out the fields the verifier needs.

use std::sync::OnceLock;

use regex::bytes::Regex;

use crate::error::SecurityError;
use crate::params::{Cipher, EncryptionParameters};

const PDF_MAGIC: &[u8] = b"%PDF-";

fn header_version_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?-u)\A%PDF-(\d+\.\d+)").expect("valid regex"))
}

fn encrypt_reference_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?-u)/Encrypt\s*(\d+)\s+(\d+)\s+R\b").expect("valid regex"))
}

fn encrypt_inline_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?-u)/Encrypt\s*<<").expect("valid regex"))
}

fn file_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?-u)/ID\s*\[").expect("valid regex"))
}

/// Extract the Standard security handler parameters from a PDF byte buffer.
///
/// Errors distinguish a document that is not encrypted ([`SecurityError::NotEncrypted`]), one
/// that is damaged or not a PDF ([`SecurityError::InvalidDocument`]), and one protected by a
/// handler other than `/Standard` ([`SecurityError::UnsupportedScheme`]).
pub fn extract_encryption_parameters(data: &[u8]) -> Result<EncryptionParameters, SecurityError> {
    if !data.starts_with(PDF_MAGIC) {
        return Err(SecurityError::InvalidDocument(
            "missing %PDF- header".to_string(),
        ));
    }

    let pdf_version = header_version_re()
        .captures(data)
        .and_then(|caps| caps.get(1))
        .map(|m| String::from_utf8_lossy(m.as_bytes()).into_owned());

    let body = find_encrypt_dictionary(data)?;
    let dict = Dictionary::parse(body);

    if let Some(filter) = dict.name(b"Filter") {
        if filter != b"Standard" {
            return Err(SecurityError::UnsupportedScheme(format!(
                "security handler /{}",
                String::from_utf8_lossy(filter)
            )));
        }
    }

    let version = dict.unsigned(b"V").filter(|&v| v > 0).unwrap_or(1);
    let revision = dict.unsigned(b"R").filter(|&r| r > 0).unwrap_or(2);
    // Writers emit `/P` both as a signed value and as its unsigned 32-bit reinterpretation.
    let permissions = dict.integer(b"P").map(|p| p as u32 as i32).unwrap_or(0);

    let owner_verifier = dict.string(b"O").ok_or_else(|| {
        SecurityError::InvalidDocument("encryption dictionary has no /O string".to_string())
    })?;
    let user_verifier = dict.string(b"U").ok_or_else(|| {
        SecurityError::InvalidDocument("encryption dictionary has no /U string".to_string())
    })?;
    let encrypt_metadata = dict.boolean(b"EncryptMetadata").unwrap_or(true);

    let stream_filter = stream_crypt_filter(&dict, version);
    let cipher = match &stream_filter {
        Some(filter) if declares_aes(filter) => Cipher::Aes,
        _ => Cipher::Rc4,
    };
    let key_length_bits = key_length_bits(&dict, version, stream_filter.as_ref());
    let file_identifier = find_file_identifier(data).unwrap_or_default();

    log::debug!(
        "encryption dictionary: V{version} R{revision} {key_length_bits}-bit {cipher}, \
         |O|={} |U|={} |ID|={}",
        owner_verifier.len(),
        user_verifier.len(),
        file_identifier.len()
    );

    Ok(EncryptionParameters {
        version,
        revision,
        key_length_bits,
        permissions,
        owner_verifier,
        user_verifier,
        file_identifier,
        encrypt_metadata,
        cipher,
        pdf_version,
    })
}

fn find_encrypt_dictionary(data: &[u8]) -> Result<&[u8], SecurityError> {
    // The last trailer wins when a file carries incremental updates.
    if let Some(caps) = encrypt_reference_re().captures_iter(data).last() {
        let object = parse_u32(&caps[1]);
        let generation = parse_u32(&caps[2]);
        let (Some(object), Some(generation)) = (object, generation) else {
            return Err(SecurityError::InvalidDocument(
                "malformed /Encrypt reference".to_string(),
            ));
        };
        return find_indirect_dictionary(data, object, generation).ok_or_else(|| {
            SecurityError::InvalidDocument(format!(
                "encryption dictionary object {object} {generation} not found"
            ))
        });
    }

    if let Some(m) = encrypt_inline_re().find_iter(data).last() {
        return Cursor::new(data, m.end())
            .read_nested(Nesting::Dictionary)
            .ok_or_else(|| {
                SecurityError::InvalidDocument("unterminated /Encrypt dictionary".to_string())
            });
    }

    Err(SecurityError::NotEncrypted)
}

fn find_indirect_dictionary(data: &[u8], object: u32, generation: u32) -> Option<&[u8]> {
    let pattern = format!(r"(?-u)(?:\A|[^0-9]){object}\s+{generation}\s+obj\s*<<");
    let re = Regex::new(&pattern).ok()?;
    let m = re.find_iter(data).last()?;
    Cursor::new(data, m.end()).read_nested(Nesting::Dictionary)
}

fn find_file_identifier(data: &[u8]) -> Option<Vec<u8>> {
    let m = file_id_re().find_iter(data).last()?;
    match Cursor::new(data, m.end()).read_object()? {
        Object::String(bytes) => Some(bytes),
        _ => None,
    }
}

/// The crypt filter that governs streams: the one named by `/StmF`, else the first AES filter
/// in `/CF`, else the first filter.
fn stream_crypt_filter<'a>(dict: &Dictionary<'a>, version: u32) -> Option<Dictionary<'a>> {
    if version < 4 {
        return None;
    }
    let filters = dict.dictionary(b"CF")?;
    if let Some(named) = dict.name(b"StmF").and_then(|name| filters.dictionary(name)) {
        return Some(named);
    }
    let mut candidates = filters.entries.iter().filter_map(|(_, value)| match value {
        Object::Dictionary(body) => Some(Dictionary::parse(*body)),
        _ => None,
    });
    let first = candidates.next()?;
    if declares_aes(&first) {
        return Some(first);
    }
    Some(candidates.find(declares_aes).unwrap_or(first))
}

fn declares_aes(filter: &Dictionary<'_>) -> bool {
    matches!(filter.name(b"CFM"), Some(b"AESV2" | b"AESV3"))
}

fn key_length_bits(dict: &Dictionary<'_>, version: u32, filter: Option<&Dictionary<'_>>) -> u32 {
    if let Some(length) = dict.integer(b"Length") {
        return normalize_key_length(length);
    }
    match version {
        v if v >= 4 => filter
            .and_then(|f| f.integer(b"Length"))
            .map(normalize_key_length)
            .unwrap_or(128),
        v if v >= 2 => 128,
        _ => 40,
    }
}

/// `/Length` is specified in bits, but crypt filters (and some writers) use bytes.
fn normalize_key_length(length: i64) -> u32 {
    match length {
        40..=256 => length as u32,
        1..=32 => length as u32 * 8,
        _ => 128,
    }
}

fn parse_u32(token: &[u8]) -> Option<u32> {
    std::str::from_utf8(token).ok()?.parse().ok()
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b'\0' | b'\t' | b'\n' | b'\x0c' | b'\r' | b' ')
}

fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Object<'a> {
    Name(&'a [u8]),
    Number(&'a [u8]),
    Boolean(bool),
    String(Vec<u8>),
    /// Body between `<<` and `>>`.
    Dictionary(&'a [u8]),
    /// Body between `[` and `]`.
    Array(&'a [u8]),
    Reference(u32, u32),
    Keyword(&'a [u8]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Nesting {
    Dictionary,
    Array,
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8], pos: usize) -> Self {
        Self { bytes, pos }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek() {
            if is_whitespace(b) {
                self.pos += 1;
            } else if b == b'%' {
                while let Some(c) = self.peek() {
                    if c == b'\n' || c == b'\r' {
                        break;
                    }
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    fn read_token(&mut self) -> &'a [u8] {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if is_whitespace(b) || is_delimiter(b) {
                break;
            }
            self.pos += 1;
        }
        &self.bytes[start..self.pos]
    }

    /// Read the next object; `None` only at end of input or on an unterminated construct.
    fn read_object(&mut self) -> Option<Object<'a>> {
        self.skip_whitespace();
        match self.peek()? {
            b'/' => {
                self.pos += 1;
                Some(Object::Name(self.read_token()))
            }
            b'(' => {
                self.pos += 1;
                self.read_literal_string().map(Object::String)
            }
            b'<' if self.peek_at(1) == Some(b'<') => {
                self.pos += 2;
                self.read_nested(Nesting::Dictionary).map(Object::Dictionary)
            }
            b'<' => {
                self.pos += 1;
                self.read_hex_string().map(Object::String)
            }
            b'[' => {
                self.pos += 1;
                self.read_nested(Nesting::Array).map(Object::Array)
            }
            b')' | b'>' | b']' | b'{' | b'}' => {
                let stray = &self.bytes[self.pos..self.pos + 1];
                self.pos += 1;
                Some(Object::Keyword(stray))
            }
            _ => {
                let token = self.read_token();
                Some(match token {
                    b"true" => Object::Boolean(true),
                    b"false" => Object::Boolean(false),
                    _ if is_number(token) => self.number_or_reference(token),
                    _ => Object::Keyword(token),
                })
            }
        }
    }

    fn number_or_reference(&mut self, token: &'a [u8]) -> Object<'a> {
        let Some(object) = parse_u32(token) else {
            return Object::Number(token);
        };
        let save = self.pos;
        self.skip_whitespace();
        if let Some(generation) = parse_u32(self.read_token()) {
            self.skip_whitespace();
            if self.read_token() == b"R" {
                return Object::Reference(object, generation);
            }
        }
        self.pos = save;
        Object::Number(token)
    }

    /// Read a literal string body; the opening `(` has been consumed.
    fn read_literal_string(&mut self) -> Option<Vec<u8>> {
        let mut out = Vec::new();
        let mut depth = 0usize;
        loop {
            let b = self.peek()?;
            self.pos += 1;
            match b {
                b'\\' => {
                    let escaped = self.peek()?;
                    self.pos += 1;
                    match escaped {
                        b'n' => out.push(b'\n'),
                        b'r' => out.push(b'\r'),
                        b't' => out.push(b'\t'),
                        b'b' => out.push(0x08),
                        b'f' => out.push(0x0c),
                        b'0'..=b'7' => {
                            let mut value = u32::from(escaped - b'0');
                            for _ in 0..2 {
                                match self.peek() {
                                    Some(d @ b'0'..=b'7') => {
                                        value = value * 8 + u32::from(d - b'0');
                                        self.pos += 1;
                                    }
                                    _ => break,
                                }
                            }
                            out.push(value as u8);
                        }
                        // Line continuation.
                        b'\r' => {
                            if self.peek() == Some(b'\n') {
                                self.pos += 1;
                            }
                        }
                        b'\n' => {}
                        other => out.push(other),
                    }
                }
                b'(' => {
                    depth += 1;
                    out.push(b);
                }
                b')' => {
                    if depth == 0 {
                        return Some(out);
                    }
                    depth -= 1;
                    out.push(b);
                }
                _ => out.push(b),
            }
        }
    }

    /// Read a hex string body; the opening `<` has been consumed.
    fn read_hex_string(&mut self) -> Option<Vec<u8>> {
        let mut out = Vec::new();
        let mut high: Option<u8> = None;
        loop {
            let b = self.peek()?;
            self.pos += 1;
            if b == b'>' {
                // An odd final digit is treated as if followed by 0.
                if let Some(h) = high {
                    out.push(h << 4);
                }
                return Some(out);
            }
            if is_whitespace(b) {
                continue;
            }
            let nibble = hex_value(b)?;
            match high.take() {
                Some(h) => out.push((h << 4) | nibble),
                None => high = Some(nibble),
            }
        }
    }

    /// Return the body of a dictionary or array whose opening delimiter has been consumed,
    /// honouring nested containers and skipping over string contents.
    fn read_nested(&mut self, outer: Nesting) -> Option<&'a [u8]> {
        let start = self.pos;
        let mut stack = vec![outer];
        loop {
            let b = self.peek()?;
            match b {
                b'(' => {
                    self.pos += 1;
                    self.read_literal_string()?;
                }
                b'%' => self.skip_whitespace(),
                b'<' if self.peek_at(1) == Some(b'<') => {
                    self.pos += 2;
                    stack.push(Nesting::Dictionary);
                }
                b'<' => {
                    self.pos += 1;
                    self.read_hex_string()?;
                }
                b'[' => {
                    self.pos += 1;
                    stack.push(Nesting::Array);
                }
                b'>' if self.peek_at(1) == Some(b'>') => {
                    let end = self.pos;
                    self.pos += 2;
                    if stack.pop()? != Nesting::Dictionary {
                        return None;
                    }
                    if stack.is_empty() {
                        return Some(&self.bytes[start..end]);
                    }
                }
                b']' => {
                    let end = self.pos;
                    self.pos += 1;
                    if stack.pop()? != Nesting::Array {
                        return None;
                    }
                    if stack.is_empty() {
                        return Some(&self.bytes[start..end]);
                    }
                }
                _ => self.pos += 1,
            }
        }
    }
}

fn is_number(token: &[u8]) -> bool {
    !token.is_empty()
        && token
            .iter()
            .all(|b| matches!(b, b'0'..=b'9' | b'+' | b'-' | b'.'))
}

/// Top-level entries of a dictionary body, in file order.
struct Dictionary<'a> {
    entries: Vec<(&'a [u8], Object<'a>)>,
}

impl<'a> Dictionary<'a> {
    fn parse(body: &'a [u8]) -> Self {
        let mut cursor = Cursor::new(body, 0);
        let mut entries = Vec::new();
        while let Some(object) = cursor.read_object() {
            let Object::Name(key) = object else {
                continue;
            };
            match cursor.read_object() {
                Some(value) => entries.push((key, value)),
                None => break,
            }
        }
        Self { entries }
    }

    fn get(&self, key: &[u8]) -> Option<&Object<'a>> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, value)| value)
    }

    fn integer(&self, key: &[u8]) -> Option<i64> {
        match self.get(key)? {
            Object::Number(token) => std::str::from_utf8(token).ok()?.parse().ok(),
            _ => None,
        }
    }

    fn unsigned(&self, key: &[u8]) -> Option<u32> {
        self.integer(key).and_then(|v| u32::try_from(v).ok())
    }

    fn name(&self, key: &[u8]) -> Option<&'a [u8]> {
        match self.get(key)? {
            Object::Name(name) => Some(*name),
            _ => None,
        }
    }

    fn string(&self, key: &[u8]) -> Option<Vec<u8>> {
        match self.get(key)? {
            Object::String(bytes) => Some(bytes.clone()),
            _ => None,
        }
    }

    fn boolean(&self, key: &[u8]) -> Option<bool> {
        match self.get(key)? {
            Object::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    fn dictionary(&self, key: &[u8]) -> Option<Dictionary<'a>> {
        match self.get(key)? {
            Object::Dictionary(body) => Some(Dictionary::parse(*body)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn read_one(input: &[u8]) -> Option<Object<'_>> {
        Cursor::new(input, 0).read_object()
    }

    #[test]
    fn literal_strings_decode_escapes_and_nesting() {
        assert_eq!(
            read_one(br"(a\(b\)c)"),
            Some(Object::String(b"a(b)c".to_vec()))
        );
        assert_eq!(
            read_one(b"(outer (inner) tail)"),
            Some(Object::String(b"outer (inner) tail".to_vec()))
        );
        assert_eq!(
            read_one(br"(\101\0537\n\\)"),
            Some(Object::String(vec![b'A', 0o053, b'7', b'\n', b'\\']))
        );
        assert_eq!(
            read_one(b"(split\\\r\nline)"),
            Some(Object::String(b"splitline".to_vec()))
        );
        assert_eq!(read_one(b"(unterminated"), None);
    }

    #[test]
    fn hex_strings_ignore_whitespace_and_pad_odd_digits() {
        assert_eq!(
            read_one(b"<48 65 6C\n6C 6F>"),
            Some(Object::String(b"Hello".to_vec()))
        );
        assert_eq!(
            read_one(b"<deadbeef>"),
            Some(Object::String(vec![0xde, 0xad, 0xbe, 0xef]))
        );
        assert_eq!(read_one(b"<ABC>"), Some(Object::String(vec![0xab, 0xc0])));
        assert_eq!(read_one(b"<zz>"), None);
    }

    #[test]
    fn numbers_and_references_are_distinguished() {
        let mut cursor = Cursor::new(b"12 0 R -3904 7 /Name", 0);
        assert_eq!(cursor.read_object(), Some(Object::Reference(12, 0)));
        assert_eq!(cursor.read_object(), Some(Object::Number(b"-3904")));
        assert_eq!(cursor.read_object(), Some(Object::Number(b"7")));
        assert_eq!(cursor.read_object(), Some(Object::Name(b"Name")));
        assert_eq!(cursor.read_object(), None);
    }

    #[test]
    fn dictionary_reads_top_level_entries_only() {
        let body: &[u8] = b" /Filter /Standard /V 4 /CF << /StdCF << /CFM /AESV2 /Length 16 >> >> \
              /StmF /StdCF /O (a>>b) /Length 128 % comment >>\n /EncryptMetadata false ";
        let dict = Dictionary::parse(body);
        assert_eq!(dict.name(b"Filter"), Some(&b"Standard"[..]));
        assert_eq!(dict.integer(b"V"), Some(4));
        assert_eq!(dict.integer(b"Length"), Some(128));
        assert_eq!(dict.string(b"O"), Some(b"a>>b".to_vec()));
        assert_eq!(dict.boolean(b"EncryptMetadata"), Some(false));

        let filter = stream_crypt_filter(&dict, 4).expect("stream filter");
        assert!(declares_aes(&filter));
        assert_eq!(filter.integer(b"Length"), Some(16));
    }

    #[test]
    fn nested_reader_skips_strings_containing_delimiters() {
        let input: &[u8] = b"/A (>>) /B <3E3E> /C [1 2 [3]] >> trailing";
        let body = Cursor::new(input, 0)
            .read_nested(Nesting::Dictionary)
            .expect("balanced body");
        assert_eq!(body, &b"/A (>>) /B <3E3E> /C [1 2 [3]] "[..]);
    }

    #[test]
    fn key_length_normalization() {
        assert_eq!(normalize_key_length(40), 40);
        assert_eq!(normalize_key_length(128), 128);
        assert_eq!(normalize_key_length(16), 128);
        assert_eq!(normalize_key_length(5), 40);
        assert_eq!(normalize_key_length(0), 128);
        assert_eq!(normalize_key_length(512), 128);
    }

    #[test]
    fn unsigned_permissions_are_reinterpreted_as_signed() {
        let pdf = b"%PDF-1.4\ntrailer << /Encrypt << /Filter /Standard /V 2 /R 3 \
            /P 4294963392 /O <00> /U <00> >> >>";
        let params = extract_encryption_parameters(pdf).expect("parameters");
        assert_eq!(params.permissions, -3904);
        assert!(params.file_identifier.is_empty());
    }
}
