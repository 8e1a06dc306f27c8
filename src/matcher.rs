//! Literal substring matching
use memchr::memmem::Finder;

/// Finds every start offset of a literal needle, overlapping matches included.
pub struct LiteralMatcher {
    finder: Finder<'static>,
    case_sensitive: bool,
}

impl LiteralMatcher {
    /// Byte matcher; case folding, when requested, is ASCII-only.
    pub fn bytes(needle: &[u8], case_sensitive: bool) -> Self {
        let needle = if case_sensitive {
            needle.to_vec()
        } else {
            needle.to_ascii_lowercase()
        };
        Self {
            finder: Finder::new(&needle).into_owned(),
            case_sensitive,
        }
    }

    /// Text matcher over strings folded with [`fold_case`].
    pub fn text(needle: &str, case_sensitive: bool) -> Self {
        let needle = if case_sensitive {
            needle.to_string()
        } else {
            fold_case(needle)
        };
        Self {
            finder: Finder::new(needle.as_bytes()).into_owned(),
            case_sensitive,
        }
    }

    pub fn needle_len(&self) -> usize {
        self.finder.needle().len()
    }

    /// Needle length in characters; non-UTF-8 needles count bytes.
    pub fn needle_len_chars(&self) -> usize {
        match std::str::from_utf8(self.finder.needle()) {
            Ok(s) => s.chars().count(),
            Err(_) => self.needle_len(),
        }
    }

    pub fn case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Offsets in an already folded haystack.
    pub fn find_all(&self, haystack: &[u8]) -> Vec<usize> {
        let mut matches = Vec::new();
        if self.needle_len() == 0 {
            return matches;
        }
        let mut start = 0;
        while start < haystack.len() {
            match self.finder.find(&haystack[start..]) {
                Some(pos) => {
                    matches.push(start + pos);
                    start += pos + 1;
                }
                None => break,
            }
        }
        matches
    }

    /// Byte offsets in raw content, applying ASCII folding when case-insensitive.
    pub fn find_in_bytes(&self, content: &[u8]) -> Vec<usize> {
        if self.case_sensitive {
            self.find_all(content)
        } else {
            self.find_all(&content.to_ascii_lowercase())
        }
    }

    /// Character offsets of matches within one line of text.
    pub fn find_in_line(&self, line: &str) -> Vec<usize> {
        let folded;
        let hay = if self.case_sensitive {
            line
        } else {
            folded = fold_case(line);
            folded.as_str()
        };
        byte_to_char_offsets(hay, &self.find_all(hay.as_bytes()))
    }
}

/// Simple per-character lower-casing that never changes the character count.
///
/// Characters whose lower-case form expands to several characters are kept
/// as they are, so offsets in the folded text index the original text.
pub fn fold_case(s: &str) -> String {
    s.chars().map(fold_char).collect()
}

fn fold_char(c: char) -> char {
    let mut lower = c.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(l), None) => l,
        _ => c,
    }
}

fn byte_to_char_offsets(s: &str, byte_offsets: &[usize]) -> Vec<usize> {
    let mut out = Vec::with_capacity(byte_offsets.len());
    let mut chars = 0;
    let mut last = 0;
    for &b in byte_offsets {
        chars += s[last..b].chars().count();
        last = b;
        out.push(chars);
    }
    out
}
