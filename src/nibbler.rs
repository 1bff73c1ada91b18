//! Incremental string parser
//!
//! A forward-only cursor over a string with a save/restore pair for
//! backtracking. Every operation either consumes input and succeeds, or
//! leaves the cursor exactly where it was and fails. Nothing here
//! returns an error; callers try alternatives on failure.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;

/// Forward-only incremental parser with backtracking support.
#[derive(Debug, Clone)]
pub struct Nibbler<'a> {
    input: &'a str,
    cursor: usize,
    saved: usize,
}

impl<'a> Nibbler<'a> {
    /// Create a parser positioned at the start of `input`.
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            cursor: 0,
            saved: 0,
        }
    }

    fn remainder(&self) -> &'a str {
        &self.input[self.cursor..]
    }

    /// Current cursor position, in bytes.
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// True when the entire input has been consumed.
    pub fn depleted(&self) -> bool {
        self.cursor >= self.input.len()
    }

    /// Record the current position for a later `restore`.
    pub fn save(&mut self) {
        self.saved = self.cursor;
    }

    /// Rewind to the last `save`d position.
    pub fn restore(&mut self) {
        self.cursor = self.saved;
    }

    /// Consume a single specific character.
    pub fn skip(&mut self, c: char) -> bool {
        if self.remainder().starts_with(c) {
            self.cursor += c.len_utf8();
            return true;
        }
        false
    }

    /// Consume `n` bytes unconditionally, if that many remain.
    pub fn skip_n(&mut self, n: usize) -> bool {
        if self.cursor + n <= self.input.len() && self.input.is_char_boundary(self.cursor + n) {
            self.cursor += n;
            return true;
        }
        false
    }

    /// Consume a run of whitespace. Fails if none is present.
    pub fn skip_ws(&mut self) -> bool {
        let trimmed = self.remainder().trim_start();
        let skipped = self.remainder().len() - trimmed.len();
        if skipped > 0 {
            self.cursor += skipped;
            return true;
        }
        false
    }

    /// Consume any one character.
    pub fn get_any_char(&mut self) -> Option<char> {
        let c = self.remainder().chars().next()?;
        self.cursor += c.len_utf8();
        Some(c)
    }

    /// Consume an exact literal.
    pub fn get_literal(&mut self, literal: &str) -> bool {
        if self.remainder().starts_with(literal) {
            self.cursor += literal.len();
            return true;
        }
        false
    }

    /// Consume everything up to (not including) the delimiter, or the
    /// rest of the input if the delimiter never appears. Fails only when
    /// already depleted.
    pub fn get_until(&mut self, delimiter: char) -> Option<String> {
        if self.depleted() {
            return None;
        }
        let rest = self.remainder();
        let end = rest.find(delimiter).unwrap_or(rest.len());
        let result = rest[..end].to_string();
        self.cursor += end;
        Some(result)
    }

    /// Consume everything up to the first character contained in `set`,
    /// or the rest of the input.
    pub fn get_until_one_of(&mut self, set: &str) -> Option<String> {
        if self.depleted() {
            return None;
        }
        let rest = self.remainder();
        let end = rest.find(|c| set.contains(c)).unwrap_or(rest.len());
        let result = rest[..end].to_string();
        self.cursor += end;
        Some(result)
    }

    /// Consume everything up to the next whitespace, or the rest of the
    /// input. Fails when the cursor sits on whitespace or the end.
    pub fn get_word(&mut self) -> Option<String> {
        let rest = self.remainder();
        let end = rest
            .find(char::is_whitespace)
            .unwrap_or(rest.len());
        if end == 0 {
            return None;
        }
        let result = rest[..end].to_string();
        self.cursor += end;
        Some(result)
    }

    /// Consume a quote-delimited string. With `decode`, backslash
    /// escapes of the quote character are unescaped in the result; the
    /// closing quote must still be unescaped.
    pub fn get_quoted(&mut self, quote: char, decode: bool) -> Option<String> {
        let start = self.cursor;
        if !self.skip(quote) {
            return None;
        }

        let mut result = String::new();
        let mut escaped = false;
        for c in self.input[self.cursor..].chars() {
            if escaped {
                if c != quote && c != '\\' {
                    result.push('\\');
                }
                result.push(c);
                self.cursor += c.len_utf8();
                escaped = false;
            } else if decode && c == '\\' {
                self.cursor += c.len_utf8();
                escaped = true;
            } else if c == quote {
                self.cursor += c.len_utf8();
                return Some(result);
            } else {
                result.push(c);
                self.cursor += c.len_utf8();
            }
        }

        // No closing quote.
        self.cursor = start;
        None
    }

    /// Consume a signed decimal integer.
    pub fn get_int(&mut self) -> Option<i64> {
        let rest = self.remainder();
        let mut len = 0;
        let bytes = rest.as_bytes();
        if len < bytes.len() && (bytes[len] == b'-' || bytes[len] == b'+') {
            len += 1;
        }
        let digits_start = len;
        while len < bytes.len() && bytes[len].is_ascii_digit() {
            len += 1;
        }
        if len == digits_start {
            return None;
        }
        let value = rest[..len].parse().ok()?;
        self.cursor += len;
        Some(value)
    }

    /// Consume an unsigned decimal integer.
    pub fn get_uint(&mut self) -> Option<u64> {
        let rest = self.remainder();
        let len = rest.bytes().take_while(|b| b.is_ascii_digit()).count();
        if len == 0 {
            return None;
        }
        let value = rest[..len].parse().ok()?;
        self.cursor += len;
        Some(value)
    }

    /// Consume an unsigned hexadecimal integer.
    pub fn get_hex(&mut self) -> Option<u64> {
        let rest = self.remainder();
        let len = rest.bytes().take_while(|b| b.is_ascii_hexdigit()).count();
        if len == 0 {
            return None;
        }
        let value = u64::from_str_radix(&rest[..len], 16).ok()?;
        self.cursor += len;
        Some(value)
    }

    /// Consume a decimal number, with optional sign and fraction.
    pub fn get_number(&mut self) -> Option<f64> {
        let rest = self.remainder();
        let bytes = rest.as_bytes();
        let mut len = 0;
        if len < bytes.len() && (bytes[len] == b'-' || bytes[len] == b'+') {
            len += 1;
        }
        let int_start = len;
        while len < bytes.len() && bytes[len].is_ascii_digit() {
            len += 1;
        }
        if len == int_start {
            return None;
        }
        if len < bytes.len() && bytes[len] == b'.' {
            let frac_start = len + 1;
            let mut frac_end = frac_start;
            while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
                frac_end += 1;
            }
            if frac_end > frac_start {
                len = frac_end;
            }
        }
        let value = rest[..len].parse().ok()?;
        self.cursor += len;
        Some(value)
    }

    /// Consume a canonical 36-character UUID.
    pub fn get_uuid(&mut self) -> Option<String> {
        let rest = self.remainder();
        if rest.len() < 36 {
            return None;
        }
        let candidate = &rest[..36];
        let bytes = candidate.as_bytes();
        for (i, b) in bytes.iter().enumerate() {
            match i {
                8 | 13 | 18 | 23 => {
                    if *b != b'-' {
                        return None;
                    }
                }
                _ => {
                    if !b.is_ascii_hexdigit() {
                        return None;
                    }
                }
            }
        }
        self.cursor += 36;
        Some(candidate.to_string())
    }

    /// Consume an ISO-8601 date (`YYYY-MM-DD`, optionally
    /// `THH:MM:SS` with an optional trailing `Z`).
    pub fn get_date_iso(&mut self) -> Option<DateTime<Utc>> {
        let start = self.cursor;

        let year = self.get_fixed_digits(4)?;
        if !self.skip('-') {
            self.cursor = start;
            return None;
        }
        let month = match self.get_fixed_digits(2) {
            Some(m) if (1..=12).contains(&m) && self.skip('-') => m,
            _ => {
                self.cursor = start;
                return None;
            }
        };
        let day = match self.get_fixed_digits(2) {
            Some(d) if (1..=31).contains(&d) => d,
            _ => {
                self.cursor = start;
                return None;
            }
        };

        let date = match NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32) {
            Some(d) => d,
            None => {
                self.cursor = start;
                return None;
            }
        };

        let mut datetime: NaiveDateTime = match date.and_hms_opt(0, 0, 0) {
            Some(dt) => dt,
            None => {
                self.cursor = start;
                return None;
            }
        };

        let time_mark = self.cursor;
        if self.skip('T') {
            let h = self.get_fixed_digits(2);
            let m = if self.skip(':') {
                self.get_fixed_digits(2)
            } else {
                None
            };
            let s = if self.skip(':') {
                self.get_fixed_digits(2)
            } else {
                None
            };
            match (h, m, s) {
                (Some(h), Some(m), Some(s)) if h < 24 && m < 60 && s < 60 => {
                    datetime = match date.and_hms_opt(h as u32, m as u32, s as u32) {
                        Some(dt) => dt,
                        None => {
                            self.cursor = start;
                            return None;
                        }
                    };
                    self.skip('Z');
                }
                _ => {
                    self.cursor = time_mark;
                }
            }
        }

        Some(Utc.from_utc_datetime(&datetime))
    }

    fn get_fixed_digits(&mut self, n: usize) -> Option<u64> {
        let rest = self.remainder();
        if rest.len() < n || !rest.as_bytes()[..n].iter().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let value = rest[..n].parse().ok()?;
        self.cursor += n;
        Some(value)
    }

    /// Consume text matching a regex anchored at the cursor.
    pub fn get_regex(&mut self, pattern: &Regex) -> Option<String> {
        let m = pattern.find(self.remainder())?;
        if m.start() != 0 {
            return None;
        }
        let result = m.as_str().to_string();
        self.cursor += m.end();
        Some(result)
    }

    /// Consume and return everything remaining.
    pub fn get_rest(&mut self) -> Option<String> {
        if self.depleted() {
            return None;
        }
        let result = self.remainder().to_string();
        self.cursor = self.input.len();
        Some(result)
    }
}
