use std::fmt;
use std::str::FromStr;

use super::SourceError;

const LOWER: &str = "abcdefghijklmnopqrstuvwxyz";
const UPPER: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &str = "0123456789";
const SPECIAL: &str = "!@#$%^&*()_+-=[]{}|;':\",./<>?";

/// Ordered set of characters used by the enumerating sources.
///
/// Order matters: the incremental source enumerates in charset order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Charset {
    chars: Vec<char>,
}

impl Charset {
    /// Custom charset; duplicate characters are dropped, keeping the first occurrence.
    pub fn new(chars: &str) -> Result<Self, SourceError> {
        let mut unique: Vec<char> = Vec::with_capacity(chars.len());
        for c in chars.chars() {
            if !unique.contains(&c) {
                unique.push(c);
            }
        }
        if unique.is_empty() {
            return Err(SourceError::InvalidConfig("charset is empty".to_string()));
        }
        Ok(Self { chars: unique })
    }

    fn preset(chars: String) -> Self {
        Self {
            chars: chars.chars().collect(),
        }
    }

    pub fn lower() -> Self {
        Self::preset(LOWER.to_string())
    }

    pub fn upper() -> Self {
        Self::preset(UPPER.to_string())
    }

    pub fn digits() -> Self {
        Self::preset(DIGITS.to_string())
    }

    pub fn special() -> Self {
        Self::preset(SPECIAL.to_string())
    }

    pub fn alpha() -> Self {
        Self::preset(format!("{LOWER}{UPPER}"))
    }

    pub fn alnum() -> Self {
        Self::preset(format!("{LOWER}{UPPER}{DIGITS}"))
    }

    pub fn all() -> Self {
        Self::preset(format!("{LOWER}{UPPER}{DIGITS}{SPECIAL}"))
    }

    /// Preset by name (`lower`, `upper`, `digits`, `special`, `alpha`, `alnum`, `all`, plus the
    /// aliases `numbers`, `alphanumeric` and `full`).
    pub fn named(name: &str) -> Option<Self> {
        Some(match name.to_ascii_lowercase().as_str() {
            "lower" => Self::lower(),
            "upper" => Self::upper(),
            "digits" | "numbers" => Self::digits(),
            "special" => Self::special(),
            "alpha" => Self::alpha(),
            "alnum" | "alphanumeric" => Self::alnum(),
            "all" | "full" => Self::all(),
            _ => return None,
        })
    }

    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }
}

impl Default for Charset {
    fn default() -> Self {
        Self::alnum()
    }
}

/// A preset name, or otherwise the literal characters to use.
impl FromStr for Charset {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Self::named(s) {
            Some(preset) => Ok(preset),
            None => Self::new(s),
        }
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in &self.chars {
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_have_expected_sizes() {
        assert_eq!(Charset::lower().len(), 26);
        assert_eq!(Charset::digits().len(), 10);
        assert_eq!(Charset::alpha().len(), 52);
        assert_eq!(Charset::alnum().len(), 62);
        assert_eq!(Charset::all().len(), 62 + SPECIAL.chars().count());
        assert_eq!(Charset::default(), Charset::alnum());
    }

    #[test]
    fn names_and_aliases_resolve() {
        assert_eq!("numbers".parse::<Charset>().unwrap(), Charset::digits());
        assert_eq!("ALPHANUMERIC".parse::<Charset>().unwrap(), Charset::alnum());
        assert_eq!("full".parse::<Charset>().unwrap(), Charset::all());
    }

    #[test]
    fn custom_charset_keeps_order_and_drops_duplicates() {
        let charset: Charset = "cabba".parse().unwrap();
        assert_eq!(charset.chars(), &['c', 'a', 'b']);
        assert_eq!(charset.to_string(), "cab");
        assert!(matches!(Charset::new(""), Err(SourceError::InvalidConfig(_))));
    }
}
