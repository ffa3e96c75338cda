//! Keyboard chord that toggles voice capture.
//!
//! Parsed from strings such as `"Alt+V"` or `"Ctrl+Shift+F9"`. The terminal
//! front end translates a parsed chord into a line-editor key binding.

use std::fmt;
use std::str::FromStr;

use cipherdesk_core::error::CipherError;

/// The non-modifier key of a chord.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChordKey {
    /// A printable character, stored lowercase.
    Char(char),
    /// A function key, F1 to F12.
    F(u8),
}

/// A modifier + key combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Chord {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub key: ChordKey,
}

impl Default for Chord {
    fn default() -> Self {
        Self {
            ctrl: false,
            alt: true,
            shift: false,
            key: ChordKey::Char('v'),
        }
    }
}

impl FromStr for Chord {
    type Err = CipherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |why: &str| CipherError::Config(format!("Invalid shortcut '{}': {}", s, why));

        let mut chord = Chord {
            ctrl: false,
            alt: false,
            shift: false,
            key: ChordKey::Char(' '),
        };
        let mut key = None;

        for part in s.split('+').map(str::trim) {
            match part.to_ascii_lowercase().as_str() {
                "" => return Err(invalid("empty component")),
                "ctrl" | "control" => chord.ctrl = true,
                "alt" | "option" | "meta" => chord.alt = true,
                "shift" => chord.shift = true,
                other => {
                    if key.is_some() {
                        return Err(invalid("more than one key"));
                    }
                    key = Some(parse_key(other).ok_or_else(|| invalid("unknown key"))?);
                }
            }
        }

        chord.key = key.ok_or_else(|| invalid("missing key"))?;
        if !chord.ctrl && !chord.alt && matches!(chord.key, ChordKey::Char(_)) {
            return Err(invalid("a character key needs Ctrl or Alt"));
        }
        Ok(chord)
    }
}

fn parse_key(token: &str) -> Option<ChordKey> {
    let mut chars = token.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphanumeric() => Some(ChordKey::Char(c)),
        (Some('f'), Some(_)) => token[1..]
            .parse::<u8>()
            .ok()
            .filter(|n| (1..=12).contains(n))
            .map(ChordKey::F),
        _ => None,
    }
}

impl fmt::Display for Chord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ctrl {
            write!(f, "Ctrl+")?;
        }
        if self.alt {
            write!(f, "Alt+")?;
        }
        if self.shift {
            write!(f, "Shift+")?;
        }
        match self.key {
            ChordKey::Char(c) => write!(f, "{}", c.to_ascii_uppercase()),
            ChordKey::F(n) => write!(f, "F{}", n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_chord() {
        let chord: Chord = "Alt+V".parse().unwrap();
        assert_eq!(chord, Chord::default());
        assert_eq!(chord.to_string(), "Alt+V");
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        let chord: Chord = "ctrl+SHIFT+m".parse().unwrap();
        assert!(chord.ctrl && chord.shift && !chord.alt);
        assert_eq!(chord.key, ChordKey::Char('m'));
        assert_eq!(chord.to_string(), "Ctrl+Shift+M");
    }

    #[test]
    fn test_parse_function_key() {
        let chord: Chord = "F9".parse().unwrap();
        assert_eq!(chord.key, ChordKey::F(9));
        assert!(!chord.alt);
        assert_eq!(chord.to_string(), "F9");
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!("".parse::<Chord>().is_err());
        assert!("Alt+".parse::<Chord>().is_err());
        assert!("Alt+V+X".parse::<Chord>().is_err());
        assert!("Alt+F13".parse::<Chord>().is_err());
        assert!("Alt+Space".parse::<Chord>().is_err());
        // A bare letter would swallow typing.
        assert!("V".parse::<Chord>().is_err());
        assert!("Shift+V".parse::<Chord>().is_err());
    }

    #[test]
    fn test_parse_error_mentions_input() {
        let err = "Hyper+V".parse::<Chord>().unwrap_err();
        assert!(err.to_string().contains("Hyper+V"));
    }
}
