use std::fmt;

use crate::scatter::TOKEN_DIGITS;

const PLACEHOLDER: char = '#';

/// Error returned when registering an identifier space with bad options.
#[derive(Debug, PartialEq)]
pub enum ConfigError {
    PlaceholderCount { found: usize },
    UnsafeCharacter { character: char },
    AlreadyRegistered { entity: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::PlaceholderCount { found } => {
                write!(
                    f,
                    "Format must contain exactly {} '{}' characters, found {}. \
                     Use something like \"###-####-###\"",
                    TOKEN_DIGITS, PLACEHOLDER, found
                )
            }
            ConfigError::UnsafeCharacter { character } => {
                write!(
                    f,
                    "Format may only contain URL path segment safe characters \
                     besides '{}', found {:?}",
                    PLACEHOLDER, character
                )
            }
            ConfigError::AlreadyRegistered { entity } => {
                write!(f, "Entity {:?} is already registered", entity)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Registration options for one entity type.
///
/// All settings are optional; the spin defaults to a value derived from the
/// entity name (see [`spin_for`]) and without a format the raw 10-digit token
/// is used as-is.
///
/// # Examples
///
/// ```
/// use maskid_rs::Options;
///
/// let options = Options::new()
///     .format("###-####-###")
///     .belongs_to("owner_id", "owner");
/// ```
#[derive(Clone, Debug, Default)]
pub struct Options {
    pub(crate) format: Option<String>,
    pub(crate) spin: Option<u128>,
    pub(crate) keys: Vec<(String, String)>,
}

impl Options {
    pub fn new() -> Options {
        Options::default()
    }

    /// Sets the token format template. The template must contain exactly 10
    /// `#` placeholders; validation happens at registration time.
    pub fn format(mut self, template: &str) -> Options {
        self.format = Some(template.to_string());
        self
    }

    /// Overrides the derived spin.
    pub fn spin(mut self, spin: u128) -> Options {
        self.spin = Some(spin);
        self
    }

    /// Declares `field` as a foreign key holding identifiers of `entity`,
    /// so query rewriting decodes its values with that entity's space.
    pub fn belongs_to(mut self, field: &str, entity: &str) -> Options {
        self.keys.push((field.to_string(), entity.to_string()));
        self
    }
}

/// A validated token format template.
///
/// Holds exactly [`TOKEN_DIGITS`] `#` placeholders; every other character is
/// safe inside a URL path segment (ASCII alphanumeric or `-` `_` `.` `~`).
#[derive(Clone, Debug, PartialEq)]
pub struct Template {
    raw: String,
}

impl Template {
    pub fn parse(raw: &str) -> Result<Template, ConfigError> {
        let found = raw.chars().filter(|&c| c == PLACEHOLDER).count();
        if found != TOKEN_DIGITS {
            return Err(ConfigError::PlaceholderCount { found });
        }
        if let Some(character) = raw
            .chars()
            .find(|&c| c != PLACEHOLDER && !is_segment_safe(c))
        {
            return Err(ConfigError::UnsafeCharacter { character });
        }
        Ok(Template {
            raw: raw.to_string(),
        })
    }

    /// Substitutes the placeholders left to right with `digits`.
    pub fn render(&self, digits: &str) -> String {
        let mut digits = digits.chars();
        self.raw
            .chars()
            .map(|c| {
                if c == PLACEHOLDER {
                    digits
                        .next()
                        .expect("Template holds exactly ten placeholders")
                } else {
                    c
                }
            })
            .collect()
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

// RFC 3986 unreserved characters.
fn is_segment_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~')
}

/// Derives the default spin from an entity name.
///
/// Each of the first 12 characters maps to its 0-based index in the lowercase
/// alphabet; characters outside `a..=z` contribute nothing. The indices'
/// decimal digits are concatenated and parsed as an integer, so the same name
/// always produces the same spin across process restarts.
///
/// # Examples
///
/// ```
/// use maskid_rs::spin_for;
///
/// assert_eq!(spin_for("widget"), 22_836_419);
/// assert_eq!(spin_for("abc"), 12);
/// ```
pub fn spin_for(name: &str) -> u128 {
    let digits: String = name
        .chars()
        .take(12)
        .filter(|c| c.is_ascii_lowercase())
        .map(|c| (c as u8 - b'a').to_string())
        .collect();
    digits.parse().unwrap_or(0)
}
