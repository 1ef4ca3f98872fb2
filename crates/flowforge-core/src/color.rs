//! CSS color validation.
//!
//! Diagram models keep colors as the text the author wrote; [`Color`] is used
//! to check that text parses as a CSS color (`#ff0000`, `rgb(255, 0, 0)`,
//! `red`, ...).

use std::{fmt, str::FromStr};

use color::DynamicColor;
use thiserror::Error;

/// Returned when a string is not a valid CSS color.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid color `{input}`: {reason}")]
pub struct InvalidColor {
    input: String,
    reason: String,
}

impl InvalidColor {
    /// The rejected input.
    pub fn input(&self) -> &str {
        &self.input
    }
}

/// Wrapper around the `DynamicColor` type from the color crate.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Color {
    color: DynamicColor,
}

impl Color {
    /// Parse a CSS color string.
    ///
    /// # Examples
    ///
    /// ```
    /// use flowforge_core::color::Color;
    ///
    /// assert!(Color::new("#ff0000").is_ok());
    /// assert!(Color::new("rebeccapurple").is_ok());
    /// assert!(Color::new("#zz").is_err());
    /// ```
    pub fn new(color_str: &str) -> Result<Self, InvalidColor> {
        DynamicColor::from_str(color_str)
            .map(|color| Self { color })
            .map_err(|err| InvalidColor {
                input: color_str.to_string(),
                reason: err.to_string(),
            })
    }

    /// The alpha component, between 0.0 and 1.0.
    pub fn alpha(&self) -> f32 {
        self.color.components[3]
    }
}

impl FromStr for Color {
    type Err = InvalidColor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.color)
    }
}
