//! Typed property values.
//!
//! Properties are closed, tagged values. The per-kind schema
//! ([`super::schema`]) decides which names a node kind accepts and which
//! [`ValueKind`] each name expects; free-form string payloads never reach a
//! host.

use serde::{Deserialize, Serialize};

// ============================================================================
// Color
// ============================================================================

/// RGBA color, 8 bits per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const CLEAR: Self = Self {
        r: 0,
        g: 0,
        b: 0,
        a: 0,
    };

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

// ============================================================================
// Values
// ============================================================================

/// The shape of a property value, used by the per-kind schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Bool,
    Int,
    Float,
    Text,
    Color,
    Point,
    Size,
    Insets,
    Choice,
}

impl ValueKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Text => "text",
            Self::Color => "color",
            Self::Point => "point",
            Self::Size => "size",
            Self::Insets => "insets",
            Self::Choice => "choice",
        }
    }
}

/// A typed property value as written in a definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Color(Color),
    Point { x: f64, y: f64 },
    Size { width: f64, height: f64 },
    Insets {
        top: f64,
        leading: f64,
        bottom: f64,
        trailing: f64,
    },
    /// One of a fixed set of names the schema allows for the property.
    Choice(String),
}

impl PropertyValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::Text(_) => ValueKind::Text,
            Self::Color(_) => ValueKind::Color,
            Self::Point { .. } => ValueKind::Point,
            Self::Size { .. } => ValueKind::Size,
            Self::Insets { .. } => ValueKind::Insets,
            Self::Choice(_) => ValueKind::Choice,
        }
    }
}

// ============================================================================
// Property
// ============================================================================

/// A named property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub value: PropertyValue,
}

impl Property {
    pub fn new(name: impl Into<String>, value: PropertyValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, PropertyValue::Text(value.into()))
    }

    pub fn color(name: impl Into<String>, color: Color) -> Self {
        Self::new(name, PropertyValue::Color(color))
    }

    pub fn float(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, PropertyValue::Float(value))
    }

    pub fn flag(name: impl Into<String>, value: bool) -> Self {
        Self::new(name, PropertyValue::Bool(value))
    }
}
