//! Constraint conditions evaluated against the interface environment.
//!
//! A constraint whose condition evaluates to `false` is excluded from the
//! pass entirely: never built, never exported, never installed.

use serde::{Deserialize, Serialize};

use crate::environment::{Axis, DeviceClass, Environment, Orientation, SizeClass};

/// A single testable statement about the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statement {
    /// Literal `true` / `false`.
    Always(bool),
    Device(DeviceClass),
    SizeClass(Axis, SizeClass),
    Orientation(Orientation),
}

impl Statement {
    pub fn evaluate(&self, env: &Environment) -> bool {
        match self {
            Self::Always(value) => *value,
            Self::Device(device) => env.device == *device,
            Self::SizeClass(axis, class) => env.size_class(*axis) == *class,
            Self::Orientation(orientation) => env.orientation() == *orientation,
        }
    }
}

/// Condition tree attached to a constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Statement(Statement),
    Not(Box<Condition>),
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    /// True when both sides evaluate to the same truth value.
    Same(Box<Condition>, Box<Condition>),
}

impl Condition {
    pub fn evaluate(&self, env: &Environment) -> bool {
        match self {
            Self::Statement(statement) => statement.evaluate(env),
            Self::Not(inner) => !inner.evaluate(env),
            Self::And(lhs, rhs) => lhs.evaluate(env) && rhs.evaluate(env),
            Self::Or(lhs, rhs) => lhs.evaluate(env) || rhs.evaluate(env),
            Self::Same(lhs, rhs) => lhs.evaluate(env) == rhs.evaluate(env),
        }
    }

    pub fn device(device: DeviceClass) -> Self {
        Self::Statement(Statement::Device(device))
    }

    pub fn size_class(axis: Axis, class: SizeClass) -> Self {
        Self::Statement(Statement::SizeClass(axis, class))
    }

    pub fn orientation(orientation: Orientation) -> Self {
        Self::Statement(Statement::Orientation(orientation))
    }

    pub fn always(value: bool) -> Self {
        Self::Statement(Statement::Always(value))
    }

    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }

    pub fn and(self, other: Self) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Self) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }
}
