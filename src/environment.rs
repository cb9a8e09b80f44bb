//! Interface environment snapshot used for condition evaluation.
//!
//! The session holds the current snapshot behind an `ArcSwap`; swapping it
//! (device rotation, size-class change, theme switch) triggers a forced
//! reapply of every registered instance.

use serde::{Deserialize, Serialize};

/// Device idiom the host is running on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Phone,
    Tablet,
    Tv,
    Car,
    Unspecified,
}

/// Horizontal or vertical size class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeClass {
    Compact,
    Regular,
    Unspecified,
}

/// Layout axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Horizontal,
    Vertical,
}

/// Display orientation, derived from root dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Portrait,
    Landscape,
}

/// Snapshot of the host interface traits an apply pass evaluates against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub device: DeviceClass,
    pub horizontal_size: SizeClass,
    pub vertical_size: SizeClass,
    /// Root dimensions in points; orientation derives from these.
    pub width: f64,
    pub height: f64,
    /// Active theme name; style resolution keys off it.
    pub theme: String,
}

impl Environment {
    pub fn size_class(&self, axis: Axis) -> SizeClass {
        match axis {
            Axis::Horizontal => self.horizontal_size,
            Axis::Vertical => self.vertical_size,
        }
    }

    /// Landscape iff strictly wider than tall.
    pub fn orientation(&self) -> Orientation {
        if self.width > self.height {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        }
    }

    pub fn with_theme(mut self, theme: impl Into<String>) -> Self {
        self.theme = theme.into();
        self
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            device: DeviceClass::Unspecified,
            horizontal_size: SizeClass::Unspecified,
            vertical_size: SizeClass::Unspecified,
            width: 0.0,
            height: 0.0,
            theme: "none".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orientation_from_dimensions() {
        let mut env = Environment::default();
        env.width = 812.0;
        env.height = 375.0;
        assert_eq!(env.orientation(), Orientation::Landscape);

        env.width = 375.0;
        env.height = 812.0;
        assert_eq!(env.orientation(), Orientation::Portrait);

        // Square counts as portrait
        env.width = 500.0;
        env.height = 500.0;
        assert_eq!(env.orientation(), Orientation::Portrait);
    }

    #[test]
    fn test_size_class_per_axis() {
        let mut env = Environment::default();
        env.horizontal_size = SizeClass::Compact;
        env.vertical_size = SizeClass::Regular;
        assert_eq!(env.size_class(Axis::Horizontal), SizeClass::Compact);
        assert_eq!(env.size_class(Axis::Vertical), SizeClass::Regular);
    }
}
