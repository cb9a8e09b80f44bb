//! Per-kind property schema.
//!
//! Closed tables: a definition is rejected at load time when a node carries a
//! property its kind does not declare, a value of the wrong shape, or a
//! choice value outside the allowed set. Hosts can rely on every property
//! reaching [`crate::host::LiveHost::apply_property`] being schema-clean.

use super::layout::Priority;
use super::node::NodeKind;
use super::property::{Property, ValueKind};

// ============================================================================
// Table types
// ============================================================================

/// Schema entry for one property.
#[derive(Debug, Clone, Copy)]
pub struct PropertySpec {
    pub name: &'static str,
    pub kind: ValueKind,
    /// Allowed values when `kind` is `Choice`.
    pub choices: &'static [&'static str],
}

const fn prop(name: &'static str, kind: ValueKind) -> PropertySpec {
    PropertySpec {
        name,
        kind,
        choices: &[],
    }
}

const fn choice(name: &'static str, choices: &'static [&'static str]) -> PropertySpec {
    PropertySpec {
        name,
        kind: ValueKind::Choice,
        choices,
    }
}

/// Schema for one node kind.
#[derive(Debug)]
pub struct KindSchema {
    /// Kind-specific properties, on top of [`COMMON`].
    pub own: &'static [PropertySpec],
    /// Default content priorities: (compression, hugging), same per axis.
    pub default_compression: Priority,
    pub default_hugging: Priority,
}

// ============================================================================
// Tables
// ============================================================================

/// Properties every kind accepts.
pub const COMMON: &[PropertySpec] = &[
    prop("background_color", ValueKind::Color),
    prop("tint_color", ValueKind::Color),
    prop("opacity", ValueKind::Float),
    prop("hidden", ValueKind::Bool),
    prop("clips", ValueKind::Bool),
    prop("corner_radius", ValueKind::Float),
    prop("border_width", ValueKind::Float),
    prop("border_color", ValueKind::Color),
];

static PLAIN: KindSchema = KindSchema {
    own: &[],
    default_compression: Priority::High,
    default_hugging: Priority::Low,
};

static LABEL: KindSchema = KindSchema {
    own: &[
        prop("text", ValueKind::Text),
        prop("text_color", ValueKind::Color),
        prop("font_size", ValueKind::Float),
        choice("font_weight", &["regular", "medium", "semibold", "bold"]),
        choice("alignment", &["leading", "center", "trailing", "justified"]),
        prop("lines", ValueKind::Int),
    ],
    default_compression: Priority::High,
    default_hugging: Priority::Low,
};

static BUTTON: KindSchema = KindSchema {
    own: &[
        prop("title", ValueKind::Text),
        prop("title_color", ValueKind::Color),
        prop("font_size", ValueKind::Float),
        prop("enabled", ValueKind::Bool),
    ],
    default_compression: Priority::High,
    default_hugging: Priority::Low,
};

static IMAGE: KindSchema = KindSchema {
    own: &[
        prop("image", ValueKind::Text),
        choice("scaling", &["fit", "fill", "stretch", "center"]),
    ],
    default_compression: Priority::High,
    default_hugging: Priority::Low,
};

static TEXT_FIELD: KindSchema = KindSchema {
    own: &[
        prop("text", ValueKind::Text),
        prop("placeholder", ValueKind::Text),
        prop("text_color", ValueKind::Color),
        prop("font_size", ValueKind::Float),
        prop("secure", ValueKind::Bool),
    ],
    default_compression: Priority::High,
    default_hugging: Priority::Low,
};

static TOGGLE: KindSchema = KindSchema {
    own: &[
        prop("on", ValueKind::Bool),
        prop("on_tint", ValueKind::Color),
    ],
    default_compression: Priority::High,
    default_hugging: Priority::Low,
};

static SLIDER: KindSchema = KindSchema {
    own: &[
        prop("value", ValueKind::Float),
        prop("min", ValueKind::Float),
        prop("max", ValueKind::Float),
    ],
    default_compression: Priority::High,
    default_hugging: Priority::Low,
};

static PROGRESS: KindSchema = KindSchema {
    own: &[
        prop("progress", ValueKind::Float),
        prop("track_color", ValueKind::Color),
    ],
    default_compression: Priority::High,
    default_hugging: Priority::Low,
};

static STACK: KindSchema = KindSchema {
    own: &[
        choice("axis", &["horizontal", "vertical"]),
        prop("spacing", ValueKind::Float),
        choice("alignment", &["fill", "leading", "center", "trailing"]),
        choice("distribution", &["fill", "fill_equally", "equal_spacing"]),
    ],
    default_compression: Priority::High,
    default_hugging: Priority::Low,
};

static SCROLL: KindSchema = KindSchema {
    own: &[
        prop("paging", ValueKind::Bool),
        prop("shows_indicators", ValueKind::Bool),
        prop("content_insets", ValueKind::Insets),
    ],
    default_compression: Priority::High,
    default_hugging: Priority::Low,
};

pub fn schema(kind: NodeKind) -> &'static KindSchema {
    match kind {
        NodeKind::View | NodeKind::Container => &PLAIN,
        NodeKind::Stack => &STACK,
        NodeKind::Scroll => &SCROLL,
        NodeKind::Label => &LABEL,
        NodeKind::Button => &BUTTON,
        NodeKind::Image => &IMAGE,
        NodeKind::TextField => &TEXT_FIELD,
        NodeKind::Toggle => &TOGGLE,
        NodeKind::Slider => &SLIDER,
        NodeKind::Progress => &PROGRESS,
    }
}

// ============================================================================
// Checks
// ============================================================================

/// Look up a property spec by name: kind-specific first, then common.
pub fn find(kind: NodeKind, name: &str) -> Option<&'static PropertySpec> {
    schema(kind)
        .own
        .iter()
        .chain(COMMON.iter())
        .find(|spec| spec.name == name)
}

/// Check one property against the kind's table.
///
/// The error string is a complete human-readable detail; callers wrap it in
/// the apply taxonomy.
pub fn check_property(kind: NodeKind, property: &Property) -> Result<(), String> {
    let Some(spec) = find(kind, &property.name) else {
        return Err(format!(
            "unknown property `{}` for {}",
            property.name,
            kind.name()
        ));
    };

    let got = property.value.kind();
    if got != spec.kind {
        return Err(format!(
            "property `{}` on {} expects {}, got {}",
            property.name,
            kind.name(),
            spec.kind.name(),
            got.name()
        ));
    }

    if let crate::definition::PropertyValue::Choice(value) = &property.value {
        if !spec.choices.contains(&value.as_str()) {
            return Err(format!(
                "property `{}` on {} does not allow `{}` (allowed: {})",
                property.name,
                kind.name(),
                value,
                spec.choices.join(", ")
            ));
        }
    }

    Ok(())
}

/// Check a property against the common table only.
///
/// Used for definition root properties: the live root belongs to the host and
/// its kind is unknown to the engine.
pub fn check_common_property(property: &Property) -> Result<(), String> {
    let Some(spec) = COMMON.iter().find(|spec| spec.name == property.name) else {
        return Err(format!(
            "unknown root property `{}` (root accepts common properties only)",
            property.name
        ));
    };

    let got = property.value.kind();
    if got != spec.kind {
        return Err(format!(
            "root property `{}` expects {}, got {}",
            property.name,
            spec.kind.name(),
            got.name()
        ));
    }

    Ok(())
}
