//! Control definition model
//!
//! A control is one host-visible, typed parameter of an effect. Definitions
//! are built through [`ControlSpec`] and validated once; after that they are
//! immutable and owned by the metadata registry.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::error::RegistryError;

/// Full hue circle in degrees
pub const HUE_MAX: f64 = 360.0;

/// Kind of a control, fixed at declaration time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlKind {
    Number,
    Boolean,
    Enum,
    Color,
    Hue,
    Text,
}

impl ControlKind {
    /// All kinds in display order
    pub fn all() -> &'static [ControlKind] {
        &[
            ControlKind::Number,
            ControlKind::Boolean,
            ControlKind::Enum,
            ControlKind::Color,
            ControlKind::Hue,
            ControlKind::Text,
        ]
    }

    /// Wire name used by the schema export and the markup path
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlKind::Number => "number",
            ControlKind::Boolean => "boolean",
            ControlKind::Enum => "enum",
            ControlKind::Color => "color",
            ControlKind::Hue => "hue",
            ControlKind::Text => "text",
        }
    }

    /// Parse a wire name, accepting the legacy markup aliases
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "number" => Some(ControlKind::Number),
            "boolean" | "bool" => Some(ControlKind::Boolean),
            "enum" | "combobox" => Some(ControlKind::Enum),
            "color" => Some(ControlKind::Color),
            "hue" => Some(ControlKind::Hue),
            "text" | "textfield" => Some(ControlKind::Text),
            _ => None,
        }
    }

    /// Whether this kind carries numeric bounds
    pub fn is_numeric(&self) -> bool {
        matches!(self, ControlKind::Number | ControlKind::Hue)
    }
}

impl std::fmt::Display for ControlKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed control value
///
/// Enum values hold the option label; colors hold a `#rrggbb` string.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlValue {
    Number(f64),
    Boolean(bool),
    Enum(String),
    Color(String),
    Hue(f64),
    Text(String),
}

impl ControlValue {
    /// Kind this value satisfies
    pub fn kind(&self) -> ControlKind {
        match self {
            ControlValue::Number(_) => ControlKind::Number,
            ControlValue::Boolean(_) => ControlKind::Boolean,
            ControlValue::Enum(_) => ControlKind::Enum,
            ControlValue::Color(_) => ControlKind::Color,
            ControlValue::Hue(_) => ControlKind::Hue,
            ControlValue::Text(_) => ControlKind::Text,
        }
    }

    /// Numeric view (booleans fold to 0/1, everything else is 0)
    pub fn as_f64(&self) -> f64 {
        match self {
            ControlValue::Number(v) | ControlValue::Hue(v) => *v,
            ControlValue::Boolean(v) => {
                if *v {
                    1.0
                } else {
                    0.0
                }
            }
            _ => 0.0,
        }
    }

    /// String view for enum, color and text values
    pub fn as_str(&self) -> &str {
        match self {
            ControlValue::Enum(v) | ControlValue::Color(v) | ControlValue::Text(v) => v.as_str(),
            _ => "",
        }
    }
}

/// Numeric bounds for number and hue controls
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
}

impl Bounds {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max, step: None }
    }

    /// Whether `value` lies inside the closed range
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    /// Clamp `value` into the closed range
    pub fn clamp(&self, value: f64) -> f64 {
        value.max(self.min).min(self.max)
    }
}

/// Parse a `#rrggbb` (or `rrggbb`) color into linear 0-1 channels
pub fn parse_hex_color(value: &str) -> Option<[f32; 3]> {
    let hex = value.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    let (r, g, b) = (channel(0)?, channel(2)?, channel(4)?);
    Some([r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0])
}

/// One declared, host-visible parameter
///
/// Construct through [`ControlSpec::build`]; fields are read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlDefinition {
    id: String,
    kind: ControlKind,
    label: String,
    default: ControlValue,
    bounds: Option<Bounds>,
    options: Option<Vec<String>>,
    tooltip: Option<String>,
}

impl ControlDefinition {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> ControlKind {
        self.kind
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn default_value(&self) -> &ControlValue {
        &self.default
    }

    pub fn bounds(&self) -> Option<&Bounds> {
        self.bounds.as_ref()
    }

    /// Enum options (empty slice for non-enum kinds)
    pub fn options(&self) -> &[String] {
        self.options.as_deref().unwrap_or(&[])
    }

    pub fn tooltip(&self) -> Option<&str> {
        self.tooltip.as_deref()
    }

    /// Index of the default option (0 for non-enum kinds)
    pub fn default_index(&self) -> usize {
        match &self.default {
            ControlValue::Enum(label) => self.options().iter().position(|o| o == label).unwrap_or(0),
            _ => 0,
        }
    }
}

/// Declaration of a control before validation
///
/// Mirrors the arguments a property annotation would carry.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlSpec {
    id: String,
    kind: ControlKind,
    label: String,
    default: ControlValue,
    bounds: Option<Bounds>,
    options: Option<Vec<String>>,
    tooltip: Option<String>,
}

impl ControlSpec {
    /// Number control with inclusive bounds
    pub fn number(id: impl Into<String>, label: impl Into<String>, default: f64, min: f64, max: f64) -> Self {
        Self {
            id: id.into(),
            kind: ControlKind::Number,
            label: label.into(),
            default: ControlValue::Number(default),
            bounds: Some(Bounds::new(min, max)),
            options: None,
            tooltip: None,
        }
    }

    /// Hue control in degrees (0-360)
    pub fn hue(id: impl Into<String>, label: impl Into<String>, default: f64) -> Self {
        Self {
            id: id.into(),
            kind: ControlKind::Hue,
            label: label.into(),
            default: ControlValue::Hue(default),
            bounds: Some(Bounds::new(0.0, HUE_MAX)),
            options: None,
            tooltip: None,
        }
    }

    pub fn boolean(id: impl Into<String>, label: impl Into<String>, default: bool) -> Self {
        Self {
            id: id.into(),
            kind: ControlKind::Boolean,
            label: label.into(),
            default: ControlValue::Boolean(default),
            bounds: None,
            options: None,
            tooltip: None,
        }
    }

    /// Enum control; `default` is an option label
    pub fn enumeration<S: AsRef<str>>(
        id: impl Into<String>,
        label: impl Into<String>,
        options: &[S],
        default: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: ControlKind::Enum,
            label: label.into(),
            default: ControlValue::Enum(default.into()),
            bounds: None,
            options: Some(options.iter().map(|o| o.as_ref().to_string()).collect()),
            tooltip: None,
        }
    }

    /// Color control; `default` is `#rrggbb`
    pub fn color(id: impl Into<String>, label: impl Into<String>, default: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ControlKind::Color,
            label: label.into(),
            default: ControlValue::Color(default.into()),
            bounds: None,
            options: None,
            tooltip: None,
        }
    }

    pub fn text(id: impl Into<String>, label: impl Into<String>, default: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: ControlKind::Text,
            label: label.into(),
            default: ControlValue::Text(default.into()),
            bounds: None,
            options: None,
            tooltip: None,
        }
    }

    /// Raw constructor used by the markup path, validated in [`build`](Self::build)
    pub(crate) fn raw(
        id: String,
        kind: ControlKind,
        label: String,
        default: ControlValue,
        bounds: Option<Bounds>,
        options: Option<Vec<String>>,
    ) -> Self {
        Self {
            id,
            kind,
            label,
            default,
            bounds,
            options,
            tooltip: None,
        }
    }

    pub fn step(mut self, step: f64) -> Self {
        if let Some(bounds) = &mut self.bounds {
            bounds.step = Some(step);
        } else {
            // Kept so validation reports bounds on a non-numeric kind
            self.bounds = Some(Bounds { min: 0.0, max: 0.0, step: Some(step) });
        }
        self
    }

    /// Replace the bounds
    pub fn bounds(mut self, min: f64, max: f64) -> Self {
        let step = self.bounds.and_then(|b| b.step);
        self.bounds = Some(Bounds { min, max, step });
        self
    }

    pub fn tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.tooltip = Some(tooltip.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Validate and freeze into a definition
    pub fn build(self) -> Result<ControlDefinition, RegistryError> {
        let id = self.id.trim().to_string();
        if id.is_empty() {
            return Err(RegistryError::invalid(self.id, "id must not be empty"));
        }
        if self.default.kind() != self.kind {
            return Err(RegistryError::invalid(
                id,
                format!("default is a {} value but the control is {}", self.default.kind(), self.kind),
            ));
        }

        if self.kind.is_numeric() {
            let Some(bounds) = self.bounds else {
                return Err(RegistryError::invalid(id, "numeric control requires bounds"));
            };
            if !bounds.min.is_finite() || !bounds.max.is_finite() {
                return Err(RegistryError::invalid(id, "bounds must be finite"));
            }
            if bounds.min > bounds.max {
                return Err(RegistryError::invalid(
                    id,
                    format!("min {} is greater than max {}", bounds.min, bounds.max),
                ));
            }
            if let Some(step) = bounds.step {
                if !(step.is_finite() && step > 0.0) {
                    return Err(RegistryError::invalid(id, format!("step {} must be positive", step)));
                }
            }
            let default = self.default.as_f64();
            if !default.is_finite() || !bounds.contains(default) {
                return Err(RegistryError::invalid(
                    id,
                    format!("default {} outside [{}, {}]", default, bounds.min, bounds.max),
                ));
            }
        } else if self.bounds.is_some() {
            return Err(RegistryError::invalid(id, format!("{} control cannot carry bounds", self.kind)));
        }

        if self.kind == ControlKind::Enum {
            let options = self.options.as_deref().unwrap_or(&[]);
            if options.is_empty() {
                return Err(RegistryError::invalid(id, "enum control requires at least one option"));
            }
            for (i, option) in options.iter().enumerate() {
                if option.is_empty() || option.trim() != option {
                    return Err(RegistryError::invalid(id, format!("option '{}' is blank or padded", option)));
                }
                if option.contains(',') {
                    return Err(RegistryError::invalid(id, format!("option '{}' contains ','", option)));
                }
                if options[..i].contains(option) {
                    return Err(RegistryError::invalid(id, format!("option '{}' listed twice", option)));
                }
            }
            let default = self.default.as_str();
            if !options.iter().any(|o| o == default) {
                return Err(RegistryError::invalid(id, format!("default '{}' is not among the options", default)));
            }
        } else if self.options.is_some() {
            return Err(RegistryError::invalid(id, format!("{} control cannot carry options", self.kind)));
        }

        if self.kind == ControlKind::Color && parse_hex_color(self.default.as_str()).is_none() {
            return Err(RegistryError::invalid(
                id,
                format!("default '{}' is not a #rrggbb color", self.default.as_str()),
            ));
        }

        Ok(ControlDefinition {
            id,
            kind: self.kind,
            label: self.label,
            default: self.default,
            bounds: self.bounds,
            options: self.options,
            tooltip: self.tooltip.filter(|t| !t.is_empty()),
        })
    }
}

/// Registry-wide metadata about an effect as a whole (display only)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EffectDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub author: String,
}

impl EffectDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            author: author.into(),
        }
    }

    /// Descriptor used when a class never declared one
    pub fn fallback(class_name: &str) -> Self {
        Self {
            name: class_name.to_string(),
            description: String::new(),
            author: String::new(),
        }
    }
}

/// Current runtime values of the active effect, keyed by control id
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ControlValues {
    values: HashMap<String, ControlValue>,
}

impl ControlValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed every control with its declared default
    pub fn from_defaults(controls: &[ControlDefinition]) -> Self {
        let values = controls
            .iter()
            .map(|c| (c.id().to_string(), c.default_value().clone()))
            .collect();
        Self { values }
    }

    pub fn get(&self, id: &str) -> Option<&ControlValue> {
        self.values.get(id)
    }

    pub fn set(&mut self, id: impl Into<String>, value: ControlValue) {
        self.values.insert(id.into(), value);
    }

    /// Restore every control's default, dropping unknown keys
    pub fn reset(&mut self, controls: &[ControlDefinition]) {
        *self = Self::from_defaults(controls);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ControlValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}
