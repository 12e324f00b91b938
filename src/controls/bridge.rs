//! Control value synchronization
//!
//! Converts between the untyped values held in the [`ControlStore`] and the
//! typed values an effect consumes. Every coercion rule is a pure function;
//! malformed store values fall back to the control's default.

use serde_json::Value;

use super::store::ControlStore;
use super::types::{parse_hex_color, ControlDefinition, ControlKind, ControlValue, ControlValues};

/// Speed multiplier used when the raw speed is unusable
pub const FALLBACK_SPEED: f64 = 1.0;
/// Lower bound of a normalized speed
pub const MIN_SPEED: f64 = 0.2;

/// Finite number from the store, or `default`
pub fn number_or(raw: Option<&Value>, default: f64) -> f64 {
    raw.and_then(Value::as_f64).filter(|v| v.is_finite()).unwrap_or(default)
}

/// Fold a store value into 0 or 1
///
/// `true`, any non-zero number and the strings `"true"`/`"1"` map to 1.
pub fn bool_to_int(raw: Option<&Value>) -> i32 {
    match raw {
        Some(Value::Bool(b)) => *b as i32,
        Some(Value::Number(n)) => match n.as_f64() {
            Some(v) if v != 0.0 => 1,
            _ => 0,
        },
        Some(Value::String(s)) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1") as i32,
        _ => 0,
    }
}

/// Resolve an enum store value to an option index
///
/// Labels map to their position; an in-range integer index passes through.
/// Anything else yields `default_index`.
pub fn enum_to_index(raw: Option<&Value>, options: &[String], default_index: usize) -> usize {
    let in_range = |i: f64| -> Option<usize> {
        (i.fract() == 0.0 && i >= 0.0 && (i as usize) < options.len()).then_some(i as usize)
    };
    match raw {
        Some(Value::String(label)) => options
            .iter()
            .position(|o| o == label)
            .or_else(|| label.trim().parse::<f64>().ok().and_then(in_range))
            .unwrap_or(default_index),
        Some(Value::Number(n)) => n.as_f64().and_then(in_range).unwrap_or(default_index),
        _ => default_index,
    }
}

/// Map a 1-10 speed control onto an animation multiplier
///
/// `max(0.2, (raw / 5)^1.5)`, so 5 is unit speed. Non-finite input yields 1.0.
pub fn normalize_speed(raw: f64) -> f64 {
    if !raw.is_finite() {
        return FALLBACK_SPEED;
    }
    // powf of a negative base is NaN; f64::max discards it
    (raw / 5.0).powf(1.5).max(MIN_SPEED)
}

/// Map a percentage control onto a 0-based scale factor
///
/// Non-finite `raw` is replaced by `default_percent` before scaling.
pub fn normalize_percentage(raw: f64, default_percent: f64, min: f64) -> f64 {
    let percent = if raw.is_finite() { raw } else { default_percent };
    (percent / 100.0).max(min)
}

/// Typed value of `definition` from a raw store value
pub fn resolve(definition: &ControlDefinition, raw: Option<&Value>) -> ControlValue {
    let default = definition.default_value();
    let resolved = match definition.kind() {
        ControlKind::Number => ControlValue::Number(number_or(raw, default.as_f64())),
        ControlKind::Hue => ControlValue::Hue(number_or(raw, default.as_f64())),
        ControlKind::Boolean => match raw {
            Some(_) => ControlValue::Boolean(bool_to_int(raw) == 1),
            None => default.clone(),
        },
        ControlKind::Enum => {
            let index = enum_to_index(raw, definition.options(), definition.default_index());
            match definition.options().get(index) {
                Some(label) => ControlValue::Enum(label.clone()),
                None => default.clone(),
            }
        }
        ControlKind::Color => match raw {
            Some(Value::String(s)) if parse_hex_color(s).is_some() => {
                ControlValue::Color(format!("#{}", s.trim().trim_start_matches('#').to_ascii_lowercase()))
            }
            _ => default.clone(),
        },
        ControlKind::Text => match raw {
            Some(Value::String(s)) => ControlValue::Text(s.clone()),
            Some(Value::Number(n)) => ControlValue::Text(n.to_string()),
            Some(Value::Bool(b)) => ControlValue::Text(b.to_string()),
            _ => default.clone(),
        },
    };

    if raw.is_some() && &resolved == default && raw != Some(&to_wire(default)) {
        tracing::debug!(
            control = definition.id(),
            raw = ?raw,
            "Control value unusable, using default"
        );
    }
    resolved
}

/// Store representation of a typed value
pub fn to_wire(value: &ControlValue) -> Value {
    match value {
        ControlValue::Number(v) | ControlValue::Hue(v) => Value::from(*v),
        ControlValue::Boolean(v) => Value::Bool(*v),
        ControlValue::Enum(v) | ControlValue::Color(v) | ControlValue::Text(v) => Value::String(v.clone()),
    }
}

/// Write every control's default into the store
///
/// Used both to seed a freshly initialized effect and for reset-to-default.
pub fn write_defaults(store: &mut dyn ControlStore, controls: &[ControlDefinition]) {
    for control in controls {
        store.set(control.id(), to_wire(control.default_value()));
    }
}

/// Delete every key owned by `controls`, returning how many existed
pub fn clear_owned_keys(store: &mut dyn ControlStore, controls: &[ControlDefinition]) -> usize {
    controls.iter().filter(|c| store.delete(c.id()).is_some()).count()
}

/// Read-side view of the store for one effect's controls
pub struct ControlBridge<'a> {
    store: &'a dyn ControlStore,
    controls: &'a [ControlDefinition],
}

impl<'a> ControlBridge<'a> {
    pub fn new(store: &'a dyn ControlStore, controls: &'a [ControlDefinition]) -> Self {
        Self { store, controls }
    }

    pub fn controls(&self) -> &'a [ControlDefinition] {
        self.controls
    }

    fn definition(&self, id: &str) -> Option<&'a ControlDefinition> {
        let found = self.controls.iter().find(|c| c.id() == id);
        if found.is_none() {
            tracing::warn!(control = id, "Effect read an undeclared control");
        }
        found
    }

    /// Raw store value, without coercion
    pub fn raw(&self, id: &str) -> Option<Value> {
        self.store.get(id)
    }

    /// Typed current value (None for undeclared ids)
    pub fn value(&self, id: &str) -> Option<ControlValue> {
        let definition = self.definition(id)?;
        Some(resolve(definition, self.store.get(id).as_ref()))
    }

    pub fn number(&self, id: &str) -> f64 {
        self.value(id).map(|v| v.as_f64()).unwrap_or(0.0)
    }

    /// Number clamped to the control's declared bounds
    pub fn bounded(&self, id: &str) -> f64 {
        let value = self.number(id);
        match self.definition(id).and_then(|d| d.bounds()) {
            Some(bounds) => value.clamp(bounds.min, bounds.max),
            None => value,
        }
    }

    pub fn hue(&self, id: &str) -> f64 {
        self.number(id)
    }

    pub fn flag(&self, id: &str) -> bool {
        matches!(self.value(id), Some(ControlValue::Boolean(true)))
    }

    pub fn enum_index(&self, id: &str) -> usize {
        match self.definition(id) {
            Some(def) => enum_to_index(self.store.get(id).as_ref(), def.options(), def.default_index()),
            None => 0,
        }
    }

    pub fn enum_label(&self, id: &str) -> String {
        self.value(id).map(|v| v.as_str().to_string()).unwrap_or_default()
    }

    /// Normalized speed multiplier for a speed control
    pub fn speed(&self, id: &str) -> f64 {
        normalize_speed(number_or(self.store.get(id).as_ref(), f64::NAN))
    }

    /// Scale factor for a percentage control, defaulting to its declared default
    pub fn percentage(&self, id: &str, min: f64) -> f64 {
        let default_percent = self.definition(id).map(|d| d.default_value().as_f64()).unwrap_or(100.0);
        normalize_percentage(number_or(self.store.get(id).as_ref(), f64::NAN), default_percent, min)
    }

    /// RGB channels in 0-1
    pub fn color(&self, id: &str) -> [f32; 3] {
        self.value(id)
            .and_then(|v| parse_hex_color(v.as_str()))
            .unwrap_or([1.0, 1.0, 1.0])
    }

    pub fn text(&self, id: &str) -> String {
        self.value(id).map(|v| v.as_str().to_string()).unwrap_or_default()
    }

    /// Resolve every control at once
    pub fn snapshot(&self) -> ControlValues {
        let mut values = ControlValues::new();
        for control in self.controls {
            values.set(control.id(), resolve(control, self.store.get(control.id()).as_ref()));
        }
        values
    }
}
