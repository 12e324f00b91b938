//! Control schema export
//!
//! The host-facing description of an effect's controls, as JSON or as a
//! meta-tag template that [`template::extract`](super::template::extract)
//! reads back into identical definitions.

use quick_xml::escape::escape;
use serde::{Deserialize, Serialize};

use super::bridge::to_wire;
use super::types::{ControlDefinition, ControlKind, ControlValue, EffectDescriptor};

/// Exported form of one control
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlSchema {
    pub id: String,
    pub kind: ControlKind,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    pub default: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
}

impl From<&ControlDefinition> for ControlSchema {
    fn from(def: &ControlDefinition) -> Self {
        Self {
            id: def.id().to_string(),
            kind: def.kind(),
            label: def.label().to_string(),
            min: def.bounds().map(|b| b.min),
            max: def.bounds().map(|b| b.max),
            step: def.bounds().and_then(|b| b.step),
            options: (def.kind() == ControlKind::Enum).then(|| def.options().to_vec()),
            default: to_wire(def.default_value()),
            tooltip: def.tooltip().map(str::to_string),
        }
    }
}

/// Exported form of an effect: descriptor plus controls in declaration order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectSchema {
    pub effect: String,
    #[serde(flatten)]
    pub descriptor: EffectDescriptor,
    pub controls: Vec<ControlSchema>,
}

impl EffectSchema {
    pub fn new(effect: impl Into<String>, descriptor: EffectDescriptor, controls: &[ControlDefinition]) -> Self {
        Self {
            effect: effect.into(),
            descriptor,
            controls: controls.iter().map(ControlSchema::from).collect(),
        }
    }

    /// Pretty JSON export
    pub fn export_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Meta-tag template readable by the legacy extractor
    pub fn to_markup(&self) -> String {
        let mut out = String::from("<head>\n");
        out.push_str(&format!("  <title>{}</title>\n", escape(self.descriptor.name.as_str())));
        if !self.descriptor.description.is_empty() {
            out.push_str(&format!(
                "  <meta description=\"{}\"/>\n",
                escape(self.descriptor.description.as_str())
            ));
        }
        if !self.descriptor.author.is_empty() {
            out.push_str(&format!("  <meta publisher=\"{}\"/>\n", escape(self.descriptor.author.as_str())));
        }
        for control in &self.controls {
            out.push_str("  <meta");
            push_attr(&mut out, "property", &control.id);
            push_attr(&mut out, "label", &control.label);
            push_attr(&mut out, "type", control.kind.as_str());
            if let Some(min) = control.min {
                push_attr(&mut out, "min", &min.to_string());
            }
            if let Some(max) = control.max {
                push_attr(&mut out, "max", &max.to_string());
            }
            if let Some(step) = control.step {
                push_attr(&mut out, "step", &step.to_string());
            }
            if let Some(options) = &control.options {
                push_attr(&mut out, "values", &options.join(","));
            }
            push_attr(&mut out, "default", &markup_default(&control.default));
            if let Some(tooltip) = &control.tooltip {
                push_attr(&mut out, "tooltip", tooltip);
            }
            out.push_str("/>\n");
        }
        out.push_str("</head>\n");
        out
    }
}

fn push_attr(out: &mut String, name: &str, value: &str) {
    out.push_str(&format!(" {}=\"{}\"", name, escape(value)));
}

fn markup_default(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => match n.as_f64() {
            Some(v) => v.to_string(),
            None => n.to_string(),
        },
        other => other.to_string(),
    }
}

/// Default of a control as a typed value, for consumers holding only a schema
pub fn schema_default(control: &ControlSchema) -> Option<ControlValue> {
    let value = &control.default;
    Some(match control.kind {
        ControlKind::Number => ControlValue::Number(value.as_f64()?),
        ControlKind::Hue => ControlValue::Hue(value.as_f64()?),
        ControlKind::Boolean => ControlValue::Boolean(value.as_bool()?),
        ControlKind::Enum => ControlValue::Enum(value.as_str()?.to_string()),
        ControlKind::Color => ControlValue::Color(value.as_str()?.to_string()),
        ControlKind::Text => ControlValue::Text(value.as_str()?.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::template::extract;
    use crate::controls::types::ControlSpec;

    fn sample_controls() -> Vec<ControlDefinition> {
        vec![
            ControlSpec::number("speed", "Speed", 5.0, 1.0, 10.0)
                .step(0.5)
                .tooltip("How fast \"it\" goes")
                .build()
                .unwrap(),
            ControlSpec::enumeration("mode", "Mode", &["Rainbow", "Fire & Ice", "Ocean"], "Fire & Ice")
                .build()
                .unwrap(),
            ControlSpec::boolean("glow", "Glow", true).build().unwrap(),
            ControlSpec::hue("hue", "Hue", 0.1).build().unwrap(),
            ControlSpec::color("tint", "Tint <main>", "#ff8800").build().unwrap(),
            ControlSpec::text("caption", "Caption", "").build().unwrap(),
        ]
    }

    #[test]
    fn test_markup_round_trip_is_lossless() {
        let controls = sample_controls();
        let descriptor = EffectDescriptor::new("Rainbow <Wave>", "Bands & stripes", "lightscript");
        let schema = EffectSchema::new("rainbow_wave", descriptor.clone(), &controls);

        let document = extract(&schema.to_markup()).unwrap();
        assert_eq!(document.descriptor, Some(descriptor));
        assert_eq!(document.controls, controls);
    }

    #[test]
    fn test_json_export_shape() {
        let controls = sample_controls();
        let schema = EffectSchema::new("rainbow_wave", EffectDescriptor::fallback("RainbowWave"), &controls);
        let json: serde_json::Value = serde_json::from_str(&schema.export_json().unwrap()).unwrap();

        assert_eq!(json["effect"], "rainbow_wave");
        assert_eq!(json["name"], "RainbowWave");
        assert_eq!(json["controls"][0]["kind"], "number");
        assert_eq!(json["controls"][0]["step"], 0.5);
        assert_eq!(json["controls"][1]["options"][1], "Fire & Ice");
        assert!(json["controls"][2].get("min").is_none());
        assert_eq!(json["controls"][2]["default"], true);
    }

    #[test]
    fn test_schema_default() {
        let controls = sample_controls();
        let schema = EffectSchema::new("x", EffectDescriptor::default(), &controls);
        for (control, def) in schema.controls.iter().zip(&controls) {
            assert_eq!(schema_default(control).as_ref(), Some(def.default_value()));
        }
    }
}
