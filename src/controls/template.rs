//! Legacy lightscript template extraction
//!
//! Older lightscripts declare their controls as meta tags in the document
//! head instead of through [`Describe`](super::Describe):
//!
//! ```text
//! <head>
//!   <title>Sparkle Field</title>
//!   <meta description="Random twinkling points"/>
//!   <meta publisher="lightscript"/>
//!   <meta property="density" label="Density" type="number" min="1" max="100" default="40"/>
//!   <meta property="palette" label="Palette" type="combobox" values="Warm,Cool" default="Warm"/>
//! </head>
//! ```
//!
//! Only the head region is parsed; body content is ignored.

use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::error::RegistryError;
use super::types::{Bounds, ControlDefinition, ControlKind, ControlSpec, ControlValue, EffectDescriptor, HUE_MAX};

/// Declarations found in a template head
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TemplateDocument {
    /// Present when the head has a title
    pub descriptor: Option<EffectDescriptor>,
    /// Controls in document order
    pub controls: Vec<ControlDefinition>,
}

/// Errors while reading a template
#[derive(Debug)]
pub enum TemplateError {
    /// The head is not well-formed enough to tokenize
    Markup(quick_xml::Error),
    /// A control meta tag lacks a required attribute
    MissingAttribute { property: String, attribute: &'static str },
    /// An attribute value has the wrong shape
    InvalidValue {
        property: String,
        attribute: &'static str,
        value: String,
    },
    /// Unrecognized `type` attribute
    UnknownKind { property: String, kind: String },
    /// The control failed definition validation
    Control(RegistryError),
}

impl TemplateError {
    /// Fold into a registry error for a class declaration
    pub fn into_registry_error(self, class: &str) -> RegistryError {
        match self {
            TemplateError::Control(e) => e,
            other => RegistryError::InvalidTemplate {
                class: class.to_string(),
                reason: other.to_string(),
            },
        }
    }
}

impl std::fmt::Display for TemplateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TemplateError::Markup(e) => write!(f, "malformed template markup: {}", e),
            TemplateError::MissingAttribute { property, attribute } => {
                write!(f, "control '{}' is missing the '{}' attribute", property, attribute)
            }
            TemplateError::InvalidValue { property, attribute, value } => {
                write!(f, "control '{}' has invalid {} '{}'", property, attribute, value)
            }
            TemplateError::UnknownKind { property, kind } => {
                write!(f, "control '{}' has unknown type '{}'", property, kind)
            }
            TemplateError::Control(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for TemplateError {}

impl From<quick_xml::Error> for TemplateError {
    fn from(err: quick_xml::Error) -> Self {
        TemplateError::Markup(err)
    }
}

impl From<RegistryError> for TemplateError {
    fn from(err: RegistryError) -> Self {
        TemplateError::Control(err)
    }
}

/// Slice out `<head ...> ... </head>`, or the whole input when there is no head
fn head_region(markup: &str) -> &str {
    let lower = markup.to_ascii_lowercase();
    let Some(start) = lower.find("<head") else {
        return markup;
    };
    let end = lower[start..]
        .find("</head>")
        .map(|i| start + i + "</head>".len())
        .unwrap_or(markup.len());
    &markup[start..end]
}

/// Read the descriptor and control declarations from a template
pub fn extract(markup: &str) -> Result<TemplateDocument, TemplateError> {
    let mut reader = Reader::from_str(head_region(markup));
    reader.config_mut().trim_text(true);
    // HTML void elements (`<meta ...>`) never close
    reader.config_mut().check_end_names = false;

    let mut document = TemplateDocument::default();
    let mut description = String::new();
    let mut author = String::new();
    let mut title: Option<String> = None;
    let mut in_title = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) => {
                let name = e.local_name();
                if name.as_ref().eq_ignore_ascii_case(b"title") {
                    in_title = true;
                    title.get_or_insert_with(String::new);
                } else if name.as_ref().eq_ignore_ascii_case(b"meta") {
                    let attrs = attributes(&e)?;
                    if let Some(property) = attrs.get("property") {
                        document.controls.push(control_from_meta(property, &attrs)?);
                    } else {
                        read_descriptor_meta(&attrs, &mut description, &mut author);
                    }
                }
            }
            Event::Text(text) if in_title => {
                if let Some(title) = title.as_mut() {
                    title.push_str(&text.unescape()?);
                }
            }
            Event::End(e) => {
                if e.local_name().as_ref().eq_ignore_ascii_case(b"title") {
                    in_title = false;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    document.descriptor = title.map(|name| EffectDescriptor {
        name: name.trim().to_string(),
        description,
        author,
    });
    Ok(document)
}

fn attributes(element: &BytesStart<'_>) -> Result<HashMap<String, String>, TemplateError> {
    let mut attrs = HashMap::new();
    for attr in element.html_attributes() {
        let attr = attr.map_err(quick_xml::Error::InvalidAttr)?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).to_ascii_lowercase();
        let value = attr.unescape_value()?.into_owned();
        attrs.insert(key, value);
    }
    Ok(attrs)
}

fn read_descriptor_meta(attrs: &HashMap<String, String>, description: &mut String, author: &mut String) {
    // <meta description="..."/> and <meta name="description" content="..."/>
    if let (Some(name), Some(content)) = (attrs.get("name"), attrs.get("content")) {
        match name.to_ascii_lowercase().as_str() {
            "description" => *description = content.clone(),
            "publisher" | "author" => *author = content.clone(),
            _ => {}
        }
        return;
    }
    if let Some(value) = attrs.get("description") {
        *description = value.clone();
    }
    if let Some(value) = attrs.get("publisher").or_else(|| attrs.get("author")) {
        *author = value.clone();
    }
}

fn control_from_meta(property: &str, attrs: &HashMap<String, String>) -> Result<ControlDefinition, TemplateError> {
    let missing = |attribute: &'static str| TemplateError::MissingAttribute {
        property: property.to_string(),
        attribute,
    };
    let number = |attribute: &'static str| -> Result<Option<f64>, TemplateError> {
        match attrs.get(attribute) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|_| TemplateError::InvalidValue {
                    property: property.to_string(),
                    attribute,
                    value: raw.clone(),
                }),
        }
    };

    let kind_name = attrs.get("type").ok_or_else(|| missing("type"))?;
    let kind = ControlKind::parse(kind_name).ok_or_else(|| TemplateError::UnknownKind {
        property: property.to_string(),
        kind: kind_name.clone(),
    })?;
    let label = attrs.get("label").cloned().unwrap_or_else(|| property.to_string());
    let raw_default = attrs.get("default");

    let (default, bounds, options) = match kind {
        ControlKind::Number | ControlKind::Hue => {
            let (min, max) = match kind {
                ControlKind::Hue => (number("min")?.unwrap_or(0.0), number("max")?.unwrap_or(HUE_MAX)),
                _ => (
                    number("min")?.ok_or_else(|| missing("min"))?,
                    number("max")?.ok_or_else(|| missing("max"))?,
                ),
            };
            let value = number("default")?.ok_or_else(|| missing("default"))?;
            let default = match kind {
                ControlKind::Hue => ControlValue::Hue(value),
                _ => ControlValue::Number(value),
            };
            let bounds = Bounds { min, max, step: number("step")? };
            (default, Some(bounds), None)
        }
        ControlKind::Boolean => {
            let raw = raw_default.ok_or_else(|| missing("default"))?;
            let value = match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => true,
                "false" | "0" => false,
                _ => {
                    return Err(TemplateError::InvalidValue {
                        property: property.to_string(),
                        attribute: "default",
                        value: raw.clone(),
                    })
                }
            };
            (ControlValue::Boolean(value), None, None)
        }
        ControlKind::Enum => {
            let values = attrs.get("values").ok_or_else(|| missing("values"))?;
            let options: Vec<String> = values.split(',').map(|v| v.trim().to_string()).collect();
            let default = raw_default.cloned().or_else(|| options.first().cloned()).unwrap_or_default();
            (ControlValue::Enum(default), None, Some(options))
        }
        ControlKind::Color => {
            let raw = raw_default.ok_or_else(|| missing("default"))?;
            (ControlValue::Color(raw.trim().to_string()), None, None)
        }
        ControlKind::Text => (ControlValue::Text(raw_default.cloned().unwrap_or_default()), None, None),
    };

    let mut spec = ControlSpec::raw(property.to_string(), kind, label, default, bounds, options);
    if let Some(tooltip) = attrs.get("tooltip") {
        spec = spec.tooltip(tooltip.clone());
    }
    Ok(spec.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPARKLE: &str = r##"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Sparkle Field</title>
    <meta description="Random twinkling points"/>
    <meta publisher="lightscript"/>
    <meta property="density" label="Density" type="number" min="1" max="100" step="1" default="40" tooltip="Points per frame"/>
    <meta property="palette" label="Palette" type="combobox" values="Warm, Cool,Mono" default="Cool"/>
    <meta property="trails" label="Trails" type="boolean" default="0"/>
    <meta property="tint" label="Tint" type="color" default="#ffcc00"/>
    <meta property="message" label="Message" type="textfield" default="Hello &amp; welcome"/>
</head>
<body><canvas id="lightscript-canvas"></canvas><script>if (a < b) {}</script></body>
</html>"##;

    #[test]
    fn test_extract_descriptor() {
        let doc = extract(SPARKLE).unwrap();
        let descriptor = doc.descriptor.unwrap();
        assert_eq!(descriptor.name, "Sparkle Field");
        assert_eq!(descriptor.description, "Random twinkling points");
        assert_eq!(descriptor.author, "lightscript");
    }

    #[test]
    fn test_extract_controls_in_order() {
        let doc = extract(SPARKLE).unwrap();
        let ids: Vec<&str> = doc.controls.iter().map(|c| c.id()).collect();
        assert_eq!(ids, ["density", "palette", "trails", "tint", "message"]);

        let density = &doc.controls[0];
        assert_eq!(density.default_value(), &ControlValue::Number(40.0));
        assert_eq!(density.bounds().unwrap().step, Some(1.0));
        assert_eq!(density.tooltip(), Some("Points per frame"));

        let palette = &doc.controls[1];
        assert_eq!(palette.kind(), ControlKind::Enum);
        assert_eq!(palette.options(), ["Warm", "Cool", "Mono"]);
        assert_eq!(palette.default_index(), 1);

        assert_eq!(doc.controls[2].default_value(), &ControlValue::Boolean(false));
        assert_eq!(doc.controls[4].default_value(), &ControlValue::Text("Hello & welcome".into()));
    }

    #[test]
    fn test_missing_type_reported() {
        let err = extract(r#"<head><meta property="x" default="1"/></head>"#).unwrap_err();
        assert!(matches!(err, TemplateError::MissingAttribute { attribute: "type", .. }));
    }

    #[test]
    fn test_unknown_type_reported() {
        let err = extract(r#"<head><meta property="x" type="slider" default="1"/></head>"#).unwrap_err();
        assert!(matches!(err, TemplateError::UnknownKind { .. }));
    }

    #[test]
    fn test_invalid_number_reported() {
        let markup = r#"<head><meta property="x" type="number" min="a" max="2" default="1"/></head>"#;
        let err = extract(markup).unwrap_err();
        assert!(matches!(err, TemplateError::InvalidValue { attribute: "min", .. }));
    }

    #[test]
    fn test_validation_shared_with_builder() {
        let markup = r#"<head><meta property="x" type="number" min="5" max="1" default="3"/></head>"#;
        let err = extract(markup).unwrap_err();
        assert!(matches!(
            err.into_registry_error("X"),
            RegistryError::InvalidControlDefinition { .. }
        ));
    }

    #[test]
    fn test_hue_defaults_to_full_circle() {
        let doc = extract(r#"<head><meta property="h" type="hue" default="120"/></head>"#).unwrap();
        let bounds = doc.controls[0].bounds().unwrap();
        assert_eq!((bounds.min, bounds.max), (0.0, 360.0));
    }

    #[test]
    fn test_no_title_no_descriptor() {
        let doc = extract("<head></head>").unwrap();
        assert!(doc.descriptor.is_none());
        assert!(doc.controls.is_empty());
    }
}
