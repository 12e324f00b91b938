//! Control panel interface
//!
//! The host re-renders the panel from the active effect's definitions and
//! current values; the panel reports edits back through
//! [`LightscriptHost::on_control_change`](super::LightscriptHost::on_control_change).

use std::cell::RefCell;
use std::rc::Rc;

use crate::controls::{ControlDefinition, ControlKind, ControlValue, ControlValues, EffectDescriptor};

/// Presentation surface for an effect's controls
pub trait ControlPanel {
    /// Replace the panel contents
    fn render(&mut self, descriptor: &EffectDescriptor, controls: &[ControlDefinition], values: &ControlValues);

    /// Show a user-facing message
    fn notify(&mut self, message: &str);

    /// Remove all controls
    fn clear(&mut self);
}

/// One rendered control
#[derive(Debug, Clone, PartialEq)]
pub struct PanelRow {
    pub id: String,
    pub label: String,
    pub kind: ControlKind,
    pub value: ControlValue,
    pub tooltip: Option<String>,
}

/// In-memory panel state
#[derive(Debug, Clone, Default)]
pub struct PanelModel {
    pub descriptor: Option<EffectDescriptor>,
    pub rows: Vec<PanelRow>,
    pub notifications: Vec<String>,
    /// Number of full renders
    pub renders: u64,
}

impl PanelModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row(&self, id: &str) -> Option<&PanelRow> {
        self.rows.iter().find(|r| r.id == id)
    }
}

impl ControlPanel for PanelModel {
    fn render(&mut self, descriptor: &EffectDescriptor, controls: &[ControlDefinition], values: &ControlValues) {
        self.descriptor = Some(descriptor.clone());
        self.rows = controls
            .iter()
            .map(|c| PanelRow {
                id: c.id().to_string(),
                label: c.label().to_string(),
                kind: c.kind(),
                value: values.get(c.id()).cloned().unwrap_or_else(|| c.default_value().clone()),
                tooltip: c.tooltip().map(str::to_string),
            })
            .collect();
        self.renders += 1;
    }

    fn notify(&mut self, message: &str) {
        self.notifications.push(message.to_string());
    }

    fn clear(&mut self) {
        self.descriptor = None;
        self.rows.clear();
    }
}

/// Shared handle, so the panel can be inspected while the host owns it
impl ControlPanel for Rc<RefCell<PanelModel>> {
    fn render(&mut self, descriptor: &EffectDescriptor, controls: &[ControlDefinition], values: &ControlValues) {
        self.borrow_mut().render(descriptor, controls, values);
    }

    fn notify(&mut self, message: &str) {
        self.borrow_mut().notify(message);
    }

    fn clear(&mut self) {
        self.borrow_mut().clear();
    }
}

/// Panel that writes to the log, for headless runs
#[derive(Debug, Default)]
pub struct LogPanel;

impl ControlPanel for LogPanel {
    fn render(&mut self, descriptor: &EffectDescriptor, controls: &[ControlDefinition], values: &ControlValues) {
        tracing::info!(effect = %descriptor.name, controls = controls.len(), "Control panel rendered");
        for control in controls {
            tracing::info!(
                control = control.id(),
                kind = %control.kind(),
                value = ?values.get(control.id()),
                "  {}",
                control.label()
            );
        }
    }

    fn notify(&mut self, message: &str) {
        tracing::warn!("{}", message);
    }

    fn clear(&mut self) {
        tracing::debug!("Control panel cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::ControlSpec;

    #[test]
    fn test_panel_model_render_and_clear() {
        let controls = vec![
            ControlSpec::number("speed", "Speed", 5.0, 1.0, 10.0).tooltip("fast").build().unwrap(),
            ControlSpec::boolean("glow", "Glow", true).build().unwrap(),
        ];
        let mut values = ControlValues::from_defaults(&controls);
        values.set("speed", ControlValue::Number(7.0));

        let mut panel = PanelModel::new();
        panel.render(&EffectDescriptor::fallback("Test"), &controls, &values);
        assert_eq!(panel.rows.len(), 2);
        assert_eq!(panel.row("speed").unwrap().value, ControlValue::Number(7.0));
        assert_eq!(panel.row("speed").unwrap().tooltip.as_deref(), Some("fast"));
        assert_eq!(panel.renders, 1);

        panel.clear();
        assert!(panel.rows.is_empty());
        assert!(panel.descriptor.is_none());
    }
}
