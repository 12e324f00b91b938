//! Host engine
//!
//! Owns the catalog, the global control store, the frame scheduler, the
//! rendering surfaces and the control panel, and mediates between them:
//! loading (hot-swapping) effects, routing panel edits into the store and
//! dispatching frame callbacks.

use std::time::{Duration, Instant};

use crate::controls::bridge::{clear_owned_keys, resolve, to_wire, write_defaults};
use crate::controls::registry::{controls_by_key, descriptor_by_key};
use crate::controls::{ControlDefinition, ControlStore, ControlValue, ControlValues, EffectDescriptor, RegistryError};
use crate::effects::{
    EffectCatalog, EffectLifecycle, EffectSummary, FrameHandle, FrameScheduler, InstanceId, LifecycleConfig,
    LifecycleState, ManualScheduler, RenderEnv, Surface, SurfaceSet, DEFAULT_SAMPLE_INTERVAL, SURFACE_ID,
};
use crate::settings::HostPreferences;

use super::panel::ControlPanel;

/// Errors surfaced to the host's caller
#[derive(Debug, Clone, PartialEq)]
pub enum HostError {
    /// No lightscript with this id is registered
    EffectNotFound(String),
    /// The operation needs a loaded effect
    NoActiveEffect,
    /// The active effect declares no control with this id
    UnknownControl(String),
    /// The effect's class declaration is invalid
    Registry(RegistryError),
}

impl std::fmt::Display for HostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostError::EffectNotFound(id) => write!(f, "lightscript '{}' not found", id),
            HostError::NoActiveEffect => write!(f, "no lightscript is loaded"),
            HostError::UnknownControl(id) => write!(f, "the active lightscript has no control '{}'", id),
            HostError::Registry(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for HostError {}

impl From<RegistryError> for HostError {
    fn from(err: RegistryError) -> Self {
        HostError::Registry(err)
    }
}

/// Runtime host settings
#[derive(Debug, Clone, PartialEq)]
pub struct HostConfig {
    pub surface_id: String,
    pub width: u32,
    pub height: u32,
    pub sample_interval: Duration,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            surface_id: SURFACE_ID.to_string(),
            width: 320,
            height: 200,
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
        }
    }
}

impl HostConfig {
    pub fn from_preferences(prefs: &HostPreferences) -> Self {
        Self {
            surface_id: SURFACE_ID.to_string(),
            width: prefs.surface_width,
            height: prefs.surface_height,
            sample_interval: Duration::from_millis(prefs.control_sample_interval_ms),
        }
    }

    fn lifecycle_config(&self) -> LifecycleConfig {
        LifecycleConfig {
            surface_id: self.surface_id.clone(),
            width: self.width,
            height: self.height,
            sample_interval: self.sample_interval,
        }
    }
}

struct ActiveEffect {
    effect_id: String,
    lifecycle: EffectLifecycle,
    values: ControlValues,
    descriptor: EffectDescriptor,
}

impl ActiveEffect {
    /// Adopt what the effect last read from the store, re-rendering the
    /// panel when that differs from what it shows
    fn sync_values(&mut self, panel: &mut dyn ControlPanel, applied_before: u64) {
        if self.lifecycle.applied_updates() == applied_before || self.lifecycle.applied_values() == &self.values {
            return;
        }
        self.values = self.lifecycle.applied_values().clone();
        panel.render(&self.descriptor, self.lifecycle.controls(), &self.values);
    }
}

/// The host side of the lightscript framework
pub struct LightscriptHost {
    catalog: EffectCatalog,
    store: Box<dyn ControlStore>,
    scheduler: ManualScheduler,
    surfaces: SurfaceSet,
    panel: Box<dyn ControlPanel>,
    active: Option<ActiveEffect>,
    /// Instance receiving `update()` calls
    update_target: Option<InstanceId>,
    /// Host-tracked frame for a deferred panel refresh
    panel_frame: Option<FrameHandle>,
    next_instance: u64,
    config: HostConfig,
}

impl LightscriptHost {
    pub fn new(
        catalog: EffectCatalog,
        store: Box<dyn ControlStore>,
        panel: Box<dyn ControlPanel>,
        config: HostConfig,
    ) -> Self {
        Self {
            catalog,
            store,
            scheduler: ManualScheduler::new(),
            surfaces: SurfaceSet::new(),
            panel,
            active: None,
            update_target: None,
            panel_frame: None,
            next_instance: 0,
            config,
        }
    }

    pub fn catalog(&self) -> &EffectCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn ControlStore {
        self.store.as_ref()
    }

    /// Direct store access; follow writes with [`update`](Self::update)
    pub fn store_mut(&mut self) -> &mut dyn ControlStore {
        self.store.as_mut()
    }

    pub fn scheduler(&self) -> &ManualScheduler {
        &self.scheduler
    }

    pub fn surface(&self) -> Option<&Surface> {
        self.surfaces.get(&self.config.surface_id)
    }

    pub fn update_target(&self) -> Option<InstanceId> {
        self.update_target
    }

    pub fn active_effect(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.effect_id.as_str())
    }

    pub fn active_instance(&self) -> Option<InstanceId> {
        self.active.as_ref().map(|a| a.lifecycle.instance())
    }

    pub fn active_state(&self) -> Option<LifecycleState> {
        self.active.as_ref().map(|a| a.lifecycle.state())
    }

    /// Current values of the active effect
    pub fn values(&self) -> Option<&ControlValues> {
        self.active.as_ref().map(|a| &a.values)
    }

    pub fn active_controls(&self) -> &[ControlDefinition] {
        self.active.as_ref().map(|a| a.lifecycle.controls()).unwrap_or(&[])
    }

    /// Number of times the active effect has applied its controls
    pub fn applied_updates(&self) -> u64 {
        self.active.as_ref().map(|a| a.lifecycle.applied_updates()).unwrap_or(0)
    }

    /// Discovery listing of every registered lightscript
    pub fn available_effects(&self) -> Vec<EffectSummary> {
        self.catalog.summaries()
    }

    /// Declared controls of a lightscript without loading it
    pub fn preview_controls(&self, effect_id: &str) -> Result<Vec<ControlDefinition>, HostError> {
        self.catalog
            .controls(effect_id)
            .ok_or_else(|| HostError::EffectNotFound(effect_id.to_string()))
    }

    /// Load a lightscript, replacing the active one
    ///
    /// An unknown id is reported to the panel and returned as an error; the
    /// active effect keeps running. Otherwise, in order: stop the previous
    /// lifecycle, cancel the host's pending frame, delete the previous
    /// effect's store keys, recreate the surface when the new renderer family
    /// needs a fresh context, initialize the new effect, re-render the panel.
    pub async fn load(&mut self, effect_id: &str, now: Instant) -> Result<(), HostError> {
        let Some(definition) = self.catalog.get(effect_id) else {
            let err = HostError::EffectNotFound(effect_id.to_string());
            tracing::warn!(effect = effect_id, "Lightscript not found");
            self.panel.notify(&err.to_string());
            return Err(err);
        };
        definition.describe()?;

        let class = definition.effect_class();
        let controls = controls_by_key(class);
        let descriptor = descriptor_by_key(class);
        let previous = self.active.as_ref().map(|a| a.effect_id.clone());

        if let Some(mut old) = self.active.take() {
            old.lifecycle.stop(&mut self.scheduler, &mut self.update_target);
            if let Some(handle) = self.panel_frame.take() {
                self.scheduler.cancel_frame(handle);
            }
            let removed = clear_owned_keys(self.store.as_mut(), old.lifecycle.controls());
            tracing::debug!(effect = %old.effect_id, removed, "Previous lightscript unloaded");
        } else if let Some(handle) = self.panel_frame.take() {
            self.scheduler.cancel_frame(handle);
        }

        let family = definition.family();
        if family.requires_fresh_context() && self.surfaces.get(&self.config.surface_id).is_some() {
            if let Err(e) = self
                .surfaces
                .recreate(&self.config.surface_id, self.config.width, self.config.height)
            {
                tracing::warn!(error = %e, "Surface recreation failed");
            }
        }

        self.next_instance += 1;
        let instance = InstanceId(self.next_instance);
        let mut lifecycle = EffectLifecycle::new(
            instance,
            definition.create(),
            controls.clone(),
            self.config.lifecycle_config(),
        );
        let env = RenderEnv {
            store: self.store.as_mut(),
            scheduler: &mut self.scheduler,
            surfaces: &mut self.surfaces,
            update_target: &mut self.update_target,
        };
        lifecycle.initialize(env, now).await;

        let values = ControlValues::from_defaults(&controls);
        self.panel.render(&descriptor, &controls, &values);

        tracing::info!(
            from = previous.as_deref().unwrap_or("none"),
            to = effect_id,
            %instance,
            family = %family,
            state = lifecycle.state().as_str(),
            "Lightscript loaded"
        );

        self.active = Some(ActiveEffect {
            effect_id: effect_id.to_string(),
            lifecycle,
            values,
            descriptor,
        });
        Ok(())
    }

    /// Stop the active effect and remove its keys
    pub fn unload(&mut self) -> Result<(), HostError> {
        let mut old = self.active.take().ok_or(HostError::NoActiveEffect)?;
        old.lifecycle.stop(&mut self.scheduler, &mut self.update_target);
        if let Some(handle) = self.panel_frame.take() {
            self.scheduler.cancel_frame(handle);
        }
        clear_owned_keys(self.store.as_mut(), old.lifecycle.controls());
        self.panel.clear();
        tracing::info!(effect = %old.effect_id, "Lightscript unloaded");
        Ok(())
    }

    /// Panel edit path: record the value, write the store, non-forced update
    pub fn on_control_change(&mut self, id: &str, value: ControlValue, now: Instant) -> Result<(), HostError> {
        let active = self.active.as_mut().ok_or(HostError::NoActiveEffect)?;
        let definition = active
            .lifecycle
            .controls()
            .iter()
            .find(|c| c.id() == id)
            .ok_or_else(|| HostError::UnknownControl(id.to_string()))?;

        let wire = to_wire(&value);
        let typed = resolve(definition, Some(&wire));
        active.values.set(id, typed);
        self.store.set(id, wire);
        let before = active.lifecycle.applied_updates();
        active.lifecycle.update(false, self.store.as_ref(), now);
        active.sync_values(self.panel.as_mut(), before);
        Ok(())
    }

    /// Restore every control's default and force an update
    pub fn reset_to_defaults(&mut self, now: Instant) -> Result<(), HostError> {
        let active = self.active.as_mut().ok_or(HostError::NoActiveEffect)?;
        write_defaults(self.store.as_mut(), active.lifecycle.controls());
        active.values.reset(active.lifecycle.controls());
        active.lifecycle.update(true, self.store.as_ref(), now);
        self.panel
            .render(&active.descriptor, active.lifecycle.controls(), &active.values);
        tracing::debug!(effect = %active.effect_id, "Controls reset to defaults");
        Ok(())
    }

    /// Host update contract: re-read the store into the update target
    ///
    /// Safe to call before any effect is loaded and at any rate; returns
    /// whether controls were applied now.
    pub fn update(&mut self, force: bool, now: Instant) -> bool {
        let Some(target) = self.update_target else {
            return false;
        };
        match self.active.as_mut() {
            Some(active) if active.lifecycle.instance() == target => {
                let before = active.lifecycle.applied_updates();
                let applied = active.lifecycle.update(force, self.store.as_ref(), now);
                active.sync_values(self.panel.as_mut(), before);
                applied
            }
            _ => false,
        }
    }

    /// Re-render the panel on the next tick
    pub fn request_panel_refresh(&mut self) {
        if self.panel_frame.is_none() {
            self.panel_frame = Some(self.scheduler.request_frame());
        }
    }

    /// Dispatch due frames; returns how many effect frames were drawn
    pub fn tick(&mut self, now: Instant) -> usize {
        let mut drawn = 0;
        for handle in self.scheduler.take_due(now) {
            if self.panel_frame == Some(handle) {
                self.panel_frame = None;
                if let Some(active) = &self.active {
                    self.panel
                        .render(&active.descriptor, active.lifecycle.controls(), &active.values);
                }
                continue;
            }
            let Some(active) = self.active.as_mut() else {
                continue;
            };
            let env = RenderEnv {
                store: self.store.as_mut(),
                scheduler: &mut self.scheduler,
                surfaces: &mut self.surfaces,
                update_target: &mut self.update_target,
            };
            let before = active.lifecycle.applied_updates();
            if active.lifecycle.on_frame(handle, now, env) {
                drawn += 1;
            }
            active.sync_values(self.panel.as_mut(), before);
        }
        drawn
    }
}
