//! Host side of the framework
//!
//! [`LightscriptHost`] loads lightscripts from the catalog, owns the global
//! control store and routes control-panel edits into the running effect.

mod engine;
mod panel;

pub use engine::{HostConfig, HostError, LightscriptHost};
pub use panel::{ControlPanel, LogPanel, PanelModel, PanelRow};
