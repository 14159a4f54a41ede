//! Display agent and surface inspection.

mod agent;
mod status;
mod surface;

pub use agent::{partition, DisplayAgent, DisplayState, Lifecycle};
pub use status::{Indicator, StatusReport};
pub use surface::{
    observed_classes, selector_classes, stylesheet_selectors, HtmlSurface, Inspection,
    StaticSurface, StyleSource, Surface,
};
