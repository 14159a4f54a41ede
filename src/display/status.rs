//! Presentation-neutral status view of a display agent.

use std::fmt;

use super::agent::DisplayState;

/// Traffic-light indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    /// A pass is running.
    Pending,
    /// No invalid identifiers.
    Healthy,
    /// At least one invalid identifier.
    Failing,
}

impl Indicator {
    fn glyph(self) -> &'static str {
        match self {
            Self::Pending => "…",
            Self::Healthy => "●",
            Self::Failing => "○",
        }
    }
}

/// Everything a front end needs to render the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub indicator: Indicator,
    pub summary: String,
    pub counts: String,
    pub missing: Vec<String>,
    pub last_checked: Option<String>,
    pub message: String,
    pub visible: bool,
}

impl StatusReport {
    /// Render `state`.
    #[must_use]
    pub fn from_state(state: &DisplayState) -> Self {
        let invalid = state.invalid.len();

        let indicator = if state.checking {
            Indicator::Pending
        } else if invalid == 0 {
            Indicator::Healthy
        } else {
            Indicator::Failing
        };

        let summary = match invalid {
            0 => "✓ All classes are valid".to_string(),
            1 => "✗ 1 invalid class".to_string(),
            n => format!("✗ {n} invalid classes"),
        };

        Self {
            indicator,
            summary,
            counts: format!("{}/{} valid", state.valid.len(), state.registry.classes.len()),
            missing: state.invalid.iter().cloned().collect(),
            last_checked: state
                .last_checked
                .map(|at| at.with_timezone(&chrono::Local).format("%H:%M:%S").to_string()),
            message: state.message.clone(),
            visible: state.visible,
        }
    }
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Classes", self.indicator.glyph())?;
        if !self.visible {
            return Ok(());
        }

        write!(f, "\n{}\n{}", self.summary, self.counts)?;
        if !self.missing.is_empty() {
            write!(f, "\nMissing classes:")?;
            for class in &self.missing {
                write!(f, "\n  {class}")?;
            }
        }
        if let Some(at) = &self.last_checked {
            write!(f, "\nLast checked: {at}")?;
        }
        write!(f, "\n{}", self.message)
    }
}
