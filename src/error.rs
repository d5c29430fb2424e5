// src/error.rs
//
// Errors raised while building an instrument. The audio path has none.

use std::fmt;

use crate::graph::GraphError;
use crate::state::SettingsError;

/// Failure while wiring layers and stages into a graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    Graph(GraphError),
    Settings(SettingsError),
    /// An instrument needs at least one layer.
    NoLayers,
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::Graph(e) => write!(f, "Graph error: {}", e),
            BuildError::Settings(e) => write!(f, "Settings error: {}", e),
            BuildError::NoLayers => write!(f, "Instrument has no layers"),
        }
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BuildError::Graph(e) => Some(e),
            BuildError::Settings(e) => Some(e),
            BuildError::NoLayers => None,
        }
    }
}

impl From<GraphError> for BuildError {
    fn from(e: GraphError) -> Self {
        BuildError::Graph(e)
    }
}

impl From<SettingsError> for BuildError {
    fn from(e: SettingsError) -> Self {
        BuildError::Settings(e)
    }
}
