//! Headless pipeline-graph editor: node catalog, graph commands, parameter
//! configs, selection, and the snapshot, reversed-script and execution
//! export formats.

pub mod catalog;
pub mod config;
pub mod editor;
pub mod error;
pub mod export;
pub mod graph;
pub mod io;
pub mod logging;
pub mod param_type;
pub mod params;
pub mod reversed;
pub mod selection;
pub mod snapshot;
pub mod types;

pub use catalog::{NodeCatalog, NodeStructure};
pub use editor::EditorState;
pub use error::EditorError;
pub use export::ExecutionConfig;
pub use reversed::ReversedScript;
pub use snapshot::UiSnapshot;
