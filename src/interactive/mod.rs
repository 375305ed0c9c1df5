//! Interactive visualization module for real-time shadow testing

mod viewer;

pub use viewer::{InteractiveViewer, ViewerConfig};
