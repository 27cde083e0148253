mod engine;
mod registry;

pub use engine::{ProcessReconciler, ReconcilerSettings};
pub use registry::ProcessRegistry;
