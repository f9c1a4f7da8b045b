//! Client-side state for browsing and editing an opening repertoire.

pub mod api;
pub mod controller;
pub mod drag;
pub mod error;
pub mod list;
pub mod reorder;
pub mod selection;

pub use api::{ApiFailure, HttpRepertoireApi, RepertoireApi};
pub use controller::{ActionOutcome, PendingAction, RepertoireController, ViewMode, ViewerMode};
pub use error::{UiError, UiErrorCategory};
pub use list::{DragItem, OrderedHierarchicalList, Partition, ReorderCommit};
pub use selection::{is_effectively_selected, DeleteDispatch, SelectionCoordinator};

#[cfg(test)]
#[path = "tests/fixtures.rs"]
mod fixtures;
