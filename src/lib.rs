//! gexport - GEXF graph document export for spiking network models
//!
//! The crate walks a network model (containers, leaf entities, and the
//! connections between them) and emits a GEXF graph document. Handler
//! selection runs through a chainable, type-keyed dispatch table with
//! per-instance overrides, so converters can be specialized without
//! touching the shared registries.

// Core modules
pub mod dispatch;
pub mod error;
pub mod gexf;
pub mod labeler;
pub mod model;
pub mod xml;

// Re-export core types
pub use dispatch::{next_owner_id, DispatchTable, OwnerId, TypeKey};
pub use error::{ConvertError, DispatchError, ModelError};
pub use gexf::{
    CollapsingGexfConverter, ConvertHandler, GexfConverter, GraphContext, DEFAULT_COLLAPSE,
};
pub use labeler::{InspectiveLabeler, LabelHandler};
pub use model::{
    Connection, Endpoint, Ensemble, EntityId, LearningRule, Model, Network, NetworkKind,
    NeuronType, Node, Object, ObjectKind, Probe, Synapse, Transform,
};
pub use xml::{Element, XmlDocument};
