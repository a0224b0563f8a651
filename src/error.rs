//! Error types for dispatch, model construction, and conversion

use thiserror::Error;

use crate::model::EntityId;

/// Errors raised by [`DispatchTable`](crate::dispatch::DispatchTable)
/// registration and resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// A class-keyed handler was registered twice in the same table.
    ///
    /// Shadowing a handler inherited from a parent table is allowed; this
    /// only fires for a second registration in one table.
    #[error("type {type_name} is already registered in this dispatch table")]
    DuplicateRegistration { type_name: &'static str },

    /// No handler was found anywhere in the table chain for the object's
    /// runtime type or any of its ancestors.
    #[error("nothing to dispatch to for type {type_name}")]
    NoHandler { type_name: &'static str },
}

/// Errors raised by [`Model`](crate::model::Model) builders and accessors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// The id does not refer to any object in the model.
    #[error("object {0} does not exist in the model")]
    UnknownObject(EntityId),

    /// The id refers to an object of a different kind than required.
    #[error("object {id} is not a {expected}")]
    WrongKind { id: EntityId, expected: &'static str },
}

/// Errors aborting a conversion pass. Partial documents are never returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvertError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Model(#[from] ModelError),
}
