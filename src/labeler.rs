//! Human-readable labels for modeled objects
//!
//! The labeler assigns a name to every object reachable from a root
//! network: the object's explicit label if set, else the name it was
//! declared under at construction time ([`Model::declare_name`]), else a
//! deterministic textual fallback. Objects inside nested networks get
//! dotted paths (`outer.inner.attr`).
//!
//! Labels are advisory and cosmetic only. They are not guaranteed unique
//! and must never be used as identifiers; the serialized graph identities
//! are the arena ids.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::dispatch::{next_owner_id, DispatchTable, OwnerId};
use crate::error::ConvertError;
use crate::model::{EntityId, Model, ObjectKind};

/// Handler computing labels for one object (and, for containers, its
/// contents).
pub type LabelHandler =
    fn(&InspectiveLabeler, &Model, EntityId) -> Result<HashMap<EntityId, String>, ConvertError>;

/// Class-keyed base table shared by every labeler instance.
static BASE_TABLE: Lazy<Arc<DispatchTable<ObjectKind, LabelHandler>>> = Lazy::new(|| {
    let mut table = DispatchTable::new();
    table
        .register(ObjectKind::Base, label_object as LabelHandler)
        .expect("empty table");
    table
        .register(ObjectKind::Network, label_network as LabelHandler)
        .expect("empty table");
    Arc::new(table)
});

fn label_object(
    _labeler: &InspectiveLabeler,
    model: &Model,
    id: EntityId,
) -> Result<HashMap<EntityId, String>, ConvertError> {
    let name = match model.label(id)? {
        Some(label) => label.to_string(),
        None => match model.declared_name(id) {
            Some(name) => name.to_string(),
            None => model.default_repr(id)?,
        },
    };
    Ok(HashMap::from([(id, name)]))
}

fn label_network(
    labeler: &InspectiveLabeler,
    model: &Model,
    id: EntityId,
) -> Result<HashMap<EntityId, String>, ConvertError> {
    let mut labels = label_object(labeler, model, id)?;
    let own = labels.get(&id).cloned().unwrap_or_default();
    for (child, name) in labeler.labels_in(model, id)? {
        labels.insert(child, format!("{}.{}", own, name));
    }
    Ok(labels)
}

/// Assigns names to every object reachable from a root network.
#[derive(Debug)]
pub struct InspectiveLabeler {
    dispatch: DispatchTable<ObjectKind, LabelHandler>,
    owner: OwnerId,
}

impl InspectiveLabeler {
    pub fn new() -> Self {
        Self {
            dispatch: DispatchTable::with_parent(BASE_TABLE.clone()),
            owner: next_owner_id(),
        }
    }

    /// Labels for `root` itself plus everything it transitively owns.
    ///
    /// The root's own label is not used as a prefix; prefixing starts at
    /// the first nested network level.
    pub fn label_of(
        &self,
        model: &Model,
        root: EntityId,
    ) -> Result<HashMap<EntityId, String>, ConvertError> {
        let mut labels = self.labels_in(model, root)?;
        labels.extend(self.object_label(model, root)?);
        Ok(labels)
    }

    /// Labels for the contents of `net`, excluding `net` itself.
    pub fn labels_in(
        &self,
        model: &Model,
        net: EntityId,
    ) -> Result<HashMap<EntityId, String>, ConvertError> {
        let container = model.network(net)?;
        let members: Vec<EntityId> = container
            .ensembles
            .iter()
            .chain(&container.nodes)
            .chain(&container.probes)
            .chain(&container.connections)
            .chain(&container.networks)
            .copied()
            .collect();

        let mut labels = HashMap::new();
        for id in members {
            let handler = self.dispatch.resolve(self.owner, model.kind(id)?)?;
            labels.extend(handler(self, model, id)?);
        }
        Ok(labels)
    }

    /// Label for a single object, without descending into containers.
    pub fn object_label(
        &self,
        model: &Model,
        id: EntityId,
    ) -> Result<HashMap<EntityId, String>, ConvertError> {
        label_object(self, model, id)
    }

    /// Shadows the class-keyed handler for `kind` on this labeler only.
    pub fn override_handler(&mut self, kind: ObjectKind, handler: LabelHandler) {
        self.dispatch.register_instance(self.owner, kind, handler);
    }
}

impl Default for InspectiveLabeler {
    fn default() -> Self {
        Self::new()
    }
}
