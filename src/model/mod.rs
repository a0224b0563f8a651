//! Network model arena
//!
//! All modeled objects (containers, leaf entities, connections) live in a
//! single append-only arena keyed by [`EntityId`]. Ids are process-unique
//! for the lifetime of the model and double as the serialized node/edge
//! identities: collision-free within one model, deterministic given
//! construction order, and not meaningful across differently-built models.

mod connection;
mod network;

pub use connection::{Connection, Endpoint, LearningRule, Synapse, Transform};
pub use network::{Ensemble, Network, NetworkKind, NeuronType, Node, Probe};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::dispatch::TypeKey;
use crate::error::ModelError;

/// Unique identifier for a modeled object.
pub type EntityId = u64;

/// Any object the model can own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Object {
    Ensemble(Ensemble),
    Node(Node),
    Probe(Probe),
    Network(Network),
    Connection(Connection),
}

/// Type identifier for dispatch over model objects.
///
/// The lattice mirrors the modeled class hierarchy: every kind derives from
/// `Base`, and the composite network kinds derive from `Network`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Base,
    Ensemble,
    Node,
    Probe,
    Network,
    EnsembleArray,
    CircularConvolution,
    Product,
    Connection,
    Neurons,
    LearningRule,
}

impl ObjectKind {
    /// Short name without the module path.
    pub fn name(self) -> &'static str {
        match self {
            ObjectKind::Base => "Object",
            ObjectKind::Ensemble => "Ensemble",
            ObjectKind::Node => "Node",
            ObjectKind::Probe => "Probe",
            ObjectKind::Network => "Network",
            ObjectKind::EnsembleArray => "EnsembleArray",
            ObjectKind::CircularConvolution => "CircularConvolution",
            ObjectKind::Product => "Product",
            ObjectKind::Connection => "Connection",
            ObjectKind::Neurons => "Neurons",
            ObjectKind::LearningRule => "LearningRule",
        }
    }
}

impl TypeKey for ObjectKind {
    fn mro(self) -> &'static [Self] {
        use ObjectKind::*;
        match self {
            Base => &[Base],
            Ensemble => &[Ensemble, Base],
            Node => &[Node, Base],
            Probe => &[Probe, Base],
            Network => &[Network, Base],
            EnsembleArray => &[EnsembleArray, Network, Base],
            CircularConvolution => &[CircularConvolution, Network, Base],
            Product => &[Product, Network, Base],
            Connection => &[Connection, Base],
            Neurons => &[Neurons, Base],
            LearningRule => &[LearningRule, Base],
        }
    }

    fn type_name(self) -> &'static str {
        match self {
            ObjectKind::Base => concat!(module_path!(), "::Object"),
            ObjectKind::Ensemble => concat!(module_path!(), "::Ensemble"),
            ObjectKind::Node => concat!(module_path!(), "::Node"),
            ObjectKind::Probe => concat!(module_path!(), "::Probe"),
            ObjectKind::Network => concat!(module_path!(), "::Network"),
            ObjectKind::EnsembleArray => concat!(module_path!(), "::EnsembleArray"),
            ObjectKind::CircularConvolution => {
                concat!(module_path!(), "::CircularConvolution")
            }
            ObjectKind::Product => concat!(module_path!(), "::Product"),
            ObjectKind::Connection => concat!(module_path!(), "::Connection"),
            ObjectKind::Neurons => concat!(module_path!(), "::Neurons"),
            ObjectKind::LearningRule => concat!(module_path!(), "::LearningRule"),
        }
    }
}

impl NetworkKind {
    /// The dispatch kind for a network of this kind.
    pub fn object_kind(self) -> ObjectKind {
        match self {
            NetworkKind::Plain => ObjectKind::Network,
            NetworkKind::EnsembleArray => ObjectKind::EnsembleArray,
            NetworkKind::CircularConvolution => ObjectKind::CircularConvolution,
            NetworkKind::Product => ObjectKind::Product,
        }
    }
}

/// Arena owning every modeled object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Model {
    objects: HashMap<EntityId, Object>,
    declared_names: HashMap<EntityId, String>,
    next_id: EntityId,
}

impl Model {
    /// Creates an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, object: Object) -> EntityId {
        let id = self.next_id;
        self.objects.insert(id, object);
        self.next_id += 1;
        id
    }

    fn network_mut(&mut self, id: EntityId) -> Result<&mut Network, ModelError> {
        match self.objects.get_mut(&id) {
            Some(Object::Network(net)) => Ok(net),
            Some(_) => Err(ModelError::WrongKind {
                id,
                expected: "Network",
            }),
            None => Err(ModelError::UnknownObject(id)),
        }
    }

    /// Adds a network; `parent` is `None` for a root network.
    pub fn add_network(
        &mut self,
        parent: Option<EntityId>,
        net: Network,
    ) -> Result<EntityId, ModelError> {
        if let Some(parent) = parent {
            self.network(parent)?;
        }
        let id = self.insert(Object::Network(net));
        if let Some(parent) = parent {
            self.network_mut(parent)?.networks.push(id);
        }
        Ok(id)
    }

    /// Adds an ensemble to `parent`.
    pub fn add_ensemble(
        &mut self,
        parent: EntityId,
        ens: Ensemble,
    ) -> Result<EntityId, ModelError> {
        self.network(parent)?;
        let id = self.insert(Object::Ensemble(ens));
        self.network_mut(parent)?.ensembles.push(id);
        Ok(id)
    }

    /// Adds a passthrough node to `parent`.
    pub fn add_node(&mut self, parent: EntityId, node: Node) -> Result<EntityId, ModelError> {
        self.network(parent)?;
        let id = self.insert(Object::Node(node));
        self.network_mut(parent)?.nodes.push(id);
        Ok(id)
    }

    /// Adds a probe to `parent`.
    pub fn add_probe(&mut self, parent: EntityId, probe: Probe) -> Result<EntityId, ModelError> {
        self.network(parent)?;
        self.check_endpoint(&probe.target)?;
        let id = self.insert(Object::Probe(probe));
        self.network_mut(parent)?.probes.push(id);
        Ok(id)
    }

    /// Adds a connection to `parent`. Both endpoints must refer to existing
    /// objects of the appropriate kind; they may live anywhere in the tree.
    pub fn add_connection(
        &mut self,
        parent: EntityId,
        conn: Connection,
    ) -> Result<EntityId, ModelError> {
        self.network(parent)?;
        self.check_endpoint(&conn.pre)?;
        self.check_endpoint(&conn.post)?;
        let id = self.insert(Object::Connection(conn));
        self.network_mut(parent)?.connections.push(id);
        Ok(id)
    }

    fn check_endpoint(&self, endpoint: &Endpoint) -> Result<(), ModelError> {
        match endpoint {
            Endpoint::Entity(id) => self.object(*id).map(|_| ()),
            Endpoint::Neurons(id) => self.ensemble(*id).map(|_| ()),
            Endpoint::LearningRule(id) => self.connection(*id).map(|_| ()),
        }
    }

    /// Records the name the object was bound to at construction time.
    ///
    /// Declared names feed the labeler; they are advisory and never used as
    /// identifiers.
    pub fn declare_name(
        &mut self,
        id: EntityId,
        name: impl Into<String>,
    ) -> Result<(), ModelError> {
        self.object(id)?;
        self.declared_names.insert(id, name.into());
        Ok(())
    }

    pub fn object(&self, id: EntityId) -> Result<&Object, ModelError> {
        self.objects.get(&id).ok_or(ModelError::UnknownObject(id))
    }

    /// The runtime kind of an object.
    pub fn kind(&self, id: EntityId) -> Result<ObjectKind, ModelError> {
        Ok(match self.object(id)? {
            Object::Ensemble(_) => ObjectKind::Ensemble,
            Object::Node(_) => ObjectKind::Node,
            Object::Probe(_) => ObjectKind::Probe,
            Object::Network(net) => net.kind.object_kind(),
            Object::Connection(_) => ObjectKind::Connection,
        })
    }

    pub fn ensemble(&self, id: EntityId) -> Result<&Ensemble, ModelError> {
        match self.object(id)? {
            Object::Ensemble(ens) => Ok(ens),
            _ => Err(ModelError::WrongKind {
                id,
                expected: "Ensemble",
            }),
        }
    }

    pub fn node(&self, id: EntityId) -> Result<&Node, ModelError> {
        match self.object(id)? {
            Object::Node(node) => Ok(node),
            _ => Err(ModelError::WrongKind { id, expected: "Node" }),
        }
    }

    pub fn probe(&self, id: EntityId) -> Result<&Probe, ModelError> {
        match self.object(id)? {
            Object::Probe(probe) => Ok(probe),
            _ => Err(ModelError::WrongKind {
                id,
                expected: "Probe",
            }),
        }
    }

    pub fn network(&self, id: EntityId) -> Result<&Network, ModelError> {
        match self.object(id)? {
            Object::Network(net) => Ok(net),
            _ => Err(ModelError::WrongKind {
                id,
                expected: "Network",
            }),
        }
    }

    pub fn connection(&self, id: EntityId) -> Result<&Connection, ModelError> {
        match self.object(id)? {
            Object::Connection(conn) => Ok(conn),
            _ => Err(ModelError::WrongKind {
                id,
                expected: "Connection",
            }),
        }
    }

    /// The object's explicit, user-assigned label.
    pub fn label(&self, id: EntityId) -> Result<Option<&str>, ModelError> {
        Ok(match self.object(id)? {
            Object::Ensemble(ens) => ens.label.as_deref(),
            Object::Node(node) => node.label.as_deref(),
            Object::Probe(probe) => probe.label.as_deref(),
            Object::Network(net) => net.label.as_deref(),
            Object::Connection(conn) => conn.label.as_deref(),
        })
    }

    /// The name the object was declared under at construction time, if any.
    pub fn declared_name(&self, id: EntityId) -> Option<&str> {
        self.declared_names.get(&id).map(String::as_str)
    }

    /// Deterministic textual fallback for unnamed objects.
    pub fn default_repr(&self, id: EntityId) -> Result<String, ModelError> {
        Ok(format!("<{} (unlabeled) id={}>", self.kind(id)?.name(), id))
    }

    /// Every connection reachable from `root`, enumerated flat: a network's
    /// own connections first, then its sub-networks in order, depth first.
    pub fn all_connections(&self, root: EntityId) -> Result<Vec<EntityId>, ModelError> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let net = self.network(id)?;
            out.extend(net.connections.iter().copied());
            for &sub in net.networks.iter().rev() {
                stack.push(sub);
            }
        }
        Ok(out)
    }

    /// Every object transitively owned by `net`, including probes,
    /// connections, and nested networks themselves.
    pub fn descendants(&self, net: EntityId) -> Result<Vec<EntityId>, ModelError> {
        let mut out = Vec::new();
        let mut stack = vec![net];
        while let Some(id) = stack.pop() {
            let net = self.network(id)?;
            out.extend(net.ensembles.iter().copied());
            out.extend(net.nodes.iter().copied());
            out.extend(net.probes.iter().copied());
            out.extend(net.connections.iter().copied());
            out.extend(net.networks.iter().copied());
            for &sub in net.networks.iter().rev() {
                stack.push(sub);
            }
        }
        Ok(out)
    }

    /// Total neuron count over all ensembles transitively owned by `net`.
    pub fn total_neurons(&self, net: EntityId) -> Result<u64, ModelError> {
        let mut total = 0u64;
        let mut stack = vec![net];
        while let Some(id) = stack.pop() {
            let net = self.network(id)?;
            for &ens in &net.ensembles {
                total += u64::from(self.ensemble(ens)?.n_neurons);
            }
            stack.extend(net.networks.iter().copied());
        }
        Ok(total)
    }

    /// Number of objects in the arena.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
