//! Containers and leaf entities of the network model

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Endpoint, EntityId};

/// Neuron model of an [`Ensemble`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NeuronType {
    #[default]
    Lif,
    LifRate,
    RectifiedLinear,
}

impl fmt::Display for NeuronType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NeuronType::Lif => write!(f, "LIF()"),
            NeuronType::LifRate => write!(f, "LIFRate()"),
            NeuronType::RectifiedLinear => write!(f, "RectifiedLinear()"),
        }
    }
}

/// A population of neurons representing a vector value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ensemble {
    pub label: Option<String>,
    pub n_neurons: u32,
    pub dimensions: u32,
    pub radius: f64,
    pub neuron_type: NeuronType,
}

impl Ensemble {
    /// Creates an ensemble of `n_neurons` neurons representing a
    /// `dimensions`-dimensional value.
    pub fn new(n_neurons: u32, dimensions: u32) -> Self {
        Self {
            label: None,
            n_neurons,
            dimensions,
            radius: 1.0,
            neuron_type: NeuronType::default(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = radius;
        self
    }

    pub fn with_neuron_type(mut self, neuron_type: NeuronType) -> Self {
        self.neuron_type = neuron_type;
        self
    }
}

/// A non-neural passthrough entity: an input stimulus, output sink, or
/// arbitrary function of its input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub label: Option<String>,
    pub size_in: u32,
    pub size_out: u32,
}

impl Node {
    pub fn new(size_in: u32, size_out: u32) -> Self {
        Self {
            label: None,
            size_in,
            size_out,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// A monitor recording data from an entity. Probes have no graph
/// representation; converters skip them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Probe {
    pub label: Option<String>,
    pub target: Endpoint,
}

impl Probe {
    pub fn new(target: impl Into<Endpoint>) -> Self {
        Self {
            label: None,
            target: target.into(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Distinguishes plain containers from the built-in composite network
/// kinds that a collapsing converter can render as a single node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkKind {
    #[default]
    Plain,
    EnsembleArray,
    CircularConvolution,
    Product,
}

/// A container owning leaf entities, connections, and nested containers.
///
/// Entities have no back-pointer to their connections; connections are
/// enumerated globally from the root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Network {
    pub label: Option<String>,
    pub kind: NetworkKind,
    pub ensembles: Vec<EntityId>,
    pub nodes: Vec<EntityId>,
    pub probes: Vec<EntityId>,
    pub networks: Vec<EntityId>,
    pub connections: Vec<EntityId>,
}

impl Network {
    /// Creates an empty plain network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty network of the given kind.
    pub fn of_kind(kind: NetworkKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}
