//! Connections between entities and their endpoint forms

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{EntityId, Model, ObjectKind};
use crate::error::ModelError;

/// One end of a connection.
///
/// Besides plain entities, a connection may attach to the neuron population
/// of an ensemble or to the learning rule of another connection; converters
/// resolve both to an effective entity when emitting edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Endpoint {
    /// A leaf entity or network.
    Entity(EntityId),
    /// The neuron population of the given ensemble.
    Neurons(EntityId),
    /// The learning rule of the given connection.
    LearningRule(EntityId),
}

impl Endpoint {
    /// The runtime kind of the endpoint object, used for dispatch and for
    /// the `pre_type`/`post_type` edge attributes.
    pub fn kind(&self, model: &Model) -> Result<ObjectKind, ModelError> {
        match self {
            Endpoint::Entity(id) => model.kind(*id),
            Endpoint::Neurons(_) => Ok(ObjectKind::Neurons),
            Endpoint::LearningRule(_) => Ok(ObjectKind::LearningRule),
        }
    }
}

impl From<EntityId> for Endpoint {
    fn from(id: EntityId) -> Self {
        Endpoint::Entity(id)
    }
}

/// Filter applied to a connection's signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Synapse {
    Lowpass(f64),
    Alpha(f64),
}

impl Synapse {
    /// The filter time constant.
    pub fn tau(&self) -> f64 {
        match self {
            Synapse::Lowpass(tau) | Synapse::Alpha(tau) => *tau,
        }
    }
}

impl fmt::Display for Synapse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Synapse::Lowpass(tau) => write!(f, "Lowpass({})", tau),
            Synapse::Alpha(tau) => write!(f, "Alpha({})", tau),
        }
    }
}

/// Linear transform applied by a connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Transform {
    Scalar(f64),
    Dense(Vec<Vec<f64>>),
}

impl Transform {
    /// Textual descriptor emitted in the `transform` edge attribute.
    /// Dense matrices render as JSON.
    pub fn descriptor(&self) -> String {
        match self {
            Transform::Scalar(value) => value.to_string(),
            Transform::Dense(rows) => {
                serde_json::to_string(rows).unwrap_or_else(|_| format!("{:?}", rows))
            }
        }
    }

    /// The scalar value, if the transform is a plain scalar.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Transform::Scalar(value) => Some(*value),
            Transform::Dense(_) => None,
        }
    }
}

/// Learning rule adapting a connection's weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LearningRule {
    Pes,
    Bcm,
    Oja,
}

impl fmt::Display for LearningRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LearningRule::Pes => write!(f, "PES()"),
            LearningRule::Bcm => write!(f, "BCM()"),
            LearningRule::Oja => write!(f, "Oja()"),
        }
    }
}

/// A directed, attributed link between two endpoints.
///
/// Endpoints may reference entities anywhere in the network tree, including
/// entities nested in a different subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub label: Option<String>,
    pub pre: Endpoint,
    pub post: Endpoint,
    pub synapse: Option<Synapse>,
    pub function: Option<String>,
    pub transform: Transform,
    pub learning_rule: Option<LearningRule>,
}

impl Connection {
    /// Creates a connection with the default lowpass synapse and identity
    /// scalar transform.
    pub fn new(pre: impl Into<Endpoint>, post: impl Into<Endpoint>) -> Self {
        Self {
            label: None,
            pre: pre.into(),
            post: post.into(),
            synapse: Some(Synapse::Lowpass(0.005)),
            function: None,
            transform: Transform::Scalar(1.0),
            learning_rule: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_synapse(mut self, synapse: Option<Synapse>) -> Self {
        self.synapse = synapse;
        self
    }

    /// Records the name of the function applied along the connection.
    pub fn with_function(mut self, function: impl Into<String>) -> Self {
        self.function = Some(function.into());
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_learning_rule(mut self, rule: LearningRule) -> Self {
        self.learning_rule = Some(rule);
        self
    }
}
