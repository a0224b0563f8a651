//! GEXF document conversion
//!
//! [`GexfConverter`] walks a network model and emits a GEXF graph document:
//! a versioned attribute schema, the node tree (nested or flattened), and a
//! flat global edge list. [`CollapsingGexfConverter`] additionally renders
//! designated composite network kinds as a single opaque node and rewrites
//! every edge endpoint that resolves inside a collapsed network to point at
//! its representative.
//!
//! The output is write-only; there is no parser for it here.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::Local;
use log::debug;
use once_cell::sync::Lazy;

use crate::dispatch::{next_owner_id, DispatchTable, OwnerId, TypeKey};
use crate::error::ConvertError;
use crate::labeler::InspectiveLabeler;
use crate::model::{Endpoint, EntityId, Model, ObjectKind};
use crate::xml::{Element, XmlDocument};

/// Primitive type of a declared attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrType {
    String,
    Long,
    Integer,
    Float,
}

impl AttrType {
    fn as_str(self) -> &'static str {
        match self {
            AttrType::String => "string",
            AttrType::Long => "long",
            AttrType::Integer => "integer",
            AttrType::Float => "float",
        }
    }
}

/// A concrete attribute value. Floats render as the shortest decimal that
/// round-trips; integers render decimal; strings render verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Str(String),
    Int(i64),
    Float(f64),
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Str(s) => write!(f, "{}", s),
            AttrValue::Int(i) => write!(f, "{}", i),
            AttrValue::Float(v) => write!(f, "{}", v),
        }
    }
}

/// One entry of the declared attribute schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Attr {
    pub id: u32,
    pub ty: AttrType,
    pub default: Option<AttrValue>,
}

/// Node attribute schema, declared up front with stable ids.
pub static NODE_ATTRS: &[(&str, Attr)] = &[
    ("type", Attr { id: 0, ty: AttrType::String, default: None }),
    ("net", Attr { id: 1, ty: AttrType::Long, default: None }),
    ("net_label", Attr { id: 2, ty: AttrType::String, default: None }),
    ("size_in", Attr { id: 3, ty: AttrType::Integer, default: None }),
    ("size_out", Attr { id: 4, ty: AttrType::Integer, default: None }),
    ("radius", Attr { id: 5, ty: AttrType::Float, default: None }),
    ("n_neurons", Attr { id: 6, ty: AttrType::Integer, default: Some(AttrValue::Int(0)) }),
    ("neuron_type", Attr { id: 7, ty: AttrType::String, default: None }),
];

/// Edge attribute schema.
pub static EDGE_ATTRS: &[(&str, Attr)] = &[
    ("pre_type", Attr { id: 0, ty: AttrType::String, default: None }),
    ("post_type", Attr { id: 1, ty: AttrType::String, default: None }),
    ("synapse", Attr { id: 2, ty: AttrType::String, default: None }),
    ("tau", Attr { id: 3, ty: AttrType::Float, default: None }),
    ("function", Attr { id: 4, ty: AttrType::String, default: None }),
    ("transform", Attr { id: 5, ty: AttrType::String, default: None }),
    ("scalar_transform", Attr { id: 6, ty: AttrType::Float, default: Some(AttrValue::Float(1.0)) }),
    ("learning_rule_type", Attr { id: 7, ty: AttrType::String, default: None }),
];

/// Instance values for the node schema; `None` fields are not emitted.
#[derive(Debug, Clone, Default)]
pub struct NodeAttrValues {
    pub type_name: Option<String>,
    pub net: Option<EntityId>,
    pub net_label: Option<String>,
    pub size_in: Option<i64>,
    pub size_out: Option<i64>,
    pub radius: Option<f64>,
    pub n_neurons: Option<i64>,
    pub neuron_type: Option<String>,
}

impl NodeAttrValues {
    fn values(self) -> [Option<AttrValue>; 8] {
        [
            self.type_name.map(AttrValue::Str),
            self.net.map(|id| AttrValue::Int(id as i64)),
            self.net_label.map(AttrValue::Str),
            self.size_in.map(AttrValue::Int),
            self.size_out.map(AttrValue::Int),
            self.radius.map(AttrValue::Float),
            self.n_neurons.map(AttrValue::Int),
            self.neuron_type.map(AttrValue::Str),
        ]
    }
}

/// Instance values for the edge schema; `None` fields are not emitted.
#[derive(Debug, Clone, Default)]
pub struct EdgeAttrValues {
    pub pre_type: Option<String>,
    pub post_type: Option<String>,
    pub synapse: Option<String>,
    pub tau: Option<f64>,
    pub function: Option<String>,
    pub transform: Option<String>,
    pub scalar_transform: Option<f64>,
    pub learning_rule_type: Option<String>,
}

impl EdgeAttrValues {
    fn values(self) -> [Option<AttrValue>; 8] {
        [
            self.pre_type.map(AttrValue::Str),
            self.post_type.map(AttrValue::Str),
            self.synapse.map(AttrValue::Str),
            self.tau.map(AttrValue::Float),
            self.function.map(AttrValue::Str),
            self.transform.map(AttrValue::Str),
            self.scalar_transform.map(AttrValue::Float),
            self.learning_rule_type.map(AttrValue::Str),
        ]
    }
}

fn make_attr_defs(class: &str, defs: &[(&str, Attr)]) -> Element {
    let mut attributes = Element::new("attributes");
    attributes.set("class", class);
    for (title, def) in defs {
        let mut attr = Element::new("attribute");
        attr.set("id", def.id.to_string());
        attr.set("title", *title);
        attr.set("type", def.ty.as_str());
        if let Some(default) = &def.default {
            let mut d = Element::new("default");
            d.set_text(default.to_string());
            attr.append(d);
        }
        attributes.append(attr);
    }
    attributes
}

fn make_attrs(defs: &[(&str, Attr)], values: &[Option<AttrValue>]) -> Option<Element> {
    let mut attvalues = Element::new("attvalues");
    let mut any = false;
    for ((_, def), value) in defs.iter().zip(values) {
        if let Some(value) = value {
            let mut av = Element::new("attvalue");
            av.set("for", def.id.to_string());
            av.set("value", value.to_string());
            attvalues.append(av);
            any = true;
        }
    }
    any.then_some(attvalues)
}

/// Per-pass conversion state shared by both converter types.
#[derive(Debug)]
pub struct ConvertState {
    labels: HashMap<EntityId, String>,
    current_net: Option<EntityId>,
    hierarchical: bool,
    version: (u32, u32),
    tag: &'static str,
}

impl ConvertState {
    fn new(hierarchical: bool) -> Self {
        Self {
            labels: HashMap::new(),
            current_net: None,
            hierarchical,
            version: (1, 3),
            tag: "draft",
        }
    }

    /// The network currently being serialized.
    pub fn current_net(&self) -> Option<EntityId> {
        self.current_net
    }

    /// The label of the network currently being serialized.
    pub fn net_label(&self) -> Option<String> {
        self.current_net
            .and_then(|net| self.labels.get(&net).cloned())
    }

    pub fn labels(&self) -> &HashMap<EntityId, String> {
        &self.labels
    }

    pub fn hierarchical(&self) -> bool {
        self.hierarchical
    }

    /// Builds a node element for `id`, labeling it if a label is known.
    pub fn make_node(&self, id: EntityId, attrs: NodeAttrValues) -> Element {
        let mut node = Element::new("node");
        node.set("id", id.to_string());
        if let Some(label) = self.labels.get(&id) {
            node.set("label", label.as_str());
        }
        if let Some(values) = make_attrs(NODE_ATTRS, &attrs.values()) {
            node.append(values);
        }
        node
    }

    /// Builds an edge element between two resolved entities.
    pub fn make_edge(
        &self,
        id: EntityId,
        source: EntityId,
        target: EntityId,
        attrs: EdgeAttrValues,
    ) -> Element {
        let mut edge = Element::new("edge");
        edge.set("id", id.to_string());
        edge.set("source", source.to_string());
        edge.set("target", target.to_string());
        if let Some(values) = make_attrs(EDGE_ATTRS, &attrs.values()) {
            edge.append(values);
        }
        edge
    }
}

/// The seam between the serialization driver, the dispatch handlers, and
/// the converter that owns them.
///
/// Handlers receive the context as a trait object, so a wrapping converter
/// can change endpoint resolution or supply a collapse map without the base
/// handlers knowing.
pub trait GraphContext {
    /// Mutable access to the per-pass conversion state.
    fn state(&mut self) -> &mut ConvertState;

    /// Dispatches `obj` through the converter's table. `Ok(None)` means the
    /// object deliberately has no graph representation.
    fn dispatch_obj(
        &mut self,
        model: &Model,
        obj: EntityId,
    ) -> Result<Option<Element>, ConvertError>;

    /// Resolves an endpoint to the entity an edge should attach to.
    fn node_obj(&self, model: &Model, endpoint: &Endpoint) -> Result<EntityId, ConvertError>;

    /// The collapse map, if this converter collapses composite networks.
    fn collapse_map(&mut self) -> Option<&mut HashMap<EntityId, EntityId>> {
        None
    }

    /// Fully qualified converter type name, recorded as the document creator.
    fn type_name(&self) -> &'static str;
}

/// Handler serializing one object, or `None` for objects without a graph
/// representation.
pub type ConvertHandler =
    fn(&mut dyn GraphContext, &Model, EntityId) -> Result<Option<Element>, ConvertError>;

/// Class-keyed base table shared by every converter instance.
static BASE_TABLE: Lazy<Arc<DispatchTable<ObjectKind, ConvertHandler>>> = Lazy::new(|| {
    let mut table = DispatchTable::new();
    table
        .register(ObjectKind::Ensemble, convert_ensemble as ConvertHandler)
        .expect("empty table");
    table
        .register(ObjectKind::Node, convert_node as ConvertHandler)
        .expect("empty table");
    table
        .register(ObjectKind::Probe, convert_probe as ConvertHandler)
        .expect("empty table");
    table
        .register(ObjectKind::Network, convert_network as ConvertHandler)
        .expect("empty table");
    table
        .register(ObjectKind::Connection, convert_connection as ConvertHandler)
        .expect("empty table");
    Arc::new(table)
});

fn convert_ensemble(
    cx: &mut dyn GraphContext,
    model: &Model,
    id: EntityId,
) -> Result<Option<Element>, ConvertError> {
    let ens = model.ensemble(id)?;
    let state = cx.state();
    Ok(Some(state.make_node(
        id,
        NodeAttrValues {
            type_name: Some(model.kind(id)?.type_name().to_string()),
            net: state.current_net(),
            net_label: state.net_label(),
            size_in: Some(i64::from(ens.dimensions)),
            size_out: Some(i64::from(ens.dimensions)),
            radius: Some(ens.radius),
            n_neurons: Some(i64::from(ens.n_neurons)),
            neuron_type: Some(ens.neuron_type.to_string()),
        },
    )))
}

fn convert_node(
    cx: &mut dyn GraphContext,
    model: &Model,
    id: EntityId,
) -> Result<Option<Element>, ConvertError> {
    let node = model.node(id)?;
    let state = cx.state();
    Ok(Some(state.make_node(
        id,
        NodeAttrValues {
            type_name: Some(model.kind(id)?.type_name().to_string()),
            net: state.current_net(),
            net_label: state.net_label(),
            size_in: Some(i64::from(node.size_in)),
            size_out: Some(i64::from(node.size_out)),
            ..NodeAttrValues::default()
        },
    )))
}

// Probes have no graph representation; this is a deliberate "no element",
// not a dispatch failure.
fn convert_probe(
    _cx: &mut dyn GraphContext,
    _model: &Model,
    _id: EntityId,
) -> Result<Option<Element>, ConvertError> {
    Ok(None)
}

fn convert_network(
    cx: &mut dyn GraphContext,
    model: &Model,
    id: EntityId,
) -> Result<Option<Element>, ConvertError> {
    let net = model.network(id)?;
    let parent_net = std::mem::replace(&mut cx.state().current_net, Some(id));

    let mut nodes = Element::new("nodes");
    let leaves: Vec<EntityId> = net
        .ensembles
        .iter()
        .chain(&net.nodes)
        .chain(&net.probes)
        .copied()
        .collect();
    for leaf in leaves {
        if let Some(element) = cx.dispatch_obj(model, leaf)? {
            nodes.append(element);
        }
    }

    if cx.state().hierarchical() {
        for &subnet in &net.networks {
            let state = cx.state();
            let mut wrapper = state.make_node(
                subnet,
                NodeAttrValues {
                    type_name: Some(model.kind(subnet)?.type_name().to_string()),
                    net: state.current_net(),
                    net_label: state.net_label(),
                    n_neurons: Some(model.total_neurons(subnet)? as i64),
                    ..NodeAttrValues::default()
                },
            );
            if let Some(inner) = cx.dispatch_obj(model, subnet)? {
                wrapper.append(inner);
            }
            nodes.append(wrapper);
        }
    } else {
        for &subnet in &net.networks {
            if let Some(inner) = cx.dispatch_obj(model, subnet)? {
                nodes.extend(inner.into_children());
            }
        }
    }

    cx.state().current_net = parent_net;
    Ok(Some(nodes))
}

fn convert_connection(
    cx: &mut dyn GraphContext,
    model: &Model,
    id: EntityId,
) -> Result<Option<Element>, ConvertError> {
    let conn = model.connection(id)?;
    let source = cx.node_obj(model, &conn.pre)?;
    let target = cx.node_obj(model, &conn.post)?;
    let state = cx.state();
    Ok(Some(state.make_edge(
        id,
        source,
        target,
        EdgeAttrValues {
            pre_type: Some(conn.pre.kind(model)?.type_name().to_string()),
            post_type: Some(conn.post.kind(model)?.type_name().to_string()),
            synapse: conn.synapse.map(|s| s.to_string()),
            tau: conn.synapse.map(|s| s.tau()),
            function: conn.function.clone(),
            transform: Some(conn.transform.descriptor()),
            scalar_transform: conn.transform.as_scalar(),
            learning_rule_type: conn.learning_rule.map(|r| r.to_string()),
        },
    )))
}

/// Emits a single representative node for a composite network and records
/// its descendants in the collapse map.
fn convert_collapsed(
    cx: &mut dyn GraphContext,
    model: &Model,
    id: EntityId,
) -> Result<Option<Element>, ConvertError> {
    let state = cx.state();
    let mut nodes = Element::new("nodes");
    nodes.append(state.make_node(
        id,
        NodeAttrValues {
            type_name: Some(model.kind(id)?.type_name().to_string()),
            net: state.current_net(),
            net_label: state.net_label(),
            n_neurons: Some(model.total_neurons(id)? as i64),
            ..NodeAttrValues::default()
        },
    ));
    if let Some(map) = cx.collapse_map() {
        let descendants = model.descendants(id)?;
        debug!(
            "collapsed network {} absorbs {} objects",
            id,
            descendants.len()
        );
        for child in descendants {
            map.insert(child, id);
        }
    }
    Ok(Some(nodes))
}

/// Base endpoint resolution: entities resolve to themselves, a neuron
/// population to its ensemble, a learning rule to its originating
/// connection's source.
fn effective_entity(model: &Model, endpoint: &Endpoint) -> Result<EntityId, ConvertError> {
    match endpoint {
        Endpoint::Entity(id) => Ok(*id),
        Endpoint::Neurons(ensemble) => Ok(*ensemble),
        Endpoint::LearningRule(connection) => {
            let conn = model.connection(*connection)?;
            effective_entity(model, &conn.pre)
        }
    }
}

fn make_document(
    cx: &mut dyn GraphContext,
    model: &Model,
    root: EntityId,
) -> Result<XmlDocument, ConvertError> {
    if let Some(map) = cx.collapse_map() {
        map.clear();
    }

    let state = cx.state();
    let version = format!("{}.{}", state.version.0, state.version.1);
    let tagged = format!("{}{}", version, state.tag);

    let mut gexf = Element::new("gexf");
    gexf.set("version", version.as_str());
    gexf.set("xmlns", format!("http://www.gexf.net/{}", tagged));
    gexf.set("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance");
    gexf.set(
        "xsi:schemaLocation",
        format!("http://www.gexf.net/{0} http://www.gexf.net/{0}/gexf.xsd", tagged),
    );

    let mut meta = Element::new("meta");
    meta.set("lastmodifieddate", Local::now().date_naive().to_string());
    let mut creator = Element::new("creator");
    creator.set_text(cx.type_name());
    meta.append(creator);
    gexf.append(meta);

    let mut graph = Element::new("graph");
    graph.set("defaultedgetype", "directed");
    graph.append(make_attr_defs("node", NODE_ATTRS));
    graph.append(make_attr_defs("edge", EDGE_ATTRS));

    if let Some(nodes) = cx.dispatch_obj(model, root)? {
        graph.append(nodes);
    }

    let mut edges = Element::new("edges");
    for conn in model.all_connections(root)? {
        if let Some(edge) = cx.dispatch_obj(model, conn)? {
            edges.append(edge);
        }
    }
    graph.append(edges);

    gexf.append(graph);
    Ok(XmlDocument::new(gexf))
}

/// Converts a network model into a GEXF document.
///
/// Node and edge identities are the arena ids of the serialized objects;
/// they are unique within one model but not portable across models.
#[derive(Debug)]
pub struct GexfConverter {
    dispatch: DispatchTable<ObjectKind, ConvertHandler>,
    owner: OwnerId,
    labeler: InspectiveLabeler,
    state: ConvertState,
}

impl GexfConverter {
    /// Creates a converter in flat mode with a fresh labeler.
    pub fn new() -> Self {
        Self {
            dispatch: DispatchTable::with_parent(BASE_TABLE.clone()),
            owner: next_owner_id(),
            labeler: InspectiveLabeler::new(),
            state: ConvertState::new(false),
        }
    }

    /// Preserve sub-network structure as document nesting instead of
    /// splicing sub-network contents into the parent level.
    pub fn hierarchical(mut self, hierarchical: bool) -> Self {
        self.state.hierarchical = hierarchical;
        self
    }

    pub fn with_labeler(mut self, labeler: InspectiveLabeler) -> Self {
        self.labeler = labeler;
        self
    }

    /// Shadows the class-keyed handler for `kind` on this converter only.
    pub fn override_handler(&mut self, kind: ObjectKind, handler: ConvertHandler) {
        self.dispatch.register_instance(self.owner, kind, handler);
    }

    /// Serializes `root` and everything reachable from it.
    ///
    /// Fails with a dispatch error if any reachable object has no handler;
    /// partial documents are never returned.
    pub fn convert(&mut self, model: &Model, root: EntityId) -> Result<XmlDocument, ConvertError> {
        self.state.labels = self.labeler.label_of(model, root)?;
        debug!("assigned {} labels for conversion", self.state.labels.len());
        make_document(self, model, root)
    }
}

impl Default for GexfConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphContext for GexfConverter {
    fn state(&mut self) -> &mut ConvertState {
        &mut self.state
    }

    fn dispatch_obj(
        &mut self,
        model: &Model,
        obj: EntityId,
    ) -> Result<Option<Element>, ConvertError> {
        let handler = self.dispatch.resolve(self.owner, model.kind(obj)?)?;
        handler(self, model, obj)
    }

    fn node_obj(&self, model: &Model, endpoint: &Endpoint) -> Result<EntityId, ConvertError> {
        effective_entity(model, endpoint)
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Composite network kinds collapsed by default.
pub const DEFAULT_COLLAPSE: &[ObjectKind] = &[
    ObjectKind::EnsembleArray,
    ObjectKind::CircularConvolution,
    ObjectKind::Product,
];

/// A [`GexfConverter`] that renders composite networks as single nodes.
///
/// Every entity transitively owned by a collapsed network is mapped to the
/// network itself, so edges that would point inside it attach to its
/// boundary node instead. Connections internal to a collapsed network stay
/// in the edge list as self-loops.
#[derive(Debug)]
pub struct CollapsingGexfConverter {
    inner: GexfConverter,
    obj_to_collapsed: HashMap<EntityId, EntityId>,
}

impl CollapsingGexfConverter {
    /// Collapses the built-in composite kinds ([`DEFAULT_COLLAPSE`]).
    pub fn new() -> Self {
        Self::with_collapse(DEFAULT_COLLAPSE)
    }

    /// Collapses exactly the given kinds.
    pub fn with_collapse(to_collapse: &[ObjectKind]) -> Self {
        let mut inner = GexfConverter::new();
        for &kind in to_collapse {
            inner.override_handler(kind, convert_collapsed);
        }
        Self {
            inner,
            obj_to_collapsed: HashMap::new(),
        }
    }

    pub fn hierarchical(mut self, hierarchical: bool) -> Self {
        self.inner.state.hierarchical = hierarchical;
        self
    }

    pub fn with_labeler(mut self, labeler: InspectiveLabeler) -> Self {
        self.inner.labeler = labeler;
        self
    }

    /// Serializes `root`, collapsing designated composite networks. The
    /// collapse map is rebuilt on every call.
    pub fn convert(&mut self, model: &Model, root: EntityId) -> Result<XmlDocument, ConvertError> {
        self.inner.state.labels = self.inner.labeler.label_of(model, root)?;
        make_document(self, model, root)
    }
}

impl Default for CollapsingGexfConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphContext for CollapsingGexfConverter {
    fn state(&mut self) -> &mut ConvertState {
        &mut self.inner.state
    }

    fn dispatch_obj(
        &mut self,
        model: &Model,
        obj: EntityId,
    ) -> Result<Option<Element>, ConvertError> {
        let handler = self
            .inner
            .dispatch
            .resolve(self.inner.owner, model.kind(obj)?)?;
        handler(self, model, obj)
    }

    fn node_obj(&self, model: &Model, endpoint: &Endpoint) -> Result<EntityId, ConvertError> {
        let resolved = effective_entity(model, endpoint)?;
        Ok(self
            .obj_to_collapsed
            .get(&resolved)
            .copied()
            .unwrap_or(resolved))
    }

    fn collapse_map(&mut self) -> Option<&mut HashMap<EntityId, EntityId>> {
        Some(&mut self.obj_to_collapsed)
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Connection, Ensemble, LearningRule, Network, NetworkKind, Node, Probe, Synapse, Transform,
    };

    fn collect<'a>(element: &'a Element, tag: &str, out: &mut Vec<&'a Element>) {
        if element.tag() == tag {
            out.push(element);
        }
        for child in element.children() {
            collect(child, tag, out);
        }
    }

    fn find_all<'a>(element: &'a Element, tag: &str) -> Vec<&'a Element> {
        let mut out = Vec::new();
        collect(element, tag, &mut out);
        out
    }

    fn attvalue<'a>(element: &'a Element, for_id: &str) -> Option<&'a str> {
        element
            .children()
            .iter()
            .find(|c| c.tag() == "attvalues")
            .and_then(|values| {
                values
                    .children()
                    .iter()
                    .find(|av| av.attr("for") == Some(for_id))
                    .and_then(|av| av.attr("value"))
            })
    }

    fn node_by_id<'a>(nodes: &[&'a Element], id: EntityId) -> &'a Element {
        let id = id.to_string();
        nodes
            .iter()
            .find(|n| n.attr("id") == Some(id.as_str()))
            .expect("node not found")
    }

    /// Root network "model" holding ensemble "ens", sub-network "subnet"
    /// with node "node" and ensemble "attr", a connection node -> ens, and
    /// a probe on ens.
    fn flat_fixture() -> (Model, EntityId, EntityId, EntityId, EntityId, EntityId, EntityId) {
        let mut model = Model::new();
        let root = model.add_network(None, Network::new()).unwrap();
        let ens = model.add_ensemble(root, Ensemble::new(10, 1)).unwrap();
        let subnet = model.add_network(Some(root), Network::new()).unwrap();
        let node = model.add_node(subnet, Node::new(0, 1)).unwrap();
        let attr = model.add_ensemble(subnet, Ensemble::new(10, 1)).unwrap();
        let conn = model.add_connection(root, Connection::new(node, ens)).unwrap();
        model.add_probe(root, Probe::new(ens)).unwrap();
        model.declare_name(root, "model").unwrap();
        model.declare_name(ens, "ens").unwrap();
        model.declare_name(subnet, "subnet").unwrap();
        model.declare_name(node, "node").unwrap();
        model.declare_name(attr, "attr").unwrap();
        (model, root, ens, subnet, node, attr, conn)
    }

    #[test]
    fn test_document_header_and_schema() {
        let (model, root, ..) = flat_fixture();
        let doc = GexfConverter::new().convert(&model, root).unwrap();
        let gexf = doc.root();

        assert_eq!(gexf.tag(), "gexf");
        assert_eq!(gexf.attr("version"), Some("1.3"));
        assert_eq!(gexf.attr("xmlns"), Some("http://www.gexf.net/1.3draft"));
        assert_eq!(
            gexf.attr("xsi:schemaLocation"),
            Some("http://www.gexf.net/1.3draft http://www.gexf.net/1.3draft/gexf.xsd")
        );

        let meta = &gexf.children()[0];
        assert_eq!(meta.tag(), "meta");
        let date = meta.attr("lastmodifieddate").unwrap();
        assert_eq!(date.len(), 10);
        assert_eq!(&date[4..5], "-");
        assert_eq!(
            meta.children()[0].text(),
            Some(std::any::type_name::<GexfConverter>())
        );

        let graph = &gexf.children()[1];
        assert_eq!(graph.attr("defaultedgetype"), Some("directed"));

        let decls = find_all(graph, "attributes");
        assert_eq!(decls.len(), 2);
        assert_eq!(decls[0].attr("class"), Some("node"));
        assert_eq!(decls[1].attr("class"), Some("edge"));

        let node_titles: Vec<_> = decls[0]
            .children()
            .iter()
            .map(|a| a.attr("title").unwrap())
            .collect();
        assert_eq!(
            node_titles,
            vec![
                "type", "net", "net_label", "size_in", "size_out", "radius", "n_neurons",
                "neuron_type"
            ]
        );
        let n_neurons = &decls[0].children()[6];
        assert_eq!(n_neurons.attr("id"), Some("6"));
        assert_eq!(n_neurons.attr("type"), Some("integer"));
        assert_eq!(n_neurons.children()[0].text(), Some("0"));

        let scalar_transform = &decls[1].children()[6];
        assert_eq!(scalar_transform.attr("title"), Some("scalar_transform"));
        assert_eq!(scalar_transform.attr("type"), Some("float"));
        assert_eq!(scalar_transform.children()[0].text(), Some("1"));
        // Attributes without a default declare none.
        assert!(decls[0].children()[0].children().is_empty());
    }

    #[test]
    fn test_flat_conversion() {
        let (model, root, ens, subnet, node, attr, conn) = flat_fixture();
        let doc = GexfConverter::new().convert(&model, root).unwrap();

        // Three leaf entities serialize; the probe contributes no node.
        let nodes = find_all(doc.root(), "node");
        assert_eq!(nodes.len(), 3);

        let ens_node = node_by_id(&nodes, ens);
        assert_eq!(ens_node.attr("label"), Some("ens"));
        assert_eq!(
            attvalue(ens_node, "0"),
            Some(ObjectKind::Ensemble.type_name())
        );
        assert_eq!(attvalue(ens_node, "1"), Some(root.to_string().as_str()));
        assert_eq!(attvalue(ens_node, "2"), Some("model"));
        assert_eq!(attvalue(ens_node, "3"), Some("1"));
        assert_eq!(attvalue(ens_node, "4"), Some("1"));
        assert_eq!(attvalue(ens_node, "5"), Some("1"));
        assert_eq!(attvalue(ens_node, "6"), Some("10"));
        assert_eq!(attvalue(ens_node, "7"), Some("LIF()"));

        // Sub-network contents are spliced flat but keep their own owning
        // network attributes and dotted labels.
        let attr_node = node_by_id(&nodes, attr);
        assert_eq!(attr_node.attr("label"), Some("subnet.attr"));
        assert_eq!(attvalue(attr_node, "1"), Some(subnet.to_string().as_str()));
        assert_eq!(attvalue(attr_node, "2"), Some("subnet"));

        let passthrough = node_by_id(&nodes, node);
        assert_eq!(passthrough.attr("label"), Some("subnet.node"));
        assert_eq!(attvalue(passthrough, "3"), Some("0"));
        assert_eq!(attvalue(passthrough, "4"), Some("1"));
        // Absent values are omitted entirely.
        assert_eq!(attvalue(passthrough, "5"), None);
        assert_eq!(attvalue(passthrough, "6"), None);
        assert_eq!(attvalue(passthrough, "7"), None);

        let edges = find_all(doc.root(), "edge");
        assert_eq!(edges.len(), 1);
        let edge = edges[0];
        assert_eq!(edge.attr("id"), Some(conn.to_string().as_str()));
        assert_eq!(edge.attr("source"), Some(node.to_string().as_str()));
        assert_eq!(edge.attr("target"), Some(ens.to_string().as_str()));
        assert_eq!(attvalue(edge, "0"), Some(ObjectKind::Node.type_name()));
        assert_eq!(attvalue(edge, "1"), Some(ObjectKind::Ensemble.type_name()));
        assert_eq!(attvalue(edge, "2"), Some("Lowpass(0.005)"));
        assert_eq!(attvalue(edge, "3"), Some("0.005"));
        assert_eq!(attvalue(edge, "4"), None);
        assert_eq!(attvalue(edge, "5"), Some("1"));
        // A value equal to the declared default is still emitted.
        assert_eq!(attvalue(edge, "6"), Some("1"));
        assert_eq!(attvalue(edge, "7"), None);
    }

    #[test]
    fn test_hierarchical_conversion() {
        let (model, root, ens, subnet, node, attr, _) = flat_fixture();
        let doc = GexfConverter::new()
            .hierarchical(true)
            .convert(&model, root)
            .unwrap();

        let graph = &doc.root().children()[1];
        let top_nodes = graph
            .children()
            .iter()
            .find(|c| c.tag() == "nodes")
            .unwrap();
        assert_eq!(top_nodes.children().len(), 2);

        let all_nodes = find_all(doc.root(), "node");
        let wrapper = node_by_id(&all_nodes, subnet);
        assert_eq!(wrapper.attr("label"), Some("subnet"));
        assert_eq!(
            attvalue(wrapper, "0"),
            Some(ObjectKind::Network.type_name())
        );
        assert_eq!(attvalue(wrapper, "1"), Some(root.to_string().as_str()));
        assert_eq!(attvalue(wrapper, "2"), Some("model"));
        // Total neuron count of the nested ensembles.
        assert_eq!(attvalue(wrapper, "6"), Some("10"));

        // The sub-network's entities nest inside the wrapper node.
        let nested: Vec<EntityId> = find_all(wrapper, "node")
            .iter()
            .skip(1)
            .map(|n| n.attr("id").unwrap().parse().unwrap())
            .collect();
        assert_eq!(nested.len(), 2);
        assert!(nested.contains(&node));
        assert!(nested.contains(&attr));

        // The ensemble at root level does not nest.
        let ens_node = node_by_id(&all_nodes, ens);
        assert!(find_all(ens_node, "node").len() == 1);

        // Edges stay global and flat.
        assert_eq!(find_all(doc.root(), "edge").len(), 1);
    }

    #[test]
    fn test_edge_attribute_variants() {
        let mut model = Model::new();
        let root = model.add_network(None, Network::new()).unwrap();
        let a = model.add_ensemble(root, Ensemble::new(5, 2)).unwrap();
        let b = model.add_ensemble(root, Ensemble::new(5, 2)).unwrap();
        let conn = model
            .add_connection(
                root,
                Connection::new(a, b)
                    .with_synapse(Some(Synapse::Alpha(0.01)))
                    .with_function("square")
                    .with_transform(Transform::Dense(vec![vec![1.0, 0.0], vec![0.0, 1.0]]))
                    .with_learning_rule(LearningRule::Pes),
            )
            .unwrap();

        let doc = GexfConverter::new().convert(&model, root).unwrap();
        let edges = find_all(doc.root(), "edge");
        let edge = node_by_id(&edges, conn);
        assert_eq!(attvalue(edge, "2"), Some("Alpha(0.01)"));
        assert_eq!(attvalue(edge, "3"), Some("0.01"));
        assert_eq!(attvalue(edge, "4"), Some("square"));
        assert_eq!(attvalue(edge, "5"), Some("[[1.0,0.0],[0.0,1.0]]"));
        // Dense transforms have no scalar value.
        assert_eq!(attvalue(edge, "6"), None);
        assert_eq!(attvalue(edge, "7"), Some("PES()"));
    }

    #[test]
    fn test_synapse_none_omits_filter_attributes() {
        let mut model = Model::new();
        let root = model.add_network(None, Network::new()).unwrap();
        let a = model.add_ensemble(root, Ensemble::new(5, 1)).unwrap();
        let b = model.add_ensemble(root, Ensemble::new(5, 1)).unwrap();
        model
            .add_connection(root, Connection::new(a, b).with_synapse(None))
            .unwrap();

        let doc = GexfConverter::new().convert(&model, root).unwrap();
        let edge = find_all(doc.root(), "edge")[0];
        assert_eq!(attvalue(edge, "2"), None);
        assert_eq!(attvalue(edge, "3"), None);
    }

    #[test]
    fn test_endpoint_resolution() {
        let mut model = Model::new();
        let root = model.add_network(None, Network::new()).unwrap();
        let a = model.add_ensemble(root, Ensemble::new(5, 1)).unwrap();
        let b = model.add_ensemble(root, Ensemble::new(5, 1)).unwrap();
        let c = model.add_ensemble(root, Ensemble::new(5, 1)).unwrap();
        let learned = model
            .add_connection(
                root,
                Connection::new(a, b).with_learning_rule(LearningRule::Pes),
            )
            .unwrap();
        // An error connection feeding the learning rule, driven by neurons.
        let feedback = model
            .add_connection(
                root,
                Connection::new(Endpoint::Neurons(c), Endpoint::LearningRule(learned)),
            )
            .unwrap();

        let doc = GexfConverter::new().convert(&model, root).unwrap();
        let edges = find_all(doc.root(), "edge");
        let edge = node_by_id(&edges, feedback);
        // Neurons resolve to their ensemble; the learning rule resolves to
        // its connection's source.
        assert_eq!(edge.attr("source"), Some(c.to_string().as_str()));
        assert_eq!(edge.attr("target"), Some(a.to_string().as_str()));
        assert_eq!(attvalue(edge, "0"), Some(ObjectKind::Neurons.type_name()));
        assert_eq!(
            attvalue(edge, "1"),
            Some(ObjectKind::LearningRule.type_name())
        );
    }

    #[test]
    fn test_zero_neuron_count_still_emitted() {
        let mut model = Model::new();
        let root = model.add_network(None, Network::new()).unwrap();
        let ens = model.add_ensemble(root, Ensemble::new(0, 1)).unwrap();

        let doc = GexfConverter::new().convert(&model, root).unwrap();
        let nodes = find_all(doc.root(), "node");
        // Equal to the schema default, but still emitted explicitly.
        assert_eq!(attvalue(node_by_id(&nodes, ens), "6"), Some("0"));
    }

    /// Root network holding ensemble "x", an ensemble array "ea" with three
    /// ensembles, an internal connection inside "ea", and a connection from
    /// "x" to an entity inside "ea".
    fn collapse_fixture() -> (Model, EntityId, EntityId, EntityId, EntityId, EntityId) {
        let mut model = Model::new();
        let root = model.add_network(None, Network::new()).unwrap();
        let x = model.add_ensemble(root, Ensemble::new(5, 1)).unwrap();
        let ea = model
            .add_network(Some(root), Network::of_kind(NetworkKind::EnsembleArray))
            .unwrap();
        let e0 = model.add_ensemble(ea, Ensemble::new(10, 1)).unwrap();
        let e1 = model.add_ensemble(ea, Ensemble::new(10, 1)).unwrap();
        model.add_ensemble(ea, Ensemble::new(10, 1)).unwrap();
        let internal = model.add_connection(ea, Connection::new(e0, e1)).unwrap();
        let inbound = model.add_connection(root, Connection::new(x, e0)).unwrap();
        model.declare_name(root, "model").unwrap();
        model.declare_name(x, "x").unwrap();
        model.declare_name(ea, "ea").unwrap();
        (model, root, x, ea, internal, inbound)
    }

    #[test]
    fn test_collapsing_renders_single_node() {
        let (model, root, x, ea, _, inbound) = collapse_fixture();
        let doc = CollapsingGexfConverter::new().convert(&model, root).unwrap();

        // One node for "x", one for the whole array; none of the three
        // internal ensembles surface.
        let nodes = find_all(doc.root(), "node");
        assert_eq!(nodes.len(), 2);
        let ea_node = node_by_id(&nodes, ea);
        assert_eq!(ea_node.attr("label"), Some("ea"));
        assert_eq!(
            attvalue(ea_node, "0"),
            Some(ObjectKind::EnsembleArray.type_name())
        );
        assert_eq!(attvalue(ea_node, "6"), Some("30"));
        let _ = node_by_id(&nodes, x);

        // The inbound edge is rewritten to the boundary node.
        let edges = find_all(doc.root(), "edge");
        let edge = node_by_id(&edges, inbound);
        assert_eq!(edge.attr("source"), Some(x.to_string().as_str()));
        assert_eq!(edge.attr("target"), Some(ea.to_string().as_str()));
    }

    #[test]
    fn test_collapsed_internal_connections_become_self_loops() {
        let (model, root, _, ea, internal, _) = collapse_fixture();
        let doc = CollapsingGexfConverter::new().convert(&model, root).unwrap();

        // Internal connections stay in the global edge list; both endpoints
        // collapse to the representative, so they appear as self-loops.
        let edges = find_all(doc.root(), "edge");
        assert_eq!(edges.len(), 2);
        let self_loop = node_by_id(&edges, internal);
        assert_eq!(self_loop.attr("source"), Some(ea.to_string().as_str()));
        assert_eq!(self_loop.attr("target"), Some(ea.to_string().as_str()));
    }

    #[test]
    fn test_collapse_set_is_configurable() {
        let (model, root, ..) = collapse_fixture();
        // Only Product networks collapse; the ensemble array serializes in
        // full.
        let doc = CollapsingGexfConverter::with_collapse(&[ObjectKind::Product])
            .convert(&model, root)
            .unwrap();
        assert_eq!(find_all(doc.root(), "node").len(), 4);
    }

    #[test]
    fn test_collapse_map_rebuilt_per_pass() {
        let (model, root, _, ea, _, _) = collapse_fixture();
        let mut converter = CollapsingGexfConverter::new();
        converter.convert(&model, root).unwrap();
        let first = converter.obj_to_collapsed.clone();
        converter.convert(&model, root).unwrap();
        assert_eq!(converter.obj_to_collapsed, first);
        assert!(first.values().all(|&rep| rep == ea));
    }

    #[test]
    fn test_collapsing_converter_records_its_own_creator() {
        let (model, root, ..) = collapse_fixture();
        let doc = CollapsingGexfConverter::new().convert(&model, root).unwrap();
        let meta = &doc.root().children()[0];
        assert_eq!(
            meta.children()[0].text(),
            Some(std::any::type_name::<CollapsingGexfConverter>())
        );
    }

    #[test]
    fn test_instance_override_scoped_to_one_converter() {
        fn skip(
            _cx: &mut dyn GraphContext,
            _model: &Model,
            _id: EntityId,
        ) -> Result<Option<Element>, ConvertError> {
            Ok(None)
        }

        let (model, root, ..) = flat_fixture();
        let mut muted = GexfConverter::new();
        muted.override_handler(ObjectKind::Ensemble, skip);
        let doc = muted.convert(&model, root).unwrap();
        // Both ensembles drop; the passthrough node remains.
        assert_eq!(find_all(doc.root(), "node").len(), 1);

        // A sibling converter sharing the class-keyed base table is
        // unaffected.
        let doc = GexfConverter::new().convert(&model, root).unwrap();
        assert_eq!(find_all(doc.root(), "node").len(), 3);
    }

    #[test]
    fn test_structural_counts() {
        // N leaf entities and M connections yield exactly N nodes and M
        // edges in hierarchical mode, probes excluded.
        let mut model = Model::new();
        let root = model.add_network(None, Network::new()).unwrap();
        let mut leaves = Vec::new();
        for _ in 0..4 {
            leaves.push(model.add_ensemble(root, Ensemble::new(4, 1)).unwrap());
        }
        let subnet = model.add_network(Some(root), Network::new()).unwrap();
        leaves.push(model.add_node(subnet, Node::new(1, 1)).unwrap());
        for pair in leaves.windows(2) {
            model
                .add_connection(root, Connection::new(pair[0], pair[1]))
                .unwrap();
        }
        model.add_probe(root, Probe::new(leaves[0])).unwrap();

        let doc = GexfConverter::new()
            .hierarchical(true)
            .convert(&model, root)
            .unwrap();
        let node_ids: std::collections::HashSet<&str> = find_all(doc.root(), "node")
            .iter()
            .filter_map(|n| n.attr("id"))
            .collect();
        // 5 leaves plus the sub-network wrapper node.
        assert_eq!(node_ids.len(), 6);
        assert_eq!(find_all(doc.root(), "edge").len(), 4);
    }
}
