//! Builds a small two-level network and prints its GEXF document.

use gexport::{
    CollapsingGexfConverter, Connection, Ensemble, GexfConverter, Model, Network, NetworkKind,
    Node, Probe,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut model = Model::new();
    let root = model.add_network(None, Network::new())?;
    model.declare_name(root, "model")?;

    let stimulus = model.add_node(root, Node::new(0, 1))?;
    model.declare_name(stimulus, "stimulus")?;
    let a = model.add_ensemble(root, Ensemble::new(100, 1))?;
    model.declare_name(a, "a")?;
    let b = model.add_ensemble(root, Ensemble::new(100, 1))?;
    model.declare_name(b, "b")?;

    let array = model.add_network(Some(root), Network::of_kind(NetworkKind::EnsembleArray))?;
    model.declare_name(array, "array")?;
    let first = model.add_ensemble(array, Ensemble::new(50, 1))?;
    model.declare_name(first, "first")?;
    let second = model.add_ensemble(array, Ensemble::new(50, 1))?;
    model.declare_name(second, "second")?;

    model.add_connection(root, Connection::new(stimulus, a))?;
    model.add_connection(root, Connection::new(a, b).with_function("square"))?;
    model.add_connection(root, Connection::new(b, first))?;
    model.add_connection(array, Connection::new(first, second))?;
    model.add_probe(root, Probe::new(b))?;

    let document = GexfConverter::new().convert(&model, root)?;
    println!("{}", document);

    let collapsed = CollapsingGexfConverter::new().convert(&model, root)?;
    println!("{}", collapsed);

    Ok(())
}
