use std::path::Path;

use crate::{
    config::{Config, Namespaces},
    graph::{self, Graph, GraphFormat, Literal, Namespace, Triple},
    index,
};

mod pyramids;

fn turtle(graph: &Graph) -> String {
    String::from_utf8(graph.serialize(GraphFormat::Turtle).unwrap()).unwrap()
}

fn terms(ns: &Namespaces) -> (Namespace, Namespace, Namespace, Namespace) {
    (
        Namespace::from(&ns.crm),
        Namespace::from(&ns.aa),
        Namespace::from(&ns.image),
        Namespace::from(&ns.schema),
    )
}

#[tokio::test]
async fn representation_triples_per_image() {
    let ns = Namespaces::default();
    let index = index::load_artifact_index("src/tests/fixtures/artifacts.json")
        .await
        .unwrap();
    let graph = graph::build_representation_graph(&index, &ns);
    // a1 has two images, a2 one; a3, a4 and the empty key contribute nothing
    assert_eq!(graph.len(), 2 * 2 + 2 * 1);

    let (crm, aa, image, _) = terms(&ns);
    for (artifact, img) in [("a1", "img1"), ("a1", "img2"), ("a2", "img3")] {
        assert!(graph.contains(&Triple::new(
            image.term(img),
            crm.term("P138_represents"),
            aa.term(artifact),
        )));
        assert!(graph.contains(&Triple::new(
            aa.term(artifact),
            crm.term("P138i_is_represented_by"),
            image.term(img),
        )));
    }
}

#[tokio::test]
async fn one_thumbnail_per_artifact() {
    let ns = Namespaces::default();
    let index = index::load_artifact_index("src/tests/fixtures/artifacts.json")
        .await
        .unwrap();
    let graph = graph::build_thumbnail_graph(&index, &ns);
    let (_, aa, _, schema) = terms(&ns);
    assert_eq!(
        graph.iter().cloned().collect::<Vec<_>>(),
        [
            Triple::new(
                aa.term("a1"),
                schema.term("thumbnail"),
                Literal::new_simple_literal("https://iiif.perseus.tufts.edu/iiif/3/img1/full/max/0/default.jpg"),
            ),
            Triple::new(
                aa.term("a2"),
                schema.term("thumbnail"),
                Literal::new_simple_literal("https://iiif.perseus.tufts.edu/iiif/3/img3/full/max/0/default.jpg"),
            ),
        ]
    );
}

#[tokio::test]
async fn example_index_as_turtle() {
    let ns = Namespaces::default();
    let index = index::load_artifact_index("src/tests/fixtures/example.json")
        .await
        .unwrap();

    assert_eq!(
        turtle(&graph::build_representation_graph(&index, &ns)),
        r#"@prefix aa: <http://perseus.tufts.edu/ns/aa/> .
@prefix crm: <http://www.cidoc-crm.org/cidoc-crm/> .
@prefix image: <https://iiif.perseus.tufts.edu/iiif/3/> .
image:img1 crm:P138_represents aa:a1 .
aa:a1 crm:P138i_is_represented_by image:img1 , image:img2 .
image:img2 crm:P138_represents aa:a1 .
"#
    );
    assert_eq!(
        turtle(&graph::build_thumbnail_graph(&index, &ns)),
        r#"@prefix aa: <http://perseus.tufts.edu/ns/aa/> .
@prefix crm: <http://www.cidoc-crm.org/cidoc-crm/> .
@prefix image: <https://iiif.perseus.tufts.edu/iiif/3/> .
@prefix schema: <https://schema.org/> .
aa:a1 schema:thumbnail "https://iiif.perseus.tufts.edu/iiif/3/img1/full/max/0/default.jpg" .
"#
    );
}

#[tokio::test]
async fn configured_graph_jobs() {
    let src = tokio::fs::read_to_string("src/tests/fixtures/graphs.yaml")
        .await
        .unwrap();
    let config: Config = serde_yaml::from_str(&src).unwrap();
    config.validate().unwrap();
    assert_eq!(config.graphs.format, GraphFormat::Turtle);

    let out = tempfile::tempdir().unwrap();
    let mut written = Vec::new();
    for index_path in &config.graphs.indexes {
        written.push(
            graph::write_index_graphs(index_path, out.path(), config.graphs.format, &config.namespaces)
                .await
                .unwrap(),
        );
    }
    assert_eq!(written[0].representation, out.path().join("example.ttl"));
    assert_eq!(written[0].thumbnails, out.path().join("example_thumbs.ttl"));
    assert_eq!(written[1].representation, out.path().join("artifacts.ttl"));

    let thumbs = std::fs::read_to_string(out.path().join("artifacts_thumbs.ttl")).unwrap();
    assert_eq!(thumbs.matches("schema:thumbnail").count(), 2);
    let links = std::fs::read_to_string(out.path().join("artifacts.ttl")).unwrap();
    assert!(links.contains("image:img3 crm:P138_represents aa:a2 ."));
    assert!(!links.contains("img9"));
}

#[tokio::test]
async fn missing_index_is_fatal() {
    let out = tempfile::tempdir().unwrap();
    let err = graph::write_index_graphs(
        "src/tests/fixtures/missing.json",
        out.path(),
        GraphFormat::Turtle,
        &Namespaces::default(),
    )
    .await
    .unwrap_err();
    assert_eq!(err.context.path, Path::new("src/tests/fixtures/missing.json"));
    assert!(!out.path().join("missing.ttl").exists());
}
