//! Graphs linking artifacts to their IIIF images.

use oxrdf::{Literal, NamedNode, Triple};

use crate::{config::Namespaces, index::ArtifactIndex};

use super::{Graph, Namespace};

const REPRESENTS: &str = "P138_represents";
const IS_REPRESENTED_BY: &str = "P138i_is_represented_by";
const THUMBNAIL: &str = "thumbnail";

struct Vocabulary {
    crm: Namespace,
    aa: Namespace,
    image: Namespace,
    schema: Namespace,
}

impl From<&Namespaces> for Vocabulary {
    fn from(value: &Namespaces) -> Self {
        Self {
            crm: (&value.crm).into(),
            aa: (&value.aa).into(),
            image: (&value.image).into(),
            schema: (&value.schema).into(),
        }
    }
}

impl Vocabulary {
    fn base_graph(&self) -> Graph {
        let mut graph = Graph::new();
        graph.bind("crm", self.crm.clone());
        graph.bind("aa", self.aa.clone());
        graph.bind("image", self.image.clone());
        graph
    }
}

/// IIIF Image API URL for the full image at maximum size.
pub fn thumbnail_url(image: &NamedNode) -> String {
    format!("{}/full/max/0/default.jpg", image.as_str())
}

/// `image crm:P138_represents artifact` and its inverse for every image of
/// every artifact. Entries with an empty key or no images are skipped.
pub fn build_representation_graph(index: &ArtifactIndex, namespaces: &Namespaces) -> Graph {
    let vocab = Vocabulary::from(namespaces);
    let represents = vocab.crm.term(REPRESENTS);
    let is_represented_by = vocab.crm.term(IS_REPRESENTED_BY);

    let mut graph = vocab.base_graph();
    for (artifact_id, image_ids) in index {
        if artifact_id.is_empty() || image_ids.is_empty() {
            continue;
        }
        let artifact = vocab.aa.term(artifact_id);
        for image_id in image_ids.iter() {
            let image = vocab.image.term(image_id);
            graph.add(Triple::new(
                image.clone(),
                represents.clone(),
                artifact.clone(),
            ));
            graph.add(Triple::new(
                artifact.clone(),
                is_represented_by.clone(),
                image,
            ));
        }
    }
    graph
}

/// `artifact schema:thumbnail "<first image>/full/max/0/default.jpg"` for
/// every artifact with at least one image.
pub fn build_thumbnail_graph(index: &ArtifactIndex, namespaces: &Namespaces) -> Graph {
    let vocab = Vocabulary::from(namespaces);
    let thumbnail = vocab.schema.term(THUMBNAIL);

    let mut graph = vocab.base_graph();
    graph.bind("schema", vocab.schema.clone());
    for (artifact_id, image_ids) in index {
        if artifact_id.is_empty() {
            continue;
        }
        let Some(first) = image_ids.first() else {
            continue;
        };
        let url = thumbnail_url(&vocab.image.term(first));
        graph.add(Triple::new(
            vocab.aa.term(artifact_id),
            thumbnail.clone(),
            Literal::new_simple_literal(url),
        ));
    }
    graph
}
