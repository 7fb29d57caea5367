//! RDF graphs built from artifact indexes.
//!
//! Triples are kept in first-insertion order so that the same index always
//! serializes to the same document. Term types and serializers come from
//! `oxrdf` and `oxttl`.

use std::path::{Path, PathBuf};

use indexmap::{IndexMap, IndexSet};
use oxrdf::{IriParseError, NamedNode};
use serde::Deserialize;
use tracing::info;

use crate::{Error, ErrorContext, ErrorDetail, config::Namespaces, index::load_artifact_index};

pub mod link;
mod serialize;

pub use link::{build_representation_graph, build_thumbnail_graph, thumbnail_url};
pub use oxrdf::{Literal, Subject, Term, Triple};

/// Characters a local name may not carry verbatim. `%` is included so that
/// an id that already looks percent-encoded mints a different IRI than its
/// decoded form.
fn needs_escape(c: char) -> bool {
    c <= ' '
        || c == '\u{7F}'
        || matches!(
            c,
            '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`' | '\\' | '%' | '[' | ']' | '#'
        )
}

/// An IRI prefix that mints terms by concatenation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace(String);

impl Namespace {
    pub fn new(base: impl Into<String>) -> Result<Self, IriParseError> {
        let base = NamedNode::new(base)?;
        Ok(Self(base.into_string()))
    }

    pub fn base(&self) -> &str {
        &self.0
    }

    pub fn term(&self, local: &str) -> NamedNode {
        let mut iri = String::with_capacity(self.0.len() + local.len());
        iri.push_str(&self.0);
        for c in local.chars() {
            if needs_escape(c) {
                let mut buf = [0u8; 4];
                for byte in c.encode_utf8(&mut buf).bytes() {
                    iri.push_str(&format!("%{byte:02X}"));
                }
            } else {
                iri.push(c);
            }
        }
        // the base is a valid IRI and every delimiter in `local` is escaped
        NamedNode::new_unchecked(iri)
    }
}

impl From<&url::Url> for Namespace {
    fn from(value: &url::Url) -> Self {
        Self(value.as_str().to_owned())
    }
}

#[derive(Debug, Default, Clone)]
pub struct Graph {
    prefixes: IndexMap<String, Namespace>,
    triples: IndexSet<Triple>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, prefix: impl Into<String>, namespace: Namespace) {
        self.prefixes.insert(prefix.into(), namespace);
    }

    pub fn prefixes(&self) -> impl Iterator<Item = (&str, &Namespace)> {
        self.prefixes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns false if the triple was already present.
    pub fn add(&mut self, triple: Triple) -> bool {
        self.triples.insert(triple)
    }

    pub fn contains(&self, triple: &Triple) -> bool {
        self.triples.contains(triple)
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Triple> {
        self.triples.iter()
    }

    pub fn serialize(&self, format: GraphFormat) -> std::io::Result<Vec<u8>> {
        match format {
            GraphFormat::Turtle => self.write_turtle(Vec::new()),
            GraphFormat::NTriples => self.write_ntriples(Vec::new()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GraphFormat {
    #[default]
    Turtle,
    #[value(name = "ntriples")]
    NTriples,
}

impl GraphFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Turtle => "ttl",
            Self::NTriples => "nt",
        }
    }
}

pub async fn write_graph(
    graph: &Graph,
    path: impl AsRef<Path>,
    format: GraphFormat,
) -> Result<(), Error> {
    let path = path.as_ref();
    let ctx = ErrorContext::new(path);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ctx.error(ErrorDetail::CreateDir(e)))?;
    }
    let document = graph
        .serialize(format)
        .map_err(|e| ctx.error(ErrorDetail::SerializeGraph(e)))?;
    tokio::fs::write(path, document)
        .await
        .map_err(|e| ctx.error(ErrorDetail::WriteGraph(e)))
}

/// Outputs written for one artifact index by [`write_index_graphs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexGraphs {
    pub representation: PathBuf,
    pub thumbnails: PathBuf,
}

/// Builds both graphs for `index_path` and writes them as
/// `<output_dir>/<stem>.<ext>` and `<output_dir>/<stem>_thumbs.<ext>`.
pub async fn write_index_graphs(
    index_path: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    format: GraphFormat,
    namespaces: &Namespaces,
) -> Result<IndexGraphs, Error> {
    let index_path = index_path.as_ref();
    let output_dir = output_dir.as_ref();
    let stem = index_path
        .file_stem()
        .ok_or_else(|| ErrorContext::new(index_path).error(ErrorDetail::MissingStem))?
        .to_string_lossy();
    let ext = format.extension();

    let index = load_artifact_index(index_path).await?;
    let outputs = IndexGraphs {
        representation: output_dir.join(format!("{stem}.{ext}")),
        thumbnails: output_dir.join(format!("{stem}_thumbs.{ext}")),
    };
    let graph = build_representation_graph(&index, namespaces);
    write_graph(&graph, &outputs.representation, format).await?;
    info!(
        index = %index_path.display(),
        output = %outputs.representation.display(),
        triples = graph.len(),
        "saved representation graph"
    );
    let graph = build_thumbnail_graph(&index, namespaces);
    write_graph(&graph, &outputs.thumbnails, format).await?;
    info!(
        index = %index_path.display(),
        output = %outputs.thumbnails.display(),
        triples = graph.len(),
        "saved thumbnail graph"
    );
    Ok(outputs)
}
