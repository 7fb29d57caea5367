use std::io::{self, Write};

use indexmap::IndexMap;
use oxrdf::{NamedNode, Subject, Triple};
use oxttl::{NTriplesSerializer, TurtleSerializer};

use super::Graph;

impl Graph {
    /// Triples ordered so that each subject, and each predicate within it,
    /// forms one contiguous run. Runs keep first-appearance order.
    fn grouped(&self) -> impl Iterator<Item = &Triple> {
        let mut subjects = IndexMap::<&Subject, IndexMap<&NamedNode, Vec<&Triple>>>::new();
        for triple in &self.triples {
            subjects
                .entry(&triple.subject)
                .or_default()
                .entry(&triple.predicate)
                .or_default()
                .push(triple);
        }
        subjects
            .into_values()
            .flat_map(IndexMap::into_values)
            .flatten()
    }

    /// Writes the graph as Turtle. Prefix lines appear only once a triple is
    /// written, so an empty graph produces an empty document.
    pub fn write_turtle<W: Write>(&self, out: W) -> io::Result<W> {
        let mut serializer = TurtleSerializer::new();
        for (prefix, ns) in self.prefixes() {
            serializer = serializer
                .with_prefix(prefix, ns.base())
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        }
        let mut writer = serializer.for_writer(out);
        for triple in self.grouped() {
            writer.serialize_triple(triple)?;
        }
        writer.finish()
    }

    pub fn write_ntriples<W: Write>(&self, out: W) -> io::Result<W> {
        let mut writer = NTriplesSerializer::new().for_writer(out);
        for triple in &self.triples {
            writer.serialize_triple(triple)?;
        }
        Ok(writer.finish())
    }
}
