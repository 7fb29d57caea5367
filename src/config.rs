use std::path::PathBuf;

use serde::Deserialize;

use crate::{
    graph::GraphFormat,
    pyramid::{MAX_TILE_SIZE, PyramidOptions},
};

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct Namespaces {
    pub crm: url::Url,
    pub aa: url::Url,
    pub image: url::Url,
    pub schema: url::Url,
}

impl Default for Namespaces {
    fn default() -> Self {
        fn parse(iri: &str) -> url::Url {
            iri.parse().expect("built-in namespace IRI")
        }
        Self {
            crm: parse("http://www.cidoc-crm.org/cidoc-crm/"),
            aa: parse("http://perseus.tufts.edu/ns/aa/"),
            image: parse("https://iiif.perseus.tufts.edu/iiif/3/"),
            schema: parse("https://schema.org/"),
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct PyramidConfig {
    pub tile_size: u32,
    pub quality: u8,
}

impl Default for PyramidConfig {
    fn default() -> Self {
        let options = PyramidOptions::default();
        Self {
            tile_size: options.tile_size,
            quality: options.quality,
        }
    }
}

impl From<&PyramidConfig> for PyramidOptions {
    fn from(value: &PyramidConfig) -> Self {
        Self {
            tile_size: value.tile_size,
            quality: value.quality,
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct GraphJobs {
    pub format: GraphFormat,
    pub output_dir: PathBuf,
    pub indexes: Vec<PathBuf>,
}

impl Default for GraphJobs {
    fn default() -> Self {
        Self {
            format: GraphFormat::Turtle,
            output_dir: PathBuf::from("rdf"),
            indexes: Vec::new(),
        }
    }
}

#[derive(Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct Config {
    pub namespaces: Namespaces,
    pub pyramid: PyramidConfig,
    pub graphs: GraphJobs,
}

impl Config {
    pub fn validate(&self) -> Result<(), String> {
        let tile_size = self.pyramid.tile_size;
        if tile_size == 0 || tile_size % 16 != 0 || tile_size > MAX_TILE_SIZE {
            return Err(format!(
                "pyramid.tile_size must be a multiple of 16 within 16..={MAX_TILE_SIZE}, got {tile_size}"
            ));
        }
        if !(1..=100).contains(&self.pyramid.quality) {
            return Err(format!(
                "pyramid.quality must be within 1..=100, got {}",
                self.pyramid.quality
            ));
        }
        for (name, ns) in [
            ("crm", &self.namespaces.crm),
            ("aa", &self.namespaces.aa),
            ("image", &self.namespaces.image),
            ("schema", &self.namespaces.schema),
        ] {
            if ns.cannot_be_a_base() {
                return Err(format!("namespaces.{name} is not a hierarchical IRI: {ns}"));
            }
        }
        Ok(())
    }
}
