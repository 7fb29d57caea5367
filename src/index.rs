//! JSON indexes driving the graph builders and the pyramid batches.
//!
//! Both shapes are objects keyed by an identifier. Key order is kept as it
//! appears in the file, which decides the "first" image of an artifact.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};

use crate::{Error, ErrorContext, ErrorDetail};

/// `{artifactId: [imageId, ...]}`
pub type ArtifactIndex = IndexMap<String, ImageIds>;

/// `{objectId: {"archival"?: path, "images"?: path, "restricted"?: path}}`
pub type ExtantIndex = IndexMap<String, ExtantEntry>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageIds(pub Vec<String>);

impl<'de> Deserialize<'de> for ImageIds {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ids = Option::<Vec<String>>::deserialize(deserializer)?;
        Ok(Self(ids.unwrap_or_default()))
    }
}

impl ImageIds {
    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for ImageIds {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ExtantEntry {
    #[serde(default)]
    pub archival: Option<String>,
    #[serde(default)]
    pub images: Option<String>,
    #[serde(default)]
    pub restricted: Option<String>,
}

impl ExtantEntry {
    /// Archival first, then images, then restricted. Empty strings count as absent.
    pub fn select_source(&self) -> Option<&str> {
        [&self.archival, &self.images, &self.restricted]
            .into_iter()
            .filter_map(Option::as_deref)
            .find(|path| !path.is_empty())
    }
}

async fn load<T, P>(path: P) -> Result<T, Error>
where
    T: for<'de> Deserialize<'de>,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let ctx = ErrorContext::new(path);
    let src = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ctx.error(ErrorDetail::ReadIndex(e)))?;
    serde_json::from_str(&src).map_err(|e| ctx.error(ErrorDetail::ParseIndex(e)))
}

pub async fn load_artifact_index(path: impl AsRef<Path>) -> Result<ArtifactIndex, Error> {
    load(path).await
}

pub async fn load_extant_index(path: impl AsRef<Path>) -> Result<ExtantIndex, Error> {
    load(path).await
}
