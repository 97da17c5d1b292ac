//! Reference fields
//!
//! The backend populates some references and leaves others as ids, so the
//! same field can arrive as `"o-1"` or `{ "_id": "o-1", "name": "..." }`.
//! Documents with virtuals enabled carry both `_id` and `id`.

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// A reference that is either a bare id or a populated sub-document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reference {
    Id(String),
    Document(ReferenceDocument),
}

/// Populated sub-document; only its id survives normalization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDocument")]
pub struct ReferenceDocument {
    pub id: String,
}

#[derive(Deserialize)]
struct RawDocument {
    #[serde(default)]
    id: Option<String>,
    #[serde(default, rename = "_id")]
    object_id: Option<String>,
}

impl TryFrom<RawDocument> for ReferenceDocument {
    type Error = ModelError;

    fn try_from(raw: RawDocument) -> Result<Self, Self::Error> {
        Ok(Self {
            id: either("id", raw.id, raw.object_id)?,
        })
    }
}

impl Reference {
    /// Borrow the referenced id
    pub fn id(&self) -> &str {
        match self {
            Reference::Id(id) => id,
            Reference::Document(doc) => &doc.id,
        }
    }

    /// Collapse to the canonical bare id
    pub fn into_id(self) -> String {
        match self {
            Reference::Id(id) => id,
            Reference::Document(doc) => doc.id,
        }
    }
}

impl From<&str> for Reference {
    fn from(id: &str) -> Self {
        Reference::Id(id.to_string())
    }
}

/// Resolve a field sent under its canonical name, an alternate name, or both
///
/// The canonical value wins when both are present.
pub fn either<T>(field: &'static str, canonical: Option<T>, alternate: Option<T>) -> ModelResult<T> {
    canonical.or(alternate).ok_or(ModelError::Incomplete(field))
}

/// Same as [`either`] for reference fields, collapsed to the bare id
pub fn either_ref(
    field: &'static str,
    canonical: Option<Reference>,
    alternate: Option<Reference>,
) -> ModelResult<String> {
    either(field, canonical, alternate).map(Reference::into_id)
}
