//! Path-to-Index Resolution
//!
//! Maps a path of field names, element positions and the `length` token
//! through an SSZ type schema to the generalized index of the addressed node.
//!
//! Every top-level field or element occupies one 32-byte chunk, except that
//! basic elements of vectors and lists are packed several per chunk. Lists
//! (and bitlists) add one level on top of their data tree: the data root is
//! the left child and the length mix-in is the right child.

use std::fmt;

use num_bigint::BigUint;
use num_traits::One;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gindex::GeneralizedIndex;
use crate::hash::Digest;

const BYTES_PER_CHUNK: u128 = 32;
const BITS_PER_CHUNK: u128 = 256;

/// Type reached after the `length` token: the mix-in is a `uint64`.
static LENGTH_TYPE: SszType = SszType::Basic { size: 8 };
/// Type reached after indexing into a bitvector or bitlist.
static BIT_TYPE: SszType = SszType::Basic { size: 1 };

/// Errors from resolving a path against a schema.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Cannot descend into a basic type at path element {0}")]
    BasicType(String),

    #[error("Unknown field {0:?}")]
    UnknownField(String),

    #[error("Position {position} out of bounds (capacity {capacity})")]
    PositionOutOfBounds { position: u64, capacity: u64 },

    #[error("Path element {element} does not apply to a {kind}")]
    WrongPathElement { element: String, kind: &'static str },

    #[error("Chunk count of {0} overflows")]
    CapacityOverflow(&'static str),

    #[error("Basic type size must be a power of two up to 32 bytes, got {0}")]
    InvalidBasicSize(u64),
}

/// Abstract SSZ type schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SszType {
    /// Fixed-width primitive (`uint8` .. `uint256`, `boolean`)
    Basic { size: u64 },
    /// Ordered named fields
    Container { fields: Vec<Field> },
    /// Fixed-length homogeneous sequence
    Vector { elem: Box<SszType>, length: u64 },
    /// Variable-length homogeneous sequence with a capacity
    List { elem: Box<SszType>, limit: u64 },
    Bitvector { length: u64 },
    Bitlist { limit: u64 },
}

/// A named container field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: SszType,
}

impl SszType {
    #[must_use]
    pub fn uint64() -> Self {
        Self::Basic { size: 8 }
    }

    #[must_use]
    pub fn boolean() -> Self {
        Self::Basic { size: 1 }
    }

    /// `Bytes32`, a vector of 32 bytes
    #[must_use]
    pub fn bytes32() -> Self {
        Self::vector(Self::Basic { size: 1 }, 32)
    }

    #[must_use]
    pub fn vector(elem: SszType, length: u64) -> Self {
        Self::Vector {
            elem: Box::new(elem),
            length,
        }
    }

    #[must_use]
    pub fn list(elem: SszType, limit: u64) -> Self {
        Self::List {
            elem: Box::new(elem),
            limit,
        }
    }

    /// Build a container from `(name, type)` pairs in declaration order.
    pub fn container<N: Into<String>>(fields: impl IntoIterator<Item = (N, SszType)>) -> Self {
        Self::Container {
            fields: fields
                .into_iter()
                .map(|(name, ty)| Field {
                    name: name.into(),
                    ty,
                })
                .collect(),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Basic { .. } => "basic type",
            Self::Container { .. } => "container",
            Self::Vector { .. } => "vector",
            Self::List { .. } => "list",
            Self::Bitvector { .. } => "bitvector",
            Self::Bitlist { .. } => "bitlist",
        }
    }

    /// Whether the type mixes its length into the root.
    #[must_use]
    pub fn is_list(&self) -> bool {
        matches!(self, Self::List { .. } | Self::Bitlist { .. })
    }

    /// Bytes per element: the width of a basic type, a full chunk otherwise.
    pub fn item_length(&self) -> Result<u64, SchemaError> {
        match self {
            Self::Basic { size } if *size <= 32 && size.is_power_of_two() => Ok(*size),
            Self::Basic { size } => Err(SchemaError::InvalidBasicSize(*size)),
            _ => Ok(32),
        }
    }

    /// Number of 32-byte chunks the top-level elements of this type occupy.
    pub fn chunk_count(&self) -> Result<u128, SchemaError> {
        match self {
            Self::Basic { .. } => Ok(1),
            Self::Container { fields } => Ok(fields.len() as u128),
            Self::Bitvector { length: bits } | Self::Bitlist { limit: bits } => {
                Ok(u128::from(*bits).div_ceil(BITS_PER_CHUNK))
            }
            Self::Vector { elem, length: count } | Self::List { elem, limit: count } => {
                if matches!(**elem, Self::Basic { .. }) {
                    let bytes = u128::from(*count)
                        .checked_mul(u128::from(elem.item_length()?))
                        .ok_or(SchemaError::CapacityOverflow(self.kind()))?;
                    Ok(bytes.div_ceil(BYTES_PER_CHUNK))
                } else {
                    Ok(u128::from(*count))
                }
            }
        }
    }

    /// Where `element` sits among this type's top-level chunks.
    pub fn item_position(&self, element: &PathElement) -> Result<ItemPosition, SchemaError> {
        self.locate(element).map(|(position, _)| position)
    }

    /// Position of the addressed element, and the element's type.
    fn locate(&self, element: &PathElement) -> Result<(ItemPosition, &SszType), SchemaError> {
        match (self, element) {
            (Self::Container { fields }, PathElement::Field(name)) => {
                let pos = fields
                    .iter()
                    .position(|f| &f.name == name)
                    .ok_or_else(|| SchemaError::UnknownField(name.clone()))?;
                let ty = &fields[pos].ty;
                Ok((ItemPosition::spanning(pos as u128, 0, ty.item_length()?), ty))
            }
            (
                Self::Vector { elem, length: capacity } | Self::List { elem, limit: capacity },
                PathElement::Index(position),
            ) => {
                check_bounds(*position, *capacity)?;
                let size = elem.item_length()?;
                let start = u128::from(*position) * u128::from(size);
                let offset = (start % BYTES_PER_CHUNK) as u64;
                Ok((
                    ItemPosition::spanning(start / BYTES_PER_CHUNK, offset, size),
                    elem.as_ref(),
                ))
            }
            (
                Self::Bitvector { length: capacity } | Self::Bitlist { limit: capacity },
                PathElement::Index(position),
            ) => {
                check_bounds(*position, *capacity)?;
                let bit = u128::from(*position);
                let offset = ((bit % BITS_PER_CHUNK) / 8) as u64;
                Ok((ItemPosition::spanning(bit / BITS_PER_CHUNK, offset, 1), &BIT_TYPE))
            }
            _ => Err(SchemaError::WrongPathElement {
                element: element.to_string(),
                kind: self.kind(),
            }),
        }
    }
}

/// An element's chunk among its parent's top-level chunks, and the bytes it
/// occupies inside that chunk. Basic elements are packed, so several share a
/// chunk; anything composite spans a whole chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemPosition {
    pub chunk: u128,
    pub start: usize,
    pub end: usize,
}

impl ItemPosition {
    fn spanning(chunk: u128, start: u64, length: u64) -> Self {
        // Power-of-two sizes never straddle a chunk boundary
        Self {
            chunk,
            start: start as usize,
            end: (start + length) as usize,
        }
    }

    /// The element's bytes within its proven chunk.
    #[must_use]
    pub fn bytes<'a>(&self, chunk: &'a Digest) -> &'a [u8] {
        &chunk[self.start..self.end]
    }
}

fn check_bounds(position: u64, capacity: u64) -> Result<(), SchemaError> {
    if position >= capacity {
        return Err(SchemaError::PositionOutOfBounds { position, capacity });
    }
    Ok(())
}

/// One step of a path into a typed value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathElement {
    /// Container field by name
    Field(String),
    /// Vector/list/bitfield element by position
    Index(u64),
    /// The length mix-in of a list
    Length,
}

impl PathElement {
    /// Parse one textual path segment: `length` (or `__len__`) is the length
    /// token, decimal numbers are positions, anything else is a field name.
    #[must_use]
    pub fn parse(segment: &str) -> Self {
        match segment {
            "length" | "__len__" => Self::Length,
            _ => segment
                .parse::<u64>()
                .map_or_else(|_| Self::Field(segment.to_string()), Self::Index),
        }
    }
}

/// Parse a dotted path such as `body.blob_kzg_commitments.0`.
#[must_use]
pub fn parse_path(path: &str) -> Vec<PathElement> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .map(PathElement::parse)
        .collect()
}

impl From<&str> for PathElement {
    fn from(name: &str) -> Self {
        Self::Field(name.to_string())
    }
}

impl From<u64> for PathElement {
    fn from(position: u64) -> Self {
        Self::Index(position)
    }
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(name) => write!(f, "{name}"),
            Self::Index(position) => write!(f, "{position}"),
            Self::Length => write!(f, "length"),
        }
    }
}

fn pow2_ceil(x: u128, kind: &'static str) -> Result<u128, SchemaError> {
    x.max(1)
        .checked_next_power_of_two()
        .ok_or(SchemaError::CapacityOverflow(kind))
}

/// Resolve `path` against `schema` to the generalized index of the node it
/// addresses, relative to the root of a value of type `schema`.
pub fn resolve(schema: &SszType, path: &[PathElement]) -> Result<GeneralizedIndex, SchemaError> {
    resolve_item(schema, path).map(|(gindex, _)| gindex)
}

/// Like [`resolve`], also returning where the last path element sits in the
/// chunk at that index. The `length` token is a `uint64` in bytes `0..8` of
/// the mix-in; an empty path is the whole root chunk.
pub fn resolve_item(
    schema: &SszType,
    path: &[PathElement],
) -> Result<(GeneralizedIndex, ItemPosition), SchemaError> {
    let mut root = BigUint::one();
    let mut typ = schema;
    let mut position = ItemPosition::spanning(0, 0, BYTES_PER_CHUNK as u64);

    for element in path {
        if matches!(typ, SszType::Basic { .. }) {
            return Err(SchemaError::BasicType(element.to_string()));
        }

        if *element == PathElement::Length {
            if !typ.is_list() {
                return Err(SchemaError::WrongPathElement {
                    element: element.to_string(),
                    kind: typ.kind(),
                });
            }
            root = (root << 1u32) + 1u32;
            position = ItemPosition::spanning(1, 0, 8);
            typ = &LENGTH_TYPE;
            continue;
        }

        let (found, elem) = typ.locate(element)?;
        let width = pow2_ceil(typ.chunk_count()?, typ.kind())?;
        let base: u32 = if typ.is_list() { 2 } else { 1 };
        root = root * base * BigUint::from(width) + BigUint::from(found.chunk);
        position = found;
        typ = elem;
    }

    Ok((GeneralizedIndex::from_nonzero(root), position))
}
