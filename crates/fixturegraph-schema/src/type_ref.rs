//! Type witnesses.
//!
//! A [`TypeRef`] is the declared type of a member or constructor parameter,
//! with generic arguments kept explicit (`List<Child>`, `Map<Locale, Target>`).
//! The scanner resolves element and key/value types from these witnesses once,
//! so the wiring pass never has to re-derive them.
//!
//! Surface syntax (used by schema documents and by `Display`):
//! - scalars: `Bool`, `Short`, `Int`, `Long`, `Float`, `Double`, `Text`, `Date`
//!   (with the aliases `Boolean`, `Integer`, `String`, `DateTime`, `Timestamp`)
//! - records/enums: any other identifier (`Parent`, `org.acme.Child`)
//! - collections: `List<T>`, `Set<T>`, `Collection<T>`
//! - maps: `Map<K, V>`
//! - arrays: `T[]`

use nom::{
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char as pchar, multispace0},
    combinator::{all_consuming, opt, recognize},
    multi::{many0, separated_list1},
    sequence::{delimited, preceded, tuple},
    IResult,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub type TypeName = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScalarKind {
    Bool,
    Short,
    Int,
    Long,
    Float,
    Double,
    Text,
    Date,
}

impl ScalarKind {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "Bool" | "Boolean" => ScalarKind::Bool,
            "Short" => ScalarKind::Short,
            "Int" | "Integer" => ScalarKind::Int,
            "Long" => ScalarKind::Long,
            "Float" => ScalarKind::Float,
            "Double" => ScalarKind::Double,
            "Text" | "String" => ScalarKind::Text,
            "Date" | "DateTime" | "Timestamp" => ScalarKind::Date,
            _ => return None,
        })
    }

    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            ScalarKind::Short
                | ScalarKind::Int
                | ScalarKind::Long
                | ScalarKind::Float
                | ScalarKind::Double
        )
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarKind::Bool => "Bool",
            ScalarKind::Short => "Short",
            ScalarKind::Int => "Int",
            ScalarKind::Long => "Long",
            ScalarKind::Float => "Float",
            ScalarKind::Double => "Double",
            ScalarKind::Text => "Text",
            ScalarKind::Date => "Date",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CollectionKind {
    List,
    Set,
    Collection,
}

impl CollectionKind {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "List" => CollectionKind::List,
            "Set" => CollectionKind::Set,
            "Collection" => CollectionKind::Collection,
            _ => return None,
        })
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CollectionKind::List => "List",
            CollectionKind::Set => "Set",
            CollectionKind::Collection => "Collection",
        };
        f.write_str(name)
    }
}

/// Declared type of a member, including its generic witnesses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TypeRef {
    Scalar(ScalarKind),
    /// A record, enum or abstract type declared in the schema.
    Named(TypeName),
    Array(Box<TypeRef>),
    Collection {
        kind: CollectionKind,
        element: Box<TypeRef>,
    },
    Map {
        key: Box<TypeRef>,
        value: Box<TypeRef>,
    },
}

impl TypeRef {
    pub fn named(name: impl Into<TypeName>) -> Self {
        TypeRef::Named(name.into())
    }

    pub fn text() -> Self {
        TypeRef::Scalar(ScalarKind::Text)
    }

    pub fn int() -> Self {
        TypeRef::Scalar(ScalarKind::Int)
    }

    pub fn long() -> Self {
        TypeRef::Scalar(ScalarKind::Long)
    }

    pub fn double() -> Self {
        TypeRef::Scalar(ScalarKind::Double)
    }

    pub fn bool() -> Self {
        TypeRef::Scalar(ScalarKind::Bool)
    }

    pub fn date() -> Self {
        TypeRef::Scalar(ScalarKind::Date)
    }

    pub fn list(element: TypeRef) -> Self {
        TypeRef::Collection {
            kind: CollectionKind::List,
            element: Box::new(element),
        }
    }

    pub fn set(element: TypeRef) -> Self {
        TypeRef::Collection {
            kind: CollectionKind::Set,
            element: Box::new(element),
        }
    }

    pub fn map(key: TypeRef, value: TypeRef) -> Self {
        TypeRef::Map {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    pub fn array(element: TypeRef) -> Self {
        TypeRef::Array(Box::new(element))
    }

    /// The schema type this witness names, if it is a bare named type.
    pub fn named_type(&self) -> Option<&str> {
        match self {
            TypeRef::Named(name) => Some(name.as_str()),
            _ => None,
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, TypeRef::Collection { .. })
    }

    pub fn is_map(&self) -> bool {
        matches!(self, TypeRef::Map { .. })
    }

    pub fn is_array(&self) -> bool {
        matches!(self, TypeRef::Array(_))
    }

    /// Collections, maps and arrays: members with no single-record context.
    pub fn is_container(&self) -> bool {
        self.is_collection() || self.is_map() || self.is_array()
    }

    pub fn collection_kind(&self) -> Option<CollectionKind> {
        match self {
            TypeRef::Collection { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Element witness of a collection or array.
    pub fn element_type(&self) -> Option<&TypeRef> {
        match self {
            TypeRef::Collection { element, .. } | TypeRef::Array(element) => Some(&**element),
            _ => None,
        }
    }

    pub fn key_value_types(&self) -> Option<(&TypeRef, &TypeRef)> {
        match self {
            TypeRef::Map { key, value } => Some((&**key, &**value)),
            _ => None,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Scalar(kind) => write!(f, "{kind}"),
            TypeRef::Named(name) => write!(f, "{name}"),
            TypeRef::Array(element) => write!(f, "{element}[]"),
            TypeRef::Collection { kind, element } => write!(f, "{kind}<{element}>"),
            TypeRef::Map { key, value } => write!(f, "Map<{key}, {value}>"),
        }
    }
}

// ============================================================================
// Parser
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeRefParseError {
    #[error("malformed type `{input}`")]
    Syntax { input: String },

    #[error("`{name}` expects {expected} type argument(s), got {actual}")]
    Arity {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("`{name}` is not a generic type")]
    NotGeneric { name: String },
}

struct RawType<'a> {
    name: &'a str,
    args: Option<Vec<RawType<'a>>>,
    dims: usize,
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '$'
}

fn parse_ident(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        take_while1(is_ident_start),
        take_while(is_ident_continue),
    )))(input)
}

fn raw_type(input: &str) -> IResult<&str, RawType<'_>> {
    let (input, name) = preceded(multispace0, parse_ident)(input)?;
    let (input, args) = opt(delimited(
        preceded(multispace0, pchar('<')),
        separated_list1(preceded(multispace0, pchar(',')), raw_type),
        preceded(multispace0, pchar('>')),
    ))(input)?;
    let (input, dims) = many0(preceded(multispace0, tag("[]")))(input)?;
    let (input, _) = multispace0(input)?;
    Ok((
        input,
        RawType {
            name,
            args,
            dims: dims.len(),
        },
    ))
}

fn resolve(raw: RawType<'_>) -> Result<TypeRef, TypeRefParseError> {
    let base = match raw.args {
        None => match ScalarKind::from_name(raw.name) {
            Some(kind) => TypeRef::Scalar(kind),
            None => TypeRef::Named(raw.name.to_string()),
        },
        Some(args) => {
            let actual = args.len();
            let mut args = args
                .into_iter()
                .map(resolve)
                .collect::<Result<Vec<_>, _>>()?;
            let arity = |expected: usize| TypeRefParseError::Arity {
                name: raw.name.to_string(),
                expected,
                actual,
            };
            if let Some(kind) = CollectionKind::from_name(raw.name) {
                let element = args.pop().filter(|_| actual == 1).ok_or_else(|| arity(1))?;
                TypeRef::Collection {
                    kind,
                    element: Box::new(element),
                }
            } else if raw.name == "Map" {
                if actual != 2 {
                    return Err(arity(2));
                }
                let value = args.remove(1);
                let key = args.remove(0);
                TypeRef::map(key, value)
            } else {
                return Err(TypeRefParseError::NotGeneric {
                    name: raw.name.to_string(),
                });
            }
        }
    };

    Ok((0..raw.dims).fold(base, |ty, _| TypeRef::array(ty)))
}

pub fn parse_type_ref(text: &str) -> Result<TypeRef, TypeRefParseError> {
    let (_, raw) = all_consuming(raw_type)(text).map_err(|_| TypeRefParseError::Syntax {
        input: text.to_string(),
    })?;
    resolve(raw)
}

impl FromStr for TypeRef {
    type Err = TypeRefParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_type_ref(s)
    }
}

impl TryFrom<String> for TypeRef {
    type Error = TypeRefParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        parse_type_ref(&value)
    }
}

impl From<TypeRef> for String {
    fn from(value: TypeRef) -> Self {
        value.to_string()
    }
}
