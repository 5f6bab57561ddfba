use fixturegraph_schema::TypeName;
use thiserror::Error;

pub type MakeResult<T> = Result<T, MakeError>;

/// A type the graph needs cannot be introspected or instantiated.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("type `{0}` is not declared in the schema")]
    UnknownType(TypeName),

    #[error("type `{name}` cannot be instantiated: {reason}")]
    NotInstantiable { name: TypeName, reason: String },

    #[error("{owner}#{member} requires `{target}`, which is not a concrete entity")]
    UnresolvableReference {
        owner: TypeName,
        member: String,
        target: TypeName,
    },

    #[error("required references form a cycle: {}", .path.join(" -> "))]
    CyclicRequirement { path: Vec<TypeName> },
}

/// A maker could not produce a value.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("cannot synthesize {member}: {message}")]
    Constraint { member: String, message: String },

    #[error("embedded records nest too deeply: {}", .path.join(" -> "))]
    RecursiveEmbedding { path: Vec<TypeName> },

    #[error("maker failed: {0}")]
    Custom(String),
}

/// The persistence collaborator refused an operation.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("persistence rejected {entity}: {reason}")]
    Rejected { entity: String, reason: String },

    #[error("transaction error: {0}")]
    Transaction(String),
}

#[derive(Debug, Error)]
pub enum MakeError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("no instance of `{0}` left in the sequence after persisting")]
    RootMissing(TypeName),
}
