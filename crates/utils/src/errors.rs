use thiserror::Error;

/// Error type for graph-model operations.
///
/// These are contract violations of the host IR: a handle that does not name a live block or
/// instruction, an operation applied to the wrong kind of instruction, or a graph shape that the
/// requested primitive cannot work on.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IrError {
    /// The block handle does not name a live block.
    #[error("unknown block {0}")]
    UnknownBlock(usize),
    /// The instruction handle does not name a live instruction.
    #[error("unknown instruction {0}")]
    UnknownInst(usize),
    /// The block does not end in a terminator.
    #[error("block {0} has no terminator")]
    MissingTerminator(usize),
    /// An instruction was placed after the block's terminator, or a second terminator was
    /// added.
    #[error("block {0} is already terminated")]
    AlreadyTerminated(usize),
    /// The instruction was expected to be a PHI node.
    #[error("instruction {0} is not a phi node")]
    NotAPhi(usize),
    /// A PHI node names an incoming block that is not a predecessor of its block.
    #[error("phi {phi} names block {block} which is not a predecessor")]
    PhiPredecessorMismatch { phi: usize, block: usize },
    /// The instruction still has users and cannot be erased.
    #[error("instruction {0} still has users")]
    HasUsers(usize),
    /// A split point lies outside the block.
    #[error("split index {index} is out of range for block {block}")]
    InvalidSplitPoint { block: usize, index: usize },
    /// The procedure has no body.
    #[error("procedure `{0}` has no entry block")]
    NoEntryBlock(String),
    /// A structural invariant failed verification.
    #[error("verification failed: {0}")]
    Verify(String),
    /// JSON decoding of a module failed.
    #[error("module decode error: {0}")]
    Decode(String),
}

/// Errors raised while validating the obfuscation configuration.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// The split probability must lie in `[0, 1]`.
    #[error("split probability {0} is outside [0, 1]")]
    ProbabilityOutOfRange(f64),
}

/// Error type for metrics computation.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("CFG is empty or malformed")]
    EmptyCfg,
    #[error("procedure has no body")]
    NoBody,
}

/// Error type for transform operations.
#[derive(Debug, Error)]
pub enum TransformError {
    /// A block ends in a terminator that cannot be split around (exception-raising edges).
    #[error("unsupported control flow in block {block} of `{procedure}`")]
    UnsupportedControlFlow { procedure: String, block: usize },
    #[error("graph operation failed: {0}")]
    Ir(#[from] IrError),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Errors that can occur while driving obfuscation from the command line.
#[derive(Debug, Error)]
pub enum ObfuscateError {
    /// File read/write error.
    #[error("file error: {0}")]
    File(#[from] std::io::Error),
    /// Transform application failed.
    #[error("transform error: {0}")]
    Transform(#[from] TransformError),
    /// The input module could not be loaded.
    #[error("module error: {0}")]
    Module(#[from] IrError),
    /// Invalid opaque predicate family specified.
    #[error("invalid predicate: {0}")]
    InvalidPredicate(String),
    /// A requested procedure does not exist in the module.
    #[error("no procedure named `{0}`")]
    UnknownProcedure(String),
    /// Differential testing found inputs on which the transformed procedure behaves differently.
    #[error("`{procedure}` diverged on {mismatches} of {cases} inputs")]
    Diverged {
        procedure: String,
        mismatches: usize,
        cases: usize,
    },
    /// JSON serialization error.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
