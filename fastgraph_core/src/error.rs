//! Error types shared by every fastgraph component.

use crate::graph::NodeDef;
use thiserror::Error;

/// Result alias used throughout fastgraph
pub type FastGraphResult<T> = Result<T, FastGraphError>;

/// Everything that can go wrong while building or running a graph
#[derive(Debug, Error)]
pub enum FastGraphError {
    /// A kernel or the executor was handed an input that breaks its contract
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An operation was attempted on state that is not ready for it
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// An invariant of the executor itself was violated
    #[error("Internal error: {0}")]
    Internal(String),

    /// A kernel reported a failure from its compute step
    #[error("Kernel '{node}' failed: {message}")]
    Kernel { node: String, message: String },

    /// The kernel factory could not instantiate a kernel
    #[error("Failed to create kernel for '{node}': {message}")]
    KernelCreation { node: String, message: String },

    /// The graph definition could not be turned into an executable graph
    #[error("Graph error: {0}")]
    Graph(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl FastGraphError {
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        FastGraphError::InvalidArgument(msg.into())
    }

    pub fn failed_precondition<S: Into<String>>(msg: S) -> Self {
        FastGraphError::FailedPrecondition(msg.into())
    }

    pub fn internal<S: Into<String>>(msg: S) -> Self {
        FastGraphError::Internal(msg.into())
    }

    pub fn graph<S: Into<String>>(msg: S) -> Self {
        FastGraphError::Graph(msg.into())
    }

    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        FastGraphError::NotFound(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        FastGraphError::Config(msg.into())
    }

    /// Append a summary of `def` to the message so the failing node can be
    /// identified from the error alone.
    pub fn attach_def(self, def: &NodeDef) -> Self {
        let summary = def.summary();
        let with_node = |msg: String| format!("{}\n\t [[Node: {}]]", msg, summary);
        match self {
            FastGraphError::InvalidArgument(msg) => FastGraphError::InvalidArgument(with_node(msg)),
            FastGraphError::FailedPrecondition(msg) => {
                FastGraphError::FailedPrecondition(with_node(msg))
            }
            FastGraphError::Internal(msg) => FastGraphError::Internal(with_node(msg)),
            FastGraphError::Graph(msg) => FastGraphError::Graph(with_node(msg)),
            FastGraphError::NotFound(msg) => FastGraphError::NotFound(with_node(msg)),
            FastGraphError::Config(msg) => FastGraphError::Config(with_node(msg)),
            FastGraphError::Serialization(msg) => FastGraphError::Serialization(with_node(msg)),
            FastGraphError::Io(err) => {
                FastGraphError::Io(std::io::Error::new(err.kind(), with_node(err.to_string())))
            }
            FastGraphError::Kernel { message, .. } => FastGraphError::Kernel {
                node: summary,
                message,
            },
            FastGraphError::KernelCreation { message, .. } => FastGraphError::KernelCreation {
                node: summary,
                message,
            },
        }
    }

    /// Tag an error returned by a kernel's compute step.
    ///
    /// Contract violations keep their kind; anything else becomes a
    /// [`Kernel`](FastGraphError::Kernel) failure naming the node.
    pub fn into_compute_failure(self, def: &NodeDef) -> Self {
        match self {
            FastGraphError::InvalidArgument(_)
            | FastGraphError::FailedPrecondition(_)
            | FastGraphError::Internal(_)
            | FastGraphError::Kernel { .. } => self.attach_def(def),
            other => FastGraphError::Kernel {
                node: def.summary(),
                message: other.to_string(),
            },
        }
    }

    /// True for errors raised by input contract checks.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, FastGraphError::InvalidArgument(_))
    }

    pub fn is_failed_precondition(&self) -> bool {
        matches!(self, FastGraphError::FailedPrecondition(_))
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, FastGraphError::Internal(_))
    }
}

impl From<serde_json::Error> for FastGraphError {
    fn from(err: serde_json::Error) -> Self {
        FastGraphError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for FastGraphError {
    fn from(err: serde_yaml::Error) -> Self {
        FastGraphError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for FastGraphError {
    fn from(err: toml::de::Error) -> Self {
        FastGraphError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attach_def_keeps_kind() {
        let def = NodeDef::new("scale", "Scale").with_input("x");
        let err = FastGraphError::invalid_argument("0-th input expects a ref type").attach_def(&def);
        assert!(err.is_invalid_argument());
        let msg = err.to_string();
        assert!(msg.contains("0-th input expects a ref type"));
        assert!(msg.contains("scale = Scale[](x)"));
    }

    #[test]
    fn test_attach_def_names_kernel() {
        let def = NodeDef::new("broken", "Identity");
        let err = FastGraphError::Kernel {
            node: String::new(),
            message: "boom".into(),
        }
        .attach_def(&def);
        match err {
            FastGraphError::Kernel { node, message } => {
                assert_eq!(node, "broken = Identity[]()");
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_attach_def_covers_every_message() {
        let def = NodeDef::new("load", "Const");
        let errors = [
            FastGraphError::graph("bad edge"),
            FastGraphError::not_found("missing"),
            FastGraphError::config("bad key"),
            FastGraphError::Serialization("bad literal".into()),
            FastGraphError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk")),
        ];
        for err in errors {
            let msg = err.attach_def(&def).to_string();
            assert!(msg.contains("[[Node: load = Const[]()]]"), "{msg}");
        }
    }

    #[test]
    fn test_compute_failure_kinds() {
        let def = NodeDef::new("read", "Identity");
        let err = FastGraphError::config("no such file").into_compute_failure(&def);
        match err {
            FastGraphError::Kernel { node, message } => {
                assert_eq!(node, "read = Identity[]()");
                assert!(message.contains("no such file"));
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = FastGraphError::failed_precondition("not ready").into_compute_failure(&def);
        assert!(err.is_failed_precondition());
        assert!(err.to_string().contains("[[Node: read = Identity[]()]]"));
    }
}
