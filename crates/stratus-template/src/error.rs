//! Template pipeline errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("failed to parse deployment {document}: {source}")]
    Parse {
        document: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize deployment {document}: {source}")]
    Serialize {
        document: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("template has no {0} resource")]
    MissingResource(&'static str),
}
