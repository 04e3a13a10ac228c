//! stratus-template — typed deployment template and parameter documents.
//!
//! Templates and parameters are regenerated for every scale-up and then
//! patched at a small, fixed set of injection points:
//!
//! | Injection       | Document   | Key                  |
//! |-----------------|------------|----------------------|
//! | node count      | parameters | `{pool}Count`        |
//! | index offset    | parameters | `{pool}Offset`       |
//! | Windows index   | template   | variable `{pool}Index` |
//!
//! Everything else is passthrough and kept verbatim.
//!
//! # Components
//!
//! - **`document`** — `DeploymentTemplate`, `DeploymentParameters`, `ScaleInjections`
//! - **`normalize`** — `TemplateNormalizer` and the availability-set scale-up pass

pub mod document;
pub mod error;
pub mod normalize;

pub use document::{
    ArtifactFormat, DeploymentParameters, DeploymentTemplate, ParameterValue,
    RenderedArtifacts, ScaleInjections, TemplateResource,
};
pub use error::TemplateError;
pub use normalize::{TemplateNormalizer, VmasScaleUpNormalizer};
