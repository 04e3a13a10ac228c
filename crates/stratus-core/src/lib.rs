pub mod apimodel;
pub mod config;
pub mod kubeconfig;
pub mod resource_id;

pub use apimodel::*;
pub use config::StratusConfig;
pub use kubeconfig::KubeConfig;
pub use resource_id::ResourceId;
