//! This mod holds the library's client-facing API: configuration, validated
//! options, and the factory that wires a node together.
mod configuration;
mod options;
mod wiring;

pub use configuration::ClusterInfo;
pub use configuration::NodeConfig;
pub use options::NodeOptions;
pub use wiring::try_create_chat_node;
pub use wiring::ChatNodeHandle;
pub use wiring::NodeCreationError;
