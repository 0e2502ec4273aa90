pub mod generate;
pub mod visibility;

pub use generate::{MeshAction, MeshTag, generate_config, parse_mesh_tag};
pub use visibility::{DEFAULT_STATE, DefaultVisibility, VariantEntry, VisibilityConfig, variant_key};
