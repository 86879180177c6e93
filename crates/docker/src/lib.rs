// docker crate

pub mod docker;


// Re-export public items
pub use docker::{cleanup_containers, cleanup_labelled_containers, is_available, DockerRuntime};
