pub mod loader;
pub mod schema;

pub use loader::{DataLoadError, PipeData, load_catalog, load_engine_config, load_pipe_data};
