mod json_file;
mod memory;

pub use json_file::JsonFileStateRepository;
pub use memory::InMemoryStateRepository;
