pub mod enums;
pub mod schema;
pub mod settings;
pub mod source;
pub mod validators;

pub use enums::{DeviceType, Environment, LogLevel, ModelSize, StorageProvider};
pub use settings::{AiServiceSettings, Secret};
pub use source::EnvSource;
