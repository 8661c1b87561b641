pub mod sdk_config;

pub use sdk_config::{ConfigSource, FileConfigSource, SdkConfig, StaticConfigSource};
