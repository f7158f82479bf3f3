pub mod config;
pub mod duration;
pub mod error;
pub mod image;
pub mod service;

pub use config::{CutoverConfig, GateConfig, ImageConfig, ProbeConfig, ServiceConfig};
pub use duration::parse_duration;
pub use error::{CoreError, CoreResult};
pub use image::{Digest, ImageRef, PinnedImage};
pub use service::*;
