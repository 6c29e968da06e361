mod batch;
pub use batch::*;
pub mod config;
pub use config::*;
mod error;
pub use error::*;
mod forward;
pub use forward::*;
pub mod hierarchy;
pub mod math;
mod reasoning;
pub use reasoning::*;
pub mod transforms;
pub use transforms::{dispatch_transform, TransformType};
