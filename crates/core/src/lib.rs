pub mod config;
pub mod domain;
pub mod errors;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::channel::{Channel, ChannelType, NewChannel};
pub use domain::post::{Post, PostDraft};
pub use domain::team::Team;
pub use domain::user::UserProfile;
pub use errors::{ClientError, ErrorDetail};
