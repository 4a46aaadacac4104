pub mod scene;
pub mod focus;
pub mod settings;
pub mod command_builder;
pub mod executor;
pub mod blur_cache;
pub mod applicator;
pub mod state;
pub mod reconciler;
pub mod sway_ipc;
pub mod event_loop;
pub mod duration;
pub mod error;

#[cfg(test)]
mod testing;

pub use scene::{NodeType, Resolution, SceneNode};
pub use focus::{is_output_focused, wants_blur};
pub use settings::{BlurSettings, OutputWallpapers, RetryPolicy};
pub use command_builder::CommandBuilder;
pub use executor::{CommandRunner, ExternalCommand, ProcessExecutor};
pub use blur_cache::BlurCache;
pub use applicator::{ApplyOutcome, WallpaperApplicator};
pub use state::OutputBlurState;
pub use reconciler::{OutputContext, Reconciler};
pub use sway_ipc::{Event, EventSource, SwayIpc, TreeClient, TreeSource};
pub use duration::parse_duration;
pub use error::{WayblError, Result, ErrorReporting};
