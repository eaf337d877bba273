pub mod config;
pub mod error;
pub mod events;
pub mod geometry;
pub mod processing {
    pub mod blur;
    pub mod color;
    pub mod layout;
    pub mod resize;
}
pub mod render {
    pub mod backend;
    pub mod canvas;
    pub mod controller;
    pub mod host;
    pub mod outline;
    pub mod overlay;
    pub mod snapshot;
}

pub use config::{BlurConfig, BlurConfigBuilder, BlurOptions, Configuration};
pub use error::Error;
pub use events::{FrameObserver, RefreshTrigger, Subscription};
pub use processing::blur::{blur_detached, stack_blur, BlurScratch};
pub use processing::color::Argb;
pub use render::controller::{ControllerKind, RenderController};
pub use render::outline::OutlineClipAdapter;
pub use render::overlay::OverlayBlur;
pub use render::snapshot::PipelineState;
