//! # vision-client
//!
//! Device-control client for the Vision WiFi dashcam: connection and
//! session lifecycle, correlated request dispatch over one TCP channel,
//! and event fan-out to registered observers.
//!
//! The architecture is a single-writer actor: one background task owns the
//! transport, the session state machine, and the pending-request set, and
//! every public entry point hands off to it through a command channel.
//! Observer delivery runs on its own task so a slow observer never stalls
//! protocol processing.
//!
//! ```no_run
//! use vision_client::{ClientConfig, VisionClient};
//! use vision_core::FileFilter;
//!
//! # async fn example() -> Result<(), vision_client::ClientError> {
//! let client = VisionClient::new(ClientConfig::default())?;
//! client.connect().await?;
//! let chunk = client.list_files(FileFilter::Photo, 0, 20).await?;
//! println!("{} of {} files", chunk.files.len(), chunk.total);
//! client.disconnect().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod collab;
pub mod config;
pub mod correlator;
pub mod error;
pub mod events;
pub mod files;
pub mod observers;
pub mod session;
pub mod transport;

pub use client::VisionClient;
pub use collab::{
    AlwaysReachable, NullRenderer, Reachability, RecordingRenderer, RendererError, StreamRenderer,
    SurfaceHandle,
};
pub use config::{load_config, ClientConfig, ConfigError};
pub use error::ClientError;
pub use events::{VisionEvent, VisionObserver};
pub use observers::ObserverId;
pub use session::SessionState;
