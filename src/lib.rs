//! Async ingestion of a framed serial telemetry link.
//!
//! Voltwatch reads a raw byte stream from a UART, cuts it into 18-byte frames,
//! validates each one (header, address, length, CRC8) and folds the three
//! channel values into a debounced display state. Only channels whose value or
//! fault flag changed are pushed to the [`DisplaySink`].
//!
//! # Architecture
//!
//! ```text
//! ByteSource ──► ingest task ──► ByteChannel ──► FrameDecoder ──► Projector ──► DisplaySink
//!                (bounded reads)   (SPSC ring)    (periodic, K     (lock with
//!                                                  frames/step)     timeout)
//! ```
//!
//! - **Ingest** runs continuously, reading in short timeouts and applying the
//!   configured [`Backpressure`] policy when the channel is full.
//! - **Decoding** runs on a fixed tick and is woken early when the channel
//!   fills, examining at most `max_frames_per_step` candidates per run.
//! - **Projection** compares each reading with the last snapshot and skips the
//!   update entirely if the state lock cannot be had in time.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use std::sync::Arc;
//! use std::time::Duration;
//! use voltwatch::{PipelineConfig, TracingSink, UpdateRate, Voltwatch};
//!
//! #[tokio::main]
//! async fn main() -> voltwatch::Result<()> {
//!     let mut pipeline =
//!         Voltwatch::replay("capture.bin", PipelineConfig::default(), Arc::new(TracingSink))?;
//!
//!     // the stream stays open for the pipeline's lifetime; watch a few updates
//!     let mut snapshots = pipeline.snapshots(UpdateRate::Max(5)).take(10);
//!     while let Some(snapshot) = snapshots.next().await {
//!         println!("{:?}", snapshot.channels);
//!     }
//!
//!     pipeline.wait_until_drained(Duration::from_secs(60)).await?;
//!     if let Some(stats) = pipeline.stop().await {
//!         println!("{} frames accepted", stats.decoder.frames_accepted);
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
pub mod config;
pub mod crc;
mod error;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Pipeline stages
pub mod channel;
pub mod decoder;
pub mod ingest;
pub mod pipeline;
pub mod projector;
pub mod scheduler;
pub mod sink;
pub mod source;
pub mod sources;
pub mod stream;

// Core exports
pub use error::*;
pub use types::*;

pub use config::{Backpressure, PipelineConfig, SerialConfig};
pub use crc::crc8;
pub use pipeline::{Pipeline, PipelineStats};
pub use sink::{DisplaySink, TracingSink};
pub use source::ByteSource;
pub use sources::ReplaySource;
#[cfg(feature = "serial")]
pub use sources::SerialSource;

use std::path::Path;
use std::sync::Arc;

/// Unified entry point for starting a pipeline on a live port or a capture.
///
/// # Examples
///
/// ## Serial port (feature `serial`)
/// ```rust,no_run
/// use std::sync::Arc;
/// use voltwatch::{PipelineConfig, TracingSink, Voltwatch};
///
/// # #[tokio::main]
/// # async fn main() -> voltwatch::Result<()> {
/// let pipeline = Voltwatch::serial(PipelineConfig::default(), Arc::new(TracingSink))?;
/// # Ok(())
/// # }
/// ```
pub struct Voltwatch;

impl Voltwatch {
    /// Open the serial port named in `config.serial` and start a pipeline on it.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The crate was built without the `serial` feature
    /// - The configuration is invalid
    /// - The port cannot be opened
    pub fn serial(config: PipelineConfig, sink: Arc<dyn DisplaySink>) -> Result<Pipeline> {
        #[cfg(feature = "serial")]
        {
            let source = SerialSource::open(&config.serial)?;
            let mut pipeline = Pipeline::new(config, sink)?;
            pipeline.start(source)?;
            Ok(pipeline)
        }

        #[cfg(not(feature = "serial"))]
        {
            let _ = (config, sink);
            Err(TelemetryError::feature_disabled("Serial port access", "serial"))
        }
    }

    /// Replay a capture file at the configured serial line rate.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the file cannot be read.
    pub fn replay<P: AsRef<Path>>(
        path: P,
        config: PipelineConfig,
        sink: Arc<dyn DisplaySink>,
    ) -> Result<Pipeline> {
        let source = ReplaySource::open(path)?.with_baud_rate(config.serial.baud_rate);
        let mut pipeline = Pipeline::new(config, sink)?;
        pipeline.start(source)?;
        Ok(pipeline)
    }
}
