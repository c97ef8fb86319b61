//! Test utilities shared by unit tests, integration tests and benches
//!
//! Frame builders for well-formed and deliberately broken wire data, a sink
//! that records every notification, and a byte source driven by a script.

#![cfg(any(test, feature = "benchmark"))]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use crate::sink::DisplaySink;
use crate::source::ByteSource;
use crate::types::{ChannelId, FRAME_SIZE, ProtocolFrame, StatusColor, StatusFlags};
use crate::{Result, TelemetryError};

/// Function code used by generated frames.
pub const TEST_FUNCTION: u8 = 0x01;

/// The reference frame: status `0b101`, values `[1.23, 4.56, 7.89]`.
pub fn reference_frame() -> [u8; FRAME_SIZE] {
    frame_bytes(StatusFlags::new(0b101), [1.23, 4.56, 7.89])
}

/// Encode one valid frame.
pub fn frame_bytes(status: StatusFlags, values: [f32; 3]) -> [u8; FRAME_SIZE] {
    ProtocolFrame::new(status, TEST_FUNCTION, values).encode()
}

/// Values carried by the `index`-th frame of [`frame_stream`].
///
/// Every channel changes from one frame to the next, and the channel number
/// is folded in so that a frame stitched together from two neighbours never
/// matches a generated one.
pub fn stream_values(index: usize) -> [f32; 3] {
    let base = index as f32;
    [base + 0.25, base + 1000.5, base + 2000.75]
}

/// `count` valid, consecutive frames with distinct values.
pub fn frame_stream(count: usize) -> Vec<u8> {
    (0..count)
        .flat_map(|i| frame_bytes(StatusFlags::new((i % 8) as u8), stream_values(i)))
        .collect()
}

/// One recorded sink call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub channel: ChannelId,
    pub text: String,
    pub color: StatusColor,
}

impl Notification {
    pub fn new(channel: ChannelId, text: impl Into<String>, color: StatusColor) -> Self {
        Self { channel, text: text.into(), color }
    }
}

/// Sink that keeps every notification in order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    notifications: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn notifications(&self) -> Vec<Notification> {
        self.lock().clone()
    }

    /// Notifications for one channel, in order.
    pub fn for_channel(&self, channel: ChannelId) -> Vec<Notification> {
        self.lock().iter().filter(|n| n.channel == channel).cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Notification>> {
        self.notifications.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DisplaySink for RecordingSink {
    fn notify_channel_update(&self, channel: ChannelId, text: &str, color: StatusColor) {
        self.lock().push(Notification::new(channel, text, color));
    }
}

/// One step of a [`ScriptedSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    /// Return these bytes (split across reads if the buffer is smaller)
    Data(Vec<u8>),
    /// Nothing arrives within the read timeout
    Quiet,
    /// The read fails
    Fail,
}

/// Byte source that plays a fixed script, then reports exhaustion.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    steps: VecDeque<ScriptStep>,
}

impl ScriptedSource {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self { steps: steps.into() }
    }
}

#[async_trait::async_trait]
impl ByteSource for ScriptedSource {
    async fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        match self.steps.pop_front() {
            Some(ScriptStep::Data(mut data)) => {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    self.steps.push_front(ScriptStep::Data(data.split_off(n)));
                }
                Ok(n)
            }
            Some(ScriptStep::Quiet) | None => {
                tokio::time::sleep(timeout).await;
                Ok(0)
            }
            Some(ScriptStep::Fail) => Err(TelemetryError::device_failed("scripted read failure")),
        }
    }

    fn describe(&self) -> String {
        format!("scripted:<{} steps>", self.steps.len())
    }

    fn is_exhausted(&self) -> bool {
        self.steps.is_empty()
    }
}
