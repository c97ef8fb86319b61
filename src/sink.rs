//! Display sink boundary

use tracing::info;

use crate::types::{ChannelId, StatusColor};

/// Receives per-channel change notifications from the projector.
///
/// Called with the display state lock held, so implementations must return
/// promptly and must not call back into the pipeline.
pub trait DisplaySink: Send + Sync + 'static {
    /// A channel's value or fault flag changed.
    ///
    /// `text` is the value formatted to two decimals, or `"N/A"` when not finite.
    fn notify_channel_update(&self, channel: ChannelId, text: &str, color: StatusColor);
}

/// Sink that logs each update as a display row.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DisplaySink for TracingSink {
    fn notify_channel_update(&self, channel: ChannelId, text: &str, color: StatusColor) {
        info!(
            channel = channel.label(),
            rgb = %format!("{:06X}", color.rgb()),
            "{}",
            format_row(channel, text, color)
        );
    }
}

/// One display row, e.g. `M1: 12.34V  status: FAULT`.
pub fn format_row(channel: ChannelId, text: &str, color: StatusColor) -> String {
    let status = match color {
        StatusColor::Normal => "OK",
        StatusColor::Fault => "FAULT",
    };
    format!("{}: {}V  status: {}", channel.label(), text, status)
}

/// Row shown before a channel has been observed.
pub fn placeholder_row(channel: ChannelId) -> String {
    format_row(channel, "---", StatusColor::Normal)
}
