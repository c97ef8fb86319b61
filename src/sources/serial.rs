//! Live serial source

use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, info, trace};

use crate::config::SerialConfig;
use crate::source::ByteSource;
use crate::{Result, TelemetryError};

/// A serial port opened 8N1 without flow control.
pub struct SerialSource {
    port: SerialStream,
    path: String,
    baud_rate: u32,
}

impl SerialSource {
    /// Open the port described by `config`.
    pub fn open(config: &SerialConfig) -> Result<Self> {
        let port = tokio_serial::new(&config.path, config.baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .open_native_async()
            .map_err(|e| {
                TelemetryError::device_failed_with_source(
                    format!("cannot open {} at {} baud", config.path, config.baud_rate),
                    Box::new(e),
                )
            })?;

        info!("Opened serial port {} at {} baud (8N1)", config.path, config.baud_rate);

        Ok(Self { port, path: config.path.clone(), baud_rate: config.baud_rate })
    }

    /// Transmit bytes to the device.
    ///
    /// The pipeline itself never writes; this is the hook for a command path.
    pub async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.port.write_all(bytes).await?;
        self.port.flush().await?;
        debug!("Wrote {} bytes to {}", bytes.len(), self.path);
        Ok(())
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }
}

#[async_trait::async_trait]
impl ByteSource for SerialSource {
    async fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize> {
        match tokio::time::timeout(timeout, self.port.read(buf)).await {
            Ok(Ok(n)) => {
                trace!("Read {} bytes from {}", n, self.path);
                Ok(n)
            }
            Ok(Err(e)) => Err(TelemetryError::device_failed_with_source(
                format!("read from {} failed", self.path),
                Box::new(e),
            )),
            // quiet line
            Err(_) => Ok(0),
        }
    }

    fn describe(&self) -> String {
        format!("serial:{}@{}", self.path, self.baud_rate)
    }
}
