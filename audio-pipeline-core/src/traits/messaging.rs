use crate::models::config::EncoderParameters;
use crate::models::error::PlatformError;
use crate::models::telemetry::WirePayload;

/// Handler invoked for every payload arriving on the encoder channel.
///
/// Fires on whatever thread the platform delivers messages from; keep the
/// work minimal and route, don't process.
pub type EncoderMessageHandler = Box<dyn Fn(WirePayload) + Send + Sync>;

/// Asynchronous message channel between the encoder node on the rendering
/// thread and the capture pipeline.
///
/// Delivery is fire-and-forget and FIFO per session. Cancellation is "stop
/// consuming": clearing the handler must not interrupt the producer.
pub trait MessageChannelCapability: Send + Sync {
    /// Install or clear the message handler. Payloads arriving with no
    /// handler installed are dropped by the platform.
    fn set_message_handler(&self, handler: Option<EncoderMessageHandler>);

    /// Post a parameter block to the encoder on the rendering thread.
    fn post_parameters(&self, parameters: &EncoderParameters) -> Result<(), PlatformError>;

    /// Release the channel. Idempotent; no messages are delivered after.
    fn close_channel(&self);

    fn disconnect(&self) -> Result<(), PlatformError>;
}
