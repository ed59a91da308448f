//! Frame capture and pixel readback for render-target sensors.
//!
//! Each simulation tick a sensor asks its `FrameDispatcher` for a capture.
//! Accepted requests travel through a bounded `ReadbackQueue` to a
//! `PixelTransferWorker` thread, which copies the render target into host
//! memory and hands the result to a `DeliveryChannel`. The channel releases
//! frames to the consumer strictly in sequence order.
//!
//! ```text
//! tick -> FrameDispatcher -> ReadbackQueue -> PixelTransferWorker -> DeliveryChannel -> publisher
//! ```

mod config;
pub use config::*;

mod debug;
pub use debug::*;

mod delivery;
pub use delivery::*;

mod dispatcher;
pub use dispatcher::*;

mod error;
pub use error::*;

mod frame;
pub use frame::*;

mod pipeline;
pub use pipeline::*;

mod queue;
pub use queue::*;

mod request;
pub use request::*;

mod sensor;
pub use sensor::*;

mod software;
pub use software::*;

mod stats;
pub use stats::*;

mod target;
pub use target::*;

mod worker;
pub use worker::*;
