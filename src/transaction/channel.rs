use std::any::Any;

use crossbeam_channel::Sender;

use crate::error::DriverError;

use super::TxHandle;

pub(super) type BoxedResponse = Result<Box<dyn Any + Send>, DriverError>;
pub(super) type BoxedOperation = Box<dyn FnOnce(&mut TxHandle<'_>) -> BoxedResponse + Send>;

/// One caller operation queued for the command loop.
pub(super) struct Command {
    pub(super) op: BoxedOperation,
    pub(super) respond_to: Sender<BoxedResponse>,
}
