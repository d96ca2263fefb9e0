//! Owner-held sender slot initialised on first use.

use once_cell::sync::OnceCell;

use crate::{
    builder::{SenderBuildError, SenderBuilder},
    sender::FluentSender,
};

/// Builds a [`FluentSender`] the first time it is needed.
///
/// The component that owns the slot decides its lifetime; there is no
/// process-wide instance. A failed build is returned to the caller and
/// retried on the next [`get`](Self::get).
#[derive(Debug)]
pub struct LazySender {
    builder: SenderBuilder,
    cell: OnceCell<FluentSender>,
}

impl LazySender {
    pub fn new(builder: SenderBuilder) -> Self {
        Self {
            builder,
            cell: OnceCell::new(),
        }
    }

    /// The sender, building it on first call.
    pub fn get(&self) -> Result<&FluentSender, SenderBuildError> {
        self.cell.get_or_try_init(|| self.builder.build())
    }

    /// The sender if it has already been built.
    pub fn get_if_built(&self) -> Option<&FluentSender> {
        self.cell.get()
    }

    /// Close the sender if it was ever built.
    pub fn close(&self) {
        if let Some(sender) = self.cell.get() {
            sender.close();
        }
    }
}
