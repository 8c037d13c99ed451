use crate::tensor::Tensor;
use parking_lot::Mutex;
use std::collections::HashMap;

/// In-process mailbox connecting `Send` and `Recv` kernels.
///
/// A key holds either a tensor or a dead marker (`None`) left by a `Send`
/// whose input was dead. `Recv` takes the value, so each send is consumed
/// once.
#[derive(Debug, Default)]
pub struct Rendezvous {
    table: Mutex<HashMap<String, Option<Tensor>>>,
}

impl Rendezvous {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send(&self, key: &str, value: Option<Tensor>) {
        self.table.lock().insert(key.to_string(), value);
    }

    /// `None` if nothing was sent, `Some(None)` if a dead value was sent
    pub fn recv(&self, key: &str) -> Option<Option<Tensor>> {
        self.table.lock().remove(key)
    }

    pub fn pending(&self) -> usize {
        self.table.lock().len()
    }
}
