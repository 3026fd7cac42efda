//! Side-channel transfer queues.
//!
//! Each device carries one infeed and one outfeed [`TransferQueue`],
//! independent of normal argument passing. Running programs consume infeed
//! values and produce outfeed values; the client pushes and pops from the
//! host side. Pops block the calling thread until a value arrives.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};
use veld_shape::Literal;

/// Unbounded FIFO of host literals with blocking consumption.
#[derive(Debug, Default)]
pub struct TransferQueue {
    items: Mutex<VecDeque<Literal>>,
    condvar: Condvar,
}

impl TransferQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, literal: Literal) {
        self.items.lock().push_back(literal);
        self.condvar.notify_one();
    }

    /// Pop the oldest value, blocking until one is available.
    pub fn pop_blocking(&self) -> Literal {
        let mut items = self.items.lock();
        loop {
            if let Some(literal) = items.pop_front() {
                return literal;
            }
            self.condvar.wait(&mut items);
        }
    }

    /// Non-blocking pop, for consumers that treat an empty queue as an
    /// error instead of waiting.
    pub fn try_pop(&self) -> Option<Literal> {
        self.items.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}
