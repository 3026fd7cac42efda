use std::sync::Arc;
use std::thread;

use veld_shape::Literal;

use crate::queue::TransferQueue;

#[test]
fn fifo_order() {
    let queue = TransferQueue::new();
    queue.push(Literal::from_slice(&[1i32], &[1]).unwrap());
    queue.push(Literal::from_slice(&[2i32], &[1]).unwrap());

    assert_eq!(queue.len(), 2);
    assert_eq!(queue.pop_blocking().to_vec::<i32>(), vec![1]);
    assert_eq!(queue.pop_blocking().to_vec::<i32>(), vec![2]);
    assert!(queue.is_empty());
}

#[test]
fn try_pop_does_not_block() {
    let queue = TransferQueue::new();
    assert!(queue.try_pop().is_none());
}

#[test]
fn pop_blocks_until_push() {
    let queue = Arc::new(TransferQueue::new());
    let consumer_queue = Arc::clone(&queue);

    let consumer = thread::spawn(move || consumer_queue.pop_blocking().to_vec::<i32>());

    thread::sleep(std::time::Duration::from_millis(10));
    queue.push(Literal::from_slice(&[7i32], &[1]).unwrap());

    assert_eq!(consumer.join().unwrap(), vec![7]);
}
