//! Seed scenario 5 (channel rendezvous) plus P2 (FIFO per sender) and P3 (channel
//! conservation: sent = buffered + delivered + dropped-on-close).

use std::sync::Arc;

use coro_rt::prelude::*;

#[tokio::test]
async fn two_senders_two_receivers_each_value_delivered_once() {
    let executor = TokioExecutor::current();
    let context = CoroutineContext::new(executor);
    // Capacity defaults to 1 for a channel auto-created by a sending/receiving step
    // (spec §4.F), so this channel doesn't need to be pre-created with an explicit
    // capacity.
    let id: ChannelId<String> = ChannelId::new();
    let scope = CoroutineScope::new(Arc::clone(&context));

    let sender = Arc::new(Coroutine::first(send(id)));
    let receiver = Arc::new(
        Coroutine::<(), String>::first(receive(id)).then(apply(|s: String| s.to_uppercase())),
    );

    let s1 = scope.spawn(Arc::clone(&sender), "123test".to_string());
    let s2 = scope.spawn(Arc::clone(&sender), "456test".to_string());
    let r1 = scope.spawn(Arc::clone(&receiver), ());
    let r2 = scope.spawn(Arc::clone(&receiver), ());

    scope.join().await;

    s1.get_result().await.unwrap();
    s2.get_result().await.unwrap();
    let mut received = vec![r1.get_result().await.unwrap(), r2.get_result().await.unwrap()];
    received.sort();
    assert_eq!(received, vec!["123TEST".to_string(), "456TEST".to_string()]);

    assert!(s1.is_done() && s2.is_done() && r1.is_done() && r2.is_done());
}

#[tokio::test]
async fn channel_preserves_each_senders_order_and_conserves_values() {
    let ch = Arc::new(Channel::<i32>::new(2));

    let sender_a = {
        let ch = Arc::clone(&ch);
        tokio::spawn(async move {
            for v in [1, 2, 3] {
                ch.send_suspending(v).await.unwrap();
            }
        })
    };
    let sender_b = {
        let ch = Arc::clone(&ch);
        tokio::spawn(async move {
            for v in [10, 20] {
                ch.send_suspending(v).await.unwrap();
            }
        })
    };

    let mut received = Vec::new();
    for _ in 0..5 {
        received.push(ch.receive_suspending().await.unwrap());
    }
    sender_a.await.unwrap();
    sender_b.await.unwrap();

    let from_a: Vec<i32> = received.iter().copied().filter(|v| [1, 2, 3].contains(v)).collect();
    let from_b: Vec<i32> = received.iter().copied().filter(|v| [10, 20].contains(v)).collect();
    assert_eq!(from_a, vec![1, 2, 3]);
    assert_eq!(from_b, vec![10, 20]);

    let mut all = received.clone();
    all.sort_unstable();
    assert_eq!(all, vec![1, 2, 3, 10, 20]);
    assert_eq!(ch.len(), 0);
}

#[tokio::test]
async fn closing_a_channel_errors_a_parked_send_as_dropped() {
    let ch = Arc::new(Channel::<i32>::new(0));
    let parked = {
        let ch = Arc::clone(&ch);
        tokio::spawn(async move { ch.send_suspending(99).await })
    };
    tokio::task::yield_now().await;
    ch.close();

    let result = parked.await.unwrap();
    assert!(matches!(result, Err(Error::ChannelClosed(_))));
}
