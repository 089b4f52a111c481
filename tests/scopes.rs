//! Seed scenarios 6-7 (structured concurrency at scale, cancellation) plus P4-P7.

use std::sync::Arc;

use coro_rt::prelude::*;

#[tokio::test]
async fn launching_a_thousand_coroutines_completes_structured_and_correct() {
    let executor = TokioExecutor::current();
    let context = CoroutineContext::new(executor);
    let scope = CoroutineScope::new(Arc::clone(&context));

    let coroutine = Arc::new(Coroutine::first(apply(|x: i64| {
        (0..x % 50).fold(x, |acc, n| acc.wrapping_add(n))
    })));

    let mut continuations = Vec::with_capacity(1000);
    for i in 0..1000i64 {
        continuations.push((i, scope.spawn(Arc::clone(&coroutine), i)));
    }
    scope.join().await;

    // P4: the scope has drained, and every continuation it launched is done.
    assert_eq!(scope.running_count(), 0);
    for (i, cont) in continuations {
        assert!(cont.is_done());
        let expected = (0..i % 50).fold(i, |acc, n| acc.wrapping_add(n));
        assert_eq!(cont.get_result().await.unwrap(), expected);
    }
}

#[tokio::test]
async fn cancelling_mid_run_stops_the_chain_cooperatively() {
    let executor = TokioExecutor::current();
    let context = CoroutineContext::new(executor);
    let scope = CoroutineScope::new(Arc::clone(&context));

    // `for_each` yields between elements (a genuine suspension boundary), giving the
    // test a window to cancel after some, but not all, elements have run.
    let coroutine = Arc::new(
        Coroutine::first(apply(|_: ()| (0..1000i32).collect::<Vec<i32>>())).then(for_each(
            Arc::new(apply(|x: i32| x)) as Arc<dyn Step<i32, i32>>,
        )),
    );

    let cont = scope.spawn(coroutine, ());
    tokio::task::yield_now().await;
    cont.cancel();
    scope.join().await;

    // P6: by the time join() returns, nothing registered to the scope is still running.
    assert_eq!(scope.running_count(), 0);
    assert!(cont.is_done());
    assert!(cont.is_cancelled());
    assert_eq!(cont.state(), ContinuationState::Cancelled);

    // P5: a cancelled continuation's result is an error, never a successful finish.
    assert!(cont.get_result().await.is_err());

    // P7: a second cancel is a no-op; state is unchanged.
    cont.cancel();
    assert_eq!(cont.state(), ContinuationState::Cancelled);
}

#[tokio::test]
async fn scope_attributes_are_shared_across_the_launch() {
    let executor = TokioExecutor::current();
    let context = CoroutineContext::new(executor);
    let scope = CoroutineScope::new(context);

    let key: AttributeKey<u32> = AttributeKey::new();
    scope.attributes().set(&key, 7);
    assert_eq!(scope.attributes().get(&key), Some(7));
}
