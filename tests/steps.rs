//! Seed scenarios 1-4: single step, multi step, conditional, iteration (spec §8),
//! plus P1 (blocking/async determinism for pure chains).

use std::sync::Arc;

use coro_rt::prelude::*;

#[tokio::test]
async fn single_step_uppercases_input() {
    let coroutine = Coroutine::first(apply(|s: String| s.to_uppercase()));
    let executor = TokioExecutor::current();

    let blocking = coroutine.run_blocking("test".to_string(), Arc::clone(&executor)).unwrap();
    let asynced = coroutine.run_async("test".to_string(), executor).await.unwrap();

    assert_eq!(blocking, "TEST");
    assert_eq!(asynced, "TEST");
}

#[tokio::test]
async fn multi_step_chain_appends_strips_and_parses() {
    let coroutine = Coroutine::first(apply(|s: String| format!("{s}5")))
        .then(apply(|s: String| {
            s.chars().filter(|c| c.is_ascii_digit()).collect::<String>()
        }))
        .then(try_apply(|s: String| s.parse::<i32>()));

    let executor = TokioExecutor::current();
    let result = coroutine.run_blocking("test1234".to_string(), executor).unwrap();
    assert_eq!(result, 12345);
}

#[tokio::test]
async fn conditional_doifelse_runs_exactly_one_branch() {
    let coroutine = Coroutine::first(do_if_else(
        |b: &bool| *b,
        Arc::new(supply(|| "true".to_string())) as Arc<dyn Step<bool, String>>,
        Arc::new(supply(|| "false".to_string())) as Arc<dyn Step<bool, String>>,
    ));
    let executor = TokioExecutor::current();

    assert_eq!(
        coroutine.run_blocking(true, Arc::clone(&executor)).unwrap(),
        "true"
    );
    assert_eq!(coroutine.run_blocking(false, executor).unwrap(), "false");
}

#[tokio::test]
async fn conditional_doif_with_false_predicate_terminates_cleanly() {
    let coroutine = Coroutine::first(do_if(
        |b: &bool| *b,
        Arc::new(supply(|| "true".to_string())) as Arc<dyn Step<bool, String>>,
    ));
    let executor = TokioExecutor::current();
    let result = coroutine.run_blocking(false, executor).unwrap();
    assert_eq!(result, None);
}

#[tokio::test]
async fn for_each_collects_uppercased_elements_in_order() {
    let coroutine = Coroutine::first(apply(|s: String| {
        s.split(',').map(|x| x.to_string()).collect::<Vec<String>>()
    }))
    .then(for_each_collecting(
        Arc::new(apply(|s: String| s.to_uppercase())) as Arc<dyn Step<String, String>>
    ));

    let executor = TokioExecutor::current();
    let result = coroutine
        .run_blocking("a,b,c,d".to_string(), executor)
        .unwrap();
    assert_eq!(result, vec!["A", "B", "C", "D"]);
}
