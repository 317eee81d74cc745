//! Tests for the flat `Program` interpreter.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use proptest::prelude::*;
use serde_json::{Value, json};
use tokio_test::{assert_err, assert_ok};

use crate::error::{ConfigError, EngineError, RoutingError};
use crate::program::{Program, ProgramBuilder};
use crate::types::{Delta, Memory, RunOptions, Step, StepOutput, Token, from_async, from_fn};

fn push(label: &'static str, token: Option<&'static str>) -> Arc<dyn Step> {
  from_fn(move |mut m: Memory| {
    let trail = m
      .entry("trail")
      .or_insert_with(|| Value::Array(Vec::new()));
    if let Value::Array(items) = trail {
      items.push(json!(label));
    }
    Ok(match token {
      Some(token) => StepOutput::route(m, token),
      None => StepOutput::Continue(m),
    })
  })
}

fn trail(memory: &Memory) -> Vec<&str> {
  memory
    .get("trail")
    .and_then(Value::as_array)
    .map(|items| items.iter().filter_map(Value::as_str).collect())
    .unwrap_or_default()
}

fn counting(counter: Arc<AtomicUsize>, token: &'static str) -> Arc<dyn Step> {
  from_fn(move |m| {
    counter.fetch_add(1, Ordering::SeqCst);
    Ok(StepOutput::route(m, token))
  })
}

#[tokio::test]
async fn step_on_empty_program_returns_without_invoking() {
  let mut program = ProgramBuilder::new().build().unwrap();
  let input = json!({"k": "v"}).as_object().cloned().unwrap();
  let (memory, next) = program.step(input.clone(), None).await.unwrap();
  assert_eq!(memory, input);
  assert_eq!(next, Token::Return);
  assert_eq!(program.ip(), &Token::Return);
}

#[tokio::test]
async fn functions_run_in_table_order() {
  let mut builder = Program::builder();
  builder.add_function("a", push("a", None)).unwrap();
  builder.add_function("b", push("b", Some("next"))).unwrap();
  builder.add_function("c", push("c", Some("continue"))).unwrap();
  let mut program = builder.build().unwrap();
  let memory = program.run(Memory::new(), 10).await.unwrap();
  assert_eq!(trail(&memory), vec!["a", "b", "c"]);
  assert_eq!(program.ip(), &Token::Return);
}

#[tokio::test]
async fn step_returns_resolved_pointer() {
  let mut builder = ProgramBuilder::with_id("p");
  builder.add_function("a", push("a", Some("next"))).unwrap();
  builder.add_function("b", push("b", None)).unwrap();
  let mut program = builder.build().unwrap();
  let (memory, next) = program.step(Memory::new(), None).await.unwrap();
  assert_eq!(next, Token::label("b"));
  assert_eq!(program.ip(), &Token::label("a"));
  let (memory, next) = program.step(memory, Some(Token::Next)).await.unwrap();
  assert_eq!(next, Token::Return);
  assert_eq!(trail(&memory), vec!["a", "b"]);
  let (_, next) = program.step(memory, Some(Token::Return)).await.unwrap();
  assert_eq!(next, Token::Return);
  assert_eq!(program.ip(), &Token::Return);
}

#[tokio::test]
async fn self_routing_program_exhausts_step_budget() {
  let calls = Arc::new(AtomicUsize::new(0));
  let mut builder = ProgramBuilder::new();
  builder
    .add_function("spin", counting(calls.clone(), "spin"))
    .unwrap();
  let mut program = builder.build().unwrap();
  let result = program.run(Memory::new(), 3).await;
  assert!(matches!(
    result,
    Err(EngineError::ResourceExhausted { max_steps: 3 })
  ));
  assert_eq!(calls.load(Ordering::SeqCst), 3);
}

proptest! {
  #[test]
  fn budget_permits_exactly_max_steps_invocations(max_steps in 1usize..25) {
    let calls = Arc::new(AtomicUsize::new(0));
    let mut builder = ProgramBuilder::new();
    builder.add_function("spin", counting(calls.clone(), "spin")).unwrap();
    let mut program = builder.build().unwrap();
    let result = futures::executor::block_on(program.run(Memory::new(), max_steps));
    let exhausted = matches!(result, Err(EngineError::ResourceExhausted { .. }));
    prop_assert!(exhausted);
    prop_assert_eq!(calls.load(Ordering::SeqCst), max_steps);
  }
}

#[tokio::test]
async fn function_id_takes_precedence_over_routes() {
  let mut builder = ProgramBuilder::new();
  builder.add_function("a", push("a", Some("c"))).unwrap();
  builder.add_function("b", push("b", None)).unwrap();
  builder.add_function("c", push("c", Some("return"))).unwrap();
  builder.add_routes("a", [("c", "b")]).unwrap();
  let mut program = builder.build().unwrap();
  let memory = program.run(Memory::new(), 10).await.unwrap();
  assert_eq!(trail(&memory), vec!["a", "c"]);
}

#[tokio::test]
async fn action_routes_through_function_metadata() {
  let mut builder = ProgramBuilder::new();
  builder.add_function("ask", push("ask", Some("done"))).unwrap();
  builder.add_function("skipped", push("skipped", None)).unwrap();
  builder.add_function("reply", push("reply", None)).unwrap();
  builder.add_routes("ask", [("done", "reply")]).unwrap();
  let mut program = builder.build().unwrap();
  let memory = program.run(Memory::new(), 10).await.unwrap();
  assert_eq!(trail(&memory), vec!["ask", "reply"]);
}

#[tokio::test]
async fn unknown_action_is_fatal() {
  let mut builder = ProgramBuilder::new();
  builder.add_function("a", push("a", Some("sideways"))).unwrap();
  let mut program = builder.build().unwrap();
  match program.run(Memory::new(), 10).await {
    Err(EngineError::Routing(RoutingError::NoRouteForAction { function, action })) => {
      assert_eq!(function, "a");
      assert_eq!(action, "sideways");
    }
    other => panic!("expected NoRouteForAction, got {:?}", other),
  }
}

#[tokio::test]
async fn stepping_to_unknown_function_fails() {
  let mut builder = ProgramBuilder::new();
  builder.add_function("a", push("a", None)).unwrap();
  let mut program = builder.build().unwrap();
  let err = assert_err!(program.step(Memory::new(), Some(Token::label("zzz"))).await);
  assert!(matches!(
    err,
    EngineError::Routing(RoutingError::FunctionNotFound(id)) if id == "zzz"
  ));
}

#[tokio::test]
async fn successor_override_replaces_table_order() {
  let mut builder = ProgramBuilder::new();
  builder.add_function("a", push("a", None)).unwrap();
  builder.add_function("b", push("b", None)).unwrap();
  builder.add_function("c", push("c", None)).unwrap();
  builder.add_step("a", "c").unwrap();
  builder.add_step("c", Token::Return).unwrap();
  let mut program = builder.build().unwrap();
  let memory = assert_ok!(program.run(Memory::new(), 10).await);
  assert_eq!(trail(&memory), vec!["a", "c"]);
}

#[tokio::test]
async fn init_token_restarts_from_first_function() {
  let mut builder = ProgramBuilder::new();
  builder
    .add_function(
      "count",
      from_fn(|mut m: Memory| {
        let n = m.get("n").and_then(Value::as_u64).unwrap_or(0) + 1;
        m.insert("n".to_string(), json!(n));
        let token = if n < 3 { "init" } else { "return" };
        Ok(StepOutput::route(m, token))
      }),
    )
    .unwrap();
  let mut program = builder.build().unwrap();
  let memory = program.run(Memory::new(), 10).await.unwrap();
  assert_eq!(memory.get("n"), Some(&json!(3)));
}

#[test]
fn builder_rejects_bad_registrations() {
  let mut builder = ProgramBuilder::new();
  builder.add_function("a", push("a", None)).unwrap();
  assert!(matches!(
    builder.add_function("a", push("a", None)),
    Err(ConfigError::DuplicateFunction(_))
  ));
  assert!(matches!(
    builder.add_function("return", push("r", None)),
    Err(ConfigError::ReservedId(_))
  ));
  assert!(matches!(
    builder.add_routes("missing", [("x", "a")]),
    Err(ConfigError::UnknownFunction(_))
  ));
  builder.add_routes("a", [("x", "ghost")]).unwrap();
  assert!(matches!(
    builder.build(),
    Err(ConfigError::UnknownFunction(id)) if id == "ghost"
  ));
}

fn typing_program() -> Program {
  let mut builder = ProgramBuilder::with_id("typing");
  builder
    .add_function(
      "type",
      from_fn(|m: Memory| {
        let mut deltas = Vec::new();
        for text in ["h", "he", "hey"] {
          let mut next = m.clone();
          next.insert("text".to_string(), json!(text));
          deltas.push(Ok(Delta::Replace(next)));
        }
        let mut last = m.clone();
        last.insert("text".to_string(), json!("hey!"));
        deltas.push(Ok(Delta::Route(last, Token::Continue)));
        Ok(StepOutput::stream(futures::stream::iter(deltas)))
      }),
    )
    .unwrap();
  builder.build().unwrap()
}

#[tokio::test]
async fn streamed_function_yields_every_delta() {
  let mut program = typing_program();
  let notified = Arc::new(AtomicUsize::new(0));
  let counter = notified.clone();
  program.subscribe(move |_| {
    counter.fetch_add(1, Ordering::SeqCst);
  });
  let texts: Vec<Value> = program
    .stream(Memory::new())
    .map(|s| s.unwrap().get("text").cloned().unwrap_or(Value::Null))
    .collect()
    .await;
  assert_eq!(
    texts,
    vec![json!("h"), json!("he"), json!("hey"), json!("hey!")]
  );
  assert_eq!(notified.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn run_returns_only_the_terminal_state() {
  let mut program = typing_program();
  let memory = program
    .run_with(Memory::new(), RunOptions::default())
    .await
    .unwrap();
  assert_eq!(memory.get("text"), Some(&json!("hey!")));
}

#[tokio::test]
async fn late_subscriber_sees_only_later_states() {
  let mut program = typing_program();
  let handle = program.subscribers();
  let seen = Arc::new(Mutex::new(Vec::new()));
  let stream = program.stream(Memory::new());
  futures::pin_mut!(stream);
  stream.next().await.unwrap().unwrap();
  stream.next().await.unwrap().unwrap();
  let sink = seen.clone();
  handle.subscribe(move |snapshot| {
    sink.lock().unwrap().push(snapshot.seq);
  });
  while let Some(state) = stream.next().await {
    state.unwrap();
  }
  assert_eq!(*seen.lock().unwrap(), vec![3, 4]);
}

#[test]
fn run_blocking_drives_program_to_return() {
  let mut builder = ProgramBuilder::new();
  builder.add_function("a", push("a", None)).unwrap();
  builder.add_function("b", push("b", None)).unwrap();
  let mut program = builder.build().unwrap();
  let memory = program
    .run_blocking(Memory::new(), RunOptions::default())
    .unwrap();
  assert_eq!(trail(&memory), vec!["a", "b"]);
}

#[test]
fn run_blocking_supports_tokio_timers() {
  let mut builder = ProgramBuilder::new();
  builder
    .add_function(
      "wait",
      from_async(|mut m: Memory| async move {
        tokio::time::sleep(Duration::from_millis(1)).await;
        m.insert("waited".to_string(), json!(true));
        Ok(StepOutput::Continue(m))
      }),
    )
    .unwrap();
  let mut program = builder.build().unwrap();
  let memory = program
    .run_blocking(Memory::new(), RunOptions::default())
    .unwrap();
  assert_eq!(memory.get("waited"), Some(&json!(true)));
}

#[tokio::test]
async fn streamed_unknown_action_ends_the_stream() {
  let mut builder = ProgramBuilder::new();
  builder
    .add_function(
      "drift",
      from_fn(|m: Memory| {
        let mut first = m.clone();
        first.insert("n".to_string(), json!(1));
        let mut second = m;
        second.insert("n".to_string(), json!(2));
        Ok(StepOutput::stream(futures::stream::iter(vec![
          Ok(Delta::Replace(first)),
          Ok(Delta::Route(second, Token::label("sideways"))),
        ])))
      }),
    )
    .unwrap();
  builder.add_function("after", push("after", None)).unwrap();
  let mut program = builder.build().unwrap();
  let items: Vec<_> = program.stream(Memory::new()).collect().await;
  assert_eq!(items.len(), 3);
  assert_eq!(items[0].as_ref().unwrap().get("n"), Some(&json!(1)));
  assert_eq!(items[1].as_ref().unwrap().get("n"), Some(&json!(2)));
  match &items[2] {
    Err(EngineError::Routing(RoutingError::NoRouteForAction { function, action })) => {
      assert_eq!(function, "drift");
      assert_eq!(action, "sideways");
    }
    other => panic!("expected routing error, got {:?}", other),
  }
}

#[tokio::test]
async fn empty_delta_stream_fails_the_function() {
  let mut builder = ProgramBuilder::new();
  builder
    .add_function(
      "quiet",
      from_fn(|_| Ok(StepOutput::stream(futures::stream::empty()))),
    )
    .unwrap();
  let mut program = builder.build().unwrap();
  assert!(matches!(
    program.run(Memory::new(), 5).await,
    Err(EngineError::Step { origin, .. }) if origin == "quiet"
  ));
}

#[tokio::test]
async fn ip_resets_between_runs() {
  let mut builder = ProgramBuilder::new();
  builder.add_function("a", push("a", None)).unwrap();
  let mut program = builder.build().unwrap();
  program.run(Memory::new(), 5).await.unwrap();
  let memory = program.run(Memory::new(), 5).await.unwrap();
  assert_eq!(trail(&memory), vec!["a"]);
}
