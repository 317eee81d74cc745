//! Streams a short chat-style program: two plain functions, then a reply that
//! is "typed" one word at a time.
//!
//! Run with `cargo run --example streaming_program`.

use std::time::Duration;

use exsimula::{Delta, Memory, ProgramBuilder, StepOutput, Token, from_fn};
use futures::StreamExt;
use serde_json::{Value, json};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn push(memory: &mut Memory, text: &str) {
  let messages = memory
    .entry("messages")
    .or_insert_with(|| Value::Array(Vec::new()));
  if let Value::Array(items) = messages {
    items.push(json!(text));
  }
}

fn last_message(memory: &Memory) -> Option<&str> {
  memory
    .get("messages")
    .and_then(Value::as_array)
    .and_then(|items| items.last())
    .and_then(Value::as_str)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let mut builder = ProgramBuilder::with_id("chat");
  builder.add_function(
    "f1",
    from_fn(|mut m: Memory| {
      push(&mut m, "f1");
      Ok(StepOutput::Continue(m))
    }),
  )?;
  builder.add_function(
    "f2",
    from_fn(|mut m: Memory| {
      push(&mut m, "f2");
      Ok(StepOutput::route(m, "true"))
    }),
  )?;
  builder.add_function(
    "f3",
    from_fn(|m: Memory| {
      let deltas = async_stream::try_stream! {
        let mut current = m;
        for word in "One two three".split(' ') {
          tokio::time::sleep(Duration::from_millis(500)).await;
          let last = current
            .get_mut("messages")
            .and_then(Value::as_array_mut)
            .and_then(|items| items.last_mut());
          if let Some(Value::String(last)) = last {
            last.push(' ');
            last.push_str(word);
          }
          yield Delta::Replace(current.clone());
        }
        yield Delta::Route(current, Token::Continue);
      };
      Ok(StepOutput::stream(deltas))
    }),
  )?;
  builder.add_routes("f2", [("true", "f3"), ("false", Token::RETURN)])?;
  builder.add_step("f3", Token::Return)?;
  let mut program = builder.build()?;

  program.subscribe(|snapshot| {
    if let Some(text) = last_message(snapshot.memory) {
      info!(origin = snapshot.origin, "memory updated: {text}");
    }
  });

  let states = program.stream(Memory::new());
  futures::pin_mut!(states);
  let mut last = Memory::new();
  while let Some(state) = states.next().await {
    last = state?;
  }
  println!("{}", serde_json::to_string_pretty(&last)?);
  Ok(())
}
