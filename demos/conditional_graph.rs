//! Builds a graph with a conditional branch and a bounded loop, runs it once,
//! and prints the recorded execution log.
//!
//! Run with `cargo run --example conditional_graph`.

use std::sync::Arc;

use exsimula::{ExecutionRecorder, Memory, Source, Step, StepOutput, from_fn};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

fn push(memory: &mut Memory, text: &str) {
  let messages = memory
    .entry("messages")
    .or_insert_with(|| Value::Array(Vec::new()));
  if let Value::Array(items) = messages {
    items.push(json!(text));
  }
}

fn append(label: &'static str) -> Arc<dyn Step> {
  from_fn(move |mut m: Memory| {
    push(&mut m, label);
    Ok(StepOutput::Continue(m))
  })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let mut source = Source::with_id("decorated");
  source.add_function("f1", append("f1"))?;
  source.add_condition(
    "condition",
    from_fn(|mut m: Memory| {
      push(&mut m, "condition");
      Ok(StepOutput::route(m, "false"))
    }),
    [("true", "f2"), ("false", "loop")],
  )?;
  source.add_function("f2", append("f2"))?;
  source.add_loop("loop", append("loop"), 10)?;
  source.add_function("f3", append("f3"))?;

  source.add_step(Source::START, "f1")?;
  source.add_step("f1", "condition")?;
  source.add_step("condition", "f2")?;
  source.add_step("condition", "loop")?;
  source.add_step("f2", Source::END)?;
  source.add_step("loop", "f3")?;
  source.add_step("f3", Source::END)?;
  let graph = source.compile()?;

  let recorder = ExecutionRecorder::new();
  graph.subscribe(recorder.subscriber());

  let memory = graph.run(json!({"messages": []}).as_object().cloned().unwrap_or_default()).await?;
  println!("{}", serde_json::to_string_pretty(&memory)?);
  println!("{}", recorder.log().to_json()?);
  Ok(())
}
