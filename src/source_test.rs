//! Tests for the `Source` builder.

use serde_json::json;

use crate::error::ConfigError;
use crate::nodes::NodeKind;
use crate::source::Source;
use crate::types::{Memory, StepOutput, from_fn};

#[test]
fn new_source_designates_start_and_end() {
  let source = Source::with_id("s");
  assert_eq!(source.id(), "s");
  assert_eq!(source.source_node_id(), Some(Source::START));
  assert_eq!(source.target_node_id(), Some(Source::END));
  assert!(source.node(Source::START).unwrap().is_noop());
  assert!(source.node(Source::END).unwrap().is_noop());
}

#[test]
fn add_step_synthesizes_edge_ids() {
  let mut source = Source::new();
  source.add_noop("middle").unwrap();
  source.add_step(Source::START, "middle").unwrap();
  source.add_step("middle", Source::END).unwrap();
  assert!(source.contains_edge("start:middle"));
  assert_eq!(source.branch("middle", "end"), Some("middle:end"));
}

#[test]
fn repeated_step_is_a_duplicate_edge() {
  let mut source = Source::new();
  source.add_step(Source::START, Source::END).unwrap();
  assert!(matches!(
    source.add_step(Source::START, Source::END),
    Err(ConfigError::DuplicateEdge(id)) if id == "start:end"
  ));
}

#[test]
fn step_to_unknown_node_leaves_no_edge_behind() {
  let mut source = Source::new();
  assert!(matches!(
    source.add_step(Source::START, "ghost"),
    Err(ConfigError::UnknownNode(id)) if id == "ghost"
  ));
  assert!(!source.contains_edge("start:ghost"));
}

#[test]
fn condition_maps_tokens_to_synthesized_edges() {
  let mut source = Source::new();
  source
    .add_condition(
      "check",
      from_fn(|m| Ok(StepOutput::route(m, "yes"))),
      [("yes", "a"), ("no", "b")],
    )
    .unwrap();
  match source.node("check").unwrap().kind() {
    NodeKind::Conditional { output_mapping } => {
      assert_eq!(output_mapping.get("yes").map(String::as_str), Some("check:a"));
      assert_eq!(output_mapping.get("no").map(String::as_str), Some("check:b"));
    }
    other => panic!("expected conditional, got {:?}", other),
  }
}

#[test]
fn condition_cannot_map_next() {
  let mut source = Source::new();
  assert!(matches!(
    source.add_condition(
      "check",
      from_fn(|m| Ok(StepOutput::route(m, "next"))),
      [("next", "a")],
    ),
    Err(ConfigError::ReservedId(key)) if key == "next"
  ));
  assert!(!source.contains_node("check"));
}

#[test]
fn zero_iteration_loop_is_rejected() {
  let mut source = Source::new();
  let step = from_fn(|m| Ok(StepOutput::Continue(m)));
  assert!(matches!(
    source.add_loop("spin", step, 0),
    Err(ConfigError::InvalidIterations(_))
  ));
  assert!(!source.contains_node("spin"));
}

#[tokio::test]
async fn compiled_source_runs_with_edge_transform() {
  let mut source = Source::new();
  source
    .add_function(
      "greet",
      from_fn(|mut m: Memory| {
        m.insert("greeting".to_string(), json!("hello"));
        Ok(StepOutput::Continue(m))
      }),
    )
    .unwrap();
  source.add_step(Source::START, "greet").unwrap();
  source
    .add_step_with("greet", Source::END, |mut m: Memory| {
      m.insert("left".to_string(), json!("greet"));
      m
    })
    .unwrap();
  let graph = source.compile().unwrap();
  let memory = graph.run(Memory::new()).await.unwrap();
  assert_eq!(memory.get("greeting"), Some(&json!("hello")));
  assert_eq!(memory.get("left"), Some(&json!("greet")));
}
