//! Tests for `Edge`.

use serde_json::json;

use super::Edge;
use crate::error::RoutingError;
use crate::types::Memory;

#[test]
fn unbound_edge_reports_routing_error() {
  let edge = Edge::new("a:b");
  assert!(!edge.is_bound());
  match edge.call(Memory::new()) {
    Err(RoutingError::UnboundEdge(id)) => assert_eq!(id, "a:b"),
    other => panic!("expected UnboundEdge, got {:?}", other),
  }
}

#[test]
fn bound_edge_returns_target() {
  let mut edge = Edge::new("a:b");
  edge.bind(0, 1);
  assert_eq!(edge.source(), Some(0));
  let (memory, target) = edge.call(Memory::new()).unwrap();
  assert_eq!(target, 1);
  assert!(memory.is_empty());
}

#[test]
fn transform_runs_before_returning() {
  let mut edge = Edge::with_transform("a:b", |mut m: Memory| {
    m.insert("via".to_string(), json!("a:b"));
    m
  });
  edge.bind(3, 4);
  let (memory, target) = edge.call(Memory::new()).unwrap();
  assert_eq!(target, 4);
  assert_eq!(memory.get("via"), Some(&json!("a:b")));
  assert!(format!("{:?}", edge).contains("transform: true"));
}
