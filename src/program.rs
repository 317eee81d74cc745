//! Flat interpreter over an ordered function table.
//!
//! A [Program] keeps an instruction pointer (`ip`) naming the function that
//! ran last, or one of the [Token::Init] / [Token::Return] sentinels. Each
//! [Program::step] resolves a pointer relative to `ip`, invokes one function,
//! and resolves the token it returned into the next pointer:
//!
//! | token                 | next pointer                                  |
//! |-----------------------|-----------------------------------------------|
//! | none, `next`, `continue` | successor of the function (override or table order) |
//! | `init`, `return`      | that sentinel                                 |
//! | a function id         | that function                                 |
//! | anything else         | the function's own routes, or an error        |

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_stream::try_stream;
use futures::{Stream, StreamExt, pin_mut};
use tracing::{debug, info, instrument, trace, warn};

use crate::error::{ConfigError, EngineError, RoutingError};
use crate::subscribers::Subscribers;
use crate::types::{
  Budget, Delta, EMPTY_DELTA_STREAM, Memory, RunOptions, Snapshot, Step, StepOutput, Token,
  block_on,
};

/// One entry of the function table.
struct Function {
  id: String,
  step: Arc<dyn Step>,
  /// Action name -> target (sentinel or function id).
  routes: HashMap<String, Token>,
  /// Explicit successor, overriding table order.
  next: Option<Token>,
}

/// Collects functions and routing metadata, then validates them into a [Program].
#[derive(Default)]
pub struct ProgramBuilder {
  id: Option<String>,
  functions: Vec<Function>,
  index: HashMap<String, usize>,
}

impl ProgramBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_id(id: impl Into<String>) -> Self {
    Self {
      id: Some(id.into()),
      ..Self::default()
    }
  }

  /// Appends `step` to the function table under `id`.
  #[instrument(level = "trace", skip(self, step))]
  pub fn add_function(&mut self, id: &str, step: Arc<dyn Step>) -> Result<(), ConfigError> {
    if Token::is_reserved(id) {
      return Err(ConfigError::ReservedId(id.to_string()));
    }
    if self.index.contains_key(id) {
      return Err(ConfigError::DuplicateFunction(id.to_string()));
    }
    self.index.insert(id.to_string(), self.functions.len());
    self.functions.push(Function {
      id: id.to_string(),
      step,
      routes: HashMap::new(),
      next: None,
    });
    Ok(())
  }

  /// Adds action -> target routes to function `id`.
  pub fn add_routes<K, V>(
    &mut self,
    id: &str,
    routes: impl IntoIterator<Item = (K, V)>,
  ) -> Result<(), ConfigError>
  where
    K: Into<String>,
    V: Into<Token>,
  {
    let function = self.function_mut(id)?;
    function
      .routes
      .extend(routes.into_iter().map(|(k, v)| (k.into(), v.into())));
    Ok(())
  }

  /// Makes `to` the successor of `from`, overriding table order.
  pub fn add_step(&mut self, from: &str, to: impl Into<Token>) -> Result<(), ConfigError> {
    let function = self.function_mut(from)?;
    function.next = Some(to.into());
    Ok(())
  }

  fn function_mut(&mut self, id: &str) -> Result<&mut Function, ConfigError> {
    let index = *self
      .index
      .get(id)
      .ok_or_else(|| ConfigError::UnknownFunction(id.to_string()))?;
    Ok(&mut self.functions[index])
  }

  /// Checks every route and successor target, then freezes the table.
  pub fn build(self) -> Result<Program, ConfigError> {
    for function in &self.functions {
      let targets = function.routes.values().chain(function.next.iter());
      for target in targets {
        if let Token::Label(name) = target
          && !self.index.contains_key(name)
        {
          return Err(ConfigError::UnknownFunction(name.clone()));
        }
      }
      for action in function.routes.keys() {
        if self.index.contains_key(action) || Token::is_reserved(action) {
          warn!(
            function = %function.id,
            action = %action,
            "route is shadowed by a function id or sentinel and will never be used"
          );
        }
      }
    }
    let id = self
      .id
      .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    info!(program_id = %id, function_count = self.functions.len(), "program built");
    Ok(Program {
      id,
      functions: self.functions,
      index: self.index,
      ip: Token::Init,
      seq: 0,
      subscribers: Subscribers::new(),
    })
  }
}

/// Something one program step produced.
enum StepEvent {
  State(Memory),
  Done(Memory, Token),
}

/// Ordered function table driven by an instruction pointer.
pub struct Program {
  id: String,
  functions: Vec<Function>,
  index: HashMap<String, usize>,
  ip: Token,
  seq: usize,
  subscribers: Subscribers,
}

impl Program {
  pub fn builder() -> ProgramBuilder {
    ProgramBuilder::new()
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  /// Last executed function, or a sentinel.
  pub fn ip(&self) -> &Token {
    &self.ip
  }

  /// Function ids in table order.
  pub fn function_ids(&self) -> impl Iterator<Item = &str> {
    self.functions.iter().map(|f| f.id.as_str())
  }

  pub fn subscribe<F>(&self, callback: F)
  where
    F: Fn(&Snapshot<'_>) + Send + Sync + 'static,
  {
    self.subscribers.subscribe(callback);
  }

  /// Shared handle to the subscriber list.
  pub fn subscribers(&self) -> Subscribers {
    self.subscribers.clone()
  }

  fn first(&self) -> Token {
    self
      .functions
      .first()
      .map(|f| Token::Label(f.id.clone()))
      .unwrap_or(Token::Return)
  }

  /// Successor of `from`: its override if any, else the next table entry.
  fn successor(&self, from: &Token) -> Token {
    match from {
      Token::Init => self.first(),
      Token::Label(id) => {
        let Some(&index) = self.index.get(id) else {
          return Token::Return;
        };
        match &self.functions[index].next {
          Some(Token::Init) => self.first(),
          Some(next) if !next.is_advance() => next.clone(),
          _ => self
            .functions
            .get(index + 1)
            .map(|f| Token::Label(f.id.clone()))
            .unwrap_or(Token::Return),
        }
      }
      _ => Token::Return,
    }
  }

  /// Resolves a caller-supplied pointer relative to `ip`.
  fn resolve(&self, ptr: Option<Token>) -> Result<Token, RoutingError> {
    match ptr {
      None | Some(Token::Init) => Ok(self.first()),
      Some(Token::Next) | Some(Token::Continue) => Ok(self.successor(&self.ip)),
      Some(Token::Return) => Ok(Token::Return),
      Some(Token::Label(id)) if self.index.contains_key(&id) => Ok(Token::Label(id)),
      Some(Token::Label(id)) => Err(RoutingError::FunctionNotFound(id)),
    }
  }

  /// Resolves the token function `index` returned into the next pointer.
  fn route(&self, index: usize, token: Option<Token>) -> Result<Token, RoutingError> {
    let function = &self.functions[index];
    let from = Token::Label(function.id.clone());
    match token {
      None | Some(Token::Next) | Some(Token::Continue) => Ok(self.successor(&from)),
      Some(Token::Init) => Ok(Token::Init),
      Some(Token::Return) => Ok(Token::Return),
      Some(Token::Label(action)) if self.index.contains_key(&action) => Ok(Token::Label(action)),
      Some(Token::Label(action)) => match function.routes.get(&action) {
        Some(target) if target.is_advance() => Ok(self.successor(&from)),
        Some(target) => Ok(target.clone()),
        None => Err(RoutingError::NoRouteForAction {
          function: function.id.clone(),
          action,
        }),
      },
    }
  }

  fn publish(&mut self, origin: &str, memory: &Memory) {
    self.seq += 1;
    self.subscribers.notify(&Snapshot {
      seq: self.seq,
      origin,
      memory,
    });
  }

  /// Runs one function, yielding each accepted state, then the resolved outcome.
  fn step_events(
    &mut self,
    memory: Memory,
    ptr: Option<Token>,
  ) -> impl Stream<Item = Result<StepEvent, EngineError>> + '_ {
    try_stream! {
      let target = self.resolve(ptr)?;
      self.ip = target.clone();
      let index = match &target {
        Token::Label(id) => self.index.get(id).copied(),
        _ => None,
      };
      let Some(index) = index else {
        yield StepEvent::Done(memory, target);
        return;
      };

      let id = self.functions[index].id.clone();
      let step = self.functions[index].step.clone();
      debug!(program_id = %self.id, function = %id, "invoking function");
      let output = step
        .call(memory)
        .await
        .map_err(|e| EngineError::step(&id, e))?;

      let (memory, token) = match output {
        StepOutput::Continue(next) => {
          self.publish(&id, &next);
          yield StepEvent::State(next.clone());
          (next, None)
        }
        StepOutput::Route(next, routed) => {
          self.publish(&id, &next);
          yield StepEvent::State(next.clone());
          (next, Some(routed))
        }
        StepOutput::Stream(mut deltas) => {
          let mut last = None;
          while let Some(delta) = deltas.next().await {
            match delta.map_err(|e| EngineError::step(&id, e))? {
              Delta::Replace(next) => {
                self.publish(&id, &next);
                yield StepEvent::State(next.clone());
                last = Some((next, None));
              }
              Delta::Route(next, routed) => {
                self.publish(&id, &next);
                yield StepEvent::State(next.clone());
                last = Some((next, Some(routed)));
                break;
              }
            }
          }
          last.ok_or_else(|| EngineError::step(&id, EMPTY_DELTA_STREAM.into()))?
        }
      };

      let next = self.route(index, token)?;
      trace!(function = %id, next = %next, "routed");
      yield StepEvent::Done(memory, next);
    }
  }

  /// Executes exactly one function (or none, for a `return` pointer).
  ///
  /// Returns the new memory and the fully resolved next pointer.
  #[instrument(level = "trace", skip(self, memory))]
  pub async fn step(
    &mut self,
    memory: Memory,
    ptr: Option<Token>,
  ) -> Result<(Memory, Token), EngineError> {
    let events = self.step_events(memory, ptr);
    pin_mut!(events);
    let mut outcome = None;
    while let Some(event) = events.next().await {
      if let StepEvent::Done(memory, next) = event? {
        outcome = Some((memory, next));
      }
    }
    // Every successful step ends with an outcome.
    Ok(outcome.unwrap_or_else(|| (Memory::new(), Token::Return)))
  }

  /// Runs from the first function until `return`, allowing at most `max_steps` steps.
  pub async fn run(&mut self, memory: Memory, max_steps: usize) -> Result<Memory, EngineError> {
    self
      .run_with(memory, RunOptions::default().with_max_steps(max_steps))
      .await
  }

  pub async fn run_with(
    &mut self,
    memory: Memory,
    options: RunOptions,
  ) -> Result<Memory, EngineError> {
    let states = self.stream_with(memory.clone(), options);
    pin_mut!(states);
    let mut last = memory;
    while let Some(state) = states.next().await {
      last = state?;
    }
    Ok(last)
  }

  /// Runs to completion on a private current-thread runtime.
  ///
  /// Must not be called from inside an async context.
  pub fn run_blocking(
    &mut self,
    memory: Memory,
    options: RunOptions,
  ) -> Result<Memory, EngineError> {
    block_on(self.run_with(memory, options))?
  }

  pub fn stream(&mut self, memory: Memory) -> impl Stream<Item = Result<Memory, EngineError>> + '_ {
    self.stream_with(memory, RunOptions::default())
  }

  /// Yields every accepted state in production order after notifying subscribers.
  pub fn stream_with(
    &mut self,
    memory: Memory,
    options: RunOptions,
  ) -> impl Stream<Item = Result<Memory, EngineError>> + '_ {
    try_stream! {
      let mut budget = Budget::new(options);
      self.ip = Token::Init;
      self.seq = 0;
      let mut memory = memory;
      let mut ptr: Option<Token> = None;
      loop {
        if ptr == Some(Token::Return) {
          self.ip = Token::Return;
          break;
        }
        budget.charge()?;
        let mut outcome = None;
        {
          let events = self.step_events(memory, ptr.take());
          pin_mut!(events);
          while let Some(event) = events.next().await {
            match event? {
              StepEvent::State(state) => yield state,
              StepEvent::Done(next_memory, next) => outcome = Some((next_memory, next)),
            }
          }
        }
        // Every successful step ends with an outcome.
        let Some((next_memory, next)) = outcome else {
          break;
        };
        memory = next_memory;
        ptr = Some(next);
      }
      info!(program_id = %self.id, steps = budget.steps(), emitted = self.seq, "program run complete");
    }
  }
}

impl fmt::Debug for Program {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Program")
      .field("id", &self.id)
      .field("functions", &self.function_ids().collect::<Vec<_>>())
      .field("ip", &self.ip)
      .field("subscribers", &self.subscribers)
      .finish()
  }
}
