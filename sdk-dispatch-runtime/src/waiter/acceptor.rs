use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use super::{
    check_exceptions, create_waiter, AcceptorOutcome, WaiterDelays, WaiterError, WaiterOptions,
    WaiterReason, WaiterResult, WaiterState,
};
use crate::client::Client;
use crate::command::CommandType;
use crate::error::SdkError;

/// Condition under which an acceptor fires.
pub enum Matcher<O> {
    /// Inspect a successful output, e.g. compare a status member to a sentinel.
    Output(Arc<dyn Fn(&O) -> bool + Send + Sync>),
    /// A service error with this name.
    ErrorType(String),
    /// `true`: any successful response. `false`: any error.
    Success(bool),
}

impl<O> Matcher<O> {
    pub fn output<F>(predicate: F) -> Self
    where
        F: Fn(&O) -> bool + Send + Sync + 'static,
    {
        Matcher::Output(Arc::new(predicate))
    }

    pub fn error_type(name: impl Into<String>) -> Self {
        Matcher::ErrorType(name.into())
    }

    fn matches_output(&self, output: &O) -> bool {
        match self {
            Matcher::Output(predicate) => predicate(output),
            Matcher::Success(expected) => *expected,
            Matcher::ErrorType(_) => false,
        }
    }

    fn matches_error(&self, error: &SdkError) -> bool {
        match self {
            Matcher::ErrorType(name) => error.name() == Some(name.as_str()),
            Matcher::Success(expected) => !*expected,
            Matcher::Output(_) => false,
        }
    }
}

impl<O> Clone for Matcher<O> {
    fn clone(&self) -> Self {
        match self {
            Matcher::Output(predicate) => Matcher::Output(predicate.clone()),
            Matcher::ErrorType(name) => Matcher::ErrorType(name.clone()),
            Matcher::Success(expected) => Matcher::Success(*expected),
        }
    }
}

impl<O> fmt::Debug for Matcher<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Output(_) => f.write_str("Output(..)"),
            Matcher::ErrorType(name) => f.debug_tuple("ErrorType").field(name).finish(),
            Matcher::Success(expected) => f.debug_tuple("Success").field(expected).finish(),
        }
    }
}

/// A matcher and the state it leads to.
pub struct Acceptor<O> {
    pub state: WaiterState,
    pub matcher: Matcher<O>,
}

impl<O> Clone for Acceptor<O> {
    fn clone(&self) -> Self {
        Self {
            state: self.state,
            matcher: self.matcher.clone(),
        }
    }
}

impl<O> fmt::Debug for Acceptor<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Acceptor")
            .field("state", &self.state)
            .field("matcher", &self.matcher)
            .finish()
    }
}

/// The waiter of one operation: which command to poll, its delay bounds and its
/// acceptors in evaluation order.
pub struct WaiterDefinition<I, O> {
    command_type: CommandType<I, O>,
    delays: WaiterDelays,
    acceptors: Vec<Acceptor<O>>,
}

impl<I, O> fmt::Debug for WaiterDefinition<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaiterDefinition")
            .field("command_type", &self.command_type)
            .field("delays", &self.delays)
            .field("acceptors", &self.acceptors)
            .finish()
    }
}

impl<I, O> WaiterDefinition<I, O>
where
    I: Clone + Serialize + Send + Sync + 'static,
    O: fmt::Debug + Serialize + Send + Sync + 'static,
{
    pub fn new(command_type: CommandType<I, O>, delays: WaiterDelays) -> Self {
        Self {
            command_type,
            delays,
            acceptors: Vec::new(),
        }
    }

    pub fn acceptor(mut self, state: WaiterState, matcher: Matcher<O>) -> Self {
        self.acceptors.push(Acceptor { state, matcher });
        self
    }

    pub fn delays(&self) -> WaiterDelays {
        self.delays
    }

    /// Poll once and classify the result.
    ///
    /// Acceptors are tried in declaration order and the first match wins. An error
    /// no acceptor claims is downgraded to `Retry`.
    pub async fn check_state(&self, client: &Client, input: &I) -> AcceptorOutcome<O> {
        let command = self.command_type.new_command(input.clone());
        match client.send_with_metadata(command, None).await {
            Ok(response) => {
                let state = self
                    .acceptors
                    .iter()
                    .find(|a| a.matcher.matches_output(&response.output))
                    .map_or(WaiterState::Retry, |a| a.state);
                AcceptorOutcome {
                    state,
                    reason: Some(WaiterReason::Output {
                        output: response.output,
                        metadata: response.metadata,
                    }),
                }
            }
            Err(error) => {
                let state = self
                    .acceptors
                    .iter()
                    .find(|a| a.matcher.matches_error(&error))
                    .map_or(WaiterState::Retry, |a| a.state);
                AcceptorOutcome {
                    state,
                    reason: Some(WaiterReason::Error(error)),
                }
            }
        }
    }

    /// Wait for a terminal state and report it, whatever it is.
    pub async fn wait_for(
        &self,
        client: &Client,
        params: WaiterOptions,
        input: I,
    ) -> Result<WaiterResult<O>, WaiterError<O>> {
        let input = &input;
        create_waiter(params, self.delays, || self.check_state(client, input)).await
    }

    /// Wait for success. Failure, timeout and abort become errors.
    pub async fn wait_until(
        &self,
        client: &Client,
        params: WaiterOptions,
        input: I,
    ) -> Result<WaiterResult<O>, WaiterError<O>> {
        check_exceptions(self.wait_for(client, params, input).await?)
    }
}
