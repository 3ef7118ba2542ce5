//! Token-driven pagination over any command type.

use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt};
use serde::Serialize;

use crate::client::Client;
use crate::command::CommandType;
use crate::error::SdkResult;

/// Caller-side pagination settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaginationConfig {
    pub page_size: Option<i32>,
    pub starting_token: Option<String>,
    /// Stop when the service hands back the token that was just sent.
    pub stop_on_same_token: bool,
}

type SetToken<I> = Arc<dyn Fn(&mut I, Option<String>) + Send + Sync>;
type GetToken<O> = Arc<dyn Fn(&O) -> Option<String> + Send + Sync>;
type SetPageSize<I> = Arc<dyn Fn(&mut I, i32) + Send + Sync>;

/// How to thread continuation tokens through one paginated operation.
pub struct Paginator<I, O> {
    command_type: CommandType<I, O>,
    input_token: SetToken<I>,
    output_token: GetToken<O>,
    page_size: Option<SetPageSize<I>>,
}

impl<I, O> Clone for Paginator<I, O> {
    fn clone(&self) -> Self {
        Self {
            command_type: self.command_type.clone(),
            input_token: self.input_token.clone(),
            output_token: self.output_token.clone(),
            page_size: self.page_size.clone(),
        }
    }
}

impl<I, O> Paginator<I, O>
where
    I: Clone + Serialize + Send + Sync + 'static,
    O: Serialize + Send + Sync + 'static,
{
    pub fn new<S, G>(command_type: CommandType<I, O>, input_token: S, output_token: G) -> Self
    where
        S: Fn(&mut I, Option<String>) + Send + Sync + 'static,
        G: Fn(&O) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            command_type,
            input_token: Arc::new(input_token),
            output_token: Arc::new(output_token),
            page_size: None,
        }
    }

    /// Setter for the operation's page size member. Only applied when the member
    /// is not already set, which the setter decides.
    pub fn with_page_size<P>(mut self, page_size: P) -> Self
    where
        P: Fn(&mut I, i32) + Send + Sync + 'static,
    {
        self.page_size = Some(Arc::new(page_size));
        self
    }

    /// Stream every page, starting from `config.starting_token`.
    ///
    /// The stream ends after a page without a continuation token, or, with
    /// `stop_on_same_token`, after a page repeating the token just sent. An error
    /// ends the stream after being yielded.
    pub fn paginate(
        &self,
        client: Arc<Client>,
        input: I,
        config: PaginationConfig,
    ) -> BoxStream<'static, SdkResult<O>> {
        struct State<I, O> {
            paginator: Paginator<I, O>,
            client: Arc<Client>,
            input: I,
            config: PaginationConfig,
            token: Option<String>,
            done: bool,
        }

        let state = State {
            paginator: self.clone(),
            client,
            input,
            token: config.starting_token.clone(),
            config,
            done: false,
        };

        stream::unfold(state, |mut state| async move {
            if state.done {
                return None;
            }
            let mut input = state.input.clone();
            (state.paginator.input_token)(&mut input, state.token.clone());
            if let (Some(set_page_size), Some(size)) =
                (&state.paginator.page_size, state.config.page_size)
            {
                set_page_size(&mut input, size);
            }

            let command = state.paginator.command_type.new_command(input);
            match state.client.send(command).await {
                Ok(page) => {
                    let previous = state.token.take();
                    let next = (state.paginator.output_token)(&page);
                    state.done = match &next {
                        None => true,
                        Some(token) if token.is_empty() => true,
                        Some(token) => {
                            state.config.stop_on_same_token && previous.as_ref() == Some(token)
                        }
                    };
                    state.token = next;
                    Some((Ok(page), state))
                }
                Err(error) => {
                    state.done = true;
                    Some((Err(error), state))
                }
            }
        })
        .boxed()
    }
}
