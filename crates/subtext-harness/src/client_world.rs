//! Real-system counterpart of [`ModelWorld`](crate::ModelWorld).
//!
//! A logged-in client traverses one board's messages on a [`SimServer`]
//! while operations mutate the board between reads. Model items map to
//! message ids so observable states compare directly.
//!
//! [`SimServer`]: crate::SimServer

use std::collections::HashMap;

use subtext_client::{Client, ClientConfig, ClientError, Message, PageError, PagedCollection};
use uuid::Uuid;

use crate::{
    model::{ModelItem, ObservableState, PagingOp, StepOutcome},
    sim_server::{SharedSimServer, SimConfig, create_shared_server},
};

const USER: &str = "pager";
const PASSWORD: &str = "correct horse";

/// Real client traversing a simulated board.
pub struct ClientWorld {
    server: SharedSimServer,
    board: Uuid,
    author: Uuid,
    messages: PagedCollection<Message, ClientError>,
    position: usize,
    items: HashMap<Uuid, ModelItem>,
    next: ModelItem,
}

impl ClientWorld {
    /// Create a board with `initial` messages and a client that asks for
    /// pages of `limit` messages.
    pub fn new(initial: usize, limit: usize, seed: u64) -> Result<Self, ClientError> {
        let server = create_shared_server(SimConfig {
            page_limit: limit,
            inline_content: true,
            seed,
            ..SimConfig::default()
        });

        let (author, board) = {
            let mut s = server.lock();
            let author = s.add_user(USER, PASSWORD);
            let board = s.add_board("paging", author, &[]);
            (author, board)
        };

        let config = ClientConfig {
            page_size: u32::try_from(limit).unwrap_or(u32::MAX),
            ..ClientConfig::new("sim://subtext")
        };
        let client = Client::with_transport(config, server.clone())?;
        let ctx = client.login(USER, PASSWORD)?;
        let messages = ctx.board(board).messages();

        let mut world = Self {
            server,
            board,
            author,
            messages,
            position: 0,
            items: HashMap::new(),
            next: 0,
        };
        for _ in 0..initial {
            world.insert_at(usize::MAX);
        }
        Ok(world)
    }

    /// Handle to the simulated server.
    pub fn server(&self) -> &SharedSimServer {
        &self.server
    }

    /// Apply an operation and return the result.
    pub fn apply(&mut self, op: &PagingOp) -> StepOutcome {
        match op {
            PagingOp::Step => self.step(),
            PagingOp::Insert { position } => {
                let len = self.server.lock().messages(self.board).len();
                self.insert_at(usize::from(*position) % (len + 1));
                StepOutcome::Applied
            },
            PagingOp::Append => {
                self.insert_at(usize::MAX);
                StepOutcome::Applied
            },
            PagingOp::Remove { position } => {
                let mut server = self.server.lock();
                let len = server.messages(self.board).len();
                if len > 0 {
                    server.remove_message(self.board, usize::from(*position) % len);
                }
                StepOutcome::Applied
            },
            PagingOp::FailNextFetch => {
                self.server.lock().fail_next(503, "Unavailable");
                StepOutcome::Applied
            },
            PagingOp::Reopen => {
                self.messages.reopen();
                StepOutcome::Applied
            },
        }
    }

    /// Extract observable state for comparison.
    pub fn observable_state(&self) -> ObservableState {
        ObservableState {
            yielded: self.messages.cached().map(|m| self.item(m)).collect(),
            position: self.position,
            cursor: self.messages.cursor(),
            exhausted: self.messages.is_exhausted(),
        }
    }

    fn step(&mut self) -> StepOutcome {
        match self.messages.get(self.position) {
            Ok(message) => {
                let item = self.items.get(&message.id()).copied().unwrap_or(ModelItem::MAX);
                self.position += 1;
                StepOutcome::Item(item)
            },
            Err(PageError::Index { .. }) => StepOutcome::End,
            Err(PageError::Fetch(e)) => {
                tracing::debug!(error = %e, "page fetch failed");
                StepOutcome::FetchFailed
            },
        }
    }

    fn item(&self, message: &Message) -> ModelItem {
        self.items.get(&message.id()).copied().unwrap_or(ModelItem::MAX)
    }

    fn insert_at(&mut self, index: usize) {
        let item = self.next;
        self.next += 1;
        let id = self.server.lock().insert_message(
            self.board,
            index,
            self.author,
            "TextMessage",
            format!("item {item}"),
        );
        self.items.insert(id, item);
    }
}
