//! Thread reconstruction from a bounded window of stored messages.

use super::{ConversationThread, ThreadEntry, ThreadMessage};
use crate::error::{HiloError, Result};
use crate::message_store::{MessageStore, SimilarityHit};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Rows fetched on each side of a hit.
pub const DEFAULT_WINDOW_SIZE: usize = 1000;

/// Rebuilds the conversation thread a similarity hit belongs to.
pub struct ThreadReconstructor {
    store: Arc<dyn MessageStore>,
    window_size: usize,
}

impl ThreadReconstructor {
    /// Create a reconstructor reading from `store`.
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self {
            store,
            window_size: DEFAULT_WINDOW_SIZE,
        }
    }

    /// Set the number of rows fetched on each side of a hit.
    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    /// Reconstruct the thread of `hit` from the rows around it.
    ///
    /// Store failures are returned as-is; nothing is retried.
    #[instrument(skip(self, hit), fields(title = %hit.metadata.title, message_id = hit.metadata.message_id))]
    pub async fn reconstruct(&self, hit: &SimilarityHit) -> Result<ConversationThread> {
        let rows = self
            .store
            .window_fetch(hit.id, hit.id, &hit.metadata.title, self.window_size)
            .await?;

        let window: Vec<ThreadMessage> = rows.iter().map(ThreadMessage::from).collect();
        debug!("Reconstructing from {} window rows", window.len());

        build_thread(&ThreadMessage::from(hit), window)
    }
}

/// Result of walking reply pointers from one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Root {
    Found(i64),
    Cycle,
}

/// Memoized root resolution over one window.
struct RootFinder<'a> {
    by_id: HashMap<i64, &'a ThreadMessage>,
    memo: HashMap<i64, Root>,
}

impl<'a> RootFinder<'a> {
    fn new(window: &'a [ThreadMessage]) -> Self {
        // Later rows win on duplicate ids
        let by_id = window.iter().map(|m| (m.message_id, m)).collect();
        Self {
            by_id,
            memo: HashMap::new(),
        }
    }

    /// Follow parents while they are inside the window. An id that is not in
    /// the window is its own root.
    fn root_of(&mut self, message_id: i64) -> Root {
        let mut path = Vec::new();
        let mut visited = HashSet::new();
        let mut current = message_id;

        let root = loop {
            if let Some(known) = self.memo.get(&current) {
                break *known;
            }
            if !visited.insert(current) {
                break Root::Cycle;
            }
            path.push(current);

            match self.by_id.get(&current).and_then(|m| m.reply_to_message_id) {
                Some(parent) if self.by_id.contains_key(&parent) => current = parent,
                _ => break Root::Found(current),
            }
        };

        for id in path {
            self.memo.insert(id, root);
        }
        root
    }
}

/// Build the thread of `hit` from an already fetched window.
///
/// The hit itself is always a member: if the window does not contain its
/// message id, the hit is added to the window first.
pub fn build_thread(
    hit: &ThreadMessage,
    mut window: Vec<ThreadMessage>,
) -> Result<ConversationThread> {
    if !window.iter().any(|m| m.message_id == hit.message_id) {
        debug!("Hit {} missing from its window, adding it", hit.message_id);
        window.push(hit.clone());
    }

    let mut finder = RootFinder::new(&window);
    let root_id = match finder.root_of(hit.message_id) {
        Root::Found(id) => id,
        Root::Cycle => {
            return Err(HiloError::CyclicThread {
                title: hit.title.clone(),
                message_id: hit.message_id,
            })
        }
    };

    let mut members: Vec<&ThreadMessage> = window
        .iter()
        .filter(|m| finder.root_of(m.message_id) == Root::Found(root_id))
        .collect();

    // Stable sort; undated messages come first
    members.sort_by_key(|m| m.date);

    Ok(ConversationThread {
        root_id,
        entries: members.into_iter().map(ThreadEntry::from).collect(),
    })
}
