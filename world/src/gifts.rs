//! Pending gift tickets, the completion throttle and the completed-gift history.

use std::{collections::VecDeque, num::NonZeroU32, time::Duration};

use galton_board_core::{
    GiftMetadata, GiftRequest, GiftTicketSnapshot, ImageRef, TicketId, ANONYMOUS_OWNER,
};

/// Record of the tokens one gift still owes.
#[derive(Clone, Debug)]
pub(crate) struct GiftTicket {
    id: TicketId,
    weight: NonZeroU32,
    spawned: u32,
    remaining: u32,
    owner: String,
    avatar: ImageRef,
    metadata: GiftMetadata,
}

impl GiftTicket {
    fn from_request(id: TicketId, request: GiftRequest, default_avatar: &ImageRef) -> Self {
        let owner = request
            .owner()
            .map_or_else(|| ANONYMOUS_OWNER.to_owned(), str::to_owned);
        let avatar = request
            .avatar()
            .cloned()
            .unwrap_or_else(|| default_avatar.clone());
        Self {
            id,
            weight: request.weight(),
            spawned: 0,
            remaining: request.weight().get(),
            owner,
            avatar,
            metadata: request.metadata().clone(),
        }
    }

    pub(crate) const fn id(&self) -> TicketId {
        self.id
    }

    pub(crate) const fn weight(&self) -> NonZeroU32 {
        self.weight
    }

    pub(crate) fn owner(&self) -> &str {
        &self.owner
    }

    pub(crate) fn avatar(&self) -> &ImageRef {
        &self.avatar
    }

    pub(crate) fn snapshot(&self) -> GiftTicketSnapshot {
        GiftTicketSnapshot {
            id: self.id,
            weight: self.weight,
            spawned: self.spawned,
            remaining: self.remaining,
            owner: self.owner.clone(),
            avatar: self.avatar.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

/// Result of asking the queue for its next spawn.
#[derive(Clone, Copy, Debug)]
pub(crate) enum DrainCandidate<'a> {
    /// Nothing is pending.
    Empty,
    /// The head ticket is waiting for the completion interval to elapse.
    Throttled(TicketId),
    /// The head ticket may spawn now.
    Eligible(&'a GiftTicket),
}

/// FIFO of pending tickets plus a bounded, most-recent-first history.
#[derive(Clone, Debug)]
pub(crate) struct GiftQueue {
    pending: VecDeque<GiftTicket>,
    history: VecDeque<GiftTicket>,
    history_capacity: usize,
    min_completion_interval: Duration,
    last_completion: Option<Duration>,
    next_ticket: u64,
}

impl GiftQueue {
    pub(crate) fn new(history_capacity: usize, min_completion_interval: Duration) -> Self {
        Self {
            pending: VecDeque::new(),
            history: VecDeque::with_capacity(history_capacity + 1),
            history_capacity,
            min_completion_interval,
            last_completion: None,
            next_ticket: 0,
        }
    }

    /// Appends a ticket built from `request`, defaulting missing identity and avatar.
    pub(crate) fn add_gift(
        &mut self,
        request: GiftRequest,
        default_avatar: &ImageRef,
    ) -> &GiftTicket {
        let id = TicketId::new(self.next_ticket);
        self.next_ticket = self.next_ticket.saturating_add(1);
        self.pending
            .push_back(GiftTicket::from_request(id, request, default_avatar));
        &self.pending[self.pending.len() - 1]
    }

    /// Returns the head ticket if the global completion throttle allows a spawn at `now`.
    pub(crate) fn next_eligible_spawn(&self, now: Duration) -> DrainCandidate<'_> {
        let Some(head) = self.pending.front() else {
            return DrainCandidate::Empty;
        };

        match self.last_completion {
            Some(completed_at)
                if now.saturating_sub(completed_at) < self.min_completion_interval =>
            {
                DrainCandidate::Throttled(head.id)
            }
            _ => DrainCandidate::Eligible(head),
        }
    }

    /// Charges one spawn to the head ticket.
    ///
    /// Returns the ticket once it completes; it has then moved from the
    /// pending queue to the front of the history.
    pub(crate) fn consume_one_spawn(&mut self, now: Duration) -> Option<&GiftTicket> {
        let head = self.pending.front_mut()?;
        head.remaining = head.remaining.saturating_sub(1);
        head.spawned = head.spawned.saturating_add(1);
        if head.remaining > 0 {
            return None;
        }

        let completed = self.pending.pop_front()?;
        self.history.push_front(completed);
        self.history.truncate(self.history_capacity);
        self.last_completion = Some(now);
        self.history.front()
    }

    pub(crate) fn pending(&self) -> impl Iterator<Item = &GiftTicket> {
        self.pending.iter()
    }

    pub(crate) fn history(&self) -> impl Iterator<Item = &GiftTicket> {
        self.history.iter()
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
