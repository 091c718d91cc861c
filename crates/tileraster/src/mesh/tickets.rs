use crate::data::{MeshId, MeshTicket};
use glam::Mat4;
use std::ops::Range;

/// Per-mesh tickets, in mesh-id order.
///
/// Ticket ranges are contiguous and cover the triangle store exactly, so the
/// owner of a triangle can be found by binary search on range ends.
#[derive(Debug, Default, Clone)]
pub struct TicketTable {
    tickets: Vec<MeshTicket>,
}

impl TicketTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a ticket for `range` and returns its mesh id.
    pub fn push(&mut self, range: Range<u32>, model: Mat4) -> MeshId {
        debug_assert_eq!(
            range.start,
            self.tickets.last().map_or(0, MeshTicket::end),
            "ticket ranges must be contiguous"
        );
        let id = self.tickets.len() as MeshId;
        self.tickets
            .push(MeshTicket::new(range.start, range.end - range.start, model));
        id
    }

    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }

    pub fn get(&self, mesh: MeshId) -> Option<&MeshTicket> {
        self.tickets.get(mesh as usize)
    }

    pub fn get_mut(&mut self, mesh: MeshId) -> Option<&mut MeshTicket> {
        self.tickets.get_mut(mesh as usize)
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, MeshTicket> {
        self.tickets.iter_mut()
    }

    pub fn as_slice(&self) -> &[MeshTicket] {
        &self.tickets
    }

    /// Owning mesh and local index of a global triangle index.
    pub fn owner_of(&self, index: u32) -> Option<(MeshId, u32)> {
        resolve_owner(&self.tickets, index)
    }

    /// True when the ticket ranges tile `0..total` with no gap or overlap.
    pub fn covers(&self, total: u32) -> bool {
        let mut next = 0;
        for ticket in &self.tickets {
            if ticket.start_index != next {
                return false;
            }
            next = ticket.end();
        }
        next == total
    }
}

/// Maps a global triangle index to `(mesh, local index)`.
///
/// Tickets are sorted by start and their ends never decrease, so the owner is
/// the first ticket whose end lies past `index`; empty tickets are skipped.
pub fn resolve_owner(tickets: &[MeshTicket], index: u32) -> Option<(MeshId, u32)> {
    let slot = tickets.partition_point(|t| t.end() <= index);
    let ticket = tickets.get(slot)?;
    ticket
        .contains(index)
        .then(|| (slot as MeshId, index - ticket.start_index))
}
