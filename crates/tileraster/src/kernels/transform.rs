//! Vertex stage: one unit of work per triangle of the whole batch.

use crate::data::TransformedTriangle;
use crate::device::Device;
use crate::mesh::{resolve_owner, BatchView};
use crate::registry::Kernel;
use crate::shader::Shader;

/// Transforms and classifies every triangle of the batch into its scratch
/// slot, which shares the triangle's index.
pub fn run<S: Shader>(
    device: &Device,
    kernel: &Kernel,
    shader: &S,
    batch: &mut BatchView<'_>,
    width: u32,
    height: u32,
) {
    let triangles = batch.triangles;
    let tickets = batch.tickets;
    debug_assert_eq!(triangles.len(), batch.scratch.len());
    device.dispatch_each(kernel, &mut *batch.scratch, |i, out| {
        let Some((mesh, _)) = resolve_owner(tickets, i as u32) else {
            *out = TransformedTriangle::REJECTED;
            return;
        };
        let ticket = &tickets[mesh as usize];
        let mut transformed = shader.vertex(&triangles[i], &ticket.combined, width, height);
        transformed.mesh = mesh;
        *out = transformed;
    });
}
