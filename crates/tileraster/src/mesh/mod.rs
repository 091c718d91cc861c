// src/mesh/mod.rs
//! Batched meshes: the triangle store, the ticket table and their device mirrors.

pub mod store;
pub mod tickets;

pub use self::store::TriangleStore;
pub use self::tickets::{resolve_owner, TicketTable};

use crate::data::{MeshId, MeshTicket, MeshTransform, TransformedTriangle, Triangle};
use crate::device::{Device, DeviceBuffer};
use crate::error::{RasterError, Result};
use glam::{Mat4, Vec3};

/// Which host-side arrays are newer than their device copies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirtyState {
    pub triangles: bool,
    pub tickets: bool,
}

/// What one call to [`MeshBatch::upload_if_dirty`] transferred.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadReport {
    pub triangles: bool,
    pub tickets: bool,
    /// The transformed-triangle scratch buffer was reallocated.
    pub scratch_resized: bool,
    pub bytes: usize,
}

#[derive(Default)]
struct BatchBuffers {
    triangles: Option<DeviceBuffer<Triangle>>,
    tickets: Option<DeviceBuffer<MeshTicket>>,
    scratch: Option<DeviceBuffer<TransformedTriangle>>,
}

/// Device-resident view of a batch handed to the kernels.
pub struct BatchView<'a> {
    pub triangles: &'a [Triangle],
    pub tickets: &'a [MeshTicket],
    pub scratch: &'a mut [TransformedTriangle],
}

/// Many meshes sharing one triangle store, mirrored lazily on the device.
///
/// Model transforms are applied at draw time through the tickets, so moving
/// a mesh or the camera never touches the geometry upload.
pub struct MeshBatch {
    store: TriangleStore,
    tickets: TicketTable,
    transforms: Vec<MeshTransform>,
    camera: Mat4,
    dirty: DirtyState,
    buffers: BatchBuffers,
}

impl Default for MeshBatch {
    fn default() -> Self {
        Self::new()
    }
}

impl MeshBatch {
    pub fn new() -> Self {
        Self {
            store: TriangleStore::new(),
            tickets: TicketTable::new(),
            transforms: Vec::new(),
            camera: Mat4::IDENTITY,
            dirty: DirtyState::default(),
            buffers: BatchBuffers::default(),
        }
    }

    /// Appends a mesh and returns its id. Empty meshes are accepted.
    pub fn add_mesh(&mut self, triangles: &[Triangle], transform: MeshTransform) -> MeshId {
        let range = self.store.append(triangles);
        let model = transform.matrix();
        let id = self.tickets.push(range, model);
        if let Some(ticket) = self.tickets.get_mut(id) {
            ticket.combined = self.camera * model;
        }
        self.transforms.push(transform);
        self.dirty.triangles = true;
        self.dirty.tickets = true;

        log::debug!(
            "Added mesh {} with {} triangles ({} total)",
            id,
            triangles.len(),
            self.store.len()
        );
        id
    }

    /// Replaces a mesh's transform and recomputes its model matrix.
    pub fn set_transform(
        &mut self,
        mesh: MeshId,
        position: Vec3,
        rotation_degrees: Vec3,
        scale: Vec3,
    ) -> Result<()> {
        self.set_mesh_transform(mesh, MeshTransform::new(position, rotation_degrees, scale))
    }

    pub fn set_mesh_transform(&mut self, mesh: MeshId, transform: MeshTransform) -> Result<()> {
        let camera = self.camera;
        let ticket = self
            .tickets
            .get_mut(mesh)
            .ok_or(RasterError::UnknownMesh(mesh))?;
        ticket.model = transform.matrix();
        ticket.combined = camera * ticket.model;
        self.transforms[mesh as usize] = transform;
        self.dirty.tickets = true;
        Ok(())
    }

    /// Recomputes `camera * model` for every ticket. Call once per frame
    /// before rendering.
    pub fn apply_camera(&mut self, camera: Mat4) {
        self.camera = camera;
        for ticket in self.tickets.iter_mut() {
            ticket.combined = camera * ticket.model;
        }
        self.dirty.tickets = true;
    }

    /// Brings the device copies up to date, transferring only what changed.
    pub fn upload_if_dirty(&mut self, device: &Device) -> Result<UploadReport> {
        let mut report = UploadReport::default();
        let triangle_count = self.store.len();
        let mesh_count = self.tickets.len();

        if self.dirty.triangles || self.buffers.triangles.is_none() {
            let buffer = reuse_or_allocate(device, &mut self.buffers.triangles, triangle_count)?;
            device.upload(buffer, self.store.as_slice());
            report.triangles = true;
            report.bytes += std::mem::size_of_val(self.store.as_slice());
            self.dirty.triangles = false;
        }

        if self.dirty.tickets || self.buffers.tickets.is_none() {
            let buffer = reuse_or_allocate(device, &mut self.buffers.tickets, mesh_count)?;
            device.upload(buffer, self.tickets.as_slice());
            report.tickets = true;
            report.bytes += std::mem::size_of_val(self.tickets.as_slice());
            self.dirty.tickets = false;
        }

        let scratch_len = self.buffers.scratch.as_ref().map(DeviceBuffer::len);
        if scratch_len != Some(triangle_count) {
            self.buffers.scratch = None;
            self.buffers.scratch = Some(device.allocate(triangle_count)?);
            report.scratch_resized = true;
        }

        if report.triangles || report.scratch_resized {
            log::debug!(
                "Batch upload: {} meshes, {} triangles, {} bytes",
                mesh_count,
                triangle_count,
                report.bytes
            );
        }
        Ok(report)
    }

    /// Device-side view for the kernels; `None` until the first upload.
    pub fn device_view(&mut self) -> Option<BatchView<'_>> {
        let BatchBuffers {
            triangles,
            tickets,
            scratch,
        } = &mut self.buffers;
        Some(BatchView {
            triangles: triangles.as_ref()?.as_slice(),
            tickets: tickets.as_ref()?.as_slice(),
            scratch: scratch.as_mut()?.as_mut_slice(),
        })
    }

    pub fn mesh_count(&self) -> usize {
        self.tickets.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.store.len()
    }

    pub fn ticket(&self, mesh: MeshId) -> Option<&MeshTicket> {
        self.tickets.get(mesh)
    }

    pub fn tickets(&self) -> &TicketTable {
        &self.tickets
    }

    pub fn transform(&self, mesh: MeshId) -> Option<&MeshTransform> {
        self.transforms.get(mesh as usize)
    }

    pub fn triangles(&self) -> &TriangleStore {
        &self.store
    }

    pub fn camera(&self) -> Mat4 {
        self.camera
    }

    pub fn dirty(&self) -> DirtyState {
        self.dirty
    }

    /// Owning mesh and local index of a global triangle index.
    pub fn owner_of(&self, index: u32) -> Option<(MeshId, u32)> {
        self.tickets.owner_of(index)
    }
}

/// Returns `slot`'s buffer if it already has `len` elements, otherwise frees
/// it and allocates a new one.
fn reuse_or_allocate<'a, T: bytemuck::Pod>(
    device: &Device,
    slot: &'a mut Option<DeviceBuffer<T>>,
    len: usize,
) -> Result<&'a mut DeviceBuffer<T>> {
    if slot.as_ref().map(DeviceBuffer::len) != Some(len) {
        *slot = None;
        *slot = Some(device.allocate(len)?);
    }
    match slot {
        Some(buffer) => Ok(buffer),
        None => unreachable!("slot was filled above"),
    }
}
