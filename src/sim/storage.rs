//! Field storage
//!
//! Owns every GPU field the solver touches. Fields are destroyed and
//! reallocated, never resized in place, so a changed resolution can not
//! leave stale texels behind. The allocation counter exists so tests can
//! verify a resize touched exactly the fields whose dimensions changed.

use wgpu::{Device, Queue, TextureFormat};

use super::fields::{DoubleField, Field};
use super::resolution::Resolution;

pub struct FieldStorage {
    pub dye: DoubleField,
    pub velocity: DoubleField,
    pub divergence: Field,
    pub curl: Field,
    pub pressure: DoubleField,
    format: TextureFormat,
    allocations: u64,
}

impl FieldStorage {
    pub fn new(device: &Device, queue: &Queue, sim_res: Resolution, dye_res: Resolution, format: TextureFormat) -> Self {
        let dye = DoubleField::new(device, "Dye Field", dye_res.width, dye_res.height, format);
        let velocity = DoubleField::new(device, "Velocity Field", sim_res.width, sim_res.height, format);
        let divergence = Field::new(device, "Divergence Field", sim_res.width, sim_res.height, format);
        let curl = Field::new(device, "Curl Field", sim_res.width, sim_res.height, format);
        let pressure = DoubleField::new(device, "Pressure Field", sim_res.width, sim_res.height, format);

        let storage = Self {
            dye,
            velocity,
            divergence,
            curl,
            pressure,
            format,
            allocations: 8,
        };
        storage.clear_all(device, queue);
        storage
    }

    /// Reallocate any fields whose target dimensions changed. Returns whether
    /// anything was reallocated. Contents of reallocated fields are discarded;
    /// the simulation restarts visually on resize.
    pub fn resize_if_needed(
        &mut self,
        device: &Device,
        queue: &Queue,
        sim_res: Resolution,
        dye_res: Resolution,
    ) -> bool {
        let mut reallocated = false;

        if dye_res.width != self.dye.width() || dye_res.height != self.dye.height() {
            log::info!(
                "[FieldStorage] Dye field {}x{} -> {}x{}",
                self.dye.width(),
                self.dye.height(),
                dye_res.width,
                dye_res.height
            );
            self.dye = DoubleField::new(device, "Dye Field", dye_res.width, dye_res.height, self.format);
            clear_fields(device, queue, &self.dye.both());
            self.allocations += 2;
            reallocated = true;
        }

        if sim_res.width != self.velocity.width() || sim_res.height != self.velocity.height() {
            log::info!(
                "[FieldStorage] Simulation fields {}x{} -> {}x{}",
                self.velocity.width(),
                self.velocity.height(),
                sim_res.width,
                sim_res.height
            );
            self.velocity = DoubleField::new(device, "Velocity Field", sim_res.width, sim_res.height, self.format);
            self.divergence = Field::new(device, "Divergence Field", sim_res.width, sim_res.height, self.format);
            self.curl = Field::new(device, "Curl Field", sim_res.width, sim_res.height, self.format);
            self.pressure = DoubleField::new(device, "Pressure Field", sim_res.width, sim_res.height, self.format);
            self.allocations += 6;
            self.clear_all(device, queue);
            reallocated = true;
        }

        reallocated
    }

    /// Total number of field allocations since creation, for test
    /// instrumentation.
    pub fn allocation_count(&self) -> u64 {
        self.allocations
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    fn clear_all(&self, device: &Device, queue: &Queue) {
        let mut targets: Vec<&Field> = Vec::new();
        targets.extend(self.dye.both());
        targets.extend(self.velocity.both());
        targets.push(&self.divergence);
        targets.push(&self.curl);
        targets.extend(self.pressure.both());
        clear_fields(device, queue, &targets);
    }
}

/// Clear freshly allocated fields to transparent black before first use.
fn clear_fields(device: &Device, queue: &Queue, fields: &[&Field]) {
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Field Clear Encoder"),
    });
    for field in fields {
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Field Clear Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &field.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
    }
    queue.submit(Some(encoder.finish()));
}
