//! GPU-resident simulation fields
//!
//! A [`Field`] is a texture plus its render-target view; a [`DoubleField`]
//! is a ping-pong pair with explicit read/write roles. A pass must never
//! sample and render the same texture, so every writing stage targets
//! `write()` and the owner swaps afterwards.

use wgpu::{Device, Texture, TextureFormat, TextureView};

/// Single render-target field.
pub struct Field {
    texture: Texture,
    pub view: TextureView,
    pub width: u32,
    pub height: u32,
}

impl Field {
    pub fn new(device: &Device, label: &str, width: u32, height: u32, format: TextureFormat) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            texture,
            view,
            width,
            height,
        }
    }

    /// Reciprocal of the field dimensions, passed to neighbor-sampling stages.
    pub fn texel_size(&self) -> [f32; 2] {
        [1.0 / self.width as f32, 1.0 / self.height as f32]
    }

    pub fn texture(&self) -> &Texture {
        &self.texture
    }
}

/// Ping-pong buffered field.
pub struct DoubleField {
    fields: [Field; 2],
    read_index: usize,
}

impl DoubleField {
    pub fn new(device: &Device, label: &str, width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            fields: [
                Field::new(device, &format!("{label} A"), width, height, format),
                Field::new(device, &format!("{label} B"), width, height, format),
            ],
            read_index: 0,
        }
    }

    pub fn read(&self) -> &Field {
        &self.fields[self.read_index]
    }

    pub fn write(&self) -> &Field {
        &self.fields[1 - self.read_index]
    }

    /// Exchange read/write roles. O(1); the textures themselves never move.
    pub fn swap(&mut self) {
        self.read_index = 1 - self.read_index;
    }

    pub fn width(&self) -> u32 {
        self.fields[0].width
    }

    pub fn height(&self) -> u32 {
        self.fields[0].height
    }

    pub fn texel_size(&self) -> [f32; 2] {
        self.fields[0].texel_size()
    }

    /// Both underlying fields, for bulk operations like clearing.
    pub fn both(&self) -> [&Field; 2] {
        [&self.fields[0], &self.fields[1]]
    }
}
