use bytemuck::{Pod, Zeroable};

use super::scene::Space;

/// Shared per-frame view parameters, bound at @group(0) @binding(0) in
/// every shader.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct ViewUniforms {
    pub scale: f32,
    pub offset: f32,
    /// Texture V of the newest history row
    pub row_offset: f32,
    /// Screen Y where the spectrogram starts (newest row)
    pub bottom: f32,
    /// Screen Y of the oldest row
    pub top: f32,
    pub _padding: [f32; 3],
}

impl Default for ViewUniforms {
    fn default() -> Self {
        Self {
            scale: 1.0,
            offset: 0.0,
            row_offset: 0.0,
            bottom: -0.5,
            top: 1.0,
            _padding: [0.0; 3],
        }
    }
}

impl ViewUniforms {
    pub fn new(scale: f32, offset: f32, newest_slot: usize, depth: usize, bottom: f32, top: f32) -> Self {
        Self {
            scale,
            offset,
            row_offset: newest_slot as f32 / depth.max(1) as f32,
            bottom,
            top,
            _padding: [0.0; 3],
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct LineVertex {
    pub position: [f32; 2],
    pub color: [f32; 3],
    /// 1.0 when `position.x` goes through the zoom/pan transform
    pub world: f32,
}

impl LineVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x3, 2 => Float32];

    pub fn new(position: [f32; 2], color: [f32; 3], space: Space) -> Self {
        Self {
            position,
            color,
            world: match space {
                Space::World => 1.0,
                Space::Screen => 0.0,
            },
        }
    }

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<LineVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Bind group layout for the view uniforms plus an optional sampled texture.
pub fn bind_group_layout(device: &wgpu::Device, label: &str, textured: bool) -> wgpu::BindGroupLayout {
    let mut entries = vec![
        // @binding(0): ViewUniforms
        wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        },
    ];
    if textured {
        // @binding(1): texture, @binding(2): sampler
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: 2,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });
    }

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &entries,
    })
}

pub struct PipelineSpec<'a> {
    pub label: &'a str,
    pub shader_source: &'a str,
    pub bind_group_layout: &'a wgpu::BindGroupLayout,
    pub vertex_buffers: &'a [wgpu::VertexBufferLayout<'a>],
    pub topology: wgpu::PrimitiveTopology,
    pub blend: wgpu::BlendState,
}

pub struct RenderPipeline {
    pub pipeline: wgpu::RenderPipeline,
}

impl RenderPipeline {
    pub fn new(device: &wgpu::Device, spec: PipelineSpec<'_>, texture_format: wgpu::TextureFormat) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(spec.label),
            source: wgpu::ShaderSource::Wgsl(spec.shader_source.into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(spec.label),
            bind_group_layouts: &[spec.bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(spec.label),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: spec.vertex_buffers,
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: texture_format,
                    blend: Some(spec.blend),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: spec.topology,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self { pipeline }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_layout_is_16_byte_aligned() {
        assert_eq!(std::mem::size_of::<ViewUniforms>() % 16, 0);
        assert_eq!(std::mem::size_of::<LineVertex>(), 24);
    }

    #[test]
    fn test_row_offset_tracks_newest_slot() {
        let u = ViewUniforms::new(2.0, 0.5, 128, 512, -0.5, 1.0);
        assert_eq!(u.row_offset, 0.25);
        assert_eq!(ViewUniforms::new(1.0, 0.0, 0, 0, -0.5, 1.0).row_offset, 0.0);
    }

    #[test]
    fn test_vertex_space_flag() {
        assert_eq!(LineVertex::new([0.0, 0.0], [1.0; 3], Space::World).world, 1.0);
        assert_eq!(LineVertex::new([0.0, 0.0], [1.0; 3], Space::Screen).world, 0.0);
    }
}
