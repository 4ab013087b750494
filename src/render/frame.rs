use anyhow::{bail, Result};
use wgpu::util::DeviceExt;

use super::gpu::GpuContext;
use super::pipeline::{self, LineVertex, PipelineSpec, RenderPipeline, ViewUniforms};
use super::scene::{Label, Scene, SpectrogramQuad};
use super::text::TextOverlay;

const VIEW_WGSL: &str = include_str!("shaders/view.wgsl");
const SPECTROGRAM_WGSL: &str = include_str!("shaders/spectrogram.wgsl");
const LINES_WGSL: &str = include_str!("shaders/lines.wgsl");
const OVERLAY_WGSL: &str = include_str!("shaders/overlay.wgsl");

const HISTORY_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const OVERLAY_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const INITIAL_LINE_VERTICES: usize = 8192;

/// Expand packed RGB rows into RGBA for upload.
fn rgb_to_rgba(rgb: &[u8], out: &mut Vec<u8>) {
    out.clear();
    out.reserve(rgb.len() / 3 * 4);
    for px in rgb.chunks_exact(3) {
        out.extend_from_slice(&[px[0], px[1], px[2], 255]);
    }
}

fn line_vertices(scene: &Scene<'_>) -> Vec<LineVertex> {
    let mut vertices = Vec::new();
    for stroke in &scene.strokes {
        for [a, b] in stroke.segment_pairs() {
            vertices.push(LineVertex::new(a, stroke.color, stroke.space));
            vertices.push(LineVertex::new(b, stroke.color, stroke.space));
        }
    }
    vertices
}

struct TexturedLayer {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    width: u32,
    height: u32,
}

impl TexturedLayer {
    #[allow(clippy::too_many_arguments)]
    fn new(
        gpu: &GpuContext,
        label: &str,
        layout: &wgpu::BindGroupLayout,
        uniforms: &wgpu::Buffer,
        sampler: &wgpu::Sampler,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Self {
        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
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
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        });

        Self {
            texture,
            bind_group,
            width,
            height,
        }
    }

    fn upload(&self, gpu: &GpuContext, rgba: &[u8]) {
        gpu.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(self.width * 4),
                rows_per_image: Some(self.height),
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
    }
}

/// Draws a [`Scene`] onto the window surface: spectrogram texture, line
/// strokes, then the label overlay.
pub struct FrameRenderer {
    spectrogram_pipeline: RenderPipeline,
    line_pipeline: RenderPipeline,
    overlay_pipeline: RenderPipeline,
    textured_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    history_sampler: wgpu::Sampler,
    overlay_sampler: wgpu::Sampler,
    history: TexturedLayer,
    history_revision: Option<u64>,
    history_rgba: Vec<u8>,
    line_buffer: wgpu::Buffer,
    line_capacity: usize,
    overlay: TexturedLayer,
    overlay_pixels: Vec<u8>,
    overlay_labels: Option<Vec<Label>>,
    text: Option<TextOverlay>,
}

impl FrameRenderer {
    pub fn new(
        gpu: &GpuContext,
        history_width: usize,
        history_depth: usize,
        text: Option<TextOverlay>,
    ) -> Result<Self> {
        let max = gpu.max_texture_size() as usize;
        if history_width > max || history_depth > max {
            bail!(
                "Spectrogram texture {}x{} exceeds the GPU limit of {} (lower --buffer-size or --history)",
                history_width,
                history_depth,
                max
            );
        }

        let device = &gpu.device;
        let format = gpu.format();

        let uniform_layout = pipeline::bind_group_layout(device, "view_uniform_layout", false);
        let textured_layout = pipeline::bind_group_layout(device, "view_texture_layout", true);

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("view_uniforms"),
            contents: bytemuck::bytes_of(&ViewUniforms::default()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("view_uniform_bind_group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let spectrogram_source = format!("{VIEW_WGSL}\n{SPECTROGRAM_WGSL}");
        let spectrogram_pipeline = RenderPipeline::new(
            device,
            PipelineSpec {
                label: "spectrogram_pipeline",
                shader_source: &spectrogram_source,
                bind_group_layout: &textured_layout,
                vertex_buffers: &[],
                topology: wgpu::PrimitiveTopology::TriangleList,
                blend: wgpu::BlendState::REPLACE,
            },
            format,
        );

        let lines_source = format!("{VIEW_WGSL}\n{LINES_WGSL}");
        let line_pipeline = RenderPipeline::new(
            device,
            PipelineSpec {
                label: "line_pipeline",
                shader_source: &lines_source,
                bind_group_layout: &uniform_layout,
                vertex_buffers: &[LineVertex::layout()],
                topology: wgpu::PrimitiveTopology::LineList,
                blend: wgpu::BlendState::REPLACE,
            },
            format,
        );

        let overlay_source = format!("{VIEW_WGSL}\n{OVERLAY_WGSL}");
        let overlay_pipeline = RenderPipeline::new(
            device,
            PipelineSpec {
                label: "overlay_pipeline",
                shader_source: &overlay_source,
                bind_group_layout: &textured_layout,
                vertex_buffers: &[],
                topology: wgpu::PrimitiveTopology::TriangleList,
                blend: wgpu::BlendState::ALPHA_BLENDING,
            },
            format,
        );

        let history_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("history_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let overlay_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("overlay_sampler"),
            ..Default::default()
        });

        let history = TexturedLayer::new(
            gpu,
            "history_texture",
            &textured_layout,
            &uniform_buffer,
            &history_sampler,
            HISTORY_FORMAT,
            history_width as u32,
            history_depth as u32,
        );
        let overlay = TexturedLayer::new(
            gpu,
            "overlay_texture",
            &textured_layout,
            &uniform_buffer,
            &overlay_sampler,
            OVERLAY_FORMAT,
            gpu.config.width,
            gpu.config.height,
        );

        let line_buffer = Self::create_line_buffer(device, INITIAL_LINE_VERTICES);

        Ok(Self {
            spectrogram_pipeline,
            line_pipeline,
            overlay_pipeline,
            textured_layout,
            uniform_buffer,
            uniform_bind_group,
            history_sampler,
            overlay_sampler,
            history,
            history_revision: None,
            history_rgba: Vec::new(),
            line_buffer,
            line_capacity: INITIAL_LINE_VERTICES,
            overlay_pixels: vec![0; (gpu.config.width * gpu.config.height * 4) as usize],
            overlay,
            overlay_labels: None,
            text,
        })
    }

    fn create_line_buffer(device: &wgpu::Device, vertices: usize) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("line_vertices"),
            size: (vertices * std::mem::size_of::<LineVertex>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Recreate size-dependent resources after the surface changed.
    pub fn resize(&mut self, gpu: &GpuContext) {
        let (width, height) = (gpu.config.width, gpu.config.height);
        if width == self.overlay.width && height == self.overlay.height {
            return;
        }
        self.overlay = TexturedLayer::new(
            gpu,
            "overlay_texture",
            &self.textured_layout,
            &self.uniform_buffer,
            &self.overlay_sampler,
            OVERLAY_FORMAT,
            width,
            height,
        );
        self.overlay_pixels = vec![0; (width * height * 4) as usize];
        self.overlay_labels = None;
    }

    fn update_history(&mut self, gpu: &GpuContext, quad: &SpectrogramQuad<'_>) {
        if self.history_revision == Some(quad.revision) {
            return;
        }
        if quad.width as u32 != self.history.width || quad.depth as u32 != self.history.height {
            self.history = TexturedLayer::new(
                gpu,
                "history_texture",
                &self.textured_layout,
                &self.uniform_buffer,
                &self.history_sampler,
                HISTORY_FORMAT,
                quad.width as u32,
                quad.depth as u32,
            );
        }
        rgb_to_rgba(quad.pixels, &mut self.history_rgba);
        self.history.upload(gpu, &self.history_rgba);
        self.history_revision = Some(quad.revision);
    }

    fn update_lines(&mut self, gpu: &GpuContext, vertices: &[LineVertex]) {
        if vertices.len() > self.line_capacity {
            self.line_capacity = vertices.len().next_power_of_two();
            self.line_buffer = Self::create_line_buffer(&gpu.device, self.line_capacity);
            log::debug!("Line buffer grown to {} vertices", self.line_capacity);
        }
        if !vertices.is_empty() {
            gpu.queue.write_buffer(&self.line_buffer, 0, bytemuck::cast_slice(vertices));
        }
    }

    fn update_overlay(&mut self, gpu: &GpuContext, labels: &[Label]) {
        let Some(text) = &self.text else {
            return;
        };
        if self.overlay_labels.as_deref() == Some(labels) {
            return;
        }
        self.overlay_pixels.fill(0);
        text.draw_labels(&mut self.overlay_pixels, self.overlay.width, self.overlay.height, labels);
        self.overlay.upload(gpu, &self.overlay_pixels);
        self.overlay_labels = Some(labels.to_vec());
    }

    pub fn render(&mut self, gpu: &GpuContext, scene: &Scene<'_>) -> Result<(), wgpu::SurfaceError> {
        let quad = &scene.spectrogram;
        self.update_history(gpu, quad);

        let vertices = line_vertices(scene);
        self.update_lines(gpu, &vertices);
        self.update_overlay(gpu, &scene.labels);

        let uniforms = ViewUniforms::new(
            scene.scale,
            scene.offset,
            quad.newest_slot,
            quad.depth,
            quad.bottom,
            quad.top,
        );
        gpu.queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let frame = gpu.surface.get_current_texture()?;
        let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("frame_encoder"),
        });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("main_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_pipeline(&self.spectrogram_pipeline.pipeline);
            pass.set_bind_group(0, &self.history.bind_group, &[]);
            pass.draw(0..6, 0..1);

            if !vertices.is_empty() {
                pass.set_pipeline(&self.line_pipeline.pipeline);
                pass.set_bind_group(0, &self.uniform_bind_group, &[]);
                pass.set_vertex_buffer(0, self.line_buffer.slice(..));
                pass.draw(0..vertices.len() as u32, 0..1);
            }

            if self.text.is_some() {
                pass.set_pipeline(&self.overlay_pipeline.pipeline);
                pass.set_bind_group(0, &self.overlay.bind_group, &[]);
                pass.draw(0..3, 0..1); // fullscreen triangle
            }
        }

        gpu.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::scene::{Space, Stroke};

    #[test]
    fn test_rgb_expands_to_opaque_rgba() {
        let mut out = Vec::new();
        rgb_to_rgba(&[1, 2, 3, 4, 5, 6], &mut out);
        assert_eq!(out, vec![1, 2, 3, 255, 4, 5, 6, 255]);
    }

    #[test]
    fn test_line_vertices_from_strokes() {
        let scene = Scene {
            spectrogram: SpectrogramQuad {
                pixels: &[],
                width: 0,
                depth: 0,
                newest_slot: 0,
                revision: 0,
                bottom: -0.5,
                top: 1.0,
            },
            scale: 1.0,
            offset: 0.0,
            strokes: vec![
                Stroke::strip(Space::World, [1.0; 3], vec![[-1.0, 0.0], [0.0, 0.0], [1.0, 0.0]]),
                Stroke::vertical(Space::Screen, [0.5; 3], 0.0, -1.0, 1.0),
            ],
            labels: Vec::new(),
        };
        let vertices = line_vertices(&scene);
        assert_eq!(vertices.len(), 6);
        assert_eq!(vertices[0].world, 1.0);
        assert_eq!(vertices[4].world, 0.0);
        assert_eq!(vertices[5].position, [0.0, 1.0]);
    }
}
