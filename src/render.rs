//! Escape-time Mandelbrot rasterizer fed by the viewport snapshot.
//!
//! A render-space pixel `p` maps to the world point
//! `(p - resolution/2) / zoom - offset`, and world units map to the
//! complex plane through a fixed scale. The gesture math relies on exactly
//! this mapping for its anchoring properties.

use crate::math::Vec2;
use crate::viewport::ViewportState;

pub const MAX_ITERATIONS: u32 = 255;

/// Escape palette; escaped pixels cycle through it by iteration count,
/// interior points stay black.
pub const COLOR_MASK: [[f32; 3]; 7] = [
    [1.0, 0.27, 0.24],
    [1.0, 0.65, 0.14],
    [1.0, 0.96, 0.18],
    [0.43, 1.0, 0.31],
    [0.27, 0.71, 1.0],
    [0.39, 0.4, 1.0],
    [0.61, 0.33, 1.0],
];

/// Complex units per world-space pixel at zoom 1.
const PLANE_SCALE: f32 = 1.0 / 256.0;
const PLANE_CENTER: (f32, f32) = (-0.5, 0.0);

/// Renders one RGBA8 frame at the viewport's current size.
pub fn render_cpu(state: &ViewportState) -> Vec<u8> {
    let (width, height) = (state.width, state.height);
    let resolution = state.resolution();
    let mut frame = vec![0u8; (width * height * 4) as usize];

    for y in 0..height {
        for x in 0..width {
            // Mirror X into render space, same as the gesture path.
            let render = Vec2::new(resolution.x - x as f32, y as f32);
            let world = (render - resolution * 0.5) / state.zoom - state.offset;
            let c_re = world.x * PLANE_SCALE + PLANE_CENTER.0;
            let c_im = world.y * PLANE_SCALE + PLANE_CENTER.1;

            let iterations = escape_count(c_re, c_im);
            let rgb = if iterations >= MAX_ITERATIONS {
                [0.0, 0.0, 0.0]
            } else {
                COLOR_MASK[(iterations % 7) as usize]
            };

            let at = ((y * width + x) * 4) as usize;
            frame[at] = (rgb[0] * 255.0) as u8;
            frame[at + 1] = (rgb[1] * 255.0) as u8;
            frame[at + 2] = (rgb[2] * 255.0) as u8;
            frame[at + 3] = 255;
        }
    }

    frame
}

fn escape_count(c_re: f32, c_im: f32) -> u32 {
    let (mut zx, mut zy) = (0.0f32, 0.0f32);
    let mut i = 0;
    while i < MAX_ITERATIONS {
        let x2 = zx * zx;
        let y2 = zy * zy;
        if x2 + y2 > 4.0 {
            break;
        }
        let next_x = x2 - y2 + c_re;
        zy = 2.0 * zx * zy + c_im;
        zx = next_x;
        i += 1;
    }
    i
}

#[cfg(feature = "gpu")]
pub mod gpu {
    use std::num::NonZeroU64;

    use bytemuck::{Pod, Zeroable};
    use wgpu::util::DeviceExt;

    use crate::viewport::ViewportState;

    use super::MAX_ITERATIONS;

    const SHADER_SRC: &str = r#"
struct Params {
    resolution: vec2<f32>,
    offset: vec2<f32>,
    zoom: f32,
    max_iter: u32,
    _pad: vec2<f32>,
}

@group(0) @binding(0) var<uniform> params: Params;

@vertex
fn vs_main(@builtin(vertex_index) idx: u32) -> @builtin(position) vec4<f32> {
    var positions = array<vec2<f32>, 3>(
        vec2<f32>(-1.0, -3.0),
        vec2<f32>(-1.0, 1.0),
        vec2<f32>(3.0, 1.0),
    );
    return vec4<f32>(positions[idx], 0.0, 1.0);
}

const PLANE_SCALE: f32 = 0.00390625;
const PLANE_CENTER: vec2<f32> = vec2<f32>(-0.5, 0.0);

@fragment
fn fs_main(@builtin(position) frag: vec4<f32>) -> @location(0) vec4<f32> {
    var mask = array<vec3<f32>, 7>(
        vec3<f32>(1.0, 0.27, 0.24),
        vec3<f32>(1.0, 0.65, 0.14),
        vec3<f32>(1.0, 0.96, 0.18),
        vec3<f32>(0.43, 1.0, 0.31),
        vec3<f32>(0.27, 0.71, 1.0),
        vec3<f32>(0.39, 0.4, 1.0),
        vec3<f32>(0.61, 0.33, 1.0),
    );

    let render = vec2<f32>(params.resolution.x - frag.x, frag.y);
    let world = (render - params.resolution * 0.5) / params.zoom - params.offset;
    let c = world * PLANE_SCALE + PLANE_CENTER;

    var z = vec2<f32>(0.0, 0.0);
    var i: u32 = 0u;
    loop {
        if (i >= params.max_iter) {
            break;
        }
        let x2 = z.x * z.x;
        let y2 = z.y * z.y;
        if (x2 + y2 > 4.0) {
            break;
        }
        z = vec2<f32>(x2 - y2 + c.x, 2.0 * z.x * z.y + c.y);
        i = i + 1u;
    }

    if (i >= params.max_iter) {
        return vec4<f32>(0.0, 0.0, 0.0, 1.0);
    }
    return vec4<f32>(mask[i % 7u], 1.0);
}
"#;

    pub struct GpuRenderer {
        device: wgpu::Device,
        queue: wgpu::Queue,
        pipeline: wgpu::RenderPipeline,
        bind_group_layout: wgpu::BindGroupLayout,
    }

    impl GpuRenderer {
        pub fn new() -> Result<Self, String> {
            let instance = wgpu::Instance::default();
            let adapter = pollster::block_on(
                instance.request_adapter(&wgpu::RequestAdapterOptions::default()),
            )
            .ok_or_else(|| "No GPU adapter available".to_string())?;
            let (device, queue) = pollster::block_on(
                adapter.request_device(&wgpu::DeviceDescriptor::default(), None),
            )
            .map_err(|e| format!("Failed to create device: {e}"))?;

            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("mandelbrot_shader"),
                source: wgpu::ShaderSource::Wgsl(SHADER_SRC.into()),
            });

            let bind_group_layout =
                device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("mandelbrot_bind"),
                    entries: &[wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: Some(
                                NonZeroU64::new(std::mem::size_of::<Params>() as u64).unwrap(),
                            ),
                        },
                        count: None,
                    }],
                });

            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("mandelbrot_layout"),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            });

            let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("mandelbrot_pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: "vs_main",
                    buffers: &[],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: "fs_main",
                    targets: &[Some(wgpu::ColorTargetState {
                        format: wgpu::TextureFormat::Rgba8Unorm,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            });

            Ok(Self {
                device,
                queue,
                pipeline,
                bind_group_layout,
            })
        }

        /// Renders one frame offscreen and reads it back as RGBA8.
        pub fn render(&mut self, state: &ViewportState) -> Result<Vec<u8>, String> {
            let (width, height) = (state.width.max(1), state.height.max(1));

            let texture = self.device.create_texture(&wgpu::TextureDescriptor {
                label: Some("mandelbrot_target"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            });
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

            let params = Params {
                resolution: [width as f32, height as f32],
                offset: [state.offset.x, state.offset.y],
                zoom: state.zoom,
                max_iter: MAX_ITERATIONS,
                _pad: [0.0; 2],
            };
            let uniform_buffer = self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("mandelbrot_uniform"),
                    contents: bytemuck::bytes_of(&params),
                    usage: wgpu::BufferUsages::UNIFORM,
                });

            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("mandelbrot_bind"),
                layout: &self.bind_group_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                }],
            });

            let bytes_per_row = align_to(width * 4, wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
            let readback = self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("mandelbrot_readback"),
                size: bytes_per_row as u64 * height as u64,
                usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                mapped_at_creation: false,
            });

            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("mandelbrot_encoder"),
                });
            {
                let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("mandelbrot_pass"),
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
                pass.set_pipeline(&self.pipeline);
                pass.set_bind_group(0, &bind_group, &[]);
                pass.draw(0..3, 0..1);
            }
            encoder.copy_texture_to_buffer(
                texture.as_image_copy(),
                wgpu::ImageCopyBuffer {
                    buffer: &readback,
                    layout: wgpu::ImageDataLayout {
                        offset: 0,
                        bytes_per_row: Some(bytes_per_row),
                        rows_per_image: Some(height),
                    },
                },
                wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
            );
            self.queue.submit(Some(encoder.finish()));

            let slice = readback.slice(..);
            let (tx, rx) = std::sync::mpsc::channel();
            slice.map_async(wgpu::MapMode::Read, move |result| {
                let _ = tx.send(result);
            });
            self.device.poll(wgpu::Maintain::Wait);
            rx.recv()
                .map_err(|_| "Readback callback dropped".to_string())?
                .map_err(|e| format!("Map error: {e}"))?;

            let data = slice.get_mapped_range();
            let row_bytes = (width * 4) as usize;
            let padded = bytes_per_row as usize;
            let mut pixels = vec![0u8; row_bytes * height as usize];
            for (row, chunk) in pixels.chunks_mut(row_bytes).enumerate() {
                let start = row * padded;
                chunk.copy_from_slice(&data[start..start + row_bytes]);
            }
            drop(data);
            readback.unmap();
            Ok(pixels)
        }
    }

    #[repr(C)]
    #[derive(Clone, Copy, Pod, Zeroable)]
    struct Params {
        resolution: [f32; 2],
        offset: [f32; 2],
        zoom: f32,
        max_iter: u32,
        _pad: [f32; 2],
    }

    fn align_to(value: u32, alignment: u32) -> u32 {
        ((value + alignment - 1) / alignment) * alignment
    }
}
