//! Shader renderer family
//!
//! Renders a full-screen triangle with the effect's fragment stage into an
//! offscreen texture on a headless GPU device, then copies the result back
//! into the surface pixels.

use crate::controls::{ClassKey, ControlBridge};

use super::surface::Surface;
use super::traits::{AcquireFuture, FrameTime, RenderBackend, RendererAcquisitionError, RendererFamily, ShaderScript};

const PRELUDE: &str = include_str!("../shaders/fullscreen.wgsl");
const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Number of parameter floats available to a shader
pub const PARAM_SLOTS: usize = 28;

/// Uniform block shared with the WGSL prelude
///
/// Timing and resolution come first, followed by 28 parameter slots
/// (bools as 0/1, colors as consecutive floats).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ShaderUniforms {
    /// Seconds since the effect started rendering
    pub time: f32,
    pub delta_time: f32,
    pub width: f32,
    pub height: f32,
    pub params: [f32; PARAM_SLOTS],
}

impl Default for ShaderUniforms {
    fn default() -> Self {
        Self::new(FrameTime::default(), 0, 0)
    }
}

impl ShaderUniforms {
    pub fn new(time: FrameTime, width: u32, height: u32) -> Self {
        Self {
            time: time.elapsed,
            delta_time: time.delta,
            width: width as f32,
            height: height as f32,
            params: [0.0; PARAM_SLOTS],
        }
    }

    /// Set a float parameter at the given index
    pub fn set_float(&mut self, index: usize, value: f32) {
        if index < self.params.len() {
            self.params[index] = value;
        }
    }

    /// Set a bool parameter at the given index (as 0.0 or 1.0)
    pub fn set_bool(&mut self, index: usize, value: bool) {
        self.set_float(index, if value { 1.0 } else { 0.0 });
    }

    /// Set a vec3 parameter starting at the given index
    pub fn set_vec3(&mut self, index: usize, value: [f32; 3]) {
        if index + 2 < self.params.len() {
            self.params[index..index + 3].copy_from_slice(&value);
        }
    }

    /// Set a vec4 parameter starting at the given index
    pub fn set_vec4(&mut self, index: usize, value: [f32; 4]) {
        if index + 3 < self.params.len() {
            self.params[index..index + 4].copy_from_slice(&value);
        }
    }
}

struct GpuState {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    uniform_buffer: wgpu::Buffer,
    target: wgpu::Texture,
    target_view: wgpu::TextureView,
    readback: wgpu::Buffer,
    width: u32,
    height: u32,
    padded_bytes_per_row: u32,
}

impl GpuState {
    async fn new(fragment_source: &str, width: u32, height: u32) -> Result<Self, RendererAcquisitionError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(RendererAcquisitionError::NoAdapter)?;

        log::info!("Shader lightscript using GPU: {}", adapter.get_info().name);
        log::info!("Backend: {:?}", adapter.get_info().backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Lightscript Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: adapter.limits(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .map_err(|e| RendererAcquisitionError::Device(e.to_string()))?;

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let source = format!("{}\n{}", PRELUDE, fragment_source);
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Lightscript Shader"),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Lightscript Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Lightscript Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Lightscript Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: TARGET_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        if let Some(error) = device.pop_error_scope().await {
            return Err(RendererAcquisitionError::Setup(error.to_string()));
        }

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Lightscript Uniforms"),
            size: std::mem::size_of::<ShaderUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Lightscript Bind Group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let target = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Lightscript Target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let target_view = target.create_view(&wgpu::TextureViewDescriptor::default());

        let padded_bytes_per_row = padded_row_bytes(width);
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Lightscript Readback"),
            size: (padded_bytes_per_row * height) as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        Ok(Self {
            device,
            queue,
            pipeline,
            bind_group,
            uniform_buffer,
            target,
            target_view,
            readback,
            width,
            height,
            padded_bytes_per_row,
        })
    }

    /// Render one frame and return tightly packed RGBA rows
    fn render(&self, uniforms: &ShaderUniforms) -> Option<Vec<u8>> {
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Lightscript Frame Encoder"),
        });

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Lightscript Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.target_view,
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
            pass.set_bind_group(0, &self.bind_group, &[]);
            pass.draw(0..3, 0..1);
        }

        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.target,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &self.readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(self.padded_bytes_per_row),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );

        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = self.readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);

        rx.recv().ok()?.ok()?;
        let pixels = {
            let data = slice.get_mapped_range();
            unpad_rows(&data, self.width, self.height, self.padded_bytes_per_row)
        };
        self.readback.unmap();
        Some(pixels)
    }
}

fn padded_row_bytes(width: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    (width * 4).div_ceil(align) * align
}

fn unpad_rows(data: &[u8], width: u32, height: u32, padded_bytes_per_row: u32) -> Vec<u8> {
    let row = (width * 4) as usize;
    let mut pixels = Vec::with_capacity(row * height as usize);
    for y in 0..height as usize {
        let start = y * padded_bytes_per_row as usize;
        if let Some(src) = data.get(start..start + row) {
            pixels.extend_from_slice(src);
        }
    }
    pixels
}

/// Drives a [`ShaderScript`] through the lifecycle engine
pub struct ShaderBackend<S: ShaderScript> {
    script: S,
    gpu: Option<GpuState>,
}

impl<S: ShaderScript> ShaderBackend<S> {
    pub fn new(script: S) -> Self {
        Self { script, gpu: None }
    }

    pub fn script(&self) -> &S {
        &self.script
    }
}

impl<S: ShaderScript> RenderBackend for ShaderBackend<S> {
    fn family(&self) -> RendererFamily {
        RendererFamily::Shader
    }

    fn effect_class(&self) -> ClassKey {
        ClassKey::of::<S>()
    }

    fn acquire<'a>(&'a mut self, surface: &'a mut Surface) -> AcquireFuture<'a> {
        Box::pin(async move {
            let gpu = GpuState::new(S::fragment_source(), surface.width(), surface.height()).await?;
            self.gpu = Some(gpu);
            Ok::<(), RendererAcquisitionError>(())
        })
    }

    fn draw_frame(&mut self, surface: &mut Surface, time: FrameTime) {
        let Some(gpu) = &self.gpu else {
            return;
        };
        if (gpu.width, gpu.height) != (surface.width(), surface.height()) {
            log::warn!(
                "Shader target is {}x{} but surface is {}x{}, skipping frame",
                gpu.width,
                gpu.height,
                surface.width(),
                surface.height()
            );
            return;
        }

        let mut uniforms = ShaderUniforms::new(time, gpu.width, gpu.height);
        self.script.write_uniforms(&mut uniforms);

        match gpu.render(&uniforms) {
            Some(pixels) => {
                surface.write_rgba(&pixels);
            }
            None => log::warn!("Shader frame readback failed"),
        }
    }

    fn apply_controls(&mut self, bridge: &ControlBridge<'_>) {
        let controls = S::read_controls(bridge);
        self.script.apply_controls(controls);
    }

    fn release(&mut self) {
        if self.gpu.take().is_some() {
            log::debug!("Shader resources released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_layout() {
        assert_eq!(std::mem::size_of::<ShaderUniforms>(), 128);
        let uniforms = ShaderUniforms::new(FrameTime { elapsed: 2.0, delta: 0.5, frame: 4 }, 320, 200);
        let floats: &[f32] = bytemuck::cast_slice(bytemuck::bytes_of(&uniforms));
        assert_eq!(&floats[..4], &[2.0, 0.5, 320.0, 200.0]);
    }

    #[test]
    fn test_uniform_setters_respect_bounds() {
        let mut uniforms = ShaderUniforms::default();
        uniforms.set_vec3(0, [0.1, 0.2, 0.3]);
        uniforms.set_bool(3, true);
        uniforms.set_vec4(24, [1.0, 2.0, 3.0, 4.0]);
        uniforms.set_vec4(25, [9.0; 4]);
        uniforms.set_float(PARAM_SLOTS, 9.0);

        assert_eq!(&uniforms.params[..4], &[0.1, 0.2, 0.3, 1.0]);
        assert_eq!(&uniforms.params[24..], &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_row_padding() {
        assert_eq!(padded_row_bytes(64), 256);
        assert_eq!(padded_row_bytes(65), 512);

        let mut data = vec![0u8; 512];
        data[..4].copy_from_slice(&[1, 2, 3, 4]);
        data[256..260].copy_from_slice(&[5, 6, 7, 8]);
        let pixels = unpad_rows(&data, 1, 2, 256);
        assert_eq!(pixels, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }
}
