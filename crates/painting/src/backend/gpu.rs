//! wgpu compute backend.
//!
//! Height images are `R32Float` textures usable both as a sampled source
//! and as a write-only storage target. Every operation that touches the
//! GPU submits its own command buffer and waits for the device, so a call
//! returning `Ok` means the work has completed.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError, mpsc};

use tracing::{debug, info, warn};
use wgpu::util::DeviceExt;

use super::{ComputeBackend, KernelBindings};
use crate::error::PaintError;
use crate::height_field::HeightField;
use crate::types::GpuSegment;

/// WGSL source of the compositing kernel
pub const PATH_BRUSH_SHADER: &str = include_str!("../../shaders/path_brush.wgsl");

const HEIGHT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;

/// Segment storage buffer
pub struct GpuBuffer {
    buffer: wgpu::Buffer,
    count: u32,
}

impl GpuBuffer {
    pub fn count(&self) -> u32 {
        self.count
    }
}

/// Single-channel float texture
pub struct GpuImage {
    texture: wgpu::Texture,
    width: u32,
    height: u32,
}

impl GpuImage {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }
}

/// Compiled compute pipeline and its bind group layout
#[derive(Clone)]
pub struct GpuKernel {
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
    workgroup: [u32; 3],
}

/// Backend that runs the kernel on a wgpu device.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_name: String,
    shader_source: String,
    kernels: Mutex<HashMap<String, GpuKernel>>,
}

impl WgpuBackend {
    /// Request a high-performance adapter and a device, blocking until ready
    pub fn new() -> Result<Self, PaintError> {
        pollster::block_on(Self::new_async())
    }

    pub async fn new_async() -> Result<Self, PaintError> {
        let instance = wgpu::Instance::default();
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: None,
            })
            .await
            .map_err(|e| PaintError::Backend(format!("No compatible GPU adapter: {}", e)))?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("terrain_paint_device"),
                ..Default::default()
            })
            .await
            .map_err(|e| PaintError::Backend(format!("Failed to create device: {}", e)))?;

        let name = adapter.get_info().name;
        info!("WgpuBackend: using adapter '{}'", name);
        Ok(Self::from_device(device, queue, name))
    }

    /// Share an existing device, e.g. the renderer's
    pub fn from_device(device: wgpu::Device, queue: wgpu::Queue, adapter_name: impl Into<String>) -> Self {
        Self {
            device,
            queue,
            adapter_name: adapter_name.into(),
            shader_source: PATH_BRUSH_SHADER.to_string(),
            kernels: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the kernel source. Previously loaded kernels are discarded.
    pub fn with_shader_source(mut self, source: impl Into<String>) -> Self {
        self.shader_source = source.into();
        self.kernels().clear();
        self
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    fn kernels(&self) -> MutexGuard<'_, HashMap<String, GpuKernel>> {
        self.kernels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait(&self) -> Result<(), PaintError> {
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map(|_| ())
            .map_err(|e| PaintError::Backend(format!("Device poll failed: {}", e)))
    }

    fn compile(&self, entry_point: &str) -> Result<GpuKernel, PaintError> {
        let unavailable = || PaintError::KernelUnavailable(entry_point.to_string());
        let workgroup = declared_workgroup_size(&self.shader_source, entry_point).ok_or_else(unavailable)?;

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("path_brush_shader"),
            source: wgpu::ShaderSource::Wgsl(self.shader_source.as_str().into()),
        });

        let sampled = wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        };
        let entry = |binding, ty| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty,
            count: None,
        };

        let layout = self.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("path_brush_bind_group_layout"),
            entries: &[
                entry(
                    0,
                    wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                ),
                entry(
                    1,
                    wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                ),
                entry(2, sampled),
                entry(
                    3,
                    wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: HEIGHT_FORMAT,
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                ),
                entry(4, sampled),
            ],
        });

        let pipeline_layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("path_brush_pipeline_layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipeline = self.device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("path_brush_pipeline"),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: Some(entry_point),
            compilation_options: Default::default(),
            cache: None,
        });

        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            warn!("WgpuBackend: kernel '{}' failed to compile: {}", entry_point, err);
            return Err(unavailable());
        }

        debug!("WgpuBackend: compiled '{}' with workgroup {:?}", entry_point, workgroup);
        Ok(GpuKernel {
            pipeline,
            layout,
            workgroup,
        })
    }

    fn create_texture(&self, label: &str, width: u32, height: u32, usage: wgpu::TextureUsages) -> Result<GpuImage, PaintError> {
        let max = self.device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(PaintError::ResourceAllocation(format!(
                "{}x{} {} (device limit {})",
                width, height, label, max
            )));
        }

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: HEIGHT_FORMAT,
            usage,
            view_formats: &[],
        });
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(PaintError::ResourceAllocation(format!("{} texture: {}", label, err)));
        }

        Ok(GpuImage {
            texture,
            width,
            height,
        })
    }

    fn write_texels(&self, image: &GpuImage, texels: &[f32]) {
        self.queue.write_texture(
            image.texture.as_image_copy(),
            bytemuck::cast_slice(texels),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(image.width * 4),
                rows_per_image: Some(image.height),
            },
            image.extent(),
        );
    }
}

/// Read the `@workgroup_size` attribute of `entry_point` from WGSL source
pub fn declared_workgroup_size(source: &str, entry_point: &str) -> Option<[u32; 3]> {
    const ATTRIBUTE: &str = "@workgroup_size(";

    let fn_pos = source.find(&format!("fn {}(", entry_point))?;
    let args_start = source[..fn_pos].rfind(ATTRIBUTE)? + ATTRIBUTE.len();
    let args_end = args_start + source[args_start..].find(')')?;

    let mut size = [1u32; 3];
    for (slot, arg) in size.iter_mut().zip(source[args_start..args_end].split(',')) {
        let arg = arg.trim();
        if arg.is_empty() {
            continue;
        }
        *slot = arg.trim_end_matches('u').parse().ok()?;
    }
    Some(size)
}

impl ComputeBackend for WgpuBackend {
    type Buffer = GpuBuffer;
    type Image = GpuImage;
    type Kernel = GpuKernel;

    fn name(&self) -> &str {
        "wgpu"
    }

    fn load_kernel(&self, entry_point: &str) -> Result<GpuKernel, PaintError> {
        if let Some(kernel) = self.kernels().get(entry_point) {
            return Ok(kernel.clone());
        }
        let kernel = self.compile(entry_point)?;
        self.kernels().insert(entry_point.to_string(), kernel.clone());
        Ok(kernel)
    }

    fn workgroup_size(&self, kernel: &GpuKernel) -> [u32; 3] {
        kernel.workgroup
    }

    fn create_segment_buffer(&self, segments: &[GpuSegment]) -> Result<GpuBuffer, PaintError> {
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("path_brush_segments"),
            contents: bytemuck::cast_slice(segments),
            usage: wgpu::BufferUsages::STORAGE,
        });
        Ok(GpuBuffer {
            buffer,
            count: segments.len() as u32,
        })
    }

    fn create_height_image(&self, resolution: u32) -> Result<GpuImage, PaintError> {
        self.create_texture(
            "terrain_height_image",
            resolution,
            resolution,
            wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::COPY_SRC
                | wgpu::TextureUsages::COPY_DST,
        )
    }

    fn create_curve_image(&self, samples: &[f32]) -> Result<GpuImage, PaintError> {
        let image = self.create_texture(
            "bank_curve_lookup",
            samples.len() as u32,
            1,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        )?;
        self.write_texels(&image, samples);
        Ok(image)
    }

    fn upload_heights(&self, image: &mut GpuImage, heights: &HeightField) -> Result<(), PaintError> {
        if heights.width() != image.width || heights.height() != image.height {
            return Err(PaintError::ResolutionMismatch {
                expected: image.width,
                actual: heights.width(),
            });
        }
        self.write_texels(image, heights.as_slice());
        Ok(())
    }

    fn copy_image(&self, source: &GpuImage, target: &mut GpuImage) -> Result<(), PaintError> {
        if source.width != target.width || source.height != target.height {
            return Err(PaintError::ResolutionMismatch {
                expected: target.width,
                actual: source.width,
            });
        }
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("height_copy_encoder"),
        });
        encoder.copy_texture_to_texture(
            source.texture.as_image_copy(),
            target.texture.as_image_copy(),
            source.extent(),
        );
        self.queue.submit(Some(encoder.finish()));
        self.wait()
    }

    fn download_heights(&self, image: &GpuImage) -> Result<HeightField, PaintError> {
        let row_bytes = image.width * 4;
        let padded_row = row_bytes.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT) * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("height_readback"),
            size: padded_row as u64 * image.height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("height_readback_encoder"),
        });
        encoder.copy_texture_to_buffer(
            image.texture.as_image_copy(),
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(image.height),
                },
            },
            image.extent(),
        );
        self.queue.submit(Some(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.wait()?;
        rx.recv()
            .map_err(|_| PaintError::Backend("Readback channel closed".into()))?
            .map_err(|e| PaintError::Backend(format!("Readback failed: {}", e)))?;

        let mut texels = Vec::with_capacity(image.width as usize * image.height as usize);
        {
            let mapped = slice.get_mapped_range();
            for row in mapped.chunks(padded_row as usize).take(image.height as usize) {
                texels.extend(
                    row[..row_bytes as usize]
                        .chunks_exact(4)
                        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]])),
                );
            }
        }
        staging.unmap();

        HeightField::from_vec(image.width, image.height, texels)
            .ok_or_else(|| PaintError::Backend("Readback size does not match the image".into()))
    }

    fn dispatch(
        &self,
        kernel: &GpuKernel,
        bindings: KernelBindings<'_, Self>,
        groups: [u32; 3],
    ) -> Result<(), PaintError> {
        let KernelBindings {
            mut uniforms,
            segments,
            source,
            target,
            bank_curve,
        } = bindings;

        let source = source.ok_or_else(|| PaintError::Backend("source image not bound".into()))?;
        let target = target.ok_or_else(|| PaintError::Backend("target image not bound".into()))?;
        for size in [source.width, source.height, target.width, target.height] {
            if size != uniforms.resolution {
                return Err(PaintError::ResolutionMismatch {
                    expected: uniforms.resolution,
                    actual: size,
                });
            }
        }

        // Bindings must always be valid; absent inputs get inert placeholders
        let placeholder_segments;
        let segment_buffer = match segments {
            Some(buffer) => &buffer.buffer,
            None => {
                uniforms.segment_count = 0;
                placeholder_segments = self.create_segment_buffer(&[GpuSegment::default()])?;
                &placeholder_segments.buffer
            }
        };
        let placeholder_curve;
        let curve = match bank_curve {
            Some(image) => image,
            None => {
                uniforms.bank_width = 0.0;
                placeholder_curve = self.create_curve_image(&[0.0])?;
                &placeholder_curve
            }
        };

        let uniform_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("path_brush_uniforms"),
            contents: bytemuck::bytes_of(&uniforms),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let source_view = source.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let target_view = target.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let curve_view = curve.texture.create_view(&wgpu::TextureViewDescriptor::default());

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("path_brush_bind_group"),
            layout: &kernel.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: segment_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&source_view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&target_view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(&curve_view),
                },
            ],
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("path_brush_encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("path_brush_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&kernel.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(groups[0], groups[1], groups[2]);
        }
        self.queue.submit(Some(encoder.finish()));

        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(PaintError::Backend(format!("Dispatch rejected: {}", err)));
        }

        debug!(
            "WgpuBackend: dispatched {:?} groups ({} segments)",
            groups, uniforms.segment_count
        );
        self.wait()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_workgroup_size() {
        assert_eq!(declared_workgroup_size(PATH_BRUSH_SHADER, "cs_main"), Some([8, 8, 1]));
        assert_eq!(declared_workgroup_size(PATH_BRUSH_SHADER, "cs_missing"), None);
    }

    #[test]
    fn test_workgroup_size_defaults_missing_dimensions() {
        let source = "@compute @workgroup_size(64u)\nfn main_1d() {}";
        assert_eq!(declared_workgroup_size(source, "main_1d"), Some([64, 1, 1]));
    }

    #[test]
    fn test_shader_mirrors_uniform_layout() {
        for field in ["resolution: u32", "segment_count: u32", "paint_mode: u32", "bank_width: f32"] {
            assert!(PATH_BRUSH_SHADER.contains(field), "shader is missing `{}`", field);
        }
    }
}
