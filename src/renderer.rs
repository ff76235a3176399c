//! wgpu Renderer
//!
//! Draws one frame as a single composite pass: the working image, the mask
//! at the configured opacity and the preview overlay, all stretched over the
//! zoomed display rectangle. Layers live in sRGB textures and are uploaded
//! from CPU buffers only when they change.

use anyhow::{anyhow, Context};
use image::RgbaImage;
use wgpu::util::DeviceExt;

use crate::debug;
use crate::raster::Surface;
use crate::viewport::ScreenRect;

const LAYER_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// Uniforms for the composite shader
#[repr(C, align(16))] // 16-byte alignment for WebGL
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct CompositeUniforms {
    /// Display rectangle in NDC: left, top, right, bottom
    rect: [f32; 4],
    mask_opacity: f32,
    _padding: [f32; 3],
}

/// One sampled layer
struct LayerTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl LayerTexture {
    fn new(device: &wgpu::Device, size: (u32, u32), label: &str) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size.0.max(1),
                height: size.1.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: LAYER_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }

    fn size(&self) -> (u32, u32) {
        (self.texture.width(), self.texture.height())
    }

    fn write(&self, queue: &wgpu::Queue, rgba: &[u8]) {
        let (width, height) = self.size();
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }
}

/// Renderer wraps the wgpu device, queue, and surface
pub struct Renderer {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: winit::dpi::PhysicalSize<u32>,
    scale_factor: f32,
    max_texture_dimension: u32,

    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
    uniform_buffer: wgpu::Buffer,
    sampler: wgpu::Sampler,

    image: LayerTexture,
    mask: LayerTexture,
    overlay: LayerTexture,
}

impl Renderer {
    /// Create a renderer drawing into `window`
    pub async fn new(
        window: impl Into<wgpu::SurfaceTarget<'static>>,
        size: winit::dpi::PhysicalSize<u32>,
    ) -> anyhow::Result<Self> {
        log::info!("Renderer::new() starting...");
        debug::update_status("Creating wgpu instance...");

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all() & !wgpu::Backends::BROWSER_WEBGPU,
            ..Default::default()
        });

        debug::update_status("Creating surface...");
        let surface = instance.create_surface(window).context("failed to create surface")?;

        debug::update_status("Requesting adapter...");
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no suitable graphics adapter")?;

        let adapter_info = adapter.get_info();
        log::info!("Adapter acquired: {:?} (backend: {:?})", adapter_info.name, adapter_info.backend);
        debug::update_status(&format!("Using: {:?}", adapter_info.backend));

        let adapter_limits = adapter.limits();
        let max_texture_dimension = adapter_limits.max_texture_dimension_2d;
        log::info!("Max texture dimension: {}", max_texture_dimension);

        // Start from WebGL2 limits in the browser, then raise texture sizes to
        // what the adapter really supports so large images still fit
        let mut device_limits = if cfg!(target_arch = "wasm32") {
            wgpu::Limits::downlevel_webgl2_defaults()
        } else {
            wgpu::Limits::default()
        };
        device_limits.max_texture_dimension_2d = adapter_limits.max_texture_dimension_2d;
        device_limits.max_texture_dimension_1d = adapter_limits.max_texture_dimension_1d;

        debug::update_status("Creating device...");
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Image Studio Device"),
                required_features: wgpu::Features::empty(),
                required_limits: device_limits,
                memory_hints: Default::default(),
                trace: Default::default(),
                experimental_features: Default::default(),
            })
            .await
            .context("failed to create device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| anyhow!("surface reports no texture formats"))?;
        let present_mode = surface_caps
            .present_modes
            .first()
            .copied()
            .unwrap_or(wgpu::PresentMode::Fifo);
        log::info!("Selected surface format: {:?}", surface_format);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.min(max_texture_dimension),
            height: size.height.min(max_texture_dimension),
            present_mode,
            alpha_mode: wgpu::CompositeAlphaMode::Opaque,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        // Zero-sized until the first resize on some platforms
        if config.width > 0 && config.height > 0 {
            surface.configure(&device, &config);
        } else {
            log::warn!("Skipping surface configuration (invalid size: {}x{})", config.width, config.height);
        }

        let (pipeline, bind_group_layout) = Self::create_composite_pipeline(&device, surface_format);
        debug::update_status("Composite pipeline created...");

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Composite Uniform Buffer"),
            contents: bytemuck::cast_slice(&[CompositeUniforms {
                rect: [0.0; 4],
                mask_opacity: 0.0,
                _padding: [0.0; 3],
            }]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Layer Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let image = LayerTexture::new(&device, (1, 1), "Image Texture");
        let mask = LayerTexture::new(&device, (1, 1), "Mask Texture");
        let overlay = LayerTexture::new(&device, (1, 1), "Overlay Texture");
        let bind_group = Self::create_bind_group(
            &device,
            &bind_group_layout,
            [&image, &mask, &overlay],
            &sampler,
            &uniform_buffer,
        );

        log::info!("Renderer initialized: {}x{}, surface: {:?}", size.width, size.height, surface_format);
        debug::update_status("Renderer ready");

        Ok(Self {
            surface,
            device,
            queue,
            config,
            size,
            scale_factor: 1.0,
            max_texture_dimension,
            pipeline,
            bind_group_layout,
            bind_group,
            uniform_buffer,
            sampler,
            image,
            mask,
            overlay,
        })
    }

    fn create_composite_pipeline(
        device: &wgpu::Device,
        target_format: wgpu::TextureFormat,
    ) -> (wgpu::RenderPipeline, wgpu::BindGroupLayout) {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Composite Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/composite.wgsl").into()),
        });

        let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                multisampled: false,
                view_dimension: wgpu::TextureViewDimension::D2,
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
            },
            count: None,
        };
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Composite Bind Group Layout"),
            entries: &[
                texture_entry(0),
                texture_entry(1),
                texture_entry(2),
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 4,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Composite Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Composite Pipeline"),
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
                    format: target_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        (pipeline, bind_group_layout)
    }

    fn create_bind_group(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        layers: [&LayerTexture; 3],
        sampler: &wgpu::Sampler,
        uniforms: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Composite Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&layers[0].view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&layers[1].view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&layers[2].view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: uniforms.as_entire_binding(),
                },
            ],
        })
    }

    fn rebuild_bind_group(&mut self) {
        self.bind_group = Self::create_bind_group(
            &self.device,
            &self.bind_group_layout,
            [&self.image, &self.mask, &self.overlay],
            &self.sampler,
            &self.uniform_buffer,
        );
    }

    /// Resize the surface
    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.size = new_size;
        self.config.width = new_size.width.min(self.max_texture_dimension);
        self.config.height = new_size.height.min(self.max_texture_dimension);
        self.surface.configure(&self.device, &self.config);
        log::debug!("Surface resized to {}x{}", self.config.width, self.config.height);
    }

    /// Replace the working image layer; `None` shows an empty canvas
    pub fn set_image(&mut self, pixels: Option<&RgbaImage>) {
        let Some(pixels) = pixels else {
            self.image = LayerTexture::new(&self.device, (1, 1), "Image Texture");
            self.image.write(&self.queue, &[0, 0, 0, 0]);
            self.rebuild_bind_group();
            return;
        };

        let max = self.max_texture_dimension;
        let scaled;
        let pixels = if pixels.width() > max || pixels.height() > max {
            log::warn!(
                "Image {}x{} exceeds max texture size {}, downscaling for display",
                pixels.width(),
                pixels.height(),
                max
            );
            scaled = image::imageops::thumbnail(pixels, max.min(pixels.width()), max.min(pixels.height()));
            &scaled
        } else {
            pixels
        };

        if self.image.size() != pixels.dimensions() {
            self.image = LayerTexture::new(&self.device, pixels.dimensions(), "Image Texture");
            self.rebuild_bind_group();
        }
        self.image.write(&self.queue, pixels.as_raw());
        log::debug!("Image layer uploaded: {}x{}", pixels.width(), pixels.height());
    }

    pub fn upload_mask(&mut self, mask: &Surface) {
        if self.mask.size() != mask.size() {
            self.mask = LayerTexture::new(&self.device, mask.size(), "Mask Texture");
            self.rebuild_bind_group();
        }
        self.mask.write(&self.queue, mask.as_raw());
    }

    pub fn upload_overlay(&mut self, overlay: &Surface) {
        if self.overlay.size() != overlay.size() {
            self.overlay = LayerTexture::new(&self.device, overlay.size(), "Overlay Texture");
            self.rebuild_bind_group();
        }
        self.overlay.write(&self.queue, overlay.as_raw());
    }

    /// Draw a frame. `rect` is the display rectangle in logical pixels; with
    /// no rectangle only the backdrop is drawn.
    pub fn render(&mut self, rect: Option<ScreenRect>, mask_opacity: f32) {
        if self.config.width == 0 || self.config.height == 0 {
            log::warn!("Invalid surface state, skipping render");
            return;
        }

        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                return;
            }
            Err(e) => {
                log::error!("Failed to get surface texture: {:?}", e);
                return;
            }
        };
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        if let Some(rect) = rect {
            let [width, height] = logical_extent(self.config.width, self.config.height, self.scale_factor);
            let uniforms = CompositeUniforms {
                rect: ndc_rect(&rect, width, height),
                mask_opacity,
                _padding: [0.0; 3],
            };
            self.queue
                .write_buffer(&self.uniform_buffer, 0, bytemuck::cast_slice(&[uniforms]));
        }

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Composite Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.008,
                            g: 0.008,
                            b: 0.01,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            if rect.is_some() {
                render_pass.set_pipeline(&self.pipeline);
                render_pass.set_bind_group(0, &self.bind_group, &[]);
                render_pass.draw(0..6, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        debug::increment_frame_count();
    }

    pub fn size(&self) -> winit::dpi::PhysicalSize<u32> {
        self.size
    }

    /// Physical pixels per logical pixel; canvas rects arrive in logical pixels
    pub fn set_scale_factor(&mut self, scale_factor: f64) {
        if !(scale_factor.is_finite() && scale_factor > 0.0) {
            log::warn!("Ignoring scale factor {}", scale_factor);
            return;
        }
        self.scale_factor = scale_factor as f32;
    }
}

/// Surface size in logical pixels
fn logical_extent(width: u32, height: u32, scale_factor: f32) -> [f32; 2] {
    [width as f32 / scale_factor, height as f32 / scale_factor]
}

/// Rectangle in a `width` x `height` surface to NDC `[left, top, right, bottom]`
fn ndc_rect(rect: &ScreenRect, width: f32, height: f32) -> [f32; 4] {
    let x = |px: f32| px / width * 2.0 - 1.0;
    let y = |py: f32| 1.0 - py / height * 2.0;
    [
        x(rect.left),
        y(rect.top),
        x(rect.left + rect.width),
        y(rect.top + rect.height),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_surface_rect_covers_clip_space() {
        let rect = ScreenRect::new(0.0, 0.0, 800.0, 600.0);
        assert_eq!(ndc_rect(&rect, 800.0, 600.0), [-1.0, 1.0, 1.0, -1.0]);
    }

    #[test]
    fn centred_rect_is_symmetric() {
        let rect = ScreenRect::centered_in([800.0, 600.0], 400.0, 300.0);
        assert_eq!(ndc_rect(&rect, 800.0, 600.0), [-0.5, 0.5, 0.5, -0.5]);
    }

    #[test]
    fn logical_rect_fills_a_hidpi_surface() {
        // 800x600 physical pixels at 2x is a 400x300 logical surface
        let [width, height] = logical_extent(800, 600, 2.0);
        assert_eq!([width, height], [400.0, 300.0]);
        let rect = ScreenRect::new(0.0, 0.0, 400.0, 300.0);
        assert_eq!(ndc_rect(&rect, width, height), [-1.0, 1.0, 1.0, -1.0]);
        let quarter = ScreenRect::new(0.0, 0.0, 200.0, 150.0);
        assert_eq!(ndc_rect(&quarter, width, height), [-1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn uniforms_are_sixteen_byte_aligned() {
        assert_eq!(std::mem::size_of::<CompositeUniforms>() % 16, 0);
    }
}
