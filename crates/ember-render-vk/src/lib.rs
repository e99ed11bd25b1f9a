// SPDX-License-Identifier: CEPL-1.0
use anyhow::Result;
use tracing::{debug, error, info, warn};

use ember_render::{Frame, RenderBackend, RenderSize};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle};

use ash::ext::debug_utils;
use ash::khr::{surface, swapchain};
use ash::{vk, Entry};
use std::ffi::CStr;
use std::os::raw::c_char;
use thiserror::Error;

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";
const REQUIRED_DEVICE_EXTENSIONS: [&CStr; 1] = [swapchain::NAME];

/// One variant per fallible bootstrap step. The composition point (the app)
/// decides what a failure means; nothing in here exits the process.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("window or display handle unavailable: {0}")]
    WindowHandle(#[from] raw_window_handle::HandleError),
    #[error("vulkan driver query failed: {0}")]
    Driver(#[from] vk::Result),
    #[error("failed to create a vulkan instance: {0}")]
    InstanceCreation(vk::Result),
    #[error("failed to create a window surface: {0}")]
    SurfaceCreation(vk::Result),
    #[error("no GPU with vulkan support")]
    NoPhysicalDevices,
    #[error("no GPU satisfies the required device extensions")]
    NoSuitableDevice,
    #[error("no queue family supports graphics commands")]
    MissingGraphicsQueue,
    #[error("no queue family can present to the surface")]
    MissingPresentQueue,
    #[error("failed to create a logical device: {0}")]
    DeviceCreation(vk::Result),
    #[error("surface reports no color formats")]
    NoSurfaceFormats,
    #[error("surface reports no present modes")]
    NoPresentModes,
    #[error("failed to create a swapchain: {0}")]
    SwapchainCreation(vk::Result),
    #[error("failed to create a swapchain image view: {0}")]
    ImageViewCreation(vk::Result),
}

// ---------------------------------------------------------------------------
// Capability negotiation (instance extensions + layers)

/// Final extension and layer lists to request from the driver. The windowing
/// layer's extensions are kept in order; debug instrumentation appends the
/// debug-utils extension and exactly one validation layer.
fn negotiate_instance_extensions(
    windowing: &[*const c_char],
    validation: bool,
) -> (Vec<*const c_char>, Vec<*const c_char>) {
    let mut extensions = windowing.to_vec();
    let mut layers = Vec::new();
    if validation {
        extensions.push(debug_utils::NAME.as_ptr());
        layers.push(VALIDATION_LAYER.as_ptr());
    }
    (extensions, layers)
}

fn has_extension(available: &[vk::ExtensionProperties], name: &CStr) -> bool {
    available
        .iter()
        .any(|e| unsafe { CStr::from_ptr(e.extension_name.as_ptr()) } == name)
}

// Advisory only: a missing extension is logged, then instance creation is
// attempted with the full list anyway and its result is what counts.
fn log_extension_support(requested: &[*const c_char], available: &[vk::ExtensionProperties]) {
    for &ptr in requested {
        let name = unsafe { CStr::from_ptr(ptr) };
        if has_extension(available, name) {
            debug!("{} (enabled)", name.to_string_lossy());
        } else {
            warn!("{} (not found)", name.to_string_lossy());
        }
    }
}

unsafe fn create_instance(
    entry: &Entry,
    display_raw: RawDisplayHandle,
    validation: bool,
) -> Result<ash::Instance, BootstrapError> {
    let app_name = c"ember";
    let app_info = vk::ApplicationInfo {
        s_type: vk::StructureType::APPLICATION_INFO,
        p_application_name: app_name.as_ptr(),
        application_version: vk::make_api_version(0, 1, 0, 0),
        p_engine_name: app_name.as_ptr(),
        engine_version: vk::make_api_version(0, 1, 0, 0),
        api_version: vk::API_VERSION_1_0,
        ..Default::default()
    };

    let windowing = ash_window::enumerate_required_extensions(display_raw)?;
    let (extensions, layers) = negotiate_instance_extensions(windowing, validation);

    match entry.enumerate_instance_extension_properties(None) {
        Ok(available) => log_extension_support(&extensions, &available),
        Err(e) => warn!("could not enumerate instance extensions: {e}"),
    }

    let create_info = vk::InstanceCreateInfo {
        s_type: vk::StructureType::INSTANCE_CREATE_INFO,
        p_application_info: &app_info,
        enabled_extension_count: extensions.len() as u32,
        pp_enabled_extension_names: extensions.as_ptr(),
        enabled_layer_count: layers.len() as u32,
        pp_enabled_layer_names: layers.as_ptr(),
        ..Default::default()
    };

    entry
        .create_instance(&create_info, None)
        .map_err(BootstrapError::InstanceCreation)
}

// ---------------------------------------------------------------------------
// Debug messenger

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    if data.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*data).p_message).to_string_lossy();
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        error!("[vk] {message}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        warn!("[vk] {message}");
    } else {
        debug!("[vk] {message}");
    }
    vk::FALSE
}

struct DebugMessenger {
    loader: debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
}

impl Drop for DebugMessenger {
    fn drop(&mut self) {
        unsafe {
            self.loader.destroy_debug_utils_messenger(self.messenger, None);
        }
    }
}

// Failing to attach the messenger is not fatal; the instance works without it.
unsafe fn create_debug_messenger(
    entry: &Entry,
    instance: &ash::Instance,
) -> Option<DebugMessenger> {
    let loader = debug_utils::Instance::new(entry, instance);
    let create_info = vk::DebugUtilsMessengerCreateInfoEXT {
        s_type: vk::StructureType::DEBUG_UTILS_MESSENGER_CREATE_INFO_EXT,
        message_severity: vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
            | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        message_type: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
            | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
            | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        pfn_user_callback: Some(debug_callback),
        ..Default::default()
    };
    match loader.create_debug_utils_messenger(&create_info, None) {
        Ok(messenger) => Some(DebugMessenger { loader, messenger }),
        Err(e) => {
            warn!("failed to create a debug messenger: {e}");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Physical device selection

/// A candidate that lacks any required device extension is disqualified with
/// a score of 0. Otherwise the score is 1 + maxImageDimension2D, plus 1000
/// for discrete GPUs so they outrank integrated ones of similar capability.
fn device_score(
    props: &vk::PhysicalDeviceProperties,
    available: &[vk::ExtensionProperties],
) -> u32 {
    if REQUIRED_DEVICE_EXTENSIONS
        .iter()
        .any(|required| !has_extension(available, required))
    {
        return 0;
    }

    let mut score = 1 + props.limits.max_image_dimension2_d;
    if props.device_type == vk::PhysicalDeviceType::DISCRETE_GPU {
        score += 1000;
    }
    score
}

/// Replacement happens only on a strictly greater score, so ties keep the
/// first-seen candidate.
fn select_best(scores: &[u32]) -> Result<usize, BootstrapError> {
    if scores.is_empty() {
        return Err(BootstrapError::NoPhysicalDevices);
    }

    let mut best = None;
    let mut best_score = 0;
    for (i, &score) in scores.iter().enumerate() {
        if score > best_score {
            best_score = score;
            best = Some(i);
        }
    }
    best.ok_or(BootstrapError::NoSuitableDevice)
}

unsafe fn select_physical_device(
    instance: &ash::Instance,
) -> Result<vk::PhysicalDevice, BootstrapError> {
    let devices = instance.enumerate_physical_devices()?;

    let mut candidates = Vec::with_capacity(devices.len());
    let mut scores = Vec::with_capacity(devices.len());
    for phys in devices {
        let props = instance.get_physical_device_properties(phys);
        // a device that cannot report its extensions simply does not qualify
        let extensions = instance
            .enumerate_device_extension_properties(phys)
            .unwrap_or_default();
        scores.push(device_score(&props, &extensions));
        candidates.push((phys, props));
    }

    let winner = select_best(&scores)?;
    let (phys, props) = &candidates[winner];
    info!(
        "selected GPU: {} (score {})",
        CStr::from_ptr(props.device_name.as_ptr()).to_string_lossy(),
        scores[winner]
    );
    Ok(*phys)
}

// ---------------------------------------------------------------------------
// Queue family resolution

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
}

impl QueueFamilyIndices {
    /// Scan every family; a later family that also qualifies replaces an
    /// earlier one. The two roles are resolved independently and may land on
    /// the same index.
    pub fn resolve(families: &[vk::QueueFamilyProperties], present_support: &[bool]) -> Self {
        let mut indices = QueueFamilyIndices::default();
        for (i, family) in families.iter().enumerate() {
            if family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
                indices.graphics = Some(i as u32);
            }
            if present_support.get(i).copied().unwrap_or(false) {
                indices.present = Some(i as u32);
            }
        }
        indices
    }

    /// Both roles must be resolved before device creation; a missing one is
    /// a hard failure, not a degraded mode.
    pub fn complete(self) -> Result<ResolvedQueues, BootstrapError> {
        let graphics = self.graphics.ok_or(BootstrapError::MissingGraphicsQueue)?;
        let present = self.present.ok_or(BootstrapError::MissingPresentQueue)?;
        Ok(ResolvedQueues { graphics, present })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedQueues {
    pub graphics: u32,
    pub present: u32,
}

impl ResolvedQueues {
    /// Distinct families share swapchain images concurrently across exactly
    /// those two indices; a single family needs no cross-queue sharing.
    pub fn sharing(&self) -> (vk::SharingMode, Vec<u32>) {
        if self.graphics != self.present {
            (vk::SharingMode::CONCURRENT, vec![self.graphics, self.present])
        } else {
            (vk::SharingMode::EXCLUSIVE, Vec::new())
        }
    }
}

unsafe fn query_queue_families(
    surface: &SurfaceHandle,
    instance: &ash::Instance,
    phys: vk::PhysicalDevice,
) -> QueueFamilyIndices {
    let families = instance.get_physical_device_queue_family_properties(phys);
    let present_support: Vec<bool> = (0..families.len() as u32)
        .map(|i| {
            surface
                .loader
                .get_physical_device_surface_support(phys, i, surface.surface)
                .unwrap_or(false)
        })
        .collect();
    QueueFamilyIndices::resolve(&families, &present_support)
}

// ---------------------------------------------------------------------------
// Surface configuration

#[derive(Clone, Copy, Debug)]
pub struct SwapchainConfig {
    pub format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub image_count: u32,
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
}

fn choose_surface_format(
    formats: &[vk::SurfaceFormatKHR],
) -> Result<vk::SurfaceFormatKHR, BootstrapError> {
    if formats.is_empty() {
        return Err(BootstrapError::NoSurfaceFormats);
    }
    Ok(formats
        .iter()
        .copied()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .unwrap_or(formats[0]))
}

fn choose_present_mode(
    modes: &[vk::PresentModeKHR],
) -> Result<vk::PresentModeKHR, BootstrapError> {
    if modes.is_empty() {
        return Err(BootstrapError::NoPresentModes);
    }
    // FIFO is the only mode every driver must support
    Ok(if modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    })
}

fn clamp_extent(caps: &vk::SurfaceCapabilitiesKHR, width: u32, height: u32) -> vk::Extent2D {
    vk::Extent2D {
        width: width.clamp(caps.min_image_extent.width, caps.max_image_extent.width),
        height: height.clamp(caps.min_image_extent.height, caps.max_image_extent.height),
    }
}

/// One more than the minimum to reduce stalls; max_image_count of 0 means
/// the surface imposes no upper bound.
fn swapchain_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let want = caps.min_image_count + 1;
    if caps.max_image_count == 0 {
        want
    } else {
        want.min(caps.max_image_count)
    }
}

unsafe fn negotiate_surface_config(
    surface: &SurfaceHandle,
    phys: vk::PhysicalDevice,
    width: u32,
    height: u32,
) -> Result<SwapchainConfig, BootstrapError> {
    let caps = surface
        .loader
        .get_physical_device_surface_capabilities(phys, surface.surface)?;
    let formats = surface
        .loader
        .get_physical_device_surface_formats(phys, surface.surface)?;
    let modes = surface
        .loader
        .get_physical_device_surface_present_modes(phys, surface.surface)?;

    let format = choose_surface_format(&formats)?;
    let present_mode = choose_present_mode(&modes)?;
    let extent = clamp_extent(&caps, width, height);
    let image_count = swapchain_image_count(&caps);

    info!(
        "surface config: {:?}/{:?}, {:?}, {}x{}, {} images",
        format.format, format.color_space, present_mode, extent.width, extent.height, image_count
    );

    Ok(SwapchainConfig {
        format,
        present_mode,
        extent,
        image_count,
        pre_transform: caps.current_transform,
    })
}

// ---------------------------------------------------------------------------
// Owned resource wrappers. Each one releases its handle on drop, so a failed
// bootstrap unwinds whatever was already created, and the aggregate's field
// order is the teardown order.

struct InstanceHandle {
    entry: Entry,
    instance: ash::Instance,
}

impl Drop for InstanceHandle {
    fn drop(&mut self) {
        unsafe {
            self.instance.destroy_instance(None);
        }
    }
}

struct SurfaceHandle {
    loader: surface::Instance,
    surface: vk::SurfaceKHR,
}

impl Drop for SurfaceHandle {
    fn drop(&mut self) {
        unsafe {
            self.loader.destroy_surface(self.surface, None);
        }
    }
}

struct DeviceHandle {
    device: ash::Device,
    phys: vk::PhysicalDevice,
    queues: ResolvedQueues,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_device(None);
        }
    }
}

struct SwapchainBundle {
    device: ash::Device,
    loader: swapchain::Device,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::Format,
    extent: vk::Extent2D,
}

impl SwapchainBundle {
    // Views before the swapchain. Idempotent so recreate can reuse it.
    unsafe fn destroy(&mut self) {
        for &view in &self.image_views {
            self.device.destroy_image_view(view, None);
        }
        self.image_views.clear();
        self.images.clear();
        if self.swapchain != vk::SwapchainKHR::null() {
            self.loader.destroy_swapchain(self.swapchain, None);
            self.swapchain = vk::SwapchainKHR::null();
        }
    }
}

impl Drop for SwapchainBundle {
    fn drop(&mut self) {
        unsafe {
            self.destroy();
        }
    }
}

unsafe fn create_device(
    instance: &ash::Instance,
    phys: vk::PhysicalDevice,
    queues: ResolvedQueues,
) -> Result<DeviceHandle, BootstrapError> {
    let priorities = [1.0_f32];
    let mut queue_infos = vec![vk::DeviceQueueCreateInfo {
        s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
        queue_family_index: queues.graphics,
        queue_count: 1,
        p_queue_priorities: priorities.as_ptr(),
        ..Default::default()
    }];
    if queues.present != queues.graphics {
        queue_infos.push(vk::DeviceQueueCreateInfo {
            s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
            queue_family_index: queues.present,
            queue_count: 1,
            p_queue_priorities: priorities.as_ptr(),
            ..Default::default()
        });
    }

    let device_exts = [swapchain::NAME.as_ptr()];
    let features = vk::PhysicalDeviceFeatures::default();
    let create_info = vk::DeviceCreateInfo {
        s_type: vk::StructureType::DEVICE_CREATE_INFO,
        queue_create_info_count: queue_infos.len() as u32,
        p_queue_create_infos: queue_infos.as_ptr(),
        enabled_extension_count: device_exts.len() as u32,
        pp_enabled_extension_names: device_exts.as_ptr(),
        p_enabled_features: &features,
        ..Default::default()
    };

    let device = instance
        .create_device(phys, &create_info, None)
        .map_err(BootstrapError::DeviceCreation)?;
    let graphics_queue = device.get_device_queue(queues.graphics, 0);
    let present_queue = device.get_device_queue(queues.present, 0);

    Ok(DeviceHandle {
        device,
        phys,
        queues,
        graphics_queue,
        present_queue,
    })
}

unsafe fn create_swapchain_bundle(
    instance: &ash::Instance,
    device: &DeviceHandle,
    surface: &SurfaceHandle,
    config: &SwapchainConfig,
) -> Result<SwapchainBundle, BootstrapError> {
    let loader = swapchain::Device::new(instance, &device.device);
    let (sharing_mode, family_indices) = device.queues.sharing();

    let mut create_info = vk::SwapchainCreateInfoKHR {
        s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
        surface: surface.surface,
        min_image_count: config.image_count,
        image_format: config.format.format,
        image_color_space: config.format.color_space,
        image_extent: config.extent,
        image_array_layers: 1,
        image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
        image_sharing_mode: sharing_mode,
        pre_transform: config.pre_transform,
        composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
        present_mode: config.present_mode,
        clipped: vk::TRUE,
        ..Default::default()
    };
    if sharing_mode == vk::SharingMode::CONCURRENT {
        create_info.queue_family_index_count = family_indices.len() as u32;
        create_info.p_queue_family_indices = family_indices.as_ptr();
    }

    let swapchain = loader
        .create_swapchain(&create_info, None)
        .map_err(BootstrapError::SwapchainCreation)?;

    // The bundle owns the handle from here on; a view failure below unwinds
    // the partial chain on the way out.
    let mut bundle = SwapchainBundle {
        device: device.device.clone(),
        loader,
        swapchain,
        images: Vec::new(),
        image_views: Vec::new(),
        format: config.format.format,
        extent: config.extent,
    };

    // The driver may hand back more images than requested.
    let images = bundle.loader.get_swapchain_images(swapchain)?;
    for &image in &images {
        let view_info = vk::ImageViewCreateInfo {
            s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
            image,
            view_type: vk::ImageViewType::TYPE_2D,
            format: bundle.format,
            components: vk::ComponentMapping {
                r: vk::ComponentSwizzle::IDENTITY,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::IDENTITY,
                a: vk::ComponentSwizzle::IDENTITY,
            },
            subresource_range: vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            },
            ..Default::default()
        };
        let view = bundle
            .device
            .create_image_view(&view_info, None)
            .map_err(BootstrapError::ImageViewCreation)?;
        bundle.image_views.push(view);
    }
    bundle.images = images;

    info!("swapchain ready ({} images)", bundle.images.len());
    Ok(bundle)
}

// ---------------------------------------------------------------------------
// The aggregate

// TEARDOWN ORDER (field declaration order IS the drop order):
//   debug messenger -> image views -> swapchain -> surface -> device -> instance
pub struct GraphicsContext {
    frame_index: u64,
    debug: Option<DebugMessenger>,
    swapchain: SwapchainBundle,
    surface: SurfaceHandle,
    device: DeviceHandle,
    instance: InstanceHandle,
}

impl GraphicsContext {
    /// Runs the whole bootstrap in its one valid order: negotiate extensions
    /// and create the instance, attach debug, create the surface, pick a
    /// physical device, resolve queue families, create the logical device
    /// and queues, negotiate the surface configuration, build the swapchain.
    /// An error at any step drops everything already created, newest first.
    pub fn bootstrap(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: RenderSize,
        validation: bool,
    ) -> Result<Self, BootstrapError> {
        let display_raw: RawDisplayHandle = display.display_handle()?.as_raw();
        let window_raw: RawWindowHandle = window.window_handle()?.as_raw();

        unsafe {
            let entry = Entry::linked();
            let raw_instance = create_instance(&entry, display_raw, validation)?;
            let instance = InstanceHandle {
                entry,
                instance: raw_instance,
            };

            let debug = if validation {
                create_debug_messenger(&instance.entry, &instance.instance)
            } else {
                None
            };

            let surface_loader = surface::Instance::new(&instance.entry, &instance.instance);
            let raw_surface = ash_window::create_surface(
                &instance.entry,
                &instance.instance,
                display_raw,
                window_raw,
                None,
            )
            .map_err(BootstrapError::SurfaceCreation)?;
            let surface = SurfaceHandle {
                loader: surface_loader,
                surface: raw_surface,
            };

            let phys = select_physical_device(&instance.instance)?;
            let queues = query_queue_families(&surface, &instance.instance, phys).complete()?;
            debug!(
                "queue families: graphics {}, present {}",
                queues.graphics, queues.present
            );

            let device = create_device(&instance.instance, phys, queues)?;
            let config = negotiate_surface_config(&surface, phys, size.width, size.height)?;
            let swapchain =
                create_swapchain_bundle(&instance.instance, &device, &surface, &config)?;

            Ok(GraphicsContext {
                frame_index: 0,
                debug,
                swapchain,
                surface,
                device,
                instance,
            })
        }
    }

    /// Tears down the old image views + swapchain and re-runs the surface
    /// negotiation against fresh capabilities. The surface can only carry
    /// one swapchain, so destruction happens first.
    pub fn recreate_swapchain(&mut self, size: RenderSize) -> Result<(), BootstrapError> {
        unsafe {
            self.device.device.device_wait_idle().ok();
            self.swapchain.destroy();

            let config = negotiate_surface_config(
                &self.surface,
                self.device.phys,
                size.width,
                size.height,
            )?;
            self.swapchain = create_swapchain_bundle(
                &self.instance.instance,
                &self.device,
                &self.surface,
                &config,
            )?;
        }
        Ok(())
    }

    pub fn device(&self) -> &ash::Device {
        &self.device.device
    }

    pub fn graphics_queue(&self) -> vk::Queue {
        self.device.graphics_queue
    }

    pub fn present_queue(&self) -> vk::Queue {
        self.device.present_queue
    }

    pub fn queue_families(&self) -> ResolvedQueues {
        self.device.queues
    }

    pub fn surface_format(&self) -> vk::Format {
        self.swapchain.format
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent
    }

    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.swapchain.image_views
    }

    pub fn has_debug_messenger(&self) -> bool {
        self.debug.is_some()
    }
}

impl RenderBackend for GraphicsContext {
    fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: RenderSize,
        validation: bool,
    ) -> Result<Self> {
        let ctx = GraphicsContext::bootstrap(window, display, size, validation)?;
        info!(
            "vulkan context ready ({}x{}, fmt {:?})",
            ctx.extent().width,
            ctx.extent().height,
            ctx.surface_format()
        );
        Ok(ctx)
    }

    fn resize(&mut self, size: RenderSize) -> Result<()> {
        self.recreate_swapchain(size)?;
        Ok(())
    }

    fn begin_frame(&mut self) -> Frame {
        let frame = Frame::new(self.frame_index);
        self.frame_index += 1;
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ext(name: &CStr) -> vk::ExtensionProperties {
        let mut props = vk::ExtensionProperties::default();
        for (dst, src) in props.extension_name.iter_mut().zip(name.to_bytes_with_nul()) {
            *dst = *src as _;
        }
        props
    }

    fn gpu(device_type: vk::PhysicalDeviceType, max_dim: u32) -> vk::PhysicalDeviceProperties {
        let mut props = vk::PhysicalDeviceProperties::default();
        props.device_type = device_type;
        props.limits.max_image_dimension2_d = max_dim;
        props
    }

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    fn caps(
        min_images: u32,
        max_images: u32,
        min_extent: (u32, u32),
        max_extent: (u32, u32),
    ) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min_images,
            max_image_count: max_images,
            min_image_extent: vk::Extent2D {
                width: min_extent.0,
                height: min_extent.1,
            },
            max_image_extent: vk::Extent2D {
                width: max_extent.0,
                height: max_extent.1,
            },
            ..Default::default()
        }
    }

    #[test]
    fn negotiation_without_debug_requests_zero_layers() {
        let windowing = [c"VK_KHR_surface".as_ptr(), c"VK_KHR_xcb_surface".as_ptr()];
        let (extensions, layers) = negotiate_instance_extensions(&windowing, false);
        assert_eq!(extensions, windowing.to_vec());
        assert!(layers.is_empty());
    }

    #[test]
    fn negotiation_with_debug_appends_debug_utils_and_one_layer() {
        let windowing = [c"VK_KHR_surface".as_ptr()];
        let (extensions, layers) = negotiate_instance_extensions(&windowing, true);
        assert_eq!(extensions.len(), 2);
        assert_eq!(extensions[0], windowing[0]);
        assert_eq!(extensions[1], debug_utils::NAME.as_ptr());
        assert_eq!(layers, vec![VALIDATION_LAYER.as_ptr()]);
    }

    #[test]
    fn missing_required_extension_scores_zero() {
        let props = gpu(vk::PhysicalDeviceType::DISCRETE_GPU, 16384);
        assert_eq!(device_score(&props, &[]), 0);
        assert_eq!(device_score(&props, &[ext(c"VK_KHR_maintenance1")]), 0);
    }

    #[test]
    fn score_is_dimension_plus_discrete_bonus() {
        let swap = [ext(swapchain::NAME)];
        let discrete = gpu(vk::PhysicalDeviceType::DISCRETE_GPU, 4096);
        let integrated = gpu(vk::PhysicalDeviceType::INTEGRATED_GPU, 4096);
        assert_eq!(device_score(&discrete, &swap), 1 + 4096 + 1000);
        assert_eq!(device_score(&integrated, &swap), 1 + 4096);
    }

    #[test]
    fn discrete_outranks_integrated_within_dimension_band() {
        let swap = [ext(swapchain::NAME)];
        let weak_discrete = gpu(vk::PhysicalDeviceType::DISCRETE_GPU, 100);
        let strong_integrated = gpu(vk::PhysicalDeviceType::INTEGRATED_GPU, 999);
        assert!(device_score(&weak_discrete, &swap) > device_score(&strong_integrated, &swap));
    }

    #[test]
    fn selection_keeps_first_candidate_on_ties() {
        assert_eq!(select_best(&[500, 500, 200]).unwrap(), 0);
        assert_eq!(select_best(&[200, 500, 500]).unwrap(), 1);
    }

    #[test]
    fn empty_enumeration_fails_before_anything_else() {
        assert!(matches!(
            select_best(&[]),
            Err(BootstrapError::NoPhysicalDevices)
        ));
    }

    #[test]
    fn all_disqualified_candidates_fail_selection() {
        assert!(matches!(
            select_best(&[0, 0, 0]),
            Err(BootstrapError::NoSuitableDevice)
        ));
    }

    #[test]
    fn single_family_serves_both_roles() {
        let families = [family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE)];
        let indices = QueueFamilyIndices::resolve(&families, &[true]);
        let queues = indices.complete().unwrap();
        assert_eq!(queues.graphics, 0);
        assert_eq!(queues.present, 0);
        assert_eq!(queues.sharing().0, vk::SharingMode::EXCLUSIVE);
    }

    #[test]
    fn later_qualifying_family_wins_the_scan() {
        let families = [
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::TRANSFER),
        ];
        let indices = QueueFamilyIndices::resolve(&families, &[true, false, true]);
        assert_eq!(indices.graphics, Some(1));
        assert_eq!(indices.present, Some(2));
    }

    #[test]
    fn unresolved_roles_are_fatal() {
        let compute_only = [family(vk::QueueFlags::COMPUTE)];
        assert!(matches!(
            QueueFamilyIndices::resolve(&compute_only, &[true]).complete(),
            Err(BootstrapError::MissingGraphicsQueue)
        ));

        let no_present = [family(vk::QueueFlags::GRAPHICS)];
        assert!(matches!(
            QueueFamilyIndices::resolve(&no_present, &[false]).complete(),
            Err(BootstrapError::MissingPresentQueue)
        ));
    }

    #[test]
    fn distinct_families_share_concurrently() {
        let queues = ResolvedQueues {
            graphics: 2,
            present: 5,
        };
        let (mode, indices) = queues.sharing();
        assert_eq!(mode, vk::SharingMode::CONCURRENT);
        assert_eq!(indices, vec![2, 5]);

        let unified = ResolvedQueues {
            graphics: 2,
            present: 2,
        };
        let (mode, indices) = unified.sharing();
        assert_eq!(mode, vk::SharingMode::EXCLUSIVE);
        assert!(indices.is_empty());
    }

    #[test]
    fn format_selection_prefers_bgra_srgb() {
        let preferred = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        let other = vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };

        let chosen = choose_surface_format(&[other, preferred]).unwrap();
        assert_eq!(chosen.format, preferred.format);
        assert_eq!(chosen.color_space, preferred.color_space);
    }

    #[test]
    fn format_selection_falls_back_to_first() {
        let first = vk::SurfaceFormatKHR {
            format: vk::Format::R8G8B8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        let second = vk::SurfaceFormatKHR {
            format: vk::Format::R16G16B16A16_SFLOAT,
            color_space: vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
        };
        let chosen = choose_surface_format(&[first, second]).unwrap();
        assert_eq!(chosen.format, first.format);

        assert!(matches!(
            choose_surface_format(&[]),
            Err(BootstrapError::NoSurfaceFormats)
        ));
    }

    #[test]
    fn present_mode_prefers_mailbox_else_fifo() {
        let chosen =
            choose_present_mode(&[vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX]).unwrap();
        assert_eq!(chosen, vk::PresentModeKHR::MAILBOX);

        let chosen = choose_present_mode(&[vk::PresentModeKHR::IMMEDIATE]).unwrap();
        assert_eq!(chosen, vk::PresentModeKHR::FIFO);

        assert!(matches!(
            choose_present_mode(&[]),
            Err(BootstrapError::NoPresentModes)
        ));
    }

    #[test]
    fn in_range_extent_is_unchanged() {
        let caps = caps(2, 0, (1, 1), (4096, 4096));
        let once = clamp_extent(&caps, 640, 480);
        assert_eq!((once.width, once.height), (640, 480));

        // clamping is idempotent
        let twice = clamp_extent(&caps, once.width, once.height);
        assert_eq!((twice.width, twice.height), (640, 480));
    }

    #[test]
    fn oversized_width_clamps_alone() {
        let caps = caps(2, 0, (1, 1), (4096, 4096));
        let clamped = clamp_extent(&caps, 10000, 480);
        assert_eq!((clamped.width, clamped.height), (4096, 480));
    }

    #[test]
    fn undersized_extent_clamps_up() {
        let caps = caps(2, 0, (320, 240), (4096, 4096));
        let clamped = clamp_extent(&caps, 0, 0);
        assert_eq!((clamped.width, clamped.height), (320, 240));
    }

    #[test]
    fn image_count_is_min_plus_one() {
        assert_eq!(swapchain_image_count(&caps(2, 0, (1, 1), (1, 1))), 3);
    }

    #[test]
    fn image_count_respects_surface_maximum() {
        assert_eq!(swapchain_image_count(&caps(2, 3, (1, 1), (1, 1))), 3);
        assert_eq!(swapchain_image_count(&caps(2, 2, (1, 1), (1, 1))), 2);
    }
}
