use std::sync::Arc;

use log::{error, info, warn};

use progressive_raytracer::camera::{Camera, OrbitCamera, deg2rad};
use progressive_raytracer::config::{FrameEvent, RenderConfig};
use progressive_raytracer::error::{Error, Result};
use progressive_raytracer::render_system::accumulate_shader::AddCompositor;
use progressive_raytracer::render_system::environment::EnvironmentMap;
use progressive_raytracer::render_system::interactive_rendering::Renderer;
use progressive_raytracer::render_system::raytrace_shader::SoftwareRaytracer;
use progressive_raytracer::render_system::scene::Scene;
use progressive_raytracer::render_system::software_device::SoftwareDevice;
use progressive_raytracer::utils;

type SoftwareRenderer = Renderer<SoftwareDevice, SoftwareRaytracer, AddCompositor>;

fn build_camera(config: &RenderConfig) -> OrbitCamera {
    let mut camera = OrbitCamera::new();
    camera.set_fovy(deg2rad(config.camera.fovy));
    camera.zoom(camera.offset() - config.camera.distance);
    camera.orbit(deg2rad(config.camera.yaw), deg2rad(config.camera.pitch));
    // the initial placement is not a change worth resetting for
    camera.take_changed();
    camera
}

fn build_renderer(config: &RenderConfig) -> Result<SoftwareRenderer> {
    let device = SoftwareDevice::new(config.worker_threads)?;

    let environment = match &config.environment {
        Some(path) => EnvironmentMap::load(path, config.environment_intensity)?,
        None => EnvironmentMap::gradient([0.9, 0.9, 1.0], [0.3, 0.5, 0.9]),
    };
    let environment = device.upload_environment(environment);

    let scene = Scene::random(
        config.scene.seed,
        config.scene.sphere_count,
        (config.scene.min_radius, config.scene.max_radius),
        config.scene.placement_radius,
    );
    info!("scene has {} spheres", scene.spheres.len());

    let kernel = SoftwareRaytracer::new(Arc::new(scene), config.num_bounces);

    Ok(Renderer::new(
        device,
        kernel,
        AddCompositor::new(),
        environment,
        config.seed,
    ))
}

fn run() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => RenderConfig::load(path)?,
        None => {
            let config = RenderConfig::default();
            config.validate()?;
            config
        }
    };

    let mut renderer = build_renderer(&config)?;
    let mut camera = build_camera(&config);

    let mut extent = [config.width, config.height];
    let mut surface = renderer.backend().create_surface(extent[0], extent[1]);

    let mut start_time = std::time::Instant::now();
    let mut frame_count = 0;

    for frame in 0..config.frames {
        for event in config.events_at(frame) {
            match *event {
                FrameEvent::Resize { width, height, .. } => {
                    info!("frame {}: resize to {}x{}", frame, width, height);
                    extent = [width, height];
                    surface = renderer.backend().create_surface(width, height);
                }
                FrameEvent::Orbit { yaw, pitch, .. } => {
                    info!("frame {}: orbit by ({}, {}) degrees", frame, yaw, pitch);
                    camera.orbit(deg2rad(yaw), deg2rad(pitch));
                }
                FrameEvent::Zoom { delta, .. } => {
                    info!("frame {}: zoom by {}", frame, delta);
                    camera.zoom(delta);
                }
            }
        }

        match renderer.render_frame(extent[0], extent[1], &mut camera, &mut surface) {
            Ok(()) => {}
            // Do not draw frame when screen dimensions are zero.
            Err(Error::InvalidDimension { width, height }) => {
                warn!("frame {}: skipped, surface is {}x{}", frame, width, height);
            }
            Err(e) if e.is_frame_local() => {
                error!("frame {}: {}", frame, e);
            }
            Err(e) => return Err(e),
        }

        // print fps
        frame_count += 1;
        let elapsed = start_time.elapsed();
        if elapsed.as_secs() >= 1 {
            info!(
                "fps: {} (sample {}, mean luminance {:.4})",
                frame_count,
                renderer.sample_count(),
                utils::get_surface_luminance(&surface)
            );
            frame_count = 0;
            start_time = std::time::Instant::now();
        }
    }

    info!(
        "rendered {} frames, {} samples in the final image, {} target allocations",
        renderer.frame_count(),
        renderer.sample_count(),
        renderer.target_allocations()
    );

    if surface.width() > 0 && surface.height() > 0 {
        utils::save_surface(&surface, config.exposure, &config.output)?;
    }

    renderer.shutdown();
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        error!("{}", e);
        std::process::exit(1);
    }
}
