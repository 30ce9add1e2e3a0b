use std::sync::{Arc, mpsc};

use image::{Rgba, Rgba32FImage};
use nalgebra::{Matrix4, Point2, Point3, Vector2, Vector3};

use crate::error::BackendError;
use crate::utils;

use super::backend::{ComputeKernel, DispatchParameters};
use super::environment::EnvironmentMap;
use super::scene::{Ray, Scene};
use super::software_device::SoftwareDevice;

pub const LOCAL_SIZE: [u32; 3] = [8, 8, 1];

// offset applied along the normal before tracing secondary rays
const SURFACE_BIAS: f32 = 1e-3;

/// Whitted-style tracer: specular bounces, direct light with hard shadows,
/// environment lookup on miss.
pub struct SoftwareRaytracer {
    scene: Arc<Scene>,
    num_bounces: u32,
}

impl SoftwareRaytracer {
    pub fn new(scene: Arc<Scene>, num_bounces: u32) -> SoftwareRaytracer {
        SoftwareRaytracer {
            scene,
            num_bounces: num_bounces.max(1),
        }
    }
}

/// Primary ray through the jittered pixel `(x, y)`. Row 0 is the top of the image.
pub fn camera_ray(
    x: u32,
    y: u32,
    extent: [u32; 2],
    pixel_offset: Vector2<f32>,
    camera_to_world: &Matrix4<f32>,
    camera_inverse_projection: &Matrix4<f32>,
) -> Ray {
    let uv = utils::screen_to_uv(
        Point2::new(x as f32 + pixel_offset.x, y as f32 + pixel_offset.y),
        extent,
    );

    let origin = camera_to_world.transform_point(&Point3::origin());
    // image rows grow downward, clip space y grows upward
    let target = camera_inverse_projection.transform_point(&Point3::new(uv.x, -uv.y, 0.0));
    let direction = camera_to_world
        .transform_vector(&target.coords)
        .normalize();

    Ray { origin, direction }
}

fn shade(
    scene: &Scene,
    environment: &EnvironmentMap,
    mut ray: Ray,
    num_bounces: u32,
) -> Vector3<f32> {
    let mut result = Vector3::zeros();
    let mut energy = Vector3::new(1.0, 1.0, 1.0);

    for _ in 0..num_bounces {
        let Some(hit) = scene.trace(&ray) else {
            result += energy.component_mul(&environment.sample(&ray.direction));
            break;
        };

        let origin = hit.position + hit.normal * SURFACE_BIAS;
        let to_light = -scene.light.direction;
        let shadow = Ray {
            origin,
            direction: to_light,
        };
        if !scene.occluded(&shadow) {
            let lambert = hit.normal.dot(&to_light).max(0.0) * scene.light.intensity;
            result += energy.component_mul(&hit.albedo) * lambert;
        }

        energy = energy.component_mul(&hit.specular);
        if energy.max() <= 0.0 {
            break;
        }
        ray = Ray {
            origin,
            direction: ray.direction - 2.0 * ray.direction.dot(&hit.normal) * hit.normal,
        };
    }

    result
}

impl ComputeKernel<SoftwareDevice> for SoftwareRaytracer {
    fn local_size(&self) -> [u32; 3] {
        LOCAL_SIZE
    }

    fn dispatch(
        &mut self,
        backend: &mut SoftwareDevice,
        params: &DispatchParameters,
        result: &mut Rgba32FImage,
        environment: &Arc<EnvironmentMap>,
    ) -> Result<(), BackendError> {
        let [xsize, ysize] = params.extent;
        if result.dimensions() != (xsize, ysize) {
            return Err(BackendError::Dispatch(format!(
                "result image is {:?} but dispatch extent is {:?}",
                result.dimensions(),
                params.extent
            )));
        }
        let [gx, gy, gz] = params.group_count;
        if gx * LOCAL_SIZE[0] < xsize || gy * LOCAL_SIZE[1] < ysize || gz == 0 {
            return Err(BackendError::Dispatch(format!(
                "group count {:?} does not cover {}x{}",
                params.group_count, xsize, ysize
            )));
        }

        // one job per row of workgroups
        let (sender, receiver) = mpsc::channel();
        for group_y in 0..gy {
            let scene = self.scene.clone();
            let environment = environment.clone();
            let params = params.clone();
            let num_bounces = self.num_bounces;
            let sender = sender.clone();
            backend.threadpool().execute(move || {
                let y0 = group_y * LOCAL_SIZE[1];
                let y1 = (y0 + LOCAL_SIZE[1]).min(ysize);
                let mut rows = Vec::with_capacity(((y1.saturating_sub(y0)) * xsize) as usize);
                for y in y0..y1 {
                    for group_x in 0..gx {
                        for lx in 0..LOCAL_SIZE[0] {
                            let x = group_x * LOCAL_SIZE[0] + lx;
                            if x >= xsize {
                                continue;
                            }
                            let ray = camera_ray(
                                x,
                                y,
                                params.extent,
                                params.pixel_offset,
                                &params.camera_to_world,
                                &params.camera_inverse_projection,
                            );
                            let c = shade(&scene, &environment, ray, num_bounces);
                            rows.push(Rgba([c.x, c.y, c.z, 1.0]));
                        }
                    }
                }
                let _ = sender.send((y0, y1, rows));
            });
        }
        drop(sender);

        // every job must report back before the image is complete
        let mut finished = 0;
        for (y0, y1, rows) in receiver.iter() {
            let mut texels = rows.into_iter();
            for y in y0..y1 {
                for x in 0..xsize {
                    if let Some(texel) = texels.next() {
                        result.put_pixel(x, y, texel);
                    }
                }
            }
            finished += 1;
        }

        if finished != gy {
            return Err(BackendError::Dispatch(format!(
                "{} of {} workgroup rows did not complete",
                gy - finished,
                gy
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_system::backend::{ImageFormat, RenderBackend, group_count};
    use crate::render_system::scene::{DirectionalLight, Sphere};

    fn params(extent: [u32; 2]) -> DispatchParameters {
        let proj = nalgebra::Perspective3::new(
            extent[0] as f32 / extent[1] as f32,
            std::f32::consts::FRAC_PI_2,
            0.1,
            100.0,
        );
        // camera at y = 1 looking down -z
        let camera_to_world = Matrix4::new_translation(&Vector3::new(0.0, 1.0, 0.0));
        DispatchParameters {
            pixel_offset: Vector2::new(0.5, 0.5),
            camera_to_world,
            camera_inverse_projection: proj.inverse(),
            group_count: group_count(extent, LOCAL_SIZE),
            extent,
        }
    }

    fn empty_scene() -> Arc<Scene> {
        Arc::new(Scene::new(
            vec![],
            DirectionalLight {
                direction: Vector3::new(0.0, -1.0, 0.0),
                intensity: 1.0,
            },
        ))
    }

    #[test]
    fn test_center_ray_points_forward() {
        let p = params([9, 9]);
        let ray = camera_ray(
            4,
            4,
            p.extent,
            p.pixel_offset,
            &p.camera_to_world,
            &p.camera_inverse_projection,
        );
        assert!((ray.origin - Point3::new(0.0, 1.0, 0.0)).norm() < 1e-5);
        assert!((ray.direction - Vector3::new(0.0, 0.0, -1.0)).norm() < 1e-4);
    }

    #[test]
    fn test_top_row_looks_up() {
        let p = params([8, 8]);
        let ray_at = |y| {
            camera_ray(
                3,
                y,
                p.extent,
                p.pixel_offset,
                &p.camera_to_world,
                &p.camera_inverse_projection,
            )
        };
        let top = ray_at(0);
        let bottom = ray_at(7);
        assert!(top.direction.y > 0.0);
        assert!(bottom.direction.y < 0.0);
    }

    #[test]
    fn test_dispatch_writes_sky_and_ground() {
        let mut device = SoftwareDevice::new(2).unwrap();
        let sky = EnvironmentMap::gradient([0.0, 0.0, 1.0], [0.0, 0.0, 1.0]);
        let env = device.upload_environment(sky);
        let mut kernel = SoftwareRaytracer::new(empty_scene(), 2);
        let p = params([13, 11]);
        let mut image = device
            .allocate_storage_image(13, 11, ImageFormat::R32G32B32A32_SFLOAT)
            .unwrap();

        kernel.dispatch(&mut device, &p, &mut image, &env).unwrap();

        // sky above the horizon is pure environment
        let Rgba([r, g, b, a]) = *image.get_pixel(6, 0);
        assert_eq!((r, g, b, a), (0.0, 0.0, 1.0, 1.0));
        // lit ground below
        let Rgba([r, _, _, _]) = *image.get_pixel(6, 10);
        assert!(r > 0.5);
    }

    #[test]
    fn test_dispatch_shadowed_ground_is_dark() {
        let mut device = SoftwareDevice::new(1).unwrap();
        let env = device.upload_environment(EnvironmentMap::gradient([0.0; 3], [0.0; 3]));
        // a large sphere overhead blocks the light from straight above
        let scene = Arc::new(Scene::new(
            vec![Sphere {
                center: Point3::new(0.0, 50.0, 0.0),
                radius: 40.0,
                albedo: Vector3::zeros(),
                specular: Vector3::zeros(),
            }],
            DirectionalLight {
                direction: Vector3::new(0.0, -1.0, 0.0),
                intensity: 1.0,
            },
        ));
        let mut kernel = SoftwareRaytracer::new(scene, 1);
        let p = params([8, 8]);
        let mut image = device
            .allocate_storage_image(8, 8, ImageFormat::R32G32B32A32_SFLOAT)
            .unwrap();
        kernel.dispatch(&mut device, &p, &mut image, &env).unwrap();
        let Rgba([r, g, b, _]) = *image.get_pixel(4, 7);
        assert_eq!((r, g, b), (0.0, 0.0, 0.0));
    }

    #[test]
    fn test_dispatch_rejects_short_grid() {
        let mut device = SoftwareDevice::new(1).unwrap();
        let env = device.upload_environment(EnvironmentMap::gradient([1.0; 3], [1.0; 3]));
        let mut kernel = SoftwareRaytracer::new(empty_scene(), 1);
        let mut p = params([17, 8]);
        p.group_count = [2, 1, 1];
        let mut image = device
            .allocate_storage_image(17, 8, ImageFormat::R32G32B32A32_SFLOAT)
            .unwrap();
        assert!(matches!(
            kernel.dispatch(&mut device, &p, &mut image, &env),
            Err(BackendError::Dispatch(_))
        ));
    }

    #[test]
    fn test_dispatch_rejects_mismatched_image() {
        let mut device = SoftwareDevice::new(1).unwrap();
        let env = device.upload_environment(EnvironmentMap::gradient([1.0; 3], [1.0; 3]));
        let mut kernel = SoftwareRaytracer::new(empty_scene(), 1);
        let p = params([16, 16]);
        let mut image = device
            .allocate_storage_image(8, 8, ImageFormat::R32G32B32A32_SFLOAT)
            .unwrap();
        assert!(kernel.dispatch(&mut device, &p, &mut image, &env).is_err());
    }
}
