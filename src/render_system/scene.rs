use nalgebra::{Point3, Vector3};
use rand::{Rng, SeedableRng, rngs::StdRng};

#[derive(Clone, Debug, PartialEq)]
pub struct Sphere {
    pub center: Point3<f32>,
    pub radius: f32,
    pub albedo: Vector3<f32>,
    pub specular: Vector3<f32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DirectionalLight {
    // direction the light travels in, normalized
    pub direction: Vector3<f32>,
    pub intensity: f32,
}

/// Spheres resting on an infinite ground plane at y = 0.
#[derive(Clone, Debug)]
pub struct Scene {
    pub spheres: Vec<Sphere>,
    pub ground_albedo: Vector3<f32>,
    pub ground_specular: Vector3<f32>,
    pub light: DirectionalLight,
}

#[derive(Clone, Debug)]
pub struct Ray {
    pub origin: Point3<f32>,
    pub direction: Vector3<f32>,
}

#[derive(Clone, Debug)]
pub struct RayHit {
    pub distance: f32,
    pub position: Point3<f32>,
    pub normal: Vector3<f32>,
    pub albedo: Vector3<f32>,
    pub specular: Vector3<f32>,
}

impl Scene {
    pub fn new(spheres: Vec<Sphere>, light: DirectionalLight) -> Scene {
        Scene {
            spheres,
            ground_albedo: Vector3::new(0.8, 0.8, 0.8),
            ground_specular: Vector3::new(0.05, 0.05, 0.05),
            light,
        }
    }

    /// Places up to `count` non-overlapping spheres within `placement_radius`
    /// of the origin. Same seed, same scene.
    pub fn random(
        seed: u64,
        count: u32,
        radius_range: (f32, f32),
        placement_radius: f32,
    ) -> Scene {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut spheres: Vec<Sphere> = vec![];

        // give up on a sphere after this many rejected placements
        const MAX_ATTEMPTS: u32 = 100;

        for _ in 0..count {
            for _ in 0..MAX_ATTEMPTS {
                let radius = rng.random_range(radius_range.0..=radius_range.1);
                let angle = rng.random_range(0.0..std::f32::consts::TAU);
                let dist = placement_radius * rng.random::<f32>().sqrt();
                let center = Point3::new(dist * angle.cos(), radius, dist * angle.sin());

                let overlaps = spheres
                    .iter()
                    .any(|s| (s.center - center).norm() < s.radius + radius);
                if overlaps {
                    continue;
                }

                let color = Vector3::new(rng.random(), rng.random(), rng.random());
                let metal = rng.random::<f32>() < 0.5;
                spheres.push(Sphere {
                    center,
                    radius,
                    albedo: if metal { Vector3::zeros() } else { color },
                    specular: if metal {
                        color
                    } else {
                        Vector3::new(0.04, 0.04, 0.04)
                    },
                });
                break;
            }
        }

        Scene::new(
            spheres,
            DirectionalLight {
                direction: Vector3::new(-0.3, -1.0, 0.5).normalize(),
                intensity: 1.0,
            },
        )
    }

    pub fn trace(&self, ray: &Ray) -> Option<RayHit> {
        let mut best: Option<RayHit> = None;

        // ground plane
        if ray.direction.y.abs() > f32::EPSILON {
            let t = -ray.origin.y / ray.direction.y;
            if t > 0.0 {
                best = Some(RayHit {
                    distance: t,
                    position: ray.origin + t * ray.direction,
                    normal: Vector3::new(0.0, 1.0, 0.0),
                    albedo: self.ground_albedo,
                    specular: self.ground_specular,
                });
            }
        }

        for sphere in &self.spheres {
            let Some(t) = intersect_sphere(ray, sphere) else {
                continue;
            };
            if best.as_ref().is_some_and(|b| b.distance <= t) {
                continue;
            }
            let position = ray.origin + t * ray.direction;
            best = Some(RayHit {
                distance: t,
                position,
                normal: (position - sphere.center).normalize(),
                albedo: sphere.albedo,
                specular: sphere.specular,
            });
        }

        best
    }

    pub fn occluded(&self, ray: &Ray) -> bool {
        self.trace(ray).is_some()
    }
}

fn intersect_sphere(ray: &Ray, sphere: &Sphere) -> Option<f32> {
    let d = ray.origin - sphere.center;
    let p1 = -ray.direction.dot(&d);
    let p2sqr = p1 * p1 - d.dot(&d) + sphere.radius * sphere.radius;
    if p2sqr < 0.0 {
        return None;
    }
    let p2 = p2sqr.sqrt();
    let t = if p1 - p2 > 0.0 { p1 - p2 } else { p1 + p2 };
    (t > 0.0).then_some(t)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_sphere_scene() -> Scene {
        Scene::new(
            vec![Sphere {
                center: Point3::new(0.0, 1.0, 0.0),
                radius: 1.0,
                albedo: Vector3::new(1.0, 0.0, 0.0),
                specular: Vector3::zeros(),
            }],
            DirectionalLight {
                direction: Vector3::new(0.0, -1.0, 0.0),
                intensity: 1.0,
            },
        )
    }

    #[test]
    fn test_random_scene_is_deterministic() {
        let a = Scene::random(7, 20, (0.3, 1.0), 10.0);
        let b = Scene::random(7, 20, (0.3, 1.0), 10.0);
        assert_eq!(a.spheres, b.spheres);
        assert!(!a.spheres.is_empty());
    }

    #[test]
    fn test_random_spheres_do_not_overlap() {
        let scene = Scene::random(42, 50, (0.2, 0.8), 8.0);
        for (i, a) in scene.spheres.iter().enumerate() {
            // resting on the ground
            assert!((a.center.y - a.radius).abs() < 1e-5);
            for b in &scene.spheres[i + 1..] {
                assert!((a.center - b.center).norm() >= a.radius + b.radius);
            }
        }
    }

    #[test]
    fn test_trace_hits_sphere_before_ground() {
        let scene = unit_sphere_scene();
        let ray = Ray {
            origin: Point3::new(0.0, 5.0, 0.0),
            direction: Vector3::new(0.0, -1.0, 0.0),
        };
        let hit = scene.trace(&ray).unwrap();
        assert!((hit.distance - 3.0).abs() < 1e-5);
        assert!((hit.normal - Vector3::new(0.0, 1.0, 0.0)).norm() < 1e-5);
        assert_eq!(hit.albedo, Vector3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_trace_hits_ground() {
        let scene = unit_sphere_scene();
        let ray = Ray {
            origin: Point3::new(5.0, 1.0, 0.0),
            direction: Vector3::new(0.0, -1.0, 0.0),
        };
        let hit = scene.trace(&ray).unwrap();
        assert!((hit.distance - 1.0).abs() < 1e-5);
        assert_eq!(hit.albedo, scene.ground_albedo);
    }

    #[test]
    fn test_trace_misses_upward() {
        let scene = unit_sphere_scene();
        let ray = Ray {
            origin: Point3::new(5.0, 1.0, 0.0),
            direction: Vector3::new(0.0, 1.0, 0.0),
        };
        assert!(scene.trace(&ray).is_none());
        assert!(!scene.occluded(&ray));
    }
}
