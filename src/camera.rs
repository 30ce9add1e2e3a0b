use nalgebra::{Isometry3, Matrix4, Perspective3, Point3, Vector3};

#[inline]
pub fn deg2rad(deg: f32) -> f32 {
    deg * std::f32::consts::PI / 180.0
}

/// Dirty flag that is cleared by the read that observes it.
#[derive(Clone, Debug, Default)]
pub struct ChangeSignal {
    raised: bool,
}

impl ChangeSignal {
    pub fn raise(&mut self) {
        self.raised = true;
    }

    pub fn is_raised(&self) -> bool {
        self.raised
    }

    pub fn take(&mut self) -> bool {
        std::mem::take(&mut self.raised)
    }
}

pub trait Camera {
    // camera looks down -Z
    fn camera_to_world(&self) -> Matrix4<f32>;
    fn projection(&self, aspect: f32) -> Matrix4<f32>;
    // read-and-clear
    fn take_changed(&mut self) -> bool;
}

// vectors giving the current perception of the camera
#[derive(Clone, Debug)]
struct DirVecs {
    front: Vector3<f32>,
}

impl DirVecs {
    fn new(pitch: f32, yaw: f32) -> DirVecs {
        let front = Vector3::new(
            yaw.cos() * pitch.cos(),
            pitch.sin(),
            yaw.sin() * pitch.cos(),
        )
        .normalize();
        DirVecs { front }
    }
}

// orbits around a root point at a fixed distance
#[derive(Clone, Debug)]
pub struct OrbitCamera {
    // point the camera looks at
    root_pos: Point3<f32>,
    // world up
    worldup: Vector3<f32>,
    // distance from the root position
    offset: f32,
    pitch: f32,
    yaw: f32,
    // vertical field of view in radians
    fovy: f32,
    znear: f32,
    zfar: f32,
    changed: ChangeSignal,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        OrbitCamera::new()
    }
}

impl OrbitCamera {
    pub fn new() -> OrbitCamera {
        OrbitCamera {
            root_pos: Point3::origin(),
            worldup: Vector3::new(0.0, 1.0, 0.0),
            offset: 5.0,
            pitch: 0.0,
            yaw: 0.0,
            fovy: deg2rad(60.0),
            znear: 0.1,
            zfar: 1000.0,
            changed: ChangeSignal::default(),
        }
    }

    pub fn eye(&self) -> Point3<f32> {
        let vecs = DirVecs::new(self.pitch, self.yaw);
        self.root_pos - self.offset * vecs.front
    }

    pub fn root_position(&self) -> Point3<f32> {
        self.root_pos
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn offset(&self) -> f32 {
        self.offset
    }

    pub fn set_root_position(&mut self, pos: Point3<f32>) {
        if pos != self.root_pos {
            self.root_pos = pos;
            self.changed.raise();
        }
    }

    pub fn set_fovy(&mut self, fovy: f32) {
        if fovy != self.fovy {
            self.fovy = fovy;
            self.changed.raise();
        }
    }

    /// Rotates around the root point. Pitch stays within +-89 degrees.
    pub fn orbit(&mut self, dyaw: f32, dpitch: f32) {
        let yaw = self.yaw + dyaw;
        let pitch = (self.pitch + dpitch).clamp(-deg2rad(89.0), deg2rad(89.0));
        if yaw != self.yaw || pitch != self.pitch {
            self.yaw = yaw;
            self.pitch = pitch;
            self.changed.raise();
        }
    }

    // positive moves toward the root point
    pub fn zoom(&mut self, delta: f32) {
        let offset = (self.offset - delta).max(0.5);
        if offset != self.offset {
            self.offset = offset;
            self.changed.raise();
        }
    }
}

impl Camera for OrbitCamera {
    fn camera_to_world(&self) -> Matrix4<f32> {
        let view = Isometry3::look_at_rh(&self.eye(), &self.root_pos, &self.worldup);
        view.inverse().to_homogeneous()
    }

    fn projection(&self, aspect: f32) -> Matrix4<f32> {
        Perspective3::new(aspect, self.fovy, self.znear, self.zfar).to_homogeneous()
    }

    fn take_changed(&mut self) -> bool {
        self.changed.take()
    }
}
