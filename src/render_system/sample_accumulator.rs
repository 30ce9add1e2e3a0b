use log::debug;

/// Counts the samples averaged into the current accumulation buffer and
/// decides when that average must restart. Notifications reset immediately.
#[derive(Debug)]
pub struct SampleAccumulator {
    current_sample: u32,
    // number of resets since creation
    resets: u64,
}

impl Default for SampleAccumulator {
    fn default() -> Self {
        SampleAccumulator::new()
    }
}

impl SampleAccumulator {
    pub fn new() -> SampleAccumulator {
        SampleAccumulator {
            current_sample: 0,
            resets: 0,
        }
    }

    pub fn current_sample(&self) -> u32 {
        self.current_sample
    }

    pub fn resets(&self) -> u64 {
        self.resets
    }

    /// Call once after a frame's dispatch and blend both succeeded.
    pub fn advance(&mut self) {
        self.current_sample = self.current_sample.saturating_add(1);
    }

    pub fn reset(&mut self) {
        self.current_sample = 0;
        self.resets += 1;
    }

    pub fn notify_resized(&mut self, resized: bool) {
        if resized {
            debug!("target resized, restarting accumulation");
            self.reset();
        }
    }

    /// `moved` must come from a consumed change signal so that one camera
    /// change resets exactly once.
    pub fn notify_camera_moved(&mut self, moved: bool) {
        if moved {
            debug!("camera moved, restarting accumulation");
            self.reset();
        }
    }
}
