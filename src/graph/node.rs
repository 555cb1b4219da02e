/// Context passed to nodes during rendering
///
/// Contains information about what to render:
/// - sample_rate: Audio sample rate (e.g., 48000.0)
/// - time: Engine time of the first frame in the block, in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderCtx {
    pub sample_rate: f32,
    pub time: f64,
}

impl RenderCtx {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            time: 0.0,
        }
    }

    /// Same context, starting at `time`.
    pub fn at(self, time: f64) -> Self {
        Self { time, ..self }
    }

    /// Seconds between two frames.
    #[inline]
    pub fn dt(&self) -> f64 {
        1.0 / self.sample_rate as f64
    }
}

/// Trait for nodes whose parameters the modulation matrix can move
///
/// `value` is the absolute, already-clamped destination value; the node
/// decides how to glide there from `now`.
pub trait Modulatable: Send {
    type Param: Copy + Send;

    fn get_param(&self, param: Self::Param) -> f32;

    fn apply_modulation(&mut self, param: Self::Param, value: f32, now: f64);
}

/// Core trait for mono audio nodes
///
/// Nodes render into `out` starting at `ctx.time` and report when they
/// have nothing left to play.
pub trait GraphNode: Send {
    fn render_block(&mut self, out: &mut [f32], ctx: &RenderCtx);

    /// Check if this node is still producing sound
    fn is_active(&self) -> bool {
        true
    }
}

/// Stereo counterpart of `GraphNode` for voices and buses.
///
/// Sources (voices, the drum bus) add into `left`/`right`; processors
/// (FX, master) transform the buffers in place.
pub trait StereoNode: Send {
    fn render_stereo(&mut self, left: &mut [f32], right: &mut [f32], ctx: &RenderCtx);
}
