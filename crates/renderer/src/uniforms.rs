use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use bytemuck::{Pod, Zeroable};
use winit::dpi::PhysicalSize;

use crate::error::RenderError;
use crate::scene::Camera;

/// Uniform name the fragment program reads elapsed seconds from.
pub const TIME_UNIFORM: &str = "u_time";
/// Uniform name the fragment program reads the logical viewport size from.
pub const RESOLUTION_UNIFORM: &str = "u_resolution";

/// Values the draw call observes for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformSnapshot {
    pub time: f64,
    pub resolution: (u32, u32),
}

/// Accepted write, reported to the observer hook.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformChange {
    Time(f64),
    Resolution(u32, u32),
}

type Observer = Box<dyn FnMut(UniformChange)>;

/// Mutable record shared by the loop driver (time), the resize synchronizer
/// (resolution) and the draw call (reader).
///
/// Rejected writes leave the previous value in place so the shader never sees
/// garbage.
pub struct UniformState {
    time: f64,
    resolution: (u32, u32),
    observer: Option<Observer>,
}

impl UniformState {
    pub fn new(resolution: (u32, u32)) -> Result<Self, RenderError> {
        validate_resolution(resolution.0, resolution.1)?;
        Ok(Self {
            time: 0.0,
            resolution,
            observer: None,
        })
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    pub fn snapshot(&self) -> UniformSnapshot {
        UniformSnapshot {
            time: self.time,
            resolution: self.resolution,
        }
    }

    pub fn set_time(&mut self, seconds: f64) -> Result<(), RenderError> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(RenderError::InvalidUniformValue {
                name: TIME_UNIFORM,
                reason: format!("{seconds} is not a non-negative finite time"),
            });
        }
        if seconds < self.time {
            return Err(RenderError::InvalidUniformValue {
                name: TIME_UNIFORM,
                reason: format!("{seconds} is earlier than the current {}", self.time),
            });
        }
        self.time = seconds;
        self.notify(UniformChange::Time(seconds));
        Ok(())
    }

    pub fn set_resolution(&mut self, width: u32, height: u32) -> Result<(), RenderError> {
        validate_resolution(width, height)?;
        self.resolution = (width, height);
        self.notify(UniformChange::Resolution(width, height));
        Ok(())
    }

    /// Installs the instrumentation hook. The observer runs while the state is
    /// borrowed and must not write back into it.
    pub fn observe(&mut self, observer: impl FnMut(UniformChange) + 'static) {
        self.observer = Some(Box::new(observer));
    }

    fn notify(&mut self, change: UniformChange) {
        if let Some(observer) = self.observer.as_mut() {
            observer(change);
        }
    }
}

impl fmt::Debug for UniformState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UniformState")
            .field("time", &self.time)
            .field("resolution", &self.resolution)
            .field("observed", &self.observer.is_some())
            .finish()
    }
}

fn validate_resolution(width: u32, height: u32) -> Result<(), RenderError> {
    if width == 0 || height == 0 {
        return Err(RenderError::InvalidUniformValue {
            name: RESOLUTION_UNIFORM,
            reason: format!("{width}x{height} has a zero dimension"),
        });
    }
    Ok(())
}

/// Shared, single-threaded handle to the live [`UniformState`].
#[derive(Clone, Debug)]
pub struct UniformHandle(Rc<RefCell<UniformState>>);

impl UniformHandle {
    pub fn new(state: UniformState) -> Self {
        Self(Rc::new(RefCell::new(state)))
    }

    pub fn set_time(&self, seconds: f64) -> Result<(), RenderError> {
        self.0.borrow_mut().set_time(seconds)
    }

    pub fn set_resolution(&self, width: u32, height: u32) -> Result<(), RenderError> {
        self.0.borrow_mut().set_resolution(width, height)
    }

    pub fn snapshot(&self) -> UniformSnapshot {
        self.0.borrow().snapshot()
    }

    pub fn observe(&self, observer: impl FnMut(UniformChange) + 'static) {
        self.0.borrow_mut().observe(observer);
    }

    /// True when both handles point at the same state.
    pub fn shares_state_with(&self, other: &UniformHandle) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// GPU-side layout of the frame uniform block.
///
/// Must match `BackdropFrame` in the shader prologue (std140): a mat4 followed
/// by `vec2 resolution`, `float time`, `float physical_height`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub(crate) struct FrameUniforms {
    pub view_projection: [[f32; 4]; 4],
    pub resolution: [f32; 2],
    pub time: f32,
    pub physical_height: f32,
}

impl FrameUniforms {
    pub fn new(camera: &Camera, snapshot: &UniformSnapshot, physical: PhysicalSize<u32>) -> Self {
        Self {
            view_projection: camera.view_projection(),
            resolution: [snapshot.resolution.0 as f32, snapshot.resolution.1 as f32],
            time: snapshot.time as f32,
            physical_height: physical.height.max(1) as f32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_negative_and_decreasing_time() {
        let mut state = UniformState::new((800, 600)).unwrap();
        state.set_time(1.5).unwrap();

        assert!(state.set_time(-0.1).is_err());
        assert_eq!(state.time(), 1.5);

        let err = state.set_time(1.0).unwrap_err();
        assert!(matches!(
            err,
            RenderError::InvalidUniformValue { name: TIME_UNIFORM, .. }
        ));
        assert_eq!(state.time(), 1.5);

        assert!(state.set_time(f64::NAN).is_err());
        assert_eq!(state.time(), 1.5);

        state.set_time(1.5).unwrap();
        state.set_time(2.0).unwrap();
        assert_eq!(state.time(), 2.0);
    }

    #[test]
    fn rejects_zero_resolution_and_keeps_last_value() {
        let mut state = UniformState::new((800, 600)).unwrap();
        assert!(state.set_resolution(0, 600).is_err());
        assert!(state.set_resolution(1024, 0).is_err());
        assert_eq!(state.resolution(), (800, 600));

        state.set_resolution(1024, 768).unwrap();
        assert_eq!(state.snapshot().resolution, (1024, 768));
    }

    #[test]
    fn initial_resolution_must_be_positive() {
        assert!(UniformState::new((0, 0)).is_err());
    }

    #[test]
    fn observer_sees_only_accepted_changes() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let handle = UniformHandle::new(UniformState::new((10, 10)).unwrap());
        let sink = seen.clone();
        handle.observe(move |change| sink.borrow_mut().push(change));

        handle.set_time(0.5).unwrap();
        let _ = handle.set_time(0.25);
        handle.set_resolution(20, 30).unwrap();
        let _ = handle.set_resolution(0, 30);

        assert_eq!(
            *seen.borrow(),
            vec![UniformChange::Time(0.5), UniformChange::Resolution(20, 30)]
        );
    }

    #[test]
    fn frame_block_is_std140_sized() {
        assert_eq!(std::mem::size_of::<FrameUniforms>(), 80);
        let snapshot = UniformSnapshot {
            time: 2.5,
            resolution: (640, 480),
        };
        let block = FrameUniforms::new(&Camera::fixed(), &snapshot, PhysicalSize::new(1280, 960));
        assert_eq!(block.resolution, [640.0, 480.0]);
        assert_eq!(block.time, 2.5);
        assert_eq!(block.physical_height, 960.0);
        assert_eq!(block.view_projection[0][0], 1.0);
    }
}
