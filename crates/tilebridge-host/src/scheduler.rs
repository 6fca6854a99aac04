//! The per-frame loop.
//!
//! The first frame prepares the surface, constructs the guest and installs
//! input listeners, in that order. Every frame, the first included, then
//! makes exactly one `tick` call with the frame's timestamp.

use std::collections::VecDeque;
use std::thread;
use std::time::{Duration, Instant};

use tilebridge_types::{BridgeError, BridgeResult};

use crate::dispatch::EventDispatcher;
use crate::dom::Document;
use crate::services::HostServices;
use crate::session::BridgeSession;
use crate::surface::Canvas2d;

/// Supplies frame timestamps in milliseconds. `None` ends the loop.
pub trait FrameSource {
    fn next_frame(&mut self) -> Option<f64>;
}

/// Real-time frames at a fixed refresh interval. Runs forever unless
/// given a frame budget.
#[derive(Debug, Clone)]
pub struct VsyncClock {
    origin: Instant,
    interval: Duration,
    deadline: Instant,
    remaining: Option<usize>,
}

impl VsyncClock {
    pub fn new(interval_ms: f64) -> Self {
        let origin = Instant::now();
        let interval = Duration::from_secs_f64(interval_ms.max(0.0) / 1000.0);
        Self {
            origin,
            interval,
            deadline: origin + interval,
            remaining: None,
        }
    }

    /// Stop after `frames` more frames.
    pub fn with_limit(mut self, frames: usize) -> Self {
        self.remaining = Some(frames);
        self
    }

    pub fn interval_ms(&self) -> f64 {
        self.interval.as_secs_f64() * 1000.0
    }
}

impl FrameSource for VsyncClock {
    fn next_frame(&mut self) -> Option<f64> {
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining = remaining.checked_sub(1)?;
        }
        let now = Instant::now();
        if now < self.deadline {
            thread::sleep(self.deadline - now);
        }
        let fired = Instant::now();
        // A late frame pushes the next deadline out rather than bunching.
        self.deadline = (self.deadline + self.interval).max(fired);
        Some(fired.duration_since(self.origin).as_secs_f64() * 1000.0)
    }
}

/// A fixed list of timestamps.
#[derive(Debug, Clone, Default)]
pub struct ScriptedFrames {
    frames: VecDeque<f64>,
}

impl ScriptedFrames {
    pub fn new(frames: impl IntoIterator<Item = f64>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }

    /// `count` frames spaced `interval_ms` apart, starting at `interval_ms`.
    pub fn every(interval_ms: f64, count: usize) -> Self {
        Self::new((1..=count).map(|i| i as f64 * interval_ms))
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for ScriptedFrames {
    fn next_frame(&mut self) -> Option<f64> {
        self.frames.pop_front()
    }
}

/// Drives construction and ticking, and owns the event dispatcher whose
/// listeners it installs.
#[derive(Debug, Default)]
pub struct AnimationScheduler {
    dispatcher: EventDispatcher,
    started: bool,
    frames: u64,
}

impl AnimationScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    /// Frames run so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Run one frame.
    pub fn on_frame<C, D>(
        &mut self,
        session: &mut BridgeSession<HostServices<C, D>>,
        timestamp_ms: f64,
    ) -> BridgeResult<()>
    where
        C: Canvas2d + 'static,
        D: Document + 'static,
    {
        self.frames += 1;
        if !self.started {
            self.started = true;
            let services = session.services_mut().ok_or(BridgeError::NotLoaded)?;
            services.surface.clear();
            services.surface.draw_grid();
            let geometry = *services.surface.geometry();
            let handle = session.construct(geometry.width_cells, geometry.height_cells)?;
            self.dispatcher.install(handle);
        }
        let handle = session.handle().ok_or(BridgeError::NotConstructed)?;
        session.tick(handle, timestamp_ms)
    }

    /// Run frames until `frames` is exhausted. A failed frame is logged
    /// and the next one still runs. Returns the number of frames run.
    pub fn run<C, D>(
        &mut self,
        session: &mut BridgeSession<HostServices<C, D>>,
        frames: &mut impl FrameSource,
    ) -> usize
    where
        C: Canvas2d + 'static,
        D: Document + 'static,
    {
        let mut count = 0;
        while let Some(timestamp) = frames.next_frame() {
            if let Err(err) = self.on_frame(session, timestamp) {
                log::warn!("frame at {timestamp:.3}ms failed: [{}] {err}", err.code());
            }
            count += 1;
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_frames_every() {
        let mut frames = ScriptedFrames::every(16.0, 3);
        assert_eq!(frames.remaining(), 3);
        assert_eq!(frames.next_frame(), Some(16.0));
        assert_eq!(frames.next_frame(), Some(32.0));
        assert_eq!(frames.next_frame(), Some(48.0));
        assert_eq!(frames.next_frame(), None);
    }

    #[test]
    fn test_vsync_clock_is_monotonic() {
        let mut clock = VsyncClock::new(1.0);
        let a = clock.next_frame().unwrap();
        let b = clock.next_frame().unwrap();
        assert!(a >= 1.0);
        assert!(b >= a);
    }

    #[test]
    fn test_vsync_clock_limit() {
        let mut clock = VsyncClock::new(1.0).with_limit(2);
        assert!(clock.next_frame().is_some());
        assert!(clock.next_frame().is_some());
        assert_eq!(clock.next_frame(), None);
        assert_eq!(clock.next_frame(), None);
    }
}
