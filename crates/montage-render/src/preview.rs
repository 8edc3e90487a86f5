//! Live preview: a playback clock and an async loop that renders frames.

use std::sync::Arc;
use std::time::Duration;

use montage_core::{CancelToken, FrameBuffer, FrameRate, RationalTime, Resolution};
use montage_timeline::Project;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error};

use crate::compositor::Compositor;

/// Playhead that moves with wall-clock time while playing.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackClock {
    position: RationalTime,
    duration: RationalTime,
    frame_rate: FrameRate,
    playing: bool,
    rate: f64,
    looping: bool,
}

impl PlaybackClock {
    pub fn new(duration: RationalTime, frame_rate: FrameRate) -> Self {
        Self {
            position: RationalTime::ZERO,
            duration,
            frame_rate,
            playing: false,
            rate: 1.0,
            looping: false,
        }
    }

    pub fn for_project(project: &Project) -> Self {
        Self::new(project.duration(), project.frame_rate)
    }

    pub fn play(&mut self) {
        if !self.looping && self.rate >= 0.0 && self.position >= self.duration {
            self.position = RationalTime::ZERO;
        }
        self.playing = true;
    }

    pub fn pause(&mut self) {
        self.playing = false;
    }

    pub fn toggle(&mut self) {
        if self.playing {
            self.pause();
        } else {
            self.play();
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Playback speed multiplier. Negative plays backwards.
    pub fn set_rate(&mut self, rate: f64) {
        if rate.is_finite() {
            self.rate = rate;
        }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn set_duration(&mut self, duration: RationalTime) {
        self.duration = duration;
        self.position = self.clamp(self.position);
    }

    /// Move the playhead, clamped to the timeline.
    pub fn seek(&mut self, time: RationalTime) {
        self.position = self.clamp(time);
    }

    pub fn position(&self) -> RationalTime {
        self.position
    }

    /// Playhead snapped down to the start of its frame.
    pub fn frame_time(&self) -> RationalTime {
        let index = self.position.to_frames(self.frame_rate).max(0) as u64;
        self.frame_rate.frame_time(index)
    }

    fn clamp(&self, time: RationalTime) -> RationalTime {
        time.max(RationalTime::ZERO).min(self.duration)
    }

    /// Advance by `elapsed` wall-clock time times the playback rate.
    ///
    /// Reaching either end pauses playback unless looping, which wraps.
    pub fn advance(&mut self, elapsed: Duration) {
        if !self.playing {
            return;
        }
        let delta = RationalTime::from_seconds_f64(elapsed.as_secs_f64() * self.rate);
        let next = self.position + delta;

        if !self.duration.is_positive() {
            self.position = RationalTime::ZERO;
            self.playing = false;
            return;
        }
        if next > self.duration || next.is_negative() {
            if self.looping {
                let secs = next.to_seconds_f64().rem_euclid(self.duration.to_seconds_f64());
                self.position = self.clamp(RationalTime::from_seconds_f64(secs));
            } else {
                self.position = self.clamp(next);
                self.playing = false;
            }
        } else {
            self.position = next;
            if next == self.duration && !self.looping {
                self.playing = false;
            }
        }
    }
}

/// A rendered preview frame.
#[derive(Debug, Clone)]
pub struct PreviewFrame {
    pub time: RationalTime,
    pub frame: FrameBuffer,
}

/// Counters for one preview run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreviewStats {
    pub rendered: u64,
    pub delivered: u64,
    /// Frames finished after the run was cancelled.
    pub discarded: u64,
}

/// Drives the compositor from a [`PlaybackClock`].
#[derive(Debug)]
pub struct PreviewDriver {
    compositor: Arc<Compositor>,
    project: Arc<Project>,
    clock: PlaybackClock,
    resolution: Resolution,
    cancel: CancelToken,
}

impl PreviewDriver {
    pub fn new(compositor: Arc<Compositor>, project: Arc<Project>, cancel: CancelToken) -> Self {
        let clock = PlaybackClock::for_project(&project);
        let resolution = project.resolution;
        Self {
            compositor,
            project,
            clock,
            resolution,
            cancel,
        }
    }

    /// Preview at a different size than the project.
    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut PlaybackClock {
        &mut self.clock
    }

    /// Swap in an edited project, keeping the playhead where possible.
    pub fn set_project(&mut self, project: Arc<Project>) {
        self.clock.set_duration(project.duration());
        self.project = project;
    }

    /// Advance the clock and render synchronously.
    pub fn step(&mut self, elapsed: Duration) -> PreviewFrame {
        self.clock.advance(elapsed);
        let time = self.clock.frame_time();
        PreviewFrame {
            time,
            frame: self
                .compositor
                .render_frame_at(&self.project, time, self.resolution),
        }
    }

    /// Play from the current position, rendering one frame per `period`.
    ///
    /// Stops when playback reaches the end (unless looping) or the cancel
    /// token fires. The token is checked before and after each render; a
    /// frame that finishes after cancellation is dropped.
    pub async fn run<F>(mut self, period: Duration, mut on_frame: F) -> PreviewStats
    where
        F: FnMut(PreviewFrame),
    {
        let mut stats = PreviewStats::default();
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.clock.play();
        let mut last_tick = None;

        loop {
            let tick = ticker.tick().await;
            if self.cancel.is_cancelled() {
                break;
            }
            if let Some(last) = last_tick {
                self.clock.advance(tick - last);
            }
            last_tick = Some(tick);

            let time = self.clock.frame_time();
            let compositor = Arc::clone(&self.compositor);
            let project = Arc::clone(&self.project);
            let resolution = self.resolution;
            let rendered = tokio::task::spawn_blocking(move || {
                compositor.render_frame_at(&project, time, resolution)
            })
            .await;
            let frame = match rendered {
                Ok(frame) => frame,
                Err(e) => {
                    error!(error = %e, "Preview render task failed");
                    break;
                }
            };
            stats.rendered += 1;

            if self.cancel.is_cancelled() {
                stats.discarded += 1;
                break;
            }
            on_frame(PreviewFrame { time, frame });
            stats.delivered += 1;

            if !self.clock.is_playing() {
                break;
            }
        }

        debug!(
            rendered = stats.rendered,
            delivered = stats.delivered,
            discarded = stats.discarded,
            "Preview stopped"
        );
        stats
    }
}
