//! # Sample Buffer Module
//!
//! Bounded sliding-window storage for live display: one value window per
//! sensor channel plus a shared derived time axis. This is a bounded view of
//! the backend's full history, not a cache of it — exports always go back to
//! the backend, never to this buffer.
//!
//! The time axis is derived, not measured: each accepted frame gets
//! `frames_seen * poll_interval_secs`. The counter is append-only (eviction
//! does not decrement it), so displayed time keeps advancing past the window.

use crate::channel::{Channel, CHANNEL_COUNT};
use std::collections::{HashSet, VecDeque};

/// One channel's renderable slice of the window, paired with its time axis.
pub struct SeriesView {
    pub channel: Channel,
    pub time: Vec<f64>,
    pub values: Vec<f64>,
}

/// Fixed-capacity sliding window over the live telemetry stream.
///
/// Invariant: the time axis and every channel window have equal length after
/// every `append` and every eviction. Capacity is fixed at construction.
pub struct SampleBuffer {
    time: VecDeque<f64>,
    values: [VecDeque<f64>; CHANNEL_COUNT],
    max_points: usize,
    interval_secs: f64,
    frames_seen: u64,
}

impl SampleBuffer {
    pub fn new(max_points: usize, interval_secs: f64) -> Self {
        Self {
            time: VecDeque::new(),
            values: std::array::from_fn(|_| VecDeque::new()),
            max_points,
            interval_secs,
            frames_seen: 0,
        }
    }

    /// Append one frame of at least `CHANNEL_COUNT` values.
    ///
    /// Returns the derived time of the accepted frame, or `None` if the
    /// frame is too short (the caller skips the tick). Extra trailing values
    /// beyond the channel count are ignored.
    pub fn append(&mut self, frame: &[f64]) -> Option<f64> {
        if frame.len() < CHANNEL_COUNT {
            return None;
        }

        let time_sec = self.frames_seen as f64 * self.interval_secs;
        self.frames_seen += 1;

        self.time.push_back(time_sec);
        for (window, value) in self.values.iter_mut().zip(frame.iter()) {
            window.push_back(*value);
        }

        // Drop-oldest eviction, applied to the time axis and every channel
        // with the same removal count so index alignment is preserved
        while self.time.len() > self.max_points {
            self.time.pop_front();
        }
        for window in self.values.iter_mut() {
            while window.len() > self.max_points {
                window.pop_front();
            }
        }

        Some(time_sec)
    }

    /// Number of frames currently held in the window.
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Derived time of the newest retained frame.
    pub fn last_time(&self) -> Option<f64> {
        self.time.back().copied()
    }

    /// Most recent value for a channel, if any frame has been accepted.
    pub fn latest(&self, channel: Channel) -> Option<f64> {
        self.values[channel.index()].back().copied()
    }

    /// Display label for a channel's current value, fixed 3-decimal
    /// precision with a zero placeholder before the first frame.
    pub fn current_label(&self, channel: Channel) -> String {
        match self.latest(channel) {
            Some(v) => format!("{:.3}", v),
            None => "0.000".to_string(),
        }
    }

    /// Renderable (time, values) pairs for the visible channels.
    ///
    /// Each pair is truncated to the shorter of the time axis and the
    /// channel window, so a render triggered mid-append never sees
    /// mismatched lengths. Empty channels are omitted.
    pub fn visible_series(&self, visible: &HashSet<usize>) -> Vec<SeriesView> {
        let mut series = Vec::new();
        for channel in Channel::all() {
            let idx = channel.index();
            if !visible.contains(&idx) {
                continue;
            }
            let window = &self.values[idx];
            if window.is_empty() {
                continue;
            }
            let limit = self.time.len().min(window.len());
            series.push(SeriesView {
                channel,
                time: self.time.iter().take(limit).copied().collect(),
                values: window.iter().take(limit).copied().collect(),
            });
        }
        series
    }

    /// Clear all windows, the time axis, and the frame counter.
    pub fn reset(&mut self) {
        self.time.clear();
        for window in self.values.iter_mut() {
            window.clear();
        }
        self.frames_seen = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_of(v: f64) -> Vec<f64> {
        vec![v; CHANNEL_COUNT]
    }

    fn all_visible() -> HashSet<usize> {
        (0..CHANNEL_COUNT).collect()
    }

    #[test]
    fn test_lengths_stay_aligned_across_appends() {
        let mut buffer = SampleBuffer::new(5, 0.25);
        for i in 0..12 {
            buffer.append(&frame_of(i as f64));
            for channel in Channel::all() {
                assert_eq!(buffer.values[channel.index()].len(), buffer.time.len());
            }
        }
    }

    #[test]
    fn test_eviction_keeps_most_recent_in_order() {
        let mut buffer = SampleBuffer::new(3, 0.25);
        for i in 0..5 {
            buffer.append(&frame_of(i as f64));
        }
        assert_eq!(buffer.len(), 3);
        let series = buffer.visible_series(&all_visible());
        assert_eq!(series[0].values, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_window_of_1500_after_1501_appends() {
        let mut buffer = SampleBuffer::new(1500, 0.25);
        for i in 0..1501 {
            buffer.append(&frame_of(i as f64));
        }
        assert_eq!(buffer.len(), 1500);
        let series = buffer.visible_series(&all_visible());
        // Frame 0 evicted, frame 1500 present
        assert_eq!(series[0].values[0], 1.0);
        assert_eq!(*series[0].values.last().unwrap(), 1500.0);
        // Time axis keeps counting past the window
        assert_eq!(buffer.last_time(), Some(1500.0 * 0.25));
    }

    #[test]
    fn test_short_frame_rejected_without_mutation() {
        let mut buffer = SampleBuffer::new(10, 0.25);
        buffer.append(&frame_of(1.0));
        assert!(buffer.append(&[1.0, 2.0]).is_none());
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.last_time(), Some(0.0));
    }

    #[test]
    fn test_extra_values_ignored() {
        let mut buffer = SampleBuffer::new(10, 0.25);
        let mut frame = frame_of(7.0);
        frame.push(99.0); // trailing state/level fields from the wire
        frame.push(98.0);
        assert!(buffer.append(&frame).is_some());
        assert_eq!(buffer.latest(Channel::VocMics), Some(7.0));
    }

    #[test]
    fn test_visible_series_truncates_on_mismatch() {
        let mut buffer = SampleBuffer::new(10, 0.25);
        buffer.append(&frame_of(1.0));
        buffer.append(&frame_of(2.0));
        // Simulate a render caught mid-append: one channel short by one
        buffer.values[0].pop_back();
        let visible: HashSet<usize> = [0].into_iter().collect();
        let series = buffer.visible_series(&visible);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].time.len(), 1);
        assert_eq!(series[0].values.len(), 1);
    }

    #[test]
    fn test_visibility_set_filters_channels() {
        let mut buffer = SampleBuffer::new(10, 0.25);
        buffer.append(&frame_of(1.0));
        let visible: HashSet<usize> = [0, 4].into_iter().collect();
        let series = buffer.visible_series(&visible);
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].channel, Channel::No2Multi);
        assert_eq!(series[1].channel, Channel::CoMics);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut buffer = SampleBuffer::new(10, 0.25);
        for i in 0..4 {
            buffer.append(&frame_of(i as f64));
        }
        buffer.reset();
        assert!(buffer.is_empty());
        buffer.reset();
        assert!(buffer.is_empty());
        // Counter restarts, so the derived axis starts from zero again
        assert_eq!(buffer.append(&frame_of(9.0)), Some(0.0));
    }

    #[test]
    fn test_current_label_formatting() {
        let mut buffer = SampleBuffer::new(10, 0.25);
        assert_eq!(buffer.current_label(Channel::No2Multi), "0.000");
        let mut frame = frame_of(0.0);
        frame[0] = 1.23456;
        buffer.append(&frame);
        assert_eq!(buffer.current_label(Channel::No2Multi), "1.235");
        assert_eq!(buffer.current_label(Channel::CoMics), "0.000");
    }
}
