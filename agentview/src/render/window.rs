//! The render window: item geometry, visible range and the two scroll pins.
//!
//! - Append-pin: items appended while the viewport sits at the bottom bring
//!   the new tail's bottom edge to the viewport's bottom edge.
//! - Growth-pin: an already measured item that changes size while the
//!   viewport sits at the bottom moves the viewport by exactly the delta.
//!
//! Corrections are never applied inside the triggering call. They are queued
//! on the frame scheduler and written in [`RenderWindow::on_frame`]; a newer
//! correction cancels and replaces the pending one, and entering a loading
//! state cancels it outright.

use std::collections::HashMap;
use std::ops::Range;

use super::{FrameHandle, FrameScheduler, ScrollBehavior, ScrollCommand, WindowConfig};

/// A deferred scroll write.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Correction {
    /// Align the tail item's bottom edge with the viewport's bottom edge.
    PinToBottom,
    /// Move the viewport by a measured size delta.
    ScrollBy(f64),
}

impl Correction {
    fn merge(self, next: Self) -> Self {
        match (self, next) {
            (Self::ScrollBy(a), Self::ScrollBy(b)) => Self::ScrollBy(a + b),
            _ => Self::PinToBottom,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Slot {
    height: f64,
    measured: bool,
}

#[derive(Debug)]
pub struct RenderWindow {
    config: WindowConfig,
    keys: Vec<String>,
    index: HashMap<String, usize>,
    slots: Vec<Slot>,
    /// `prefix[i]` is the bottom edge of item `i`.
    prefix: Vec<f64>,
    scroll_top: f64,
    viewport_height: f64,
    /// Bottom proximity as of the latest scroll, resize or measurement.
    /// Pin decisions read this before applying the mutation they react to.
    near_bottom: bool,
    loading: bool,
    scheduler: FrameScheduler<Correction>,
    pending: Option<(FrameHandle, Correction)>,
}

impl Default for RenderWindow {
    fn default() -> Self {
        Self::new(WindowConfig::default())
    }
}

impl RenderWindow {
    pub fn new(config: WindowConfig) -> Self {
        Self {
            config,
            keys: Vec::new(),
            index: HashMap::new(),
            slots: Vec::new(),
            prefix: Vec::new(),
            scroll_top: 0.0,
            viewport_height: 0.0,
            near_bottom: true,
            loading: false,
            scheduler: FrameScheduler::new(),
            pending: None,
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub const fn scroll_top(&self) -> f64 {
        self.scroll_top
    }

    pub const fn viewport_height(&self) -> f64 {
        self.viewport_height
    }

    pub const fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn total_height(&self) -> f64 {
        self.prefix.last().copied().unwrap_or(0.0)
    }

    /// Top edge of item `index`.
    pub fn item_offset(&self, index: usize) -> f64 {
        if index == 0 {
            0.0
        } else {
            self.prefix.get(index - 1).copied().unwrap_or_else(|| self.total_height())
        }
    }

    pub fn item_height(&self, key: &str) -> Option<f64> {
        self.index.get(key).map(|&i| self.slots[i].height)
    }

    pub fn has_pending_correction(&self) -> bool {
        self.pending.is_some()
    }

    /// Whether the viewport counts as being at the bottom. A pending
    /// correction will put it there, so it counts too.
    pub fn is_near_bottom(&self) -> bool {
        self.pending.is_some() || self.near_bottom
    }

    /// Items intersecting the viewport plus overscan.
    pub fn visible_range(&self) -> Range<usize> {
        if self.keys.is_empty() {
            return 0..0;
        }
        let lo = (self.scroll_top - self.config.overscan_px).max(0.0);
        let hi = self.scroll_top + self.viewport_height + self.config.overscan_px;
        let start = self.prefix.partition_point(|&bottom| bottom <= lo);
        let end = (self.prefix.partition_point(|&bottom| bottom < hi) + 1).min(self.keys.len());
        start.min(end)..end
    }

    /// Replace the item sequence. Known keys keep their heights.
    pub fn set_items(&mut self, keys: Vec<String>) {
        if keys == self.keys {
            return;
        }
        let was_near_bottom = self.is_near_bottom();
        let appended = keys.len() > self.keys.len() && keys.starts_with(&self.keys);

        let estimate = Slot {
            height: self.config.estimated_item_px,
            measured: false,
        };
        self.slots = keys
            .iter()
            .map(|key| self.index.get(key).map_or(estimate, |&i| self.slots[i]))
            .collect();
        self.index = keys
            .iter()
            .enumerate()
            .map(|(i, key)| (key.clone(), i))
            .collect();
        self.keys = keys;
        self.rebuild_prefix(0);
        self.scroll_top = self.clamp(self.scroll_top);

        if appended && was_near_bottom && !self.loading {
            self.request(Correction::PinToBottom);
        }
        self.observe();
    }

    /// Record the measured height of an item. Returns whether it changed.
    pub fn measure(&mut self, key: &str, height: f64) -> bool {
        let Some(&index) = self.index.get(key) else {
            tracing::debug!(key, "measurement for unknown item ignored");
            return false;
        };
        let height = height.max(0.0);
        let slot = self.slots[index];
        let delta = height - slot.height;
        let resized = delta.abs() >= f64::EPSILON;
        if slot.measured && !resized {
            return false;
        }

        let was_near_bottom = self.is_near_bottom();
        let above_viewport = self.item_offset(index) + slot.height <= self.scroll_top;

        self.slots[index] = Slot {
            height,
            measured: true,
        };
        self.rebuild_prefix(index);

        if resized && !self.loading {
            if was_near_bottom {
                self.request(if slot.measured {
                    Correction::ScrollBy(delta)
                } else {
                    Correction::PinToBottom
                });
            } else if !slot.measured && above_viewport {
                // Keep what is on screen where it was.
                self.request(Correction::ScrollBy(delta));
            }
        }
        self.observe();
        true
    }

    /// A scroll event from the host.
    pub fn on_scroll(&mut self, top: f64) {
        self.scroll_top = self.clamp(top);
        self.observe();
    }

    pub fn set_viewport_height(&mut self, height: f64) {
        let was_near_bottom = self.is_near_bottom();
        self.viewport_height = height.max(0.0);
        self.scroll_top = self.clamp(self.scroll_top);
        if was_near_bottom && !self.loading && !self.keys.is_empty() {
            self.request(Correction::PinToBottom);
        }
        self.observe();
    }

    /// History is being replaced; pending corrections refer to positions
    /// that are about to stop meaning anything.
    pub fn begin_loading(&mut self) {
        self.loading = true;
        let cancelled = self.scheduler.cancel_all();
        self.pending = None;
        if cancelled > 0 {
            tracing::debug!(cancelled, "pending scroll corrections cancelled by loading");
        }
    }

    /// Hydration finished: start at the newest content.
    pub fn end_loading(&mut self) {
        self.loading = false;
        if !self.keys.is_empty() {
            self.request(Correction::PinToBottom);
        }
    }

    /// Paint opportunity: apply the pending correction, if any.
    pub fn on_frame(&mut self) -> Option<ScrollCommand> {
        self.pending = None;
        let corrections = self.scheduler.drain();
        if corrections.is_empty() {
            return None;
        }
        let mut top = self.scroll_top;
        for correction in corrections {
            top = match correction {
                Correction::PinToBottom => self.max_scroll_top(),
                Correction::ScrollBy(delta) => top + delta,
            };
        }
        self.scroll_top = self.clamp(top);
        self.observe();
        Some(ScrollCommand {
            top: self.scroll_top,
            behavior: ScrollBehavior::Auto,
        })
    }

    fn request(&mut self, correction: Correction) {
        let correction = match self.pending.take() {
            Some((handle, previous)) => {
                self.scheduler.cancel(handle);
                previous.merge(correction)
            }
            None => correction,
        };
        let handle = self.scheduler.schedule(correction);
        self.pending = Some((handle, correction));
    }

    fn observe(&mut self) {
        let distance = self.max_scroll_top() - self.scroll_top;
        self.near_bottom = distance <= self.config.bottom_threshold_px;
    }

    fn max_scroll_top(&self) -> f64 {
        (self.total_height() - self.viewport_height).max(0.0)
    }

    fn clamp(&self, top: f64) -> f64 {
        top.max(0.0).min(self.max_scroll_top())
    }

    fn rebuild_prefix(&mut self, from: usize) {
        self.prefix.truncate(from);
        let mut bottom = self.prefix.last().copied().unwrap_or(0.0);
        for slot in &self.slots[from..] {
            bottom += slot.height;
            self.prefix.push(bottom);
        }
    }
}
