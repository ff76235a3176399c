//! Input Event Handling
//!
//! Pointer input (mouse or touch) is queued as it arrives and drained once per
//! frame. Positions stay in client space here; they are mapped into raster
//! space at processing time because the canvas rectangle can change between
//! arrival and processing (zoom, window resize).

use std::collections::VecDeque;

/// A pointer input event
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    /// Client-space position; `None` when the platform gave no coordinates
    /// (for example a touch event with an empty touch list)
    pub position: Option<[f32; 2]>,
    /// Milliseconds since some reference point
    pub timestamp: f64,
    pub event_type: PointerEventType,
    pub source: PointerEventSource,
}

impl PointerEvent {
    pub fn mouse(event_type: PointerEventType, position: [f32; 2]) -> Self {
        Self {
            position: Some(position),
            timestamp: 0.0,
            event_type,
            source: PointerEventSource::Mouse,
        }
    }

    /// Touch event, taking the first touch point only
    pub fn touch(event_type: PointerEventType, touches: &[[f32; 2]]) -> Self {
        Self {
            position: touches.first().copied(),
            timestamp: 0.0,
            event_type,
            source: PointerEventSource::Touch,
        }
    }

    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = timestamp;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEventType {
    /// Button pressed or finger down
    Down,
    /// Pointer moved
    Move,
    /// Button released or finger lifted
    Up,
    /// Pointer left the canvas; ends a gesture like `Up`
    Leave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEventSource {
    Mouse,
    Touch,
}

/// Queue for pointer events between frames.
///
/// Moves outside a gesture are dropped at the door; nothing downstream
/// reacts to hover.
#[derive(Debug, Default)]
pub struct InputQueue {
    events: VecDeque<PointerEvent>,
    is_drawing: bool,
    last_position: Option<[f32; 2]>,
}

impl InputQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_event(&mut self, event: PointerEvent) {
        match event.event_type {
            PointerEventType::Down => {
                if event.position.is_none() {
                    return;
                }
                self.is_drawing = true;
            }
            PointerEventType::Move => {
                if !self.is_drawing || event.position.is_none() {
                    return;
                }
            }
            PointerEventType::Up | PointerEventType::Leave => {
                if !self.is_drawing {
                    return;
                }
                self.is_drawing = false;
            }
        }
        if event.position.is_some() {
            self.last_position = event.position;
        }

        self.events.push_back(event);
        log::trace!("Input event queued: {:?} (queue size: {})", event.event_type, self.events.len());
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = PointerEvent> + '_ {
        self.events.drain(..)
    }

    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    pub fn is_drawing(&self) -> bool {
        self.is_drawing
    }

    pub fn last_position(&self) -> Option<[f32; 2]> {
        self.last_position
    }

    /// Forget pending events and any gesture in progress
    pub fn reset(&mut self) {
        self.events.clear();
        self.is_drawing = false;
    }
}

/// Follows the finger that started a touch gesture.
///
/// Platforms report every finger as its own stream of started, moved and
/// ended events. Only the first active one drives the canvas; the others
/// are dropped until it lifts.
#[derive(Debug, Default)]
pub struct TouchTracker {
    active: Option<u64>,
}

impl TouchTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an event of `event_type` from finger `id` should be used
    pub fn accept(&mut self, id: u64, event_type: PointerEventType) -> bool {
        match event_type {
            PointerEventType::Down => {
                if self.active.is_some() {
                    log::trace!("Ignoring extra touch {}", id);
                    return false;
                }
                self.active = Some(id);
                true
            }
            PointerEventType::Move => self.active == Some(id),
            PointerEventType::Up | PointerEventType::Leave => {
                if self.active != Some(id) {
                    return false;
                }
                self.active = None;
                true
            }
        }
    }

    pub fn active(&self) -> Option<u64> {
        self.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hover_moves_are_dropped() {
        let mut queue = InputQueue::new();
        queue.push_event(PointerEvent::mouse(PointerEventType::Move, [1.0, 1.0]));
        assert!(!queue.has_events());

        queue.push_event(PointerEvent::mouse(PointerEventType::Down, [1.0, 1.0]));
        queue.push_event(PointerEvent::mouse(PointerEventType::Move, [2.0, 2.0]));
        queue.push_event(PointerEvent::mouse(PointerEventType::Up, [2.0, 2.0]));
        let kinds: Vec<_> = queue.drain_events().map(|e| e.event_type).collect();
        assert_eq!(
            kinds,
            vec![PointerEventType::Down, PointerEventType::Move, PointerEventType::Up]
        );
    }

    #[test]
    fn leave_without_gesture_is_ignored() {
        let mut queue = InputQueue::new();
        queue.push_event(PointerEvent::mouse(PointerEventType::Leave, [0.0, 0.0]));
        queue.push_event(PointerEvent::mouse(PointerEventType::Up, [0.0, 0.0]));
        assert!(!queue.has_events());
    }

    #[test]
    fn touch_uses_first_point_and_skips_empty_lists() {
        let event = PointerEvent::touch(PointerEventType::Down, &[[5.0, 6.0], [50.0, 60.0]]);
        assert_eq!(event.position, Some([5.0, 6.0]));
        assert_eq!(event.source, PointerEventSource::Touch);

        let mut queue = InputQueue::new();
        queue.push_event(PointerEvent::touch(PointerEventType::Down, &[]));
        assert!(!queue.has_events());
        assert!(!queue.is_drawing());

        queue.push_event(event);
        queue.push_event(PointerEvent::touch(PointerEventType::Up, &[]));
        assert_eq!(queue.drain_events().count(), 2);
        assert_eq!(queue.last_position(), Some([5.0, 6.0]));
    }

    #[test]
    fn second_finger_is_ignored_until_the_first_lifts() {
        let mut touches = TouchTracker::new();
        assert!(touches.accept(1, PointerEventType::Down));
        assert!(!touches.accept(2, PointerEventType::Down));
        assert!(touches.accept(1, PointerEventType::Move));
        assert!(!touches.accept(2, PointerEventType::Move));
        assert!(!touches.accept(2, PointerEventType::Up));
        assert_eq!(touches.active(), Some(1));
        assert!(touches.accept(1, PointerEventType::Up));
        assert_eq!(touches.active(), None);

        // The other finger's leftovers do not start anything
        assert!(!touches.accept(2, PointerEventType::Move));
        assert!(touches.accept(2, PointerEventType::Down));
        assert!(touches.accept(2, PointerEventType::Leave));
        assert_eq!(touches.active(), None);
    }
}
