//! Distance ranging overlays
//!
//! A ranging line places a small marker on every vertex and a floating label
//! with the running distance next to it. Finishing the line adds a total
//! label and a dismiss control; the line and all of its overlays are then
//! removed together.

use crate::{
    core::geo::{distance_km, LngLat},
    traits::{EventTarget, ListenerId, MapEngine, Overlay, OverlayContent, OverlayId},
};
use fxhash::FxHashMap;
use serde_json::json;

/// Label shown on the first vertex
pub const START_LABEL: &str = "start";

const LABEL_OFFSET: (f64, f64) = (20.0, 20.0);
const DISMISS_OFFSET: (f64, f64) = (-26.0, 0.0);

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Human readable distance; meters below one kilometer
pub fn format_distance(km: f64) -> String {
    if km < 1.0 {
        format!("{} m", (km * 1000.0).round())
    } else {
        format!("{} km", km)
    }
}

/// Running measurement of a line that is still being drawn
#[derive(Debug, Default)]
pub struct RangingSession {
    last: Option<LngLat>,
    total_km: f64,
    segments_km: Vec<f64>,
    overlays: Vec<OverlayId>,
}

impl RangingSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cumulative distance, rounded to two decimals at every step
    pub fn total_km(&self) -> f64 {
        self.total_km
    }

    /// Increment each label added over the previous one
    pub fn segments_km(&self) -> &[f64] {
        &self.segments_km
    }

    /// Marks a new vertex and labels it with the running distance
    pub fn add_vertex(&mut self, engine: &mut dyn MapEngine, at: LngLat) {
        self.overlays
            .push(engine.add_overlay(Overlay::new(at, OverlayContent::RangingPoint)));

        let label = match self.last {
            None => Overlay::new(at, OverlayContent::RangingText(START_LABEL.to_string())),
            Some(previous) => {
                let total = round2(self.total_km + distance_km(previous, at));
                let segment = total - self.total_km;
                self.total_km = total;
                self.segments_km.push(segment);
                Overlay::new(at, OverlayContent::RangingText(format_distance(total)))
                    .with_options(json!({"segment": segment, "total": total}))
            }
        };
        self.overlays.push(
            engine.add_overlay(label.with_offset(LABEL_OFFSET.0, LABEL_OFFSET.1)),
        );
        self.last = Some(at);
    }

    /// Adds the total label and the dismiss control at the final vertex
    pub fn finish(mut self, engine: &mut dyn MapEngine, at: LngLat) -> RangedLine {
        let total = Overlay::new(
            at,
            OverlayContent::RangingText(format!("total: {}", format_distance(self.total_km))),
        )
        .with_offset(LABEL_OFFSET.0, LABEL_OFFSET.1)
        .with_options(json!({"total": self.total_km}));
        self.overlays.push(engine.add_overlay(total));

        let dismiss = engine.add_overlay(
            Overlay::new(at, OverlayContent::RangingDismiss)
                .with_offset(DISMISS_OFFSET.0, DISMISS_OFFSET.1),
        );
        let listener = engine.on("click", &EventTarget::Overlay(dismiss));
        self.overlays.push(dismiss);
        RangedLine {
            total_km: self.total_km,
            segments_km: self.segments_km,
            overlays: self.overlays,
            dismiss,
            listener,
        }
    }

    /// Removes every overlay placed so far
    pub fn discard(self, engine: &mut dyn MapEngine) {
        for overlay in self.overlays {
            engine.remove_overlay(overlay);
        }
    }
}

/// Overlays of a finished ranging line
#[derive(Debug, Clone)]
pub struct RangedLine {
    pub total_km: f64,
    pub segments_km: Vec<f64>,
    pub overlays: Vec<OverlayId>,
    pub dismiss: OverlayId,
    listener: ListenerId,
}

/// Finished ranging lines keyed by feature id
#[derive(Debug, Default)]
pub struct RangingRegistry {
    lines: FxHashMap<String, RangedLine>,
}

impl RangingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, feature_id: impl Into<String>, line: RangedLine) {
        self.lines.insert(feature_id.into(), line);
    }

    pub fn get(&self, feature_id: &str) -> Option<&RangedLine> {
        self.lines.get(feature_id)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Feature whose dismiss control owns `listener`
    pub fn feature_for_listener(&self, listener: ListenerId) -> Option<String> {
        self.lines
            .iter()
            .find(|(_, line)| line.listener == listener)
            .map(|(id, _)| id.clone())
    }

    /// Drops the overlays and the dismiss listener of one line
    pub fn remove(&mut self, engine: &mut dyn MapEngine, feature_id: &str) -> bool {
        let Some(line) = self.lines.remove(feature_id) else {
            return false;
        };
        engine.off(line.listener);
        for overlay in line.overlays {
            engine.remove_overlay(overlay);
        }
        log::debug!("removed ranging overlays of `{}`", feature_id);
        true
    }

    /// Unbinds every dismiss listener, leaving the overlays to the engine
    pub fn detach(&mut self, engine: &mut dyn MapEngine) {
        for (_, line) in self.lines.drain() {
            engine.off(line.listener);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingEngine;

    #[test]
    fn test_format_distance() {
        assert_eq!(format_distance(0.57), "570 m");
        assert_eq!(format_distance(1.25), "1.25 km");
        assert_eq!(format_distance(0.0), "0 m");
    }

    #[test]
    fn test_session_labels_and_dismiss() {
        let mut engine = RecordingEngine::new();
        let probe = engine.probe();
        let mut session = RangingSession::new();
        session.add_vertex(&mut engine, LngLat::new(0.0, 0.0));
        session.add_vertex(&mut engine, LngLat::new(0.01, 0.0));
        assert_eq!(probe.overlay_count(), 4);
        assert_eq!(session.segments_km().len(), 1);

        let line = session.finish(&mut engine, LngLat::new(0.01, 0.0));
        assert_eq!(probe.overlay_count(), 6);
        assert_eq!(line.overlays.len(), 6);
        assert_eq!(probe.listener_count(), 1);

        let mut registry = RangingRegistry::new();
        let listener = line.listener;
        registry.insert("line", line);
        assert_eq!(registry.feature_for_listener(listener).as_deref(), Some("line"));
        assert!(registry.remove(&mut engine, "line"));
        assert_eq!(probe.overlay_count(), 0);
        assert_eq!(probe.listener_count(), 0);
    }
}
