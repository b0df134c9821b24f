//! Animated track playback
//!
//! The declared route is resampled at a fixed step, then replayed one point
//! per frame either as a growing line or as a rotating icon.

use crate::{
    core::{
        context::BindingContext,
        diff::equals,
        geo::{bearing, densify, LngLat},
        map::MapInstance,
    },
    layers::{
        layer::{LayerBinder, LayerProps, LayerType},
        path::{PathLayer, PathProps},
        source::{SourceBinder, SourceProps},
        Binder, Reconciled,
    },
    traits::SourceUpdate,
    Result,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::Poll;

const TRACK_COLOR: &str = "#007aff";
const TRACK_WIDTH: f64 = 2.0;
const DEFAULT_ICON_SIZE: f64 = 0.3;

fn default_speed() -> f64 {
    10.0
}

/// Image used to show the moving position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackIcon {
    pub name: String,
    pub url: String,
    pub size: Option<f64>,
}

/// Declared track: a path plus its playback
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackProps {
    #[serde(flatten)]
    pub path: PathProps,
    /// Resampling step is `0.001 * speed` km per frame
    #[serde(default = "default_speed")]
    pub speed: f64,
    pub icon: Option<TrackIcon>,
}

impl TrackProps {
    pub fn new(id: impl Into<String>, geojson: Value) -> Self {
        Self {
            path: PathProps::new(id, geojson),
            speed: default_speed(),
            icon: None,
        }
    }

    /// Coordinates of the first feature, the one that is played back
    fn route(&self) -> Vec<LngLat> {
        self.path
            .geojson
            .pointer("/features/0/geometry/coordinates")
            .and_then(|coords| serde_json::from_value::<Vec<LngLat>>(coords.clone()).ok())
            .unwrap_or_default()
    }

    fn step_km(&self) -> f64 {
        0.001 * self.speed
    }
}

#[derive(Debug, Default)]
struct Playback {
    points: Vec<LngLat>,
    cursor: usize,
    progress: u8,
    trail: Vec<LngLat>,
    position: Option<(LngLat, f64)>,
    icon_mode: bool,
}

impl Playback {
    fn reset(&mut self, points: Vec<LngLat>, icon_mode: bool) {
        *self = Playback {
            points,
            icon_mode,
            ..Playback::default()
        };
    }

    /// Advances one point; false once the route is exhausted
    fn advance(&mut self) -> bool {
        let Some(&current) = self.points.get(self.cursor) else {
            self.cursor = 0;
            return false;
        };
        if self.icon_mode {
            let previous = self.points[self.cursor.saturating_sub(1)];
            self.position = Some((current, bearing(previous, current)));
        } else {
            self.trail.push(current);
        }
        self.cursor += 1;
        self.progress = percent(self.cursor, self.points.len());
        true
    }
}

fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((done as f64 / total as f64) * 100.0).floor() as u8
}

fn lock(playback: &Arc<Mutex<Playback>>) -> MutexGuard<'_, Playback> {
    match playback.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn trail_collection(trail: &[LngLat]) -> Value {
    json!({
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "properties": {},
            "geometry": {"type": "LineString", "coordinates": trail}
        }]
    })
}

fn icon_collection(position: Option<(LngLat, f64)>) -> Value {
    let features: Vec<Value> = position
        .map(|(lng_lat, bearing)| {
            json!({
                "type": "Feature",
                "properties": {"bearing": bearing},
                "geometry": {"type": "Point", "coordinates": lng_lat}
            })
        })
        .into_iter()
        .collect();
    json!({"type": "FeatureCollection", "features": features})
}

/// Route, replayed trail and optional moving icon
#[derive(Debug)]
pub struct TrackLayer {
    id: String,
    route: PathLayer,
    trail: PathLayer,
    icon_source: SourceBinder,
    icon_layer: LayerBinder,
    icon_ready: bool,
    playback: Arc<Mutex<Playback>>,
    applied: Option<TrackProps>,
}

impl TrackLayer {
    pub fn new(props: &TrackProps, context: &mut BindingContext) -> Self {
        let id = props.path.id.clone();
        let route = PathLayer::new(&props.path, context);
        let trail = PathLayer::new(&Self::trail_props(&id, &[]), context);
        let icon_source = SourceBinder::new(&SourceProps::geojson(icon_collection(None)), context);
        let icon_layer = LayerBinder::new(
            &Self::icon_layer_props(&id, props.icon.as_ref()),
            Some(icon_source.id()),
            context,
        );
        Self {
            id,
            route,
            trail,
            icon_source,
            icon_layer,
            icon_ready: false,
            playback: Arc::new(Mutex::new(Playback::default())),
            applied: None,
        }
    }

    fn animation_key(&self) -> String {
        format!("track:{}", self.id)
    }

    fn trail_props(id: &str, trail: &[LngLat]) -> PathProps {
        let mut props = PathProps::new(format!("track_{}", id), trail_collection(trail));
        props.line_color = TRACK_COLOR.to_string();
        props.line_width = TRACK_WIDTH;
        props.arrow = false;
        props
    }

    fn icon_layer_props(id: &str, icon: Option<&TrackIcon>) -> LayerProps {
        let (name, size) = icon
            .map(|icon| (icon.name.clone(), icon.size.unwrap_or(DEFAULT_ICON_SIZE)))
            .unwrap_or_else(|| (String::new(), DEFAULT_ICON_SIZE));
        LayerProps::new(LayerType::Symbol)
            .with_id(format!("track_icon_{}", id))
            .with_layout("icon-image", json!(name))
            .with_layout("icon-size", json!(size))
            .with_layout("icon-rotate", json!(["get", "bearing"]))
            .with_layout("icon-allow-overlap", json!(true))
    }

    /// Playback progress in whole percent
    pub fn progress(&self) -> u8 {
        lock(&self.playback).progress
    }

    /// Number of resampled points the playback walks through
    pub fn point_count(&self) -> usize {
        lock(&self.playback).points.len()
    }

    pub fn is_playing(&self, map: &MapInstance) -> bool {
        map.scheduler().is_pending(&self.animation_key())
    }

    /// Registers the track icon image; the icon layer appears once it is in
    pub async fn load_icon(&mut self, map: &mut MapInstance, icon: &TrackIcon) -> Result<bool> {
        let loaded = map.add_image(&icon.name, &icon.url).await?;
        self.icon_ready = loaded;
        Ok(loaded)
    }

    pub fn reconcile(&mut self, map: &mut MapInstance, props: TrackProps) -> Result<Reconciled> {
        let mut outcome = self.route.reconcile(map, props.path.clone())?;
        if !props.path.has_features() {
            map.cancel_task(&self.animation_key());
            outcome = outcome.merge(self.trail.teardown(map)?);
            outcome = outcome.merge(self.hide_icon(map)?);
            self.applied = Some(props);
            return Ok(outcome);
        }

        let restart = match &self.applied {
            Some(old) => {
                !equals(&old.path.geojson, &props.path.geojson)
                    || old.speed != props.speed
                    || old.icon.is_some() != props.icon.is_some()
            }
            None => true,
        };
        if restart {
            let points = densify(&props.route(), props.step_km());
            log::debug!("track `{}` resampled to {} points", self.id, points.len());
            lock(&self.playback).reset(points, props.icon.is_some());
        }

        let (trail, position) = {
            let playback = lock(&self.playback);
            (playback.trail.clone(), playback.position)
        };
        outcome = outcome.merge(
            self.trail
                .reconcile(map, Self::trail_props(&self.id, &trail))?,
        );
        if props.icon.is_some() && self.icon_ready {
            outcome = outcome.merge(self.show_icon(map, &props, position)?);
        } else {
            outcome = outcome.merge(self.hide_icon(map)?);
        }

        self.applied = Some(props);
        if restart {
            self.play(map);
        }
        Ok(outcome)
    }

    fn show_icon(
        &mut self,
        map: &mut MapInstance,
        props: &TrackProps,
        position: Option<(LngLat, f64)>,
    ) -> Result<Reconciled> {
        let source = self
            .icon_source
            .reconcile(map, SourceProps::geojson(icon_collection(position)))?;
        if source == Reconciled::Deferred {
            return Ok(source);
        }
        let layer = self
            .icon_layer
            .reconcile(map, Self::icon_layer_props(&self.id, props.icon.as_ref()))?;
        Ok(source.merge(layer))
    }

    fn hide_icon(&mut self, map: &mut MapInstance) -> Result<Reconciled> {
        if !map.engine().has_source(self.icon_source.id()) {
            return Ok(Reconciled::Unchanged);
        }
        self.icon_layer.teardown(map)?;
        self.icon_source.remove(map)
    }

    /// Restarts playback from the first point
    ///
    /// Any loop already running for this track is cancelled first. The loop
    /// advances one point per frame and pushes the new geometry straight to
    /// the engine.
    pub fn play(&mut self, map: &mut MapInstance) {
        {
            let mut playback = lock(&self.playback);
            let (points, icon_mode) = (std::mem::take(&mut playback.points), playback.icon_mode);
            playback.reset(points, icon_mode);
        }
        let playback = self.playback.clone();
        let trail_source = self.trail.line_source_id().to_string();
        let icon_source = self.icon_source.id().to_string();
        let id = self.id.clone();
        map.schedule_animation(
            self.animation_key(),
            Box::new(move |engine| {
                let mut state = lock(&playback);
                if !state.advance() {
                    log::debug!("track `{}` finished", id);
                    return Ok(Poll::Ready(()));
                }
                let (target, data) = if state.icon_mode {
                    (&icon_source, icon_collection(state.position))
                } else {
                    (&trail_source, trail_collection(&state.trail))
                };
                // Playback keeps advancing while the target is not rendered
                if engine.has_source(target) {
                    engine.update_source(target, SourceUpdate::SetData(data))?;
                }
                Ok(Poll::Pending)
            }),
        );
    }

    /// Jumps the icon to `percent` of the route and returns its position
    pub fn seek(&mut self, map: &mut MapInstance, percent: f64) -> Option<LngLat> {
        let position = {
            let mut playback = lock(&self.playback);
            let len = playback.points.len();
            if len == 0 {
                return None;
            }
            let index = ((len as f64 * (percent / 100.0)).floor().max(0.0) as usize).min(len - 1);
            let coord = playback.points[index];
            let heading = if index > 1 {
                bearing(playback.points[index - 1], coord)
            } else {
                playback.position.map_or(0.0, |(_, heading)| heading)
            };
            playback.position = Some((coord, heading));
            playback.position
        };
        let icon_source = self.icon_source.id().to_string();
        if map.engine().has_source(&icon_source) {
            let data = icon_collection(position);
            if let Err(err) = map
                .engine_mut()
                .update_source(&icon_source, SourceUpdate::SetData(data))
            {
                log::warn!("track `{}` seek failed: {}", self.id, err);
            }
        }
        position.map(|(lng_lat, _)| lng_lat)
    }

    pub fn teardown(&mut self, map: &mut MapInstance) -> Result<Reconciled> {
        map.cancel_task(&self.animation_key());
        let mut outcome = self.hide_icon(map)?;
        outcome = outcome.merge(self.trail.teardown(map)?);
        outcome = outcome.merge(self.route.teardown(map)?);
        self.applied = None;
        Ok(outcome)
    }
}

impl Binder for TrackLayer {
    type Props = TrackProps;

    fn id(&self) -> &str {
        &self.id
    }

    fn reconcile(&mut self, map: &mut MapInstance, props: TrackProps) -> Result<Reconciled> {
        TrackLayer::reconcile(self, map, props)
    }

    fn teardown(&mut self, map: &mut MapInstance) -> Result<Reconciled> {
        TrackLayer::teardown(self, map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::MapProps;
    use crate::testing::{EngineProbe, RecordingEngine, StaticImageLoader};
    use crate::traits::{ContainerElement, ImageData};

    fn setup() -> (BindingContext, MapInstance, EngineProbe) {
        let engine = RecordingEngine::new();
        let probe = engine.probe();
        let factory = engine.into_factory();
        let mut context = BindingContext::new();
        let map = context
            .create(
                &factory,
                MapProps::default(),
                Arc::new(Mutex::new(ContainerElement::new("map"))),
            )
            .unwrap();
        (context, map, probe)
    }

    fn route() -> Value {
        json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {},
                "geometry": {"type": "LineString", "coordinates": [[0.0, 0.0], [0.0, 0.0005]]}
            }]
        })
    }

    fn trail_len(probe: &EngineProbe, source: &str) -> usize {
        probe
            .source(source)
            .and_then(|spec| {
                spec.pointer("/data/features/0/geometry/coordinates")
                    .and_then(Value::as_array)
                    .map(Vec::len)
            })
            .unwrap_or(0)
    }

    #[test]
    fn test_densify_step_follows_speed() {
        let props = TrackProps::new("t", route());
        // ~55 m at 10 m steps: 5 intermediate points plus both ends
        let points = densify(&props.route(), props.step_km());
        assert_eq!(points.len(), 7);
    }

    #[test]
    fn test_trail_grows_one_point_per_frame() {
        let (mut context, mut map, probe) = setup();
        let props = TrackProps::new("t", route());
        let mut track = TrackLayer::new(&props, &mut context);
        track.reconcile(&mut map, props).unwrap();
        assert!(probe.layer("path_t").is_some());
        assert!(probe.layer("path_track_t").is_some());

        let trail_source = track.trail.line_source_id().to_string();
        // The first point is pushed when the loop is scheduled
        assert_eq!(trail_len(&probe, &trail_source), 1);
        map.tick();
        assert_eq!(trail_len(&probe, &trail_source), 2);

        let total = track.point_count();
        for _ in 0..total {
            map.tick();
        }
        assert_eq!(trail_len(&probe, &trail_source), total);
        assert_eq!(track.progress(), 100);
        assert!(!track.is_playing(&map));
    }

    #[test]
    fn test_restart_cancels_running_loop() {
        let (mut context, mut map, _probe) = setup();
        let props = TrackProps::new("t", route());
        let mut track = TrackLayer::new(&props, &mut context);
        track.reconcile(&mut map, props).unwrap();
        map.tick();
        track.play(&mut map);
        assert_eq!(map.scheduler().pending(), 1);
        assert!(track.progress() < 100);
        track.teardown(&mut map).unwrap();
        assert!(!track.is_playing(&map));
    }

    #[tokio::test]
    async fn test_icon_mode_and_seek() {
        let (mut context, mut map, probe) = setup();
        map.set_image_loader(Arc::new(
            StaticImageLoader::new().with_image("car.png", ImageData::new(1, 1, vec![0; 4])),
        ));
        let mut props = TrackProps::new("t", route());
        let icon = TrackIcon {
            name: "car".into(),
            url: "car.png".into(),
            size: None,
        };
        props.icon = Some(icon.clone());
        let mut track = TrackLayer::new(&props, &mut context);
        assert!(track.load_icon(&mut map, &icon).await.unwrap());
        track.reconcile(&mut map, props).unwrap();

        let layer = probe.layer("track_icon_t").unwrap();
        assert_eq!(layer["layout"]["icon-size"], json!(0.3));
        assert_eq!(layer["layout"]["icon-rotate"], json!(["get", "bearing"]));

        let end = track.seek(&mut map, 100.0).unwrap();
        assert!((end.lat - 0.0005).abs() < 1e-6);
        let icon_source = probe.source(track.icon_source.id()).unwrap();
        let bearing = icon_source
            .pointer("/data/features/0/properties/bearing")
            .and_then(Value::as_f64)
            .unwrap();
        assert!(bearing.abs() < 1e-6);
    }
}
