use crate::{
    core::{
        config::MapProps,
        context::ContextConfig,
        diff::equals_opt,
        scheduler::{CancelToken, DeferredTask, FrameScheduler, PollTask, TickReport},
    },
    input::{
        events::{GestureKind, MapEventKind},
        handler::{dispatch_shared, replace_shared, EventRouter, Route, SharedHandlers},
    },
    plugins::draw::DrawControl,
    traits::{
        CameraOption, Container, EngineFactory, EventTarget, ImageLoader, ListenerId, MapEngine,
        MapSetting, StyleOptions,
    },
    MapError, Result,
};
use serde_json::Value;
use std::sync::{Arc, MutexGuard};
use std::task::Poll;

const FOG_LIGHT_TASK: &str = "map:fog-light";
const TERRAIN_TASK: &str = "map:terrain";

/// One live engine handle plus everything bound to it
pub struct MapInstance {
    id: u64,
    engine: Box<dyn MapEngine>,
    props: MapProps,
    handlers: SharedHandlers,
    router: EventRouter,
    scheduler: FrameScheduler,
    draw: DrawControl,
    map_listeners: Vec<ListenerId>,
    image_loader: Option<Arc<dyn ImageLoader>>,
    recycled: bool,
}

impl MapInstance {
    /// Builds the engine handle and binds the camera and lifecycle events
    ///
    /// Fog and light are applied once the style reports loaded; terrain
    /// additionally waits for its source to be registered.
    pub fn create(
        id: u64,
        factory: &dyn EngineFactory,
        props: MapProps,
        container: Container,
        config: &ContextConfig,
    ) -> Result<Self> {
        let engine = factory.create(props.engine_options()?, container)?;
        let mut instance = Self {
            id,
            engine,
            handlers: props.handlers.clone().into_shared(),
            props: MapProps::default(),
            router: EventRouter::new(),
            scheduler: FrameScheduler::new(config.scheduler),
            draw: DrawControl::new(config.draw.clone()),
            map_listeners: Vec::new(),
            image_loader: None,
            recycled: false,
        };
        log::debug!("created map instance {}", id);

        instance.bind_map_events();
        instance.draw.attach(instance.engine.as_mut());
        instance.schedule_fog_and_light(props.fog.clone(), props.light.clone(), false);
        if props.terrain.is_some() {
            instance.schedule_terrain(props.terrain.clone(), true);
        }
        instance.props = props;
        Ok(instance)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn engine(&self) -> &dyn MapEngine {
        self.engine.as_ref()
    }

    pub fn engine_mut(&mut self) -> &mut dyn MapEngine {
        self.engine.as_mut()
    }

    pub fn props(&self) -> &MapProps {
        &self.props
    }

    pub fn router(&self) -> &EventRouter {
        &self.router
    }

    pub fn router_mut(&mut self) -> &mut EventRouter {
        &mut self.router
    }

    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    pub fn is_recycled(&self) -> bool {
        self.recycled
    }

    pub fn draw(&self) -> &DrawControl {
        &self.draw
    }

    /// Gives the draw control its engine for the duration of `f`
    pub fn with_draw<R>(&mut self, f: impl FnOnce(&mut DrawControl, &mut dyn MapEngine) -> R) -> R {
        f(&mut self.draw, self.engine.as_mut())
    }

    pub fn set_image_loader(&mut self, loader: Arc<dyn ImageLoader>) {
        self.image_loader = Some(loader);
    }

    /// Registers a listener and the route its events take
    pub fn listen(&mut self, event: &str, target: &EventTarget, route: Route) -> ListenerId {
        let listener = self.engine.on(event, target);
        self.router.insert(listener, route);
        listener
    }

    /// Drops the route now and the engine listener immediately
    pub fn unlisten(&mut self, listener: ListenerId) {
        self.router.remove(listener);
        self.engine.off(listener);
    }

    /// Runs `poll` now and once per frame until it reports ready
    pub fn schedule_until(&mut self, key: impl Into<String>, poll: PollTask) -> CancelToken {
        let (token, report) = self
            .scheduler
            .schedule_until(self.engine.as_mut(), key, poll);
        Self::log_report(&report);
        token
    }

    /// Per-frame loop without a frame budget
    pub fn schedule_animation(&mut self, key: impl Into<String>, poll: PollTask) -> CancelToken {
        let (token, report) = self
            .scheduler
            .schedule_animation(self.engine.as_mut(), key, poll);
        Self::log_report(&report);
        token
    }

    pub fn cancel_task(&mut self, key: &str) -> bool {
        self.scheduler.cancel(key)
    }

    /// Queues work for the next idle tick
    pub fn defer(&mut self, task: DeferredTask) {
        self.scheduler.defer(task);
    }

    fn log_report(report: &TickReport) {
        for (key, err) in &report.failed {
            log::warn!("scheduled task `{}` failed: {}", key, err);
        }
    }

    fn bind_map_events(&mut self) {
        for kind in MapEventKind::CAMERA
            .iter()
            .chain(MapEventKind::LIFECYCLE.iter())
        {
            let listener = self.listen(kind.name(), &EventTarget::Map, Route::Map(kind.clone()));
            self.map_listeners.push(listener);
        }
    }

    fn unbind_map_events(&mut self) {
        for listener in std::mem::take(&mut self.map_listeners) {
            self.unlisten(listener);
        }
    }

    /// Applies changed props to the live handle
    pub fn update_props(&mut self, props: MapProps) -> Result<()> {
        self.update_camera_options(&props)?;
        self.update_map_settings(&props)?;
        self.update_map_style(&props)?;
        self.update_environment(&props)?;
        replace_shared(&self.handlers, props.handlers.clone());
        self.props = props;
        Ok(())
    }

    /// Camera options are cheap and idempotent, so they are always applied
    fn update_camera_options(&mut self, props: &MapProps) -> Result<()> {
        let options = [
            props.zoom.map(CameraOption::Zoom),
            props.pitch.map(CameraOption::Pitch),
            props.bearing.map(CameraOption::Bearing),
            props.center.map(CameraOption::Center),
        ];
        for option in options.into_iter().flatten() {
            self.engine.set_camera_option(option)?;
        }
        Ok(())
    }

    fn update_map_settings(&mut self, props: &MapProps) -> Result<()> {
        let old = &self.props;
        let mut settings = Vec::new();
        if props.min_zoom != old.min_zoom {
            settings.push(MapSetting::MinZoom(props.min_zoom));
        }
        if props.max_zoom != old.max_zoom {
            settings.push(MapSetting::MaxZoom(props.max_zoom));
        }
        if props.min_pitch != old.min_pitch {
            settings.push(MapSetting::MinPitch(props.min_pitch));
        }
        if !equals_opt(props.max_bounds.as_ref(), old.max_bounds.as_ref()) {
            settings.push(MapSetting::MaxBounds(props.max_bounds.clone()));
        }
        if let Some(copies) = props.render_world_copies {
            if old.render_world_copies != Some(copies) {
                settings.push(MapSetting::RenderWorldCopies(copies));
            }
        }
        for setting in settings {
            log::trace!("map {}: {:?}", self.id, setting);
            self.engine.set_map_setting(setting)?;
        }
        Ok(())
    }

    fn update_map_style(&mut self, props: &MapProps) -> Result<()> {
        if props.cursor != self.props.cursor {
            self.engine.set_cursor(props.cursor.as_deref().unwrap_or(""));
        }
        if !equals_opt(props.map_style.as_ref(), self.props.map_style.as_ref()) {
            if let Some(style) = &props.map_style {
                let options = StyleOptions {
                    diff: props.diff.unwrap_or(true),
                    local_ideograph_font_family: props
                        .local_ideograph_font_family
                        .clone()
                        .filter(|family| !family.is_empty()),
                };
                log::debug!("map {}: replacing style", self.id);
                self.engine.set_style(style, &options)?;
            }
        }
        Ok(())
    }

    /// Fog, light and terrain only change once the style is loaded
    ///
    /// Changes made before that are queued as poll tasks carrying the
    /// latest values, so they land once the style reports loaded.
    fn update_environment(&mut self, props: &MapProps) -> Result<()> {
        let fog_changed = !equals_opt(props.fog.as_ref(), self.props.fog.as_ref());
        let light_changed = props.light.is_some()
            && !equals_opt(props.light.as_ref(), self.props.light.as_ref());
        let terrain_changed = !equals_opt(props.terrain.as_ref(), self.props.terrain.as_ref());

        if !self.engine.is_style_loaded() {
            if fog_changed || light_changed {
                log::debug!("map {}: fog/light queued until the style loads", self.id);
                self.schedule_fog_and_light(props.fog.clone(), props.light.clone(), fog_changed);
            }
            if terrain_changed {
                self.schedule_terrain(props.terrain.clone(), true);
            }
            return Ok(());
        }
        if fog_changed {
            self.engine.set_fog(props.fog.as_ref())?;
        }
        if let (true, Some(light)) = (light_changed, &props.light) {
            self.engine.set_light(light)?;
        }
        if terrain_changed {
            self.schedule_terrain(props.terrain.clone(), false);
        }
        Ok(())
    }

    /// Applies fog and light once the style is loaded
    ///
    /// `clear_fog` also forwards an unset fog, removing the current one.
    fn schedule_fog_and_light(&mut self, fog: Option<Value>, light: Option<Value>, clear_fog: bool) {
        if fog.is_none() && light.is_none() && !clear_fog {
            return;
        }
        self.schedule_until(
            FOG_LIGHT_TASK,
            Box::new(move |engine| {
                if !engine.is_style_loaded() {
                    return Ok(Poll::Pending);
                }
                if fog.is_some() || clear_fog {
                    engine.set_fog(fog.as_ref())?;
                }
                if let Some(light) = &light {
                    engine.set_light(light)?;
                }
                Ok(Poll::Ready(()))
            }),
        );
    }

    /// Terrain against an unregistered source is rejected, so wait for it
    fn schedule_terrain(&mut self, terrain: Option<Value>, wait_for_style: bool) {
        let source = terrain
            .as_ref()
            .and_then(|terrain| terrain.get("source"))
            .and_then(Value::as_str)
            .map(str::to_string);
        self.schedule_until(
            TERRAIN_TASK,
            Box::new(move |engine| {
                if wait_for_style && !engine.is_style_loaded() {
                    return Ok(Poll::Pending);
                }
                if let Some(source) = &source {
                    if !engine.has_source(source) {
                        return Ok(Poll::Pending);
                    }
                }
                engine.set_terrain(terrain.as_ref())?;
                Ok(Poll::Ready(()))
            }),
        );
    }

    /// Moves the rendered children into `container` and adopts it
    pub fn relocate(&mut self, container: Container) {
        let old = self.engine.container();
        if !Arc::ptr_eq(&old, &container) {
            let mut from = lock(&old);
            let mut to = lock(&container);
            to.class_name = from.class_name.clone();
            to.children.append(&mut from.children);
        }
        self.engine.set_container(container);
    }

    /// Marks the instance as parked in the pool; the handle stays alive
    pub fn recycle(&mut self) {
        log::debug!("recycling map instance {}", self.id);
        self.recycled = true;
    }

    pub(crate) fn mark_active(&mut self) {
        self.recycled = false;
    }

    /// Takes the instance back out of the pool with new props
    pub fn revive(&mut self, container: Container, props: MapProps) -> Result<()> {
        log::debug!("reusing map instance {}", self.id);
        self.mark_active();
        self.relocate(container);
        self.update_props(props)
    }

    /// Unbinds every listener and removes the engine handle
    pub fn destroy(mut self) {
        log::debug!("destroying map instance {}", self.id);
        self.unbind_map_events();
        for listener in self.router.clear() {
            self.engine.off(listener);
        }
        self.draw.detach(self.engine.as_mut());
        self.scheduler.clear();
        self.engine.remove();
    }

    pub fn resize(&mut self) {
        self.engine.resize();
    }

    /// Loads and registers an image unless one with that name exists
    pub async fn add_image(&mut self, name: &str, url: &str) -> Result<bool> {
        if self.engine.has_image(name) {
            return Ok(true);
        }
        let image = self.load_image(name, url).await?;
        self.engine.add_image(name, image)?;
        Ok(true)
    }

    /// Loads every missing image concurrently, then registers them in order
    ///
    /// Nothing is registered when any load fails. Returns the names added.
    pub async fn add_images(&mut self, images: &[(&str, &str)]) -> Result<Vec<String>> {
        let missing: Vec<(&str, &str)> = images
            .iter()
            .copied()
            .filter(|(name, _)| !self.engine.has_image(name))
            .collect();
        let loaded = futures::future::try_join_all(
            missing.iter().map(|(name, url)| self.load_image(name, url)),
        )
        .await?;
        let mut added = Vec::with_capacity(missing.len());
        for ((name, _), image) in missing.into_iter().zip(loaded) {
            if self.engine.has_image(name) {
                continue;
            }
            self.engine.add_image(name, image)?;
            added.push(name.to_string());
        }
        Ok(added)
    }

    /// Replaces the pixels of an existing image
    pub async fn update_image(&mut self, name: &str, url: &str) -> Result<bool> {
        if !self.engine.has_image(name) {
            return Err(MapError::ImageNotFound(name.to_string()));
        }
        let image = self.load_image(name, url).await?;
        self.engine.update_image(name, image)?;
        Ok(true)
    }

    pub fn remove_image(&mut self, name: &str) {
        if self.engine.has_image(name) {
            self.engine.remove_image(name);
        }
    }

    pub fn list_images(&self) -> Vec<String> {
        self.engine.list_images()
    }

    async fn load_image(&self, name: &str, url: &str) -> Result<crate::traits::ImageData> {
        let loader = self.image_loader.clone().ok_or_else(|| MapError::ImageLoad {
            name: name.to_string(),
            reason: "no image loader configured".to_string(),
        })?;
        loader.load_image(url).await.map_err(|err| match err {
            MapError::ImageLoad { .. } => err,
            other => MapError::ImageLoad {
                name: name.to_string(),
                reason: other.to_string(),
            },
        })
    }

    /// Delivers queued engine events to their handlers
    ///
    /// A load notification triggers an early poll pass, whose report is
    /// returned.
    pub fn process_events(&mut self) -> TickReport {
        let mut readiness = false;
        for delivered in self.engine.drain_events() {
            let mut event = delivered.event;
            readiness |= event.kind.signals_readiness();
            let route = self.router.get(delivered.listener).cloned();
            match route {
                Some(Route::Map(_)) => {
                    dispatch_shared(&self.handlers, &event);
                }
                Some(Route::Layer {
                    layer_id,
                    gesture,
                    handlers,
                }) => {
                    if let Some(point) = event.point {
                        event.features = self
                            .engine
                            .query_rendered_features(point, &[layer_id.as_str()]);
                    }
                    if !dispatch_shared(&handlers, &event) {
                        match gesture {
                            GestureKind::MouseEnter => self.engine.set_cursor("pointer"),
                            GestureKind::MouseLeave => self.engine.set_cursor("grab"),
                            _ => {}
                        }
                    }
                }
                Some(Route::Overlay(handlers)) => {
                    dispatch_shared(&handlers, &event);
                }
                None => {
                    if !self
                        .draw
                        .handle_engine_event(self.engine.as_mut(), delivered.listener, &event)
                    {
                        log::trace!("dropping event for unknown listener {:?}", delivered.listener);
                    }
                }
            }
        }
        if readiness {
            self.scheduler.tick(self.engine.as_mut())
        } else {
            TickReport::default()
        }
    }

    /// One animation frame: idle work, events, then readiness polls
    pub fn tick(&mut self) -> TickReport {
        self.scheduler.flush_deferred(self.engine.as_mut());
        let mut report = self.process_events();
        let frame = self.scheduler.tick(self.engine.as_mut());
        report.completed.extend(frame.completed);
        report.timed_out.extend(frame.timed_out);
        report.failed.extend(frame.failed);
        Self::log_report(&report);
        report
    }
}

impl std::fmt::Debug for MapInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapInstance")
            .field("id", &self.id)
            .field("recycled", &self.recycled)
            .field("listeners", &self.router.len())
            .field("pending_tasks", &self.scheduler.pending())
            .finish()
    }
}

fn lock(container: &Container) -> MutexGuard<'_, crate::traits::ContainerElement> {
    match container.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::builder::MapPropsBuilder;
    use crate::core::geo::LngLat;
    use crate::input::events::MapEvent;
    use crate::testing::{EngineCall, RecordingEngine};
    use crate::traits::ContainerElement;
    use serde_json::json;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };

    fn container(id: &str) -> Container {
        Arc::new(Mutex::new(ContainerElement::new(id)))
    }

    fn create(engine: RecordingEngine, props: MapProps) -> MapInstance {
        let factory = engine.into_factory();
        MapInstance::create(1, &factory, props, container("map"), &ContextConfig::default())
            .unwrap()
    }

    #[test]
    fn test_fog_waits_for_style() {
        let engine = RecordingEngine::new().with_style_loaded(false);
        let probe = engine.probe();
        let props = MapPropsBuilder::new()
            .with_fog(json!({"range": [1, 10]}))
            .build();
        let mut map = create(engine, props);
        assert!(probe.calls_named("set_fog").is_empty());

        map.tick();
        assert!(probe.calls_named("set_fog").is_empty());

        probe.set_style_loaded(true);
        let report = map.tick();
        assert_eq!(report.completed, vec![FOG_LIGHT_TASK.to_string()]);
        assert_eq!(probe.calls_named("set_fog").len(), 1);
    }

    #[test]
    fn test_environment_change_before_style_load_is_kept() {
        let engine = RecordingEngine::new().with_style_loaded(false);
        let probe = engine.probe();
        let mut map = create(engine, MapProps::default());

        let props = MapPropsBuilder::new()
            .with_fog(json!({"range": [1, 10]}))
            .with_light(json!({"anchor": "map"}))
            .with_terrain(json!({"source": "dem"}))
            .build();
        map.update_props(props.clone()).unwrap();
        map.tick();
        assert!(probe.calls_named("set_fog").is_empty());
        assert!(probe.calls_named("set_terrain").is_empty());

        probe.set_style_loaded(true);
        map.update_props(props).unwrap();
        map.engine_mut()
            .add_source("dem", json!({"type": "raster-dem"}))
            .unwrap();
        for _ in 0..3 {
            map.tick();
        }
        assert_eq!(
            probe.calls_named("set_fog"),
            vec![EngineCall::SetFog(Some(json!({"range": [1, 10]})))]
        );
        assert_eq!(probe.calls_named("set_light").len(), 1);
        assert_eq!(map.engine().terrain(), Some(json!({"source": "dem"})));
    }

    #[test]
    fn test_latest_queued_fog_wins() {
        let engine = RecordingEngine::new().with_style_loaded(false);
        let probe = engine.probe();
        let props = MapPropsBuilder::new()
            .with_fog(json!({"range": [1, 10]}))
            .build();
        let mut map = create(engine, props);

        map.update_props(MapProps::default()).unwrap();
        probe.set_style_loaded(true);
        map.tick();
        assert_eq!(probe.calls_named("set_fog"), vec![EngineCall::SetFog(None)]);
    }

    #[test]
    fn test_terrain_waits_for_source() {
        let engine = RecordingEngine::new();
        let probe = engine.probe();
        let mut map = create(engine, MapProps::default());

        let props = MapPropsBuilder::new()
            .with_terrain(json!({"source": "dem", "exaggeration": 1.5}))
            .build();
        map.update_props(props).unwrap();
        assert!(probe.calls_named("set_terrain").is_empty());

        map.engine_mut()
            .add_source("dem", json!({"type": "raster-dem"}))
            .unwrap();
        map.tick();
        assert_eq!(probe.calls_named("set_terrain").len(), 1);
        assert_eq!(map.engine().terrain(), Some(json!({"source": "dem", "exaggeration": 1.5})));
    }

    #[test]
    fn test_camera_always_settings_only_when_changed() {
        let engine = RecordingEngine::new();
        let probe = engine.probe();
        let mut map = create(engine, MapProps::default());
        let props = MapPropsBuilder::new()
            .with_center_and_zoom(LngLat::new(1.0, 2.0), 5.0)
            .with_zoom_limits(Some(2.0), None)
            .build();

        map.update_props(props.clone()).unwrap();
        map.update_props(props).unwrap();

        assert_eq!(probe.calls_named("set_camera_option").len(), 4);
        let settings = probe.calls_named("set_map_setting");
        assert_eq!(settings.len(), 1);
        assert_eq!(
            settings[0],
            EngineCall::SetMapSetting(MapSetting::MinZoom(Some(2.0)))
        );
    }

    #[test]
    fn test_style_replaced_only_on_change() {
        let engine = RecordingEngine::new();
        let probe = engine.probe();
        let mut map = create(engine, MapProps::default());
        let props = MapPropsBuilder::new()
            .with_style(json!("a.json"))
            .with_style_diff(false)
            .with_cursor("crosshair")
            .build();
        map.update_props(props.clone()).unwrap();
        map.update_props(props).unwrap();
        assert_eq!(probe.calls_named("set_style").len(), 1);
        assert_eq!(probe.cursor().as_deref(), Some("crosshair"));
    }

    #[test]
    fn test_handler_swap_without_rebinding() {
        let engine = RecordingEngine::new();
        let probe = engine.probe();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let counter = first.clone();
        let props = MapPropsBuilder::new()
            .on(MapEventKind::Zoom, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .build();
        let mut map = create(engine, props);
        let listeners = probe.listener_count();

        probe.emit_map(MapEvent::new(MapEventKind::Zoom));
        map.process_events();

        let counter = second.clone();
        let props = MapPropsBuilder::new()
            .on(MapEventKind::Zoom, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .build();
        map.update_props(props).unwrap();
        probe.emit_map(MapEvent::new(MapEventKind::Zoom));
        map.process_events();

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(probe.listener_count(), listeners);
    }

    #[test]
    fn test_destroy_unbinds_and_removes() {
        let engine = RecordingEngine::new();
        let probe = engine.probe();
        let map = create(engine, MapProps::default());
        assert!(probe.listener_count() >= 31);
        map.destroy();
        assert_eq!(probe.listener_count(), 0);
        assert!(probe.is_removed());
    }
}
