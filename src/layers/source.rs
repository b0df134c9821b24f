use crate::{
    core::{
        context::BindingContext,
        diff::{equals, equals_opt},
        map::MapInstance,
    },
    layers::{Binder, Reconciled},
    traits::SourceUpdate,
    MapError, Result,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::task::Poll;

/// Source type tag
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SourceType {
    Geojson,
    Vector,
    Raster,
    RasterDem,
    Image,
    Video,
    Canvas,
    Custom,
    Unknown(String),
}

impl SourceType {
    pub fn as_str(&self) -> &str {
        match self {
            SourceType::Geojson => "geojson",
            SourceType::Vector => "vector",
            SourceType::Raster => "raster",
            SourceType::RasterDem => "raster-dem",
            SourceType::Image => "image",
            SourceType::Video => "video",
            SourceType::Canvas => "canvas",
            SourceType::Custom => "custom",
            SourceType::Unknown(tag) => tag,
        }
    }
}

impl From<String> for SourceType {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "geojson" => SourceType::Geojson,
            "vector" => SourceType::Vector,
            "raster" => SourceType::Raster,
            "raster-dem" => SourceType::RasterDem,
            "image" => SourceType::Image,
            "video" => SourceType::Video,
            "canvas" => SourceType::Canvas,
            "custom" => SourceType::Custom,
            _ => SourceType::Unknown(tag),
        }
    }
}

impl From<SourceType> for String {
    fn from(source_type: SourceType) -> Self {
        source_type.as_str().to_string()
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared data source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceProps {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub source_type: SourceType,
    /// Layer configuration carried for child layers; never sent to the engine
    pub layer_config: Option<Value>,
    /// Type-specific payload (data, url, tiles, coordinates, ...)
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl SourceProps {
    pub fn new(source_type: SourceType) -> Self {
        Self {
            id: None,
            source_type,
            layer_config: None,
            payload: Map::new(),
        }
    }

    pub fn geojson(data: Value) -> Self {
        Self::new(SourceType::Geojson).with("data", data)
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.payload.insert(key.into(), value);
        self
    }

    fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// What the engine receives on creation: the payload plus the type tag
    pub fn engine_spec(&self) -> Value {
        let mut spec: Map<String, Value> = self
            .payload
            .iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        spec.insert("type".into(), Value::String(self.source_type.to_string()));
        Value::Object(spec)
    }

    fn value_or_null(&self, key: &str) -> Value {
        self.get(key).cloned().unwrap_or(Value::Null)
    }
}

/// Keeps one declared source registered and current
#[derive(Debug)]
pub struct SourceBinder {
    id: String,
    applied: Option<SourceProps>,
}

impl SourceBinder {
    /// Binds `props`, generating `source-<n>` when no id is declared
    pub fn new(props: &SourceProps, context: &mut BindingContext) -> Self {
        let id = props
            .id
            .clone()
            .unwrap_or_else(|| context.next_source_id());
        Self { id, applied: None }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Layer configuration of the last applied props
    pub fn layer_config(&self) -> Option<&Value> {
        self.applied.as_ref().and_then(|props| props.layer_config.as_ref())
    }

    fn ready_key(&self) -> String {
        format!("source:{}", self.id)
    }

    /// Creates the source or pushes the changed parts of `props`
    ///
    /// Before the style is loaded nothing is touched: a readiness wait is
    /// scheduled under `source:<id>` and the pass reports `Deferred`.
    pub fn reconcile(&mut self, map: &mut MapInstance, props: SourceProps) -> Result<Reconciled> {
        if !map.engine().is_style_loaded() {
            log::debug!("style not loaded, deferring source `{}`", self.id);
            map.schedule_until(
                self.ready_key(),
                Box::new(|engine| {
                    Ok(if engine.is_style_loaded() {
                        Poll::Ready(())
                    } else {
                        Poll::Pending
                    })
                }),
            );
            return Ok(Reconciled::Deferred);
        }

        if !map.engine().has_source(&self.id) {
            log::debug!("adding source `{}` ({})", self.id, props.source_type);
            map.engine_mut().add_source(&self.id, props.engine_spec())?;
            self.applied = Some(props);
            return Ok(Reconciled::Created);
        }

        let old = match self.applied.take() {
            Some(old) => old,
            // Registered by someone else; adopt it as is
            None => {
                self.applied = Some(props);
                return Ok(Reconciled::Unchanged);
            }
        };
        if old == props || equals(&props.engine_spec(), &old.engine_spec()) {
            self.applied = Some(props);
            return Ok(Reconciled::Unchanged);
        }

        let result = self.update(map, &props, &old);
        // A rejected update leaves the previous snapshot in place
        self.applied = Some(if result.is_ok() { props } else { old });
        result
    }

    fn update(
        &self,
        map: &mut MapInstance,
        props: &SourceProps,
        old: &SourceProps,
    ) -> Result<Reconciled> {
        let mut updates = Vec::new();
        match props.source_type {
            SourceType::Geojson => updates.push(SourceUpdate::SetData(props.value_or_null("data"))),
            SourceType::Image => updates.push(SourceUpdate::UpdateImage {
                url: props.value_or_null("url"),
                coordinates: props.value_or_null("coordinates"),
            }),
            SourceType::Video | SourceType::Canvas => {
                if !equals_opt(props.get("coordinates"), old.get("coordinates")) {
                    updates.push(SourceUpdate::SetCoordinates(
                        props.value_or_null("coordinates"),
                    ));
                }
            }
            SourceType::Vector | SourceType::Raster | SourceType::RasterDem => {
                if !equals_opt(props.get("url"), old.get("url")) {
                    updates.push(SourceUpdate::SetUrl(props.value_or_null("url")));
                }
                // Tiles are pushed when they compare equal. This mirrors the
                // behavior the bindings have always had; a change in tiles on
                // its own is not forwarded.
                if equals_opt(props.get("tiles"), old.get("tiles")) {
                    updates.push(SourceUpdate::SetTiles(props.value_or_null("tiles")));
                }
            }
            SourceType::Custom | SourceType::Unknown(_) => {
                return Err(MapError::InvalidSourceType(props.source_type.to_string()));
            }
        }

        if updates.is_empty() {
            return Ok(Reconciled::Unchanged);
        }
        for update in updates {
            log::trace!("source `{}`: {:?}", self.id, update);
            map.engine_mut().update_source(&self.id, update)?;
        }
        Ok(Reconciled::Updated)
    }

    /// Removes the source after everything that depends on it
    ///
    /// Layers using the source go first, then terrain if it is bound to this
    /// source, then the source itself. Any rejection at that point is an
    /// ordering violation.
    pub fn remove(&mut self, map: &mut MapInstance) -> Result<Reconciled> {
        map.cancel_task(&self.ready_key());
        let engine = map.engine_mut();
        if !engine.is_style_loaded() || !engine.has_source(&self.id) {
            return Ok(Reconciled::Unchanged);
        }

        for layer in engine.style_layers() {
            if layer.source.as_deref() == Some(self.id.as_str()) {
                log::debug!("removing layer `{}` ahead of source `{}`", layer.id, self.id);
                engine.remove_layer(&layer.id).map_err(ordering_violation)?;
            }
        }

        let terrain_bound = engine
            .terrain()
            .as_ref()
            .and_then(|terrain| terrain.get("source"))
            .and_then(Value::as_str)
            == Some(self.id.as_str());
        if terrain_bound {
            engine.set_terrain(None).map_err(ordering_violation)?;
        }

        log::debug!("removing source `{}`", self.id);
        engine.remove_source(&self.id).map_err(ordering_violation)?;
        self.applied = None;
        Ok(Reconciled::Removed)
    }
}

fn ordering_violation(err: MapError) -> MapError {
    match err {
        MapError::Engine { op, reason } => {
            MapError::OrderingViolation(format!("{} rejected: {}", op, reason))
        }
        other => other,
    }
}

impl Binder for SourceBinder {
    type Props = SourceProps;

    fn id(&self) -> &str {
        &self.id
    }

    fn reconcile(&mut self, map: &mut MapInstance, props: SourceProps) -> Result<Reconciled> {
        SourceBinder::reconcile(self, map, props)
    }

    fn teardown(&mut self, map: &mut MapInstance) -> Result<Reconciled> {
        self.remove(map)
    }
}
