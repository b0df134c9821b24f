use crate::{
    core::{context::BindingContext, map::MapInstance},
    input::handler::HandlerTable,
    layers::{
        layer::{LayerBinder, LayerProps, LayerType},
        source::{SourceBinder, SourceProps},
        Binder, Reconciled,
    },
    Result,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Icon the arrow layer places along the path
pub const ARROW_ICON: &str = "arrow";

fn default_color() -> String {
    "#000".to_string()
}

fn default_width() -> f64 {
    4.0
}

fn default_true() -> bool {
    true
}

fn empty_collection() -> Value {
    json!({"type": "FeatureCollection", "features": []})
}

/// Declared polyline path
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathProps {
    pub id: String,
    /// Feature collection of line strings
    #[serde(default = "empty_collection")]
    pub geojson: Value,
    #[serde(default = "default_color")]
    pub line_color: String,
    #[serde(default = "default_width")]
    pub line_width: f64,
    /// Adds direction arrows along the line
    #[serde(default = "default_true")]
    pub arrow: bool,
    /// Gesture handlers, bound to the line layer
    #[serde(skip)]
    pub handlers: HandlerTable,
}

impl PathProps {
    pub fn new(id: impl Into<String>, geojson: Value) -> Self {
        Self {
            id: id.into(),
            geojson,
            line_color: default_color(),
            line_width: default_width(),
            arrow: true,
            handlers: HandlerTable::new(),
        }
    }

    pub fn has_features(&self) -> bool {
        self.geojson
            .get("features")
            .and_then(Value::as_array)
            .map_or(false, |features| !features.is_empty())
    }

    fn source(&self) -> SourceProps {
        SourceProps::geojson(self.geojson.clone())
    }

    fn line_layer(&self) -> LayerProps {
        let mut props = LayerProps::new(LayerType::Line)
            .with_id(format!("path_{}", self.id))
            .with_paint("line-width", json!(self.line_width))
            .with_paint("line-color", json!(self.line_color))
            .with_layout("line-join", json!("round"))
            .with_layout("line-cap", json!("round"));
        props.handlers = self.handlers.clone();
        props
    }

    fn arrow_layer(&self) -> LayerProps {
        LayerProps::new(LayerType::Symbol)
            .with_id(format!("arrow_{}", self.id))
            .with_layout("symbol-placement", json!("line"))
            .with_layout("symbol-spacing", json!(20))
            .with_layout("icon-image", json!(ARROW_ICON))
            .with_layout("icon-size", json!(0.5))
            .with_layout("icon-allow-overlap", json!(true))
    }
}

struct Part {
    source: SourceBinder,
    layer: LayerBinder,
    live: bool,
}

impl Part {
    fn new(source: &SourceProps, layer: &LayerProps, context: &mut BindingContext) -> Self {
        let source = SourceBinder::new(source, context);
        let layer = LayerBinder::new(layer, Some(source.id()), context);
        Self {
            source,
            layer,
            live: false,
        }
    }

    fn reconcile(
        &mut self,
        map: &mut MapInstance,
        source: SourceProps,
        layer: LayerProps,
    ) -> Result<Reconciled> {
        let outcome = self.source.reconcile(map, source)?;
        if outcome == Reconciled::Deferred {
            return Ok(outcome);
        }
        self.live = true;
        Ok(outcome.merge(self.layer.reconcile(map, layer)?))
    }

    fn teardown(&mut self, map: &mut MapInstance) -> Result<Reconciled> {
        if !self.live {
            return Ok(Reconciled::Unchanged);
        }
        self.live = false;
        self.layer.teardown(map)?;
        self.source.remove(map)
    }
}

impl std::fmt::Debug for Part {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Part")
            .field("source", &self.source.id())
            .field("layer", &self.layer.id())
            .field("live", &self.live)
            .finish()
    }
}

/// Line plus optional arrow symbols, each over its own geojson source
///
/// Nothing is rendered while the collection has no features.
#[derive(Debug)]
pub struct PathLayer {
    id: String,
    line: Part,
    arrow: Part,
}

impl PathLayer {
    pub fn new(props: &PathProps, context: &mut BindingContext) -> Self {
        let source = props.source();
        Self {
            id: props.id.clone(),
            line: Part::new(&source, &props.line_layer(), context),
            arrow: Part::new(&source, &props.arrow_layer(), context),
        }
    }

    /// Source holding the line geometry
    pub fn line_source_id(&self) -> &str {
        self.line.source.id()
    }

    pub fn layer_ids(&self) -> [&str; 2] {
        [self.line.layer.id(), self.arrow.layer.id()]
    }

    pub fn reconcile(&mut self, map: &mut MapInstance, props: PathProps) -> Result<Reconciled> {
        if !props.has_features() {
            let line = self.line.teardown(map)?;
            return Ok(line.merge(self.arrow.teardown(map)?));
        }
        let mut outcome = self
            .line
            .reconcile(map, props.source(), props.line_layer())?;
        outcome = if props.arrow {
            outcome.merge(
                self.arrow
                    .reconcile(map, props.source(), props.arrow_layer())?,
            )
        } else {
            outcome.merge(self.arrow.teardown(map)?)
        };
        Ok(outcome)
    }

    pub fn teardown(&mut self, map: &mut MapInstance) -> Result<Reconciled> {
        let arrow = self.arrow.teardown(map)?;
        Ok(arrow.merge(self.line.teardown(map)?))
    }
}

impl Binder for PathLayer {
    type Props = PathProps;

    fn id(&self) -> &str {
        &self.id
    }

    fn reconcile(&mut self, map: &mut MapInstance, props: PathProps) -> Result<Reconciled> {
        PathLayer::reconcile(self, map, props)
    }

    fn teardown(&mut self, map: &mut MapInstance) -> Result<Reconciled> {
        PathLayer::teardown(self, map)
    }
}
