//! Clustered point rendering
//!
//! Expects to sit under a geojson source declared with `cluster: true`. The
//! circle layer sizes and colors bubbles by `point_count` and the symbol layer
//! prints the count on top.

use crate::{
    core::{context::BindingContext, map::MapInstance},
    input::handler::HandlerTable,
    layers::{
        layer::{LayerBinder, LayerProps, LayerType},
        Binder, Reconciled,
    },
    Result,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Layout and paint overrides for one of the cluster layers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayerStyle {
    #[serde(default)]
    pub layout: Map<String, Value>,
    #[serde(default)]
    pub paint: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterProps {
    pub id: String,
    /// Overrides merged over the bubble defaults
    #[serde(default)]
    pub circle: LayerStyle,
    /// Overrides merged over the count label defaults
    #[serde(default)]
    pub text: LayerStyle,
    /// Gesture handlers, bound to the bubble layer
    #[serde(skip)]
    pub handlers: HandlerTable,
}

impl ClusterProps {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    fn circle_layer(&self) -> LayerProps {
        let mut props = LayerProps::new(LayerType::Circle)
            .with_id(format!("{}1", self.id))
            .with_filter(json!(["has", "point_count"]))
            .with_paint(
                "circle-radius",
                json!(["step", ["get", "point_count"], 20, 100, 30, 750, 40]),
            )
            .with_paint(
                "circle-color",
                json!([
                    "step",
                    ["get", "point_count"],
                    "#51bbd6",
                    100,
                    "#f1f075",
                    750,
                    "#f28cb1"
                ]),
            );
        merge(&mut props.paint, &self.circle.paint);
        merge(&mut props.layout, &self.circle.layout);
        props.handlers = self.handlers.clone();
        props
    }

    fn text_layer(&self) -> LayerProps {
        let mut props = LayerProps::new(LayerType::Symbol)
            .with_id(format!("{}2", self.id))
            .with_filter(json!(["has", "point_count"]))
            .with_layout("text-field", json!(["get", "point_count"]))
            .with_layout("text-size", json!(12));
        merge(&mut props.layout, &self.text.layout);
        merge(&mut props.paint, &self.text.paint);
        props
    }
}

fn merge(target: &mut Map<String, Value>, overrides: &Map<String, Value>) {
    for (key, value) in overrides {
        target.insert(key.clone(), value.clone());
    }
}

/// Bubble and count layers over a clustered source
#[derive(Debug)]
pub struct ClusterLayer {
    id: String,
    circle: LayerBinder,
    text: LayerBinder,
}

impl ClusterLayer {
    pub fn new(props: &ClusterProps, source: &str, context: &mut BindingContext) -> Self {
        Self {
            id: props.id.clone(),
            circle: LayerBinder::new(&props.circle_layer(), Some(source), context),
            text: LayerBinder::new(&props.text_layer(), Some(source), context),
        }
    }

    pub fn layer_ids(&self) -> [&str; 2] {
        [self.circle.id(), self.text.id()]
    }

    pub fn reconcile(&mut self, map: &mut MapInstance, props: ClusterProps) -> Result<Reconciled> {
        let circle = self.circle.reconcile(map, props.circle_layer())?;
        let text = self.text.reconcile(map, props.text_layer())?;
        Ok(circle.merge(text))
    }

    pub fn teardown(&mut self, map: &mut MapInstance) -> Result<Reconciled> {
        self.text.teardown(map)?;
        self.circle.teardown(map)
    }
}

impl Binder for ClusterLayer {
    type Props = ClusterProps;

    fn id(&self) -> &str {
        &self.id
    }

    fn reconcile(&mut self, map: &mut MapInstance, props: ClusterProps) -> Result<Reconciled> {
        ClusterLayer::reconcile(self, map, props)
    }

    fn teardown(&mut self, map: &mut MapInstance) -> Result<Reconciled> {
        ClusterLayer::teardown(self, map)
    }
}
