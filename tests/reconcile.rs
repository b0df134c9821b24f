use maplet_sync::{
    core::{config::MapProps, context::BindingContext, map::MapInstance},
    layers::{
        cluster::ClusterProps,
        layer::{LayerProps, LayerType},
        path::PathProps,
        source::{SourceProps, SourceType},
    },
    testing::{EngineCall, EngineProbe, RecordingEngine},
    traits::ContainerElement,
    ClusterLayer, LayerBinder, MapError, PathLayer, Reconciled, ReconcileReport, SourceBinder,
};
use serde_json::json;
use std::sync::{Arc, Mutex};

fn mount(engine: RecordingEngine) -> (BindingContext, MapInstance, EngineProbe) {
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

fn points() -> SourceProps {
    SourceProps::geojson(json!({"type": "FeatureCollection", "features": []})).with_id("points")
}

#[test]
fn test_source_then_layer_then_ordered_removal() {
    let (mut context, mut map, probe) = mount(RecordingEngine::new());
    let mut source = SourceBinder::new(&points(), &mut context);
    assert_eq!(
        source.reconcile(&mut map, points()).unwrap(),
        Reconciled::Created
    );

    let layer_props = LayerProps::new(LayerType::Circle).with_paint("circle-radius", json!(4));
    let mut layer = LayerBinder::new(&layer_props, Some(source.id()), &mut context);
    assert_eq!(
        layer.reconcile(&mut map, layer_props).unwrap(),
        Reconciled::Created
    );
    assert_eq!(probe.layer("layer-1").unwrap()["source"], json!("points"));

    map.engine_mut()
        .set_terrain(Some(&json!({"source": "points"})))
        .unwrap();
    probe.clear_calls();

    assert_eq!(source.remove(&mut map).unwrap(), Reconciled::Removed);
    let order: Vec<&str> = probe
        .mutations()
        .iter()
        .map(|call| call.name())
        .collect();
    assert_eq!(order, vec!["remove_layer", "set_terrain", "remove_source"]);
    assert!(probe.source_ids().is_empty());
    assert!(probe.terrain().is_none());
}

#[test]
fn test_layer_waits_for_style_and_source() -> anyhow::Result<()> {
    let (mut context, mut map, probe) = mount(RecordingEngine::new().with_style_loaded(false));
    let mut source = SourceBinder::new(&points(), &mut context);
    let layer_props = LayerProps::new(LayerType::Line);
    let mut layer = LayerBinder::new(&layer_props, Some("points"), &mut context);

    assert_eq!(source.reconcile(&mut map, points())?, Reconciled::Deferred);
    assert_eq!(
        layer.reconcile(&mut map, layer_props.clone())?,
        Reconciled::Deferred
    );
    assert!(probe.layer_ids().is_empty());

    probe.set_style_loaded(true);
    map.tick();
    source.reconcile(&mut map, points())?;
    map.tick();
    assert_eq!(layer.reconcile(&mut map, layer_props)?, Reconciled::Created);
    assert_eq!(probe.layer_ids(), vec!["layer-1"]);
    Ok(())
}

#[test]
fn test_failed_sibling_does_not_block_others() {
    let (mut context, mut map, probe) = mount(RecordingEngine::new());
    let custom = SourceProps::new(SourceType::Custom)
        .with_id("custom")
        .with("impl", json!("a"));
    let mut custom_binder = SourceBinder::new(&custom, &mut context);
    let mut points_binder = SourceBinder::new(&points(), &mut context);
    custom_binder.reconcile(&mut map, custom.clone()).unwrap();
    points_binder.reconcile(&mut map, points()).unwrap();

    let mut report = ReconcileReport::new();
    report.reconcile(
        &mut custom_binder,
        &mut map,
        custom.with("impl", json!("b")),
    );
    report.reconcile(
        &mut points_binder,
        &mut map,
        SourceProps::geojson(json!({"type": "Point", "coordinates": [1, 2]})).with_id("points"),
    );

    assert_eq!(report.failed_ids(), vec!["custom"]);
    assert!(matches!(
        report.failures[0].1,
        MapError::InvalidSourceType(ref tag) if tag == "custom"
    ));
    assert_eq!(report.outcome("points"), Some(Reconciled::Updated));
    assert_eq!(
        probe.source("points").unwrap()["data"],
        json!({"type": "Point", "coordinates": [1, 2]})
    );
}

#[test]
fn test_composites_share_one_source() {
    let (mut context, mut map, probe) = mount(RecordingEngine::new());
    let source_props = SourceProps::geojson(json!({"type": "FeatureCollection", "features": []}))
        .with_id("stations")
        .with("cluster", json!(true));
    let mut source = SourceBinder::new(&source_props, &mut context);
    source.reconcile(&mut map, source_props).unwrap();

    let cluster_props = ClusterProps::new("stations");
    let mut cluster = ClusterLayer::new(&cluster_props, source.id(), &mut context);
    assert_eq!(
        cluster.reconcile(&mut map, cluster_props).unwrap(),
        Reconciled::Created
    );
    assert_eq!(cluster.layer_ids(), ["stations1", "stations2"]);

    let path_props = PathProps::new(
        "route",
        json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "geometry": {"type": "LineString", "coordinates": [[0, 0], [1, 1]]},
                "properties": {}
            }]
        }),
    );
    let mut path = PathLayer::new(&path_props, &mut context);
    path.reconcile(&mut map, path_props).unwrap();

    let layers = probe.layer_ids();
    for id in ["stations1", "stations2", "path_route", "arrow_route"] {
        assert!(layers.contains(&id.to_string()), "missing layer {}", id);
    }

    cluster.teardown(&mut map).unwrap();
    path.teardown(&mut map).unwrap();
    map.tick();
    assert!(probe.layer_ids().is_empty());
}

/// Xorshift generator so every run builds the same graphs
struct Xorshift(u64);

impl Xorshift {
    fn below(&mut self, bound: usize) -> usize {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        (self.0 % bound as u64) as usize
    }

    fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            items.swap(i, self.below(i + 1));
        }
    }
}

#[test]
fn test_random_graphs_remove_layers_before_sources() {
    for seed in 1..=64u64 {
        let mut rng = Xorshift(seed.wrapping_mul(0x9E37_79B9_7F4A_7C15));
        let (mut context, mut map, probe) = mount(RecordingEngine::new());

        let mut sources = Vec::new();
        for i in 0..1 + rng.below(4) {
            let props = points().with_id(format!("s{}", i));
            let mut binder = SourceBinder::new(&props, &mut context);
            binder.reconcile(&mut map, props).unwrap();
            sources.push(binder);
        }

        let mut references = Vec::new();
        for i in 0..rng.below(8) {
            let source = format!("s{}", rng.below(sources.len()));
            let props = LayerProps::new(LayerType::Circle)
                .with_id(format!("l{}", i))
                .with_source(source.clone());
            let mut binder = LayerBinder::new(&props, None, &mut context);
            binder.reconcile(&mut map, props).unwrap();
            references.push((format!("l{}", i), source));
        }

        let terrain = (rng.below(2) == 0).then(|| format!("s{}", rng.below(sources.len())));
        if let Some(source) = &terrain {
            map.engine_mut()
                .set_terrain(Some(&json!({ "source": source })))
                .unwrap();
        }
        probe.clear_calls();

        rng.shuffle(&mut sources);
        for binder in &mut sources {
            assert_eq!(
                binder.remove(&mut map).unwrap(),
                Reconciled::Removed,
                "seed {}",
                seed
            );
        }

        let calls = probe.mutations();
        let position = |wanted: &EngineCall| calls.iter().position(|call| call == wanted);
        for (layer, source) in &references {
            let removed_layer = position(&EngineCall::RemoveLayer(layer.clone()));
            let removed_source = position(&EngineCall::RemoveSource(source.clone()));
            assert!(
                removed_layer.is_some() && removed_layer < removed_source,
                "seed {}: `{}` not removed before `{}`",
                seed,
                layer,
                source
            );
        }
        if let Some(source) = &terrain {
            let unbound = position(&EngineCall::SetTerrain(None));
            assert!(
                unbound.is_some() && unbound < position(&EngineCall::RemoveSource(source.clone())),
                "seed {}: terrain still bound to `{}`",
                seed,
                source
            );
        }
        assert!(probe.source_ids().is_empty());
        assert!(probe.layer_ids().is_empty());
    }
}

#[test]
fn test_path_refilled_within_one_frame_keeps_layers() {
    let (mut context, mut map, probe) = mount(RecordingEngine::new());
    let full = PathProps::new(
        "p",
        json!({
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "geometry": {"type": "LineString", "coordinates": [[0, 0], [1, 1]]},
                "properties": {}
            }]
        }),
    );
    let empty = PathProps::new("p", json!({"type": "FeatureCollection", "features": []}));
    let mut path = PathLayer::new(&full, &mut context);

    path.reconcile(&mut map, full.clone()).unwrap();
    path.reconcile(&mut map, empty).unwrap();
    path.reconcile(&mut map, full).unwrap();
    assert_eq!(probe.layer_ids(), vec!["path_p", "arrow_p"]);

    map.tick();
    assert_eq!(probe.layer_ids(), vec!["path_p", "arrow_p"]);
    assert_eq!(probe.layer_listener_count("path_p"), 10);
}
