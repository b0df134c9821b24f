use maplet_sync::{
    core::{builder::MapPropsBuilder, context::BindingContext},
    testing::{RecordingEngine, StaticImageLoader},
    traits::{Container, ContainerElement, ImageData},
    LngLat, MapError, MapEvent, MapEventKind,
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

fn container(id: &str) -> Container {
    Arc::new(Mutex::new(ContainerElement::new(id)))
}

#[test]
fn test_reuse_round_trip_keeps_handle() {
    let engine = RecordingEngine::new();
    let probe = engine.probe();
    let factory = engine.into_factory();
    let mut context = BindingContext::new();

    let first = container("first");
    first.lock().unwrap().children.push("canvas".into());
    let props = MapPropsBuilder::new().reuse().build();
    let instance = context
        .mount(&factory, props.clone(), first.clone())
        .unwrap()
        .unwrap();
    let id = instance.id();
    context.unmount(instance);
    assert_eq!(context.pooled_ids(), vec![id]);
    assert!(!probe.is_removed());

    let second = container("second");
    let props = MapPropsBuilder::new()
        .reuse()
        .with_center_and_zoom(LngLat::new(10.0, 20.0), 4.0)
        .build();
    let instance = context.mount(&factory, props, second.clone()).unwrap().unwrap();
    assert_eq!(instance.id(), id);
    assert!(!instance.is_recycled());
    assert_eq!(context.pool_len(), 0);
    assert_eq!(second.lock().unwrap().children, vec!["canvas".to_string()]);
    assert!(first.lock().unwrap().children.is_empty());
    assert!(Arc::ptr_eq(&probe.container(), &second));
}

#[test]
fn test_canuse_borrows_without_creating() {
    let engine = RecordingEngine::new();
    let factory = engine.into_factory();
    let mut context = BindingContext::new();

    let borrowed = context
        .mount(&factory, MapPropsBuilder::new().canuse().build(), container("a"))
        .unwrap();
    assert!(borrowed.is_none());

    let instance = context
        .mount(&factory, MapPropsBuilder::new().reuse().build(), container("a"))
        .unwrap()
        .unwrap();
    context.unmount(instance);

    let borrowed = context
        .mount(&factory, MapPropsBuilder::new().canuse().build(), container("b"))
        .unwrap()
        .unwrap();
    assert_eq!(borrowed.id(), 1);
    assert_eq!(context.pool_len(), 0);
}

#[test]
fn test_plain_unmount_destroys() {
    let engine = RecordingEngine::new();
    let probe = engine.probe();
    let factory = engine.into_factory();
    let mut context = BindingContext::new();

    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();
    let props = MapPropsBuilder::new()
        .on(MapEventKind::MoveEnd, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .build();
    let mut instance = context.mount(&factory, props, container("map")).unwrap().unwrap();
    probe.emit_map(MapEvent::new(MapEventKind::MoveEnd));
    instance.process_events();
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    context.unmount(instance);
    assert_eq!(context.pool_len(), 0);
    assert!(probe.is_removed());
    assert_eq!(probe.listener_count(), 0);
}

#[tokio::test]
async fn test_images_load_once_and_update_existing() {
    let engine = RecordingEngine::new();
    let probe = engine.probe();
    let factory = engine.into_factory();
    let mut context = BindingContext::new();
    let mut map = context
        .create(&factory, MapPropsBuilder::new().build(), container("map"))
        .unwrap();
    map.set_image_loader(Arc::new(
        StaticImageLoader::new()
            .with_image("pin.png", ImageData::new(1, 1, vec![255; 4]))
            .with_image("pin@2x.png", ImageData::new(2, 2, vec![0; 16])),
    ));

    assert!(map.add_image("pin", "pin.png").await.unwrap());
    assert!(map.add_image("pin", "pin@2x.png").await.unwrap());
    assert_eq!(probe.calls_named("add_image").len(), 1);

    assert!(map.update_image("pin", "pin@2x.png").await.unwrap());
    assert_eq!(probe.calls_named("update_image").len(), 1);
    assert_eq!(map.list_images(), vec!["pin".to_string()]);

    map.remove_image("pin");
    assert!(map.list_images().is_empty());
}

#[tokio::test]
async fn test_batch_image_load_is_all_or_nothing() {
    let engine = RecordingEngine::new();
    let probe = engine.probe();
    let factory = engine.into_factory();
    let mut context = BindingContext::new();
    let mut map = context
        .create(&factory, MapPropsBuilder::new().build(), container("map"))
        .unwrap();
    map.set_image_loader(Arc::new(
        StaticImageLoader::new()
            .with_image("a.png", ImageData::new(1, 1, vec![1; 4]))
            .with_image("b.png", ImageData::new(1, 1, vec![2; 4])),
    ));

    let err = map
        .add_images(&[("a", "a.png"), ("c", "c.png")])
        .await
        .unwrap_err();
    assert!(matches!(err, MapError::ImageLoad { .. }));
    assert!(map.list_images().is_empty());

    map.add_image("a", "a.png").await.unwrap();
    let added = map
        .add_images(&[("a", "a.png"), ("b", "b.png"), ("b", "b.png")])
        .await
        .unwrap();
    assert_eq!(added, vec!["b".to_string()]);
    assert_eq!(probe.calls_named("add_image").len(), 2);
}

#[tokio::test]
async fn test_image_errors() {
    let engine = RecordingEngine::new();
    let factory = engine.into_factory();
    let mut context = BindingContext::new();
    let mut map = context
        .create(&factory, MapPropsBuilder::new().build(), container("map"))
        .unwrap();

    let err = map.update_image("ghost", "ghost.png").await.unwrap_err();
    assert!(matches!(err, MapError::ImageNotFound(name) if name == "ghost"));

    let err = map.add_image("pin", "pin.png").await.unwrap_err();
    assert!(matches!(err, MapError::ImageLoad { .. }));

    map.set_image_loader(Arc::new(StaticImageLoader::new()));
    let err = map.add_image("pin", "missing.png").await.unwrap_err();
    match err {
        MapError::ImageLoad { name, .. } => assert_eq!(name, "missing.png"),
        other => panic!("unexpected error: {}", other),
    }
}
