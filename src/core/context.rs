//! Process-wide binding state
//!
//! Id counters and the instance pool live here instead of in statics so a
//! test (or a host running several independent trees) can start from a clean
//! slate.

use crate::{
    core::{
        config::{MapProps, MountIntent, SchedulerConfig},
        map::MapInstance,
    },
    plugins::draw::DrawConfig,
    traits::{Container, EngineFactory},
    Result,
};

/// Settings every instance created by a context starts with
#[derive(Debug, Clone, Default)]
pub struct ContextConfig {
    pub scheduler: SchedulerConfig,
    pub draw: DrawConfig,
}

/// Owner of the id counters and the reuse pool
///
/// Counters start at zero and are incremented before use, so the first
/// generated ids are `source-1` and `layer-1`.
#[derive(Debug, Default)]
pub struct BindingContext {
    config: ContextConfig,
    source_counter: u64,
    layer_counter: u64,
    instance_counter: u64,
    pool: Vec<MapInstance>,
}

impl BindingContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ContextConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    pub fn next_source_id(&mut self) -> String {
        self.source_counter += 1;
        format!("source-{}", self.source_counter)
    }

    pub fn next_layer_id(&mut self) -> String {
        self.layer_counter += 1;
        format!("layer-{}", self.layer_counter)
    }

    /// Builds a fresh instance
    pub fn create(
        &mut self,
        factory: &dyn EngineFactory,
        props: MapProps,
        container: Container,
    ) -> Result<MapInstance> {
        self.instance_counter += 1;
        MapInstance::create(
            self.instance_counter,
            factory,
            props,
            container,
            &self.config,
        )
    }

    /// Pops the most recently pooled instance into `container`
    ///
    /// Returns `Ok(None)` when the pool is empty.
    pub fn reuse(&mut self, container: Container, props: MapProps) -> Result<Option<MapInstance>> {
        let Some(mut instance) = self.pool.pop() else {
            return Ok(None);
        };
        instance.revive(container, props)?;
        Ok(Some(instance))
    }

    /// Borrows the most recently pooled instance as is
    pub fn canuse(&mut self) -> Option<MapInstance> {
        let mut instance = self.pool.pop()?;
        instance.mark_active();
        Some(instance)
    }

    /// Mount-time entry point honoring the props' reuse intent
    ///
    /// Reuse falls back to creating when the pool is empty; canuse never
    /// creates and yields `None` instead. The engine is resized after mount.
    pub fn mount(
        &mut self,
        factory: &dyn EngineFactory,
        props: MapProps,
        container: Container,
    ) -> Result<Option<MapInstance>> {
        let mut instance = match props.intent() {
            MountIntent::Canuse => return Ok(self.canuse()),
            MountIntent::Reuse => match self.reuse(container.clone(), props.clone())? {
                Some(instance) => instance,
                None => self.create(factory, props, container)?,
            },
            MountIntent::Create => self.create(factory, props, container)?,
        };
        instance.resize();
        Ok(Some(instance))
    }

    /// Unmount-time entry point: pool the instance or destroy it
    pub fn unmount(&mut self, instance: MapInstance) {
        if instance.props().reuse || instance.props().canuse {
            self.recycle(instance);
        } else {
            self.destroy(instance);
        }
    }

    /// Parks an instance in the pool without touching its handle
    pub fn recycle(&mut self, mut instance: MapInstance) {
        instance.recycle();
        self.pool.push(instance);
    }

    /// Removes an instance's handle and drops any pool entry for it
    pub fn destroy(&mut self, instance: MapInstance) {
        let id = instance.id();
        self.pool.retain(|pooled| pooled.id() != id);
        instance.destroy();
    }

    pub fn pool_len(&self) -> usize {
        self.pool.len()
    }

    pub fn pooled_ids(&self) -> Vec<u64> {
        self.pool.iter().map(MapInstance::id).collect()
    }

    /// Destroys every pooled instance and resets the counters
    pub fn shutdown(&mut self) {
        for instance in self.pool.drain(..) {
            instance.destroy();
        }
        self.source_counter = 0;
        self.layer_counter = 0;
        self.instance_counter = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{testing::RecordingEngine, traits::ContainerElement};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_id_counters() {
        let mut context = BindingContext::new();
        assert_eq!(context.next_source_id(), "source-1");
        assert_eq!(context.next_source_id(), "source-2");
        assert_eq!(context.next_layer_id(), "layer-1");
        context.shutdown();
        assert_eq!(context.next_source_id(), "source-1");
    }

    #[test]
    fn test_reuse_on_empty_pool() {
        let mut context = BindingContext::new();
        let container = Arc::new(Mutex::new(ContainerElement::new("map")));
        assert!(context
            .reuse(container, MapProps::default())
            .unwrap()
            .is_none());
        assert!(context.canuse().is_none());
    }

    #[test]
    fn test_mount_reuse_falls_back_to_create() {
        let mut context = BindingContext::new();
        let engine = RecordingEngine::new();
        let probe = engine.probe();
        let factory = engine.into_factory();
        let container = Arc::new(Mutex::new(ContainerElement::new("map")));
        let props = MapProps {
            reuse: true,
            ..MapProps::default()
        };
        let instance = context.mount(&factory, props, container).unwrap().unwrap();
        assert_eq!(instance.id(), 1);
        assert_eq!(probe.calls_named("resize").len(), 1);

        context.unmount(instance);
        assert_eq!(context.pool_len(), 1);
        assert!(!probe.is_removed());
    }
}
