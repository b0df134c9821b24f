use crate::{core::geo::LngLat, plugins::draw::feature::DrawFeature};

/// Features in insertion order plus the current selection
#[derive(Debug, Default)]
pub struct FeatureStore {
    features: Vec<DrawFeature>,
    selected: Vec<String>,
    counter: u64,
}

impl FeatureStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> String {
        self.counter += 1;
        format!("draw-{}", self.counter)
    }

    /// Adds or replaces a feature by id
    pub fn insert(&mut self, feature: DrawFeature) {
        match self.position(&feature.id) {
            Some(index) => self.features[index] = feature,
            None => self.features.push(feature),
        }
    }

    pub fn get(&self, id: &str) -> Option<&DrawFeature> {
        self.features.iter().find(|feature| feature.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut DrawFeature> {
        self.features.iter_mut().find(|feature| feature.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.position(id).is_some()
    }

    pub fn remove(&mut self, id: &str) -> Option<DrawFeature> {
        self.selected.retain(|selected| selected != id);
        self.position(id).map(|index| self.features.remove(index))
    }

    pub fn all(&self) -> &[DrawFeature] {
        &self.features
    }

    pub fn ids(&self) -> Vec<String> {
        self.features.iter().map(|feature| feature.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn selected_ids(&self) -> &[String] {
        &self.selected
    }

    pub fn selected(&self) -> Vec<&DrawFeature> {
        self.selected.iter().filter_map(|id| self.get(id)).collect()
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.iter().any(|selected| selected == id)
    }

    /// Replaces the selection; returns whether it changed
    pub fn set_selected(&mut self, ids: Vec<String>) -> bool {
        let ids: Vec<String> = ids.into_iter().filter(|id| self.contains(id)).collect();
        if ids == self.selected {
            return false;
        }
        self.selected = ids;
        true
    }

    /// Topmost feature within `tolerance` degrees of `at`
    pub fn hit(&self, at: LngLat, tolerance: f64) -> Option<&DrawFeature> {
        self.features
            .iter()
            .rev()
            .map(|feature| (feature, feature.geometry.distance_to(at)))
            .filter(|(_, distance)| *distance <= tolerance)
            .min_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(feature, _)| feature)
    }

    pub fn clear(&mut self) -> Vec<DrawFeature> {
        self.selected.clear();
        std::mem::take(&mut self.features)
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.features.iter().position(|feature| feature.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::geojson::Geometry;

    fn point(id: &str, lng: f64) -> DrawFeature {
        DrawFeature::generic(
            id,
            Geometry::Point {
                coordinates: LngLat::new(lng, 0.0),
            },
        )
    }

    #[test]
    fn test_selection_ignores_unknown_ids() {
        let mut store = FeatureStore::new();
        store.insert(point("a", 0.0));
        assert!(store.set_selected(vec!["a".into(), "ghost".into()]));
        assert_eq!(store.selected_ids(), ["a".to_string()]);
        assert!(!store.set_selected(vec!["a".into()]));
        store.remove("a");
        assert!(store.selected_ids().is_empty());
    }

    #[test]
    fn test_hit_prefers_closest() {
        let mut store = FeatureStore::new();
        store.insert(point("a", 0.0));
        store.insert(point("b", 0.001));
        assert_eq!(store.hit(LngLat::new(0.0009, 0.0), 0.01).unwrap().id, "b");
        assert!(store.hit(LngLat::new(1.0, 0.0), 0.01).is_none());
    }
}
