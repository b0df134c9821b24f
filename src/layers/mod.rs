//! Resource binders
//!
//! Each binder owns one declared resource (source, layer, marker, popup or a
//! composite of those), remembers the props it last applied and converges the
//! engine onto new props with the fewest calls it can.

pub mod cluster;
pub mod layer;
pub mod marker;
pub mod path;
pub mod popup;
pub mod source;
pub mod track;

use crate::{core::map::MapInstance, MapError, Result};

/// What a reconciliation pass did to its resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
    /// The resource did not exist and was added
    Created,
    /// At least one attribute was pushed to the engine
    Updated,
    /// Nothing differed; no engine call was made
    Unchanged,
    /// A precondition is not met yet; a later pass must retry
    Deferred,
    /// The resource was torn down
    Removed,
}

impl Reconciled {
    /// Folds the outcome of one part of a composite into the whole
    ///
    /// A deferred part defers the composite; otherwise the strongest change
    /// wins.
    pub fn merge(self, other: Reconciled) -> Reconciled {
        use Reconciled::*;
        match (self, other) {
            (Deferred, _) | (_, Deferred) => Deferred,
            (Created, _) | (_, Created) => Created,
            (Updated, _) | (_, Updated) => Updated,
            (Removed, _) | (_, Removed) => Removed,
            (Unchanged, Unchanged) => Unchanged,
        }
    }
}

/// A declared resource kept in sync with the engine
pub trait Binder {
    type Props;

    /// Engine-side identifier of the bound resource
    fn id(&self) -> &str;

    /// Converges the engine onto `props`
    fn reconcile(&mut self, map: &mut MapInstance, props: Self::Props) -> Result<Reconciled>;

    /// Removes the resource and everything bound to it
    fn teardown(&mut self, map: &mut MapInstance) -> Result<Reconciled>;
}

/// Outcomes of reconciling several independent resources
///
/// A failure is recorded against its resource and does not stop siblings
/// from being reconciled.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    pub outcomes: Vec<(String, Reconciled)>,
    pub failures: Vec<(String, MapError)>,
}

impl ReconcileReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, id: impl Into<String>, result: Result<Reconciled>) {
        let id = id.into();
        match result {
            Ok(outcome) => self.outcomes.push((id, outcome)),
            Err(err) => {
                log::warn!("reconciling `{}` failed: {}", id, err);
                self.failures.push((id, err));
            }
        }
    }

    /// Reconciles one binder and records the outcome under its id
    pub fn reconcile<B: Binder>(&mut self, binder: &mut B, map: &mut MapInstance, props: B::Props) {
        let result = binder.reconcile(map, props);
        self.record(binder.id().to_string(), result);
    }

    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn outcome(&self, id: &str) -> Option<Reconciled> {
        self.outcomes
            .iter()
            .find(|(resource, _)| resource == id)
            .map(|(_, outcome)| *outcome)
    }

    pub fn failed_ids(&self) -> Vec<&str> {
        self.failures.iter().map(|(id, _)| id.as_str()).collect()
    }

    pub fn deferred_ids(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| *outcome == Reconciled::Deferred)
            .map(|(id, _)| id.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_keeps_siblings() {
        let mut report = ReconcileReport::new();
        report.record("a", Ok(Reconciled::Created));
        report.record("b", Err(MapError::InvalidSourceType("custom".into())));
        report.record("c", Ok(Reconciled::Deferred));
        assert!(!report.is_ok());
        assert_eq!(report.outcome("a"), Some(Reconciled::Created));
        assert_eq!(report.failed_ids(), vec!["b"]);
        assert_eq!(report.deferred_ids(), vec!["c"]);
    }

    #[test]
    fn test_merge_prefers_deferred() {
        assert_eq!(
            Reconciled::Created.merge(Reconciled::Deferred),
            Reconciled::Deferred
        );
        assert_eq!(
            Reconciled::Unchanged.merge(Reconciled::Updated),
            Reconciled::Updated
        );
        assert_eq!(
            Reconciled::Unchanged.merge(Reconciled::Unchanged),
            Reconciled::Unchanged
        );
    }
}
