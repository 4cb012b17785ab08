//! Left join of facts onto a primary POI source.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use peak_motion_poi_models::{Coordinate, Poi, PoiId};

use crate::{PoiSource, SourceError};

/// Fetches from a primary source and attaches facts from a secondary
/// source by matching identifiers.
///
/// A failing primary fails the fetch. A failing facts lookup only costs
/// the facts: the primary records are returned without them.
pub struct FactJoinSource {
    id: String,
    primary: Arc<dyn PoiSource>,
    facts: Arc<dyn PoiSource>,
}

impl FactJoinSource {
    /// Joins `facts` onto `primary`.
    #[must_use]
    pub fn new(primary: Arc<dyn PoiSource>, facts: Arc<dyn PoiSource>) -> Self {
        Self {
            id: format!("{}+{}", primary.id(), facts.id()),
            primary,
            facts,
        }
    }
}

/// Copies each fact onto the primary record with the same identifier.
///
/// Primary records without a matching fact keep `fact` unset; facts
/// without a matching primary record are dropped.
#[must_use]
pub fn left_join(primary: Vec<Poi>, facts: Vec<Poi>) -> Vec<Poi> {
    let by_id: BTreeMap<PoiId, String> = facts
        .into_iter()
        .filter_map(|poi| poi.fact.map(|fact| (poi.id, fact)))
        .collect();

    primary
        .into_iter()
        .map(|mut poi| {
            if let Some(fact) = by_id.get(&poi.id).cloned() {
                poi.fact = Some(fact);
            }
            poi
        })
        .collect()
}

#[async_trait]
impl PoiSource for FactJoinSource {
    fn id(&self) -> &str {
        &self.id
    }

    async fn fetch(&self, center: &Coordinate, radius_meters: u32) -> Result<Vec<Poi>, SourceError> {
        let (primary, facts) = tokio::join!(
            self.primary.fetch(center, radius_meters),
            self.facts.fetch(center, radius_meters),
        );

        let primary = primary?;
        let facts = facts.unwrap_or_else(|e| {
            log::warn!("Facts lookup via {} failed, continuing without facts: {e}", self.facts.id());
            Vec::new()
        });

        Ok(left_join(primary, facts))
    }
}
