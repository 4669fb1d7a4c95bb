//! Component-to-item association.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::models::menu::{BoundingBox, ComponentRole, ItemGroup};

/// IoU threshold used by [`AssociationStrategy::overlap`].
pub const DEFAULT_OVERLAP_THRESHOLD: f32 = 0.3;

/// Predicate deciding whether a component belongs to an item box.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssociationStrategy {
    /// The component lies entirely inside the item box.
    #[default]
    Containment,
    /// Item/component IoU is at least `threshold`. Tolerates components
    /// that spill slightly past a loosely detected item box.
    Overlap { threshold: f32 },
}

impl AssociationStrategy {
    /// Overlap strategy with the default threshold.
    pub fn overlap() -> Self {
        AssociationStrategy::Overlap {
            threshold: DEFAULT_OVERLAP_THRESHOLD,
        }
    }

    /// Does `component` belong to `item` under this strategy?
    pub fn matches(&self, item: &BoundingBox, component: &BoundingBox) -> bool {
        match *self {
            AssociationStrategy::Containment => item.contains(component),
            AssociationStrategy::Overlap { threshold } => item.iou(component) >= threshold,
        }
    }
}

/// Groups title, description and price boxes under their enclosing item box.
#[derive(Debug, Clone, Default)]
pub struct BoxAssociator {
    strategy: AssociationStrategy,
}

impl BoxAssociator {
    /// Create an associator using the given strategy.
    pub fn new(strategy: AssociationStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> AssociationStrategy {
        self.strategy
    }

    /// Associate components with item boxes.
    ///
    /// The result is an insertion-ordered mapping keyed by item rectangle:
    /// items appear in input order, and an item whose coordinates repeat an
    /// earlier one replaces that entry's components in place.
    ///
    /// Every component is tested against every item, so a component may be
    /// assigned to several overlapping items. When several candidates of the
    /// same role match one item, the last one in input order wins. Items
    /// with no matching component are dropped.
    pub fn associate(&self, boxes: &[BoundingBox]) -> Vec<ItemGroup> {
        let mut items = Vec::new();
        let mut components = Vec::new();
        for bbox in boxes {
            match bbox.role {
                ComponentRole::Item => items.push(bbox),
                _ => components.push(bbox),
            }
        }

        debug!(
            "Associating {} components with {} items ({:?})",
            components.len(),
            items.len(),
            self.strategy
        );

        let mut groups: Vec<ItemGroup> = Vec::with_capacity(items.len());

        for item in items {
            let mut group = ItemGroup::new(*item);

            for role in [
                ComponentRole::Title,
                ComponentRole::Description,
                ComponentRole::Price,
            ] {
                for candidate in components.iter().filter(|c| c.role == role) {
                    if !self.strategy.matches(item, candidate) {
                        continue;
                    }
                    if let Some(previous) = group.component(role) {
                        debug!(
                            "Item {:?}: {} {:?} replaces {:?}",
                            item.rect(),
                            role,
                            candidate.rect(),
                            previous.rect()
                        );
                    }
                    group.assign(**candidate);
                }
            }

            if !group.has_components() {
                trace!("Dropping item {:?} with no components", item.rect());
                continue;
            }

            match groups.iter_mut().find(|g| g.item.same_rect(item)) {
                Some(existing) => *existing = group,
                None => groups.push(group),
            }
        }

        debug!("Associated {} item groups", groups.len());
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn bbox(rect: [f32; 4], role: ComponentRole) -> BoundingBox {
        BoundingBox::new(rect[0], rect[1], rect[2], rect[3], 0.9, role)
    }

    fn scenario() -> Vec<BoundingBox> {
        vec![
            bbox([0.0, 0.0, 50.0, 50.0], ComponentRole::Item),
            bbox([2.0, 2.0, 40.0, 10.0], ComponentRole::Title),
            bbox([2.0, 12.0, 40.0, 20.0], ComponentRole::Description),
            bbox([2.0, 22.0, 40.0, 30.0], ComponentRole::Price),
            bbox([0.0, 60.0, 50.0, 110.0], ComponentRole::Item),
            bbox([2.0, 62.0, 40.0, 70.0], ComponentRole::Price),
        ]
    }

    #[test]
    fn test_containment_groups_components() {
        let groups = BoxAssociator::default().associate(&scenario());
        assert_eq!(groups.len(), 2);

        let first = &groups[0];
        assert_eq!(first.item.rect(), [0.0, 0.0, 50.0, 50.0]);
        assert_eq!(first.title.map(|b| b.rect()), Some([2.0, 2.0, 40.0, 10.0]));
        assert_eq!(first.description.map(|b| b.rect()), Some([2.0, 12.0, 40.0, 20.0]));
        assert_eq!(first.price.map(|b| b.rect()), Some([2.0, 22.0, 40.0, 30.0]));

        let second = &groups[1];
        assert_eq!(second.item.rect(), [0.0, 60.0, 50.0, 110.0]);
        assert_eq!(second.title, None);
        assert_eq!(second.description, None);
        assert_eq!(second.price.map(|b| b.rect()), Some([2.0, 62.0, 40.0, 70.0]));
    }

    #[test]
    fn test_component_order_does_not_matter_across_roles() {
        let mut boxes = scenario();
        boxes.reverse();
        let groups = BoxAssociator::default().associate(&boxes);
        // Items come out in their (reversed) input order
        assert_eq!(groups[0].item.y1, 60.0);
        assert_eq!(groups[1].title.map(|b| b.y1), Some(2.0));
    }

    #[test]
    fn test_item_without_components_is_dropped() {
        let boxes = vec![
            bbox([0.0, 0.0, 50.0, 50.0], ComponentRole::Item),
            bbox([100.0, 0.0, 150.0, 50.0], ComponentRole::Item),
            bbox([110.0, 10.0, 140.0, 20.0], ComponentRole::Description),
        ];
        let groups = BoxAssociator::default().associate(&boxes);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].item.x1, 100.0);
    }

    #[test]
    fn test_partially_outside_component_is_not_contained() {
        let boxes = vec![
            bbox([0.0, 0.0, 100.0, 100.0], ComponentRole::Item),
            bbox([10.0, 10.0, 110.0, 90.0], ComponentRole::Price),
        ];
        assert!(BoxAssociator::default().associate(&boxes).is_empty());
    }

    /// Same-role ties resolve to the last candidate in input order, not the
    /// most confident one.
    #[test]
    fn test_tie_break_keeps_last_candidate() {
        let mut confident = bbox([5.0, 5.0, 20.0, 15.0], ComponentRole::Price);
        confident.confidence = 0.99;
        let mut weak = bbox([25.0, 5.0, 45.0, 15.0], ComponentRole::Price);
        weak.confidence = 0.30;

        let boxes = vec![bbox([0.0, 0.0, 50.0, 50.0], ComponentRole::Item), confident, weak];
        let groups = BoxAssociator::default().associate(&boxes);
        assert_eq!(groups[0].price, Some(weak));

        let boxes = vec![bbox([0.0, 0.0, 50.0, 50.0], ComponentRole::Item), weak, confident];
        let groups = BoxAssociator::default().associate(&boxes);
        assert_eq!(groups[0].price, Some(confident));
    }

    #[test]
    fn test_component_shared_by_nested_items() {
        let boxes = vec![
            bbox([0.0, 0.0, 100.0, 100.0], ComponentRole::Item),
            bbox([0.0, 0.0, 60.0, 60.0], ComponentRole::Item),
            bbox([10.0, 10.0, 50.0, 20.0], ComponentRole::Price),
        ];
        let groups = BoxAssociator::default().associate(&boxes);
        assert_eq!(groups.len(), 2);
        assert!(groups.iter().all(|g| g.price.map(|p| p.x1) == Some(10.0)));
    }

    #[test]
    fn test_duplicate_item_rect_keeps_first_position() {
        let mut again = bbox([0.0, 0.0, 50.0, 50.0], ComponentRole::Item);
        again.confidence = 0.4;
        let boxes = vec![
            bbox([0.0, 0.0, 50.0, 50.0], ComponentRole::Item),
            bbox([60.0, 0.0, 110.0, 50.0], ComponentRole::Item),
            again,
            bbox([5.0, 5.0, 20.0, 15.0], ComponentRole::Price),
            bbox([65.0, 5.0, 80.0, 15.0], ComponentRole::Price),
        ];
        let groups = BoxAssociator::default().associate(&boxes);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].item.x1, 0.0);
        assert_eq!(groups[0].item.confidence, 0.4);
        assert_eq!(groups[1].item.x1, 60.0);
    }

    #[test]
    fn test_overlap_strategy() {
        // Title IoU with item: 40*10 / (40*40) = 0.25; price: 40*20 / 1600 = 0.5
        let boxes = vec![
            bbox([0.0, 0.0, 40.0, 40.0], ComponentRole::Item),
            bbox([0.0, 0.0, 40.0, 10.0], ComponentRole::Title),
            bbox([0.0, 20.0, 40.0, 40.0], ComponentRole::Price),
        ];

        let groups = BoxAssociator::new(AssociationStrategy::overlap()).associate(&boxes);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].title, None);
        assert!(groups[0].has_price());

        let loose = AssociationStrategy::Overlap { threshold: 0.2 };
        let groups = BoxAssociator::new(loose).associate(&boxes);
        assert!(groups[0].title.is_some());
    }

    #[test]
    fn test_overlap_accepts_component_spilling_outside() {
        let boxes = vec![
            bbox([0.0, 0.0, 40.0, 40.0], ComponentRole::Item),
            bbox([0.0, 10.0, 44.0, 40.0], ComponentRole::Price),
        ];
        assert!(BoxAssociator::default().associate(&boxes).is_empty());
        let groups = BoxAssociator::new(AssociationStrategy::overlap()).associate(&boxes);
        assert_eq!(groups.len(), 1);
    }
}
