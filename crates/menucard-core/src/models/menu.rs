//! Menu data model: classified boxes, item groups and extracted records.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Semantic role of a detected box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentRole {
    /// Container box enclosing one dish.
    Item,
    /// Dish name.
    Title,
    /// Dish description.
    Description,
    /// Price tag.
    Price,
}

impl ComponentRole {
    /// Map a detector class id to a role.
    ///
    /// The menu model was trained with `0 = description`, `1 = item`,
    /// `2 = price`, `3 = title`. Any other id is not a menu component.
    pub fn from_class_id(class_id: u32) -> Option<Self> {
        match class_id {
            0 => Some(ComponentRole::Description),
            1 => Some(ComponentRole::Item),
            2 => Some(ComponentRole::Price),
            3 => Some(ComponentRole::Title),
            _ => None,
        }
    }

    /// Detector class id of this role.
    pub fn class_id(&self) -> u32 {
        match self {
            ComponentRole::Description => 0,
            ComponentRole::Item => 1,
            ComponentRole::Price => 2,
            ComponentRole::Title => 3,
        }
    }

    /// RGB color used when drawing boxes of this role.
    pub fn color(&self) -> [u8; 3] {
        match self {
            ComponentRole::Description => [0, 0, 255],
            ComponentRole::Item => [0, 255, 0],
            ComponentRole::Price => [255, 0, 0],
            ComponentRole::Title => [128, 0, 128],
        }
    }

    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentRole::Item => "item",
            ComponentRole::Title => "title",
            ComponentRole::Description => "description",
            ComponentRole::Price => "price",
        }
    }
}

impl fmt::Display for ComponentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An axis-aligned, classified box in page pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    /// Detection confidence (0.0 - 1.0).
    pub confidence: f32,
    pub role: ComponentRole,
}

impl BoundingBox {
    /// Create a box, normalising swapped corners so that `x1 <= x2` and `y1 <= y2`.
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32, role: ComponentRole) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
            confidence,
            role,
        }
    }

    /// Convert a raw detector tuple `[x1, y1, x2, y2, confidence, class_id]`.
    ///
    /// Returns `None` when the class id is not a whole number with a menu role.
    pub fn from_raw(raw: [f32; 6]) -> Option<Self> {
        let [x1, y1, x2, y2, confidence, class_id] = raw;
        if !class_id.is_finite() || class_id < 0.0 || class_id.fract() != 0.0 {
            return None;
        }
        let role = ComponentRole::from_class_id(class_id as u32)?;
        Some(Self::new(x1, y1, x2, y2, confidence, role))
    }

    /// Back to the raw detector tuple.
    pub fn to_raw(&self) -> [f32; 6] {
        [
            self.x1,
            self.y1,
            self.x2,
            self.y2,
            self.confidence,
            self.role.class_id() as f32,
        ]
    }

    /// Coordinates as `[x1, y1, x2, y2]`.
    pub fn rect(&self) -> [f32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// True when `inner` lies entirely inside this box (edges may touch).
    pub fn contains(&self, inner: &BoundingBox) -> bool {
        inner.x1 >= self.x1 && inner.y1 >= self.y1 && inner.x2 <= self.x2 && inner.y2 <= self.y2
    }

    /// Intersection over union with another box; 0 when the union is empty.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);

        let intersection = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 { intersection / union } else { 0.0 }
    }

    /// Same coordinates, ignoring confidence and role.
    pub fn same_rect(&self, other: &BoundingBox) -> bool {
        self.rect() == other.rect()
    }
}

/// One item box with the components found inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemGroup {
    pub item: BoundingBox,
    pub title: Option<BoundingBox>,
    pub description: Option<BoundingBox>,
    pub price: Option<BoundingBox>,
}

impl ItemGroup {
    /// An item with no components yet.
    pub fn new(item: BoundingBox) -> Self {
        Self {
            item,
            title: None,
            description: None,
            price: None,
        }
    }

    /// Component slot for a role; `None` for [`ComponentRole::Item`].
    pub fn component(&self, role: ComponentRole) -> Option<&BoundingBox> {
        match role {
            ComponentRole::Title => self.title.as_ref(),
            ComponentRole::Description => self.description.as_ref(),
            ComponentRole::Price => self.price.as_ref(),
            ComponentRole::Item => None,
        }
    }

    /// Overwrite the slot matching the component's role.
    pub fn assign(&mut self, component: BoundingBox) {
        match component.role {
            ComponentRole::Title => self.title = Some(component),
            ComponentRole::Description => self.description = Some(component),
            ComponentRole::Price => self.price = Some(component),
            ComponentRole::Item => {}
        }
    }

    /// At least one of title, description or price is present.
    pub fn has_components(&self) -> bool {
        self.title.is_some() || self.description.is_some() || self.price.is_some()
    }

    pub fn has_price(&self) -> bool {
        self.price.is_some()
    }
}

/// Item groups in reading order. Positions are 1-based in reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderedMenu {
    items: Vec<ItemGroup>,
}

impl OrderedMenu {
    /// Wrap groups that are already in reading order.
    pub fn from_ordered(items: Vec<ItemGroup>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[ItemGroup] {
        &self.items
    }

    /// Groups paired with their 1-based position.
    pub fn iter_indexed(&self) -> impl Iterator<Item = (usize, &ItemGroup)> {
        self.items.iter().enumerate().map(|(i, g)| (i + 1, g))
    }

    pub fn into_items(self) -> Vec<ItemGroup> {
        self.items
    }
}

/// Text read for one menu entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedRecord {
    /// 1-based position in the ordered menu.
    pub index: usize,
    pub title: String,
    pub description: String,
    pub price: String,
}

impl fmt::Display for ExtractedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} {} -> {}€",
            self.index, self.title, self.description, self.price
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rect(x1: f32, y1: f32, x2: f32, y2: f32, role: ComponentRole) -> BoundingBox {
        BoundingBox::new(x1, y1, x2, y2, 0.9, role)
    }

    #[test]
    fn test_containment() {
        let outer = rect(0.0, 0.0, 100.0, 100.0, ComponentRole::Item);
        assert!(outer.contains(&rect(10.0, 10.0, 90.0, 90.0, ComponentRole::Title)));
        assert!(!outer.contains(&rect(10.0, 10.0, 110.0, 90.0, ComponentRole::Title)));
        // Shared edges still count as inside
        assert!(outer.contains(&rect(0.0, 0.0, 100.0, 100.0, ComponentRole::Price)));
    }

    #[test]
    fn test_iou() {
        let a = rect(0.0, 0.0, 10.0, 10.0, ComponentRole::Item);
        let b = rect(5.0, 5.0, 15.0, 15.0, ComponentRole::Title);
        let iou = a.iou(&b);
        assert!((iou - 25.0 / 175.0).abs() < 1e-6, "iou = {iou}");
        assert!((iou - 0.1429).abs() < 1e-4);
    }

    #[test]
    fn test_iou_disjoint_and_degenerate() {
        let a = rect(0.0, 0.0, 10.0, 10.0, ComponentRole::Item);
        let far = rect(20.0, 20.0, 30.0, 30.0, ComponentRole::Price);
        assert_eq!(a.iou(&far), 0.0);

        let point = rect(3.0, 3.0, 3.0, 3.0, ComponentRole::Price);
        assert_eq!(point.iou(&point), 0.0);
    }

    #[test]
    fn test_class_mapping() {
        let roles: Vec<_> = (0..5).map(ComponentRole::from_class_id).collect();
        assert_eq!(
            roles,
            vec![
                Some(ComponentRole::Description),
                Some(ComponentRole::Item),
                Some(ComponentRole::Price),
                Some(ComponentRole::Title),
                None,
            ]
        );
        for role in [
            ComponentRole::Item,
            ComponentRole::Title,
            ComponentRole::Description,
            ComponentRole::Price,
        ] {
            assert_eq!(ComponentRole::from_class_id(role.class_id()), Some(role));
        }
    }

    #[test]
    fn test_from_raw() {
        let bbox = BoundingBox::from_raw([2.0, 22.0, 40.0, 30.0, 0.8, 2.0]).unwrap();
        assert_eq!(bbox.role, ComponentRole::Price);
        assert_eq!(bbox.rect(), [2.0, 22.0, 40.0, 30.0]);
        assert_eq!(bbox.to_raw(), [2.0, 22.0, 40.0, 30.0, 0.8, 2.0]);

        assert!(BoundingBox::from_raw([0.0, 0.0, 1.0, 1.0, 0.5, 7.0]).is_none());
        assert!(BoundingBox::from_raw([0.0, 0.0, 1.0, 1.0, 0.5, -1.0]).is_none());
    }

    #[test]
    fn test_from_raw_rejects_non_integer_class() {
        for class_id in [1.7, 0.5, f32::NAN, f32::INFINITY] {
            assert!(
                BoundingBox::from_raw([0.0, 0.0, 1.0, 1.0, 0.5, class_id]).is_none(),
                "class id {class_id}"
            );
        }
    }

    #[test]
    fn test_new_normalises_corners() {
        let bbox = BoundingBox::new(40.0, 30.0, 2.0, 22.0, 0.8, ComponentRole::Title);
        assert_eq!(bbox.rect(), [2.0, 22.0, 40.0, 30.0]);
    }

    #[test]
    fn test_record_line_format() {
        let full = ExtractedRecord {
            index: 1,
            title: "Paella".to_string(),
            description: "arroz con marisco".to_string(),
            price: "14,50".to_string(),
        };
        assert_eq!(full.to_string(), "1: Paella arroz con marisco -> 14,50€");

        let price_only = ExtractedRecord {
            index: 2,
            price: "3".to_string(),
            ..Default::default()
        };
        assert_eq!(price_only.to_string(), "2:   -> 3€");
    }

    #[test]
    fn test_group_assign_overwrites_slot() {
        let mut group = ItemGroup::new(rect(0.0, 0.0, 50.0, 50.0, ComponentRole::Item));
        assert!(!group.has_components());

        group.assign(rect(1.0, 1.0, 10.0, 10.0, ComponentRole::Price));
        group.assign(rect(2.0, 2.0, 20.0, 20.0, ComponentRole::Price));
        assert!(group.has_price());
        assert_eq!(group.price.map(|p| p.x1), Some(2.0));
        assert!(group.component(ComponentRole::Item).is_none());
    }
}
