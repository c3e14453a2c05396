//! Items to be loaded and the immutable catalog a job works from.

use nalgebra::Vector3;
use pallet_piler_core::{Error, Result};
use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Mapping of an item's (length, width, height) onto the pallet's x, y and z axes.
///
/// The name lists which item dimension ends up on x, y and z in that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Orientation {
    /// As submitted.
    #[default]
    Lwh,
    /// Rotated 90° about the vertical axis.
    Wlh,
    /// Laid on its side, length along x.
    Lhw,
    /// Laid on its side, length along y.
    Hlw,
    /// Standing on its end, width along x.
    Whl,
    /// Standing on its end, width along y.
    Hwl,
}

impl Orientation {
    /// All six axis permutations, in preference order.
    pub const ALL: [Orientation; 6] = [
        Orientation::Lwh,
        Orientation::Wlh,
        Orientation::Lhw,
        Orientation::Hlw,
        Orientation::Whl,
        Orientation::Hwl,
    ];

    /// The two orientations that keep the height vertical.
    pub const UPRIGHT: [Orientation; 2] = [Orientation::Lwh, Orientation::Wlh];

    /// Index of each pallet axis into (length, width, height).
    pub fn axes(self) -> (usize, usize, usize) {
        match self {
            Orientation::Lwh => (0, 1, 2),
            Orientation::Wlh => (1, 0, 2),
            Orientation::Lhw => (0, 2, 1),
            Orientation::Hlw => (2, 0, 1),
            Orientation::Whl => (1, 2, 0),
            Orientation::Hwl => (2, 1, 0),
        }
    }

    /// Applies the orientation to (length, width, height).
    pub fn apply(self, dimensions: &Vector3<f64>) -> Vector3<f64> {
        let (x, y, z) = self.axes();
        Vector3::new(dimensions[x], dimensions[y], dimensions[z])
    }

    /// Returns true if the item's height stays vertical.
    pub fn is_upright(self) -> bool {
        matches!(self, Orientation::Lwh | Orientation::Wlh)
    }

    /// Returns true for anything other than the submitted orientation.
    pub fn is_rotated(self) -> bool {
        self != Orientation::Lwh
    }

    /// Position in [`Orientation::ALL`], used as the last tie-breaker of the placement cost.
    pub fn rank(self) -> usize {
        self as usize
    }
}

/// Which orientations an item may be loaded in.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum OrientationConstraint {
    /// Only as submitted.
    Fixed,
    /// Rotations about the vertical axis (this side up).
    #[default]
    Upright,
    /// Any of the six axis-aligned orientations.
    Any,
    /// An explicit, non-empty list.
    Custom(Vec<Orientation>),
}

impl OrientationConstraint {
    /// Returns the permitted orientations in preference order, without duplicates.
    pub fn orientations(&self) -> Vec<Orientation> {
        match self {
            OrientationConstraint::Fixed => vec![Orientation::Lwh],
            OrientationConstraint::Upright => Orientation::UPRIGHT.to_vec(),
            OrientationConstraint::Any => Orientation::ALL.to_vec(),
            OrientationConstraint::Custom(list) => {
                let mut seen = Vec::with_capacity(list.len());
                for o in list {
                    if !seen.contains(o) {
                        seen.push(*o);
                    }
                }
                seen
            }
        }
    }
}

/// Whether other items may rest on an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum StackClass {
    /// Other items may be stacked on top.
    #[default]
    Stackable,
    /// Fragile: nothing may rest on it.
    NonStackable,
}

/// An orderable unit to be packed.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Item {
    /// Unique identifier.
    id: String,

    /// Dimensions (length, width, height).
    dimensions: Vector3<f64>,

    /// Weight of one unit.
    weight: f64,

    /// Permitted orientations.
    #[cfg_attr(feature = "serde", serde(default))]
    orientation: OrientationConstraint,

    /// Stackability class.
    #[cfg_attr(feature = "serde", serde(default))]
    stack_class: StackClass,

    /// Maximum weight that may rest on this item, directly or transitively.
    #[cfg_attr(feature = "serde", serde(default))]
    max_load_on_top: Option<f64>,

    /// Number of identical units.
    #[cfg_attr(feature = "serde", serde(default = "default_quantity"))]
    quantity: usize,
}

#[cfg(feature = "serde")]
fn default_quantity() -> usize {
    1
}

impl Item {
    /// Creates a new stackable, upright item.
    pub fn new(id: impl Into<String>, length: f64, width: f64, height: f64, weight: f64) -> Self {
        Self {
            id: id.into(),
            dimensions: Vector3::new(length, width, height),
            weight,
            orientation: OrientationConstraint::default(),
            stack_class: StackClass::default(),
            max_load_on_top: None,
            quantity: 1,
        }
    }

    /// Sets the orientation constraint.
    pub fn with_orientation(mut self, constraint: OrientationConstraint) -> Self {
        self.orientation = constraint;
        self
    }

    /// Sets the stack class.
    pub fn with_stack_class(mut self, class: StackClass) -> Self {
        self.stack_class = class;
        self
    }

    /// Sets the maximum load that may rest on top.
    pub fn with_max_load_on_top(mut self, load: f64) -> Self {
        self.max_load_on_top = Some(load);
        self
    }

    /// Sets the number of identical units.
    pub fn with_quantity(mut self, n: usize) -> Self {
        self.quantity = n;
        self
    }

    /// Returns the identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the dimensions (length, width, height).
    pub fn dimensions(&self) -> &Vector3<f64> {
        &self.dimensions
    }

    /// Returns the length.
    pub fn length(&self) -> f64 {
        self.dimensions.x
    }

    /// Returns the width.
    pub fn width(&self) -> f64 {
        self.dimensions.y
    }

    /// Returns the height.
    pub fn height(&self) -> f64 {
        self.dimensions.z
    }

    /// Returns the weight of one unit.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Returns the orientation constraint.
    pub fn orientation_constraint(&self) -> &OrientationConstraint {
        &self.orientation
    }

    /// Returns the stack class.
    pub fn stack_class(&self) -> StackClass {
        self.stack_class
    }

    /// Returns true if other items may rest on this one.
    pub fn is_stackable(&self) -> bool {
        self.stack_class == StackClass::Stackable
    }

    /// Returns the maximum load on top, if limited.
    pub fn max_load_on_top(&self) -> Option<f64> {
        self.max_load_on_top
    }

    /// Returns the quantity.
    pub fn quantity(&self) -> usize {
        self.quantity
    }

    /// Returns the volume of one unit.
    pub fn volume(&self) -> f64 {
        self.dimensions.x * self.dimensions.y * self.dimensions.z
    }

    /// Returns the base footprint area as submitted.
    pub fn footprint_area(&self) -> f64 {
        self.dimensions.x * self.dimensions.y
    }

    /// Returns the permitted orientations.
    pub fn allowed_orientations(&self) -> Vec<Orientation> {
        self.orientation.orientations()
    }

    /// Returns the extents along x, y and z for an orientation.
    pub fn dimensions_for(&self, orientation: Orientation) -> Vector3<f64> {
        orientation.apply(&self.dimensions)
    }

    /// Validates dimensions, weight, load capacity, quantity and orientations.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::InvalidGeometry {
                subject: self.id.clone(),
                field: "id",
                reason: "must not be empty".into(),
            });
        }
        for (axis, field) in ["length", "width", "height"].into_iter().enumerate() {
            let value = self.dimensions[axis];
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::non_positive(self.id.as_str(), field, value));
            }
        }
        if !(self.weight.is_finite() && self.weight > 0.0) {
            return Err(Error::non_positive(self.id.as_str(), "weight", self.weight));
        }
        if let Some(load) = self.max_load_on_top {
            if !load.is_finite() || load < 0.0 {
                return Err(Error::InvalidGeometry {
                    subject: self.id.clone(),
                    field: "max_load_on_top",
                    reason: format!("must be non-negative and finite, got {load}"),
                });
            }
        }
        if self.quantity == 0 {
            return Err(Error::InvalidGeometry {
                subject: self.id.clone(),
                field: "quantity",
                reason: "must be at least 1".into(),
            });
        }
        if self.orientation.orientations().is_empty() {
            return Err(Error::InvalidGeometry {
                subject: self.id.clone(),
                field: "orientation",
                reason: "permitted orientation set is empty".into(),
            });
        }
        Ok(())
    }

    fn unit(&self, id: String) -> Self {
        Self {
            id,
            quantity: 1,
            ..self.clone()
        }
    }
}

/// Validated, read-only set of the units a job packs.
///
/// Items with a quantity above one are expanded into units named `"{id}-{k}"`.
/// The catalog is shared by reference with the checker, the session and the
/// engine, so concurrent jobs never observe each other's data.
#[derive(Debug, Clone, Default)]
pub struct ItemCatalog {
    units: Vec<Item>,
    index: HashMap<String, usize>,
}

impl ItemCatalog {
    /// Validates `items` and expands quantities into units.
    pub fn new(items: &[Item]) -> Result<Self> {
        let mut catalog = Self::default();
        for item in items {
            item.validate()?;
            if item.quantity == 1 {
                catalog.insert(item.clone())?;
            } else {
                for k in 0..item.quantity {
                    catalog.insert(item.unit(format!("{}-{}", item.id, k)))?;
                }
            }
        }
        log::debug!(
            "catalog: {} item lines expanded to {} units",
            items.len(),
            catalog.units.len()
        );
        Ok(catalog)
    }

    fn insert(&mut self, unit: Item) -> Result<()> {
        if self.index.contains_key(&unit.id) {
            return Err(Error::DuplicateItem(unit.id));
        }
        self.index.insert(unit.id.clone(), self.units.len());
        self.units.push(unit);
        Ok(())
    }

    /// Looks up a unit by identifier.
    pub fn get(&self, id: &str) -> Option<&Item> {
        self.index.get(id).map(|&i| &self.units[i])
    }

    /// Looks up a unit, failing with [`Error::UnknownItem`].
    pub fn require(&self, id: &str) -> Result<&Item> {
        self.get(id).ok_or_else(|| Error::UnknownItem(id.to_string()))
    }

    /// Returns all units in submission order.
    pub fn units(&self) -> &[Item] {
        &self.units
    }

    /// Returns the number of units.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Returns true if there are no units.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Returns the combined volume of all units.
    pub fn total_volume(&self) -> f64 {
        self.units.iter().map(Item::volume).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_item_volume() {
        let item = Item::new("B1", 10.0, 20.0, 30.0, 5.0);
        assert_relative_eq!(item.volume(), 6000.0, epsilon = 0.001);
        assert_relative_eq!(item.footprint_area(), 200.0);
    }

    #[test]
    fn test_orientations() {
        let item = Item::new("B1", 10.0, 20.0, 30.0, 5.0);
        assert_eq!(item.allowed_orientations().len(), 2);

        let any = item.clone().with_orientation(OrientationConstraint::Any);
        assert_eq!(any.allowed_orientations().len(), 6);

        let fixed = item.clone().with_orientation(OrientationConstraint::Fixed);
        assert_eq!(fixed.allowed_orientations(), vec![Orientation::Lwh]);

        let custom = item.with_orientation(OrientationConstraint::Custom(vec![
            Orientation::Hwl,
            Orientation::Hwl,
            Orientation::Lwh,
        ]));
        assert_eq!(
            custom.allowed_orientations(),
            vec![Orientation::Hwl, Orientation::Lwh]
        );
    }

    #[test]
    fn test_dimensions_for_orientation() {
        let item = Item::new("B1", 10.0, 20.0, 30.0, 5.0);
        assert_eq!(item.dimensions_for(Orientation::Wlh), Vector3::new(20.0, 10.0, 30.0));
        assert_eq!(item.dimensions_for(Orientation::Hlw), Vector3::new(30.0, 10.0, 20.0));
        assert_eq!(item.dimensions_for(Orientation::Whl), Vector3::new(20.0, 30.0, 10.0));
        assert!(Orientation::Wlh.is_upright());
        assert!(Orientation::Wlh.is_rotated());
        assert!(!Orientation::Hwl.is_upright());
        assert!(!Orientation::Lwh.is_rotated());
    }

    #[test]
    fn test_validation() {
        assert!(Item::new("B1", 10.0, 20.0, 30.0, 1.0).validate().is_ok());

        let err = Item::new("B2", 10.0, 0.0, 30.0, 1.0).validate().unwrap_err();
        assert!(matches!(err, Error::InvalidGeometry { field: "width", .. }));

        let err = Item::new("B3", 10.0, 20.0, 30.0, 0.0).validate().unwrap_err();
        assert!(matches!(err, Error::InvalidGeometry { field: "weight", .. }));

        let empty = Item::new("B4", 1.0, 1.0, 1.0, 1.0)
            .with_orientation(OrientationConstraint::Custom(vec![]));
        assert!(empty.validate().is_err());

        let zero_qty = Item::new("B5", 1.0, 1.0, 1.0, 1.0).with_quantity(0);
        assert!(zero_qty.validate().is_err());
    }

    #[test]
    fn test_catalog_expands_quantity() {
        let catalog = ItemCatalog::new(&[
            Item::new("Med", 20.0, 20.0, 20.0, 10.0).with_quantity(3),
            Item::new("Tall", 10.0, 10.0, 60.0, 15.0),
        ])
        .unwrap();

        assert_eq!(catalog.len(), 4);
        let ids: Vec<&str> = catalog.units().iter().map(Item::id).collect();
        assert_eq!(ids, vec!["Med-0", "Med-1", "Med-2", "Tall"]);
        assert_eq!(catalog.require("Med-2").unwrap().quantity(), 1);
        assert!(matches!(catalog.require("Med"), Err(Error::UnknownItem(_))));
        assert_relative_eq!(catalog.total_volume(), 3.0 * 8000.0 + 6000.0);
    }

    #[test]
    fn test_catalog_rejects_duplicates() {
        let err = ItemCatalog::new(&[
            Item::new("A", 1.0, 1.0, 1.0, 1.0),
            Item::new("A", 2.0, 2.0, 2.0, 1.0),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::DuplicateItem(id) if id == "A"));

        // Expanded unit ids collide with an explicit one.
        let err = ItemCatalog::new(&[
            Item::new("X", 1.0, 1.0, 1.0, 1.0).with_quantity(2),
            Item::new("X-1", 1.0, 1.0, 1.0, 1.0),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::DuplicateItem(id) if id == "X-1"));
    }
}
