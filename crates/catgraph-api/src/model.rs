//! # Cat Documents
//!
//! The gateway's own entity. Users are not stored here; `owner` holds the
//! identity service's user id and is resolved through `Cat.owner`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// GeoJSON point. Coordinates are `[longitude, latitude]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    #[serde(rename = "type", default)]
    pub kind: PointKind,
    pub coordinates: [f64; 2],
}

/// The only GeoJSON geometry a cat location may have.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PointKind {
    #[default]
    Point,
}

impl Point {
    pub fn new(lng: f64, lat: f64) -> Self {
        Self {
            kind: PointKind::Point,
            coordinates: [lng, lat],
        }
    }

    pub fn lng(&self) -> f64 {
        self.coordinates[0]
    }

    pub fn lat(&self) -> f64 {
        self.coordinates[1]
    }

    pub fn validate(&self) -> Result<(), String> {
        let (lng, lat) = (self.lng(), self.lat());
        if !(-180.0..=180.0).contains(&lng) || !(-90.0..=90.0).contains(&lat) {
            return Err(format!("location [{lng}, {lat}] is outside [-180..180, -90..90]"));
        }
        Ok(())
    }
}

/// A `{ lat, lng }` corner used by area queries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl From<Coordinates> for Point {
    fn from(c: Coordinates) -> Self {
        Point::new(c.lng, c.lat)
    }
}

/// A stored cat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cat {
    pub id: Uuid,
    pub cat_name: String,
    pub weight: f64,
    pub birthdate: DateTime<Utc>,
    pub filename: String,
    pub location: Point,
    /// Identity service user id.
    pub owner: String,
}

/// Arguments of `createCat`.
#[derive(Debug, Clone, Deserialize)]
pub struct CatInput {
    pub cat_name: String,
    pub weight: f64,
    pub birthdate: DateTime<Utc>,
    pub filename: String,
    pub location: Point,
}

impl CatInput {
    pub fn validate(&self) -> Result<(), String> {
        validate_name(&self.cat_name)?;
        validate_weight(self.weight)?;
        self.location.validate()
    }

    /// A new cat owned by `owner`, with a fresh id.
    pub fn into_cat(self, owner: impl Into<String>) -> Cat {
        Cat {
            id: Uuid::new_v4(),
            cat_name: self.cat_name,
            weight: self.weight,
            birthdate: self.birthdate,
            filename: self.filename,
            location: self.location,
            owner: owner.into(),
        }
    }
}

/// Partial update for `updateCat` / `updateCatAsAdmin`. Owner and id are
/// never patchable.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatPatch {
    #[serde(default)]
    pub cat_name: Option<String>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub birthdate: Option<DateTime<Utc>>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub location: Option<Point>,
}

impl CatPatch {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(name) = &self.cat_name {
            validate_name(name)?;
        }
        if let Some(weight) = self.weight {
            validate_weight(weight)?;
        }
        if let Some(location) = &self.location {
            location.validate()?;
        }
        Ok(())
    }

    pub fn apply(&self, cat: &mut Cat) {
        if let Some(name) = &self.cat_name {
            cat.cat_name = name.clone();
        }
        if let Some(weight) = self.weight {
            cat.weight = weight;
        }
        if let Some(birthdate) = self.birthdate {
            cat.birthdate = birthdate;
        }
        if let Some(filename) = &self.filename {
            cat.filename = filename.clone();
        }
        if let Some(location) = self.location {
            cat.location = location;
        }
    }
}

fn validate_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("cat_name must not be empty".into());
    }
    Ok(())
}

fn validate_weight(weight: f64) -> Result<(), String> {
    if !weight.is_finite() || weight <= 0.0 {
        return Err(format!("weight must be a positive number, got {weight}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn point_defaults_type() {
        let p: Point = serde_json::from_value(json!({ "coordinates": [24.94, 60.17] })).unwrap();
        assert_eq!(p.kind, PointKind::Point);
        assert_eq!(p.lat(), 60.17);
        assert_eq!(serde_json::to_value(p).unwrap()["type"], "Point");
    }

    #[test]
    fn point_rejects_other_geometries() {
        let err = serde_json::from_value::<Point>(json!({ "type": "Polygon", "coordinates": [0, 0] }));
        assert!(err.is_err());
    }

    #[test]
    fn input_validation() {
        let input: CatInput = serde_json::from_value(json!({
            "cat_name": " ",
            "weight": 4.2,
            "birthdate": "2020-01-01T00:00:00Z",
            "filename": "c.jpg",
            "location": { "type": "Point", "coordinates": [24.94, 60.17] }
        }))
        .unwrap();
        assert!(input.validate().is_err());

        let patch = CatPatch {
            weight: Some(-1.0),
            ..Default::default()
        };
        assert!(patch.validate().is_err());
        assert!(Point::new(200.0, 0.0).validate().is_err());
    }

    #[test]
    fn patch_leaves_owner_alone() {
        let mut cat = CatInput {
            cat_name: "Misu".into(),
            weight: 4.0,
            birthdate: Utc::now(),
            filename: "misu.jpg".into(),
            location: Point::new(24.9, 60.2),
        }
        .into_cat("u1");
        let id = cat.id;
        CatPatch {
            cat_name: Some("Mösö".into()),
            ..Default::default()
        }
        .apply(&mut cat);
        assert_eq!(cat.cat_name, "Mösö");
        assert_eq!(cat.owner, "u1");
        assert_eq!(cat.id, id);
    }
}
