//! Material properties

use serde::{Deserialize, Serialize};

use crate::reference::{Identifiable, Identity};

/// Closed subtype enumeration for materials
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MaterialType {
    /// A material defined by the source deck
    Standard,
    /// Synthetic near-infinite-stiffness material backing rigid idioms
    Rigid,
    /// Synthetic near-zero-stiffness material backing virtual elements
    Virtual,
}

/// Isotropic elastic nature
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElasticProperties {
    /// Modulus of elasticity (Young's modulus)
    pub e: f64,
    /// Poisson's ratio
    pub nu: f64,
    /// Density
    pub rho: f64,
}

impl ElasticProperties {
    pub fn new(e: f64, nu: f64, rho: f64) -> ElasticProperties {
        ElasticProperties { e, nu, rho }
    }

    /// Shear modulus G = E / (2 * (1 + nu))
    pub fn g(&self) -> f64 {
        self.e / (2.0 * (1.0 + self.nu))
    }
}

/// A material of the model
#[derive(Debug, Clone)]
pub struct Material {
    ident: Identity,
    pub material_type: MaterialType,
    pub label: Option<String>,
    pub elastic: Option<ElasticProperties>,
}

impl Material {
    /// A deck-defined material
    pub fn new(original_id: Option<u32>) -> Material {
        Material {
            ident: Identity::new(original_id),
            material_type: MaterialType::Standard,
            label: None,
            elastic: None,
        }
    }

    pub fn with_elastic(mut self, elastic: ElasticProperties) -> Material {
        self.elastic = Some(elastic);
        self
    }

    pub fn with_label(mut self, label: &str) -> Material {
        self.label = Some(label.to_string());
        self
    }

    /// The synthetic rigid material backing rigid-constraint cells
    pub fn rigid() -> Material {
        Material {
            ident: Identity::synthetic(),
            material_type: MaterialType::Rigid,
            label: Some("RIGID".to_string()),
            elastic: Some(ElasticProperties::new(1e12, 0.0, 0.0)),
        }
    }

    /// The synthetic virtual material backing near-zero-stiffness elements
    pub fn virtual_() -> Material {
        Material {
            ident: Identity::synthetic(),
            material_type: MaterialType::Virtual,
            label: Some("VIRTUAL".to_string()),
            elastic: Some(ElasticProperties::new(1e-12, 0.0, 0.0)),
        }
    }
}

impl Identifiable for Material {
    type Type = MaterialType;
    const KIND: &'static str = "Material";

    fn ident(&self) -> &Identity {
        &self.ident
    }

    fn ident_mut(&mut self) -> &mut Identity {
        &mut self.ident
    }

    fn subtype(&self) -> MaterialType {
        self.material_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_shear_modulus() {
        let elastic = ElasticProperties::new(200e9, 0.3, 7850.0);
        assert_relative_eq!(elastic.g(), 200e9 / 2.6, epsilon = 1.0);
    }

    #[test]
    fn test_synthetic_materials() {
        assert_eq!(Material::rigid().material_type, MaterialType::Rigid);
        assert_eq!(Material::virtual_().material_type, MaterialType::Virtual);
        assert!(!Material::rigid().ident().is_original());
    }
}
