//! Calcul et application des différences contre les deux magasins

pub mod feature;
pub mod table;

pub use feature::{FeatureDecision, FeatureSnapshot, Modification};
pub use table::{FieldChange, TableDecision, TableSnapshot};
