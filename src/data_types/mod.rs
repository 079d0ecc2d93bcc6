
/// Declared table fields, header resolution, and the typed variant row
pub mod schema;
/// In-memory projected table used by the pivots
pub mod table;
/// Clinical tier labels and the tier filter levels
pub mod tiers;
