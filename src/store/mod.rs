// Entity store module
// Owns the word collection, the current selection and the live story

pub mod entity_store;

pub use entity_store::EntityStore;
