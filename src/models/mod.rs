//! Data model shared by the engine, the stores, and the REST surface.

pub mod category;
pub mod combo;
pub mod vendor_service;

pub use category::{
    sibling_order, Category, CategoryFlag, Hierarchy, NewCategoryFields, UpdateCategoryFields,
};
pub use combo::{Combo, ComboItem, ComboSize, NewComboFields};
pub use vendor_service::{
    FlattenedService, ServiceLogEntry, ServiceStatus, VersionedServices,
};
