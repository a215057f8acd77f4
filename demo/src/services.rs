//! Services exercising one part of the library each.

mod crud;
mod image;
mod mars;
mod prepare;
mod read;
mod transaction;
mod xml;

pub(crate) use crud::{CrudService, DepartmentCrudService};
pub(crate) use image::{ImageService, ProductPhotoService};
pub(crate) use mars::{DepartmentShiftService, MarsService};
pub(crate) use prepare::{DepartmentHistoryService, PrepareService};
pub(crate) use read::{HierarchyService, ReadService};
pub(crate) use transaction::{DepartmentTransactionService, TransactionService};
pub(crate) use xml::{StoreSurveyService, XmlService};
