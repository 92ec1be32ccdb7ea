//! List query planning shared by every paginated endpoint: raw parameters in,
//! a validated skip/limit/sort/filter plan and a pagination envelope out.

pub mod page;
pub mod plan;
pub mod request;

pub use page::Page;
pub use plan::{
    plan_list_query, FilterSpec, ListQueryPlan, SortDirection, SortField, SortKey,
    ValidationError, ValidationErrorKind,
};
pub use request::ListQueryRequest;
