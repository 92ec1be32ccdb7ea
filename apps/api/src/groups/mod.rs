//! Groups: the owners of memories. Creating, editing, liking and posting to a
//! group all end with a badge re-evaluation.

pub mod badges;
pub mod handlers;
pub mod models;
