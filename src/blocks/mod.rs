//! On-disk block formats (spec.md §3, §4.2-§4.3, §6). Each submodule owns
//! one block family's wire layout, a builder that accumulates appends under
//! a soft size limit, and a `check()` self-check of that family's
//! invariants.

pub mod docset;
pub mod forward;
pub mod invterm;
pub mod meta;
pub mod posting;
