//! Fabula Forks — the fork index.
//!
//! Boards reference their parent through `prev_board_id`; children are not
//! owned pointers but a separately fetched, paginated list per parent. This
//! crate maintains that non-owning index: de-duplicated pages, load-more,
//! refresh, and eviction.

pub mod application;
pub mod domain;
