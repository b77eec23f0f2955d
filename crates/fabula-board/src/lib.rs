//! Fabula Board — the board value type and its generation stage machine.
//!
//! A board is one node in a story's fork tree: it points back at its parent
//! through `prev_board_id` and advances through the ordered generation
//! pipeline `write → complete → draw → narrate`.

pub mod domain;
