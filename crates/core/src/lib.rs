#![forbid(unsafe_code)]

pub mod error;
pub mod markup;
pub mod model;
pub mod ordering;
pub mod selection;
pub mod time;
pub mod tree;

pub use error::Error;
pub use markup::{Annotation, Annotations, MarkupError, decode_annotations, render, strip};
pub use selection::{Reconciliation, Selection, SelectionError, SelectionState};
pub use time::Clock;
pub use tree::{CardNode, DeckRow, DeckTree, LessonNode, RowSetError, WordAnnotation, reduce_rows};
