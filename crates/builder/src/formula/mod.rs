//! Formula loading and load-time validation

mod parser;
mod validate;

pub use parser::{find_formula, load_formula, parse_formula};
pub use validate::validate_formula;
