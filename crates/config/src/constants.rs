//! Fixed default filesystem locations for kiln
//!
//! Each of these can be overridden from the configuration file or the
//! environment; they are the values used when nothing else is set.

pub const PREFIX: &str = "/opt/kiln";

pub const CELLAR_DIR: &str = "/opt/kiln/Cellar";
pub const LOGS_DIR: &str = "/opt/kiln/logs";
pub const FORMULA_DIR: &str = "/opt/kiln/formulae";

/// Directory name under the system temp dir used for work trees
pub const WORK_DIR_NAME: &str = "kiln";

/// Formula directory searched relative to the current directory
pub const LOCAL_FORMULA_DIR: &str = "formulae";
