pub use log::{debug, error, info, trace, warn};
pub use serde::{Deserialize, Serialize};
pub use std::fmt::{self, Debug, Display, Formatter};
pub use std::str::FromStr;
